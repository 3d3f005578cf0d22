// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display-tree topology: attach, detach, reparent, and sibling order.

use alloc::vec::Vec;

use crate::dirty;
use crate::error::StageError;
use crate::event::EventType;
use crate::handle::{Handle, INVALID};
use crate::trace::{TreeEvent, TreeOp};

use super::{Children, Stage};

impl Stage {
    // -- Topology API --

    /// Inserts `child` into `parent`'s child list at `index` (appending when
    /// `None` or past the end).
    ///
    /// A child that already has a parent is moved, as with
    /// [`reparent`](Self::reparent). A retained child is revived together
    /// with its retained descendants. The child's subtree is marked dirty for
    /// layout.
    ///
    /// # Errors
    ///
    /// - [`NotFound`](StageError::NotFound) if either handle is stale.
    /// - [`CycleDetected`](StageError::CycleDetected) if `parent` is `child`
    ///   or one of its descendants.
    /// - [`Retained`](StageError::Retained) if `parent` is awaiting
    ///   reclamation.
    ///
    /// On error the tree is unchanged.
    pub fn attach(&mut self, child: Handle, parent: Handle, index: Option<usize>) -> Result<(), StageError> {
        let c = self.check(child)?;
        let p = self.check(parent)?;
        if c == p || self.is_ancestor_idx(c, p) {
            return Err(StageError::CycleDetected { child, parent });
        }
        if self.state[p as usize].is_retained() {
            return Err(StageError::Retained(parent));
        }

        let old = self.parent[c as usize];
        if old != INVALID {
            self.unlink_from_parent(c);
            self.dirty.remove_dependency(c, old, dirty::LAYOUT);
            self.dirty.mark(old, dirty::TOPOLOGY);
            if old != p {
                self.queue_notification(EventType::DETACHED, c);
            }
        }

        self.link(c, p, index);
        // Child depends on parent for layout.
        let _ = self.dirty.add_dependency(c, p, dirty::LAYOUT);

        if self.state[c as usize].is_retained() {
            self.revive_subtree(c);
        }
        self.invalidate_layout(c);
        self.dirty.mark(p, dirty::TOPOLOGY);

        let op = if old == p { TreeOp::Reorder } else { TreeOp::Attach };
        self.tracer.tree(&TreeEvent {
            frame: self.now.frame,
            op,
            child,
            parent: Some(parent),
        });
        if old != p {
            self.queue_notification(EventType::ATTACHED, c);
        }
        Ok(())
    }

    /// Removes `child` from its parent. The child becomes a root.
    ///
    /// Detaching a root is a no-op.
    ///
    /// # Errors
    ///
    /// - [`NotFound`](StageError::NotFound) if `child` is stale.
    /// - [`Retained`](StageError::Retained) if the parent is awaiting
    ///   reclamation. Use [`attach`](Self::attach) to move the child out.
    pub fn detach(&mut self, child: Handle) -> Result<(), StageError> {
        let c = self.check(child)?;
        if self.parent[c as usize] != INVALID {
            self.check_parent_live(c)?;
            self.detach_idx(c);
        }
        Ok(())
    }

    /// Moves `child` under `new_parent` at `index` in one step.
    ///
    /// The subtree keeps its internal structure and anchor rules; its bounds
    /// are recomputed against the new reference frame.
    pub fn reparent(
        &mut self,
        child: Handle,
        new_parent: Handle,
        index: Option<usize>,
    ) -> Result<(), StageError> {
        self.attach(child, new_parent, index)
    }

    /// Moves `child` to position `index` among its siblings (clamped to the
    /// last position). Roots have no sibling order; for them this is a no-op.
    ///
    /// Fails with [`Retained`](StageError::Retained) if the parent is
    /// awaiting reclamation.
    pub fn set_child_index(&mut self, child: Handle, index: usize) -> Result<(), StageError> {
        let c = self.check(child)?;
        let p = self.parent[c as usize];
        if p == INVALID {
            return Ok(());
        }
        self.check_parent_live(c)?;
        self.unlink_from_parent(c);
        self.link(c, p, Some(index));
        self.dirty.mark(p, dirty::TOPOLOGY);
        self.tracer.tree(&TreeEvent {
            frame: self.now.frame,
            op: TreeOp::Reorder,
            child,
            parent: Some(self.handle_of(p)),
        });
        Ok(())
    }

    /// Returns the parent of an object, if any.
    pub fn parent(&self, handle: Handle) -> Result<Option<Handle>, StageError> {
        let idx = self.check(handle)?;
        let p = self.parent[idx as usize];
        Ok((p != INVALID).then(|| self.handle_of(p)))
    }

    /// Returns an iterator over the direct children of an object.
    pub fn children(&self, handle: Handle) -> Result<Children<'_>, StageError> {
        let idx = self.check(handle)?;
        Ok(Children::new(self, self.first_child[idx as usize]))
    }

    /// Number of direct children.
    pub fn child_count(&self, handle: Handle) -> Result<usize, StageError> {
        Ok(self.children(handle)?.count())
    }

    /// Returns the live root objects (no parent, not retained) in slot order.
    #[must_use]
    pub fn roots(&self) -> Vec<Handle> {
        (0..self.len)
            .filter(|&idx| {
                self.parent[idx as usize] == INVALID
                    && self.state[idx as usize] == super::SlotState::Live
            })
            .map(|idx| self.handle_of(idx))
            .collect()
    }

    /// Returns `true` if `ancestor` is a proper ancestor of `descendant`.
    ///
    /// Stale handles are never ancestors.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: Handle, descendant: Handle) -> bool {
        match (self.check(ancestor), self.check(descendant)) {
            (Ok(a), Ok(d)) => self.is_ancestor_idx(a, d),
            _ => false,
        }
    }

    // -- Internal helpers --

    /// Detaches a child that has a parent, marking its subtree for layout.
    pub(crate) fn detach_idx(&mut self, c: u32) {
        let p = self.parent[c as usize];
        self.unlink_from_parent(c);
        self.dirty.remove_dependency(c, p, dirty::LAYOUT);
        self.invalidate_layout(c);
        self.dirty.mark(p, dirty::TOPOLOGY);
        self.dirty.mark(c, dirty::TOPOLOGY);
        self.tracer.tree(&TreeEvent {
            frame: self.now.frame,
            op: TreeOp::Detach,
            child: self.handle_of(c),
            parent: Some(self.handle_of(p)),
        });
        self.queue_notification(EventType::DETACHED, c);
    }

    /// Rejects sibling-list edits under a parent that is awaiting
    /// reclamation.
    fn check_parent_live(&self, c: u32) -> Result<(), StageError> {
        let p = self.parent[c as usize];
        if self.state[p as usize].is_retained() {
            return Err(StageError::Retained(self.handle_of(p)));
        }
        Ok(())
    }

    pub(crate) fn is_ancestor_idx(&self, ancestor: u32, descendant: u32) -> bool {
        let mut cur = self.parent[descendant as usize];
        while cur != INVALID {
            if cur == ancestor {
                return true;
            }
            cur = self.parent[cur as usize];
        }
        false
    }

    /// Links an unparented `c` into `p`'s child list before the `index`-th
    /// child, or last.
    fn link(&mut self, c: u32, p: u32, index: Option<usize>) {
        let mut before = self.first_child[p as usize];
        let mut last = INVALID;
        let mut remaining = index.unwrap_or(usize::MAX);
        while before != INVALID && remaining > 0 {
            last = before;
            before = self.next_sibling[before as usize];
            remaining -= 1;
        }

        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = last;
        self.next_sibling[c as usize] = before;
        if last == INVALID {
            self.first_child[p as usize] = c;
        } else {
            self.next_sibling[last as usize] = c;
        }
        if before != INVALID {
            self.prev_sibling[before as usize] = c;
        }
    }

    /// Removes `idx` from its parent's child list without touching dirty state.
    pub(crate) fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            // Was first child.
            self.first_child[p as usize] = next;
        }

        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::super::tests::{group, stage};
    use super::*;

    #[test]
    fn attach_appends_in_order() {
        let mut stage = stage();
        let parent = group(&mut stage);
        let a = group(&mut stage);
        let b = group(&mut stage);
        stage.attach(a, parent, None).unwrap();
        stage.attach(b, parent, None).unwrap();

        assert_eq!(stage.parent(a), Ok(Some(parent)));
        let kids: Vec<_> = stage.children(parent).unwrap().collect();
        assert_eq!(kids, vec![a, b]);
        assert_eq!(stage.roots(), vec![parent]);
    }

    #[test]
    fn attach_at_index() {
        let mut stage = stage();
        let parent = group(&mut stage);
        let a = group(&mut stage);
        let b = group(&mut stage);
        let c = group(&mut stage);
        stage.attach(a, parent, None).unwrap();
        stage.attach(b, parent, None).unwrap();
        stage.attach(c, parent, Some(0)).unwrap();
        let kids: Vec<_> = stage.children(parent).unwrap().collect();
        assert_eq!(kids, vec![c, a, b]);

        let d = group(&mut stage);
        stage.attach(d, parent, Some(99)).unwrap();
        assert_eq!(stage.children(parent).unwrap().last(), Some(d));
    }

    #[test]
    fn cycle_rejected_and_tree_unchanged() {
        let mut stage = stage();
        let parent = group(&mut stage);
        let child = group(&mut stage);
        stage.attach(child, parent, None).unwrap();

        assert_eq!(
            stage.attach(parent, child, None),
            Err(StageError::CycleDetected {
                child: parent,
                parent: child,
            })
        );
        assert_eq!(stage.parent(child), Ok(Some(parent)));
        assert_eq!(stage.parent(parent), Ok(None));
    }

    #[test]
    fn deep_cycle_and_self_attach_rejected() {
        let mut stage = stage();
        let a = group(&mut stage);
        let b = group(&mut stage);
        let c = group(&mut stage);
        stage.attach(b, a, None).unwrap();
        stage.attach(c, b, None).unwrap();
        assert!(matches!(
            stage.attach(a, c, None),
            Err(StageError::CycleDetected { .. })
        ));
        assert!(matches!(
            stage.attach(a, a, None),
            Err(StageError::CycleDetected { .. })
        ));
        assert!(stage.is_ancestor(a, c));
        assert!(!stage.is_ancestor(c, a));
    }

    #[test]
    fn detach_makes_root() {
        let mut stage = stage();
        let parent = group(&mut stage);
        let child = group(&mut stage);
        stage.attach(child, parent, None).unwrap();
        stage.detach(child).unwrap();
        assert_eq!(stage.parent(child), Ok(None));
        assert_eq!(stage.child_count(parent), Ok(0));
        assert_eq!(stage.roots(), vec![parent, child]);
        // Detaching a root again is fine.
        stage.detach(child).unwrap();
    }

    #[test]
    fn reparent_moves_subtree() {
        let mut stage = stage();
        let a = group(&mut stage);
        let b = group(&mut stage);
        let child = group(&mut stage);
        let grandchild = group(&mut stage);
        stage.attach(child, a, None).unwrap();
        stage.attach(grandchild, child, None).unwrap();

        stage.reparent(child, b, None).unwrap();
        assert_eq!(stage.child_count(a), Ok(0));
        assert_eq!(stage.parent(child), Ok(Some(b)));
        assert_eq!(stage.parent(grandchild), Ok(Some(child)));
    }

    #[test]
    fn set_child_index_reorders() {
        let mut stage = stage();
        let parent = group(&mut stage);
        let a = group(&mut stage);
        let b = group(&mut stage);
        let c = group(&mut stage);
        for h in [a, b, c] {
            stage.attach(h, parent, None).unwrap();
        }
        stage.set_child_index(a, 2).unwrap();
        let kids: Vec<_> = stage.children(parent).unwrap().collect();
        assert_eq!(kids, vec![b, c, a]);
        stage.set_child_index(a, 0).unwrap();
        let kids: Vec<_> = stage.children(parent).unwrap().collect();
        assert_eq!(kids, vec![a, b, c]);
        stage.set_child_index(b, 1).unwrap();
        let kids: Vec<_> = stage.children(parent).unwrap().collect();
        assert_eq!(kids, vec![a, b, c]);
    }

    #[test]
    fn stale_handles_fail() {
        let mut stage = stage();
        let parent = group(&mut stage);
        let gone = group(&mut stage);
        stage.destroy(gone);
        assert_eq!(
            stage.attach(gone, parent, None),
            Err(StageError::NotFound(gone))
        );
        assert_eq!(
            stage.attach(parent, gone, None),
            Err(StageError::NotFound(gone))
        );
        assert!(stage.children(gone).is_err());
        assert!(!stage.is_ancestor(gone, parent));
    }
}
