// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use alloc::vec::Vec;

use crate::handle::{Handle, INVALID};

use super::{SlotState, Stage};

/// An iterator over the direct children of an object.
///
/// Created by [`Stage::children`].
#[derive(Debug)]
pub struct Children<'a> {
    stage: &'a Stage,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(stage: &'a Stage, first: u32) -> Self {
        Self {
            stage,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = Handle;

    fn next(&mut self) -> Option<Handle> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.stage.next_sibling[idx as usize];
        Some(self.stage.handle_of(idx))
    }
}

impl Stage {
    /// Returns the cached draw order: raw slot indices of visible, live
    /// objects in depth-first pre-order (back to front).
    ///
    /// Roots are visited in slot order and hidden subtrees are skipped. Only
    /// valid after [`update_layout`](Self::update_layout).
    #[must_use]
    pub fn draw_order(&self) -> &[u32] {
        &self.draw_order
    }

    /// Snapshot of the direct children of `idx`.
    pub(crate) fn child_indices(&self, idx: u32) -> Vec<u32> {
        let mut out = Vec::new();
        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            out.push(child);
            child = self.next_sibling[child as usize];
        }
        out
    }

    /// `idx` and all its descendants in depth-first pre-order.
    pub(crate) fn subtree_indices(&self, idx: u32) -> Vec<u32> {
        let mut out = Vec::new();
        let mut stack = alloc::vec![idx];
        while let Some(i) = stack.pop() {
            out.push(i);
            stack.extend(self.child_indices(i).into_iter().rev());
        }
        out
    }

    /// Rebuilds the depth-first pre-order traversal of all visible live
    /// objects.
    pub(crate) fn rebuild_draw_order(&mut self) {
        self.draw_order.clear();
        let mut stack = Vec::new();
        for root in (0..self.len).rev() {
            if self.parent[root as usize] == INVALID && self.state[root as usize] == SlotState::Live {
                stack.push(root);
            }
        }
        while let Some(idx) = stack.pop() {
            if self.hidden[idx as usize] {
                continue;
            }
            self.draw_order.push(idx);
            let children = self.child_indices(idx);
            stack.extend(children.into_iter().rev());
        }
    }
}
