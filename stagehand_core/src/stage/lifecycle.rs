// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Destruction, orphan retention, external references, and reclamation.
//!
//! Destroying an object detaches it and moves it and its subtree into the
//! *retained* state. A retained object still resolves by handle but is left
//! out of tree traversal, hit testing, and the draw order. It is reclaimed
//! (its slot freed and its generation bumped) once both hold:
//!
//! 1. its [`RetentionPolicy`] has expired, and
//! 2. its external reference count is zero.
//!
//! Expiry is checked eagerly on [`destroy`](Stage::destroy),
//! [`release`](Stage::release), and [`drop_ref`](Stage::drop_ref), and for
//! grace periods on every [`tick`](Stage::tick).

use alloc::vec::Vec;

use crate::clock::{Deadline, FrameStamp, GracePeriod, HostTime};
use crate::dirty;
use crate::error::StageError;
use crate::event::DispatchReport;
use crate::handle::{Handle, INVALID};
use crate::trace::{ObjectReclaimedEvent, ObjectRetainedEvent};

use super::{ListenerTable, Stage};

/// How long a destroyed object stays resolvable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RetentionPolicy {
    /// Reclaim as soon as no external reference remains.
    #[default]
    DisposeImmediately,
    /// Stay resolvable for a grace period.
    Grace(GracePeriod),
    /// Stay resolvable until [`Stage::release`] is called.
    RetainUntilRelease,
}

/// Why a retained slot is still held.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Hold {
    /// Grace period running.
    Until(Deadline),
    /// Waiting for a manual release.
    Manual,
    /// Policy satisfied; only external references keep it.
    Released,
}

/// Occupancy of a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotState {
    /// Free; the handle generation has moved on.
    Vacant,
    /// In use and visible to traversal.
    Live,
    /// Destroyed, awaiting reclamation.
    Retained(Hold),
}

impl SlotState {
    pub(crate) fn is_retained(self) -> bool {
        matches!(self, Self::Retained(_))
    }
}

/// Lifecycle changes accumulated since the previous [`Stage::tick`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameChanges {
    /// Frame counter after this tick.
    pub frame: u64,
    /// Objects created.
    pub added: Vec<Handle>,
    /// Objects that entered retention.
    pub retained: Vec<Handle>,
    /// Handles that stopped resolving.
    pub reclaimed: Vec<Handle>,
    /// Result of delivering queued lifecycle notifications.
    pub notifications: DispatchReport,
}

impl Stage {
    /// Destroys an object.
    ///
    /// Detaches it from its parent, then applies each subtree member's own
    /// retention policy. The subtree keeps its internal structure while
    /// retained. Destroying a stale or already-retained handle is a no-op.
    pub fn destroy(&mut self, handle: Handle) {
        let Some(idx) = self.live_idx(handle) else {
            return;
        };
        if self.parent[idx as usize] != INVALID {
            self.detach_idx(idx);
        }

        let subtree = self.subtree_indices(idx);
        for &i in &subtree {
            let policy = self.retention[i as usize];
            let hold = match policy {
                RetentionPolicy::DisposeImmediately => Hold::Released,
                RetentionPolicy::Grace(period) => Hold::Until(period.deadline_from(self.now)),
                RetentionPolicy::RetainUntilRelease => Hold::Manual,
            };
            self.state[i as usize] = SlotState::Retained(hold);
            let retained = self.handle_of(i);
            self.pending_retained.push(retained);
            self.dirty.mark(i, dirty::TOPOLOGY);
            self.tracer.object_retained(&ObjectRetainedEvent {
                frame: self.now.frame,
                handle: retained,
                policy,
                external_refs: self.external_refs[i as usize],
            });
        }
        // Leaves first, so parents are freed after their children.
        for &i in subtree.iter().rev() {
            self.try_reclaim(i);
        }
    }

    /// Ends retention for a destroyed object.
    ///
    /// The object is reclaimed now unless external references remain. Live
    /// objects are unaffected.
    pub fn release(&mut self, handle: Handle) -> Result<(), StageError> {
        let idx = self.check(handle)?;
        if self.state[idx as usize].is_retained() {
            self.state[idx as usize] = SlotState::Retained(Hold::Released);
            self.try_reclaim(idx);
        }
        Ok(())
    }

    /// Registers an external reference, returning the new count.
    ///
    /// An object with outstanding references is never reclaimed.
    pub fn add_ref(&mut self, handle: Handle) -> Result<u32, StageError> {
        let idx = self.check(handle)?;
        let refs = &mut self.external_refs[idx as usize];
        *refs = refs.saturating_add(1);
        Ok(*refs)
    }

    /// Drops an external reference, returning the remaining count.
    ///
    /// Dropping the last reference to a retained object whose policy has
    /// expired reclaims it immediately.
    pub fn drop_ref(&mut self, handle: Handle) -> Result<u32, StageError> {
        let idx = self.check(handle)?;
        let refs = &mut self.external_refs[idx as usize];
        *refs = refs.saturating_sub(1);
        let remaining = *refs;
        if remaining == 0 {
            self.try_reclaim(idx);
        }
        Ok(remaining)
    }

    /// Advances the frame counter and host clock, reclaims expired orphans,
    /// delivers queued lifecycle notifications, and reports what changed
    /// since the previous tick.
    ///
    /// `now` is clamped so host time never runs backwards.
    pub fn tick(&mut self, now: HostTime) -> FrameChanges {
        self.now = FrameStamp {
            frame: self.now.frame + 1,
            time: now.max(self.now.time),
        };

        let retained: Vec<u32> = (0..self.len)
            .filter(|&i| self.state[i as usize].is_retained())
            .collect();
        for idx in retained {
            self.try_reclaim(idx);
        }

        let notifications = self.flush_notifications();
        FrameChanges {
            frame: self.now.frame,
            added: core::mem::take(&mut self.pending_added),
            retained: core::mem::take(&mut self.pending_retained),
            reclaimed: core::mem::take(&mut self.pending_reclaimed),
            notifications,
        }
    }

    /// Frees a retained slot if its policy expired and nothing references it.
    pub(crate) fn try_reclaim(&mut self, idx: u32) -> bool {
        let SlotState::Retained(hold) = self.state[idx as usize] else {
            return false;
        };
        if self.external_refs[idx as usize] > 0 {
            return false;
        }
        let expired = match hold {
            Hold::Released => true,
            Hold::Until(deadline) => deadline.has_passed(self.now),
            Hold::Manual => false,
        };
        if expired {
            self.free_slot(idx);
        }
        expired
    }

    /// Unlinks a slot from the tree and returns it to the free list.
    ///
    /// Children that are still retained become retained roots.
    fn free_slot(&mut self, idx: u32) {
        let i = idx as usize;
        if self.parent[i] != INVALID {
            let p = self.parent[i];
            self.unlink_from_parent(idx);
            self.dirty.remove_dependency(idx, p, dirty::LAYOUT);
            self.dirty.mark(p, dirty::TOPOLOGY);
        }

        let mut child = self.first_child[i];
        while child != INVALID {
            let next = self.next_sibling[child as usize];
            self.parent[child as usize] = INVALID;
            self.prev_sibling[child as usize] = INVALID;
            self.next_sibling[child as usize] = INVALID;
            self.dirty.remove_dependency(child, idx, dirty::LAYOUT);
            self.invalidate_layout(child);
            child = next;
        }
        self.first_child[i] = INVALID;

        self.dirty.remove_key(idx);

        let handle = self.handle_of(idx);
        // Bump generation so old handles immediately fail validation.
        self.generation[i] = self.generation[i].wrapping_add(1);
        self.state[i] = SlotState::Vacant;
        self.listeners[i] = ListenerTable::default();
        self.properties[i].clear();
        self.external_refs[i] = 0;
        self.free_list.push(idx);

        self.pending_reclaimed.push(handle);
        self.dirty.mark(idx, dirty::TOPOLOGY);
        self.tracer.object_reclaimed(&ObjectReclaimedEvent {
            frame: self.now.frame,
            handle,
        });
    }

    /// Marks `idx` and its retained descendants live again.
    pub(crate) fn revive_subtree(&mut self, idx: u32) {
        for i in self.subtree_indices(idx) {
            if self.state[i as usize].is_retained() {
                self.state[i as usize] = SlotState::Live;
                self.dirty.mark(i, dirty::TOPOLOGY);
            }
        }
    }
}
