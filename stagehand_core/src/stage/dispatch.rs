// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Listener storage and the event traversal modes.
//!
//! | Mode | Entry point | Walk | Listeners |
//! |------|-------------|------|-----------|
//! | structural | [`broadcast_tree`](Stage::broadcast_tree) | pre-order from a root, live objects only | bubble |
//! | propagate | [`dispatch`](Stage::dispatch), [`dispatch_at`](Stage::dispatch_at) | root→target, target, target→root | capture, both, bubble |
//! | global | [`broadcast_global`](Stage::broadcast_global) | every slot, optionally retained ones | bubble |
//!
//! Coordinate backpropagation, the fourth mode, lives in the layout module
//! ([`local_to_world`](Stage::local_to_world),
//! [`world_to_local`](Stage::world_to_local),
//! [`hit_test`](Stage::hit_test)); `dispatch_at` uses it to pick the target
//! and to fill in each visited object's local point.
//!
//! Every walk snapshots the path, child list, or slot list before it runs a
//! listener, and the listener list of an object when visiting it. Listeners
//! may therefore mutate the tree or dispatch again; objects attached during
//! a walk are not guaranteed to be visited, and a listener removed during a
//! visit may still run in that visit. Objects reclaimed during a walk are
//! skipped from then on.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::mem;

use hashbrown::{HashMap, HashSet};
use kurbo::Point;

use crate::error::StageError;
use crate::event::{
    DispatchMode, DispatchReport, Event, EventType, ListenerError, ListenerFailure, ListenerFn,
    ListenerId, ListenerOptions, ListenerResult, Phase,
};
use crate::handle::{Handle, INVALID};
use crate::trace::{DispatchBeginEvent, DispatchEndEvent};
use crate::variant::Variant;

use super::{SlotState, Stage};

type Callback = Rc<RefCell<ListenerFn>>;

#[derive(Clone)]
struct ListenerEntry {
    id: ListenerId,
    capture: bool,
    callback: Callback,
}

/// Listeners registered on one object, keyed by event-type id, in
/// registration order.
#[derive(Default)]
pub(crate) struct ListenerTable {
    by_type: HashMap<u32, Vec<ListenerEntry>>,
}

/// Which registrations a visit invokes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Select {
    Capture,
    Bubble,
    /// Capture registrations first, then bubble ones.
    Both,
}

impl ListenerTable {
    fn snapshot(&self, type_id: u32, select: Select) -> Vec<(ListenerId, Callback)> {
        let Some(entries) = self.by_type.get(&type_id) else {
            return Vec::new();
        };
        let pick = |capture: bool| {
            entries
                .iter()
                .filter(move |e| e.capture == capture)
                .map(|e| (e.id, Rc::clone(&e.callback)))
        };
        match select {
            Select::Capture => pick(true).collect(),
            Select::Bubble => pick(false).collect(),
            Select::Both => pick(true).chain(pick(false)).collect(),
        }
    }

    fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }
}

impl Stage {
    // -- Listener API --

    /// Registers a listener for `event_type` on an object.
    pub fn add_listener<F>(
        &mut self,
        handle: Handle,
        event_type: &EventType,
        options: ListenerOptions,
        listener: F,
    ) -> Result<ListenerId, StageError>
    where
        F: FnMut(&mut Self, &mut Event) -> ListenerResult + 'static,
    {
        let idx = self.check(handle)?;
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        let callback: Callback = Rc::new(RefCell::new(listener));
        self.listeners[idx as usize]
            .by_type
            .entry(event_type.id())
            .or_default()
            .push(ListenerEntry {
                id,
                capture: options.capture,
                callback,
            });
        Ok(id)
    }

    /// Removes a listener. Returns `false` if it was not registered on this
    /// object.
    pub fn remove_listener(&mut self, handle: Handle, id: ListenerId) -> Result<bool, StageError> {
        let idx = self.check(handle)?;
        for entries in self.listeners[idx as usize].by_type.values_mut() {
            if let Some(pos) = entries.iter().position(|e| e.id == id) {
                entries.remove(pos);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Number of listeners registered on an object.
    pub fn listener_count(&self, handle: Handle) -> Result<usize, StageError> {
        let idx = self.check(handle)?;
        Ok(self.listeners[idx as usize].len())
    }

    // -- Dispatch API --

    /// Dispatches an event to `target` through capture, target, and bubble
    /// phases.
    ///
    /// Fails with [`TargetNotFound`](StageError::TargetNotFound), invoking
    /// nothing, if `target` does not resolve. A retained target still gets
    /// its target phase, but retained ancestors are skipped in capture and
    /// bubble. Listener failures are collected in the report.
    pub fn dispatch(
        &mut self,
        target: Handle,
        event_type: &EventType,
        payload: Variant,
    ) -> Result<DispatchReport, StageError> {
        let idx = self
            .check(target)
            .map_err(|_| StageError::TargetNotFound(target))?;
        let event = Event::new(event_type.clone(), payload, Some(target));
        Ok(self.propagate(idx, event))
    }

    /// Hit-tests `world_point` below `root`, then dispatches to the object
    /// found. Returns the target along with the report.
    ///
    /// Each visited object sees the point in its own local space through
    /// [`Event::local_point`].
    pub fn dispatch_at(
        &mut self,
        root: Handle,
        world_point: Point,
        event_type: &EventType,
        payload: Variant,
    ) -> Result<(Handle, DispatchReport), StageError> {
        let target = self
            .hit_test(root, world_point)
            .map_err(|_| StageError::TargetNotFound(root))?;
        let mut event = Event::new(event_type.clone(), payload, Some(target));
        event.world_point = Some(world_point);
        Ok((target, self.propagate(target.idx, event)))
    }

    /// Visits `root` and its live descendants in depth-first pre-order,
    /// parents before children, each exactly once.
    ///
    /// A retained root visits nothing.
    pub fn broadcast_tree(
        &mut self,
        root: Handle,
        event_type: &EventType,
        payload: Variant,
    ) -> Result<DispatchReport, StageError> {
        self.check(root).map_err(|_| StageError::TargetNotFound(root))?;
        let mut event = Event::new(event_type.clone(), payload, None);
        event.phase = Phase::Broadcast;
        self.trace_begin(DispatchMode::Tree, &event, Some(root));

        let mut report = DispatchReport::default();
        let mut seen = HashSet::new();
        let mut stack = alloc::vec![root];
        while let Some(handle) = stack.pop() {
            if event.propagation_stopped {
                break;
            }
            let Some(idx) = self.live_idx(handle) else {
                continue;
            };
            if !seen.insert(handle) {
                continue;
            }
            let children: Vec<Handle> = self
                .child_indices(idx)
                .into_iter()
                .rev()
                .map(|c| self.handle_of(c))
                .collect();
            self.visit(idx, &mut event, Select::Bubble, &mut report);
            stack.extend(children);
        }

        report.stopped = event.propagation_stopped;
        self.trace_end(DispatchMode::Tree, &event, &report);
        Ok(report)
    }

    /// Visits every object in slot order, regardless of tree membership.
    ///
    /// Retained objects are visited only when `include_retained` is set.
    pub fn broadcast_global(
        &mut self,
        event_type: &EventType,
        payload: Variant,
        include_retained: bool,
    ) -> DispatchReport {
        let mut event = Event::new(event_type.clone(), payload, None);
        event.phase = Phase::Broadcast;
        self.trace_begin(DispatchMode::Global, &event, None);

        let targets: Vec<Handle> = (0..self.len)
            .filter(|&i| match self.state[i as usize] {
                SlotState::Live => true,
                SlotState::Retained(_) => include_retained,
                SlotState::Vacant => false,
            })
            .map(|i| self.handle_of(i))
            .collect();

        let mut report = DispatchReport::default();
        for handle in targets {
            if event.propagation_stopped {
                break;
            }
            if self.is_alive(handle) && (include_retained || !self.is_retained(handle)) {
                self.visit(handle.idx, &mut event, Select::Bubble, &mut report);
            }
        }

        report.stopped = event.propagation_stopped;
        self.trace_end(DispatchMode::Global, &event, &report);
        report
    }

    /// Delivers queued [`ATTACHED`](EventType::ATTACHED) and
    /// [`DETACHED`](EventType::DETACHED) notifications.
    ///
    /// Notifications queued by listeners during the flush wait for the next
    /// one. Notifications for objects reclaimed in the meantime are dropped.
    pub fn flush_notifications(&mut self) -> DispatchReport {
        let mut report = DispatchReport::default();
        for (event_type, target) in mem::take(&mut self.notifications) {
            if let Ok(r) = self.dispatch(target, &event_type, Variant::Null) {
                report.absorb(r);
            }
        }
        report
    }

    // -- Internal helpers --

    pub(crate) fn queue_notification(&mut self, event_type: EventType, idx: u32) {
        if self.config.lifecycle_events {
            let handle = self.handle_of(idx);
            self.notifications.push((event_type, handle));
        }
    }

    /// Capture, target, and bubble along the ancestor chain of `idx`.
    fn propagate(&mut self, idx: u32, mut event: Event) -> DispatchReport {
        let target = self.handle_of(idx);
        let mut path = Vec::new();
        let mut cur = self.parent[idx as usize];
        while cur != INVALID {
            path.push(self.handle_of(cur));
            cur = self.parent[cur as usize];
        }
        path.reverse();

        self.trace_begin(DispatchMode::Propagate, &event, Some(target));
        let mut report = DispatchReport::default();

        event.phase = Phase::Capture;
        for &handle in &path {
            if event.propagation_stopped {
                break;
            }
            if let Some(i) = self.live_idx(handle) {
                self.visit(i, &mut event, Select::Capture, &mut report);
            }
        }

        if !event.propagation_stopped && self.is_alive(target) {
            event.phase = Phase::Target;
            self.visit(idx, &mut event, Select::Both, &mut report);
        }

        event.phase = Phase::Bubble;
        for &handle in path.iter().rev() {
            if event.propagation_stopped {
                break;
            }
            if let Some(i) = self.live_idx(handle) {
                self.visit(i, &mut event, Select::Bubble, &mut report);
            }
        }

        report.stopped = event.propagation_stopped;
        self.trace_end(DispatchMode::Propagate, &event, &report);
        report
    }

    /// Runs the selected listeners of one object.
    fn visit(&mut self, idx: u32, event: &mut Event, select: Select, report: &mut DispatchReport) {
        let current = self.handle_of(idx);
        event.current = current;
        if let Some(world) = event.world_point {
            event.local_point = Some(self.world_to_local_idx(idx, world));
        }
        report.visited += 1;

        let listeners = self.listeners[idx as usize].snapshot(event.event_type().id(), select);
        for (id, callback) in listeners {
            if event.immediate_stopped || !self.is_alive(current) {
                break;
            }
            let outcome = match callback.try_borrow_mut() {
                Ok(mut f) => {
                    report.invoked += 1;
                    (&mut *f)(self, event)
                }
                Err(_) => Err(ListenerError::new("listener is already running")),
            };
            if let Err(error) = outcome {
                let failure = ListenerFailure {
                    event_type: event.event_type().clone(),
                    phase: event.phase,
                    current,
                    listener: id,
                    error,
                };
                self.tracer.listener_failure(&failure);
                report.failures.push(failure);
            }
        }
    }

    fn world_to_local_idx(&mut self, idx: u32, world: Point) -> Point {
        let handle = self.handle_of(idx);
        self.world_to_local(handle, world).unwrap_or(world)
    }

    fn trace_begin(&mut self, mode: DispatchMode, event: &Event, target: Option<Handle>) {
        self.tracer.dispatch_begin(&DispatchBeginEvent {
            mode,
            event_id: event.event_type().id(),
            target,
        });
    }

    fn trace_end(&mut self, mode: DispatchMode, event: &Event, report: &DispatchReport) {
        self.tracer.dispatch_end(&DispatchEndEvent {
            mode,
            event_id: event.event_type().id(),
            visited: report.visited,
            invoked: report.invoked,
            failures: report.failures.len(),
            stopped: report.stopped,
        });
    }
}
