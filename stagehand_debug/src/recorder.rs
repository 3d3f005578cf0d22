// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory event recording.
//!
//! [`RecorderSink`] implements [`TraceSink`] and appends every event to a
//! log as a [`TraceRecord`]. Once the sink is installed the stage owns it, so
//! the log is shared: grab a [`Recording`] with [`RecorderSink::recording`]
//! before handing the sink over and read it whenever you like.

use std::cell::RefCell;
use std::rc::Rc;

use stagehand_core::event::ListenerFailure;
use stagehand_core::trace::{
    BoundsEvent, DispatchBeginEvent, DispatchEndEvent, ObjectCreatedEvent, ObjectReclaimedEvent,
    ObjectRetainedEvent, TraceSink, TreeEvent,
};

/// One recorded trace event.
#[derive(Clone, Debug)]
pub enum TraceRecord {
    /// An object was created.
    Created(ObjectCreatedEvent),
    /// A destroyed object entered retention.
    Retained(ObjectRetainedEvent),
    /// A slot was freed.
    Reclaimed(ObjectReclaimedEvent),
    /// The tree changed shape.
    Tree(TreeEvent),
    /// A dispatch started.
    DispatchBegin(DispatchBeginEvent),
    /// A dispatch finished.
    DispatchEnd(DispatchEndEvent),
    /// A listener returned an error.
    ListenerFailure(ListenerFailure),
    /// Cached bounds were recomputed.
    Bounds(BoundsEvent),
}

impl TraceRecord {
    /// Short category name, shared by the pretty printer and JSON export.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created(_) => "create",
            Self::Retained(_) => "retain",
            Self::Reclaimed(_) => "reclaim",
            Self::Tree(_) => "tree",
            Self::DispatchBegin(_) => "dispatch:begin",
            Self::DispatchEnd(_) => "dispatch:end",
            Self::ListenerFailure(_) => "listener:fail",
            Self::Bounds(_) => "bounds",
        }
    }
}

/// Shared read access to the log of a [`RecorderSink`].
#[derive(Clone, Debug, Default)]
pub struct Recording {
    log: Rc<RefCell<Vec<TraceRecord>>>,
}

impl Recording {
    /// Copies out everything recorded so far.
    #[must_use]
    pub fn records(&self) -> Vec<TraceRecord> {
        self.log.borrow().clone()
    }

    /// Removes and returns everything recorded so far.
    #[must_use]
    pub fn take(&self) -> Vec<TraceRecord> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }

    /// Discards all records.
    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    fn push(&self, record: TraceRecord) {
        self.log.borrow_mut().push(record);
    }
}

/// A [`TraceSink`] that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecorderSink {
    recording: Recording,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to this sink's log.
    #[must_use]
    pub fn recording(&self) -> Recording {
        self.recording.clone()
    }
}

impl TraceSink for RecorderSink {
    fn on_object_created(&mut self, e: &ObjectCreatedEvent) {
        self.recording.push(TraceRecord::Created(*e));
    }

    fn on_object_retained(&mut self, e: &ObjectRetainedEvent) {
        self.recording.push(TraceRecord::Retained(*e));
    }

    fn on_object_reclaimed(&mut self, e: &ObjectReclaimedEvent) {
        self.recording.push(TraceRecord::Reclaimed(*e));
    }

    fn on_tree(&mut self, e: &TreeEvent) {
        self.recording.push(TraceRecord::Tree(*e));
    }

    fn on_dispatch_begin(&mut self, e: &DispatchBeginEvent) {
        self.recording.push(TraceRecord::DispatchBegin(*e));
    }

    fn on_dispatch_end(&mut self, e: &DispatchEndEvent) {
        self.recording.push(TraceRecord::DispatchEnd(*e));
    }

    fn on_listener_failure(&mut self, failure: &ListenerFailure) {
        self.recording.push(TraceRecord::ListenerFailure(failure.clone()));
    }

    fn on_bounds(&mut self, e: &BoundsEvent) {
        self.recording.push(TraceRecord::Bounds(*e));
    }
}
