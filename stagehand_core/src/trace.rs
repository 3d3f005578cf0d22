// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for stage mutations and event dispatch.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! stage calls as objects are created, moved, retained, reclaimed, and as
//! events are dispatched. All method bodies default to no-ops, so
//! implementing only the events you care about is fine.
//!
//! [`Tracer`] owns an optional boxed `TraceSink` and lives inside the
//! [`Stage`](crate::stage::Stage). When the `trace` feature is **off**, every
//! `Tracer` method compiles to nothing and installed sinks are dropped. When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates [`BoundsEvent`] and the
//!   corresponding `TraceSink` method, emitted once per recomputed object.

use alloc::boxed::Box;

use crate::event::{DispatchMode, ListenerFailure};
use crate::handle::Handle;
use crate::registry::ObjectKind;
use crate::stage::RetentionPolicy;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which structural operation changed the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TreeOp {
    /// A child was linked under a parent.
    Attach,
    /// A child was unlinked from its parent.
    Detach,
    /// A child moved within its parent's child list.
    Reorder,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when an object is created.
#[derive(Clone, Copy, Debug)]
pub struct ObjectCreatedEvent {
    /// Frame counter at creation.
    pub frame: u64,
    /// The new object.
    pub handle: Handle,
    /// Its registered type.
    pub kind: ObjectKind,
}

/// Emitted when a destroyed object enters retention instead of being freed.
#[derive(Clone, Copy, Debug)]
pub struct ObjectRetainedEvent {
    /// Frame counter at destruction.
    pub frame: u64,
    /// The retained object.
    pub handle: Handle,
    /// The policy that applied.
    pub policy: RetentionPolicy,
    /// Number of external references keeping it resolvable.
    pub external_refs: u32,
}

/// Emitted when a slot is freed and its handle stops resolving.
#[derive(Clone, Copy, Debug)]
pub struct ObjectReclaimedEvent {
    /// Frame counter at reclamation.
    pub frame: u64,
    /// The handle that no longer resolves.
    pub handle: Handle,
}

/// Emitted for attach, detach, and reorder operations.
#[derive(Clone, Copy, Debug)]
pub struct TreeEvent {
    /// Frame counter at the mutation.
    pub frame: u64,
    /// What happened.
    pub op: TreeOp,
    /// The object that moved.
    pub child: Handle,
    /// The parent involved (the old parent for detach).
    pub parent: Option<Handle>,
}

/// Marks the beginning of a dispatch.
#[derive(Clone, Copy, Debug)]
pub struct DispatchBeginEvent {
    /// Traversal mode.
    pub mode: DispatchMode,
    /// Numeric id of the event type.
    pub event_id: u32,
    /// Target or broadcast root, if any.
    pub target: Option<Handle>,
}

/// Marks the end of a dispatch.
#[derive(Clone, Copy, Debug)]
pub struct DispatchEndEvent {
    /// Traversal mode.
    pub mode: DispatchMode,
    /// Numeric id of the event type.
    pub event_id: u32,
    /// Number of objects visited.
    pub visited: usize,
    /// Number of listener invocations.
    pub invoked: usize,
    /// Number of listener failures.
    pub failures: usize,
    /// Whether a listener stopped propagation.
    pub stopped: bool,
}

/// Emitted whenever cached bounds are recomputed (requires `trace-rich`).
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct BoundsEvent {
    /// The object whose bounds were recomputed.
    pub handle: Handle,
    /// The new bounds, in the parent's content space.
    pub bounds: kurbo::Rect,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from a stage.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when an object is created.
    fn on_object_created(&mut self, e: &ObjectCreatedEvent) {
        _ = e;
    }

    /// Called when a destroyed object is retained.
    fn on_object_retained(&mut self, e: &ObjectRetainedEvent) {
        _ = e;
    }

    /// Called when a slot is freed.
    fn on_object_reclaimed(&mut self, e: &ObjectReclaimedEvent) {
        _ = e;
    }

    /// Called after each structural mutation.
    fn on_tree(&mut self, e: &TreeEvent) {
        _ = e;
    }

    /// Called before the first listener of a dispatch runs.
    fn on_dispatch_begin(&mut self, e: &DispatchBeginEvent) {
        _ = e;
    }

    /// Called after the last listener of a dispatch returns.
    fn on_dispatch_end(&mut self, e: &DispatchEndEvent) {
        _ = e;
    }

    /// Called when a listener reports an error.
    fn on_listener_failure(&mut self, failure: &ListenerFailure) {
        _ = failure;
    }

    /// Called when cached bounds are recomputed (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_bounds(&mut self, e: &BoundsEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Owning wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
#[derive(Default)]
pub struct Tracer {
    #[cfg(feature = "trace")]
    sink: Option<Box<dyn TraceSink>>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl Tracer {
    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: Box<dyn TraceSink>) -> Self {
        let mut tracer = Self::none();
        tracer.set_sink(sink);
        tracer
    }

    /// Installs a sink, returning the previous one.
    ///
    /// Without the `trace` feature the sink is dropped and `None` returned.
    #[inline]
    pub fn set_sink(&mut self, sink: Box<dyn TraceSink>) -> Option<Box<dyn TraceSink>> {
        #[cfg(feature = "trace")]
        {
            self.sink.replace(sink)
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            None
        }
    }

    /// Removes and returns the installed sink.
    #[inline]
    pub fn take_sink(&mut self) -> Option<Box<dyn TraceSink>> {
        #[cfg(feature = "trace")]
        {
            self.sink.take()
        }
        #[cfg(not(feature = "trace"))]
        {
            None
        }
    }

    /// Returns `true` if events reach a sink.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        #[cfg(feature = "trace")]
        {
            self.sink.is_some()
        }
        #[cfg(not(feature = "trace"))]
        {
            false
        }
    }

    /// Emits an [`ObjectCreatedEvent`].
    #[inline]
    pub fn object_created(&mut self, e: &ObjectCreatedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_object_created(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`ObjectRetainedEvent`].
    #[inline]
    pub fn object_retained(&mut self, e: &ObjectRetainedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_object_retained(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`ObjectReclaimedEvent`].
    #[inline]
    pub fn object_reclaimed(&mut self, e: &ObjectReclaimedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_object_reclaimed(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`TreeEvent`].
    #[inline]
    pub fn tree(&mut self, e: &TreeEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_tree(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`DispatchBeginEvent`].
    #[inline]
    pub fn dispatch_begin(&mut self, e: &DispatchBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_dispatch_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`DispatchEndEvent`].
    #[inline]
    pub fn dispatch_end(&mut self, e: &DispatchEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_dispatch_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Forwards a listener failure.
    #[inline]
    pub fn listener_failure(&mut self, failure: &ListenerFailure) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_listener_failure(failure);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = failure;
        }
    }

    /// Emits a [`BoundsEvent`] (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn bounds(&mut self, e: &BoundsEvent) {
        if let Some(s) = &mut self.sink {
            s.on_bounds(e);
        }
    }
}
