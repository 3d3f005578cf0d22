// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use stagehand_core::Handle;
use stagehand_core::event::{DispatchMode, ListenerFailure};
use stagehand_core::trace::{
    BoundsEvent, DispatchBeginEvent, DispatchEndEvent, ObjectCreatedEvent, ObjectReclaimedEvent,
    ObjectRetainedEvent, TraceSink, TreeEvent, TreeOp,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

fn mode_name(mode: DispatchMode) -> &'static str {
    match mode {
        DispatchMode::Tree => "tree",
        DispatchMode::Propagate => "propagate",
        DispatchMode::Global => "global",
    }
}

fn op_name(op: TreeOp) -> &'static str {
    match op {
        TreeOp::Attach => "attach",
        TreeOp::Detach => "detach",
        TreeOp::Reorder => "reorder",
    }
}

struct Target(Option<Handle>);

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(h) => write!(f, "{h}"),
            None => f.write_str("-"),
        }
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_object_created(&mut self, e: &ObjectCreatedEvent) {
        let _ = writeln!(
            self.writer,
            "[create] frame={} {} kind={}",
            e.frame,
            e.handle,
            e.kind.id(),
        );
    }

    fn on_object_retained(&mut self, e: &ObjectRetainedEvent) {
        let _ = writeln!(
            self.writer,
            "[retain] frame={} {} policy={:?} refs={}",
            e.frame, e.handle, e.policy, e.external_refs,
        );
    }

    fn on_object_reclaimed(&mut self, e: &ObjectReclaimedEvent) {
        let _ = writeln!(self.writer, "[reclaim] frame={} {}", e.frame, e.handle);
    }

    fn on_tree(&mut self, e: &TreeEvent) {
        let _ = writeln!(
            self.writer,
            "[tree:{}] frame={} {} parent={}",
            op_name(e.op),
            e.frame,
            e.child,
            Target(e.parent),
        );
    }

    fn on_dispatch_begin(&mut self, e: &DispatchBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[dispatch:begin] {} event={} target={}",
            mode_name(e.mode),
            e.event_id,
            Target(e.target),
        );
    }

    fn on_dispatch_end(&mut self, e: &DispatchEndEvent) {
        let stopped = if e.stopped { " STOPPED" } else { "" };
        let _ = writeln!(
            self.writer,
            "[dispatch:end] {} event={} visited={} invoked={} failures={}{stopped}",
            mode_name(e.mode),
            e.event_id,
            e.visited,
            e.invoked,
            e.failures,
        );
    }

    fn on_listener_failure(&mut self, failure: &ListenerFailure) {
        let _ = writeln!(
            self.writer,
            "[listener:fail] event={} phase={:?} at {} listener={}: {}",
            failure.event_type.name(),
            failure.phase,
            failure.current,
            failure.listener.get(),
            failure.error,
        );
    }

    fn on_bounds(&mut self, e: &BoundsEvent) {
        let r = e.bounds;
        let _ = writeln!(
            self.writer,
            "[bounds] {} ({:.1}, {:.1}) {:.1}x{:.1}",
            e.handle,
            r.x0,
            r.y0,
            r.width(),
            r.height(),
        );
    }
}
