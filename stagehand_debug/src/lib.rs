// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, and JSON export for stagehand diagnostics.
//!
//! This crate provides [`TraceSink`](stagehand_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`] writes one human-readable line per event.
//! - [`recorder::RecorderSink`] keeps events in memory as
//!   [`recorder::TraceRecord`]s, readable through a shared
//!   [`recorder::Recording`] while the stage owns the sink.
//! - [`json`] exports recordings and tree snapshots, and converts
//!   [`Variant`](stagehand_core::Variant)s to and from JSON for scripting
//!   hosts.

pub mod json;
pub mod pretty;
pub mod recorder;
