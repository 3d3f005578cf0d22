// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Retained-mode display-object tree with generational handles, anchor
//! layout, and DOM-style event propagation.
//!
//! `stagehand_core` owns the object graph of an application's scene: which
//! display objects exist, how they are nested, where they sit on screen, and
//! how events travel between them. It is `no_std` compatible (with `alloc`)
//! and stores objects in struct-of-arrays slots addressed by index handles.
//!
//! # Architecture
//!
//! Everything lives in one [`Stage`](stage::Stage):
//!
//! ```text
//!   register_type(name, ctor)          Variant config
//!            │                               │
//!            ▼                               ▼
//!   TypeRegistry ──────────────► Stage::create() ──► Handle
//!                                            │
//!        attach / detach / reparent ◄────────┤
//!                    │                       │
//!                    ▼                       ▼
//!   DirtyTracker (LAYOUT, TOPOLOGY)    destroy() ──► retention ──► tick()
//!                    │
//!                    ▼
//!   compute_bounds() (lazy) ◄──── hit_test() / local_to_world()
//!                                            │
//!                                            ▼
//!   dispatch() / dispatch_at() / broadcast_tree() / broadcast_global()
//! ```
//!
//! **[`variant`]**: Tagged-union value used for configuration, properties,
//! and event payloads.
//!
//! **[`handle`]**: Generational [`Handle`](handle::Handle)s. A handle whose
//! slot has been freed and reused never resolves to the new occupant.
//!
//! **[`registry`]**: Name-to-constructor registry that turns a Variant
//! configuration into a [`Blueprint`](registry::Blueprint).
//!
//! **[`anchor`]**: The nine-point anchor model and the pure function that
//! resolves an [`AnchorSpec`](anchor::AnchorSpec) against a reference frame.
//!
//! **[`stage`]**: The object directory, display tree, lazy layout cache,
//! orphan retention, and the four event traversal modes.
//!
//! **[`event`]**: Event types, phases, listener records, and dispatch
//! reports.
//!
//! **[`dirty`]**: Dirty-tracking channels via `understory_dirty`.
//!
//! **[`clock`]**: Frame/host-time stamps used for grace-period retention.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! lifecycle and dispatch instrumentation, with a zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-object
//!   layout events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod anchor;
pub mod clock;
pub mod config;
pub mod dirty;
pub mod error;
pub mod event;
pub mod handle;
pub mod registry;
pub mod stage;
pub mod trace;
pub mod variant;

pub use error::StageError;
pub use handle::Handle;
pub use stage::Stage;
pub use variant::Variant;
