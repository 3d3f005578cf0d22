// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy.
//!
//! Construction errors ([`UnknownType`](StageError::UnknownType),
//! [`PayloadInvalid`](StageError::PayloadInvalid),
//! [`DuplicateType`](StageError::DuplicateType)) are all-or-nothing: when
//! one is returned, no slot was allocated. Tree-mutation errors leave the
//! tree exactly as it was. Listener failures never abort a dispatch; they are
//! collected in a [`DispatchReport`](crate::event::DispatchReport) and can be
//! promoted to [`StageError::Listener`] by the caller.

use alloc::string::String;
use alloc::vec::Vec;

use crate::event::ListenerFailure;
use crate::handle::Handle;

/// Errors reported by [`Stage`](crate::stage::Stage) operations.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum StageError {
    /// `create` was called with a type name nobody registered.
    #[error("unknown object type `{0}`")]
    UnknownType(String),
    /// The configuration did not satisfy the constructor's required shape.
    #[error("invalid configuration for `{type_name}`: {reason}")]
    PayloadInvalid {
        /// Type being constructed.
        type_name: String,
        /// What the constructor rejected.
        reason: String,
    },
    /// `register_type` was called twice with the same name.
    #[error("object type `{0}` is already registered")]
    DuplicateType(String),
    /// The handle is stale or was never issued by this stage.
    #[error("no object for {0:?}")]
    NotFound(Handle),
    /// The mutation would make an object its own ancestor.
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    CycleDetected {
        /// Object being attached.
        child: Handle,
        /// Requested parent.
        parent: Handle,
    },
    /// The parent is awaiting reclamation and cannot accept children.
    #[error("{0:?} is retained for reclamation")]
    Retained(Handle),
    /// A content transform cannot be inverted, so child coordinates could
    /// not be mapped back into the object's space.
    #[error("content transform for {0:?} is not invertible")]
    SingularTransform(Handle),
    /// A dispatch target did not resolve. No listener was invoked.
    #[error("dispatch target {0:?} not found")]
    TargetNotFound(Handle),
    /// One or more listeners failed during a dispatch.
    #[error("{} listener(s) failed during dispatch", .0.len())]
    Listener(Vec<ListenerFailure>),
}
