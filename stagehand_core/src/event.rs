// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Events, phases, listeners, and dispatch reports.
//!
//! An [`Event`] is created per dispatch and handed to each visited
//! listener. Its [`Phase`] tells the listener why it is being called:
//!
//! - [`Capture`](Phase::Capture): on an ancestor, walking root to target.
//! - [`Target`](Phase::Target): on the target itself (capture listeners
//!   first, then bubble listeners).
//! - [`Bubble`](Phase::Bubble): on an ancestor, walking target to root.
//! - [`Broadcast`](Phase::Broadcast): during a structural or global
//!   broadcast; only bubble (non-capture) listeners are invoked.
//!
//! Listener failures are collected in a [`DispatchReport`]; they never stop
//! other listeners from running.

use alloc::borrow::Cow;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::hash::{Hash, Hasher};

use hashbrown::HashMap;
use kurbo::Point;

use crate::error::StageError;
use crate::handle::Handle;
use crate::stage::Stage;
use crate::variant::{Variant, VariantError};

/// Identity of an event category.
///
/// Equality and hashing use the numeric id only; the name is for humans.
#[derive(Clone)]
pub struct EventType {
    id: u32,
    name: Cow<'static, str>,
}

impl EventType {
    /// Pointer button pressed.
    pub const POINTER_DOWN: Self = Self::builtin(1, "pointer-down");
    /// Pointer button released.
    pub const POINTER_UP: Self = Self::builtin(2, "pointer-up");
    /// Pointer moved.
    pub const POINTER_MOVE: Self = Self::builtin(3, "pointer-move");
    /// Key pressed.
    pub const KEY_DOWN: Self = Self::builtin(4, "key-down");
    /// Key released.
    pub const KEY_UP: Self = Self::builtin(5, "key-up");
    /// The top-level frame changed size.
    pub const RESIZE: Self = Self::builtin(6, "resize");
    /// The target was attached to a parent.
    pub const ATTACHED: Self = Self::builtin(7, "attached");
    /// The target was detached from its parent.
    pub const DETACHED: Self = Self::builtin(8, "detached");
    /// The application is shutting down.
    pub const SHUTDOWN: Self = Self::builtin(9, "shutdown");
    /// Cached layout was invalidated.
    pub const LAYOUT_INVALIDATED: Self = Self::builtin(10, "layout-invalidated");

    /// All built-in types.
    pub const BUILTINS: [Self; 10] = [
        Self::POINTER_DOWN,
        Self::POINTER_UP,
        Self::POINTER_MOVE,
        Self::KEY_DOWN,
        Self::KEY_UP,
        Self::RESIZE,
        Self::ATTACHED,
        Self::DETACHED,
        Self::SHUTDOWN,
        Self::LAYOUT_INVALIDATED,
    ];

    /// First id handed out to application-registered types.
    pub const FIRST_CUSTOM_ID: u32 = 1000;

    const fn builtin(id: u32, name: &'static str) -> Self {
        Self {
            id,
            name: Cow::Borrowed(name),
        }
    }

    /// Numeric identity.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventType({}:{})", self.id, self.name)
    }
}

/// Name-to-[`EventType`] table shared by a stage.
#[derive(Debug)]
pub struct EventTypes {
    by_name: HashMap<String, EventType>,
    next_id: u32,
}

impl Default for EventTypes {
    fn default() -> Self {
        let mut by_name = HashMap::new();
        for ty in EventType::BUILTINS {
            by_name.insert(String::from(ty.name()), ty);
        }
        Self {
            by_name,
            next_id: EventType::FIRST_CUSTOM_ID,
        }
    }
}

impl EventTypes {
    /// Returns the type registered under `name`, registering it if needed.
    ///
    /// Registering the same name twice yields the same identity.
    pub fn register(&mut self, name: &str) -> EventType {
        if let Some(ty) = self.by_name.get(name) {
            return ty.clone();
        }
        let ty = EventType {
            id: self.next_id,
            name: Cow::Owned(String::from(name)),
        };
        self.next_id += 1;
        self.by_name.insert(String::from(name), ty.clone());
        ty
    }

    /// Looks up a type without registering it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EventType> {
        self.by_name.get(name)
    }
}

/// Where an event is in its dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Walking from the root toward the target.
    Capture,
    /// At the target.
    Target,
    /// Walking from the target back to the root.
    Bubble,
    /// Visiting nodes of a structural or global broadcast.
    Broadcast,
}

/// Which traversal produced a dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DispatchMode {
    /// Depth-first pre-order over a subtree.
    Tree,
    /// Capture, target, and bubble along the target's ancestor chain.
    Propagate,
    /// Every object known to the stage.
    Global,
}

/// An event in flight.
#[derive(Clone, Debug)]
pub struct Event {
    event_type: EventType,
    /// Application data. Listeners may rewrite it for later listeners.
    pub payload: Variant,
    pub(crate) phase: Phase,
    pub(crate) target: Option<Handle>,
    pub(crate) current: Handle,
    pub(crate) world_point: Option<Point>,
    pub(crate) local_point: Option<Point>,
    pub(crate) propagation_stopped: bool,
    pub(crate) immediate_stopped: bool,
}

impl Event {
    pub(crate) fn new(event_type: EventType, payload: Variant, target: Option<Handle>) -> Self {
        let start = target.unwrap_or(Handle::new(crate::handle::INVALID, 0));
        Self {
            event_type,
            payload,
            phase: Phase::Capture,
            target,
            current: start,
            world_point: None,
            local_point: None,
            propagation_stopped: false,
            immediate_stopped: false,
        }
    }

    /// The event's type.
    #[must_use]
    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The designated target, or `None` for broadcasts.
    #[must_use]
    pub fn target(&self) -> Option<Handle> {
        self.target
    }

    /// The object whose listeners are running now.
    #[must_use]
    pub fn current(&self) -> Handle {
        self.current
    }

    /// World-space coordinate the event was dispatched at, if any.
    #[must_use]
    pub fn world_point(&self) -> Option<Point> {
        self.world_point
    }

    /// [`world_point`](Self::world_point) in the current object's local
    /// space (origin at its bounds' top-left).
    #[must_use]
    pub fn local_point(&self) -> Option<Point> {
        self.local_point
    }

    /// Stops the dispatch after the current object's listeners finish.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Stops the dispatch immediately, skipping the current object's
    /// remaining listeners too.
    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_stopped = true;
    }

    /// Returns `true` once a listener stopped propagation.
    #[must_use]
    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// Identifies a registered listener for later removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
    /// Raw value, unique per stage, for diagnostics.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Registration options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ListenerOptions {
    /// Run during the capture phase instead of the bubble phase.
    pub capture: bool,
}

impl ListenerOptions {
    /// Capture-phase registration.
    pub const CAPTURE: Self = Self { capture: true };
    /// Bubble-phase registration.
    pub const BUBBLE: Self = Self { capture: false };
}

/// Error a listener returns to report a failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ListenerError {
    /// Description of the failure.
    pub message: String,
}

impl ListenerError {
    /// Creates an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<VariantError> for ListenerError {
    fn from(err: VariantError) -> Self {
        Self::new(format!("payload: {err}"))
    }
}

impl From<StageError> for ListenerError {
    fn from(err: StageError) -> Self {
        Self::new(format!("{err}"))
    }
}

/// Outcome of a listener invocation.
pub type ListenerResult = Result<(), ListenerError>;

/// A listener callback.
///
/// Listeners receive the stage mutably, so they may mutate the tree or start
/// nested dispatches.
pub type ListenerFn = dyn FnMut(&mut Stage, &mut Event) -> ListenerResult;

/// A listener failure captured during a dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct ListenerFailure {
    /// Type of the event being dispatched.
    pub event_type: EventType,
    /// Phase the listener ran in.
    pub phase: Phase,
    /// Object the listener is registered on.
    pub current: Handle,
    /// The failing listener.
    pub listener: ListenerId,
    /// What it reported.
    pub error: ListenerError,
}

/// Summary of one dispatch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DispatchReport {
    /// Number of objects visited.
    pub visited: usize,
    /// Number of listener invocations.
    pub invoked: usize,
    /// Whether a listener stopped propagation.
    pub stopped: bool,
    /// Failures collected in invocation order.
    pub failures: Vec<ListenerFailure>,
}

impl DispatchReport {
    /// Returns `true` if no listener failed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Converts collected failures into [`StageError::Listener`].
    pub fn into_result(self) -> Result<Self, StageError> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(StageError::Listener(self.failures))
        }
    }

    /// Folds another report into this one.
    pub fn absorb(&mut self, other: Self) {
        self.visited += other.visited;
        self.invoked += other.invoked;
        self.stopped |= other.stopped;
        self.failures.extend(other.failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_by_id() {
        let mut types = EventTypes::default();
        let a = types.register("score-changed");
        let b = types.register("score-changed");
        let c = types.register("level-up");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.id(), EventType::FIRST_CUSTOM_ID);
        assert_eq!(c.id(), EventType::FIRST_CUSTOM_ID + 1);
    }

    #[test]
    fn builtins_are_preregistered() {
        let mut types = EventTypes::default();
        assert_eq!(types.register("pointer-down"), EventType::POINTER_DOWN);
        assert_eq!(types.get("shutdown"), Some(&EventType::SHUTDOWN));
        assert!(types.get("unknown").is_none());
    }

    #[test]
    fn stop_flags() {
        let mut event = Event::new(EventType::KEY_DOWN, Variant::Null, None);
        event.stop_propagation();
        assert!(event.is_propagation_stopped());
        assert!(!event.immediate_stopped);
        event.stop_immediate_propagation();
        assert!(event.immediate_stopped);
    }

    #[test]
    fn report_into_result() {
        let mut report = DispatchReport::default();
        assert!(report.clone().into_result().is_ok());
        report.failures.push(ListenerFailure {
            event_type: EventType::KEY_UP,
            phase: Phase::Target,
            current: Handle::new(0, 0),
            listener: ListenerId(1),
            error: ListenerError::new("nope"),
        });
        assert!(matches!(
            report.into_result(),
            Err(StageError::Listener(ref f)) if f.len() == 1
        ));
    }
}
