// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The display-object store.
//!
//! A [`Stage`] owns every display object. Each object has:
//!
//! - An identity ([`Handle`]): a generational handle that stops resolving
//!   once the object's slot is reclaimed, even if the slot is reused.
//! - A kind ([`ObjectKind`]) and a property map, both produced by the
//!   constructor registered for its type name.
//! - Topology: parent, first-child, and sibling links forming an ordered
//!   tree. Sibling order is draw order (later siblings on top).
//! - An [`AnchorSpec`] and a content transform, from which bounds are
//!   computed lazily (see [`compute_bounds`](Stage::compute_bounds)).
//! - Capture and bubble listener lists keyed by event type.
//! - A [`RetentionPolicy`] deciding how long it stays resolvable after
//!   [`destroy`](Stage::destroy).
//!
//! Objects are stored in struct-of-arrays layout with index-based handles.
//!
//! # Coordinate spaces
//!
//! An object's bounds are expressed in its parent's *content space*. A root's
//! content space is world space. An object maps its content space into its
//! own parent's space through its content transform, pivoting on its bounds'
//! top-left corner; with identity content transforms every space is world
//! space. The *local space* of an object has its origin at the top-left of
//! its bounds.
//!
//! # Dirty tracking
//!
//! Mutations mark [`dirty`](crate::dirty) channels:
//!
//! - **LAYOUT**: anchor, frame, content transform, and tree-position
//!   changes. Propagates to all descendants.
//! - **TOPOLOGY**: structural and visibility changes; drained by
//!   [`update_layout`](Stage::update_layout) to rebuild the draw order.

mod dispatch;
mod layout;
mod lifecycle;
mod traverse;
mod tree;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Affine, Rect};
use understory_dirty::{CycleHandling, DirtyTracker};

use crate::anchor::AnchorSpec;
use crate::clock::FrameStamp;
use crate::config::StageConfig;
use crate::dirty;
use crate::error::StageError;
use crate::event::{EventType, EventTypes};
use crate::handle::{Handle, INVALID};
use crate::registry::{Blueprint, ObjectKind, TypeRegistry};
use crate::trace::{ObjectCreatedEvent, TraceSink, Tracer};
use crate::variant::Variant;

pub(crate) use dispatch::ListenerTable;
pub use layout::LayoutChanges;
pub(crate) use lifecycle::SlotState;
pub use lifecycle::{FrameChanges, RetentionPolicy};
pub use traverse::Children;

/// Struct-of-arrays storage for all display objects.
pub struct Stage {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Object data (set by constructors and callers) --
    pub(crate) kind: Vec<ObjectKind>,
    pub(crate) anchor: Vec<AnchorSpec>,
    pub(crate) content_transform: Vec<Affine>,
    pub(crate) hidden: Vec<bool>,
    pub(crate) properties: Vec<BTreeMap<String, Variant>>,
    pub(crate) listeners: Vec<ListenerTable>,

    // -- Layout cache --
    pub(crate) bounds: Vec<Rect>,
    pub(crate) bounds_dirty: Vec<bool>,
    pub(crate) layout_pending: bool,

    // -- Lifetime --
    pub(crate) state: Vec<SlotState>,
    pub(crate) retention: Vec<RetentionPolicy>,
    pub(crate) external_refs: Vec<u32>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,

    // -- Draw-order cache --
    pub(crate) draw_order: Vec<u32>,

    // -- Change tracking --
    pub(crate) pending_added: Vec<Handle>,
    pub(crate) pending_retained: Vec<Handle>,
    pub(crate) pending_reclaimed: Vec<Handle>,
    pub(crate) notifications: Vec<(EventType, Handle)>,

    // -- Services --
    registry: TypeRegistry,
    event_types: EventTypes,
    pub(crate) config: StageConfig,
    pub(crate) now: FrameStamp,
    pub(crate) next_listener: u64,
    pub(crate) tracer: Tracer,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("objects", &self.object_count())
            .field("slots", &self.len)
            .field("frame", &self.config.frame)
            .field("now", &self.now)
            .field("registry", &self.registry)
            .field("tracer", &self.tracer)
            .finish_non_exhaustive()
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage {
    /// Creates an empty stage with [`StageConfig::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StageConfig::default())
    }

    /// Creates an empty stage.
    #[must_use]
    pub fn with_config(config: StageConfig) -> Self {
        let registry = if config.builtin_types {
            TypeRegistry::with_builtins()
        } else {
            TypeRegistry::new()
        };
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            kind: Vec::new(),
            anchor: Vec::new(),
            content_transform: Vec::new(),
            hidden: Vec::new(),
            properties: Vec::new(),
            listeners: Vec::new(),
            bounds: Vec::new(),
            bounds_dirty: Vec::new(),
            layout_pending: false,
            state: Vec::new(),
            retention: Vec::new(),
            external_refs: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            draw_order: Vec::new(),
            pending_added: Vec::new(),
            pending_retained: Vec::new(),
            pending_reclaimed: Vec::new(),
            notifications: Vec::new(),
            registry,
            event_types: EventTypes::default(),
            config,
            now: FrameStamp::default(),
            next_listener: 0,
            tracer: Tracer::none(),
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Frame counter and host time of the most recent [`tick`](Self::tick).
    #[must_use]
    pub fn now(&self) -> FrameStamp {
        self.now
    }

    // -- Services --

    /// The type registry.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Registers a constructor under `name`.
    ///
    /// Fails with [`StageError::DuplicateType`] if `name` is taken.
    pub fn register_type<F>(&mut self, name: &str, ctor: F) -> Result<ObjectKind, StageError>
    where
        F: Fn(&Variant) -> Result<Blueprint, String> + 'static,
    {
        self.registry.register(name, Box::new(ctor))
    }

    /// Returns the event type registered under `name`, registering it first
    /// if needed.
    pub fn event_type(&mut self, name: &str) -> EventType {
        self.event_types.register(name)
    }

    /// The event-type table.
    #[must_use]
    pub fn event_types(&self) -> &EventTypes {
        &self.event_types
    }

    /// Installs a trace sink, returning the previous one.
    ///
    /// Without the `trace` feature, the sink is dropped.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) -> Option<Box<dyn TraceSink>> {
        self.tracer.set_sink(sink)
    }

    /// Removes the installed trace sink.
    pub fn take_trace_sink(&mut self) -> Option<Box<dyn TraceSink>> {
        self.tracer.take_sink()
    }

    // -- Directory API --

    /// Constructs an object of the named type and returns its handle.
    ///
    /// The object starts as a root. Construction is all-or-nothing: on
    /// [`UnknownType`](StageError::UnknownType) or
    /// [`PayloadInvalid`](StageError::PayloadInvalid) no slot is touched.
    pub fn create(&mut self, type_name: &str, config: &Variant) -> Result<Handle, StageError> {
        let (kind, blueprint) = self.registry.construct(type_name, config)?;
        let handle = self.allocate(kind, blueprint);
        self.tracer.object_created(&ObjectCreatedEvent {
            frame: self.now.frame,
            handle,
            kind,
        });
        Ok(handle)
    }

    /// Resolves a handle to a read-only view of its object.
    ///
    /// Retained objects resolve; reclaimed ones fail with
    /// [`NotFound`](StageError::NotFound).
    pub fn resolve(&self, handle: Handle) -> Result<ObjectRef<'_>, StageError> {
        let idx = self.check(handle)?;
        Ok(ObjectRef {
            stage: self,
            idx,
            handle,
        })
    }

    /// Returns `true` if the handle resolves.
    #[must_use]
    pub fn is_alive(&self, handle: Handle) -> bool {
        handle.idx < self.len
            && self.generation[handle.idx as usize] == handle.generation
            && self.state[handle.idx as usize] != SlotState::Vacant
    }

    /// Returns `true` if the handle resolves to a destroyed object awaiting
    /// reclamation.
    #[must_use]
    pub fn is_retained(&self, handle: Handle) -> bool {
        self.is_alive(handle) && self.state[handle.idx as usize].is_retained()
    }

    /// Number of resolvable objects, retained ones included.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.state.iter().filter(|s| **s != SlotState::Vacant).count()
    }

    /// Current handle for a raw slot index, if the slot is occupied.
    ///
    /// Raw indices come from [`draw_order`](Self::draw_order) and
    /// [`LayoutChanges`].
    #[must_use]
    pub fn handle_at(&self, idx: u32) -> Option<Handle> {
        (idx < self.len && self.state[idx as usize] != SlotState::Vacant)
            .then(|| self.handle_of(idx))
    }

    // -- Property API --

    /// Sets a property, returning the previous value.
    pub fn set_property(
        &mut self,
        handle: Handle,
        key: impl Into<String>,
        value: impl Into<Variant>,
    ) -> Result<Option<Variant>, StageError> {
        let idx = self.check(handle)?;
        Ok(self.properties[idx as usize].insert(key.into(), value.into()))
    }

    /// Removes a property, returning its value.
    pub fn remove_property(&mut self, handle: Handle, key: &str) -> Result<Option<Variant>, StageError> {
        let idx = self.check(handle)?;
        Ok(self.properties[idx as usize].remove(key))
    }

    /// Shows or hides an object and its subtree.
    ///
    /// Hidden objects are left out of the draw order and hit testing but
    /// still receive dispatched events.
    pub fn set_hidden(&mut self, handle: Handle, hidden: bool) -> Result<(), StageError> {
        let idx = self.check(handle)?;
        if self.hidden[idx as usize] != hidden {
            self.hidden[idx as usize] = hidden;
            self.dirty.mark(idx, dirty::TOPOLOGY);
        }
        Ok(())
    }

    /// Replaces the retention policy applied when the object is destroyed.
    pub fn set_retention(&mut self, handle: Handle, policy: RetentionPolicy) -> Result<(), StageError> {
        let idx = self.check(handle)?;
        self.retention[idx as usize] = policy;
        Ok(())
    }

    // -- Internal helpers --

    /// Returns the slot index of a resolvable handle.
    pub(crate) fn check(&self, handle: Handle) -> Result<u32, StageError> {
        if self.is_alive(handle) {
            Ok(handle.idx)
        } else {
            Err(StageError::NotFound(handle))
        }
    }

    /// Returns the slot index of a handle whose object is live (not retained).
    pub(crate) fn live_idx(&self, handle: Handle) -> Option<u32> {
        (self.is_alive(handle) && self.state[handle.idx as usize] == SlotState::Live).then_some(handle.idx)
    }

    /// Current handle for an occupied slot.
    pub(crate) fn handle_of(&self, idx: u32) -> Handle {
        Handle::new(idx, self.generation[idx as usize])
    }

    /// Claims a slot and fills it from `blueprint`.
    fn allocate(&mut self, kind: ObjectKind, blueprint: Blueprint) -> Handle {
        let Blueprint {
            anchor,
            content_transform,
            retention,
            hidden,
            properties,
        } = blueprint;
        let retention = retention.unwrap_or(self.config.default_retention);

        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot; its generation moved on when it was freed.
            let i = idx as usize;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.kind[i] = kind;
            self.anchor[i] = anchor;
            self.content_transform[i] = content_transform;
            self.hidden[i] = hidden;
            self.properties[i] = properties;
            self.listeners[i] = ListenerTable::default();
            self.bounds[i] = Rect::ZERO;
            self.bounds_dirty[i] = true;
            self.state[i] = SlotState::Live;
            self.retention[i] = retention;
            self.external_refs[i] = 0;
            idx
        } else {
            // Allocate a new slot.
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.kind.push(kind);
            self.anchor.push(anchor);
            self.content_transform.push(content_transform);
            self.hidden.push(hidden);
            self.properties.push(properties);
            self.listeners.push(ListenerTable::default());
            self.bounds.push(Rect::ZERO);
            self.bounds_dirty.push(true);
            self.state.push(SlotState::Live);
            self.retention.push(retention);
            self.external_refs.push(0);
            self.generation.push(0);
            idx
        };

        let handle = self.handle_of(idx);
        self.pending_added.push(handle);
        self.dirty.mark(idx, dirty::TOPOLOGY);
        handle
    }
}

/// Read-only view of a resolved object.
///
/// Returned by [`Stage::resolve`]; borrows the stage.
#[derive(Clone, Copy)]
pub struct ObjectRef<'a> {
    stage: &'a Stage,
    idx: u32,
    handle: Handle,
}

impl fmt::Debug for ObjectRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("handle", &self.handle)
            .field("type", &self.type_name())
            .field("parent", &self.parent())
            .field("retained", &self.is_retained())
            .finish()
    }
}

impl<'a> ObjectRef<'a> {
    /// The handle this view was resolved from.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Runtime type tag.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.stage.kind[self.idx as usize]
    }

    /// Name the object's type was registered under.
    #[must_use]
    pub fn type_name(&self) -> &'a str {
        self.stage.registry.name(self.kind()).unwrap_or_default()
    }

    /// Parent handle, if attached.
    #[must_use]
    pub fn parent(&self) -> Option<Handle> {
        let p = self.stage.parent[self.idx as usize];
        (p != INVALID).then(|| self.stage.handle_of(p))
    }

    /// Iterator over direct children in sibling order.
    #[must_use]
    pub fn children(&self) -> Children<'a> {
        Children::new(self.stage, self.stage.first_child[self.idx as usize])
    }

    /// All properties.
    #[must_use]
    pub fn properties(&self) -> &'a BTreeMap<String, Variant> {
        &self.stage.properties[self.idx as usize]
    }

    /// A single property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&'a Variant> {
        self.properties().get(key)
    }

    /// Layout rule.
    #[must_use]
    pub fn anchor(&self) -> AnchorSpec {
        self.stage.anchor[self.idx as usize]
    }

    /// Transform applied to children.
    #[must_use]
    pub fn content_transform(&self) -> Affine {
        self.stage.content_transform[self.idx as usize]
    }

    /// The object's own hidden flag (ancestors are not consulted).
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.stage.hidden[self.idx as usize]
    }

    /// Whether the object was destroyed and awaits reclamation.
    #[must_use]
    pub fn is_retained(&self) -> bool {
        self.stage.state[self.idx as usize].is_retained()
    }

    /// Retention policy applied on destroy.
    #[must_use]
    pub fn retention(&self) -> RetentionPolicy {
        self.stage.retention[self.idx as usize]
    }

    /// Number of outstanding external references.
    #[must_use]
    pub fn external_refs(&self) -> u32 {
        self.stage.external_refs[self.idx as usize]
    }

    /// Cached bounds, or `None` if they are stale.
    #[must_use]
    pub fn cached_bounds(&self) -> Option<Rect> {
        self.stage.bounds(self.handle)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::anchor::AnchorPoint;
    use crate::registry::builtin;

    /// A stage with built-in types and a 100×100 frame.
    pub(crate) fn stage() -> Stage {
        Stage::with_config(StageConfig::default().with_frame(Rect::new(0.0, 0.0, 100.0, 100.0)))
    }

    /// Creates a `group` that fills its parent.
    pub(crate) fn group(stage: &mut Stage) -> Handle {
        stage
            .create(builtin::GROUP, &Variant::Null)
            .expect("group constructs from null")
    }

    /// Creates a `rect` placed at `(x, y)` with the given size.
    pub(crate) fn rect(stage: &mut Stage, x: f64, y: f64, w: f64, h: f64) -> Handle {
        let config = Variant::object([
            ("offset-x", Variant::from(x)),
            ("offset-y", Variant::from(y)),
            ("width", Variant::from(w)),
            ("height", Variant::from(h)),
        ]);
        stage.create(builtin::RECT, &config).expect("rect constructs")
    }

    #[test]
    fn create_and_resolve() {
        let mut stage = stage();
        let h = rect(&mut stage, 1.0, 2.0, 3.0, 4.0);
        let obj = stage.resolve(h).unwrap();
        assert_eq!(obj.type_name(), "rect");
        assert_eq!(obj.parent(), None);
        assert!(!obj.is_retained());
        assert_eq!(stage.object_count(), 1);
    }

    #[test]
    fn unknown_type_allocates_nothing() {
        let mut stage = stage();
        let err = stage.create("sprite", &Variant::Null).unwrap_err();
        assert_eq!(err, StageError::UnknownType("sprite".into()));
        assert_eq!(stage.len, 0);
    }

    #[test]
    fn invalid_payload_allocates_nothing() {
        let mut stage = stage();
        let err = stage.create(builtin::RECT, &Variant::Null).unwrap_err();
        assert!(matches!(err, StageError::PayloadInvalid { ref type_name, .. } if type_name == "rect"));
        assert_eq!(stage.len, 0);
        assert_eq!(stage.object_count(), 0);
    }

    #[test]
    fn duplicate_type_rejected() {
        let mut stage = stage();
        let err = stage
            .register_type(builtin::GROUP, |_| Ok(Blueprint::default()))
            .unwrap_err();
        assert_eq!(err, StageError::DuplicateType("group".into()));
    }

    #[test]
    fn custom_type_properties() {
        let mut stage = Stage::with_config(StageConfig::headless());
        let kind = stage
            .register_type("button", |config| {
                let mut blueprint = Blueprint::from_config(config)?;
                blueprint.anchor = AnchorSpec::new(AnchorPoint::Center, AnchorPoint::Center)
                    .with_size(80.0, 24.0);
                blueprint
                    .properties
                    .entry("pressed".into())
                    .or_insert(Variant::Bool(false));
                Ok(blueprint)
            })
            .unwrap();
        let h = stage
            .create("button", &Variant::object([("caption", Variant::from("OK"))]))
            .unwrap();
        let obj = stage.resolve(h).unwrap();
        assert_eq!(obj.kind(), kind);
        assert_eq!(obj.property("caption"), Some(&Variant::from("OK")));
        assert_eq!(obj.property("pressed"), Some(&Variant::Bool(false)));

        let old = stage.set_property(h, "pressed", true).unwrap();
        assert_eq!(old, Some(Variant::Bool(false)));
        assert_eq!(stage.remove_property(h, "caption").unwrap(), Some("OK".into()));
        assert_eq!(stage.resolve(h).unwrap().properties().len(), 1);
    }

    #[test]
    fn handle_at_follows_generation() {
        let mut stage = stage();
        let a = group(&mut stage);
        assert_eq!(stage.handle_at(a.index()), Some(a));
        stage.destroy(a);
        assert_eq!(stage.handle_at(a.index()), None);
        let b = group(&mut stage);
        assert_eq!(stage.handle_at(b.index()), Some(b));
        assert_ne!(Some(a), stage.handle_at(a.index()));
    }
}
