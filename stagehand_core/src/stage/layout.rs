// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lazy anchor layout and coordinate conversion.
//!
//! Layout follows a mark-then-pull pattern:
//!
//! 1. Mutations record LAYOUT marks in the dirty tracker with eager
//!    propagation, so a marked object's whole subtree is affected.
//! 2. The first bounds request afterwards drains the channel into per-slot
//!    cached-bounds flags.
//! 3. [`compute_bounds`](Stage::compute_bounds) recomputes only the stale
//!    chain from the requested object up to its nearest clean ancestor,
//!    top-down.
//!
//! Coordinate conversion (local ↔ world) walks from an object to its root,
//! composing each ancestor's content-space mapping. It never invokes
//! listeners.

use alloc::vec::Vec;

use kurbo::{Affine, Point, Rect};
use understory_dirty::EagerPolicy;

use crate::anchor::AnchorSpec;
use crate::dirty;
use crate::error::StageError;
use crate::handle::{Handle, INVALID};

use super::{SlotState, Stage};

/// The result of a single [`Stage::update_layout`] call.
///
/// Indices are raw slot indices, usable with [`Stage::handle_at`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LayoutChanges {
    /// Objects whose bounds were recomputed, parents before children.
    pub recomputed: Vec<u32>,
    /// Whether the draw order was rebuilt.
    pub topology_changed: bool,
}

impl Stage {
    // -- Frame and anchor API --

    /// The top-level frame roots anchor against.
    #[must_use]
    pub fn frame(&self) -> Rect {
        self.config.frame
    }

    /// Replaces the top-level frame, invalidating every root's layout.
    pub fn set_frame(&mut self, frame: Rect) {
        if self.config.frame == frame {
            return;
        }
        self.config.frame = frame;
        for idx in 0..self.len {
            if self.parent[idx as usize] == INVALID && self.state[idx as usize] != SlotState::Vacant {
                self.invalidate_layout(idx);
            }
        }
    }

    /// Returns an object's layout rule.
    pub fn anchor(&self, handle: Handle) -> Result<AnchorSpec, StageError> {
        let idx = self.check(handle)?;
        Ok(self.anchor[idx as usize])
    }

    /// Replaces an object's layout rule, invalidating its subtree.
    pub fn set_anchor(&mut self, handle: Handle, anchor: AnchorSpec) -> Result<(), StageError> {
        let idx = self.check(handle)?;
        if self.anchor[idx as usize] != anchor {
            self.anchor[idx as usize] = anchor;
            self.invalidate_layout(idx);
        }
        Ok(())
    }

    /// Returns the transform an object applies to its children.
    pub fn content_transform(&self, handle: Handle) -> Result<Affine, StageError> {
        let idx = self.check(handle)?;
        Ok(self.content_transform[idx as usize])
    }

    /// Replaces the transform applied to an object's children.
    ///
    /// The transform pivots on the object's top-left corner. Its children
    /// are laid out against the object's bounds mapped back through it, so
    /// a scale of 2 gives children half the space, drawn twice as large.
    ///
    /// Fails with [`SingularTransform`](StageError::SingularTransform) if the
    /// transform cannot be inverted.
    pub fn set_content_transform(&mut self, handle: Handle, transform: Affine) -> Result<(), StageError> {
        let idx = self.check(handle)?;
        let det = transform.determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(StageError::SingularTransform(handle));
        }
        if self.content_transform[idx as usize] != transform {
            self.content_transform[idx as usize] = transform;
            self.invalidate_layout(idx);
        }
        Ok(())
    }

    // -- Bounds API --

    /// Returns an object's bounds in its parent's content space,
    /// recomputing stale bounds along its ancestor chain first.
    pub fn compute_bounds(&mut self, handle: Handle) -> Result<Rect, StageError> {
        let idx = self.check(handle)?;
        self.sync_layout();
        Ok(self.ensure_bounds(idx))
    }

    /// Returns an object's cached bounds without recomputing.
    ///
    /// `None` if the handle is stale or the cached value may be out of date.
    #[must_use]
    pub fn bounds(&self, handle: Handle) -> Option<Rect> {
        let idx = self.check(handle).ok()?;
        (!self.layout_pending && !self.bounds_dirty[idx as usize]).then(|| self.bounds[idx as usize])
    }

    /// Transform from an object's local space (origin at its bounds'
    /// top-left) to world space.
    pub fn world_transform(&mut self, handle: Handle) -> Result<Affine, StageError> {
        let idx = self.check(handle)?;
        self.sync_layout();
        self.ensure_bounds(idx);
        Ok(self.local_to_world_xf(idx))
    }

    /// Cached variant of [`world_transform`](Self::world_transform).
    ///
    /// `None` if the handle is stale or any bounds on the ancestor chain are
    /// out of date.
    #[must_use]
    pub fn cached_world_transform(&self, handle: Handle) -> Option<Affine> {
        let idx = self.check(handle).ok()?;
        if self.layout_pending {
            return None;
        }
        let mut cur = idx;
        while cur != INVALID {
            if self.bounds_dirty[cur as usize] {
                return None;
            }
            cur = self.parent[cur as usize];
        }
        Some(self.local_to_world_xf(idx))
    }

    /// Axis-aligned world-space bounding box of an object.
    pub fn world_bounds(&mut self, handle: Handle) -> Result<Rect, StageError> {
        let xf = self.world_transform(handle)?;
        let size = self.bounds[handle.idx as usize].size();
        Ok(xf.transform_rect_bbox(Rect::from_origin_size(Point::ORIGIN, size)))
    }

    /// Converts a point in an object's local space to world space.
    pub fn local_to_world(&mut self, handle: Handle, point: Point) -> Result<Point, StageError> {
        Ok(self.world_transform(handle)? * point)
    }

    /// Converts a world-space point to an object's local space.
    ///
    /// Exact inverse of [`local_to_world`](Self::local_to_world) up to
    /// floating-point rounding.
    pub fn world_to_local(&mut self, handle: Handle, point: Point) -> Result<Point, StageError> {
        Ok(self.world_transform(handle)?.inverse() * point)
    }

    /// Finds the topmost object under a world-space point, starting at
    /// `root`.
    ///
    /// At each level children are tested in reverse sibling order, so the
    /// last (topmost-drawn) child containing the point wins. The walk
    /// descends into the first match and stops when no child of the current
    /// object contains the point; that object is returned, which is `root`
    /// itself when nothing below it matches. Hidden and retained children
    /// are skipped. Containment is half-open: `[x0, x1) × [y0, y1)` in the
    /// child's local space.
    pub fn hit_test(&mut self, root: Handle, point: Point) -> Result<Handle, StageError> {
        let mut current = self.check(root)?;
        self.sync_layout();
        'descend: loop {
            for child in self.child_indices(current).into_iter().rev() {
                if self.hidden[child as usize] || self.state[child as usize] != SlotState::Live {
                    continue;
                }
                let size = self.ensure_bounds(child).size();
                let local = self.local_to_world_xf(child).inverse() * point;
                if Rect::from_origin_size(Point::ORIGIN, size).contains(local) {
                    current = child;
                    continue 'descend;
                }
            }
            break;
        }
        Ok(self.handle_of(current))
    }

    /// Brings the draw order and the bounds of every visible object up to
    /// date.
    ///
    /// This is the frame loop's explicit layout pass; afterwards
    /// [`bounds`](Self::bounds) and
    /// [`cached_world_transform`](Self::cached_world_transform) answer for
    /// every object in [`draw_order`](Self::draw_order).
    pub fn update_layout(&mut self) -> LayoutChanges {
        let mut changes = LayoutChanges::default();

        let topology: Vec<u32> = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .deterministic()
            .run()
            .collect();
        if !topology.is_empty() {
            self.rebuild_draw_order();
            changes.topology_changed = true;
        }

        self.sync_layout();
        // Pre-order: every ancestor is clean by the time a child is visited.
        for i in 0..self.draw_order.len() {
            let idx = self.draw_order[i];
            if self.bounds_dirty[idx as usize] {
                self.ensure_bounds(idx);
                changes.recomputed.push(idx);
            }
        }
        changes
    }

    // -- Internal helpers --

    /// Records a layout invalidation for `idx` and its descendants.
    pub(crate) fn invalidate_layout(&mut self, idx: u32) {
        self.dirty.mark_with(idx, dirty::LAYOUT, &EagerPolicy);
        self.layout_pending = true;
    }

    /// Moves recorded LAYOUT marks into the per-slot stale flags.
    fn sync_layout(&mut self) {
        if !self.layout_pending {
            return;
        }
        let stale: Vec<u32> = self
            .dirty
            .drain(dirty::LAYOUT)
            .affected()
            .deterministic()
            .run()
            .collect();
        for idx in stale {
            if let Some(flag) = self.bounds_dirty.get_mut(idx as usize) {
                *flag = true;
            }
        }
        self.layout_pending = false;
    }

    /// Recomputes stale bounds from the nearest clean ancestor of `idx`
    /// down to `idx`, returning its bounds.
    ///
    /// A clean object never has a stale ancestor, so the walk stops at the
    /// first clean one.
    pub(crate) fn ensure_bounds(&mut self, idx: u32) -> Rect {
        let mut chain = Vec::new();
        let mut cur = idx;
        while cur != INVALID && self.bounds_dirty[cur as usize] {
            chain.push(cur);
            cur = self.parent[cur as usize];
        }
        for &i in chain.iter().rev() {
            let reference = self.reference_frame(i);
            let bounds = self.anchor[i as usize].resolve(reference);
            self.bounds[i as usize] = bounds;
            self.bounds_dirty[i as usize] = false;
            #[cfg(feature = "trace-rich")]
            self.tracer.bounds(&crate::trace::BoundsEvent {
                handle: self.handle_of(i),
                bounds,
            });
        }
        self.bounds[idx as usize]
    }

    /// The rectangle `idx` anchors against, in its parent's content space.
    fn reference_frame(&self, idx: u32) -> Rect {
        let p = self.parent[idx as usize];
        if p == INVALID {
            self.config.frame
        } else {
            self.content_to_parent(p)
                .inverse()
                .transform_rect_bbox(self.bounds[p as usize])
        }
    }

    /// Maps `idx`'s content space into the space its own bounds live in.
    fn content_to_parent(&self, idx: u32) -> Affine {
        let origin = self.bounds[idx as usize].origin().to_vec2();
        Affine::translate(origin) * self.content_transform[idx as usize] * Affine::translate(-origin)
    }

    /// Local-to-world transform from cached bounds.
    fn local_to_world_xf(&self, idx: u32) -> Affine {
        let mut xf = Affine::translate(self.bounds[idx as usize].origin().to_vec2());
        let mut cur = self.parent[idx as usize];
        while cur != INVALID {
            xf = self.content_to_parent(cur) * xf;
            cur = self.parent[cur as usize];
        }
        xf
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Vec2;

    use super::super::tests::{group, rect, stage};
    use super::*;
    use crate::Variant;
    use crate::anchor::{AnchorPoint, Extent};

    const EPS: f64 = 1e-9;

    fn close(a: Point, b: Point) -> bool {
        (a - b).hypot() < EPS
    }

    #[test]
    fn root_anchors_against_frame() {
        let mut stage = stage();
        let h = rect(&mut stage, 10.0, 20.0, 30.0, 40.0);
        assert_eq!(
            stage.compute_bounds(h).unwrap(),
            Rect::new(10.0, 20.0, 40.0, 60.0)
        );
    }

    #[test]
    fn top_left_child_matches_parent_origin() {
        let mut stage = stage();
        for (x, y) in [(0.0, 0.0), (12.5, 7.0), (-30.0, 45.0)] {
            let parent = rect(&mut stage, x, y, 50.0, 50.0);
            let child = rect(&mut stage, 0.0, 0.0, 5.0, 5.0);
            stage.attach(child, parent, None).unwrap();
            let pb = stage.compute_bounds(parent).unwrap();
            let cb = stage.compute_bounds(child).unwrap();
            assert_eq!(cb.origin(), pb.origin());
        }
    }

    #[test]
    fn stretch_tracks_parent_resizes() {
        let mut stage = stage();
        let parent = rect(&mut stage, 0.0, 0.0, 40.0, 10.0);
        let bar = stage
            .create(
                "rect",
                &Variant::object([
                    ("width", Variant::from("stretch")),
                    ("height", Variant::from(4.0)),
                ]),
            )
            .unwrap();
        stage.attach(bar, parent, None).unwrap();
        for width in [40.0, 75.0, 3.0] {
            let spec = AnchorSpec::default().with_size(width, 10.0);
            stage.set_anchor(parent, spec).unwrap();
            let pw = stage.compute_bounds(parent).unwrap().width();
            assert!((stage.compute_bounds(bar).unwrap().width() - pw).abs() < EPS);
        }
    }

    #[test]
    fn recomputation_is_lazy() {
        let mut stage = stage();
        let parent = rect(&mut stage, 0.0, 0.0, 40.0, 40.0);
        let child = rect(&mut stage, 5.0, 5.0, 10.0, 10.0);
        stage.attach(child, parent, None).unwrap();
        stage.compute_bounds(child).unwrap();
        assert!(stage.bounds(child).is_some());

        stage
            .set_anchor(parent, AnchorSpec::default().with_offset(10.0, 0.0).with_size(40.0, 40.0))
            .unwrap();
        // Marked, not recomputed.
        assert_eq!(stage.bounds(child), None);
        assert_eq!(stage.bounds[child.index() as usize], Rect::new(5.0, 5.0, 15.0, 15.0));

        assert_eq!(stage.compute_bounds(child).unwrap(), Rect::new(15.0, 5.0, 25.0, 15.0));
    }

    #[test]
    fn invalidation_reaches_every_descendant() {
        let close_rect = |a: Rect, b: Rect| {
            close(a.origin(), b.origin()) && close(Point::new(a.x1, a.y1), Point::new(b.x1, b.y1))
        };
        let mut stage = stage();
        let root = rect(&mut stage, 10.0, 10.0, 80.0, 80.0);
        let mid = rect(&mut stage, 5.0, 5.0, 50.0, 50.0);
        let leaf = group(&mut stage);
        let other = rect(&mut stage, 0.0, 0.0, 1.0, 1.0);
        stage.attach(mid, root, None).unwrap();
        stage.attach(leaf, mid, None).unwrap();
        assert_eq!(stage.compute_bounds(leaf).unwrap(), Rect::new(15.0, 15.0, 65.0, 65.0));

        // Grandparent moves: the mark has to travel two edges.
        stage
            .set_anchor(root, AnchorSpec::default().with_offset(20.0, 10.0).with_size(80.0, 80.0))
            .unwrap();
        stage.compute_bounds(other).unwrap();
        assert_eq!(stage.bounds(mid), None);
        assert_eq!(stage.bounds(leaf), None);
        assert_eq!(stage.compute_bounds(leaf).unwrap(), Rect::new(25.0, 15.0, 75.0, 65.0));

        // Middle content zooms: the leaf is stale, the root is not.
        stage.set_content_transform(mid, Affine::scale(2.0)).unwrap();
        stage.compute_bounds(other).unwrap();
        assert_eq!(stage.bounds(root), Some(Rect::new(20.0, 10.0, 100.0, 90.0)));
        assert_eq!(stage.bounds(leaf), None);
        assert!(close_rect(
            stage.compute_bounds(leaf).unwrap(),
            Rect::new(25.0, 15.0, 50.0, 40.0)
        ));

        // Frame moves: every root and everything below it.
        stage.set_frame(Rect::new(100.0, 50.0, 300.0, 250.0));
        stage.compute_bounds(other).unwrap();
        assert_eq!(stage.bounds(root), None);
        assert_eq!(stage.bounds(mid), None);
        assert_eq!(stage.bounds(leaf), None);
        assert!(close_rect(
            stage.compute_bounds(leaf).unwrap(),
            Rect::new(125.0, 65.0, 150.0, 90.0)
        ));
        assert_eq!(stage.bounds(root), Some(Rect::new(120.0, 60.0, 200.0, 140.0)));
    }

    #[test]
    fn reparent_changes_reference_frame() {
        let mut stage = stage();
        let left = rect(&mut stage, 0.0, 0.0, 10.0, 10.0);
        let right = rect(&mut stage, 50.0, 0.0, 10.0, 10.0);
        let child = rect(&mut stage, 1.0, 1.0, 2.0, 2.0);
        stage.attach(child, left, None).unwrap();
        assert_eq!(stage.compute_bounds(child).unwrap().origin(), Point::new(1.0, 1.0));
        stage.reparent(child, right, None).unwrap();
        assert_eq!(stage.compute_bounds(child).unwrap().origin(), Point::new(51.0, 1.0));
        stage.detach(child).unwrap();
        assert_eq!(stage.compute_bounds(child).unwrap().origin(), Point::new(1.0, 1.0));
    }

    #[test]
    fn set_frame_invalidates_roots() {
        let mut stage = stage();
        let corner = stage
            .create(
                "rect",
                &Variant::object([
                    ("anchor-self", Variant::from("bottom-right")),
                    ("anchor-parent", Variant::from("bottom-right")),
                    ("width", Variant::from(10.0)),
                    ("height", Variant::from(10.0)),
                ]),
            )
            .unwrap();
        assert_eq!(stage.compute_bounds(corner).unwrap(), Rect::new(90.0, 90.0, 100.0, 100.0));
        stage.set_frame(Rect::new(0.0, 0.0, 200.0, 50.0));
        assert_eq!(stage.compute_bounds(corner).unwrap(), Rect::new(190.0, 40.0, 200.0, 50.0));
    }

    #[test]
    fn content_transform_scales_children() {
        let mut stage = stage();
        let zoom = rect(&mut stage, 10.0, 10.0, 40.0, 40.0);
        stage.set_content_transform(zoom, Affine::scale(2.0)).unwrap();
        let fill = stage.create("group", &Variant::Null).unwrap();
        stage.attach(fill, zoom, None).unwrap();

        // Children see half the space.
        let b = stage.compute_bounds(fill).unwrap();
        assert!((b.width() - 20.0).abs() < EPS);
        assert!(close(b.origin(), Point::new(10.0, 10.0)));

        // ... drawn twice as large.
        let wb = stage.world_bounds(fill).unwrap();
        assert!((wb.width() - 40.0).abs() < EPS);
        assert!(close(
            stage.local_to_world(fill, Point::new(5.0, 5.0)).unwrap(),
            Point::new(20.0, 20.0)
        ));
    }

    #[test]
    fn singular_content_transform_rejected() {
        let mut stage = stage();
        let h = group(&mut stage);
        assert_eq!(
            stage.set_content_transform(h, Affine::scale(0.0)),
            Err(StageError::SingularTransform(h))
        );
        assert_eq!(stage.content_transform(h), Ok(Affine::IDENTITY));
    }

    #[test]
    fn world_to_local_inverts_local_to_world() {
        let mut stage = stage();
        let a = rect(&mut stage, 7.0, 3.0, 80.0, 80.0);
        let b = rect(&mut stage, 4.5, 9.25, 60.0, 60.0);
        let c = rect(&mut stage, 11.0, 2.0, 20.0, 20.0);
        stage.attach(b, a, None).unwrap();
        stage.attach(c, b, None).unwrap();
        stage
            .set_content_transform(a, Affine::rotate(0.3) * Affine::scale(1.5))
            .unwrap();
        stage
            .set_content_transform(b, Affine::translate(Vec2::new(-3.0, 8.0)))
            .unwrap();

        for p in [Point::new(0.0, 0.0), Point::new(3.5, -2.0), Point::new(19.0, 19.9)] {
            let world = stage.local_to_world(c, p).unwrap();
            let back = stage.world_to_local(c, world).unwrap();
            assert!((back - p).hypot() < 1e-9, "{p:?} -> {world:?} -> {back:?}");
        }
    }

    #[test]
    fn identity_chain_accumulates_offsets() {
        let mut stage = stage();
        let a = rect(&mut stage, 10.0, 0.0, 50.0, 50.0);
        let b = rect(&mut stage, 5.0, 5.0, 20.0, 20.0);
        stage.attach(b, a, None).unwrap();
        assert_eq!(
            stage.local_to_world(b, Point::new(1.0, 1.0)).unwrap(),
            Point::new(16.0, 6.0)
        );
    }

    #[test]
    fn hit_test_prefers_topmost_sibling() {
        let mut stage = stage();
        let root = group(&mut stage);
        let below = rect(&mut stage, 0.0, 0.0, 50.0, 50.0);
        let above = rect(&mut stage, 25.0, 25.0, 50.0, 50.0);
        let leaf = rect(&mut stage, 0.0, 0.0, 10.0, 10.0);
        stage.attach(below, root, None).unwrap();
        stage.attach(above, root, None).unwrap();
        stage.attach(leaf, above, None).unwrap();

        assert_eq!(stage.hit_test(root, Point::new(30.0, 30.0)), Ok(leaf));
        assert_eq!(stage.hit_test(root, Point::new(40.0, 40.0)), Ok(above));
        assert_eq!(stage.hit_test(root, Point::new(10.0, 10.0)), Ok(below));
        assert_eq!(stage.hit_test(root, Point::new(90.0, 5.0)), Ok(root));

        stage.set_child_index(below, 1).unwrap();
        assert_eq!(stage.hit_test(root, Point::new(30.0, 30.0)), Ok(below));
    }

    #[test]
    fn hit_test_skips_hidden_and_uses_half_open_bounds() {
        let mut stage = stage();
        let root = group(&mut stage);
        let a = rect(&mut stage, 0.0, 0.0, 10.0, 10.0);
        stage.attach(a, root, None).unwrap();
        assert_eq!(stage.hit_test(root, Point::new(0.0, 0.0)), Ok(a));
        assert_eq!(stage.hit_test(root, Point::new(10.0, 5.0)), Ok(root));
        stage.set_hidden(a, true).unwrap();
        assert_eq!(stage.hit_test(root, Point::new(5.0, 5.0)), Ok(root));
    }

    #[test]
    fn update_layout_recomputes_visible_dirty_only() {
        let mut stage = stage();
        let root = group(&mut stage);
        let a = rect(&mut stage, 0.0, 0.0, 10.0, 10.0);
        let hidden = rect(&mut stage, 0.0, 0.0, 10.0, 10.0);
        stage.attach(a, root, None).unwrap();
        stage.attach(hidden, root, None).unwrap();
        stage.set_hidden(hidden, true).unwrap();

        let changes = stage.update_layout();
        assert!(changes.topology_changed);
        assert_eq!(changes.recomputed, [root.index(), a.index()]);
        assert!(stage.bounds(a).is_some());
        assert!(stage.bounds(hidden).is_none());

        let again = stage.update_layout();
        assert!(!again.topology_changed);
        assert!(again.recomputed.is_empty());

        stage
            .set_anchor(a, AnchorSpec {
                width: Extent::Relative(0.5),
                self_point: AnchorPoint::Center,
                ..stage.anchor(a).unwrap()
            })
            .unwrap();
        assert_eq!(stage.update_layout().recomputed, [a.index()]);
        assert!(stage.cached_world_transform(a).is_some());
    }
}
