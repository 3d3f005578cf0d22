// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render plan: an ordered sequence of draw items for one frame.

use alloc::vec::Vec;

use kurbo::{Affine, Point, Rect, Size};
use stagehand_core::{Handle, Stage};
use stagehand_core::registry::ObjectKind;

/// One visible object in the render plan.
///
/// Items are produced in back-to-front order, matching the stage's draw
/// order.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderItem {
    /// The object this item was extracted from.
    pub handle: Handle,
    /// Runtime type of the object, for picking a draw routine.
    pub kind: ObjectKind,
    /// Size of the object in its own local space.
    pub size: Size,
    /// Axis-aligned world-space bounding box.
    pub world_bounds: Rect,
    /// Transform from the object's local space to world space.
    pub world_transform: Affine,
    /// Position in the draw order, 0 being the furthest back.
    pub z: u32,
}

impl RenderItem {
    /// Local-space rectangle the object occupies, with its origin at the
    /// top-left.
    #[must_use]
    pub fn local_rect(&self) -> Rect {
        Rect::from_origin_size(Point::ORIGIN, self.size)
    }
}

/// Every visible object of a stage for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderPlan {
    /// Top-level frame the plan was laid out in.
    pub frame: Rect,
    /// Draw items in back-to-front order.
    pub items: Vec<RenderItem>,
    /// Objects in the draw order whose cached layout was out of date and
    /// were therefore left out.
    pub stale: usize,
}

impl RenderPlan {
    /// Creates an empty render plan for the given frame.
    #[must_use]
    pub fn new(frame: Rect) -> Self {
        Self {
            frame,
            items: Vec::new(),
            stale: 0,
        }
    }

    /// Extracts a plan from the stage's cached draw order and layout.
    ///
    /// The stage is only read. Objects whose cached bounds are out of date
    /// are skipped and counted in [`stale`](Self::stale); call
    /// [`Stage::update_layout`] first for a complete plan.
    #[must_use]
    pub fn build(stage: &Stage) -> Self {
        let mut plan = Self::new(stage.frame());
        plan.extend_from(stage);
        plan
    }

    /// Clears the plan for reuse.
    pub fn clear(&mut self) {
        self.items.clear();
        self.stale = 0;
    }

    /// Rebuilds the plan in place, reusing its allocation.
    pub fn rebuild(&mut self, stage: &Stage) {
        self.clear();
        self.frame = stage.frame();
        self.extend_from(stage);
    }

    /// Looks up the item for an object.
    #[must_use]
    pub fn item(&self, handle: Handle) -> Option<&RenderItem> {
        self.items.iter().find(|item| item.handle == handle)
    }

    /// Topmost item whose world bounds contain `point`.
    ///
    /// This is a bounding-box approximation of
    /// [`Stage::hit_test`] that needs no mutable access to the stage.
    #[must_use]
    pub fn topmost_at(&self, point: Point) -> Option<&RenderItem> {
        self.items
            .iter()
            .rev()
            .find(|item| item.world_bounds.contains(point))
    }

    fn extend_from(&mut self, stage: &Stage) {
        for &idx in stage.draw_order() {
            let Some(handle) = stage.handle_at(idx) else {
                continue;
            };
            let Ok(object) = stage.resolve(handle) else {
                continue;
            };
            if object.is_hidden() || object.is_retained() {
                continue;
            }
            let (Some(bounds), Some(world_transform)) =
                (stage.bounds(handle), stage.cached_world_transform(handle))
            else {
                self.stale += 1;
                continue;
            };
            let size = bounds.size();
            let z = u32::try_from(self.items.len()).unwrap_or(u32::MAX);
            self.items.push(RenderItem {
                handle,
                kind: object.kind(),
                size,
                world_bounds: world_transform
                    .transform_rect_bbox(Rect::from_origin_size(Point::ORIGIN, size)),
                world_transform,
                z,
            });
        }
    }
}
