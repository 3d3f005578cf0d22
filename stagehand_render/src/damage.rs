// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Spatial damage tracking for partial re-rendering.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use kurbo::Rect;
use stagehand_core::Handle;

use crate::plan::{RenderItem, RenderPlan};

/// A region of the frame that needs re-rendering.
///
/// Renderers can use this to redraw only the areas that changed since the
/// last frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum DamageRegion {
    /// The entire frame needs redrawing.
    #[default]
    Full,
    /// World-space rectangles that need redrawing.
    Rects(Vec<Rect>),
    /// Nothing changed; the previous frame can be reused.
    None,
}

impl DamageRegion {
    /// Returns `true` if no region needs redrawing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Merges another damage region into this one.
    pub fn merge(&mut self, other: &Self) {
        match (&*self, other) {
            (Self::Full, _) | (_, Self::Full) => *self = Self::Full,
            (Self::None, _) => *self = other.clone(),
            (_, Self::None) => {}
            (Self::Rects(a), Self::Rects(b)) => {
                let mut merged = a.clone();
                merged.extend_from_slice(b);
                *self = Self::Rects(merged);
            }
        }
    }

    /// Adds one rectangle. Zero-area rectangles are ignored.
    pub fn add_rect(&mut self, rect: Rect) {
        if rect.area() <= 0.0 {
            return;
        }
        match self {
            Self::Full => {}
            Self::Rects(rects) => rects.push(rect),
            Self::None => *self = Self::Rects(alloc::vec![rect]),
        }
    }

    /// Smallest rectangle covering the whole region, or `None` when nothing
    /// is damaged. `Full` yields `frame`.
    #[must_use]
    pub fn bounding_box(&self, frame: Rect) -> Option<Rect> {
        match self {
            Self::Full => Some(frame),
            Self::Rects(rects) => rects.iter().copied().reduce(|a, b| a.union(b)),
            Self::None => None,
        }
    }

    /// Computes what changed between two consecutive plans.
    ///
    /// A different frame damages everything. Otherwise each object that
    /// appeared, disappeared, moved, resized, or changed stacking position
    /// damages both its old and its new world bounds.
    #[must_use]
    pub fn from_changes(previous: &RenderPlan, next: &RenderPlan) -> Self {
        if previous.frame != next.frame {
            return Self::Full;
        }
        let before: BTreeMap<Handle, &RenderItem> =
            previous.items.iter().map(|item| (item.handle, item)).collect();
        let mut region = Self::None;
        let mut seen = Vec::with_capacity(next.items.len());
        for item in &next.items {
            seen.push(item.handle);
            match before.get(&item.handle) {
                Some(old) if *old == item => {}
                Some(old) => {
                    region.add_rect(old.world_bounds);
                    region.add_rect(item.world_bounds);
                }
                None => region.add_rect(item.world_bounds),
            }
        }
        seen.sort_unstable();
        for item in &previous.items {
            if seen.binary_search(&item.handle).is_err() {
                region.add_rect(item.world_bounds);
            }
        }
        region
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Affine, Size};
    use stagehand_core::anchor::Offset;
    use stagehand_core::registry::builtin;
    use stagehand_core::{Stage, Variant};

    #[test]
    fn merge_rules() {
        let a = Rect::new(0.0, 0.0, 1.0, 1.0);
        let b = Rect::new(2.0, 2.0, 3.0, 3.0);

        let mut region = DamageRegion::None;
        region.merge(&DamageRegion::Rects(alloc::vec![a]));
        assert_eq!(region, DamageRegion::Rects(alloc::vec![a]));

        region.merge(&DamageRegion::Rects(alloc::vec![b]));
        assert_eq!(region, DamageRegion::Rects(alloc::vec![a, b]));

        region.merge(&DamageRegion::None);
        assert_eq!(region, DamageRegion::Rects(alloc::vec![a, b]));

        region.merge(&DamageRegion::Full);
        assert_eq!(region, DamageRegion::Full);
        assert!(!region.is_empty());
    }

    #[test]
    fn bounding_box_unions_rects() {
        let frame = Rect::new(0.0, 0.0, 10.0, 10.0);
        let mut region = DamageRegion::None;
        assert_eq!(region.bounding_box(frame), None);
        region.add_rect(Rect::new(1.0, 1.0, 2.0, 2.0));
        region.add_rect(Rect::new(5.0, 0.0, 6.0, 8.0));
        region.add_rect(Rect::new(3.0, 3.0, 3.0, 9.0));
        assert_eq!(region.bounding_box(frame), Some(Rect::new(1.0, 0.0, 6.0, 8.0)));
        assert_eq!(DamageRegion::Full.bounding_box(frame), Some(frame));
    }

    fn item(stage: &Stage, handle: Handle, bounds: Rect, z: u32) -> RenderItem {
        RenderItem {
            handle,
            kind: stage.resolve(handle).unwrap().kind(),
            size: Size::new(bounds.width(), bounds.height()),
            world_bounds: bounds,
            world_transform: Affine::translate(bounds.origin().to_vec2()),
            z,
        }
    }

    #[test]
    fn identical_plans_have_no_damage() {
        let mut stage = Stage::new();
        let h = stage.create(builtin::GROUP, &Variant::Null).unwrap();
        let bounds = Rect::new(0.0, 0.0, 4.0, 4.0);
        let mut plan = RenderPlan::new(bounds);
        plan.items.push(item(&stage, h, bounds, 0));
        assert!(DamageRegion::from_changes(&plan, &plan.clone()).is_empty());

        let resized = RenderPlan::new(Rect::new(0.0, 0.0, 8.0, 8.0));
        assert_eq!(DamageRegion::from_changes(&plan, &resized), DamageRegion::Full);
    }

    #[test]
    fn moves_additions_and_removals_damage_both_sides() {
        let mut stage = Stage::new();
        let moved = stage.create(builtin::GROUP, &Variant::Null).unwrap();
        let removed = stage.create(builtin::GROUP, &Variant::Null).unwrap();
        let added = stage.create(builtin::GROUP, &Variant::Null).unwrap();
        let frame = Rect::new(0.0, 0.0, 100.0, 100.0);

        let old_pos = Rect::new(0.0, 0.0, 10.0, 10.0);
        let new_pos = Rect::new(50.0, 50.0, 60.0, 60.0);
        let gone = Rect::new(20.0, 0.0, 30.0, 10.0);
        let fresh = Rect::new(0.0, 80.0, 5.0, 85.0);

        let mut before = RenderPlan::new(frame);
        before.items.push(item(&stage, moved, old_pos, 0));
        before.items.push(item(&stage, removed, gone, 1));
        let mut after = RenderPlan::new(frame);
        after.items.push(item(&stage, moved, new_pos, 0));
        after.items.push(item(&stage, added, fresh, 1));

        let DamageRegion::Rects(mut rects) = DamageRegion::from_changes(&before, &after) else {
            panic!("expected rect damage");
        };
        rects.sort_by(|a, b| a.x0.total_cmp(&b.x0).then(a.y0.total_cmp(&b.y0)));
        assert_eq!(rects, [old_pos, fresh, gone, new_pos]);
    }

    #[test]
    fn end_to_end_layout_change() {
        let mut stage = Stage::new();
        let frame = stage.frame();
        let root = stage.create(builtin::GROUP, &Variant::Null).unwrap();
        let label = stage
            .create(
                builtin::LABEL,
                &Variant::object([
                    ("text", Variant::from("hi")),
                    ("width", Variant::from(30.0)),
                    ("height", Variant::from(10.0)),
                ]),
            )
            .unwrap();
        stage.attach(label, root, None).unwrap();
        stage.update_layout();
        let first = RenderPlan::build(&stage);

        stage.update_layout();
        let unchanged = RenderPlan::build(&stage);
        assert!(DamageRegion::from_changes(&first, &unchanged).is_empty());

        let mut anchor = stage.anchor(label).unwrap();
        anchor.offset_x = Offset::Pixels(40.0);
        stage.set_anchor(label, anchor).unwrap();
        stage.update_layout();
        let moved = RenderPlan::build(&stage);
        let damage = DamageRegion::from_changes(&first, &moved);
        assert_eq!(
            damage.bounding_box(frame),
            Some(Rect::new(0.0, 0.0, 70.0, 10.0))
        );
    }
}
