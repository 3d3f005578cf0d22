// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Anchor-based layout rules.
//!
//! An [`AnchorSpec`] pins one of nine [`AnchorPoint`]s on the object to one
//! of nine points on a reference frame (the parent's bounds, or the stage's
//! top-level frame for roots), then shifts it by an [`Offset`]. Each axis has
//! an [`Extent`]: an explicit size, a fraction of the reference span, or a
//! stretch that binds both opposite edges to the reference's edges.
//!
//! [`AnchorSpec::resolve`] is a pure function; caching and invalidation live
//! in the [`stage`](crate::stage) module.

use core::fmt;
use core::str::FromStr;

use kurbo::Rect;

/// One of nine named reference positions on a rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AnchorPoint {
    /// Top-left corner.
    #[default]
    TopLeft,
    /// Midpoint of the top edge.
    Top,
    /// Top-right corner.
    TopRight,
    /// Midpoint of the left edge.
    Left,
    /// Center.
    Center,
    /// Midpoint of the right edge.
    Right,
    /// Bottom-left corner.
    BottomLeft,
    /// Midpoint of the bottom edge.
    Bottom,
    /// Bottom-right corner.
    BottomRight,
}

impl AnchorPoint {
    /// All nine points, row by row.
    pub const ALL: [Self; 9] = [
        Self::TopLeft,
        Self::Top,
        Self::TopRight,
        Self::Left,
        Self::Center,
        Self::Right,
        Self::BottomLeft,
        Self::Bottom,
        Self::BottomRight,
    ];

    /// The point as `(x, y)` fractions of a rectangle's width and height.
    #[must_use]
    pub const fn fractions(self) -> (f64, f64) {
        match self {
            Self::TopLeft => (0.0, 0.0),
            Self::Top => (0.5, 0.0),
            Self::TopRight => (1.0, 0.0),
            Self::Left => (0.0, 0.5),
            Self::Center => (0.5, 0.5),
            Self::Right => (1.0, 0.5),
            Self::BottomLeft => (0.0, 1.0),
            Self::Bottom => (0.5, 1.0),
            Self::BottomRight => (1.0, 1.0),
        }
    }

    /// The configuration name of this point (`"top-left"`, `"center"`, ...).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::Top => "top",
            Self::TopRight => "top-right",
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::BottomLeft => "bottom-left",
            Self::Bottom => "bottom",
            Self::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for AnchorPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string does not name an [`AnchorPoint`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("not an anchor point name")]
pub struct ParseAnchorError;

impl FromStr for AnchorPoint {
    type Err = ParseAnchorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or(ParseAnchorError)
    }
}

/// A signed displacement along one axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Offset {
    /// Absolute pixels.
    Pixels(f64),
    /// Fraction of the reference frame's span on this axis.
    Fraction(f64),
}

impl Default for Offset {
    fn default() -> Self {
        Self::Pixels(0.0)
    }
}

impl Offset {
    /// Resolves the offset against a reference span.
    #[must_use]
    pub fn resolve(self, span: f64) -> f64 {
        match self {
            Self::Pixels(px) => px,
            Self::Fraction(f) => f * span,
        }
    }
}

/// How an object's size is determined along one axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Extent {
    /// An explicit size in pixels.
    Fixed(f64),
    /// A fraction of the reference frame's span.
    Relative(f64),
    /// Both edges bound to the reference's corresponding edges, inset by
    /// `start` and `end` pixels. The size follows the reference span.
    Stretch {
        /// Inset from the reference's leading edge.
        start: f64,
        /// Inset from the reference's trailing edge.
        end: f64,
    },
}

impl Default for Extent {
    fn default() -> Self {
        Self::Fixed(0.0)
    }
}

/// Complete layout rule for one object.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AnchorSpec {
    /// Point on the object that is placed.
    pub self_point: AnchorPoint,
    /// Point on the reference frame it is placed at.
    pub parent_point: AnchorPoint,
    /// Horizontal offset from the reference point.
    pub offset_x: Offset,
    /// Vertical offset from the reference point.
    pub offset_y: Offset,
    /// Horizontal extent.
    pub width: Extent,
    /// Vertical extent.
    pub height: Extent,
}

impl AnchorSpec {
    /// Places `self_point` of the object at `parent_point` of the reference.
    #[must_use]
    pub fn new(self_point: AnchorPoint, parent_point: AnchorPoint) -> Self {
        Self {
            self_point,
            parent_point,
            ..Self::default()
        }
    }

    /// A rule that fills the reference frame exactly.
    #[must_use]
    pub fn fill() -> Self {
        Self::default().stretch_x(0.0, 0.0).stretch_y(0.0, 0.0)
    }

    /// Sets a pixel offset on both axes.
    #[must_use]
    pub fn with_offset(mut self, x: f64, y: f64) -> Self {
        self.offset_x = Offset::Pixels(x);
        self.offset_y = Offset::Pixels(y);
        self
    }

    /// Sets a fixed size on both axes.
    #[must_use]
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Extent::Fixed(width);
        self.height = Extent::Fixed(height);
        self
    }

    /// Binds the left and right edges to the reference's left and right edges.
    #[must_use]
    pub fn stretch_x(mut self, start: f64, end: f64) -> Self {
        self.width = Extent::Stretch { start, end };
        self
    }

    /// Binds the top and bottom edges to the reference's top and bottom edges.
    #[must_use]
    pub fn stretch_y(mut self, start: f64, end: f64) -> Self {
        self.height = Extent::Stretch { start, end };
        self
    }

    /// Computes the object's rectangle inside `reference`.
    ///
    /// The result is expressed in the same coordinate space as `reference`.
    #[must_use]
    pub fn resolve(&self, reference: Rect) -> Rect {
        let (sx, sy) = self.self_point.fractions();
        let (px, py) = self.parent_point.fractions();
        let (x0, w) = resolve_axis(
            reference.x0,
            reference.width(),
            sx,
            px,
            self.offset_x,
            self.width,
        );
        let (y0, h) = resolve_axis(
            reference.y0,
            reference.height(),
            sy,
            py,
            self.offset_y,
            self.height,
        );
        Rect::new(x0, y0, x0 + w, y0 + h)
    }
}

/// Resolves one axis, returning `(min, length)`.
fn resolve_axis(
    ref_min: f64,
    ref_len: f64,
    self_frac: f64,
    parent_frac: f64,
    offset: Offset,
    extent: Extent,
) -> (f64, f64) {
    let shift = offset.resolve(ref_len);
    match extent {
        Extent::Stretch { start, end } => {
            let len = (ref_len - start - end).max(0.0);
            (ref_min + start + shift, len)
        }
        Extent::Fixed(len) => {
            let anchor = ref_min + ref_len * parent_frac + shift;
            (anchor - len * self_frac, len)
        }
        Extent::Relative(f) => {
            let len = f * ref_len;
            let anchor = ref_min + ref_len * parent_frac + shift;
            (anchor - len * self_frac, len)
        }
    }
}
