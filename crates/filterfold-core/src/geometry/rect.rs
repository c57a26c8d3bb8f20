//! Real and integer rectangles.
//!
//! Rectangles are stored as edges (`left, top, right, bottom`) with the
//! right and bottom edges exclusive. A rectangle is empty when it has no
//! area; every set operation treats empty rectangles as "nothing".

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

use crate::geometry::vector::ISize;

/// Tolerance applied before snapping real coordinates to integers.
///
/// Float math can land a hair on the wrong side of an integer that infinite
/// precision would hit exactly; without the tolerance a strict round-out
/// would grab an extra row or column of pixels.
pub const ROUND_EPSILON: f32 = 1e-3;

/// Axis-aligned rectangle with `f32` edges.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const EMPTY: Self = Self::from_ltrb(0.0, 0.0, 0.0, 0.0);

    pub const fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_ltrb(x, y, x + width, y + height)
    }

    pub fn from_irect(r: IRect) -> Self {
        Self::from_ltrb(r.left as f32, r.top as f32, r.right as f32, r.bottom as f32)
    }

    /// Bounding box of a set of points. Returns [`Rect::EMPTY`] for no points.
    pub fn from_points(points: &[Vec2]) -> Self {
        let Some(first) = points.first() else {
            return Self::EMPTY;
        };
        let (min, max) = points
            .iter()
            .fold((*first, *first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Self::from_ltrb(min.x, min.y, max.x, max.y)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// True when the rectangle has no area. NaN edges count as empty.
    pub fn is_empty(&self) -> bool {
        !(self.left < self.right && self.top < self.bottom)
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.right.is_finite()
            && self.bottom.is_finite()
    }

    pub fn top_left(&self) -> Vec2 {
        Vec2::new(self.left, self.top)
    }

    /// Corners in clockwise order starting at the top-left.
    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.left, self.top),
            Vec2::new(self.right, self.top),
            Vec2::new(self.right, self.bottom),
            Vec2::new(self.left, self.bottom),
        ]
    }

    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let r = Self::from_ltrb(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!r.is_empty()).then_some(r)
    }

    pub fn union(&self, other: &Self) -> Self {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        Self::from_ltrb(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    pub fn contains(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }

    pub fn offset(&self, d: Vec2) -> Self {
        Self::from_ltrb(
            self.left + d.x,
            self.top + d.y,
            self.right + d.x,
            self.bottom + d.y,
        )
    }

    pub fn inset(&self, dx: f32, dy: f32) -> Self {
        Self::from_ltrb(
            self.left + dx,
            self.top + dy,
            self.right - dx,
            self.bottom - dy,
        )
    }

    pub fn outset(&self, dx: f32, dy: f32) -> Self {
        self.inset(-dx, -dy)
    }

    /// Smallest integer rectangle enclosing `self` after insetting it by
    /// [`ROUND_EPSILON`]. Used when the result must not lose coverage.
    pub fn round_out(&self) -> IRect {
        self.inset(ROUND_EPSILON, ROUND_EPSILON).enclosing()
    }

    /// Largest integer rectangle enclosed by `self` after outsetting it by
    /// [`ROUND_EPSILON`]. Used when the result must not claim coverage it
    /// does not have.
    pub fn round_in(&self) -> IRect {
        self.outset(ROUND_EPSILON, ROUND_EPSILON).enclosed()
    }

    /// Strict round-out with no tolerance. `as` saturates out-of-range values.
    pub fn enclosing(&self) -> IRect {
        IRect::from_ltrb(
            self.left.floor() as i32,
            self.top.floor() as i32,
            self.right.ceil() as i32,
            self.bottom.ceil() as i32,
        )
    }

    /// Strict round-in with no tolerance.
    pub fn enclosed(&self) -> IRect {
        IRect::from_ltrb(
            self.left.ceil() as i32,
            self.top.ceil() as i32,
            self.right.floor() as i32,
            self.bottom.floor() as i32,
        )
    }
}

/// Axis-aligned rectangle with `i32` edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl IRect {
    pub const EMPTY: Self = Self::from_ltrb(0, 0, 0, 0);

    pub const fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::from_ltrb(
            x,
            y,
            x.saturating_add(width),
            y.saturating_add(height),
        )
    }

    pub const fn from_wh(width: i32, height: i32) -> Self {
        Self::from_ltrb(0, 0, width, height)
    }

    pub fn from_origin_size(origin: IVec2, size: ISize) -> Self {
        Self::from_xywh(origin.x, origin.y, size.width, size.height)
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn size(&self) -> ISize {
        ISize::new(self.width(), self.height())
    }

    pub fn top_left(&self) -> IVec2 {
        IVec2::new(self.left, self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let r = Self::from_ltrb(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!r.is_empty()).then_some(r)
    }

    pub fn union(&self, other: &Self) -> Self {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        Self::from_ltrb(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    pub fn contains(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }

    pub fn contains_point(&self, p: IVec2) -> bool {
        p.x >= self.left && p.x < self.right && p.y >= self.top && p.y < self.bottom
    }

    pub fn offset(&self, d: IVec2) -> Self {
        Self::from_ltrb(
            self.left.saturating_add(d.x),
            self.top.saturating_add(d.y),
            self.right.saturating_add(d.x),
            self.bottom.saturating_add(d.y),
        )
    }
}
