//! Coordinate-space tags.
//!
//! Every geometric value flowing through a filter evaluation lives in one
//! of three spaces:
//!
//! - **parameter space**: where a filter's inputs are authored,
//! - **layer space**: where sampling and filtering actually happen,
//! - **device space**: the final output pixel grid.
//!
//! [`Tagged`] stamps a raw value with its space. The tag has no runtime
//! representation; it only restricts which operations type-check. Values in
//! the same space combine freely, while crossing spaces goes through
//! [`Mappable::map`] with an explicit matrix (usually via
//! [`Mapping`](crate::geometry::mapping::Mapping)).

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, Sub};

use glam::{IVec2, Vec2};

use crate::geometry::matrix::Matrix;
use crate::geometry::rect::{IRect, Rect};
use crate::geometry::vector::{ISize, IVector, Size, Vector};

mod sealed {
    pub trait Sealed {}
}

/// Marker trait implemented by the three coordinate spaces.
pub trait CoordSpace: sealed::Sealed + Copy + 'static {
    const NAME: &'static str;
}

/// Space in which filter parameters are authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {}

/// Intermediate space in which filtering is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {}

/// Final output space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {}

impl sealed::Sealed for Parameter {}
impl sealed::Sealed for Layer {}
impl sealed::Sealed for Device {}

impl CoordSpace for Parameter {
    const NAME: &'static str = "param";
}

impl CoordSpace for Layer {
    const NAME: &'static str = "layer";
}

impl CoordSpace for Device {
    const NAME: &'static str = "device";
}

/// A raw geometric value tagged with the coordinate space `S`.
#[repr(transparent)]
pub struct Tagged<T, S: CoordSpace> {
    raw: T,
    space: PhantomData<S>,
}

pub type ParamSpace<T> = Tagged<T, Parameter>;
pub type LayerSpace<T> = Tagged<T, Layer>;
pub type DeviceSpace<T> = Tagged<T, Device>;

impl<T, S: CoordSpace> Tagged<T, S> {
    pub const fn new(raw: T) -> Self {
        Self {
            raw,
            space: PhantomData,
        }
    }

    pub fn into_raw(self) -> T {
        self.raw
    }

    pub fn as_raw(&self) -> &T {
        &self.raw
    }
}

impl<T: Copy, S: CoordSpace> Tagged<T, S> {
    pub fn raw(&self) -> T {
        self.raw
    }
}

impl<T: Clone, S: CoordSpace> Clone for Tagged<T, S> {
    fn clone(&self) -> Self {
        Self::new(self.raw.clone())
    }
}

impl<T: Copy, S: CoordSpace> Copy for Tagged<T, S> {}

impl<T: PartialEq, S: CoordSpace> PartialEq for Tagged<T, S> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: Eq, S: CoordSpace> Eq for Tagged<T, S> {}

impl<T: Default, S: CoordSpace> Default for Tagged<T, S> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug, S: CoordSpace> fmt::Debug for Tagged<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", S::NAME, self.raw)
    }
}

// ── Points and vectors ──────────────────────────────────────────

impl<S: CoordSpace> Tagged<Vec2, S> {
    pub fn x(&self) -> f32 {
        self.raw.x
    }

    pub fn y(&self) -> f32 {
        self.raw.y
    }
}

impl<S: CoordSpace> Tagged<IVec2, S> {
    pub fn x(&self) -> i32 {
        self.raw.x
    }

    pub fn y(&self) -> i32 {
        self.raw.y
    }
}

impl<S: CoordSpace> Add<Tagged<Vector, S>> for Tagged<Vec2, S> {
    type Output = Self;

    fn add(self, rhs: Tagged<Vector, S>) -> Self {
        Self::new(self.raw + rhs.raw.0)
    }
}

impl<S: CoordSpace> Sub for Tagged<Vec2, S> {
    type Output = Tagged<Vector, S>;

    fn sub(self, rhs: Self) -> Tagged<Vector, S> {
        Tagged::new(Vector(self.raw - rhs.raw))
    }
}

impl<S: CoordSpace> Add<Tagged<IVector, S>> for Tagged<IVec2, S> {
    type Output = Self;

    fn add(self, rhs: Tagged<IVector, S>) -> Self {
        Self::new(self.raw.saturating_add(rhs.raw.0))
    }
}

impl<S: CoordSpace> Sub for Tagged<IVec2, S> {
    type Output = Tagged<IVector, S>;

    fn sub(self, rhs: Self) -> Tagged<IVector, S> {
        Tagged::new(IVector(self.raw.saturating_sub(rhs.raw)))
    }
}

impl<S: CoordSpace> Add for Tagged<Vector, S> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.raw + rhs.raw)
    }
}

impl<S: CoordSpace> Add for Tagged<IVector, S> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.raw + rhs.raw)
    }
}

// ── Rectangles ──────────────────────────────────────────────────

impl<S: CoordSpace> Tagged<IRect, S> {
    pub fn empty() -> Self {
        Self::new(IRect::EMPTY)
    }

    pub fn left(&self) -> i32 {
        self.raw.left
    }

    pub fn top(&self) -> i32 {
        self.raw.top
    }

    pub fn right(&self) -> i32 {
        self.raw.right
    }

    pub fn bottom(&self) -> i32 {
        self.raw.bottom
    }

    pub fn width(&self) -> i32 {
        self.raw.width()
    }

    pub fn height(&self) -> i32 {
        self.raw.height()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn top_left(&self) -> Tagged<IVec2, S> {
        Tagged::new(self.raw.top_left())
    }

    pub fn size(&self) -> Tagged<ISize, S> {
        Tagged::new(self.raw.size())
    }

    pub fn intersect(&self, other: &Self) -> Option<Self> {
        self.raw.intersect(&other.raw).map(Self::new)
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.raw.union(&other.raw))
    }

    pub fn contains(&self, other: &Self) -> bool {
        self.raw.contains(&other.raw)
    }

    pub fn offset(&self, v: Tagged<IVector, S>) -> Self {
        Self::new(self.raw.offset(v.raw.0))
    }

    pub fn to_rect(&self) -> Tagged<Rect, S> {
        Tagged::new(Rect::from_irect(self.raw))
    }
}

impl<S: CoordSpace> Tagged<Rect, S> {
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn intersect(&self, other: &Self) -> Option<Self> {
        self.raw.intersect(&other.raw).map(Self::new)
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.raw.union(&other.raw))
    }

    pub fn contains(&self, other: &Self) -> bool {
        self.raw.contains(&other.raw)
    }

    pub fn offset(&self, v: Tagged<Vector, S>) -> Self {
        Self::new(self.raw.offset(v.raw.0))
    }

    pub fn round_out(&self) -> Tagged<IRect, S> {
        Tagged::new(self.raw.round_out())
    }

    pub fn round_in(&self) -> Tagged<IRect, S> {
        Tagged::new(self.raw.round_in())
    }
}

// ── Matrices ────────────────────────────────────────────────────

/// A matrix whose input and output are both in space `S`, e.g. the pending
/// transform of a [`FilterResult`](crate::FilterResult) in layer space.
impl<S: CoordSpace> Tagged<Matrix, S> {
    pub fn identity() -> Self {
        Self::new(Matrix::IDENTITY)
    }

    pub fn translate(v: Tagged<IVec2, S>) -> Self {
        Self::new(Matrix::translate(v.raw.x as f32, v.raw.y as f32))
    }

    pub fn map_rect(&self, r: &Tagged<Rect, S>) -> Tagged<Rect, S> {
        Tagged::new(self.raw.map_rect(&r.raw))
    }

    pub fn map_irect(&self, r: &Tagged<IRect, S>) -> Tagged<IRect, S> {
        Tagged::new(self.raw.map_irect(&r.raw))
    }

    pub fn inverse_map_rect(&self, r: &Tagged<Rect, S>) -> Option<Tagged<Rect, S>> {
        self.raw.inverse_map_rect(&r.raw).map(Tagged::new)
    }

    pub fn inverse_map_irect(&self, r: &Tagged<IRect, S>) -> Option<Tagged<IRect, S>> {
        self.raw.inverse_map_irect(&r.raw).map(Tagged::new)
    }

    pub fn post_concat(&mut self, other: &Self) {
        self.raw.post_concat(&other.raw);
    }

    pub fn pre_concat(&mut self, other: &Self) {
        self.raw.pre_concat(&other.raw);
    }

    pub fn invert(&self) -> Option<Self> {
        self.raw.invert().map(Self::new)
    }

    pub fn nearly_integer_translation(&self) -> Option<Tagged<IVec2, S>> {
        self.raw.nearly_integer_translation().map(Tagged::new)
    }
}

// ── Cross-space mapping ─────────────────────────────────────────

/// Geometry that can be carried from one space to another by a matrix.
pub trait Mappable: Sized {
    fn map(&self, matrix: &Matrix) -> Self;
}

impl Mappable for Vec2 {
    fn map(&self, matrix: &Matrix) -> Self {
        matrix.map_point(*self)
    }
}

impl Mappable for IVec2 {
    fn map(&self, matrix: &Matrix) -> Self {
        let p = matrix.map_point(self.as_vec2());
        IVec2::new(round_to_int(p.x), round_to_int(p.y))
    }
}

impl Mappable for Vector {
    fn map(&self, matrix: &Matrix) -> Self {
        Vector(matrix.map_vector(self.0))
    }
}

impl Mappable for IVector {
    fn map(&self, matrix: &Matrix) -> Self {
        let v = matrix.map_vector(self.0.as_vec2());
        IVector::new(round_to_int(v.x), round_to_int(v.y))
    }
}

impl Mappable for Size {
    fn map(&self, matrix: &Matrix) -> Self {
        let v = matrix.map_vector(Vec2::new(self.width, self.height));
        Size::new(v.x, v.y)
    }
}

impl Mappable for ISize {
    fn map(&self, matrix: &Matrix) -> Self {
        let v = IVector(IVec2::new(self.width, self.height)).map(matrix);
        ISize::new(v.0.x, v.0.y)
    }
}

impl Mappable for Rect {
    fn map(&self, matrix: &Matrix) -> Self {
        matrix.map_rect(self)
    }
}

impl Mappable for IRect {
    fn map(&self, matrix: &Matrix) -> Self {
        matrix.map_irect(self)
    }
}

fn round_to_int(v: f32) -> i32 {
    (v + 0.5).floor() as i32
}

/// Maps geometry tagged in `From` to `To` with `matrix`, which must take
/// `From` coordinates to `To` coordinates.
pub fn map_between<T: Mappable, From: CoordSpace, To: CoordSpace>(
    geom: &Tagged<T, From>,
    matrix: &Matrix,
) -> Tagged<T, To> {
    Tagged::new(geom.raw.map(matrix))
}

/// Re-expresses a transform acting within `From` as the equivalent
/// transform acting within `To`, i.e. `matrix * m * matrix⁻¹`.
///
/// Returns `None` when `matrix` is singular.
pub fn conjugate_between<From: CoordSpace, To: CoordSpace>(
    m: &Tagged<Matrix, From>,
    matrix: &Matrix,
) -> Option<Tagged<Matrix, To>> {
    let inv = matrix.invert()?;
    Some(Tagged::new(*matrix * m.raw * inv))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_is_zero_cost() {
        assert_eq!(
            std::mem::size_of::<LayerSpace<IRect>>(),
            std::mem::size_of::<IRect>()
        );
        assert_eq!(
            std::mem::size_of::<DeviceSpace<Matrix>>(),
            std::mem::size_of::<Matrix>()
        );
    }

    #[test]
    fn test_same_space_ops() {
        let a = LayerSpace::new(IRect::from_ltrb(0, 0, 10, 10));
        let b = LayerSpace::new(IRect::from_ltrb(5, 5, 20, 20));
        assert_eq!(
            a.intersect(&b),
            Some(LayerSpace::new(IRect::from_ltrb(5, 5, 10, 10)))
        );
        let moved = a.offset(LayerSpace::new(IVector::new(2, 3)));
        assert_eq!(moved.top_left(), LayerSpace::new(IVec2::new(2, 3)));
    }

    #[test]
    fn test_point_minus_point_is_vector() {
        let a = ParamSpace::new(Vec2::new(4.0, 5.0));
        let b = ParamSpace::new(Vec2::new(1.0, 1.0));
        let v = a - b;
        assert_eq!(b + v, a);
    }

    #[test]
    fn test_vectors_ignore_translation() {
        let m = Matrix::translate(100.0, 100.0) * Matrix::scale(2.0, 2.0);
        let v: LayerSpace<Vector> = map_between(&ParamSpace::new(Vector::new(1.0, 1.0)), &m);
        assert_eq!(v.raw(), Vector::new(2.0, 2.0));
        let p: LayerSpace<Vec2> = map_between(&ParamSpace::new(Vec2::new(1.0, 1.0)), &m);
        assert_eq!(p.raw(), Vec2::new(102.0, 102.0));
    }

    #[test]
    fn test_conjugate_matrix() {
        // A translation by 1 in parameter space is a translation by 2 in a
        // layer space that is scaled by 2.
        let m = ParamSpace::new(Matrix::translate(1.0, 0.0));
        let to_layer = Matrix::scale(2.0, 2.0);
        let mapped: LayerSpace<Matrix> =
            conjugate_between(&m, &to_layer).expect("invertible mapping");
        assert_eq!(mapped.raw(), Matrix::translate(2.0, 0.0));
        assert!(conjugate_between::<Parameter, Layer>(&m, &Matrix::scale(0.0, 1.0)).is_none());
    }

    #[test]
    fn test_debug_shows_space() {
        let p = DeviceSpace::new(IVec2::new(1, 2));
        assert!(format!("{p:?}").starts_with("device:"));
    }
}
