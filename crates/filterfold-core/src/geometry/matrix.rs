//! 3×3 projective matrix used for every coordinate-space conversion.
//!
//! Wraps a column-major [`glam::Mat3`] and adds the queries the filter
//! pipeline needs: matrix classification, scale decomposition, the
//! differential area scale under perspective, and rectangle mapping that
//! keeps 1px precision for integer rectangles.

use std::ops::Mul;

use glam::{IVec2, Mat3, Vec2, Vec3};

use crate::geometry::rect::{IRect, ROUND_EPSILON, Rect};

/// Scalars at or below this magnitude are treated as zero.
pub(crate) const NEARLY_ZERO: f32 = 1.0 / 4096.0;

/// Homogeneous coordinates closer than this to the w = 0 plane are clipped.
const W_PLANE_DISTANCE: f32 = 1.0 / 16384.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix(Mat3);

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Self = Self(Mat3::IDENTITY);

    pub const fn from_mat3(m: Mat3) -> Self {
        Self(m)
    }

    pub const fn to_mat3(self) -> Mat3 {
        self.0
    }

    /// Builds a matrix from row-major values
    /// `[scale_x, skew_x, trans_x, skew_y, scale_y, trans_y, persp_0, persp_1, persp_2]`.
    pub fn from_row_major(v: [f32; 9]) -> Self {
        Self(Mat3::from_cols_array(&[
            v[0], v[3], v[6], //
            v[1], v[4], v[7], //
            v[2], v[5], v[8],
        ]))
    }

    pub fn to_row_major(&self) -> [f32; 9] {
        let mut out = [0.0; 9];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = self.rc(row, col);
            }
        }
        out
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self(Mat3::from_translation(Vec2::new(tx, ty)))
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self(Mat3::from_scale(Vec2::new(sx, sy)))
    }

    pub fn rotate_degrees(degrees: f32) -> Self {
        Self(Mat3::from_angle(degrees.to_radians()))
    }

    pub fn skew(kx: f32, ky: f32) -> Self {
        Self::from_row_major([1.0, kx, 0.0, ky, 1.0, 0.0, 0.0, 0.0, 1.0])
    }

    /// Element at `row`, `col` in row-major terms.
    pub fn rc(&self, row: usize, col: usize) -> f32 {
        self.0.col(col)[row]
    }

    pub fn scale_x(&self) -> f32 {
        self.rc(0, 0)
    }

    pub fn scale_y(&self) -> f32 {
        self.rc(1, 1)
    }

    pub fn skew_x(&self) -> f32 {
        self.rc(0, 1)
    }

    pub fn skew_y(&self) -> f32 {
        self.rc(1, 0)
    }

    pub fn translate_x(&self) -> f32 {
        self.rc(0, 2)
    }

    pub fn translate_y(&self) -> f32 {
        self.rc(1, 2)
    }

    pub fn has_perspective(&self) -> bool {
        self.rc(2, 0) != 0.0 || self.rc(2, 1) != 0.0 || self.rc(2, 2) != 1.0
    }

    pub fn is_scale_translate(&self) -> bool {
        !self.has_perspective() && self.skew_x() == 0.0 && self.skew_y() == 0.0
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }

    /// `self * other`: `other` is applied first.
    pub fn concat(&self, other: &Self) -> Self {
        Self(self.0 * other.0)
    }

    /// `self = self * other`.
    pub fn pre_concat(&mut self, other: &Self) {
        self.0 *= other.0;
    }

    /// `self = other * self`.
    pub fn post_concat(&mut self, other: &Self) {
        self.0 = other.0 * self.0;
    }

    pub fn pre_scale(&mut self, sx: f32, sy: f32) {
        self.pre_concat(&Self::scale(sx, sy));
    }

    pub fn pre_translate(&mut self, tx: f32, ty: f32) {
        self.pre_concat(&Self::translate(tx, ty));
    }

    /// Inverse computed in `f64`, or `None` when the matrix is singular or
    /// the inverse would not be finite.
    pub fn invert(&self) -> Option<Self> {
        if !self.is_finite() {
            return None;
        }
        if self.is_scale_translate() {
            let (sx, sy) = (self.scale_x(), self.scale_y());
            if sx == 0.0 || sy == 0.0 {
                return None;
            }
        }
        let m = self.0.as_dmat3();
        let det = m.determinant();
        let limit = f64::from(NEARLY_ZERO).powi(3);
        if !det.is_finite() || det.abs() <= limit {
            return None;
        }
        let inv = m.inverse().as_mat3();
        inv.is_finite().then_some(Self(inv))
    }

    pub fn map_homogeneous(&self, p: Vec2) -> Vec3 {
        self.0 * p.extend(1.0)
    }

    pub fn map_point(&self, p: Vec2) -> Vec2 {
        if !self.has_perspective() {
            return self.0.transform_point2(p);
        }
        let h = self.map_homogeneous(p);
        let inv_w = if h.z != 0.0 { 1.0 / h.z } else { 0.0 };
        Vec2::new(h.x * inv_w, h.y * inv_w)
    }

    /// Maps a displacement. Under perspective this is the difference of the
    /// mapped vector tip and the mapped origin.
    pub fn map_vector(&self, v: Vec2) -> Vec2 {
        if !self.has_perspective() {
            return self.0.transform_vector2(v);
        }
        self.map_point(v) - self.map_point(Vec2::ZERO)
    }

    /// Bounds of the mapped rectangle. Under perspective the quad is first
    /// clipped to the visible side of the w = 0 plane.
    pub fn map_rect(&self, r: &Rect) -> Rect {
        if r.is_empty() {
            return Rect::EMPTY;
        }
        if self.is_scale_translate() {
            let (sx, sy) = (self.scale_x(), self.scale_y());
            let (tx, ty) = (self.translate_x(), self.translate_y());
            let (l, rt) = (sx * r.left + tx, sx * r.right + tx);
            let (t, b) = (sy * r.top + ty, sy * r.bottom + ty);
            return Rect::from_ltrb(l.min(rt), t.min(b), l.max(rt), t.max(b));
        }
        if !self.has_perspective() {
            let corners = r.corners().map(|c| self.map_point(c));
            return Rect::from_points(&corners);
        }

        let quad = r.corners().map(|c| self.map_homogeneous(c));
        let clipped = clip_to_w_plane(&quad);
        let projected: Vec<Vec2> = clipped.iter().map(|h| h.truncate() / h.z).collect();
        Rect::from_points(&projected)
    }

    /// Maps an integer rectangle. Scale+translate matrices are evaluated in
    /// `f64` and snapped with [`ROUND_EPSILON`] so exact integer results stay
    /// exact; everything else maps the real rectangle and rounds out.
    pub fn map_irect(&self, r: &IRect) -> IRect {
        if r.is_empty() {
            return IRect::EMPTY;
        }
        if self.is_scale_translate() {
            let (sx, sy) = (f64::from(self.scale_x()), f64::from(self.scale_y()));
            let (tx, ty) = (f64::from(self.translate_x()), f64::from(self.translate_y()));
            let l = sx * f64::from(r.left) + tx;
            let rt = sx * f64::from(r.right) + tx;
            let t = sy * f64::from(r.top) + ty;
            let b = sy * f64::from(r.bottom) + ty;
            return snap_out(l, t, rt, b);
        }
        self.map_rect(&Rect::from_irect(*r)).round_out()
    }

    /// Maps `r` by the inverse of `self`, or `None` if `self` is singular.
    pub fn inverse_map_rect(&self, r: &Rect) -> Option<Rect> {
        if r.is_empty() {
            return Some(Rect::EMPTY);
        }
        if self.is_scale_translate() {
            let (sx, sy) = (self.scale_x(), self.scale_y());
            if sx == 0.0 || sy == 0.0 {
                return None;
            }
            let (tx, ty) = (self.translate_x(), self.translate_y());
            let (l, rt) = ((r.left - tx) / sx, (r.right - tx) / sx);
            let (t, b) = ((r.top - ty) / sy, (r.bottom - ty) / sy);
            return Some(Rect::from_ltrb(l.min(rt), t.min(b), l.max(rt), t.max(b)));
        }
        self.invert().map(|inv| inv.map_rect(r))
    }

    /// Integer counterpart of [`Matrix::inverse_map_rect`] with the same
    /// precision rules as [`Matrix::map_irect`].
    pub fn inverse_map_irect(&self, r: &IRect) -> Option<IRect> {
        if r.is_empty() {
            return Some(IRect::EMPTY);
        }
        if self.is_scale_translate() {
            let (sx, sy) = (f64::from(self.scale_x()), f64::from(self.scale_y()));
            if sx == 0.0 || sy == 0.0 {
                return None;
            }
            let (tx, ty) = (f64::from(self.translate_x()), f64::from(self.translate_y()));
            let l = (f64::from(r.left) - tx) / sx;
            let rt = (f64::from(r.right) - tx) / sx;
            let t = (f64::from(r.top) - ty) / sy;
            let b = (f64::from(r.bottom) - ty) / sy;
            return Some(snap_out(l, t, rt, b));
        }
        self.inverse_map_rect(&Rect::from_irect(*r))
            .map(|mapped| mapped.round_out())
    }

    /// Splits `self` into `scale(sx, sy)` followed by a scale-free remainder,
    /// so that `self == remainder * scale(sx, sy)`.
    ///
    /// Fails for perspective matrices and for degenerate scale factors.
    pub fn decompose_scale(&self) -> Option<(Vec2, Self)> {
        if self.has_perspective() {
            return None;
        }
        let sx = Vec2::new(self.scale_x(), self.skew_y()).length();
        let sy = Vec2::new(self.skew_x(), self.scale_y()).length();
        if !sx.is_finite() || !sy.is_finite() || sx <= NEARLY_ZERO || sy <= NEARLY_ZERO {
            return None;
        }
        let mut remainder = *self;
        remainder.pre_scale(1.0 / sx, 1.0 / sy);
        Some((Vec2::new(sx, sy), remainder))
    }

    /// Local change in area (Jacobian determinant) of the projected mapping
    /// at `p`. Returns infinity when `p` maps to (or behind) the w = 0 plane.
    pub fn differential_area_scale(&self, p: Vec2) -> f32 {
        let w = self.map_homogeneous(p).z;
        if w < NEARLY_ZERO {
            return f32::INFINITY;
        }
        let det = self.0.as_dmat3().determinant();
        let w = f64::from(w);
        (det / (w * w * w)).abs() as f32
    }

    /// If `self` is within [`ROUND_EPSILON`] (element-wise) of a pure
    /// integer translation, returns that translation.
    pub fn nearly_integer_translation(&self) -> Option<IVec2> {
        let w = self.rc(2, 2);
        let tx = (self.rc(0, 2) / w + 0.5).floor();
        let ty = (self.rc(1, 2) / w + 0.5).floor();
        let expected = Self::translate(tx, ty).to_row_major();
        let nearly_equal = expected
            .iter()
            .zip(self.to_row_major())
            .all(|(e, m)| (e - m).abs() <= ROUND_EPSILON);
        nearly_equal.then(|| IVec2::new(tx as i32, ty as i32))
    }

    pub fn is_nearly_integer_translation(&self) -> bool {
        self.nearly_integer_translation().is_some()
    }

    /// True if the quad `self(a)` fully contains `b`.
    pub fn quad_contains_rect(&self, a: &Rect, b: &Rect) -> bool {
        if a.is_empty() || b.is_empty() {
            return false;
        }
        if self.is_scale_translate() {
            return self.map_rect(a).contains(b);
        }

        let homogeneous = a.corners().map(|c| self.map_homogeneous(c));
        if homogeneous.iter().any(|h| h.z < W_PLANE_DISTANCE) {
            return false;
        }
        let quad = homogeneous.map(|h| h.truncate() / h.z);
        let area: f32 = (0..4)
            .map(|i| quad[i].perp_dot(quad[(i + 1) % 4]))
            .sum();
        if area.abs() <= NEARLY_ZERO {
            return false;
        }
        let orientation = area.signum();
        b.corners().iter().all(|c| {
            (0..4).all(|i| {
                let edge = quad[(i + 1) % 4] - quad[i];
                orientation * edge.perp_dot(*c - quad[i]) >= 0.0
            })
        })
    }

    pub fn quad_contains_irect(&self, a: &IRect, b: &IRect) -> bool {
        self.quad_contains_rect(&Rect::from_irect(*a), &Rect::from_irect(*b))
    }
}

impl Mul for Matrix {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.concat(&rhs)
    }
}

fn snap_out(l: f64, t: f64, r: f64, b: f64) -> IRect {
    let eps = f64::from(ROUND_EPSILON);
    IRect::from_ltrb(
        (l.min(r) + eps).floor() as i32,
        (t.min(b) + eps).floor() as i32,
        (l.max(r) - eps).ceil() as i32,
        (t.max(b) - eps).ceil() as i32,
    )
}

/// Sutherland–Hodgman clip of a homogeneous polygon against `w >= W_PLANE_DISTANCE`.
fn clip_to_w_plane(polygon: &[Vec3]) -> Vec<Vec3> {
    let mut out = Vec::with_capacity(polygon.len() + 2);
    for (i, &p) in polygon.iter().enumerate() {
        let q = polygon[(i + 1) % polygon.len()];
        let (dp, dq) = (p.z - W_PLANE_DISTANCE, q.z - W_PLANE_DISTANCE);
        if dp >= 0.0 {
            out.push(p);
        }
        if (dp >= 0.0) != (dq >= 0.0) {
            let t = dp / (dp - dq);
            out.push(p.lerp(q, t));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn perspective() -> Matrix {
        Matrix::from_row_major([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.001, 0.0, 1.0])
    }

    #[test]
    fn test_row_major_round_trip() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let m = Matrix::from_row_major(v);
        assert_eq!(m.to_row_major(), v);
        assert_eq!(m.translate_x(), 3.0);
        assert_eq!(m.skew_y(), 4.0);
    }

    #[test]
    fn test_skew_shears_axes() {
        let m = Matrix::skew(0.5, 0.0);
        assert!(!m.is_scale_translate());
        assert!((m.map_point(Vec2::new(0.0, 2.0)) - Vec2::new(1.0, 2.0)).length() < EPSILON);
        let r = m.map_rect(&Rect::from_xywh(0.0, 0.0, 2.0, 2.0));
        assert!((r.right - 3.0).abs() < EPSILON);
        assert!((r.bottom - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_concat_applies_rhs_first() {
        let m = Matrix::translate(10.0, 0.0) * Matrix::scale(2.0, 2.0);
        let p = m.map_point(Vec2::new(1.0, 1.0));
        assert!((p - Vec2::new(12.0, 2.0)).length() < EPSILON);
    }

    #[test]
    fn test_invert_singular() {
        assert!(Matrix::scale(0.0, 1.0).invert().is_none());
        let rank_one = Matrix::from_row_major([1.0, 2.0, 0.0, 2.0, 4.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(rank_one.invert().is_none());
    }

    #[test]
    fn test_invert_round_trip() {
        let m = Matrix::rotate_degrees(30.0) * Matrix::scale(2.0, 3.0);
        let inv = m.invert().expect("invertible");
        let p = Vec2::new(4.0, -7.0);
        assert!((inv.map_point(m.map_point(p)) - p).length() < 1e-4);
    }

    #[test]
    fn test_nearly_integer_translation() {
        assert_eq!(
            Matrix::translate(3.0, -4.0).nearly_integer_translation(),
            Some(IVec2::new(3, -4))
        );
        assert_eq!(
            Matrix::translate(3.0004, -3.9996).nearly_integer_translation(),
            Some(IVec2::new(3, -4))
        );
        assert_eq!(Matrix::translate(3.01, 0.0).nearly_integer_translation(), None);
        assert_eq!(Matrix::scale(1.01, 1.0).nearly_integer_translation(), None);
    }

    #[test]
    fn test_map_irect_keeps_precision() {
        // 1/3 scale: 30 / 3 = 10 exactly in infinite precision.
        let m = Matrix::scale(1.0 / 3.0, 1.0 / 3.0);
        let r = m.map_irect(&IRect::from_ltrb(0, 0, 30, 30));
        assert_eq!(r, IRect::from_ltrb(0, 0, 10, 10));
    }

    #[test]
    fn test_inverse_map_irect() {
        let m = Matrix::translate(5.0, 5.0) * Matrix::scale(2.0, 2.0);
        assert_eq!(
            m.inverse_map_irect(&IRect::from_ltrb(5, 5, 25, 25)),
            Some(IRect::from_ltrb(0, 0, 10, 10))
        );
        assert_eq!(
            Matrix::scale(0.0, 1.0).inverse_map_irect(&IRect::from_wh(4, 4)),
            None
        );
    }

    #[test]
    fn test_decompose_scale() {
        let m = Matrix::rotate_degrees(45.0) * Matrix::scale(2.0, 3.0);
        let (scale, remainder) = m.decompose_scale().expect("decomposable");
        assert!((scale - Vec2::new(2.0, 3.0)).length() < 1e-4);
        let rebuilt = remainder * Matrix::scale(scale.x, scale.y);
        for (a, b) in rebuilt.to_row_major().iter().zip(m.to_row_major()) {
            assert!((a - b).abs() < 1e-4, "rebuilt {a} vs {b}");
        }
        assert!(perspective().decompose_scale().is_none());
    }

    #[test]
    fn test_differential_area_scale_affine() {
        let m = Matrix::scale(2.0, 3.0);
        assert!((m.differential_area_scale(Vec2::new(10.0, 10.0)) - 6.0).abs() < EPSILON);
    }

    #[test]
    fn test_differential_area_scale_behind_plane() {
        let m = Matrix::from_row_major([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, -0.01, 0.0, 1.0]);
        // w = 1 - 0.01 * 200 < 0
        assert!(m.differential_area_scale(Vec2::new(200.0, 0.0)).is_infinite());
    }

    #[test]
    fn test_map_rect_perspective_clips_w_plane() {
        let m = Matrix::from_row_major([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, -0.01, 0.0, 1.0]);
        let r = m.map_rect(&Rect::from_ltrb(0.0, 0.0, 200.0, 10.0));
        assert!(r.is_finite(), "clipped bounds stay finite: {r:?}");
        assert!(r.right > 1000.0, "points near the plane project far away");
    }

    #[test]
    fn test_quad_contains_rect_rotated() {
        let m = Matrix::rotate_degrees(45.0);
        let a = Rect::from_ltrb(-10.0, -10.0, 10.0, 10.0);
        assert!(m.quad_contains_rect(&a, &Rect::from_ltrb(-5.0, -5.0, 5.0, 5.0)));
        assert!(!m.quad_contains_rect(&a, &Rect::from_ltrb(-10.0, -10.0, 10.0, 10.0)));
    }
}
