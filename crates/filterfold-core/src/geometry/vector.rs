//! Non-positional geometry: vectors and sizes.
//!
//! Points are plain [`glam::Vec2`] / [`glam::IVec2`]. Vectors and sizes get
//! their own types because a matrix maps them without translation.

use std::ops::{Add, Neg, Sub};

use glam::{IVec2, Vec2};

/// Displacement in real coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector(pub Vec2);

/// Displacement in integer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IVector(pub IVec2);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ISize {
    pub width: i32,
    pub height: i32,
}

impl Vector {
    pub const fn new(x: f32, y: f32) -> Self {
        Self(Vec2::new(x, y))
    }
}

impl IVector {
    pub const fn new(x: i32, y: i32) -> Self {
        Self(IVec2::new(x, y))
    }
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

impl ISize {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Pixel count, or `None` for empty sizes.
    pub fn area(&self) -> Option<u64> {
        (!self.is_empty()).then(|| self.width as u64 * self.height as u64)
    }
}

impl Add for Vector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Vector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Vector {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Add for IVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for IVector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for IVector {
    type Output = Self;

    fn neg(self) -> Self {
        Self(IVec2::new(self.0.x.saturating_neg(), self.0.y.saturating_neg()))
    }
}
