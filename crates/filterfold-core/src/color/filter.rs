//! Per-pixel color filters.
//!
//! The compositor never inspects what a filter does beyond two questions:
//! does it turn transparent black into something visible
//! ([`ColorFilter::affects_transparent_black`]), and how to chain it after
//! another filter ([`compose`]). Everything else is the filter's business.
//!
//! All colors are premultiplied linear RGBA.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::color::blend::{BlendColor, BlendMode};

pub const TRANSPARENT: [f32; 4] = [0.0; 4];

pub trait ColorFilter: fmt::Debug + Send + Sync {
    /// Filters one premultiplied color.
    fn filter_color(&self, premul: [f32; 4]) -> [f32; 4];

    /// True if transparent input produces visible output, i.e. the filter
    /// floods any region it is applied over.
    fn affects_transparent_black(&self) -> bool {
        self.filter_color(TRANSPARENT) != TRANSPARENT
    }
}

/// Color filters are immutable and shared between deferred results.
pub type SharedColorFilter = Arc<dyn ColorFilter>;

/// True when `filter` would fill the whole crop of whatever it is applied to.
pub fn floods(filter: Option<&dyn ColorFilter>) -> bool {
    filter.is_some_and(|f| f.affects_transparent_black())
}

/// Chains `outer` after `inner`. A missing `inner` is the identity.
pub fn compose(outer: SharedColorFilter, inner: Option<SharedColorFilter>) -> SharedColorFilter {
    match inner {
        None => outer,
        Some(inner) => Arc::new(Composed { outer, inner }),
    }
}

/// `outer(inner(color))`.
#[derive(Debug)]
pub struct Composed {
    outer: SharedColorFilter,
    inner: SharedColorFilter,
}

impl ColorFilter for Composed {
    fn filter_color(&self, premul: [f32; 4]) -> [f32; 4] {
        self.outer.filter_color(self.inner.filter_color(premul))
    }
}

/// A 4×5 row-major color matrix applied to unpremultiplied color; the last
/// column is a constant offset. Results are clamped to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMatrix {
    m: [f32; 20],
}

impl ColorMatrix {
    pub const fn new(m: [f32; 20]) -> Self {
        Self { m }
    }

    pub const fn identity() -> Self {
        Self::new([
            1.0, 0.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    pub const fn scale(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::new([
            r, 0.0, 0.0, 0.0, 0.0, //
            0.0, g, 0.0, 0.0, 0.0, //
            0.0, 0.0, b, 0.0, 0.0, //
            0.0, 0.0, 0.0, a, 0.0,
        ])
    }

    /// Rec. 709 saturation matrix; `0.0` is grayscale, `1.0` the identity.
    pub fn saturation(s: f32) -> Self {
        const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];
        let mut m = Self::identity().m;
        for row in 0..3 {
            for col in 0..3 {
                let diag = if row == col { 1.0 } else { 0.0 };
                m[row * 5 + col] = LUMA[col] * (1.0 - s) + diag * s;
            }
        }
        Self::new(m)
    }

    pub fn values(&self) -> &[f32; 20] {
        &self.m
    }
}

impl ColorFilter for ColorMatrix {
    fn filter_color(&self, premul: [f32; 4]) -> [f32; 4] {
        let a = premul[3];
        let inv_a = if a > 0.0 { 1.0 / a } else { 0.0 };
        let rgba = [premul[0] * inv_a, premul[1] * inv_a, premul[2] * inv_a, a];

        let m = &self.m;
        let mut out = [0.0_f32; 4];
        for (row, o) in out.iter_mut().enumerate() {
            let r = &m[row * 5..row * 5 + 5];
            *o = (r[0] * rgba[0] + r[1] * rgba[1] + r[2] * rgba[2] + r[3] * rgba[3] + r[4])
                .clamp(0.0, 1.0);
        }
        let out_a = out[3];
        [out[0] * out_a, out[1] * out_a, out[2] * out_a, out_a]
    }
}

/// Serializable description of a color filter, used by pipeline configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColorFilterDesc {
    Matrix { values: [f32; 20] },
    /// `color` is unpremultiplied linear RGBA.
    Blend { color: [f32; 4], mode: BlendMode },
}

impl ColorFilterDesc {
    pub fn build(&self) -> SharedColorFilter {
        match self {
            Self::Matrix { values } => Arc::new(ColorMatrix::new(*values)),
            Self::Blend { color, mode } => {
                Arc::new(BlendColor::from_components(*color, *mode))
            }
        }
    }
}
