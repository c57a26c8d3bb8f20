//! Constant-color blend filters.

use palette::{LinSrgba, Srgba};
use serde::{Deserialize, Serialize};

use crate::color::filter::ColorFilter;

/// How the constant color (source) combines with the filtered pixel
/// (destination). Porter–Duff naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// `src + dst × (1 − src.a)`
    SrcOver,
    /// `src`
    Src,
    /// `src × dst`
    Modulate,
    /// `dst × src.a`
    DstIn,
}

/// Blends a constant color with every pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendColor {
    /// Premultiplied.
    color: [f32; 4],
    mode: BlendMode,
}

impl BlendColor {
    pub fn new(color: LinSrgba, mode: BlendMode) -> Self {
        let (r, g, b, a) = color.into_components();
        Self::from_components([r, g, b, a], mode)
    }

    /// Converts an sRGB-encoded color to linear first.
    pub fn from_srgba(color: Srgba, mode: BlendMode) -> Self {
        let linear: LinSrgba = color.into_linear();
        Self::new(linear, mode)
    }

    /// `rgba` is unpremultiplied linear color.
    pub fn from_components(rgba: [f32; 4], mode: BlendMode) -> Self {
        let a = rgba[3].clamp(0.0, 1.0);
        let color = [
            rgba[0].clamp(0.0, 1.0) * a,
            rgba[1].clamp(0.0, 1.0) * a,
            rgba[2].clamp(0.0, 1.0) * a,
            a,
        ];
        Self { color, mode }
    }

    pub fn mode(&self) -> BlendMode {
        self.mode
    }

    pub fn premul_color(&self) -> [f32; 4] {
        self.color
    }
}

impl ColorFilter for BlendColor {
    fn filter_color(&self, dst: [f32; 4]) -> [f32; 4] {
        let src = self.color;
        let mut out = [0.0_f32; 4];
        for c in 0..4 {
            out[c] = match self.mode {
                BlendMode::SrcOver => src[c] + dst[c] * (1.0 - src[3]),
                BlendMode::Src => src[c],
                BlendMode::Modulate => src[c] * dst[c],
                BlendMode::DstIn => dst[c] * src[3],
            };
        }
        out
    }

    fn affects_transparent_black(&self) -> bool {
        matches!(self.mode, BlendMode::SrcOver | BlendMode::Src) && self.color[3] > 0.0
    }
}
