//! Sampling policies and the reconstruction kernels behind them.
//!
//! All sampling is decal-tiled: texels outside the image are transparent.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::raster::image::SpecialImage;

/// Mitchell–Netravali cubic filter parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicResampler {
    pub b: f32,
    pub c: f32,
}

impl CubicResampler {
    pub const MITCHELL: Self = Self {
        b: 1.0 / 3.0,
        c: 1.0 / 3.0,
    };
    pub const CATMULL_ROM: Self = Self { b: 0.0, c: 0.5 };

    fn weight(&self, x: f32) -> f32 {
        let (b, c) = (self.b, self.c);
        let x = x.abs();
        let x2 = x * x;
        let x3 = x2 * x;
        if x < 1.0 {
            ((12.0 - 9.0 * b - 6.0 * c) * x3 + (-18.0 + 12.0 * b + 6.0 * c) * x2 + (6.0 - 2.0 * b))
                / 6.0
        } else if x < 2.0 {
            ((-b - 6.0 * c) * x3 + (6.0 * b + 30.0 * c) * x2 + (-12.0 * b - 48.0 * c) * x
                + (8.0 * b + 24.0 * c))
                / 6.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Sampling {
    Nearest,
    /// Bilinear. Also the policy for steps that do not resample at all.
    #[default]
    Linear,
    Cubic(CubicResampler),
    /// Anisotropic filtering up to `max_aniso` taps. The CPU backend
    /// samples it bilinearly.
    Aniso { max_aniso: u32 },
}

impl Sampling {
    /// Samples `image` at `p`, in image pixel coordinates where pixel
    /// `(x, y)` covers `[x, x + 1) × [y, y + 1)`.
    pub fn sample(&self, image: &SpecialImage, p: Vec2) -> [f32; 4] {
        match self {
            Self::Nearest => image.pixel_decal(p.x.floor() as i32, p.y.floor() as i32),
            Self::Linear | Self::Aniso { .. } => sample_bilinear(image, p),
            Self::Cubic(cubic) => sample_bicubic(image, p, cubic),
        }
    }
}

/// Decides whether two consecutive resampling steps can be replaced by one
/// with the returned policy without visibly changing the output.
///
/// `*_is_integer` marks steps whose transform is an integer translation and
/// therefore never resamples; callers pass [`Sampling::Linear`] for them.
pub fn merge_sampling(
    current: Sampling,
    current_is_integer: bool,
    next: Sampling,
    next_is_integer: bool,
) -> Option<Sampling> {
    use Sampling::{Aniso, Cubic, Linear, Nearest};

    match (current, next) {
        (Aniso { max_aniso: a }, Aniso { max_aniso: b }) => Some(Aniso {
            max_aniso: a.max(b),
        }),
        (Aniso { .. }, Linear) => Some(current),
        (Linear, Aniso { .. }) => Some(next),
        (Cubic(_), Linear) => Some(current),
        (Cubic(a), Cubic(b)) if a == b => Some(current),
        (Linear, Cubic(_)) => Some(next),
        (Linear, Linear) => Some(Linear),
        // Nearest-neighbor texels stay aligned when the other step is an
        // integer translation.
        (Linear, Nearest) if current_is_integer => Some(Nearest),
        (Nearest, Linear) if next_is_integer => Some(Nearest),
        _ => None,
    }
}

fn sample_bilinear(image: &SpecialImage, p: Vec2) -> [f32; 4] {
    let fx = p.x - 0.5;
    let fy = p.y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;
    let (x0, y0) = (x0 as i32, y0 as i32);

    if tx == 0.0 && ty == 0.0 {
        return image.pixel_decal(x0, y0);
    }

    let taps = [
        (x0, y0, (1.0 - tx) * (1.0 - ty)),
        (x0 + 1, y0, tx * (1.0 - ty)),
        (x0, y0 + 1, (1.0 - tx) * ty),
        (x0 + 1, y0 + 1, tx * ty),
    ];
    let mut out = [0.0_f32; 4];
    for (x, y, w) in taps {
        if w == 0.0 {
            continue;
        }
        let px = image.pixel_decal(x, y);
        for c in 0..4 {
            out[c] += px[c] * w;
        }
    }
    out
}

fn sample_bicubic(image: &SpecialImage, p: Vec2, cubic: &CubicResampler) -> [f32; 4] {
    let fx = p.x - 0.5;
    let fy = p.y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;
    let (x0, y0) = (x0 as i32, y0 as i32);

    let wx: [f32; 4] = std::array::from_fn(|i| cubic.weight(tx - (i as f32 - 1.0)));
    let wy: [f32; 4] = std::array::from_fn(|j| cubic.weight(ty - (j as f32 - 1.0)));

    let mut out = [0.0_f32; 4];
    for (j, wyj) in wy.iter().enumerate() {
        for (i, wxi) in wx.iter().enumerate() {
            let w = wxi * wyj;
            if w == 0.0 {
                continue;
            }
            let px = image.pixel_decal(x0 + i as i32 - 1, y0 + j as i32 - 1);
            for c in 0..4 {
                out[c] += px[c] * w;
            }
        }
    }
    // Cubic filters overshoot; keep the result a valid premultiplied color.
    let a = out[3].clamp(0.0, 1.0);
    [
        out[0].clamp(0.0, a),
        out[1].clamp(0.0, a),
        out[2].clamp(0.0, a),
        a,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    fn checker() -> SpecialImage {
        let pixels = vec![
            [1.0, 0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0, 1.0],
            [0.0, 0.0, 1.0, 1.0],
            [1.0, 1.0, 1.0, 1.0],
        ];
        SpecialImage::from_pixels(2, 2, pixels).expect("valid image")
    }

    #[test]
    fn test_merge_table() {
        let cubic = Sampling::Cubic(CubicResampler::MITCHELL);
        let other_cubic = Sampling::Cubic(CubicResampler::CATMULL_ROM);
        let aniso = |n| Sampling::Aniso { max_aniso: n };

        assert_eq!(merge_sampling(aniso(2), false, aniso(8), false), Some(aniso(8)));
        assert_eq!(merge_sampling(aniso(4), false, Sampling::Linear, false), Some(aniso(4)));
        assert_eq!(merge_sampling(Sampling::Linear, false, aniso(4), false), Some(aniso(4)));
        assert_eq!(merge_sampling(cubic, false, Sampling::Linear, false), Some(cubic));
        assert_eq!(merge_sampling(cubic, false, cubic, false), Some(cubic));
        assert_eq!(merge_sampling(cubic, false, other_cubic, false), None);
        assert_eq!(merge_sampling(Sampling::Linear, false, cubic, false), Some(cubic));
        assert_eq!(
            merge_sampling(Sampling::Linear, false, Sampling::Linear, false),
            Some(Sampling::Linear)
        );
    }

    #[test]
    fn test_merge_nearest_needs_integer_partner() {
        assert_eq!(
            merge_sampling(Sampling::Linear, true, Sampling::Nearest, false),
            Some(Sampling::Nearest)
        );
        assert_eq!(
            merge_sampling(Sampling::Nearest, false, Sampling::Linear, true),
            Some(Sampling::Nearest)
        );
        assert_eq!(
            merge_sampling(Sampling::Linear, false, Sampling::Nearest, false),
            None
        );
        assert_eq!(
            merge_sampling(Sampling::Nearest, false, Sampling::Nearest, false),
            None
        );
    }

    #[test]
    fn test_bilinear_at_texel_center_is_exact() {
        let image = checker();
        let px = Sampling::Linear.sample(&image, Vec2::new(1.5, 0.5));
        assert_eq!(px, [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_bilinear_blends_with_transparent_outside() {
        let image = checker();
        // Halfway between texel (0,0) and the transparent column at x = -1.
        let px = Sampling::Linear.sample(&image, Vec2::new(0.0, 0.5));
        assert!((px[0] - 0.5).abs() < EPSILON);
        assert!((px[3] - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_nearest_outside_is_transparent() {
        let image = checker();
        assert_eq!(Sampling::Nearest.sample(&image, Vec2::new(-0.5, 0.5)), [0.0; 4]);
        assert_eq!(
            Sampling::Nearest.sample(&image, Vec2::new(1.9, 1.1)),
            [1.0, 1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_catmull_rom_interpolates_texels() {
        let image = checker();
        let px = Sampling::Cubic(CubicResampler::CATMULL_ROM).sample(&image, Vec2::new(0.5, 0.5));
        assert!((px[0] - 1.0).abs() < 1e-5, "{px:?}");
    }

    #[test]
    fn test_sampling_from_json() {
        let s: Sampling = serde_json::from_str(r#"{ "mode": "cubic", "b": 0.0, "c": 0.5 }"#)
            .expect("valid sampling");
        assert_eq!(s, Sampling::Cubic(CubicResampler::CATMULL_ROM));
    }
}
