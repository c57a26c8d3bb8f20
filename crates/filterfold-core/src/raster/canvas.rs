//! Immediate-mode drawing into a [`Surface`].
//!
//! Every draw maps surface pixel centers back through the inverse of the
//! current matrix and shades them there, so perspective matrices need no
//! special casing. Blending is premultiplied source-over.

use glam::Vec2;

use crate::color::filter::{ColorFilter, TRANSPARENT};
use crate::geometry::matrix::Matrix;
use crate::geometry::rect::{IRect, Rect};
use crate::raster::image::SpecialImage;
use crate::raster::sampling::Sampling;
use crate::raster::surface::Surface;

pub struct Canvas<'a> {
    surface: &'a mut Surface,
    /// Drawing coordinates to surface pixels.
    matrix: Matrix,
}

impl<'a> Canvas<'a> {
    pub(crate) fn new(surface: &'a mut Surface) -> Self {
        Self {
            surface,
            matrix: Matrix::IDENTITY,
        }
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.matrix.pre_translate(dx, dy);
    }

    /// Applies `m` before the current matrix.
    pub fn concat(&mut self, m: &Matrix) {
        self.matrix.pre_concat(m);
    }

    /// Overwrites every pixel with `color`, ignoring the matrix.
    pub fn clear(&mut self, color: [f32; 4]) {
        self.surface.pixels_mut().fill(color);
    }

    pub fn fill_rect(&mut self, rect: &Rect, color: [f32; 4]) {
        let region = self.matrix.map_rect(rect).round_out();
        self.shade(region, |p| rect_contains_point(rect, p).then_some(color));
    }

    /// Fills the whole surface with what `filter` makes of transparent black.
    pub fn draw_paint(&mut self, filter: &dyn ColorFilter) {
        let color = filter.filter_color(TRANSPARENT);
        for px in self.surface.pixels_mut() {
            *px = src_over(color, *px);
        }
    }

    /// Draws `image` at the origin of the drawing coordinates. Only the
    /// mapped image bounds are touched.
    pub fn draw_image(
        &mut self,
        image: &SpecialImage,
        sampling: Sampling,
        filter: Option<&dyn ColorFilter>,
    ) {
        let bounds = Rect::from_irect(image.bounds());
        // One pixel of fringe catches filtered edges.
        let region = self.matrix.map_rect(&bounds).outset(1.0, 1.0).round_out();
        self.shade(region, |p| {
            let color = sampling.sample(image, p);
            Some(filter.map_or(color, |f| f.filter_color(color)))
        });
    }

    /// Shades the whole surface with `image` as a decal-tiled shader, so a
    /// flooding `filter` also colors everything outside the image.
    pub fn draw_image_shader(
        &mut self,
        image: &SpecialImage,
        sampling: Sampling,
        filter: Option<&dyn ColorFilter>,
    ) {
        let region = IRect::from_wh(self.surface.width(), self.surface.height());
        self.shade(region, |p| {
            let color = sampling.sample(image, p);
            Some(filter.map_or(color, |f| f.filter_color(color)))
        });
    }

    fn shade(&mut self, region: IRect, shader: impl Fn(Vec2) -> Option<[f32; 4]>) {
        let surface_bounds = IRect::from_wh(self.surface.width(), self.surface.height());
        let Some(region) = region.intersect(&surface_bounds) else {
            return;
        };
        let Some(inverse) = self.matrix.invert() else {
            tracing::debug!("Skipping draw under a singular canvas matrix");
            return;
        };

        let stride = self.surface.width() as usize;
        let perspective = inverse.has_perspective();
        let pixels = self.surface.pixels_mut();
        for y in region.top..region.bottom {
            for x in region.left..region.right {
                let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let h = inverse.map_homogeneous(center);
                if perspective && h.z <= 0.0 {
                    continue;
                }
                let local = if perspective {
                    Vec2::new(h.x / h.z, h.y / h.z)
                } else {
                    Vec2::new(h.x, h.y)
                };
                if let Some(color) = shader(local) {
                    let px = &mut pixels[y as usize * stride + x as usize];
                    *px = src_over(color, *px);
                }
            }
        }
    }
}

fn rect_contains_point(rect: &Rect, p: Vec2) -> bool {
    p.x >= rect.left && p.x < rect.right && p.y >= rect.top && p.y < rect.bottom
}

fn src_over(src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
    let inv = 1.0 - src[3];
    std::array::from_fn(|i| src[i] + dst[i] * inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::blend::{BlendColor, BlendMode};
    use crate::geometry::vector::ISize;
    use crate::raster::surface::SurfaceConfig;

    const EPSILON: f32 = 1e-5;
    const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

    fn surface(width: i32, height: i32) -> Surface {
        Surface::new(ISize::new(width, height), SurfaceConfig::default()).expect("allocates")
    }

    #[test]
    fn test_fill_rect_respects_translation() {
        let mut s = surface(4, 4);
        let mut canvas = s.canvas();
        canvas.translate(1.0, 2.0);
        canvas.fill_rect(&Rect::from_xywh(0.0, 0.0, 2.0, 1.0), RED);
        let image = s.snapshot();
        assert_eq!(image.pixel(1, 2), Some(RED));
        assert_eq!(image.pixel(2, 2), Some(RED));
        assert_eq!(image.pixel(0, 2), Some(TRANSPARENT));
        assert_eq!(image.pixel(1, 3), Some(TRANSPARENT));
    }

    #[test]
    fn test_translate_then_concat_order() {
        let mut s = surface(1, 1);
        let mut canvas = s.canvas();
        assert!(canvas.matrix().is_identity());
        canvas.translate(3.0, 0.0);
        canvas.concat(&Matrix::scale(2.0, 2.0));
        // The concatenated scale applies first, then the translation.
        let p = canvas.matrix().map_point(Vec2::new(1.0, 1.0));
        assert!((p - Vec2::new(5.0, 2.0)).length() < EPSILON);
    }

    #[test]
    fn test_draw_image_integer_translation_is_exact() {
        let src = SpecialImage::filled(2, 2, RED).expect("valid image");
        let mut s = surface(4, 4);
        let mut canvas = s.canvas();
        canvas.translate(1.0, 1.0);
        canvas.draw_image(&src, Sampling::Linear, None);
        let image = s.snapshot();
        for y in 0..4 {
            for x in 0..4 {
                let inside = (1..3).contains(&x) && (1..3).contains(&y);
                let expected = if inside { RED } else { TRANSPARENT };
                assert_eq!(image.pixel(x, y), Some(expected), "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_draw_image_scaled_up_nearest() {
        let src = SpecialImage::filled(1, 1, RED).expect("valid image");
        let mut s = surface(3, 3);
        let mut canvas = s.canvas();
        canvas.concat(&Matrix::scale(2.0, 2.0));
        canvas.draw_image(&src, Sampling::Nearest, None);
        let image = s.snapshot();
        assert_eq!(image.pixel(1, 1), Some(RED));
        assert_eq!(image.pixel(2, 1), Some(TRANSPARENT));
    }

    #[test]
    fn test_draw_image_shader_floods_outside() {
        let src = SpecialImage::filled(1, 1, RED).expect("valid image");
        let flood = BlendColor::from_components([0.0, 0.0, 1.0, 0.5], BlendMode::SrcOver);
        let mut s = surface(3, 1);
        s.canvas().draw_image_shader(&src, Sampling::Nearest, Some(&flood));
        let image = s.snapshot();
        assert_eq!(image.pixel(2, 0), Some([0.0, 0.0, 0.5, 0.5]));
        let inside = image.pixel(0, 0).expect("inside");
        assert!((inside[0] - 0.5).abs() < EPSILON, "red shows through: {inside:?}");
        assert!((inside[3] - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_draw_paint_fills_everything() {
        let flood = BlendColor::from_components([0.0, 1.0, 0.0, 0.5], BlendMode::Src);
        let mut s = surface(2, 2);
        s.canvas().draw_paint(&flood);
        let image = s.snapshot();
        assert_eq!(image.pixel(1, 1), Some([0.0, 0.5, 0.0, 0.5]));
    }

    #[test]
    fn test_singular_matrix_draws_nothing() {
        let mut s = surface(2, 2);
        let mut canvas = s.canvas();
        canvas.concat(&Matrix::scale(0.0, 1.0));
        canvas.fill_rect(&Rect::from_xywh(0.0, 0.0, 2.0, 2.0), RED);
        assert_eq!(s.snapshot().pixel(0, 0), Some(TRANSPARENT));
    }
}
