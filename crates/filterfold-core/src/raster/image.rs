//! Immutable, shareable pixel buffers.

use std::fmt;
use std::sync::Arc;

use glam::IVec2;

use crate::color::filter::TRANSPARENT;
use crate::error::FilterError;
use crate::geometry::rect::IRect;
use crate::geometry::vector::ISize;

/// A read-only image in premultiplied linear RGBA f32.
///
/// Pixels live in a shared backing buffer; [`SpecialImage::make_subset`]
/// returns a view onto the same buffer without copying. Coordinates passed
/// to the accessors are relative to the view's top-left corner.
#[derive(Clone)]
pub struct SpecialImage {
    pixels: Arc<[[f32; 4]]>,
    /// Width of the backing buffer.
    row_stride: usize,
    /// View rectangle within the backing buffer.
    subset: IRect,
}

impl fmt::Debug for SpecialImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecialImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("subset", &self.subset)
            .finish_non_exhaustive()
    }
}

impl SpecialImage {
    /// Wraps premultiplied pixels laid out row-major, `width * height` long.
    pub fn from_pixels(width: i32, height: i32, pixels: Vec<[f32; 4]>) -> Result<Self, FilterError> {
        if width <= 0 || height <= 0 {
            return Err(FilterError::InvalidArgument(
                "image dimensions must be positive",
            ));
        }
        if pixels.len() != width as usize * height as usize {
            return Err(FilterError::InvalidArgument(
                "pixel count does not match image dimensions",
            ));
        }
        Ok(Self {
            pixels: pixels.into(),
            row_stride: width as usize,
            subset: IRect::from_wh(width, height),
        })
    }

    /// An image where every pixel is the premultiplied `color`.
    pub fn filled(width: i32, height: i32, color: [f32; 4]) -> Result<Self, FilterError> {
        let count = (width.max(0) as usize) * (height.max(0) as usize);
        Self::from_pixels(width, height, vec![color; count])
    }

    /// Imports unpremultiplied 8-bit RGBA, treating channel values as linear.
    pub fn from_rgba8(image: &image::RgbaImage) -> Result<Self, FilterError> {
        let (width, height) = image.dimensions();
        let pixels = image
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0.map(|c| c as f32 / 255.0);
                [r * a, g * a, b * a, a]
            })
            .collect();
        Self::from_pixels(dimension(width)?, dimension(height)?, pixels)
    }

    /// Imports unpremultiplied linear RGBA f32.
    pub fn from_rgba32f_image(image: &image::Rgba32FImage) -> Result<Self, FilterError> {
        let (width, height) = image.dimensions();
        let pixels = image
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                [r * a, g * a, b * a, a]
            })
            .collect();
        Self::from_pixels(dimension(width)?, dimension(height)?, pixels)
    }

    /// Imports premultiplied RGBA f32 samples, four per pixel.
    pub fn from_rgba32f(width: i32, height: i32, samples: &[f32]) -> Result<Self, FilterError> {
        let pixels: &[[f32; 4]] = bytemuck::try_cast_slice(samples)
            .map_err(|_| FilterError::InvalidArgument("sample count is not a multiple of 4"))?;
        Self::from_pixels(width, height, pixels.to_vec())
    }

    pub fn width(&self) -> i32 {
        self.subset.width()
    }

    pub fn height(&self) -> i32 {
        self.subset.height()
    }

    pub fn dimensions(&self) -> ISize {
        self.subset.size()
    }

    /// `(0, 0, width, height)`.
    pub fn bounds(&self) -> IRect {
        IRect::from_wh(self.width(), self.height())
    }

    /// The pixel at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: i32, y: i32) -> Option<[f32; 4]> {
        if !self.bounds().contains_point(IVec2::new(x, y)) {
            return None;
        }
        let bx = (self.subset.left + x) as usize;
        let by = (self.subset.top + y) as usize;
        self.pixels.get(by * self.row_stride + bx).copied()
    }

    /// Like [`Self::pixel`] but transparent outside the image.
    pub fn pixel_decal(&self, x: i32, y: i32) -> [f32; 4] {
        self.pixel(x, y).unwrap_or(TRANSPARENT)
    }

    /// A view of `rect` (relative to this image) sharing the same pixels.
    /// Returns `None` unless `rect` is non-empty and inside the image.
    pub fn make_subset(&self, rect: IRect) -> Option<Self> {
        if rect.is_empty() || !self.bounds().contains(&rect) {
            return None;
        }
        Some(Self {
            pixels: Arc::clone(&self.pixels),
            row_stride: self.row_stride,
            subset: rect.offset(self.subset.top_left()),
        })
    }

    /// True if both images are views of the same backing buffer.
    pub fn shares_pixels_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Copies the visible pixels out row-major.
    pub fn to_pixels(&self) -> Vec<[f32; 4]> {
        let mut out = Vec::with_capacity(self.width() as usize * self.height() as usize);
        for y in self.subset.top..self.subset.bottom {
            let start = y as usize * self.row_stride + self.subset.left as usize;
            let end = start + self.width() as usize;
            out.extend_from_slice(&self.pixels[start..end]);
        }
        out
    }

    /// Exports unpremultiplied 8-bit RGBA.
    pub fn to_rgba8(&self) -> image::RgbaImage {
        let mut out = image::RgbaImage::new(self.width() as u32, self.height() as u32);
        for (dst, src) in out.pixels_mut().zip(self.to_pixels()) {
            let a = src[3].clamp(0.0, 1.0);
            let unpremul = |c: f32| if a > 0.0 { (c / a).clamp(0.0, 1.0) } else { 0.0 };
            dst.0 = [unpremul(src[0]), unpremul(src[1]), unpremul(src[2]), a]
                .map(|c| (c * 255.0).round() as u8);
        }
        out
    }

    /// Exports unpremultiplied linear RGBA f32.
    pub fn to_rgba32f_image(&self) -> image::Rgba32FImage {
        let mut out = image::Rgba32FImage::new(self.width() as u32, self.height() as u32);
        for (dst, [r, g, b, a]) in out.pixels_mut().zip(self.to_pixels()) {
            dst.0 = if a > 0.0 {
                [r / a, g / a, b / a, a]
            } else {
                TRANSPARENT
            };
        }
        out
    }

    /// Exports premultiplied RGBA f32 samples, four per pixel.
    pub fn to_rgba32f(&self) -> Vec<f32> {
        bytemuck::cast_slice(&self.to_pixels()).to_vec()
    }
    /// Wraps pixels produced by a surface. Dimensions were validated when
    /// the surface was created.
    pub(crate) fn from_surface(width: i32, height: i32, pixels: Vec<[f32; 4]>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize);
        Self {
            pixels: pixels.into(),
            row_stride: width as usize,
            subset: IRect::from_wh(width, height),
        }
    }
}

fn dimension(v: u32) -> Result<i32, FilterError> {
    i32::try_from(v).map_err(|_| FilterError::InvalidArgument("image dimension overflows i32"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: i32, height: i32) -> SpecialImage {
        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| [x as f32 / 10.0, y as f32 / 10.0, 0.0, 1.0]))
            .collect();
        SpecialImage::from_pixels(width, height, pixels).expect("valid image")
    }

    #[test]
    fn test_rejects_mismatched_pixels() {
        assert!(SpecialImage::from_pixels(2, 2, vec![[0.0; 4]; 3]).is_err());
        assert!(SpecialImage::from_pixels(0, 2, Vec::new()).is_err());
        assert!(SpecialImage::from_rgba32f(1, 1, &[0.0; 3]).is_err());
    }

    #[test]
    fn test_subset_shares_pixels() {
        let image = gradient(4, 4);
        let sub = image.make_subset(IRect::from_ltrb(1, 2, 3, 4)).expect("inside");
        assert!(sub.shares_pixels_with(&image));
        assert_eq!(sub.dimensions(), ISize::new(2, 2));
        assert_eq!(sub.pixel(0, 0), image.pixel(1, 2));
        assert_eq!(sub.pixel(2, 0), None);
        assert_eq!(sub.pixel_decal(-1, 0), TRANSPARENT);
    }

    #[test]
    fn test_nested_subset() {
        let image = gradient(6, 6);
        let a = image.make_subset(IRect::from_ltrb(1, 1, 5, 5)).expect("inside");
        let b = a.make_subset(IRect::from_ltrb(1, 1, 3, 3)).expect("inside");
        assert_eq!(b.pixel(0, 0), image.pixel(2, 2));
        assert_eq!(b.to_pixels().len(), 4);
    }

    #[test]
    fn test_subset_outside_fails() {
        let image = gradient(4, 4);
        assert!(image.make_subset(IRect::from_ltrb(2, 2, 5, 3)).is_none());
        assert!(image.make_subset(IRect::EMPTY).is_none());
    }

    #[test]
    fn test_rgba8_premultiplies() {
        let mut src = image::RgbaImage::new(1, 1);
        src.put_pixel(0, 0, image::Rgba([255, 0, 0, 51]));
        let image = SpecialImage::from_rgba8(&src).expect("valid image");
        let px = image.pixel(0, 0).expect("inside");
        assert!((px[0] - 0.2).abs() < 1e-6);
        assert!((px[3] - 0.2).abs() < 1e-6);
        assert_eq!(image.to_rgba8().get_pixel(0, 0).0, [255, 0, 0, 51]);
    }

    #[test]
    fn test_rgba32f_image_roundtrip_unpremultiplies() {
        let mut src = image::Rgba32FImage::new(1, 1);
        src.put_pixel(0, 0, image::Rgba([0.5, 1.0, 0.0, 0.5]));
        let image = SpecialImage::from_rgba32f_image(&src).expect("valid image");
        assert_eq!(image.pixel(0, 0), Some([0.25, 0.5, 0.0, 0.5]));
        assert_eq!(image.to_rgba32f_image().get_pixel(0, 0).0, [0.5, 1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_rgba32f_export() {
        let image = SpecialImage::filled(2, 1, [0.5, 0.25, 0.0, 0.5]).expect("valid image");
        assert_eq!(
            image.to_rgba32f(),
            vec![0.5, 0.25, 0.0, 0.5, 0.5, 0.25, 0.0, 0.5]
        );
    }
}
