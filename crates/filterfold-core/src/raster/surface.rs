//! Writable pixel targets and the factory that allocates them.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::FilterError;
use crate::geometry::vector::ISize;
use crate::raster::canvas::Canvas;
use crate::raster::image::SpecialImage;

/// Storage precision of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorType {
    /// 8 bits per channel. Snapshots are quantized to 1/255 steps.
    Rgba8888,
    #[default]
    RgbaF32,
}

impl fmt::Display for ColorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgba8888 => write!(f, "RGBA 8-bit"),
            Self::RgbaF32 => write!(f, "RGBA 32-bit float"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaType {
    #[default]
    Premul,
    /// Alpha is forced to 1 when the surface is snapshotted.
    Opaque,
}

/// Pixel configuration for intermediate surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub color_type: ColorType,
    pub alpha_type: AlphaType,
}

/// A mutable raster target, cleared to transparent on creation.
#[derive(Debug, Clone)]
pub struct Surface {
    width: i32,
    height: i32,
    pixels: Vec<[f32; 4]>,
    config: SurfaceConfig,
}

impl Surface {
    pub fn new(size: ISize, config: SurfaceConfig) -> Result<Self, FilterError> {
        let failed = || FilterError::SurfaceAllocation {
            width: size.width,
            height: size.height,
        };
        let count = size
            .area()
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| n.checked_mul(mem::size_of::<[f32; 4]>()).is_some())
            .ok_or_else(failed)?;

        let mut pixels = Vec::new();
        pixels.try_reserve_exact(count).map_err(|_| failed())?;
        pixels.resize(count, [0.0; 4]);
        Ok(Self {
            width: size.width,
            height: size.height,
            pixels,
            config,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    /// A canvas drawing into this surface with an identity matrix.
    pub fn canvas(&mut self) -> Canvas<'_> {
        Canvas::new(self)
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [[f32; 4]] {
        &mut self.pixels
    }

    /// Freezes the surface into an image, applying the configured storage.
    pub fn snapshot(self) -> SpecialImage {
        let Self {
            width,
            height,
            mut pixels,
            config,
        } = self;

        if config.color_type == ColorType::Rgba8888 {
            for px in &mut pixels {
                *px = px.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() / 255.0);
            }
        }
        if config.alpha_type == AlphaType::Opaque {
            for px in &mut pixels {
                px[3] = 1.0;
            }
        }
        SpecialImage::from_surface(width, height, pixels)
    }
}

/// Allocates intermediate surfaces on behalf of the compositor.
pub trait SurfaceFactory: fmt::Debug + Send + Sync {
    /// Returns `None` when a surface of `size` cannot be provided.
    fn make_surface(&self, size: ISize, config: &SurfaceConfig) -> Option<Surface>;
}

/// Heap-backed surfaces with an optional pixel budget.
#[derive(Debug, Default)]
pub struct RasterSurfaceFactory {
    max_pixels: Option<u64>,
    allocations: AtomicUsize,
}

impl RasterSurfaceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses any surface with more than `max_pixels` pixels.
    pub fn with_max_pixels(max_pixels: u64) -> Self {
        Self {
            max_pixels: Some(max_pixels),
            allocations: AtomicUsize::new(0),
        }
    }

    /// Number of surfaces handed out so far.
    pub fn allocation_count(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }
}

impl SurfaceFactory for RasterSurfaceFactory {
    fn make_surface(&self, size: ISize, config: &SurfaceConfig) -> Option<Surface> {
        let Some(area) = size.area() else {
            tracing::warn!("Refusing empty surface {}x{}", size.width, size.height);
            return None;
        };
        if self.max_pixels.is_some_and(|max| area > max) {
            tracing::warn!(
                "Surface {}x{} exceeds the pixel budget of {:?}",
                size.width,
                size.height,
                self.max_pixels
            );
            return None;
        }

        match Surface::new(size, *config) {
            Ok(surface) => {
                self.allocations.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    "Allocated {}x{} {} surface",
                    size.width,
                    size.height,
                    config.color_type
                );
                Some(surface)
            }
            Err(e) => {
                tracing::warn!("{e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_counts_allocations() {
        let factory = RasterSurfaceFactory::new();
        assert_eq!(factory.allocation_count(), 0);
        let surface = factory
            .make_surface(ISize::new(3, 2), &SurfaceConfig::default())
            .expect("allocates");
        assert_eq!((surface.width(), surface.height()), (3, 2));
        assert_eq!(factory.allocation_count(), 1);
    }

    #[test]
    fn test_factory_rejects_empty_and_oversized() {
        let factory = RasterSurfaceFactory::with_max_pixels(16);
        let config = SurfaceConfig::default();
        assert!(factory.make_surface(ISize::new(0, 4), &config).is_none());
        assert!(factory.make_surface(ISize::new(5, 4), &config).is_none());
        assert!(factory.make_surface(ISize::new(4, 4), &config).is_some());
        assert_eq!(factory.allocation_count(), 1);
    }

    #[test]
    fn test_unbounded_factory_refuses_unaddressable_size() {
        let factory = RasterSurfaceFactory::new();
        let size = ISize::new(i32::MAX, i32::MAX);
        assert!(matches!(
            Surface::new(size, SurfaceConfig::default()),
            Err(FilterError::SurfaceAllocation { .. })
        ));
        assert!(factory.make_surface(size, &SurfaceConfig::default()).is_none());
        assert_eq!(factory.allocation_count(), 0);
    }

    #[test]
    fn test_snapshot_quantizes_8bit() {
        let config = SurfaceConfig {
            color_type: ColorType::Rgba8888,
            alpha_type: AlphaType::Premul,
        };
        let mut surface = Surface::new(ISize::new(1, 1), config).expect("allocates");
        surface.canvas().clear([0.5, 0.0, 0.0, 1.2]);
        let px = surface.snapshot().pixel(0, 0).expect("inside");
        assert_eq!(px[0], 128.0 / 255.0);
        assert_eq!(px[3], 1.0);
    }

    #[test]
    fn test_snapshot_opaque_forces_alpha() {
        let config = SurfaceConfig {
            alpha_type: AlphaType::Opaque,
            ..SurfaceConfig::default()
        };
        let surface = Surface::new(ISize::new(2, 2), config).expect("allocates");
        let image = surface.snapshot();
        assert_eq!(image.pixel(1, 1), Some([0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_config_from_json() {
        let config: SurfaceConfig =
            serde_json::from_str(r#"{ "color_type": "rgba8888" }"#).expect("valid config");
        assert_eq!(config.color_type, ColorType::Rgba8888);
        assert_eq!(config.alpha_type, AlphaType::Premul);
        assert_eq!(config.color_type.to_string(), "RGBA 8-bit");
    }
}
