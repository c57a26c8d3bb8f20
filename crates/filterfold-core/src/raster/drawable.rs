//! Caller-supplied vector content that can be rasterized on demand.

use glam::IVec2;

use crate::geometry::rect::Rect;
use crate::geometry::space::ParamSpace;
use crate::raster::canvas::Canvas;
use crate::raster::image::SpecialImage;
use crate::raster::surface::{SurfaceConfig, SurfaceFactory};

/// Content authored in parameter space, drawn through a [`Canvas`] whose
/// matrix already maps parameter space onto the target surface.
pub trait Drawable: Send + Sync {
    /// Conservative parameter-space bounds of everything `draw` touches.
    fn bounds(&self) -> ParamSpace<Rect>;

    fn draw(&self, canvas: &mut Canvas<'_>);

    /// Rasterizes the content 1:1 over its rounded-out bounds. Returns the
    /// image and the parameter-space position of its top-left pixel.
    fn snapshot(
        &self,
        factory: &dyn SurfaceFactory,
        config: &SurfaceConfig,
    ) -> Option<(SpecialImage, ParamSpace<IVec2>)> {
        let bounds = self.bounds().round_out();
        if bounds.is_empty() {
            return None;
        }
        let mut surface = factory.make_surface(bounds.size().raw(), config)?;
        {
            let mut canvas = surface.canvas();
            canvas.translate(-(bounds.left() as f32), -(bounds.top() as f32));
            self.draw(&mut canvas);
        }
        Some((surface.snapshot(), bounds.top_left()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::surface::RasterSurfaceFactory;

    struct Square;

    impl Drawable for Square {
        fn bounds(&self) -> ParamSpace<Rect> {
            ParamSpace::new(Rect::from_ltrb(2.0, 3.0, 4.0, 5.0))
        }

        fn draw(&self, canvas: &mut Canvas<'_>) {
            canvas.fill_rect(self.bounds().as_raw(), [1.0, 1.0, 1.0, 1.0]);
        }
    }

    #[test]
    fn test_snapshot_covers_bounds() {
        let factory = RasterSurfaceFactory::new();
        let (image, origin) = Square
            .snapshot(&factory, &SurfaceConfig::default())
            .expect("rasterizes");
        assert_eq!(origin.raw(), IVec2::new(2, 3));
        assert_eq!((image.width(), image.height()), (2, 2));
        assert!(image.to_pixels().iter().all(|px| *px == [1.0; 4]));
    }

    #[test]
    fn test_snapshot_fails_without_surface() {
        let factory = RasterSurfaceFactory::with_max_pixels(1);
        assert!(Square.snapshot(&factory, &SurfaceConfig::default()).is_none());
    }
}
