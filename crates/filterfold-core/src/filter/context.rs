//! Per-evaluation state shared by every operator.

use std::sync::Arc;

use crate::geometry::mapping::Mapping;
use crate::geometry::rect::IRect;
use crate::geometry::space::LayerSpace;
use crate::geometry::vector::ISize;
use crate::raster::surface::{Surface, SurfaceConfig, SurfaceFactory};

/// What the caller wants out of an evaluation and how intermediate pixels
/// may be allocated. Immutable; derive variants with the `with_*` methods.
#[derive(Debug, Clone)]
pub struct Context {
    mapping: Mapping,
    desired_output: LayerSpace<IRect>,
    surface_config: SurfaceConfig,
    factory: Arc<dyn SurfaceFactory>,
}

impl Context {
    pub fn new(
        mapping: Mapping,
        desired_output: LayerSpace<IRect>,
        surface_config: SurfaceConfig,
        factory: Arc<dyn SurfaceFactory>,
    ) -> Self {
        Self {
            mapping,
            desired_output,
            surface_config,
            factory,
        }
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// The only region of layer space anyone will look at.
    pub fn desired_output(&self) -> LayerSpace<IRect> {
        self.desired_output
    }

    pub fn surface_config(&self) -> &SurfaceConfig {
        &self.surface_config
    }

    pub fn factory(&self) -> &Arc<dyn SurfaceFactory> {
        &self.factory
    }

    pub fn with_desired_output(&self, desired_output: LayerSpace<IRect>) -> Self {
        Self {
            desired_output,
            ..self.clone()
        }
    }

    pub fn with_mapping(&self, mapping: Mapping) -> Self {
        Self {
            mapping,
            ..self.clone()
        }
    }

    /// A transparent surface in the context's pixel configuration, or
    /// `None` if the factory cannot provide one.
    pub fn make_surface(&self, size: LayerSpace<ISize>) -> Option<Surface> {
        let size = size.raw();
        let surface = self.factory.make_surface(size, &self.surface_config);
        if surface.is_none() {
            tracing::warn!(
                "Surface allocation failed for {}x{}; result is transparent",
                size.width,
                size.height
            );
        }
        surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::matrix::Matrix;
    use crate::raster::surface::RasterSurfaceFactory;

    fn context() -> Context {
        Context::new(
            Mapping::default(),
            LayerSpace::new(IRect::from_wh(8, 8)),
            SurfaceConfig::default(),
            Arc::new(RasterSurfaceFactory::new()),
        )
    }

    #[test]
    fn test_derived_contexts_share_factory() {
        let ctx = context();
        let narrowed = ctx.with_desired_output(LayerSpace::new(IRect::from_wh(2, 2)));
        assert_eq!(narrowed.desired_output().raw(), IRect::from_wh(2, 2));
        assert_eq!(ctx.desired_output().raw(), IRect::from_wh(8, 8));
        assert!(Arc::ptr_eq(ctx.factory(), narrowed.factory()));

        let scaled = ctx.with_mapping(Mapping::new(Matrix::scale(2.0, 2.0)));
        assert_eq!(*scaled.mapping().layer_matrix(), Matrix::scale(2.0, 2.0));
        assert_eq!(scaled.desired_output(), ctx.desired_output());
    }

    #[test]
    fn test_make_surface_uses_config() {
        let ctx = context();
        let surface = ctx
            .make_surface(LayerSpace::new(ISize::new(3, 4)))
            .expect("allocates");
        assert_eq!((surface.width(), surface.height()), (3, 4));
        assert_eq!(surface.config(), ctx.surface_config());
        assert!(ctx.make_surface(LayerSpace::new(ISize::new(0, 4))).is_none());
    }
}
