//! The deferred image value and its composition operators.
//!
//! A [`FilterResult`] stands for the pixels
//!
//! ```text
//! crop(layer_bounds, color_filter(sample(image, transform, sampling)))
//! ```
//!
//! where the image is decal-tiled. Operators rewrite that expression
//! instead of producing pixels; only when two steps cannot be folded into
//! one (a visible crop edge would move, or the sampling policies do not
//! merge) is the current value resolved onto a surface first.

use glam::IVec2;

use crate::color::filter::{ColorFilter, SharedColorFilter, compose, floods};
use crate::filter::context::Context;
use crate::geometry::matrix::Matrix;
use crate::geometry::rect::IRect;
use crate::geometry::space::LayerSpace;
use crate::raster::drawable::Drawable;
use crate::raster::image::SpecialImage;
use crate::raster::sampling::{Sampling, merge_sampling};

/// A deferred image. Without an image it is fully transparent.
#[derive(Debug, Clone, Default)]
pub struct FilterResult {
    image: Option<SpecialImage>,
    sampling: Sampling,
    /// Image pixel coordinates to layer space.
    transform: LayerSpace<Matrix>,
    /// Applied after sampling, before the crop. `None` without an image.
    color_filter: Option<SharedColorFilter>,
    /// Nothing outside this rectangle is visible.
    layer_bounds: LayerSpace<IRect>,
}

/// A concrete image positioned in layer space.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub image: SpecialImage,
    /// Layer-space position of the image's top-left pixel.
    pub origin: LayerSpace<IVec2>,
}

impl From<ResolvedImage> for FilterResult {
    fn from(resolved: ResolvedImage) -> Self {
        Self::new(resolved.image, resolved.origin)
    }
}

impl FilterResult {
    /// The transparent result.
    pub fn empty() -> Self {
        Self::default()
    }

    /// `image` placed with its top-left pixel at `origin`.
    pub fn new(image: SpecialImage, origin: LayerSpace<IVec2>) -> Self {
        let layer_bounds = LayerSpace::new(IRect::from_origin_size(origin.raw(), image.dimensions()));
        Self {
            image: Some(image),
            sampling: Sampling::default(),
            transform: LayerSpace::<Matrix>::translate(origin),
            color_filter: None,
            layer_bounds,
        }
    }

    /// Rasterizes `drawable` into layer space over its mapped bounds,
    /// restricted to the desired output.
    pub fn from_drawable(ctx: &Context, drawable: &dyn Drawable) -> Self {
        let bounds = ctx.mapping().param_to_layer(&drawable.bounds()).round_out();
        let Some(dst) = bounds.intersect(&ctx.desired_output()) else {
            return Self::empty();
        };
        let Some(mut surface) = ctx.make_surface(dst.size()) else {
            return Self::empty();
        };
        {
            let mut canvas = surface.canvas();
            canvas.translate(-(dst.left() as f32), -(dst.top() as f32));
            canvas.concat(ctx.mapping().layer_matrix());
            drawable.draw(&mut canvas);
        }
        Self::new(surface.snapshot(), dst.top_left())
    }

    pub fn image(&self) -> Option<&SpecialImage> {
        self.image.as_ref()
    }

    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    pub fn transform(&self) -> &LayerSpace<Matrix> {
        &self.transform
    }

    pub fn color_filter(&self) -> Option<&SharedColorFilter> {
        self.color_filter.as_ref()
    }

    pub fn layer_bounds(&self) -> LayerSpace<IRect> {
        self.layer_bounds
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_none()
    }

    /// Resolves over the full layer bounds.
    pub fn image_and_offset(&self, ctx: &Context) -> Option<(SpecialImage, LayerSpace<IVec2>)> {
        self.resolve(ctx, self.layer_bounds)
            .map(|resolved| (resolved.image, resolved.origin))
    }

    /// True if the edge of the layer bounds would be visible in `dst` once
    /// `extra` is applied on top of this result.
    pub fn is_cropped(&self, extra: &LayerSpace<Matrix>, dst: &LayerSpace<IRect>) -> bool {
        let Some(image) = &self.image else {
            return false;
        };

        // A flooding filter fills the layer bounds entirely, so their edge
        // is a transition to transparent. Otherwise the bounds only matter
        // if they cut into the transformed image.
        let mut fills_bounds = floods(self.color_filter.as_deref());
        if !fills_bounds {
            let image_bounds = self
                .transform
                .map_irect(&LayerSpace::new(image.bounds()));
            fills_bounds = !self.layer_bounds.contains(&image_bounds);
        }

        fills_bounds
            && !extra
                .as_raw()
                .quad_contains_irect(self.layer_bounds.as_raw(), dst.as_raw())
    }

    pub fn apply_crop(&self, ctx: &Context, crop: LayerSpace<IRect>) -> Self {
        let Some(image) = &self.image else {
            return Self::empty();
        };
        let Some(tight) = crop
            .intersect(&ctx.desired_output())
            .and_then(|r| r.intersect(&self.layer_bounds))
        else {
            return Self::empty();
        };

        if !floods(self.color_filter.as_deref()) {
            if let Some(origin) = self.transform.nearly_integer_translation() {
                // Move the crop into the image itself so later operators see
                // no intervening crop. The pending filter still applies.
                let Some(subset) = extract_subset(image, origin, tight) else {
                    return Self::empty();
                };
                let mut restricted = Self::from(subset);
                restricted.color_filter = self.color_filter.clone();
                return restricted;
            }
        }

        Self {
            layer_bounds: tight,
            ..self.clone()
        }
    }

    pub fn apply_color_filter(&self, ctx: &Context, filter: SharedColorFilter) -> Self {
        let desired = ctx.desired_output();
        let visible = self
            .image
            .as_ref()
            .and(self.layer_bounds.intersect(&desired));

        let layer_bounds = if filter.affects_transparent_black() {
            if visible.is_none() {
                return flood_fill(ctx, &*filter);
            }
            if self.is_cropped(&LayerSpace::<Matrix>::identity(), &desired) {
                // The new filter would color past the current crop, so the
                // crop has to be baked into pixels first.
                tracing::debug!("Resolving cropped result before a flooding color filter");
                let resolved = self
                    .resolve(ctx, desired)
                    .map(Self::from)
                    .unwrap_or_default();
                return resolved.apply_color_filter(ctx, filter);
            }
            desired
        } else {
            let Some(bounds) = visible else {
                return Self::empty();
            };
            bounds
        };

        Self {
            layer_bounds,
            color_filter: Some(compose(filter, self.color_filter.clone())),
            ..self.clone()
        }
    }

    pub fn apply_transform(
        &self,
        ctx: &Context,
        transform: &LayerSpace<Matrix>,
        sampling: Sampling,
    ) -> Self {
        if self.image.is_none() {
            return Self::empty();
        }
        let desired = ctx.desired_output();

        let current_is_integer = self.transform.as_raw().is_nearly_integer_translation();
        let next_is_integer = transform.as_raw().is_nearly_integer_translation();
        // Integer translations never resample.
        let current_sampling = if current_is_integer {
            Sampling::default()
        } else {
            self.sampling
        };
        let next_sampling = if next_is_integer {
            Sampling::default()
        } else {
            sampling
        };

        // An integer translation moves any visible crop edge onto whole
        // pixels, where intersecting with the desired output handles it.
        let cropped = !next_is_integer && self.is_cropped(transform, &desired);
        let merged = if cropped {
            None
        } else {
            merge_sampling(
                current_sampling,
                current_is_integer,
                next_sampling,
                next_is_integer,
            )
        };

        let (mut transformed, next_sampling) = match merged {
            Some(merged) => (self.clone(), merged),
            None => {
                let Some(tight) = transform.inverse_map_irect(&desired) else {
                    tracing::debug!("Dropping result under a singular transform");
                    return Self::empty();
                };
                let Some(resolved) = self.resolve(ctx, tight) else {
                    return Self::empty();
                };
                (Self::from(resolved), next_sampling)
            }
        };

        transformed.transform.post_concat(transform);
        transformed.sampling = if transformed.transform.as_raw().is_nearly_integer_translation() {
            Sampling::default()
        } else {
            next_sampling
        };
        // Map the previous bounds rather than the image bounds to keep any
        // accumulated crops.
        let Some(layer_bounds) = transform
            .map_irect(&transformed.layer_bounds)
            .intersect(&desired)
        else {
            return Self::empty();
        };
        transformed.layer_bounds = layer_bounds;
        transformed
    }

    /// Produces concrete pixels for `dst ∩ layer_bounds`.
    ///
    /// Without a color filter an integer-translated image is returned as a
    /// zero-copy subset; otherwise a surface is rendered. Returns `None` for
    /// a transparent result or when no surface could be allocated. The
    /// returned image may be smaller than `dst`: decal tiling makes
    /// everything outside it transparent.
    pub fn resolve(&self, ctx: &Context, dst: LayerSpace<IRect>) -> Option<ResolvedImage> {
        let image = self.image.as_ref()?;
        let dst = dst.intersect(&self.layer_bounds)?;

        if self.color_filter.is_none() {
            if let Some(origin) = self.transform.nearly_integer_translation() {
                tracing::trace!("Resolving {dst:?} as an image subset");
                return extract_subset(image, origin, dst);
            }
        }

        let mut surface = ctx.make_surface(dst.size())?;
        {
            let mut canvas = surface.canvas();
            canvas.translate(-(dst.left() as f32), -(dst.top() as f32));
            canvas.concat(self.transform.as_raw());

            let filter = self.color_filter.as_deref();
            if floods(filter) {
                canvas.draw_image_shader(image, self.sampling, filter);
            } else {
                canvas.draw_image(image, self.sampling, filter);
            }
        }
        tracing::debug!(
            "Rendered {}x{} surface to resolve {dst:?}",
            dst.width(),
            dst.height()
        );
        Some(ResolvedImage {
            image: surface.snapshot(),
            origin: dst.top_left(),
        })
    }
}

/// Fills the whole desired output with `filter(transparent)`.
fn flood_fill(ctx: &Context, filter: &dyn ColorFilter) -> FilterResult {
    let desired = ctx.desired_output();
    if desired.is_empty() {
        return FilterResult::empty();
    }
    let Some(mut surface) = ctx.make_surface(desired.size()) else {
        return FilterResult::empty();
    };
    surface.canvas().draw_paint(filter);
    tracing::debug!("Flood-filled {desired:?} with {filter:?}");
    FilterResult::new(surface.snapshot(), desired.top_left())
}

/// The part of `image` (placed at `origin`) that overlaps `dst`, as a view.
fn extract_subset(
    image: &SpecialImage,
    origin: LayerSpace<IVec2>,
    dst: LayerSpace<IRect>,
) -> Option<ResolvedImage> {
    let image_bounds =
        LayerSpace::new(IRect::from_origin_size(origin.raw(), image.dimensions()));
    let bounds = image_bounds.intersect(&dst)?;
    // Subtract the origin edge by edge; negating it may overflow.
    let subset = IRect::from_ltrb(
        bounds.left() - origin.x(),
        bounds.top() - origin.y(),
        bounds.right() - origin.x(),
        bounds.bottom() - origin.y(),
    );
    Some(ResolvedImage {
        image: image.make_subset(subset)?,
        origin: bounds.top_left(),
    })
}
