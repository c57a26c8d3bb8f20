//! Filterfold Core — deferred image-filter compositing.
//!
//! A [`FilterResult`] describes "an image plus a pending crop, transform and
//! color filter". Crops, transforms and color filters are folded into that
//! description algebraically; pixels are only produced when
//! [`FilterResult::resolve`] decides further deferral is impossible.
//!
//! Geometry is tagged with the coordinate space it lives in (parameter,
//! layer or device space, see [`geometry::space`]) and converted between
//! spaces by a [`Mapping`] built once per filter evaluation.

pub mod color;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod raster;

// Re-exports for convenience.
pub use color::filter::{ColorFilter, SharedColorFilter};
pub use error::FilterError;
pub use filter::context::Context;
pub use filter::pipeline::{Pipeline, Step};
pub use filter::result::{FilterResult, ResolvedImage};
pub use geometry::mapping::{Mapping, MatrixCapability};
pub use geometry::matrix::Matrix;
pub use geometry::rect::{IRect, Rect};
pub use geometry::space::{DeviceSpace, LayerSpace, ParamSpace};
pub use raster::image::SpecialImage;
pub use raster::sampling::Sampling;
pub use raster::surface::{RasterSurfaceFactory, SurfaceConfig, SurfaceFactory};
