//! Minimal CPU raster backend: images, surfaces, a canvas and samplers.
//!
//! The compositor only relies on this through narrow seams
//! ([`surface::SurfaceFactory`], [`canvas::Canvas`]), so it can be swapped
//! for a different backend without touching `filter`.

pub mod canvas;
pub mod drawable;
pub mod image;
pub mod sampling;
pub mod surface;
