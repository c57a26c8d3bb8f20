//! Geometry: rectangles, matrices, coordinate-space tags and the
//! parameter/layer/device mapping.

pub mod mapping;
pub mod matrix;
pub mod rect;
pub mod space;
pub mod vector;
