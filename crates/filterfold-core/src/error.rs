//! Error type for the fallible construction APIs.
//!
//! Composition operators never return errors: every failure there collapses
//! to the transparent [`FilterResult`](crate::FilterResult).

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("matrix is not invertible")]
    NonInvertible,
    #[error("could not allocate a {width}x{height} surface")]
    SurfaceAllocation { width: i32, height: i32 },
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("invalid pipeline description: {0}")]
    Config(#[from] serde_json::Error),
}
