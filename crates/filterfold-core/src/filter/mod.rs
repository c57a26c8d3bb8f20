//! The deferred filter value, its operators and the evaluation context.

pub mod context;
pub mod pipeline;
pub mod result;
