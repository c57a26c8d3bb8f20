//! Color filters and their composability metadata.

pub mod blend;
pub mod filter;
