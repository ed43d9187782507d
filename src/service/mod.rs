//! Serving: validated batch predictions over an immutable registry.

pub mod prediction;

pub use prediction::*;
