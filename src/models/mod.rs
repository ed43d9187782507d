//! Trained commodity models.
//!
//! One `CommodityModel` per commodity, built by a single training pass and
//! held in an immutable `CommodityModelRegistry`.

pub mod registry;

pub use registry::*;
