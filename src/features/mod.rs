//! Feature preparation shared by training and serving.
//!
//! - covariate min-max scaling (`normalizer`)
//! - ordered feature schema and row assembly (`schema`)

pub mod normalizer;
pub mod schema;

pub use normalizer::*;
pub use schema::*;
