//! `pricecast` library crate.
//!
//! The binary (`pricecast`) is a thin wrapper around this library so that:
//!
//! - training and serving are testable without spawning processes
//! - the `PredictionService` can be embedded behind any transport
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod features;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod service;
