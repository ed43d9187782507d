//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the training corpus (`Corpus`, `HistoricalRecord`, `MacroCovariate`)
//! - serving inputs/outputs (`PredictionRequest`, `PredictionRecord`)
//! - run configuration (`ForecastConfig`, `TrainingOptions`, `BoostParams`)

pub mod types;

pub use types::*;
