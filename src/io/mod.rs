//! Input/output helpers.
//!
//! - corpus CSV ingest + validation (`ingest`)
//! - prediction exports (XLSX/CSV) (`export`)
//! - scaler JSON read/write (`scaler`)

pub mod export;
pub mod ingest;
pub mod scaler;

pub use export::*;
pub use ingest::*;
pub use scaler::*;
