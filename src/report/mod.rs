//! Reporting utilities: training summaries and prediction tables.

pub mod format;

pub use format::*;
