//! Model fitting.
//!
//! Responsibilities:
//!
//! - ARIMA(1,1,1) residual extraction via a parallel CSS grid search (`arima`, `grid`)
//! - gradient-boosted oblivious trees on the assembled features (`boost`)
//! - holdout error statistics (`metrics`)

pub mod arima;
pub mod boost;
pub mod grid;
pub mod metrics;

pub use arima::*;
pub use boost::*;
pub use grid::*;
pub use metrics::*;
