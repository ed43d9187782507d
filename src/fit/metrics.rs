//! Holdout evaluation of a trained regressor.

use serde::{Deserialize, Serialize};

/// Error statistics on the trailing holdout split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldoutMetrics {
    pub n: usize,
    pub mae: f64,
    pub rmse: f64,
    /// Coefficient of determination; `None` when the holdout targets are constant.
    pub r2: Option<f64>,
}

impl HoldoutMetrics {
    /// `None` for an empty or mismatched pair of slices.
    pub fn evaluate(predicted: &[f64], actual: &[f64]) -> Option<Self> {
        if predicted.is_empty() || predicted.len() != actual.len() {
            return None;
        }
        let n = actual.len() as f64;

        let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let sse = errors.iter().map(|e| e * e).sum::<f64>();
        let rmse = (sse / n).sqrt();

        let mean = actual.iter().sum::<f64>() / n;
        let sst = actual.iter().map(|a| (a - mean).powi(2)).sum::<f64>();
        let r2 = if sst > 0.0 { Some(1.0 - sse / sst) } else { None };

        Some(Self {
            n: actual.len(),
            mae,
            rmse,
            r2,
        })
    }
}
