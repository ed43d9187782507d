//! ARIMA(1,1,1) residual extraction.
//!
//! For a price series `y` we work on the first difference `z_t = y_t - y_{t-1}`
//! and fit
//!
//! ```text
//! z_t = φ z_{t-1} + e_t + θ e_{t-1}
//! ```
//!
//! by conditional sum of squares (pre-sample `z` and `e` set to zero). The
//! search is:
//!
//! 1. a Hannan–Rissanen start (long AR by least squares, then a regression of
//!    `z_t` on `z_{t-1}` and the long-AR residual `ê_{t-1}`)
//! 2. a coarse `(φ, θ)` grid over the admissible square, evaluated in parallel
//! 3. a few zoom rounds around the best point
//!
//! In-sample residuals are returned on the original (undifferenced) index: the
//! first observation has no history, so its prediction is zero and its residual
//! is the observation itself; every later residual is the CSS innovation.

use rayon::prelude::*;

use crate::error::FitError;
use crate::fit::grid::{coefficient_grid, zoom_grid, COEF_BOUND};
use crate::math::{lagged_design, solve_least_squares};

/// Residual substituted for every date beyond the training corpus, where the
/// true value (and so the innovation) is unknown.
pub const FUTURE_RESIDUAL: f64 = 0.0;

/// Shortest series we attempt to fit.
pub const MIN_OBSERVATIONS: usize = 10;

/// Longest autoregression used in the Hannan–Rissanen first stage.
const MAX_LONG_AR: usize = 10;

/// A fitted ARIMA(1,1,1).
#[derive(Debug, Clone, PartialEq)]
pub struct ArimaFit {
    pub phi: f64,
    pub theta: f64,
    /// Conditional sum of squared innovations.
    pub css: f64,
    /// Innovation variance estimate (`css / (n - 1)`).
    pub sigma2: f64,
    /// In-sample residuals, same length and order as the input series.
    pub residuals: Vec<f64>,
}

/// Search settings for the CSS fit.
#[derive(Debug, Clone)]
pub struct ResidualExtractor {
    pub coarse_steps: usize,
    pub zoom_steps: usize,
    pub zoom_rounds: usize,
}

impl Default for ResidualExtractor {
    fn default() -> Self {
        Self {
            coarse_steps: 21,
            zoom_steps: 9,
            zoom_rounds: 6,
        }
    }
}

impl ResidualExtractor {
    /// Fit the model and return its in-sample residuals.
    pub fn fit(&self, series: &[f64]) -> Result<ArimaFit, FitError> {
        let n = series.len();
        if n < MIN_OBSERVATIONS {
            return Err(FitError::InsufficientData {
                needed: MIN_OBSERVATIONS,
                got: n,
            });
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFinite);
        }

        let (lo, hi) = series
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let scale = series.iter().map(|v| v.abs()).fold(1.0, f64::max);
        if hi - lo <= 1e-12 * scale {
            return Err(FitError::Degenerate("constant series".to_string()));
        }

        let z: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
        let z_mean = z.iter().sum::<f64>() / z.len() as f64;
        let z_var = z.iter().map(|v| (v - z_mean).powi(2)).sum::<f64>() / z.len() as f64;
        if z_var <= 1e-18 * scale * scale {
            return Err(FitError::Degenerate("constant first difference".to_string()));
        }

        let (phi, theta, css) = self.search(&z)?;

        let innovations = innovations(&z, phi, theta);
        let mut residuals = Vec::with_capacity(n);
        residuals.push(series[0]);
        residuals.extend(innovations);

        Ok(ArimaFit {
            phi,
            theta,
            css,
            sigma2: css / z.len() as f64,
            residuals,
        })
    }

    fn search(&self, z: &[f64]) -> Result<(f64, f64, f64), FitError> {
        let mut candidates = coefficient_grid(self.coarse_steps)?;
        if let Some(start) = hannan_rissanen(z) {
            candidates.push(start);
        }

        let mut best = best_candidate(z, &candidates)?;
        let mut radius = 2.0 * COEF_BOUND / (self.coarse_steps as f64 - 1.0);

        for _ in 0..self.zoom_rounds {
            let grid = zoom_grid((best.0, best.1), radius, self.zoom_steps)?;
            let local = best_candidate(z, &grid)?;
            if local.2 < best.2 {
                best = local;
            }
            radius /= 3.0;
        }

        if !best.2.is_finite() {
            return Err(FitError::NotConverged("no finite sum of squares".to_string()));
        }
        Ok(best)
    }
}

/// Lowest-CSS candidate; ties go to the earlier candidate so the result does
/// not depend on how rayon splits the work.
fn best_candidate(z: &[f64], candidates: &[(f64, f64)]) -> Result<(f64, f64, f64), FitError> {
    candidates
        .par_iter()
        .enumerate()
        .map(|(idx, &(phi, theta))| (idx, phi, theta, css(z, phi, theta)))
        .min_by(|a, b| a.3.total_cmp(&b.3).then(a.0.cmp(&b.0)))
        .map(|(_, phi, theta, css)| (phi, theta, css))
        .ok_or_else(|| FitError::NotConverged("empty candidate grid".to_string()))
}

/// One-step innovations of the differenced series.
fn innovations(z: &[f64], phi: f64, theta: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(z.len());
    let mut prev_z = 0.0;
    let mut prev_e = 0.0;
    for &zt in z {
        let e = zt - phi * prev_z - theta * prev_e;
        out.push(e);
        prev_z = zt;
        prev_e = e;
    }
    out
}

fn css(z: &[f64], phi: f64, theta: f64) -> f64 {
    let total: f64 = innovations(z, phi, theta).iter().map(|e| e * e).sum();
    if total.is_finite() { total } else { f64::INFINITY }
}

/// Two-stage Hannan–Rissanen estimate of `(φ, θ)`, clipped to the admissible
/// square. `None` if either regression is not solvable.
fn hannan_rissanen(z: &[f64]) -> Option<(f64, f64)> {
    let m = z.len();
    let k = (m / 4).clamp(1, MAX_LONG_AR);

    let (x, y) = lagged_design(z, k)?;
    if x.nrows() <= k {
        return None;
    }
    let beta = solve_least_squares(&x, &y)?;
    let fitted = &x * &beta;
    // ehat[i] is the long-AR residual at t = k + i.
    let ehat: Vec<f64> = (y - fitted).iter().copied().collect();

    let rows = m.checked_sub(k + 1)?;
    if rows < 3 {
        return None;
    }
    let x2 = nalgebra::DMatrix::from_fn(rows, 2, |r, c| {
        let t = k + 1 + r;
        if c == 0 { z[t - 1] } else { ehat[t - 1 - k] }
    });
    let y2 = nalgebra::DVector::from_iterator(rows, z[k + 1..].iter().copied());
    let coef = solve_least_squares(&x2, &y2)?;

    Some((
        coef[0].clamp(-COEF_BOUND, COEF_BOUND),
        coef[1].clamp(-COEF_BOUND, COEF_BOUND),
    ))
}
