//! Coefficient grids for the residual model search.
//!
//! The ARIMA(1,1,1) coefficients are found by evaluating the conditional sum of
//! squares over a deterministic `(φ, θ)` grid and then zooming in around the
//! best cell. Given the same series, the same grids are visited in the same
//! order, so the fit is reproducible.

use crate::error::FitError;

/// Largest magnitude allowed for φ and θ (stationary / invertible region).
pub const COEF_BOUND: f64 = 0.98;

/// `steps` evenly spaced points in `[min, max]` (inclusive).
pub fn lin_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, FitError> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(FitError::NotConverged(format!(
            "invalid grid range: min={min}, max={max}"
        )));
    }
    if steps < 2 {
        return Err(FitError::NotConverged("grid steps must be >= 2".to_string()));
    }

    let step = (max - min) / (steps as f64 - 1.0);
    Ok((0..steps).map(|i| min + step * i as f64).collect())
}

/// Full `(φ, θ)` grid over the admissible square.
pub fn coefficient_grid(steps: usize) -> Result<Vec<(f64, f64)>, FitError> {
    let axis = lin_space(-COEF_BOUND, COEF_BOUND, steps)?;
    Ok(cartesian(&axis, &axis))
}

/// Local `(φ, θ)` grid of half-width `radius` centred on `center`, clipped to
/// the admissible square.
pub fn zoom_grid(center: (f64, f64), radius: f64, steps: usize) -> Result<Vec<(f64, f64)>, FitError> {
    let (phi, theta) = center;
    let phi_axis = lin_space(
        (phi - radius).max(-COEF_BOUND),
        (phi + radius).min(COEF_BOUND),
        steps,
    )?;
    let theta_axis = lin_space(
        (theta - radius).max(-COEF_BOUND),
        (theta + radius).min(COEF_BOUND),
        steps,
    )?;
    Ok(cartesian(&phi_axis, &theta_axis))
}

fn cartesian(a: &[f64], b: &[f64]) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(a.len() * b.len());
    for &x in a {
        for &y in b {
            out.push((x, y));
        }
    }
    out
}
