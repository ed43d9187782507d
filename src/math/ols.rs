//! Ordinary least squares on small dense systems.
//!
//! Used by the residual model's Hannan–Rissanen start: a long autoregression
//! followed by a two-regressor fit. Both problems are tall (many rows, a
//! handful of columns), so we solve through SVD rather than a square
//! factorization.

use nalgebra::{DMatrix, DVector};

/// Solve `min ||X β - y||²` via SVD.
///
/// Returns `None` when every tolerance leaves a non-finite solution.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() == 0 || x.nrows() != y.len() {
        return None;
    }
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-9, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Design matrix of `lags` lagged values: row `t` holds
/// `series[t-1], ..., series[t-lags]` for `t` in `lags..len`.
///
/// Returns the matrix together with the aligned targets `series[lags..]`.
pub fn lagged_design(series: &[f64], lags: usize) -> Option<(DMatrix<f64>, DVector<f64>)> {
    if lags == 0 || series.len() <= lags {
        return None;
    }
    let rows = series.len() - lags;
    let x = DMatrix::from_fn(rows, lags, |r, c| series[r + lags - 1 - c]);
    let y = DVector::from_iterator(rows, series[lags..].iter().copied());
    Some((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_linear_relation() {
        // y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn lagged_design_aligns_targets() {
        let (x, y) = lagged_design(&[1.0, 2.0, 3.0, 4.0, 5.0], 2).unwrap();
        assert_eq!(x.nrows(), 3);
        // t = 2: lags are series[1], series[0]
        assert_eq!(x[(0, 0)], 2.0);
        assert_eq!(x[(0, 1)], 1.0);
        assert_eq!(y[0], 3.0);
        assert_eq!(y[2], 5.0);
    }

    #[test]
    fn short_series_has_no_design() {
        assert!(lagged_design(&[1.0, 2.0], 2).is_none());
        assert!(lagged_design(&[1.0, 2.0], 0).is_none());
    }
}
