//! Gradient-boosted regression with oblivious (symmetric) trees.
//!
//! Each tree applies the same `(feature, border)` split to every node of a
//! level, so a tree of depth `d` is just `d` splits plus `2^d` leaf values and
//! a row's leaf index is the bit pattern of its split outcomes.
//!
//! Training, squared loss:
//! - features are quantized once against per-feature borders (midpoints
//!   between distinct values, thinned to `border_count`)
//! - each iteration fits a tree to the current residuals `y - ŷ`, choosing
//!   every level's split greedily by `Σ_leaf S²/(C + λ)`
//! - leaf values are `S / (C + λ)`, added with the learning rate
//!
//! Candidate splits are scored per feature in parallel; the winning split is
//! picked in feature order so the fitted model is reproducible.

use rayon::prelude::*;
use thiserror::Error;

use crate::domain::BoostParams;
use crate::error::FitError;

/// Upper bound on tree depth regardless of configuration.
const MAX_DEPTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("feature dimension mismatch: expected {expected}, got {got}")]
pub struct DimensionMismatch {
    pub expected: usize,
    pub got: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Split {
    feature: usize,
    border: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct ObliviousTree {
    splits: Vec<Split>,
    leaves: Vec<f64>,
}

impl ObliviousTree {
    fn leaf_index(&self, row: &[f64]) -> usize {
        self.splits
            .iter()
            .enumerate()
            .fold(0, |idx, (level, s)| if row[s.feature] > s.border { idx | (1 << level) } else { idx })
    }
}

/// A trained ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct BoostedTrees {
    n_features: usize,
    base: f64,
    learning_rate: f64,
    trees: Vec<ObliviousTree>,
}

impl BoostedTrees {
    /// Fit on a row-major feature matrix.
    ///
    /// Rows must be complete (finite) and all the same width.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &BoostParams) -> Result<Self, FitError> {
        if x.is_empty() || y.is_empty() {
            return Err(FitError::EmptyTrainingSplit);
        }
        if x.len() != y.len() {
            return Err(FitError::InsufficientData {
                needed: x.len(),
                got: y.len(),
            });
        }
        let n_features = x[0].len();
        if x.iter().any(|row| row.len() != n_features) {
            return Err(FitError::Degenerate("ragged feature matrix".to_string()));
        }
        if y.iter().any(|v| !v.is_finite()) || x.iter().flatten().any(|v| !v.is_finite()) {
            return Err(FitError::NonFinite);
        }

        let n = y.len();
        let depth = params.depth.min(MAX_DEPTH);
        let lambda = params.l2_leaf_reg.max(0.0);
        let border_count = params.border_count.clamp(1, usize::from(u16::MAX) - 1);

        let quantized = Quantized::build(x, n_features, border_count);

        let base = y.iter().sum::<f64>() / n as f64;
        let mut pred = vec![base; n];
        let mut trees = Vec::with_capacity(params.iterations);

        for _ in 0..params.iterations {
            let residual: Vec<f64> = y.iter().zip(&pred).map(|(t, p)| t - p).collect();
            let (tree, leaf_of) = grow_tree(&quantized, &residual, depth, lambda);
            for (p, &leaf) in pred.iter_mut().zip(&leaf_of) {
                *p += params.learning_rate * tree.leaves[leaf];
            }
            trees.push(tree);
        }

        Ok(Self {
            n_features,
            base,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Score one feature vector.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64, DimensionMismatch> {
        if row.len() != self.n_features {
            return Err(DimensionMismatch {
                expected: self.n_features,
                got: row.len(),
            });
        }
        let boost: f64 = self.trees.iter().map(|t| t.leaves[t.leaf_index(row)]).sum();
        Ok(self.base + self.learning_rate * boost)
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, DimensionMismatch> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }
}

/// Column-major bin indices plus the borders they refer to.
///
/// `bins[f][i]` counts the borders of feature `f` strictly below `x[i][f]`, so
/// `bins[f][i] > k` exactly when `x[i][f] > borders[f][k]`.
struct Quantized {
    borders: Vec<Vec<f64>>,
    bins: Vec<Vec<u16>>,
    n_rows: usize,
}

impl Quantized {
    fn build(x: &[Vec<f64>], n_features: usize, border_count: usize) -> Self {
        let (borders, bins): (Vec<_>, Vec<_>) = (0..n_features)
            .into_par_iter()
            .map(|f| {
                let column: Vec<f64> = x.iter().map(|row| row[f]).collect();
                let borders = select_borders(&column, border_count);
                let bins: Vec<u16> = column
                    .iter()
                    .map(|&v| borders.partition_point(|&b| b < v) as u16)
                    .collect();
                (borders, bins)
            })
            .unzip();
        Self {
            borders,
            bins,
            n_rows: x.len(),
        }
    }
}

/// Midpoints between consecutive distinct values, evenly thinned to `max`.
fn select_borders(values: &[f64], max: usize) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();

    let mut mids: Vec<f64> = sorted.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
    mids.dedup();
    if mids.len() <= max {
        return mids;
    }
    (0..max).map(|j| mids[j * mids.len() / max]).collect()
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    feature: usize,
    bin: usize,
}

fn grow_tree(q: &Quantized, residual: &[f64], depth: usize, lambda: f64) -> (ObliviousTree, Vec<usize>) {
    let mut leaf_of = vec![0usize; q.n_rows];
    let mut splits = Vec::with_capacity(depth);

    for level in 0..depth {
        let n_leaves = 1usize << level;
        let current = leaf_score(&leaf_of, residual, n_leaves, lambda);

        let per_feature: Vec<Option<Candidate>> = (0..q.borders.len())
            .into_par_iter()
            .map(|f| best_split_for_feature(q, f, &leaf_of, residual, n_leaves, lambda))
            .collect();

        let mut best: Option<Candidate> = None;
        for cand in per_feature.into_iter().flatten() {
            if best.is_none_or(|b| cand.score > b.score) {
                best = Some(cand);
            }
        }

        let Some(best) = best else { break };
        if best.score <= current + 1e-12 * current.abs().max(1.0) {
            break;
        }

        let bins = &q.bins[best.feature];
        for (leaf, &bin) in leaf_of.iter_mut().zip(bins) {
            if usize::from(bin) > best.bin {
                *leaf |= 1 << level;
            }
        }
        splits.push(Split {
            feature: best.feature,
            border: q.borders[best.feature][best.bin],
        });
    }

    let n_leaves = 1usize << splits.len();
    let (sums, counts) = leaf_totals(&leaf_of, residual, n_leaves);
    let leaves = sums
        .iter()
        .zip(&counts)
        .map(|(s, &c)| if c > 0.0 { s / (c + lambda) } else { 0.0 })
        .collect();

    (ObliviousTree { splits, leaves }, leaf_of)
}

fn leaf_totals(leaf_of: &[usize], residual: &[f64], n_leaves: usize) -> (Vec<f64>, Vec<f64>) {
    let mut sums = vec![0.0; n_leaves];
    let mut counts = vec![0.0; n_leaves];
    for (&leaf, &r) in leaf_of.iter().zip(residual) {
        sums[leaf] += r;
        counts[leaf] += 1.0;
    }
    (sums, counts)
}

fn leaf_score(leaf_of: &[usize], residual: &[f64], n_leaves: usize, lambda: f64) -> f64 {
    let (sums, counts) = leaf_totals(leaf_of, residual, n_leaves);
    sums.iter().zip(&counts).map(|(s, c)| s * s / (c + lambda)).sum()
}

fn best_split_for_feature(
    q: &Quantized,
    feature: usize,
    leaf_of: &[usize],
    residual: &[f64],
    n_leaves: usize,
    lambda: f64,
) -> Option<Candidate> {
    let n_borders = q.borders[feature].len();
    if n_borders == 0 {
        return None;
    }
    let width = n_borders + 1;
    let mut hist_sum = vec![0.0; n_leaves * width];
    let mut hist_cnt = vec![0.0; n_leaves * width];
    for ((&leaf, &bin), &r) in leaf_of.iter().zip(&q.bins[feature]).zip(residual) {
        let slot = leaf * width + usize::from(bin);
        hist_sum[slot] += r;
        hist_cnt[slot] += 1.0;
    }

    let mut scores = vec![0.0; n_borders];
    for leaf in 0..n_leaves {
        let row_sum = &hist_sum[leaf * width..(leaf + 1) * width];
        let row_cnt = &hist_cnt[leaf * width..(leaf + 1) * width];
        let total_sum: f64 = row_sum.iter().sum();
        let total_cnt: f64 = row_cnt.iter().sum();

        let mut left_sum = 0.0;
        let mut left_cnt = 0.0;
        for (k, score) in scores.iter_mut().enumerate() {
            left_sum += row_sum[k];
            left_cnt += row_cnt[k];
            let right_sum = total_sum - left_sum;
            let right_cnt = total_cnt - left_cnt;
            *score += left_sum * left_sum / (left_cnt + lambda) + right_sum * right_sum / (right_cnt + lambda);
        }
    }

    let mut best: Option<Candidate> = None;
    for (bin, &score) in scores.iter().enumerate() {
        if best.is_none_or(|b| score > b.score) {
            best = Some(Candidate { score, feature, bin });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BoostParams {
        BoostParams::default()
    }

    #[test]
    fn learns_a_step_function() {
        let x: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64, (i % 7) as f64]).collect();
        let y: Vec<f64> = (0..100).map(|i| if i > 50 { 10.0 } else { 0.0 }).collect();

        let model = BoostedTrees::fit(&x, &y, &params()).unwrap();
        assert_eq!(model.n_trees(), 200);
        assert!((model.predict_row(&[80.0, 3.0]).unwrap() - 10.0).abs() < 0.5);
        assert!(model.predict_row(&[10.0, 3.0]).unwrap().abs() < 0.5);
    }

    #[test]
    fn constant_features_predict_the_mean() {
        let x = vec![vec![1.0, 2.0]; 20];
        let y: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let model = BoostedTrees::fit(&x, &y, &params()).unwrap();
        let p = model.predict_row(&[1.0, 2.0]).unwrap();
        assert!((p - 9.5).abs() < 1e-9);
    }

    #[test]
    fn training_is_deterministic() {
        let x: Vec<Vec<f64>> = (0..60).map(|i| vec![(i * 7 % 13) as f64, (i as f64).sin()]).collect();
        let y: Vec<f64> = x.iter().map(|r| 2.0 * r[0] - r[1]).collect();
        let a = BoostedTrees::fit(&x, &y, &params()).unwrap();
        let b = BoostedTrees::fit(&x, &y, &params()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_wrong_width_at_prediction() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0]];
        let model = BoostedTrees::fit(&x, &[0.0, 1.0, 2.0], &params()).unwrap();
        assert_eq!(
            model.predict_row(&[1.0, 2.0]),
            Err(DimensionMismatch { expected: 1, got: 2 })
        );
    }

    #[test]
    fn rejects_empty_or_non_finite_training_data() {
        assert_eq!(BoostedTrees::fit(&[], &[], &params()), Err(FitError::EmptyTrainingSplit));
        let x = vec![vec![f64::NAN], vec![1.0]];
        assert_eq!(BoostedTrees::fit(&x, &[0.0, 1.0], &params()), Err(FitError::NonFinite));
    }

    #[test]
    fn borders_are_thinned_and_sorted() {
        let values: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let borders = select_borders(&values, 254);
        assert_eq!(borders.len(), 254);
        assert!(borders.windows(2).all(|w| w[0] < w[1]));
        assert!(select_borders(&[3.0, 3.0, 3.0], 254).is_empty());
    }
}
