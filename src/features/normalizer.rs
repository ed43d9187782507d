//! Min-max scaling of the macro covariates.
//!
//! Parameters are fitted once from the training corpus and then shared,
//! read-only, by corpus preparation and by every inference call. Both paths go
//! through `transform_row`; there is no second implementation of the scaling.

use serde::{Deserialize, Serialize};

use crate::domain::{Corpus, MacroCovariate, MacroRow};
use crate::error::AppError;

/// Observed range of one covariate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CovariateRange {
    pub covariate: MacroCovariate,
    pub min: f64,
    pub max: f64,
}

impl CovariateRange {
    /// `(v - min) / (max - min)`, or `0` when the range is degenerate.
    pub fn scale(&self, v: f64) -> f64 {
        let span = self.max - self.min;
        if span == 0.0 {
            return 0.0;
        }
        (v - self.min) / span
    }
}

/// Per-covariate `(min, max)` pairs, in `MacroCovariate::ALL` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParameters {
    ranges: [CovariateRange; MacroCovariate::COUNT],
}

impl NormalizationParameters {
    /// Compute min/max of every covariate over the finite values in the corpus.
    pub fn fit(corpus: &Corpus) -> Result<Self, AppError> {
        let mut mins = [f64::INFINITY; MacroCovariate::COUNT];
        let mut maxs = [f64::NEG_INFINITY; MacroCovariate::COUNT];

        for record in &corpus.records {
            for (i, value) in record.macros.iter().enumerate() {
                let Some(v) = value.filter(|v| v.is_finite()) else { continue };
                mins[i] = mins[i].min(v);
                maxs[i] = maxs[i].max(v);
            }
        }

        let mut ranges = Vec::with_capacity(MacroCovariate::COUNT);
        for covariate in MacroCovariate::ALL {
            let i = covariate.index();
            if !(mins[i].is_finite() && maxs[i].is_finite()) {
                return Err(AppError::new(
                    3,
                    format!("Covariate `{}` has no numeric values in the corpus.", covariate.column_name()),
                ));
            }
            ranges.push(CovariateRange {
                covariate,
                min: mins[i],
                max: maxs[i],
            });
        }

        Self::from_ranges(ranges)
    }

    /// Build from explicit ranges (must be in `MacroCovariate::ALL` order).
    pub fn from_ranges(ranges: Vec<CovariateRange>) -> Result<Self, AppError> {
        let ranges: [CovariateRange; MacroCovariate::COUNT] = ranges.try_into().map_err(|v: Vec<_>| {
            AppError::new(
                2,
                format!("Expected {} covariate ranges, got {}.", MacroCovariate::COUNT, v.len()),
            )
        })?;
        let params = Self { ranges };
        params.validate()?;
        Ok(params)
    }

    /// Check ordering and finiteness (used after deserializing a blob).
    pub fn validate(&self) -> Result<(), AppError> {
        for (range, expected) in self.ranges.iter().zip(MacroCovariate::ALL) {
            if range.covariate != expected {
                return Err(AppError::new(
                    2,
                    format!(
                        "Normalization parameters out of order: expected `{}`, found `{}`.",
                        expected.column_name(),
                        range.covariate.column_name()
                    ),
                ));
            }
            if !(range.min.is_finite() && range.max.is_finite()) || range.max < range.min {
                return Err(AppError::new(
                    2,
                    format!("Invalid range for `{}`.", expected.column_name()),
                ));
            }
        }
        Ok(())
    }

    pub fn ranges(&self) -> &[CovariateRange] {
        &self.ranges
    }

    pub fn range(&self, covariate: MacroCovariate) -> &CovariateRange {
        &self.ranges[covariate.index()]
    }

    /// Scale one row of raw covariates. Missing values come out as NaN so the
    /// row is dropped at feature assembly.
    pub fn transform_row(&self, row: &MacroRow) -> [f64; MacroCovariate::COUNT] {
        let mut out = [f64::NAN; MacroCovariate::COUNT];
        for (i, range) in self.ranges.iter().enumerate() {
            if let Some(v) = row[i] {
                out[i] = range.scale(v);
            }
        }
        out
    }

    /// Scale every corpus row.
    pub fn transform_corpus(&self, corpus: &Corpus) -> Vec<[f64; MacroCovariate::COUNT]> {
        corpus.records.iter().map(|r| self.transform_row(&r.macros)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HistoricalRecord;
    use chrono::NaiveDate;

    fn corpus(macros: &[[f64; 4]]) -> Corpus {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let records = macros
            .iter()
            .enumerate()
            .map(|(i, m)| HistoricalRecord {
                date: start + chrono::Days::new(i as u64),
                location: Some("Kano".to_string()),
                prices: vec![Some(1.0)],
                macros: [Some(m[0]), Some(m[1]), Some(m[2]), Some(m[3])],
            })
            .collect();
        Corpus {
            commodities: vec!["Wheat".to_string()],
            records,
        }
    }

    #[test]
    fn min_and_max_map_to_zero_and_one() {
        let c = corpus(&[[100.0, 200.0, 400.0, 11.0], [150.0, 250.0, 800.0, 18.0], [120.0, 220.0, 600.0, 14.0]]);
        let params = NormalizationParameters::fit(&c).unwrap();

        let lo = params.transform_row(&[Some(100.0), Some(200.0), Some(400.0), Some(11.0)]);
        let hi = params.transform_row(&[Some(150.0), Some(250.0), Some(800.0), Some(18.0)]);
        assert_eq!(lo, [0.0; 4]);
        assert_eq!(hi, [1.0; 4]);

        for row in params.transform_corpus(&c) {
            assert!(row.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn degenerate_range_scales_to_zero() {
        let c = corpus(&[[5.0, 1.0, 2.0, 3.0], [5.0, 2.0, 3.0, 4.0]]);
        let params = NormalizationParameters::fit(&c).unwrap();
        let row = params.transform_row(&[Some(5.0), Some(1.5), Some(2.5), Some(3.5)]);
        assert_eq!(row[0], 0.0);
        let row = params.transform_row(&[Some(42.0), Some(1.5), Some(2.5), Some(3.5)]);
        assert_eq!(row[0], 0.0);
    }

    #[test]
    fn missing_values_are_ignored_when_fitting() {
        let mut c = corpus(&[[1.0, 1.0, 1.0, 1.0], [3.0, 3.0, 3.0, 3.0]]);
        c.records[0].macros[2] = None;
        let params = NormalizationParameters::fit(&c).unwrap();
        assert_eq!(params.range(MacroCovariate::CentralRateUsd).min, 3.0);
        assert!(params.transform_row(&c.records[0].macros)[2].is_nan());
    }

    #[test]
    fn covariate_without_values_is_fatal() {
        let mut c = corpus(&[[1.0, 1.0, 1.0, 1.0]]);
        c.records[0].macros[3] = None;
        let err = NormalizationParameters::fit(&c).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn out_of_order_ranges_are_rejected() {
        let mut ranges: Vec<CovariateRange> = MacroCovariate::ALL
            .iter()
            .map(|&covariate| CovariateRange { covariate, min: 0.0, max: 1.0 })
            .collect();
        ranges.swap(0, 1);
        assert!(NormalizationParameters::from_ranges(ranges).is_err());
    }
}
