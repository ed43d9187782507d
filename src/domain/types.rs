//! Shared domain types.
//!
//! These are the values that flow between ingest, training and serving:
//!
//! - the training corpus (`Corpus`, `HistoricalRecord`)
//! - the macro covariates and the location vocabulary
//! - prediction requests and records
//! - run configuration (`ForecastConfig`)

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Parse a date in one of the accepted layouts.
///
/// ISO `YYYY-MM-DD` is preferred; `YYYY/MM/DD`, `DD/MM/YYYY`, `DD-MM-YYYY` and
/// ISO date-times (time part ignored) are accepted too.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    const DATE_FMTS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];
    const DATETIME_FMTS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

    let s = s.trim();
    for fmt in DATE_FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FMTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// The four macroeconomic covariates, in feature order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MacroCovariate {
    #[serde(rename = "CPI Food Items")]
    CpiFoodItems,
    #[serde(rename = "PMS PRICE")]
    PmsPrice,
    #[serde(rename = "Central Rate (US DOLL)")]
    CentralRateUsd,
    #[serde(rename = "mpr")]
    Mpr,
}

impl MacroCovariate {
    pub const COUNT: usize = 4;

    pub const ALL: [MacroCovariate; MacroCovariate::COUNT] = [
        MacroCovariate::CpiFoodItems,
        MacroCovariate::PmsPrice,
        MacroCovariate::CentralRateUsd,
        MacroCovariate::Mpr,
    ];

    /// Column name in the corpus, feature name in the schema, and key in
    /// request macro-input maps.
    pub fn column_name(self) -> &'static str {
        match self {
            MacroCovariate::CpiFoodItems => "CPI Food Items",
            MacroCovariate::PmsPrice => "PMS PRICE",
            MacroCovariate::CentralRateUsd => "Central Rate (US DOLL)",
            MacroCovariate::Mpr => "mpr",
        }
    }

    pub fn index(self) -> usize {
        match self {
            MacroCovariate::CpiFoodItems => 0,
            MacroCovariate::PmsPrice => 1,
            MacroCovariate::CentralRateUsd => 2,
            MacroCovariate::Mpr => 3,
        }
    }

    pub fn from_column_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.column_name() == name)
    }
}

/// Raw covariate values for one row, indexed by `MacroCovariate::index`.
pub type MacroRow = [Option<f64>; MacroCovariate::COUNT];

/// One row of the source table.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalRecord {
    pub date: NaiveDate,
    pub location: Option<String>,
    /// One value per commodity, aligned with `Corpus::commodities`.
    pub prices: Vec<Option<f64>>,
    pub macros: MacroRow,
}

/// The full training corpus in original row order.
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    pub commodities: Vec<String>,
    pub records: Vec<HistoricalRecord>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The price column of one commodity, in row order.
    pub fn price_series(&self, commodity_idx: usize) -> Vec<Option<f64>> {
        self.records
            .iter()
            .map(|r| r.prices.get(commodity_idx).copied().flatten())
            .collect()
    }

    pub fn vocabulary(&self) -> LocationVocabulary {
        LocationVocabulary::from_labels(self.records.iter().filter_map(|r| r.location.as_deref()))
    }
}

/// Distinct location labels seen in the training corpus.
///
/// `labels` keeps first-appearance order (used in error messages). The one-hot
/// columns follow the sorted label order with the first sorted label dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationVocabulary {
    labels: Vec<String>,
}

impl LocationVocabulary {
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut out: Vec<String> = Vec::new();
        for label in labels {
            let label = label.trim();
            if label.is_empty() {
                continue;
            }
            if !out.iter().any(|l| l == label) {
                out.push(label.to_string());
            }
        }
        Self { labels: out }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Labels that get their own dummy column (sorted, first dropped).
    pub fn encoded_labels(&self) -> Vec<String> {
        let mut sorted = self.labels.clone();
        sorted.sort();
        sorted.into_iter().skip(1).collect()
    }
}

/// A batch prediction request.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub commodity: String,
    pub location: String,
    /// Target dates as supplied by the caller; output order follows this order.
    pub dates: Vec<String>,
    /// Raw (unnormalized) macro inputs keyed by covariate column name.
    pub macro_inputs: HashMap<String, f64>,
    pub export: bool,
    pub file_name: String,
}

/// One predicted price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(rename = "Commodity")]
    pub commodity: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Predicted Price")]
    pub predicted_price: f64,
}

/// Gradient boosting hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    pub iterations: usize,
    pub learning_rate: f64,
    pub depth: usize,
    /// L2 regularisation added to leaf counts when computing leaf values.
    pub l2_leaf_reg: f64,
    /// Maximum number of split borders per feature.
    pub border_count: usize,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            iterations: 200,
            learning_rate: 0.1,
            depth: 6,
            l2_leaf_reg: 3.0,
            border_count: 254,
        }
    }
}

/// Options for one training pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingOptions {
    /// Trailing share of rows held out for evaluation.
    pub holdout_fraction: f64,
    pub boost: BoostParams,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            holdout_fraction: 0.2,
            boost: BoostParams::default(),
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// Derived from CLI flags, environment and defaults.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub corpus_path: PathBuf,
    pub scaler_path: PathBuf,
    pub training: TrainingOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_keeps_first_appearance_order() {
        let vocab = LocationVocabulary::from_labels(["Kano", "Abuja", "Kano", "", "Lagos"]);
        assert_eq!(vocab.labels(), &["Kano", "Abuja", "Lagos"]);
        assert!(vocab.contains("Abuja"));
        assert!(!vocab.contains("Ibadan"));
    }

    #[test]
    fn encoded_labels_drop_first_sorted() {
        let vocab = LocationVocabulary::from_labels(["Kano", "Abuja", "Lagos"]);
        assert_eq!(vocab.encoded_labels(), vec!["Kano".to_string(), "Lagos".to_string()]);
    }

    #[test]
    fn parses_accepted_date_layouts() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        for s in ["2025-03-07", "2025/03/07", "07/03/2025", "07-03-2025", "2025-03-07T12:30:00", " 2025-03-07 "] {
            assert_eq!(parse_date(s), Some(d), "{s}");
        }
        assert_eq!(parse_date("2025-02-30"), None);
        assert_eq!(parse_date("tomorrow"), None);
    }

    #[test]
    fn covariate_names_round_trip() {
        for c in MacroCovariate::ALL {
            assert_eq!(MacroCovariate::from_column_name(c.column_name()), Some(c));
        }
        assert_eq!(MacroCovariate::from_column_name("cpi"), None);
    }
}
