//! Feature schema: the ordered list of feature names a regressor was trained on.
//!
//! A feature vector is always assembled by walking the schema's names and
//! resolving each one against a `FeatureInputs`. Training rows and inference
//! rows go through the same `assemble_row`, so column order can only come from
//! the stored name list.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{LocationVocabulary, MacroCovariate};

pub const RESIDUALS: &str = "Residuals";
pub const YEAR: &str = "year";
pub const MONTH: &str = "month";
pub const DAY: &str = "day";
pub const LOCATION_PREFIX: &str = "Location_";

/// Everything needed to resolve any schema name for one row.
#[derive(Debug, Clone, Copy)]
pub struct FeatureInputs<'a> {
    pub residual: f64,
    pub date: NaiveDate,
    /// Already-normalized covariates, indexed by `MacroCovariate::index`.
    pub macros: &'a [f64; MacroCovariate::COUNT],
    pub location: Option<&'a str>,
}

/// A schema name that `FeatureInputs` cannot resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown feature column `{0}`")]
pub struct UnknownFeature(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// `[Residuals, year, month, day] + covariates + location dummies`.
    pub fn for_vocabulary(vocabulary: &LocationVocabulary) -> Self {
        let mut names: Vec<String> = [RESIDUALS, YEAR, MONTH, DAY].iter().map(|s| s.to_string()).collect();
        names.extend(MacroCovariate::ALL.iter().map(|c| c.column_name().to_string()));
        names.extend(
            vocabulary
                .encoded_labels()
                .into_iter()
                .map(|label| format!("{LOCATION_PREFIX}{label}")),
        );
        Self { names }
    }

    pub fn from_names(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Build one feature vector in schema order.
    pub fn assemble_row(&self, inputs: &FeatureInputs<'_>) -> Result<Vec<f64>, UnknownFeature> {
        self.names.iter().map(|name| resolve(name, inputs)).collect()
    }
}

fn resolve(name: &str, inputs: &FeatureInputs<'_>) -> Result<f64, UnknownFeature> {
    match name {
        RESIDUALS => return Ok(inputs.residual),
        YEAR => return Ok(f64::from(inputs.date.year())),
        MONTH => return Ok(f64::from(inputs.date.month())),
        DAY => return Ok(f64::from(inputs.date.day())),
        _ => {}
    }

    if let Some(covariate) = MacroCovariate::from_column_name(name) {
        return Ok(inputs.macros[covariate.index()]);
    }

    if let Some(label) = name.strip_prefix(LOCATION_PREFIX) {
        let hit = inputs.location.is_some_and(|loc| loc == label);
        return Ok(if hit { 1.0 } else { 0.0 });
    }

    Err(UnknownFeature(name.to_string()))
}
