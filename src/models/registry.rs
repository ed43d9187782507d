//! Per-commodity training and the registry of trained models.
//!
//! For every commodity column in the corpus:
//!
//! 1. close gaps in the price series (forward fill, then backward fill)
//! 2. fit the ARIMA(1,1,1) residual model; a failure skips the commodity
//! 3. assemble `[Residuals, year, month, day, covariates..., locations...]`
//!    per row and drop incomplete rows
//! 4. hold out the trailing rows (time order kept) and train the regressor on
//!    the leading rows
//! 5. keep the regressor with the exact feature schema it was trained on
//!
//! The registry is built in a local map and only returned once every
//! commodity has been attempted.

use tracing::{info, warn};

use crate::domain::{Corpus, LocationVocabulary, MacroCovariate, TrainingOptions};
use crate::error::{FitError, PredictError};
use crate::features::{FeatureInputs, FeatureSchema, NormalizationParameters};
use crate::fit::{BoostedTrees, HoldoutMetrics, ResidualExtractor};

/// Summary of the residual model behind a commodity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualModelSummary {
    pub phi: f64,
    pub theta: f64,
    pub sigma2: f64,
}

/// A trained regressor and the ordered feature names it expects.
#[derive(Debug, Clone, PartialEq)]
pub struct CommodityModel {
    pub commodity: String,
    pub regressor: BoostedTrees,
    pub schema: FeatureSchema,
    pub residual_model: ResidualModelSummary,
    pub train_rows: usize,
    pub holdout: Option<HoldoutMetrics>,
}

/// What happened to one commodity during a training pass.
#[derive(Debug, Clone, PartialEq)]
pub enum CommodityOutcome {
    Trained {
        commodity: String,
        train_rows: usize,
        holdout: Option<HoldoutMetrics>,
    },
    Skipped {
        commodity: String,
        reason: FitError,
    },
}

impl CommodityOutcome {
    pub fn commodity(&self) -> &str {
        match self {
            CommodityOutcome::Trained { commodity, .. } | CommodityOutcome::Skipped { commodity, .. } => commodity,
        }
    }
}

/// Result of `CommodityModelRegistry::train_all`.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub registry: CommodityModelRegistry,
    /// One entry per corpus commodity, in corpus order.
    pub outcomes: Vec<CommodityOutcome>,
}

impl TrainingOutcome {
    pub fn skipped(&self) -> impl Iterator<Item = (&str, &FitError)> {
        self.outcomes.iter().filter_map(|o| match o {
            CommodityOutcome::Skipped { commodity, reason } => Some((commodity.as_str(), reason)),
            CommodityOutcome::Trained { .. } => None,
        })
    }
}

/// Immutable set of trained commodity models.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommodityModelRegistry {
    models: Vec<CommodityModel>,
}

impl CommodityModelRegistry {
    /// Train one model per commodity column.
    pub fn train_all(
        corpus: &Corpus,
        params: &NormalizationParameters,
        vocabulary: &LocationVocabulary,
        options: &TrainingOptions,
    ) -> TrainingOutcome {
        info!(
            commodities = corpus.commodities.len(),
            rows = corpus.len(),
            "starting training pass"
        );

        let normalized = params.transform_corpus(corpus);
        let schema = FeatureSchema::for_vocabulary(vocabulary);
        let extractor = ResidualExtractor::default();

        let mut models = Vec::new();
        let mut outcomes = Vec::with_capacity(corpus.commodities.len());

        for (idx, commodity) in corpus.commodities.iter().enumerate() {
            match train_commodity(corpus, idx, &normalized, &schema, &extractor, options) {
                Ok(model) => {
                    info!(
                        commodity = %commodity,
                        train_rows = model.train_rows,
                        holdout_rows = model.holdout.map(|h| h.n).unwrap_or(0),
                        holdout_mae = model.holdout.map(|h| h.mae),
                        holdout_rmse = model.holdout.map(|h| h.rmse),
                        "trained commodity model"
                    );
                    outcomes.push(CommodityOutcome::Trained {
                        commodity: commodity.clone(),
                        train_rows: model.train_rows,
                        holdout: model.holdout,
                    });
                    models.push(model);
                }
                Err(reason) => {
                    warn!(commodity = %commodity, %reason, "skipping commodity");
                    outcomes.push(CommodityOutcome::Skipped {
                        commodity: commodity.clone(),
                        reason,
                    });
                }
            }
        }

        info!(trained = models.len(), skipped = outcomes.len() - models.len(), "training pass complete");

        TrainingOutcome {
            registry: CommodityModelRegistry { models },
            outcomes,
        }
    }

    /// Look up a trained commodity.
    pub fn get(&self, commodity: &str) -> Result<&CommodityModel, PredictError> {
        self.models
            .iter()
            .find(|m| m.commodity == commodity)
            .ok_or_else(|| PredictError::UnknownCommodity {
                commodity: commodity.to_string(),
                valid: self.commodities().map(str::to_string).collect(),
            })
    }

    /// Trained commodity names, in corpus order.
    pub fn commodities(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.commodity.as_str())
    }

    pub fn models(&self) -> &[CommodityModel] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn train_commodity(
    corpus: &Corpus,
    idx: usize,
    normalized: &[[f64; MacroCovariate::COUNT]],
    schema: &FeatureSchema,
    extractor: &ResidualExtractor,
    options: &TrainingOptions,
) -> Result<CommodityModel, FitError> {
    let filled = fill_gaps(&corpus.price_series(idx));
    let series: Vec<f64> = filled
        .iter()
        .copied()
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| FitError::Degenerate("no observed prices".to_string()))?;

    let arima = extractor.fit(&series)?;

    let mut x = Vec::with_capacity(series.len());
    let mut y = Vec::with_capacity(series.len());
    for (i, record) in corpus.records.iter().enumerate() {
        let inputs = FeatureInputs {
            residual: arima.residuals[i],
            date: record.date,
            macros: &normalized[i],
            location: record.location.as_deref(),
        };
        let row = schema
            .assemble_row(&inputs)
            .map_err(|e| FitError::Degenerate(e.to_string()))?;
        let target = series[i];
        if target.is_finite() && row.iter().all(|v| v.is_finite()) {
            x.push(row);
            y.push(target);
        }
    }

    let (train_len, _) = split_sizes(y.len(), options.holdout_fraction);
    if train_len == 0 {
        return Err(FitError::EmptyTrainingSplit);
    }
    let (x_train, x_test) = x.split_at(train_len);
    let (y_train, y_test) = y.split_at(train_len);

    let regressor = BoostedTrees::fit(x_train, y_train, &options.boost)?;

    let holdout = if x_test.is_empty() {
        None
    } else {
        let predicted = regressor
            .predict(x_test)
            .map_err(|e| FitError::Degenerate(e.to_string()))?;
        HoldoutMetrics::evaluate(&predicted, y_test)
    };

    Ok(CommodityModel {
        commodity: corpus.commodities[idx].clone(),
        regressor,
        schema: schema.clone(),
        residual_model: ResidualModelSummary {
            phi: arima.phi,
            theta: arima.theta,
            sigma2: arima.sigma2,
        },
        train_rows: train_len,
        holdout,
    })
}

/// Forward fill, then backward fill. Non-finite values count as gaps.
pub fn fill_gaps(series: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out: Vec<Option<f64>> = series.iter().map(|v| v.filter(|x| x.is_finite())).collect();

    let mut last = None;
    for v in out.iter_mut() {
        match v {
            Some(x) => last = Some(*x),
            None => *v = last,
        }
    }

    let mut next = None;
    for v in out.iter_mut().rev() {
        match v {
            Some(x) => next = Some(*x),
            None => *v = next,
        }
    }

    out
}

/// `(train, holdout)` sizes with the holdout rounded up.
pub fn split_sizes(n: usize, holdout_fraction: f64) -> (usize, usize) {
    if n == 0 || !(holdout_fraction > 0.0 && holdout_fraction < 1.0) {
        return (n, 0);
    }
    let holdout = ((n as f64) * holdout_fraction).ceil() as usize;
    let holdout = holdout.min(n);
    (n - holdout, holdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{SampleSpec, generate_corpus};

    fn trained(spec: &SampleSpec) -> (Corpus, TrainingOutcome) {
        let corpus = generate_corpus(spec).unwrap();
        let params = NormalizationParameters::fit(&corpus).unwrap();
        let vocab = corpus.vocabulary();
        let outcome = CommodityModelRegistry::train_all(&corpus, &params, &vocab, &TrainingOptions::default());
        (corpus, outcome)
    }

    #[test]
    fn fill_gaps_forward_then_backward() {
        let filled = fill_gaps(&[None, Some(2.0), None, Some(f64::NAN), Some(5.0), None]);
        assert_eq!(filled, vec![Some(2.0), Some(2.0), Some(2.0), Some(2.0), Some(5.0), Some(5.0)]);
        assert_eq!(fill_gaps(&[None, None]), vec![None, None]);
    }

    #[test]
    fn holdout_is_rounded_up() {
        assert_eq!(split_sizes(100, 0.2), (80, 20));
        assert_eq!(split_sizes(11, 0.2), (8, 3));
        assert_eq!(split_sizes(10, 0.0), (10, 0));
        assert_eq!(split_sizes(0, 0.2), (0, 0));
    }

    #[test]
    fn trains_every_fittable_commodity() {
        let (corpus, outcome) = trained(&SampleSpec::default());
        assert_eq!(outcome.registry.len(), corpus.commodities.len());
        for model in outcome.registry.models() {
            assert_eq!(model.train_rows, 80);
            assert_eq!(model.holdout.map(|h| h.n), Some(20));
            assert_eq!(model.regressor.n_features(), model.schema.len());
        }
    }

    #[test]
    fn constant_commodity_is_skipped_not_fatal() {
        let spec = SampleSpec {
            constant_commodity: Some(1),
            ..SampleSpec::default()
        };
        let (corpus, outcome) = trained(&spec);
        let constant = corpus.commodities[1].clone();

        assert_eq!(outcome.registry.len(), corpus.commodities.len() - 1);
        let skipped: Vec<&str> = outcome.skipped().map(|(c, _)| c).collect();
        assert_eq!(skipped, vec![constant.as_str()]);

        let err = outcome.registry.get(&constant).unwrap_err();
        assert!(matches!(err, PredictError::UnknownCommodity { .. }));
    }

    #[test]
    fn schema_matches_vocabulary() {
        let (corpus, outcome) = trained(&SampleSpec::default());
        let expected = FeatureSchema::for_vocabulary(&corpus.vocabulary());
        for model in outcome.registry.models() {
            assert_eq!(model.schema, expected);
        }
    }

    #[test]
    fn retraining_is_idempotent() {
        let (_, a) = trained(&SampleSpec::default());
        let (_, b) = trained(&SampleSpec::default());
        assert_eq!(a.registry, b.registry);
    }

    #[test]
    fn rows_with_missing_covariates_are_dropped() {
        let mut corpus = generate_corpus(&SampleSpec::default()).unwrap();
        for record in corpus.records.iter_mut().take(10) {
            record.macros[0] = None;
        }
        let params = NormalizationParameters::fit(&corpus).unwrap();
        let outcome =
            CommodityModelRegistry::train_all(&corpus, &params, &corpus.vocabulary(), &TrainingOptions::default());
        let model = &outcome.registry.models()[0];
        // 90 complete rows: 72 train, 18 holdout
        assert_eq!(model.train_rows, 72);
        assert_eq!(model.holdout.map(|h| h.n), Some(18));
    }
}
