//! Process start-up: corpus → scaler → registry → serving.
//!
//! `initialize` is the single entry point that turns a corpus file into a
//! ready `PredictionService`. Every step either completes or aborts start-up;
//! serving never sees a partially trained registry.

use tracing::info;

use crate::domain::{Corpus, ForecastConfig};
use crate::error::AppError;
use crate::features::NormalizationParameters;
use crate::io::{IngestReport, load_corpus, read_scaler_json, write_scaler_json};
use crate::models::{CommodityModelRegistry, TrainingOutcome};
use crate::service::PredictionService;

/// Everything produced by one start-up.
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    pub service: PredictionService,
    pub outcome: TrainingOutcome,
    pub ingest: IngestReport,
}

/// Load the corpus from `config.corpus_path` and train.
pub fn initialize(config: &ForecastConfig) -> Result<ForecastEngine, AppError> {
    let (corpus, ingest) = load_corpus(&config.corpus_path)?;
    info!(path = %config.corpus_path.display(), rows = ingest.rows_used, "loaded corpus");
    initialize_with_corpus(config, &corpus, ingest)
}

/// Train from an already loaded corpus.
///
/// The scaler is persisted and read back before training, so the registry is
/// built against exactly the parameters serving will use.
pub fn initialize_with_corpus(
    config: &ForecastConfig,
    corpus: &Corpus,
    ingest: IngestReport,
) -> Result<ForecastEngine, AppError> {
    let fitted = NormalizationParameters::fit(corpus)?;
    write_scaler_json(&config.scaler_path, &fitted)?;
    let params = read_scaler_json(&config.scaler_path)?;
    info!(path = %config.scaler_path.display(), "wrote normalization parameters");

    let vocabulary = corpus.vocabulary();
    let outcome = CommodityModelRegistry::train_all(corpus, &params, &vocabulary, &config.training);

    if outcome.registry.is_empty() {
        return Err(AppError::new(
            4,
            format!(
                "No commodity could be trained ({} skipped).",
                outcome.skipped().count()
            ),
        ));
    }

    let service = PredictionService::new(outcome.registry.clone(), vocabulary, params);
    Ok(ForecastEngine {
        service,
        outcome,
        ingest,
    })
}
