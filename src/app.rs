//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and installs the log subscriber
//! - parses CLI arguments
//! - trains the registry and serves predictions
//! - prints reports or writes exports

use std::collections::HashMap;
use std::fs;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, PredictArgs, SampleArgs, TrainArgs};
use crate::data::{SampleSpec, generate_corpus, write_corpus_csv};
use crate::domain::{BoostParams, ForecastConfig, MacroCovariate, PredictionRequest, TrainingOptions};
use crate::error::AppError;
use crate::service::PredictionOutput;

pub mod pipeline;

/// Default log filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "pricecast=info";

/// Entry point for the `pricecast` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Train(args) => handle_train(args),
        Command::Predict(args) => handle_predict(args),
        Command::Sample(args) => handle_sample(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // A second init (e.g. from an embedding process) is not an error for us.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_train(args: TrainArgs) -> Result<(), AppError> {
    let config = forecast_config_from_args(&args)?;
    let engine = pipeline::initialize(&config)?;

    println!(
        "{}",
        crate::report::format_training_summary(&engine.outcome, &engine.ingest, &config)
    );
    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let config = forecast_config_from_args(&args.train)?;
    let engine = pipeline::initialize(&config)?;

    let request = prediction_request_from_args(&args);
    match engine.service.predict(&request)? {
        PredictionOutput::Records(records) => {
            println!("{}", crate::report::format_predictions(&records));
        }
        PredictionOutput::Export(file) => {
            fs::write(&file.file_name, &file.bytes)
                .map_err(|e| AppError::new(2, format!("Failed to write export '{}': {e}", file.file_name)))?;
            info!(path = %file.file_name, mime = file.mime_type, bytes = file.bytes.len(), "wrote export");
        }
    }
    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let spec = SampleSpec {
        rows: args.rows,
        locations: args.locations,
        commodities: args.commodities,
        seed: args.seed,
        ..SampleSpec::default()
    };
    let corpus = generate_corpus(&spec)?;
    write_corpus_csv(&args.out, &corpus)?;
    info!(path = %args.out.display(), rows = corpus.len(), "wrote sample corpus");
    Ok(())
}

pub fn forecast_config_from_args(args: &TrainArgs) -> Result<ForecastConfig, AppError> {
    if !(args.holdout.is_finite() && (0.0..1.0).contains(&args.holdout)) {
        return Err(AppError::new(2, "`--holdout` must be in [0, 1)."));
    }
    if !(args.learning_rate.is_finite() && args.learning_rate > 0.0) {
        return Err(AppError::new(2, "`--learning-rate` must be > 0."));
    }
    if args.depth == 0 {
        return Err(AppError::new(2, "`--depth` must be > 0."));
    }

    Ok(ForecastConfig {
        corpus_path: args.corpus.clone(),
        scaler_path: args.scaler.clone(),
        training: TrainingOptions {
            holdout_fraction: args.holdout,
            boost: BoostParams {
                iterations: args.iterations,
                learning_rate: args.learning_rate,
                depth: args.depth,
                ..BoostParams::default()
            },
        },
    })
}

/// Only the covariates given on the command line go into the map, so a
/// missing flag surfaces as the service's missing-input error.
pub fn prediction_request_from_args(args: &PredictArgs) -> PredictionRequest {
    let given = [
        (MacroCovariate::CpiFoodItems, args.cpi_food_items),
        (MacroCovariate::PmsPrice, args.pms_price),
        (MacroCovariate::CentralRateUsd, args.central_rate_usd),
        (MacroCovariate::Mpr, args.mpr),
    ];
    let macro_inputs: HashMap<String, f64> = given
        .into_iter()
        .filter_map(|(c, v)| v.map(|v| (c.column_name().to_string(), v)))
        .collect();

    PredictionRequest {
        commodity: args.commodity.clone(),
        location: args.location.clone(),
        dates: args.dates.clone(),
        macro_inputs,
        export: args.export.is_some(),
        file_name: args
            .export
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
    }
}
