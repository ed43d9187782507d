//! Command-line parsing for the commodity price forecaster.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the training/serving code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "pricecast", version, about = "Hybrid ARIMA + gradient boosting commodity price forecaster")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train one model per commodity, write the scaler and print a summary.
    Train(TrainArgs),
    /// Train, then predict prices for one commodity/location over a list of dates.
    Predict(PredictArgs),
    /// Write a synthetic corpus CSV in the expected layout.
    Sample(SampleArgs),
}

/// Corpus, scaler and regressor options shared by `train` and `predict`.
#[derive(Debug, Parser, Clone)]
pub struct TrainArgs {
    /// Historical price table (Date, Location, commodity columns, macro covariates).
    #[arg(long, env = "PRICECAST_CORPUS", value_name = "CSV")]
    pub corpus: PathBuf,

    /// Where the fitted normalization parameters are written.
    #[arg(long, env = "PRICECAST_SCALER", value_name = "JSON", default_value = "scaler.json")]
    pub scaler: PathBuf,

    /// Trailing share of rows held out for evaluation.
    #[arg(long, default_value_t = 0.2)]
    pub holdout: f64,

    /// Boosting iterations.
    #[arg(long, default_value_t = 200)]
    pub iterations: usize,

    /// Boosting learning rate.
    #[arg(long, default_value_t = 0.1)]
    pub learning_rate: f64,

    /// Tree depth.
    #[arg(long, default_value_t = 6)]
    pub depth: usize,
}

/// Options for a prediction batch.
#[derive(Debug, Parser, Clone)]
pub struct PredictArgs {
    #[command(flatten)]
    pub train: TrainArgs,

    /// Commodity column name as it appears in the corpus.
    #[arg(long)]
    pub commodity: String,

    /// Location label as it appears in the corpus.
    #[arg(long)]
    pub location: String,

    /// Target date (repeatable). Output keeps the given order.
    #[arg(long = "date", value_name = "DATE", required = true)]
    pub dates: Vec<String>,

    /// CPI Food Items.
    #[arg(long)]
    pub cpi_food_items: Option<f64>,

    /// PMS PRICE.
    #[arg(long)]
    pub pms_price: Option<f64>,

    /// Central Rate (US DOLL).
    #[arg(long = "central-rate-usd")]
    pub central_rate_usd: Option<f64>,

    /// mpr.
    #[arg(long)]
    pub mpr: Option<f64>,

    /// Write predictions to a file instead of printing them (`.csv` for CSV, anything else XLSX).
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

/// Options for synthetic corpus generation.
#[derive(Debug, Parser, Clone)]
pub struct SampleArgs {
    /// Output CSV path.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,

    /// Number of daily rows.
    #[arg(long, default_value_t = 365)]
    pub rows: usize,

    /// Number of locations (rows cycle through them).
    #[arg(long, default_value_t = 2)]
    pub locations: usize,

    /// Number of commodity columns (at most 9).
    #[arg(long, default_value_t = 3)]
    pub commodities: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}
