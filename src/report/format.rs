//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the training and serving code stays free of presentation
//! - output changes are localized

use crate::domain::{ForecastConfig, PredictionRecord};
use crate::io::IngestReport;
use crate::models::{CommodityOutcome, TrainingOutcome};

/// Format the training pass summary (corpus, per-commodity results, feature list).
pub fn format_training_summary(outcome: &TrainingOutcome, ingest: &IngestReport, config: &ForecastConfig) -> String {
    let mut out = String::new();

    out.push_str("=== pricecast - Commodity Model Training ===\n");
    out.push_str(&format!("Corpus: {}\n", config.corpus_path.display()));
    out.push_str(&format!("Scaler: {}\n", config.scaler_path.display()));
    out.push_str(&format!("Rows: read={} used={}\n", ingest.rows_read, ingest.rows_used));

    let boost = &config.training.boost;
    out.push_str(&format!(
        "Regressor: iterations={} lr={} depth={} | holdout={:.0}%\n",
        boost.iterations,
        boost.learning_rate,
        boost.depth,
        config.training.holdout_fraction * 100.0
    ));

    out.push_str("\nCommodities:\n");
    for o in &outcome.outcomes {
        match o {
            CommodityOutcome::Trained {
                commodity,
                train_rows,
                holdout,
            } => {
                let metrics = match holdout {
                    Some(h) => format!(
                        "holdout n={} MAE={:.2} RMSE={:.2} R2={}",
                        h.n,
                        h.mae,
                        h.rmse,
                        h.r2.map(|r| format!("{r:.3}")).unwrap_or_else(|| "-".to_string())
                    ),
                    None => "no holdout".to_string(),
                };
                out.push_str(&format!("* {commodity:<24} train={train_rows:<5} {metrics}\n"));
            }
            CommodityOutcome::Skipped { commodity, reason } => {
                out.push_str(&format!("  {commodity:<24} (skipped) {reason}\n"));
            }
        }
    }

    if let Some(model) = outcome.registry.models().first() {
        out.push_str(&format!("\nFeatures ({}):\n", model.schema.len()));
        for (i, name) in model.schema.names().iter().enumerate() {
            out.push_str(&format!("{:>3}. {name}\n", i + 1));
        }
    }

    out
}

/// Format predictions as a fixed-width table.
pub fn format_predictions(records: &[PredictionRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<24} {:<20} {:<10} {:>15}\n",
        "Commodity", "Location", "Date", "Predicted Price"
    ));
    out.push_str(&format!("{}\n", "-".repeat(72)));

    for r in records {
        out.push_str(&format!(
            "{:<24} {:<20} {:<10} {:>15.2}\n",
            r.commodity,
            r.location,
            r.date.format("%Y-%m-%d").to_string(),
            r.predicted_price
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    use crate::domain::TrainingOptions;
    use crate::error::FitError;
    use crate::fit::HoldoutMetrics;
    use crate::models::CommodityModelRegistry;

    #[test]
    fn prediction_table_rows() {
        let records = vec![PredictionRecord {
            commodity: "Maize".to_string(),
            location: "Kano".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            predicted_price: 412.5,
        }];
        let table = format_predictions(&records);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Commodity"));
        assert!(lines[2].starts_with("Maize"));
        assert!(lines[2].contains("2025-01-01"));
        assert!(lines[2].ends_with("412.50"));
    }

    #[test]
    fn training_summary_lists_trained_and_skipped() {
        let outcome = TrainingOutcome {
            registry: CommodityModelRegistry::default(),
            outcomes: vec![
                CommodityOutcome::Trained {
                    commodity: "Maize".to_string(),
                    train_rows: 80,
                    holdout: Some(HoldoutMetrics {
                        n: 20,
                        mae: 1.5,
                        rmse: 2.0,
                        r2: None,
                    }),
                },
                CommodityOutcome::Skipped {
                    commodity: "Salt".to_string(),
                    reason: FitError::Degenerate("constant series".to_string()),
                },
            ],
        };
        let ingest = IngestReport {
            rows_read: 100,
            rows_used: 100,
        };
        let config = ForecastConfig {
            corpus_path: PathBuf::from("prices.csv"),
            scaler_path: PathBuf::from("scaler.json"),
            training: TrainingOptions::default(),
        };

        let text = format_training_summary(&outcome, &ingest, &config);
        assert!(text.contains("Rows: read=100 used=100\n"));
        assert!(text.contains("holdout n=20 MAE=1.50 RMSE=2.00 R2=-"));
        assert!(text.contains("Salt"));
        assert!(text.contains("(skipped) degenerate series: constant series"));
    }
}
