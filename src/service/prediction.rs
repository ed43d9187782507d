//! Batch inference against a trained registry.
//!
//! A request is validated in a fixed order (commodity, location, macro
//! inputs, dates) before any regressor is touched. Each date is then scored
//! independently:
//!
//! - `Residuals` is the neutral future placeholder
//! - covariates go through the persisted min-max parameters
//! - the feature vector is assembled from the model's stored schema
//! - the regressor output is rounded to 2 decimals
//!
//! The service only holds shared, immutable state, so clones can serve
//! concurrent calls.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{LocationVocabulary, MacroCovariate, MacroRow, PredictionRecord, PredictionRequest, parse_date};
use crate::error::PredictError;
use crate::features::{FeatureInputs, NormalizationParameters};
use crate::fit::FUTURE_RESIDUAL;
use crate::io::{ExportFormat, format_records};
use crate::models::{CommodityModel, CommodityModelRegistry};

/// Serialized predictions plus download metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFile {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutput {
    Records(Vec<PredictionRecord>),
    Export(ExportedFile),
}

#[derive(Debug, Clone)]
pub struct PredictionService {
    registry: Arc<CommodityModelRegistry>,
    vocabulary: Arc<LocationVocabulary>,
    params: Arc<NormalizationParameters>,
}

impl PredictionService {
    pub fn new(
        registry: CommodityModelRegistry,
        vocabulary: LocationVocabulary,
        params: NormalizationParameters,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            vocabulary: Arc::new(vocabulary),
            params: Arc::new(params),
        }
    }

    pub fn registry(&self) -> &CommodityModelRegistry {
        &self.registry
    }

    pub fn vocabulary(&self) -> &LocationVocabulary {
        &self.vocabulary
    }

    pub fn params(&self) -> &NormalizationParameters {
        &self.params
    }

    /// Serve a full request, exporting when asked to.
    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionOutput, PredictError> {
        self.predict_batch(
            &request.commodity,
            &request.location,
            &request.dates,
            &request.macro_inputs,
            request.export,
            &request.file_name,
        )
    }

    pub fn predict_batch<S: AsRef<str>>(
        &self,
        commodity: &str,
        location: &str,
        dates: &[S],
        macro_inputs: &HashMap<String, f64>,
        export: bool,
        file_name: &str,
    ) -> Result<PredictionOutput, PredictError> {
        let records = self.predict_records(commodity, location, dates, macro_inputs)?;
        if !export {
            return Ok(PredictionOutput::Records(records));
        }

        let format = ExportFormat::from_file_name(file_name);
        let bytes = format_records(&records, format).map_err(|e| PredictError::Internal(e.to_string()))?;
        Ok(PredictionOutput::Export(ExportedFile {
            bytes,
            mime_type: format.mime_type(),
            file_name: file_name.to_string(),
        }))
    }

    /// One record per date, in request order.
    pub fn predict_records<S: AsRef<str>>(
        &self,
        commodity: &str,
        location: &str,
        dates: &[S],
        macro_inputs: &HashMap<String, f64>,
    ) -> Result<Vec<PredictionRecord>, PredictError> {
        let model = self.registry.get(commodity)?;
        let location = self.check_location(location)?;
        let raw = check_macro_inputs(macro_inputs)?;
        let dates = parse_dates(dates)?;

        let normalized = self.params.transform_row(&raw);

        let records = dates
            .into_iter()
            .map(|date| score_date(model, location, date, &normalized))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(commodity, location, n = records.len(), "served prediction batch");
        Ok(records)
    }

    /// Score a single date through the batch path.
    pub fn predict_one(
        &self,
        commodity: &str,
        location: &str,
        date: &str,
        macro_inputs: &HashMap<String, f64>,
    ) -> Result<PredictionRecord, PredictError> {
        let mut records = self.predict_records(commodity, location, &[date], macro_inputs)?;
        records
            .pop()
            .ok_or_else(|| PredictError::Internal("no prediction produced".to_string()))
    }

    fn check_location<'a>(&self, location: &'a str) -> Result<&'a str, PredictError> {
        let trimmed = location.trim();
        if self.vocabulary.contains(trimmed) {
            Ok(trimmed)
        } else {
            Err(PredictError::UnknownLocation {
                location: location.to_string(),
                valid: self.vocabulary.labels().to_vec(),
            })
        }
    }
}

fn check_macro_inputs(inputs: &HashMap<String, f64>) -> Result<MacroRow, PredictError> {
    let missing: Vec<String> = MacroCovariate::ALL
        .iter()
        .map(|c| c.column_name())
        .filter(|name| !inputs.contains_key(*name))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(PredictError::MissingMacroInput { missing });
    }

    let mut row: MacroRow = [None; MacroCovariate::COUNT];
    for covariate in MacroCovariate::ALL {
        let key = covariate.column_name();
        let value = inputs.get(key).copied().filter(|v| v.is_finite());
        let Some(v) = value else {
            return Err(PredictError::InvalidMacroInput { key: key.to_string() });
        };
        row[covariate.index()] = Some(v);
    }
    Ok(row)
}

fn parse_dates<S: AsRef<str>>(dates: &[S]) -> Result<Vec<NaiveDate>, PredictError> {
    dates
        .iter()
        .map(|s| {
            let s = s.as_ref();
            parse_date(s).ok_or_else(|| PredictError::InvalidDate { value: s.to_string() })
        })
        .collect()
}

fn score_date(
    model: &CommodityModel,
    location: &str,
    date: NaiveDate,
    normalized: &[f64; MacroCovariate::COUNT],
) -> Result<PredictionRecord, PredictError> {
    let inputs = FeatureInputs {
        residual: FUTURE_RESIDUAL,
        date,
        macros: normalized,
        location: Some(location),
    };
    let row = model
        .schema
        .assemble_row(&inputs)
        .map_err(|e| PredictError::Internal(e.to_string()))?;
    let raw = model
        .regressor
        .predict_row(&row)
        .map_err(|e| PredictError::Internal(e.to_string()))?;
    if !raw.is_finite() {
        return Err(PredictError::Internal(format!("non-finite prediction for {date}")));
    }

    Ok(PredictionRecord {
        commodity: model.commodity.clone(),
        location: location.to_string(),
        date,
        predicted_price: round_price(raw),
    })
}

/// Round to 2 decimals, ties to even.
pub fn round_price(v: f64) -> f64 {
    (v * 100.0).round_ties_even() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    use crate::data::sample::{SampleSpec, generate_corpus};
    use crate::domain::TrainingOptions;

    fn service() -> &'static PredictionService {
        static SERVICE: OnceLock<PredictionService> = OnceLock::new();
        SERVICE.get_or_init(|| {
            let corpus = generate_corpus(&SampleSpec::default()).unwrap();
            let params = NormalizationParameters::fit(&corpus).unwrap();
            let vocabulary = corpus.vocabulary();
            let outcome =
                CommodityModelRegistry::train_all(&corpus, &params, &vocabulary, &TrainingOptions::default());
            PredictionService::new(outcome.registry, vocabulary, params)
        })
    }

    fn macros() -> HashMap<String, f64> {
        HashMap::from([
            ("CPI Food Items".to_string(), 300.0),
            ("PMS PRICE".to_string(), 600.0),
            ("Central Rate (US DOLL)".to_string(), 1500.0),
            ("mpr".to_string(), 18.5),
        ])
    }

    fn records(output: PredictionOutput) -> Vec<PredictionRecord> {
        match output {
            PredictionOutput::Records(r) => r,
            PredictionOutput::Export(_) => panic!("expected records"),
        }
    }

    #[test]
    fn end_to_end_two_dates() {
        let out = service()
            .predict_batch(
                "commodity_A",
                "location_X",
                &["2025-01-01", "2025-01-02"],
                &macros(),
                false,
                "x",
            )
            .unwrap();
        let recs = records(out);

        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(recs[1].date, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        for r in &recs {
            assert_eq!(r.commodity, "commodity_A");
            assert_eq!(r.location, "location_X");
            assert!(r.predicted_price.is_finite());
            assert_eq!(round_price(r.predicted_price), r.predicted_price);
        }
    }

    #[test]
    fn output_follows_request_order_without_dedup() {
        let dates = ["2025-03-01", "2025-01-01", "2025-03-01"];
        let recs = service()
            .predict_records("commodity_B", "location_Y", &dates, &macros())
            .unwrap();
        let got: Vec<String> = recs.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(got, dates);
        assert_eq!(recs[0].predicted_price, recs[2].predicted_price);
    }

    #[test]
    fn commodity_is_validated_before_location() {
        let err = service()
            .predict_records("Rice", "Nowhere", &["2025-01-01"], &macros())
            .unwrap_err();
        match err {
            PredictError::UnknownCommodity { commodity, valid } => {
                assert_eq!(commodity, "Rice");
                assert_eq!(valid, vec!["commodity_A", "commodity_B", "commodity_C"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_location_lists_vocabulary() {
        let err = service()
            .predict_records("commodity_A", "Nowhere", &["2025-01-01"], &macros())
            .unwrap_err();
        assert_eq!(
            err,
            PredictError::UnknownLocation {
                location: "Nowhere".to_string(),
                valid: vec!["location_X".to_string(), "location_Y".to_string()],
            }
        );
        assert!(err.is_validation());
    }

    #[test]
    fn missing_macro_keys_are_named() {
        let mut inputs = macros();
        inputs.remove("mpr");
        inputs.remove("PMS PRICE");
        let err = service()
            .predict_records("commodity_A", "location_X", &["not a date"], &inputs)
            .unwrap_err();
        assert_eq!(
            err,
            PredictError::MissingMacroInput {
                missing: vec!["PMS PRICE".to_string(), "mpr".to_string()],
            }
        );
    }

    #[test]
    fn non_finite_macro_and_bad_dates_are_rejected() {
        let mut inputs = macros();
        inputs.insert("mpr".to_string(), f64::NAN);
        let err = service()
            .predict_records("commodity_A", "location_X", &["2025-01-01"], &inputs)
            .unwrap_err();
        assert_eq!(err, PredictError::InvalidMacroInput { key: "mpr".to_string() });

        let err = service()
            .predict_records("commodity_A", "location_X", &["2025-01-01", "2025-13-40"], &macros())
            .unwrap_err();
        assert_eq!(err, PredictError::InvalidDate { value: "2025-13-40".to_string() });
    }

    #[test]
    fn export_serializes_the_same_records() {
        let dates = ["2025-01-01", "2025-01-02", "2025-01-03"];
        let plain = service()
            .predict_records("commodity_C", "location_Y", &dates, &macros())
            .unwrap();
        let out = service()
            .predict_batch("commodity_C", "location_Y", &dates, &macros(), true, "out.csv")
            .unwrap();

        let PredictionOutput::Export(file) = out else {
            panic!("expected export");
        };
        assert_eq!(file.file_name, "out.csv");
        assert_eq!(file.mime_type, "text/csv");
        assert_eq!(file.bytes, format_records(&plain, ExportFormat::Csv).unwrap());

        let mut reader = csv::Reader::from_reader(file.bytes.as_slice());
        let parsed: Vec<PredictionRecord> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(parsed, plain);
    }

    #[test]
    fn xlsx_export_by_default() {
        let out = service()
            .predict_batch("commodity_A", "location_X", &["2025-01-01"], &macros(), true, "predictions.xlsx")
            .unwrap();
        let PredictionOutput::Export(file) = out else {
            panic!("expected export");
        };
        assert_eq!(file.mime_type, ExportFormat::Xlsx.mime_type());
        assert_eq!(&file.bytes[..2], b"PK");
    }

    #[test]
    fn xlsx_export_matches_records() {
        use calamine::Data;

        let dates = ["2025-03-01", "2025-01-01", "2025-03-01"];
        let plain = service()
            .predict_records("commodity_B", "location_Y", &dates, &macros())
            .unwrap();
        let out = service()
            .predict_batch("commodity_B", "location_Y", &dates, &macros(), true, "batch.xlsx")
            .unwrap();
        let PredictionOutput::Export(file) = out else {
            panic!("expected export");
        };

        let rows = crate::io::export::read_xlsx_rows(&file.bytes);
        assert_eq!(rows.len(), plain.len() + 1);
        assert_eq!(rows[0], crate::io::COLUMNS.map(|c| Data::String(c.to_string())).to_vec());
        for (row, record) in rows[1..].iter().zip(&plain) {
            let expected = vec![
                Data::String(record.commodity.clone()),
                Data::String(record.location.clone()),
                Data::String(record.date.format("%Y-%m-%d").to_string()),
                Data::Float(record.predicted_price),
            ];
            assert_eq!(row, &expected);
        }
    }

    #[test]
    fn predict_one_matches_batch() {
        let one = service()
            .predict_one("commodity_A", "location_Y", "2025-06-15", &macros())
            .unwrap();
        let batch = service()
            .predict_records("commodity_A", "location_Y", &["2025-06-15"], &macros())
            .unwrap();
        assert_eq!(one, batch[0]);
    }

    #[test]
    fn concurrent_calls_agree() {
        let expected = service()
            .predict_records("commodity_B", "location_X", &["2025-02-01"], &macros())
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let svc = service().clone();
                std::thread::spawn(move || {
                    svc.predict_records("commodity_B", "location_X", &["2025-02-01"], &macros())
                        .unwrap()
                })
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    }

    #[test]
    fn rounding_ties_go_to_even() {
        assert_eq!(round_price(0.125), 0.12);
        assert_eq!(round_price(0.375), 0.38);
        assert_eq!(round_price(-0.125), -0.12);
        assert_eq!(round_price(1.005_000_1), 1.01);
        assert_eq!(round_price(-2.345_000_1), -2.35);
        assert_eq!(round_price(7.0), 7.0);
    }
}
