//! Synthetic corpus generation.
//!
//! Produces a daily table in the ingest layout: commodity prices that follow
//! a drifting AR(1)-in-differences walk pushed around by food inflation, with
//! a per-location premium, plus four macro covariates that wander the way
//! the real indicators do (slow CPI drift, noisy fuel price, a depreciating
//! exchange rate, a policy rate that moves in quarter-point steps).

use std::path::Path;

use chrono::{Duration, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Corpus, HistoricalRecord, MacroCovariate};
use crate::error::AppError;
use crate::io::{DATE_COLUMN, LOCATION_COLUMN};

/// Commodity columns the ingest layout can hold.
pub const MAX_COMMODITIES: usize = 9;
pub const MAX_LOCATIONS: usize = 26;

/// Differenced-price AR coefficient.
const PRICE_AR: f64 = 0.4;
/// How strongly a CPI move feeds into prices.
const CPI_PASS_THROUGH: f64 = 0.6;

#[derive(Debug, Clone)]
pub struct SampleSpec {
    pub rows: usize,
    pub locations: usize,
    pub commodities: usize,
    pub seed: u64,
    pub start: NaiveDate,
    /// Index of a commodity whose price never moves.
    pub constant_commodity: Option<usize>,
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            rows: 100,
            locations: 2,
            commodities: 3,
            seed: 42,
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN),
            constant_commodity: None,
        }
    }
}

/// `commodity_A`, `commodity_B`, ...
pub fn commodity_name(idx: usize) -> String {
    format!("commodity_{}", letter(idx))
}

/// `location_X`, `location_Y`, `location_Z`, `location_A`, ...
pub fn location_name(idx: usize) -> String {
    format!("location_{}", letter(idx + 23))
}

fn letter(idx: usize) -> char {
    (b'A' + (idx % 26) as u8) as char
}

pub fn generate_corpus(spec: &SampleSpec) -> Result<Corpus, AppError> {
    if spec.rows == 0 {
        return Err(AppError::new(2, "Sample row count must be > 0."));
    }
    if spec.locations == 0 || spec.locations > MAX_LOCATIONS {
        return Err(AppError::new(2, format!("Sample location count must be in 1..={MAX_LOCATIONS}.")));
    }
    if spec.commodities == 0 || spec.commodities > MAX_COMMODITIES {
        return Err(AppError::new(
            2,
            format!("Sample commodity count must be in 1..={MAX_COMMODITIES}."),
        ));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, 1.0).map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let macros = macro_paths(spec.rows, &mut rng, &normal);

    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(spec.commodities);
    for c in 0..spec.commodities {
        if spec.constant_commodity == Some(c) {
            columns.push(vec![100.0; spec.rows]);
            continue;
        }

        let base = 200.0 * (c as f64 + 1.0);
        let noise = 0.01 * base;
        let mut level = base;
        let mut prev_step = 0.0;
        let mut path = Vec::with_capacity(spec.rows);
        for (i, row) in macros.iter().enumerate() {
            if i > 0 {
                let cpi_move = row[0] - macros[i - 1][0];
                let step = PRICE_AR * prev_step + CPI_PASS_THROUGH * cpi_move + noise * normal.sample(&mut rng);
                level = (level + step).max(1.0);
                prev_step = step;
            }
            let premium = 0.02 * base * (i % spec.locations) as f64;
            path.push(level + premium);
        }
        columns.push(path);
    }

    let commodities = (0..spec.commodities).map(commodity_name).collect();
    let records = (0..spec.rows)
        .map(|i| HistoricalRecord {
            date: spec.start + Duration::days(i as i64),
            location: Some(location_name(i % spec.locations)),
            prices: columns.iter().map(|col| Some(round_cents(col[i]))).collect(),
            macros: macros[i].map(|v| Some(round_cents(v))),
        })
        .collect();

    Ok(Corpus { commodities, records })
}

/// Raw covariate paths in `MacroCovariate::ALL` order.
fn macro_paths(rows: usize, rng: &mut StdRng, normal: &Normal<f64>) -> Vec<[f64; MacroCovariate::COUNT]> {
    let mut cpi = 250.0;
    let mut pms = 500.0;
    let mut fx = 800.0;
    let mut mpr = 18.0;

    let mut out = Vec::with_capacity(rows);
    for i in 0..rows {
        if i > 0 {
            cpi += 0.15 + 0.5 * normal.sample(rng);
            pms = (pms + 4.0 * normal.sample(rng)).max(50.0);
            fx += 1.5 + 5.0 * normal.sample(rng);
            if i % 30 == 0 {
                mpr += if rng.gen_bool(0.7) { 0.25 } else { -0.25 };
            }
        }
        out.push([cpi, pms, fx, mpr]);
    }
    out
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Write a corpus in the layout `io::load_corpus` reads.
pub fn write_corpus_csv(path: &Path, corpus: &Corpus) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create corpus CSV '{}': {e}", path.display())))?;

    let mut header = vec![DATE_COLUMN.to_string(), LOCATION_COLUMN.to_string()];
    header.extend(corpus.commodities.iter().cloned());
    header.extend(MacroCovariate::ALL.iter().map(|c| c.column_name().to_string()));
    writer
        .write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write corpus CSV header: {e}")))?;

    for r in &corpus.records {
        let mut row = vec![
            r.date.format("%Y-%m-%d").to_string(),
            r.location.clone().unwrap_or_default(),
        ];
        row.extend(r.prices.iter().map(cell));
        row.extend(r.macros.iter().map(cell));
        writer
            .write_record(&row)
            .map_err(|e| AppError::new(2, format!("Failed to write corpus CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush corpus CSV: {e}")))
}

fn cell(v: &Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}
