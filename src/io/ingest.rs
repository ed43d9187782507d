//! CSV ingest of the historical price table.
//!
//! Expected layout (header names are matched case-insensitively, a UTF-8 BOM
//! on the first header is ignored):
//!
//! - `Date`, `Location`
//! - commodity price columns at positions 3 to 11 (any header name that is not
//!   one of the fixed columns)
//! - `CPI Food Items`, `PMS PRICE`, `Central Rate (US DOLL)`, `mpr`
//!
//! A row that cannot be read (malformed CSV, more cells than headers, or an
//! unparseable date) aborts the load with the offending line number. Short
//! rows and empty or non-numeric cells become missing values and are dealt
//! with by training.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::debug;

use crate::domain::{Corpus, HistoricalRecord, MacroCovariate, MacroRow, parse_date};
use crate::error::AppError;

pub const DATE_COLUMN: &str = "Date";
pub const LOCATION_COLUMN: &str = "Location";

/// Commodity columns sit at these header positions.
const COMMODITY_POSITIONS: std::ops::Range<usize> = 2..11;

/// Row counts from one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Resolved column positions.
#[derive(Debug, Clone)]
struct Layout {
    date: usize,
    location: usize,
    commodities: Vec<(String, usize)>,
    macros: [usize; MacroCovariate::COUNT],
}

/// Load the training corpus from a CSV file.
pub fn load_corpus(path: &Path) -> Result<(Corpus, IngestReport), AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open corpus CSV '{}': {e}", path.display())))?;
    read_corpus(file)
}

/// Load the training corpus from any CSV reader.
pub fn read_corpus<R: Read>(reader: R) -> Result<(Corpus, IngestReport), AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read corpus headers: {e}")))?
        .clone();

    let layout = resolve_layout(&headers)?;

    let mut records = Vec::new();
    let mut report = IngestReport::default();

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        report.rows_read += 1;

        let row = result.map_err(|e| row_error(line, format!("CSV parse error: {e}")))?;
        if row.len() > headers.len() {
            return Err(row_error(
                line,
                format!("{} cells but only {} columns in the header", row.len(), headers.len()),
            ));
        }

        let record = parse_row(&row, &layout).map_err(|message| row_error(line, message))?;
        records.push(record);
    }

    report.rows_used = records.len();
    if records.is_empty() {
        return Err(AppError::new(3, "Corpus has no usable rows."));
    }

    let corpus = Corpus {
        commodities: layout.commodities.into_iter().map(|(name, _)| name).collect(),
        records,
    };
    debug!(rows = report.rows_used, commodities = corpus.commodities.len(), "parsed corpus");
    Ok((corpus, report))
}

fn row_error(line: usize, message: String) -> AppError {
    AppError::new(2, format!("Corpus line {line}: {message}"))
}

fn resolve_layout(headers: &StringRecord) -> Result<Layout, AppError> {
    let header_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect();

    let require = |name: &str| -> Result<usize, AppError> {
        header_map
            .get(&normalize_header_name(name))
            .copied()
            .ok_or_else(|| AppError::new(2, format!("Missing required column: `{name}`")))
    };

    let date = require(DATE_COLUMN)?;
    let location = require(LOCATION_COLUMN)?;
    let mut macros = [0usize; MacroCovariate::COUNT];
    for covariate in MacroCovariate::ALL {
        macros[covariate.index()] = require(covariate.column_name())?;
    }

    let commodities: Vec<(String, usize)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| COMMODITY_POSITIONS.contains(idx))
        .filter(|(idx, _)| *idx != date && *idx != location && !macros.contains(idx))
        .map(|(idx, name)| (clean_header_name(name).to_string(), idx))
        .filter(|(name, _)| !name.is_empty())
        .collect();

    if commodities.is_empty() {
        return Err(AppError::new(
            2,
            "No commodity columns found (expected price columns after `Date` and `Location`).",
        ));
    }

    Ok(Layout {
        date,
        location,
        commodities,
        macros,
    })
}

fn parse_row(row: &StringRecord, layout: &Layout) -> Result<HistoricalRecord, String> {
    let raw_date = get_cell(row, layout.date).ok_or_else(|| "Missing required value: `Date`".to_string())?;
    let date = parse_date(raw_date).ok_or_else(|| {
        format!("Invalid date '{raw_date}'. Expected one of: YYYY-MM-DD, YYYY/MM/DD, DD/MM/YYYY, DD-MM-YYYY.")
    })?;

    let location = get_cell(row, layout.location).map(str::to_string);

    let prices = layout
        .commodities
        .iter()
        .map(|(_, idx)| parse_opt_f64(get_cell(row, *idx)))
        .collect();

    let mut macros: MacroRow = [None; MacroCovariate::COUNT];
    for (slot, idx) in macros.iter_mut().zip(layout.macros) {
        *slot = parse_opt_f64(get_cell(row, idx));
    }

    Ok(HistoricalRecord {
        date,
        location,
        prices,
        macros,
    })
}

fn clean_header_name(name: &str) -> &str {
    // Spreadsheet exports often prefix the first header with a BOM.
    name.trim().trim_start_matches('\u{feff}').trim()
}

fn normalize_header_name(name: &str) -> String {
    clean_header_name(name).to_ascii_lowercase()
}

fn get_cell(row: &StringRecord, idx: usize) -> Option<&str> {
    row.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?.replace(',', "");
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
