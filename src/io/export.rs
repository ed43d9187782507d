//! Serialize prediction records into a downloadable table.
//!
//! Column order is fixed: Commodity, Location, Date (ISO-8601), Predicted Price.
//! The whole table is built in memory.

use std::path::Path;

use rust_xlsxwriter::{Workbook, XlsxError};
use thiserror::Error;

use crate::domain::PredictionRecord;

pub const COLUMNS: [&str; 4] = ["Commodity", "Location", "Date", "Predicted Price"];
pub const SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    /// `.csv` selects CSV; anything else is a spreadsheet.
    pub fn from_file_name(name: &str) -> Self {
        let is_csv = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv { ExportFormat::Csv } else { ExportFormat::Xlsx }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ExportFormat::Csv => "text/csv",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("spreadsheet export failed: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv export failed: {0}")]
    Flush(String),
}

/// Serialize records in the given format.
pub fn format_records(records: &[PredictionRecord], format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Xlsx => format_xlsx(records),
        ExportFormat::Csv => format_csv(records),
    }
}

fn format_xlsx(records: &[PredictionRecord]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;

        for (col, name) in COLUMNS.iter().enumerate() {
            sheet.write_string(0, col as u16, *name)?;
        }
        for (i, r) in records.iter().enumerate() {
            let row = (i + 1) as u32;
            sheet.write_string(row, 0, r.commodity.as_str())?;
            sheet.write_string(row, 1, r.location.as_str())?;
            sheet.write_string(row, 2, r.date.format("%Y-%m-%d").to_string())?;
            sheet.write_number(row, 3, r.predicted_price)?;
        }
    }
    Ok(workbook.save_to_buffer()?)
}

fn format_csv(records: &[PredictionRecord]) -> Result<Vec<u8>, ExportError> {
    // Headers come from the serde renames on `PredictionRecord`.
    let mut writer = csv::Writer::from_writer(Vec::new());
    for r in records {
        writer.serialize(r)?;
    }
    if records.is_empty() {
        writer.write_record(COLUMNS)?;
    }
    writer.into_inner().map_err(|e| ExportError::Flush(e.to_string()))
}

/// Cells of the exported sheet, header row first.
#[cfg(test)]
pub(crate) fn read_xlsx_rows(bytes: &[u8]) -> Vec<Vec<calamine::Data>> {
    use calamine::{Reader, Xlsx};

    let mut workbook: Xlsx<_> = Xlsx::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    let range = workbook.worksheet_range(SHEET_NAME).unwrap();
    range.rows().map(|row| row.to_vec()).collect()
}
