//! Read/write the persisted normalization parameters.
//!
//! The scaler file is a small JSON document with one `{covariate, min, max}`
//! entry per macro covariate. It is written once per training pass and read
//! back by serving, so both sides scale inputs identically.

use std::fs::File;
use std::path::Path;

use crate::error::AppError;
use crate::features::NormalizationParameters;

/// Write the scaler JSON file.
pub fn write_scaler_json(path: &Path, params: &NormalizationParameters) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create scaler JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, params)
        .map_err(|e| AppError::new(2, format!("Failed to write scaler JSON: {e}")))?;

    Ok(())
}

/// Read and validate a scaler JSON file.
pub fn read_scaler_json(path: &Path) -> Result<NormalizationParameters, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open scaler JSON '{}': {e}", path.display())))?;
    let params: NormalizationParameters =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid scaler JSON: {e}")))?;
    params.validate()?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MacroCovariate;
    use crate::features::CovariateRange;

    fn params() -> NormalizationParameters {
        let ranges = MacroCovariate::ALL
            .iter()
            .enumerate()
            .map(|(i, &covariate)| CovariateRange {
                covariate,
                min: i as f64,
                max: 10.0 * (i as f64 + 1.0),
            })
            .collect();
        NormalizationParameters::from_ranges(ranges).unwrap()
    }

    #[test]
    fn written_scaler_reads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        write_scaler_json(&path, &params()).unwrap();
        assert_eq!(read_scaler_json(&path).unwrap(), params());
    }

    #[test]
    fn missing_or_corrupt_scaler_is_exit_code_2() {
        let dir = tempfile::tempdir().unwrap();
        let missing = read_scaler_json(&dir.path().join("nope.json")).unwrap_err();
        assert_eq!(missing.exit_code(), 2);

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"ranges\": 3}").unwrap();
        assert_eq!(read_scaler_json(&path).unwrap_err().exit_code(), 2);
    }
}
