//! Error types.
//!
//! - `AppError`: process-level failures carrying an exit code (startup, CLI)
//! - `FitError`: a single commodity could not be fitted (recoverable)
//! - `PredictError`: a prediction request was rejected or failed

use thiserror::Error;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Why a single commodity was left out of the registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("degenerate series: {0}")]
    Degenerate(String),

    #[error("series contains non-finite values after gap filling")]
    NonFinite,

    #[error("residual model did not converge: {0}")]
    NotConverged(String),

    #[error("training split is empty after dropping incomplete rows")]
    EmptyTrainingSplit,
}

/// Failure of a prediction request.
///
/// Everything except `Internal` is a caller input error detected before any
/// regressor is invoked.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    #[error("'{commodity}' is not trained. Choose from: {}", valid.join(", "))]
    UnknownCommodity { commodity: String, valid: Vec<String> },

    #[error("'{location}' is not a recognized location. Choose from: {}", valid.join(", "))]
    UnknownLocation { location: String, valid: Vec<String> },

    #[error("missing macroeconomic input: {}", missing.join(", "))]
    MissingMacroInput { missing: Vec<String> },

    #[error("macroeconomic input '{key}' must be a finite number")]
    InvalidMacroInput { key: String },

    #[error("invalid date '{value}'")]
    InvalidDate { value: String },

    #[error("prediction error: {0}")]
    Internal(String),
}

impl PredictError {
    /// True for caller input errors, false for internal failures.
    pub fn is_validation(&self) -> bool {
        !matches!(self, PredictError::Internal(_))
    }
}

impl From<PredictError> for AppError {
    fn from(err: PredictError) -> Self {
        let code = if err.is_validation() { 2 } else { 4 };
        AppError::new(code, err.to_string())
    }
}
