//! Error types for the ecm-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the backend crates
/// and provides a unified error interface for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read configuration file: {path}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration validation failed: {0}")]
    Validation(String),

    #[error("Battery label '{label}' not found; known labels: {}", known.join(", "))]
    LabelNotFound { label: String, known: Vec<String> },

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("OCV curve error: {0}")]
    Ocv(String),

    #[error("Pulse analysis error: {0}")]
    Pulse(String),

    #[error("Fit error: {0}")]
    Fit(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ecm-app operations.
pub type AppResult<T> = Result<T, AppError>;

// Conversions from backend error types
impl From<ecm_project::ProjectError> for AppError {
    fn from(err: ecm_project::ProjectError) -> Self {
        match err {
            ecm_project::ProjectError::Validation(e) => AppError::Validation(e.to_string()),
            other => AppError::Config(other.to_string()),
        }
    }
}

impl From<ecm_project::ValidationError> for AppError {
    fn from(err: ecm_project::ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<ecm_project::DatasetError> for AppError {
    fn from(err: ecm_project::DatasetError) -> Self {
        match err {
            ecm_project::DatasetError::LabelNotFound { label, known } => {
                AppError::LabelNotFound { label, known }
            }
            other => AppError::Dataset(other.to_string()),
        }
    }
}

impl From<ecm_ocv::OcvError> for AppError {
    fn from(err: ecm_ocv::OcvError) -> Self {
        AppError::Ocv(err.to_string())
    }
}

impl From<ecm_pulse::PulseError> for AppError {
    fn from(err: ecm_pulse::PulseError) -> Self {
        AppError::Pulse(err.to_string())
    }
}

impl From<ecm_fit::FitError> for AppError {
    fn from(err: ecm_fit::FitError) -> Self {
        AppError::Fit(err.to_string())
    }
}

impl From<ecm_results::ResultsError> for AppError {
    fn from(err: ecm_results::ResultsError) -> Self {
        match err {
            ecm_results::ResultsError::RunNotFound { run_id } => AppError::RunNotFound(run_id),
            other => AppError::Results(other.to_string()),
        }
    }
}
