//! Error types for OCV curve construction and lookup.

use ecm_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcvError {
    #[error("No usable capacity data: {what}")]
    DataUnavailable { what: String },

    #[error("Polynomial fit of degree {degree} is degenerate: {what} (lower the degree)")]
    FitDegeneracy { degree: usize, what: String },

    #[error("Invalid OCV table: {what}")]
    InvalidTable { what: String },

    #[error("Voltage {voltage} V outside OCV table range [{min}, {max}] V")]
    VoltageOutOfRange { voltage: f64, min: f64, max: f64 },

    #[error("Malformed OCV file at line {line}: {what}")]
    Parse { line: usize, what: String },

    #[error("Numeric error: {0}")]
    Numeric(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type OcvResult<T> = Result<T, OcvError>;
