//! ecm-results: lookup table assembly, parameter exports and run storage.

pub mod csv;
pub mod export;
pub mod hash;
pub mod lookup;
pub mod store;
pub mod table;
pub mod types;

pub use csv::{csv_header, parse_csv_str, table_order, to_csv_string};
pub use export::{AggregateParameters, PulseParameterDoc};
pub use hash::{compute_curve_key, compute_run_id};
pub use lookup::ParameterLookup;
pub use store::{ResultStore, TraceColumns};
pub use table::{ResultTable, Upsert};
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error at line {line}: {what}")]
    Csv { line: usize, what: String },

    #[error("Invalid battery label '{label}': {reason}")]
    InvalidLabel { label: String, reason: String },

    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("{path} holds a {found}-RC table; this run fits {expected}-RC")]
    ModelOrderMismatch {
        path: String,
        found: u8,
        expected: u8,
    },

    #[error("Parameter lookup error: {what}")]
    Lookup { what: String },

    #[error("OCV curve error: {0}")]
    Ocv(#[from] ecm_ocv::OcvError),

    #[error(transparent)]
    Core(#[from] ecm_core::CoreError),
}
