//! Shared application service layer for ECM identification.
//!
//! This crate provides the operations the CLI exposes: configuration
//! loading, OCV curve construction, pulse analysis, batch fitting with
//! persistence, and queries over stored results.

pub mod batch_service;
pub mod config_service;
pub mod error;
pub mod ocv_service;
pub mod progress;
pub mod pulse_service;
pub mod query;

// Re-export key types for convenience
pub use batch_service::{
    BatchOptions, BatchRequest, BatchResponse, BatchTimingSummary, run_batch,
    run_batch_with_progress,
};
pub use config_service::{
    load_config, open_dataset, resolve_dataset_path, resolve_output_dir, save_config,
};
pub use error::{AppError, AppResult};
pub use ocv_service::{CurveOrigin, OcvReport, resolve_curve};
pub use progress::{BatchProgressEvent, BatchStage, FitProgress};
pub use pulse_service::{CycleAnalysis, CycleReport, analyze_label, pulse_report};
pub use query::{interpolate_parameters, list_runs, load_label_table, load_run};
