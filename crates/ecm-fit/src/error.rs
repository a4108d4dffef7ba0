//! Error types for model evaluation and parameter fitting.

use crate::model::Parameter;
use ecm_ocv::OcvError;
use thiserror::Error;

/// Failure of a single model evaluation.
///
/// The optimizer scores these as infinite cost; they never abort a fit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Simulation diverged: {reason}")]
    SimulationDiverged { reason: String },

    #[error("Invalid excitation: {what}")]
    InvalidExcitation { what: String },
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Errors that stop a fit from being set up or run.
#[derive(Error, Debug)]
pub enum FitError {
    #[error("Unsupported model order: {rc_pairs} RC pairs (expected 1 or 2)")]
    UnsupportedModelOrder { rc_pairs: u8 },

    #[error("Invalid prior for {parameter}: {what}")]
    InvalidPrior { parameter: Parameter, what: String },

    #[error("Parameter vector has {got} elements, model expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid problem: {what}")]
    InvalidProblem { what: String },

    #[error("Invalid cell constants: {what}")]
    InvalidCell { what: String },

    #[error("OCV lookup failed: {0}")]
    Ocv(#[from] OcvError),
}

pub type FitResult<T> = Result<T, FitError>;
