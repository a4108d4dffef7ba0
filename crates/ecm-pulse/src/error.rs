//! Error types for record handling and pulse segmentation.

use ecm_ocv::OcvError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Invalid record: {what}")]
    InvalidRecord { what: String },

    #[error("Invalid configuration: {what}")]
    InvalidConfig { what: String },

    #[error("No pulses detected in cycle {cycle}")]
    NoPulsesDetected { cycle: usize },

    #[error("Pulse {pulse} out of range: {available} pulses detected")]
    PulseOutOfRange { pulse: usize, available: usize },

    #[error("Pulse start {start} outside record of {len} samples")]
    StartOutOfRange { start: usize, len: usize },

    #[error("SOC assignment failed: {0}")]
    Ocv(#[from] OcvError),
}

pub type PulseResult<T> = Result<T, PulseError>;
