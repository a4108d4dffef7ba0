//! Result data types.

use ecm_fit::{FitStatus, Parameter};
use serde::{Deserialize, Serialize};

pub type RunId = String;

/// `(battery_label, cycle, pulse_number)`, unique per lookup table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey {
    pub battery_label: String,
    pub cycle: usize,
    pub pulse_number: usize,
}

/// One pulse of the SOC-indexed parameter lookup table.
///
/// Parameter fields are `None` for pulses whose fit failed or timed out;
/// `r2`/`c2` are also `None` for single-RC tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTableRow {
    pub battery_label: String,
    pub cycle: usize,
    pub pulse_number: usize,
    /// Peak pulse current [A].
    pub current: f64,
    /// OCV at the pulse's initial SOC [V].
    pub voltage: f64,
    /// Cell temperature [K].
    pub temperature: f64,
    /// Initial SOC of the pulse, as a fraction.
    pub soc: f64,
    pub r0: Option<f64>,
    pub r1: Option<f64>,
    pub c1: Option<f64>,
    pub r2: Option<f64>,
    pub c2: Option<f64>,
}

impl LookupTableRow {
    pub fn key(&self) -> RowKey {
        RowKey {
            battery_label: self.battery_label.clone(),
            cycle: self.cycle,
            pulse_number: self.pulse_number,
        }
    }

    /// True when the fit produced parameters.
    pub fn is_fitted(&self) -> bool {
        self.r0.is_some()
    }

    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::R0 => self.r0,
            Parameter::R1 => self.r1,
            Parameter::C1 => self.c1,
            Parameter::R2 => self.r2,
            Parameter::C2 => self.c2,
        }
    }
}

/// Per-pulse outcome recorded in the run manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseStatusRecord {
    pub battery_label: String,
    pub cycle: usize,
    pub pulse_number: usize,
    pub status: FitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A cycle that produced no pulses to fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleFailureRecord {
    pub battery_label: String,
    pub cycle: usize,
    pub reason: String,
}

/// A label abandoned during shared setup (OCV curve or data loading).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelFailureRecord {
    pub battery_label: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub warnings: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cycles_skipped: usize,
    #[serde(default)]
    pub labels_failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, status: FitStatus) {
        match status {
            FitStatus::Succeeded => self.succeeded += 1,
            FitStatus::SucceededWithWarnings => self.warnings += 1,
            FitStatus::Failed => self.failed += 1,
            FitStatus::TimedOut => self.timed_out += 1,
        }
    }

    pub fn from_statuses<'a>(records: impl IntoIterator<Item = &'a PulseStatusRecord>) -> Self {
        let mut summary = Self::default();
        for r in records {
            summary.record(r.status);
        }
        summary
    }

    pub fn total_pulses(&self) -> usize {
        self.succeeded + self.warnings + self.failed + self.timed_out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub name: String,
    pub timestamp: String,
    pub tool_version: String,
    pub rc_pairs: u8,
    pub labels: Vec<String>,
    pub pulses: Vec<PulseStatusRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_cycles: Vec<CycleFailureRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_labels: Vec<LabelFailureRecord>,
    pub summary: BatchSummary,
    /// Cancelled or timed out; kept for inspection but never served as a cache hit.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
}
