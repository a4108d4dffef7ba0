//! Per-cycle HPPC analysis: SOC assignment, detection and extraction.

use crate::detect::{DetectionConfig, find_pulse_starts};
use crate::error::{PulseError, PulseResult};
use crate::extract::{ExtractionConfig, Pulse, extract_pulse};
use crate::record::CyclingRecord;
use ecm_ocv::{OcvCurve, SocExtrapolation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub detection: DetectionConfig,
    pub extraction: ExtractionConfig,
    pub soc_policy: SocExtrapolation,
}

impl PulseConfig {
    pub fn validate(&self) -> PulseResult<()> {
        self.detection.validate()?;
        if self.extraction.window_size == 0 {
            return Err(PulseError::InvalidConfig {
                what: "window_size must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// One analysed pulse-power cycle.
#[derive(Debug, Clone)]
pub struct HppcCycle {
    record: CyclingRecord,
    soc: Vec<f64>,
    starts: Vec<usize>,
    window_size: usize,
}

impl HppcCycle {
    /// Assign SOC to every sample and detect pulse starts.
    ///
    /// Finding no pulses is not an error here; it surfaces when a pulse is
    /// requested.
    pub fn analyze(
        record: CyclingRecord,
        curve: &OcvCurve,
        config: &PulseConfig,
    ) -> PulseResult<Self> {
        config.validate()?;
        let soc = curve.soc_series(record.voltage(), config.soc_policy)?;
        let starts = find_pulse_starts(record.current(), &config.detection);
        tracing::debug!(
            cycle = record.cycle(),
            samples = record.len(),
            pulses = starts.len(),
            "cycle analysed"
        );
        Ok(Self {
            record,
            soc,
            starts,
            window_size: config.extraction.window_size,
        })
    }

    pub fn cycle(&self) -> usize {
        self.record.cycle()
    }

    pub fn record(&self) -> &CyclingRecord {
        &self.record
    }

    pub fn soc(&self) -> &[f64] {
        &self.soc
    }

    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    pub fn pulse_count(&self) -> usize {
        self.starts.len()
    }

    pub fn pulse(&self, pulse_number: usize) -> PulseResult<Pulse> {
        if self.starts.is_empty() {
            return Err(PulseError::NoPulsesDetected {
                cycle: self.cycle(),
            });
        }
        let Some(&start) = self.starts.get(pulse_number) else {
            return Err(PulseError::PulseOutOfRange {
                pulse: pulse_number,
                available: self.starts.len(),
            });
        };
        extract_pulse(&self.record, &self.soc, start, pulse_number, self.window_size)
    }

    /// All pulses in detection order; fails when none were detected.
    pub fn pulses(&self) -> PulseResult<Vec<Pulse>> {
        if self.starts.is_empty() {
            return Err(PulseError::NoPulsesDetected {
                cycle: self.cycle(),
            });
        }
        (0..self.starts.len()).map(|n| self.pulse(n)).collect()
    }
}
