//! One test cycle of one cell: aligned time, voltage and current samples.

use crate::error::{PulseError, PulseResult};
use serde::{Deserialize, Serialize};

/// How raw instrument arrays become a [`CyclingRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    /// Spacing of the implicit time axis [s].
    pub sample_period_s: f64,
    /// Flip the current sign so that discharge is positive.
    pub invert_current: bool,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            sample_period_s: 1.0,
            invert_current: true,
        }
    }
}

/// Immutable `(time, voltage, current)` samples of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CyclingRecord {
    cycle: usize,
    time: Vec<f64>,
    voltage: Vec<f64>,
    current: Vec<f64>,
}

impl CyclingRecord {
    /// Build from already-clean samples.
    ///
    /// All three series must have equal length, be finite, and time must be
    /// non-decreasing.
    pub fn new(
        cycle: usize,
        time: Vec<f64>,
        voltage: Vec<f64>,
        current: Vec<f64>,
    ) -> PulseResult<Self> {
        if time.len() != voltage.len() || time.len() != current.len() {
            return Err(PulseError::InvalidRecord {
                what: format!(
                    "series lengths differ: time={}, voltage={}, current={}",
                    time.len(),
                    voltage.len(),
                    current.len()
                ),
            });
        }
        if let Some(i) = (0..time.len())
            .find(|&i| !(time[i].is_finite() && voltage[i].is_finite() && current[i].is_finite()))
        {
            return Err(PulseError::InvalidRecord {
                what: format!("non-finite sample at index {i}"),
            });
        }
        if let Some(i) = time.windows(2).position(|w| w[1] < w[0]) {
            return Err(PulseError::InvalidRecord {
                what: format!("time decreases at index {}", i + 1),
            });
        }
        Ok(Self {
            cycle,
            time,
            voltage,
            current,
        })
    }

    /// Build from raw instrument arrays.
    ///
    /// Samples where either voltage or current is NaN are dropped, the
    /// current sign is optionally flipped, and time is `i * sample_period_s`
    /// over the surviving samples.
    pub fn from_raw(
        cycle: usize,
        voltage: &[f64],
        current: &[f64],
        config: &RecordConfig,
    ) -> PulseResult<Self> {
        if !(config.sample_period_s.is_finite() && config.sample_period_s > 0.0) {
            return Err(PulseError::InvalidConfig {
                what: format!("sample period must be positive, got {}", config.sample_period_s),
            });
        }
        let sign = if config.invert_current { -1.0 } else { 1.0 };
        let (voltage, current): (Vec<f64>, Vec<f64>) = voltage
            .iter()
            .zip(current)
            .filter(|(v, i)| v.is_finite() && i.is_finite())
            .map(|(&v, &i)| (v, sign * i))
            .unzip();
        let time = (0..voltage.len())
            .map(|i| i as f64 * config.sample_period_s)
            .collect();
        Self::new(cycle, time, voltage, current)
    }

    pub fn cycle(&self) -> usize {
        self.cycle
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn voltage(&self) -> &[f64] {
        &self.voltage
    }

    pub fn current(&self) -> &[f64] {
        &self.current
    }
}
