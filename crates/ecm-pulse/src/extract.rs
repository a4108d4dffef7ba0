//! Fixed-size windows around detected pulse starts.

use crate::error::{PulseError, PulseResult};
use crate::record::CyclingRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Samples per pulse window, clipped at the end of the record.
    pub window_size: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { window_size: 1000 }
    }
}

/// Characteristics of one pulse window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseSummary {
    pub start_index: usize,
    /// Window length [samples].
    pub duration: usize,
    /// `max(V) - min(V)` inside the window [V].
    pub voltage_drop: f64,
    /// `max(|I|)` inside the window [A].
    pub peak_current: f64,
    pub initial_soc: f64,
    pub final_soc: f64,
}

/// Excitation and response of a pulse with strictly increasing time.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseTrace {
    pub time: Vec<f64>,
    pub current: Vec<f64>,
    pub voltage: Vec<f64>,
}

impl PulseTrace {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Duration from first to last sample [s].
    pub fn span_s(&self) -> f64 {
        match (self.time.first(), self.time.last()) {
            (Some(a), Some(b)) => b - a,
            _ => 0.0,
        }
    }
}

/// A contiguous window of a [`CyclingRecord`] with SOC annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Pulse {
    cycle: usize,
    pulse_number: usize,
    time: Vec<f64>,
    current: Vec<f64>,
    voltage: Vec<f64>,
    soc: Vec<f64>,
    summary: PulseSummary,
}

impl Pulse {
    pub fn cycle(&self) -> usize {
        self.cycle
    }

    pub fn pulse_number(&self) -> usize {
        self.pulse_number
    }

    pub fn start_index(&self) -> usize {
        self.summary.start_index
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

    pub fn current(&self) -> &[f64] {
        &self.current
    }

    pub fn voltage(&self) -> &[f64] {
        &self.voltage
    }

    pub fn soc(&self) -> &[f64] {
        &self.soc
    }

    pub fn summary(&self) -> &PulseSummary {
        &self.summary
    }

    /// Samples for fitting, keeping the first sample of any repeated timestamp.
    pub fn trace(&self) -> PulseTrace {
        let mut trace = PulseTrace {
            time: Vec::with_capacity(self.time.len()),
            current: Vec::with_capacity(self.time.len()),
            voltage: Vec::with_capacity(self.time.len()),
        };
        let mut last: Option<f64> = None;
        for ((&t, &i), &v) in self.time.iter().zip(&self.current).zip(&self.voltage) {
            if last.is_some_and(|prev| t <= prev) {
                continue;
            }
            trace.time.push(t);
            trace.current.push(i);
            trace.voltage.push(v);
            last = Some(t);
        }
        trace
    }
}

/// Cut the window `[start, min(start + window_size, len))` out of `record`.
///
/// `soc` must be aligned with the record samples.
pub fn extract_pulse(
    record: &CyclingRecord,
    soc: &[f64],
    start: usize,
    pulse_number: usize,
    window_size: usize,
) -> PulseResult<Pulse> {
    let len = record.len();
    if soc.len() != len {
        return Err(PulseError::InvalidRecord {
            what: format!("SOC series has {} samples, record has {len}", soc.len()),
        });
    }
    if window_size == 0 {
        return Err(PulseError::InvalidConfig {
            what: "window_size must be at least 1".to_string(),
        });
    }
    if start >= len {
        return Err(PulseError::StartOutOfRange { start, len });
    }
    let end = start.saturating_add(window_size).min(len);

    let time = record.time()[start..end].to_vec();
    let current = record.current()[start..end].to_vec();
    let voltage = record.voltage()[start..end].to_vec();
    let soc = soc[start..end].to_vec();

    let (v_min, v_max) = voltage
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let peak_current = current.iter().fold(0.0_f64, |acc, i| acc.max(i.abs()));

    let summary = PulseSummary {
        start_index: start,
        duration: end - start,
        voltage_drop: v_max - v_min,
        peak_current,
        initial_soc: soc[0],
        final_soc: soc[soc.len() - 1],
    };

    Ok(Pulse {
        cycle: record.cycle(),
        pulse_number,
        time,
        current,
        voltage,
        soc,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CyclingRecord {
        let time = (0..6).map(f64::from).collect();
        let voltage = vec![4.0, 3.9, 3.7, 3.75, 3.8, 3.85];
        let current = vec![0.0, 5.0, 5.0, -2.0, 0.0, 0.0];
        CyclingRecord::new(3, time, voltage, current).unwrap()
    }

    #[test]
    fn window_is_clipped_to_record() {
        let rec = record();
        let soc = vec![0.9, 0.89, 0.88, 0.87, 0.86, 0.85];
        let pulse = extract_pulse(&rec, &soc, 2, 1, 1000).unwrap();
        assert_eq!(pulse.len(), 4);
        assert_eq!(pulse.cycle(), 3);
        assert_eq!(pulse.pulse_number(), 1);
        let s = pulse.summary();
        assert_eq!(s.start_index, 2);
        assert_eq!(s.duration, 4);
        assert!((s.voltage_drop - 0.15).abs() < 1e-12);
        assert_eq!(s.peak_current, 5.0);
        assert_eq!(s.initial_soc, 0.88);
        assert_eq!(s.final_soc, 0.85);
    }

    #[test]
    fn summary_over_full_window() {
        let rec = record();
        let soc = vec![0.5; 6];
        let pulse = extract_pulse(&rec, &soc, 0, 0, 3).unwrap();
        assert_eq!(pulse.voltage(), &[4.0, 3.9, 3.7]);
        assert!((pulse.summary().voltage_drop - 0.3).abs() < 1e-12);
        assert_eq!(pulse.summary().peak_current, 5.0);
    }

    #[test]
    fn start_beyond_record_is_rejected() {
        let rec = record();
        let err = extract_pulse(&rec, &[0.5; 6], 6, 0, 10).unwrap_err();
        assert!(matches!(err, PulseError::StartOutOfRange { start: 6, len: 6 }));
    }

    #[test]
    fn trace_drops_repeated_timestamps() {
        let rec = CyclingRecord::new(
            0,
            vec![0.0, 1.0, 1.0, 2.0],
            vec![4.0, 3.9, 3.8, 3.7],
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        let pulse = extract_pulse(&rec, &[0.5; 4], 0, 0, 4).unwrap();
        let trace = pulse.trace();
        assert_eq!(trace.time, vec![0.0, 1.0, 2.0]);
        assert_eq!(trace.voltage, vec![4.0, 3.9, 3.7]);
        assert_eq!(trace.current, vec![1.0, 2.0, 4.0]);
        assert_eq!(trace.span_s(), 2.0);
    }
}
