//! Per-cycle pulse detection for one label.

use ecm_ocv::OcvCurve;
use ecm_project::{DataSource, PipelineConfig, TestKind};
use ecm_pulse::{CyclingRecord, HppcCycle, PulseError, PulseSummary};
use ecm_results::CycleFailureRecord;

use crate::error::AppResult;

/// Analysed cycles of one label plus the cycles that yielded nothing.
#[derive(Debug, Clone, Default)]
pub struct CycleAnalysis {
    pub cycles: Vec<HppcCycle>,
    pub skipped: Vec<CycleFailureRecord>,
}

impl CycleAnalysis {
    pub fn pulse_count(&self) -> usize {
        self.cycles.iter().map(HppcCycle::pulse_count).sum()
    }
}

/// Characteristics of every pulse in one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: usize,
    pub samples: usize,
    pub pulses: Vec<PulseSummary>,
}

/// Load the pulse-power test of `label` and detect pulses cycle by cycle.
///
/// A cycle that cannot be read or has no pulses is recorded in
/// [`CycleAnalysis::skipped`]; its siblings are still analysed. Failing to
/// load the test at all is an error for the whole label.
pub fn analyze_label(
    source: &dyn DataSource,
    label: &str,
    curve: &OcvCurve,
    config: &PipelineConfig,
) -> AppResult<CycleAnalysis> {
    let raw = source.load(TestKind::PulsePower, label)?;
    let available = raw.voltage.len().min(raw.current.len());
    let wanted: Vec<usize> = match &config.jobs.cycles {
        Some(cycles) => cycles.clone(),
        None => (0..available).collect(),
    };
    let pulse_config = config.pulse_config();

    let mut analysis = CycleAnalysis::default();
    for cycle in wanted {
        let skip = |reason: String| {
            tracing::warn!(label, cycle, %reason, "cycle skipped");
            CycleFailureRecord {
                battery_label: label.to_string(),
                cycle,
                reason,
            }
        };
        if cycle >= available {
            analysis
                .skipped
                .push(skip(format!("cycle not in dataset ({available} cycles)")));
            continue;
        }

        let analysed = CyclingRecord::from_raw(
            cycle,
            &raw.voltage[cycle],
            &raw.current[cycle],
            &config.record,
        )
        .and_then(|record| HppcCycle::analyze(record, curve, &pulse_config));
        match analysed {
            Ok(hppc) if hppc.pulse_count() == 0 => {
                analysis
                    .skipped
                    .push(skip(PulseError::NoPulsesDetected { cycle }.to_string()));
            }
            Ok(hppc) => {
                tracing::info!(label, cycle, pulses = hppc.pulse_count(), "pulses detected");
                analysis.cycles.push(hppc);
            }
            Err(e) => analysis.skipped.push(skip(e.to_string())),
        }
    }
    Ok(analysis)
}

pub fn pulse_report(analysis: &CycleAnalysis) -> AppResult<Vec<CycleReport>> {
    analysis
        .cycles
        .iter()
        .map(|hppc| -> AppResult<CycleReport> {
            let pulses = hppc.pulses()?;
            Ok(CycleReport {
                cycle: hppc.cycle(),
                samples: hppc.record().len(),
                pulses: pulses.iter().map(|p| *p.summary()).collect(),
            })
        })
        .collect()
}
