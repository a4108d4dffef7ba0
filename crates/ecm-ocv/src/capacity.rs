//! SOC extraction from capacity-test cycles.
//!
//! Each cycle contributes `(SOC, OCV)` pairs where
//! `SOC% = 100 - 100 * q / q_end` and `q_end` is the last valid capacity
//! sample of the cycle. Samples with a missing (NaN) capacity or voltage are
//! dropped pairwise.

use serde::{Deserialize, Serialize};

/// Capacity spans below this are treated as a flat (unusable) trace.
const MIN_CAPACITY_SPAN: f64 = 1e-12;

/// Why a capacity-test cycle did not contribute to the fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Every capacity sample is missing.
    AllMissing,
    /// Fewer than two paired samples survive NaN filtering.
    TooFewSamples,
    /// `q_end` is zero or non-finite.
    ZeroEndCapacity,
    /// Capacity never changes over the cycle.
    ConstantCapacity,
}

/// Concatenated `(SOC, OCV)` samples across all usable cycles.
///
/// SOC is stored as a fraction in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SocOcvSamples {
    pub soc: Vec<f64>,
    pub ocv: Vec<f64>,
    pub cycles_used: Vec<usize>,
    pub cycles_skipped: Vec<(usize, SkipReason)>,
}

impl SocOcvSamples {
    pub fn len(&self) -> usize {
        self.soc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.soc.is_empty()
    }

    /// `(min, max)` SOC of the data, or `None` when empty.
    pub fn soc_span(&self) -> Option<(f64, f64)> {
        if self.soc.is_empty() {
            return None;
        }
        let min = self.soc.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.soc.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((min, max))
    }
}

/// Extract `(SOC, OCV)` pairs from per-cycle voltage and capacity traces.
///
/// Only the first `min(voltage.len(), capacity.len())` cycles are considered.
/// Bad cycles are recorded in [`SocOcvSamples::cycles_skipped`]; this never
/// fails, an empty result is reported by the fitter.
pub fn extract_soc_ocv(voltage: &[Vec<f64>], capacity: &[Vec<f64>]) -> SocOcvSamples {
    let mut out = SocOcvSamples::default();
    let num_cycles = voltage.len().min(capacity.len());

    for cycle in 0..num_cycles {
        match cycle_soc_ocv(&voltage[cycle], &capacity[cycle]) {
            Ok((soc, ocv)) => {
                out.soc.extend(soc);
                out.ocv.extend(ocv);
                out.cycles_used.push(cycle);
            }
            Err(reason) => {
                tracing::debug!(cycle, ?reason, "skipping capacity-test cycle");
                out.cycles_skipped.push((cycle, reason));
            }
        }
    }

    out
}

fn cycle_soc_ocv(voltage: &[f64], capacity: &[f64]) -> Result<(Vec<f64>, Vec<f64>), SkipReason> {
    if capacity.iter().all(|q| q.is_nan()) {
        return Err(SkipReason::AllMissing);
    }

    let pairs: Vec<(f64, f64)> = capacity
        .iter()
        .zip(voltage)
        .filter(|(q, v)| q.is_finite() && v.is_finite())
        .map(|(&q, &v)| (q, v))
        .collect();
    if pairs.len() < 2 {
        return Err(SkipReason::TooFewSamples);
    }

    let q_end = pairs[pairs.len() - 1].0;
    if q_end == 0.0 || !q_end.is_finite() {
        return Err(SkipReason::ZeroEndCapacity);
    }

    let (q_min, q_max) = pairs
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(q, _)| {
            (lo.min(q), hi.max(q))
        });
    if q_max - q_min < MIN_CAPACITY_SPAN {
        return Err(SkipReason::ConstantCapacity);
    }

    let soc = pairs
        .iter()
        .map(|&(q, _)| (100.0 - 100.0 * (q / q_end)) / 100.0)
        .collect();
    let ocv = pairs.iter().map(|&(_, v)| v).collect();
    Ok((soc, ocv))
}
