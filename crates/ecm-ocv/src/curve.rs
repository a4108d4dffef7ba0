//! The resampled OCV(SOC) curve and SOC assignment.

use crate::error::{OcvError, OcvResult};
use crate::polyfit::Polynomial;
use ecm_core::{Extrapolation, interp_linear, linspace};
use serde::{Deserialize, Serialize};

/// What [`OcvCurve::soc_at`] does with voltages outside the table.
///
/// `Clamp` matches the historical behaviour: the SOC at the nearest table
/// boundary is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocExtrapolation {
    #[default]
    Clamp,
    Strict,
}

/// Sampled OCV(SOC) table, SOC as a fraction.
///
/// Two views of the same samples are kept: one sorted by SOC (for
/// OCV lookups) and one sorted by OCV (for SOC assignment). Sorting the
/// second view makes its abscissa monotonic by construction even when the
/// fitted polynomial wiggles.
#[derive(Debug, Clone, PartialEq)]
pub struct OcvCurve {
    soc: Vec<f64>,
    ocv: Vec<f64>,
    ocv_axis: Vec<f64>,
    soc_by_ocv: Vec<f64>,
    polynomial: Option<Polynomial>,
}

impl OcvCurve {
    /// Build from explicit `(SOC, OCV)` samples, in any order.
    pub fn from_table(soc: Vec<f64>, ocv: Vec<f64>) -> OcvResult<Self> {
        if soc.len() != ocv.len() {
            return Err(OcvError::InvalidTable {
                what: format!("SOC/OCV length mismatch: {} != {}", soc.len(), ocv.len()),
            });
        }
        if soc.len() < 2 {
            return Err(OcvError::InvalidTable {
                what: format!("need at least 2 samples, got {}", soc.len()),
            });
        }
        if let Some(bad) = soc.iter().chain(&ocv).find(|v| !v.is_finite()) {
            return Err(OcvError::InvalidTable {
                what: format!("non-finite sample {bad}"),
            });
        }

        let mut by_soc: Vec<(f64, f64)> = soc.into_iter().zip(ocv).collect();
        by_soc.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut by_ocv = by_soc.clone();
        by_ocv.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.total_cmp(&b.0)));

        Ok(Self {
            soc: by_soc.iter().map(|p| p.0).collect(),
            ocv: by_soc.iter().map(|p| p.1).collect(),
            ocv_axis: by_ocv.iter().map(|p| p.1).collect(),
            soc_by_ocv: by_ocv.iter().map(|p| p.0).collect(),
            polynomial: None,
        })
    }

    /// Resample a fitted polynomial on `resolution` evenly spaced SOC points.
    pub fn from_polynomial(
        polynomial: Polynomial,
        soc_min: f64,
        soc_max: f64,
        resolution: usize,
    ) -> OcvResult<Self> {
        let soc = linspace(soc_min, soc_max, resolution);
        let ocv = soc.iter().map(|&s| polynomial.eval(s)).collect();
        let mut curve = Self::from_table(soc, ocv)?;
        curve.polynomial = Some(polynomial);
        Ok(curve)
    }

    /// SOC samples, ascending.
    pub fn soc(&self) -> &[f64] {
        &self.soc
    }

    /// OCV samples aligned with [`Self::soc`].
    pub fn ocv(&self) -> &[f64] {
        &self.ocv
    }

    pub fn len(&self) -> usize {
        self.soc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.soc.is_empty()
    }

    pub fn polynomial(&self) -> Option<&Polynomial> {
        self.polynomial.as_ref()
    }

    /// OCV-sorted view used for SOC assignment: `(ocv ascending, soc)`.
    pub fn by_ocv(&self) -> (&[f64], &[f64]) {
        (&self.ocv_axis, &self.soc_by_ocv)
    }

    pub fn voltage_range(&self) -> (f64, f64) {
        (self.ocv_axis[0], self.ocv_axis[self.ocv_axis.len() - 1])
    }

    pub fn soc_range(&self) -> (f64, f64) {
        (self.soc[0], self.soc[self.soc.len() - 1])
    }

    /// OCV at `soc`, linear between samples and clamped at the ends.
    pub fn ocv_at(&self, soc: f64) -> OcvResult<f64> {
        Ok(interp_linear(soc, &self.soc, &self.ocv, Extrapolation::Clamp)?)
    }

    /// SOC for a measured voltage.
    pub fn soc_at(&self, voltage: f64, policy: SocExtrapolation) -> OcvResult<f64> {
        let (v_min, v_max) = self.voltage_range();
        if policy == SocExtrapolation::Strict && (voltage < v_min || voltage > v_max) {
            return Err(OcvError::VoltageOutOfRange {
                voltage,
                min: v_min,
                max: v_max,
            });
        }
        Ok(interp_linear(
            voltage,
            &self.ocv_axis,
            &self.soc_by_ocv,
            Extrapolation::Clamp,
        )?)
    }

    /// SOC for every sample of a voltage trace.
    pub fn soc_series(&self, voltage: &[f64], policy: SocExtrapolation) -> OcvResult<Vec<f64>> {
        voltage.iter().map(|&v| self.soc_at(v, policy)).collect()
    }
}
