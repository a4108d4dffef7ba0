//! Capacity test -> fitted OCV curve.

use crate::capacity::{SocOcvSamples, extract_soc_ocv};
use crate::curve::OcvCurve;
use crate::error::{OcvError, OcvResult};
use crate::polyfit::fit_polynomial;
use serde::{Deserialize, Serialize};

/// Polynomial degree and resampling resolution for the OCV fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcvFitConfig {
    pub degree: usize,
    pub resolution: usize,
}

impl Default for OcvFitConfig {
    fn default() -> Self {
        Self {
            degree: 11,
            resolution: 100,
        }
    }
}

/// Fitted curve plus the data it was fitted on.
#[derive(Debug, Clone)]
pub struct OcvFit {
    pub curve: OcvCurve,
    pub samples: SocOcvSamples,
    /// Root-mean-square residual of the polynomial on the raw samples [V].
    pub rms_residual: f64,
}

/// Fit the OCV(SOC) curve for one cell from its capacity-test cycles.
pub fn fit_ocv_curve(
    voltage: &[Vec<f64>],
    capacity: &[Vec<f64>],
    config: &OcvFitConfig,
) -> OcvResult<OcvFit> {
    if config.resolution < 2 {
        return Err(OcvError::InvalidTable {
            what: format!("resolution must be >= 2, got {}", config.resolution),
        });
    }

    let samples = extract_soc_ocv(voltage, capacity);
    let Some((soc_min, soc_max)) = samples.soc_span() else {
        return Err(OcvError::DataUnavailable {
            what: format!(
                "none of {} capacity-test cycles produced valid samples",
                voltage.len().min(capacity.len())
            ),
        });
    };

    let polynomial = fit_polynomial(&samples.soc, &samples.ocv, config.degree)?;

    let sse: f64 = samples
        .soc
        .iter()
        .zip(&samples.ocv)
        .map(|(&s, &v)| (polynomial.eval(s) - v).powi(2))
        .sum();
    let rms_residual = (sse / samples.len() as f64).sqrt();

    tracing::info!(
        degree = config.degree,
        cycles_used = samples.cycles_used.len(),
        cycles_skipped = samples.cycles_skipped.len(),
        samples = samples.len(),
        rms_residual,
        "fitted SOC-OCV polynomial"
    );

    let curve = OcvCurve::from_polynomial(polynomial, soc_min, soc_max, config.resolution)?;
    Ok(OcvFit {
        curve,
        samples,
        rms_residual,
    })
}
