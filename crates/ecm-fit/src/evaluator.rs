//! Model evaluation: predicted terminal voltage for a candidate network.

use crate::error::{EvalError, EvalResult};
use crate::params::{CellConstants, TheveninParameters};
use ecm_core::units::raw;
use ecm_ocv::OcvCurve;
use std::sync::Arc;

/// Time/current excitation of one pulse, positive current discharging.
#[derive(Debug, Clone, Copy)]
pub struct Excitation<'a> {
    pub time: &'a [f64],
    pub current: &'a [f64],
}

impl Excitation<'_> {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Transient circuit simulation behind a narrow interface.
///
/// Implementations must return one voltage per excitation sample, or
/// [`EvalError::SimulationDiverged`] when the candidate cannot be simulated.
pub trait ModelEvaluator: Send + Sync {
    fn simulate(
        &self,
        params: &TheveninParameters,
        excitation: Excitation<'_>,
    ) -> EvalResult<Vec<f64>>;
}

/// Discrete-time Thevenin network with exact exponential branch updates.
///
/// Each branch obeys `dv/dt = I/C - v/(RC)`; over a step of `dt` with held
/// current the exact solution is `v <- a v + I R (1 - a)`, `a = exp(-dt/RC)`.
/// Branches start relaxed. SOC is coulomb-counted from the initial SOC.
#[derive(Debug, Clone)]
pub struct TheveninEvaluator {
    cell: CellConstants,
    curve: Option<Arc<OcvCurve>>,
}

impl TheveninEvaluator {
    /// Evaluator using the constant OCV stored in each parameter set.
    pub fn new(cell: CellConstants) -> Self {
        Self { cell, curve: None }
    }

    /// Evaluator tracking OCV along the shared curve as SOC drifts.
    pub fn with_curve(cell: CellConstants, curve: Arc<OcvCurve>) -> Self {
        Self {
            cell,
            curve: Some(curve),
        }
    }

    fn ocv(&self, params: &TheveninParameters, soc: f64) -> EvalResult<f64> {
        match &self.curve {
            Some(curve) => curve.ocv_at(soc).map_err(|e| EvalError::SimulationDiverged {
                reason: format!("OCV lookup at SOC {soc}: {e}"),
            }),
            None => Ok(params.ocv),
        }
    }
}

impl ModelEvaluator for TheveninEvaluator {
    fn simulate(
        &self,
        params: &TheveninParameters,
        excitation: Excitation<'_>,
    ) -> EvalResult<Vec<f64>> {
        if excitation.time.len() != excitation.current.len() {
            return Err(EvalError::InvalidExcitation {
                what: format!(
                    "time has {} samples, current has {}",
                    excitation.time.len(),
                    excitation.current.len()
                ),
            });
        }
        let capacity_c = raw::coulombs_of(self.cell.capacity);
        let v_lower = raw::volts_of(self.cell.lower_cutoff);
        let v_upper = raw::volts_of(self.cell.upper_cutoff);

        let mut overpotential = vec![0.0; params.branches.len()];
        let mut soc = params.initial_soc;
        let mut out = Vec::with_capacity(excitation.len());
        let mut t_prev = excitation.time.first().copied().unwrap_or(0.0);

        for (k, (&t, &i)) in excitation.time.iter().zip(excitation.current).enumerate() {
            let dt = t - t_prev;
            t_prev = t;
            if k > 0 {
                for (v, b) in overpotential.iter_mut().zip(&params.branches) {
                    let tau = b.tau();
                    let a = if tau > 0.0 { (-dt / tau).exp() } else { 0.0 };
                    *v = a * *v + i * b.r * (1.0 - a);
                }
                soc -= i * dt / capacity_c;
            }

            let voltage = self.ocv(params, soc)? - i * params.r0 - overpotential.iter().sum::<f64>();
            if !voltage.is_finite() {
                return Err(EvalError::SimulationDiverged {
                    reason: format!("non-finite voltage at t = {t} s"),
                });
            }
            if voltage < v_lower || voltage > v_upper {
                return Err(EvalError::SimulationDiverged {
                    reason: format!(
                        "voltage {voltage} V left [{v_lower}, {v_upper}] V at t = {t} s"
                    ),
                });
            }
            out.push(voltage);
        }
        Ok(out)
    }
}
