//! Staged fit pipeline.
//!
//! Each stage is its own type and consumes or borrows the previous one, so
//! calls cannot happen out of order:
//!
//! ```text
//! FitBuilder --build_model--> FitModel --problem--> FitProblem
//!     --optimize--> FitOutcome --export--> ExportedFit
//! ```
//!
//! A [`FitModel`] is cheap to clone and is shared by every pulse of a label.

use crate::cancel::CancelToken;
use crate::cost::sum_squared_error;
use crate::error::{FitError, FitResult};
use crate::evaluator::{Excitation, ModelEvaluator};
use crate::model::{ModelOrder, Parameter, PriorOverrides, RcPairs};
use crate::optimizer::{Budget, Optimizer, StopReason};
use crate::params::{CellConstants, TheveninParameters};
use crate::status::{FitStatus, FitWarning, boundary_warnings};
use ecm_core::units::raw;
use std::collections::BTreeMap;

/// Configured: model order, priors, cell constants and budget.
#[derive(Debug, Clone)]
pub struct FitBuilder {
    rc_pairs: RcPairs,
    r_guess: f64,
    overrides: PriorOverrides,
    cell: CellConstants,
    budget: Budget,
}

impl FitBuilder {
    /// Start from a raw RC-pair count; anything but 1 or 2 is rejected.
    pub fn new(rc_pairs: u8) -> FitResult<Self> {
        Ok(Self::with_order(RcPairs::try_from(rc_pairs)?))
    }

    pub fn with_order(rc_pairs: RcPairs) -> Self {
        Self {
            rc_pairs,
            r_guess: 0.005,
            overrides: PriorOverrides::new(),
            cell: CellConstants::default(),
            budget: Budget::default(),
        }
    }

    pub fn r_guess(mut self, r_guess: f64) -> Self {
        self.r_guess = r_guess;
        self
    }

    pub fn overrides(mut self, overrides: PriorOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn cell(mut self, cell: CellConstants) -> Self {
        self.cell = cell;
        self
    }

    pub fn budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn build_model(self) -> FitResult<FitModel> {
        if !(self.r_guess.is_finite() && self.r_guess > 0.0) {
            return Err(FitError::InvalidPrior {
                parameter: Parameter::R0,
                what: format!("resistance guess must be positive, got {}", self.r_guess),
            });
        }
        self.cell.validate()?;
        let order =
            ModelOrder::with_defaults(self.rc_pairs, self.r_guess).with_overrides(&self.overrides)?;
        order.validate()?;
        Ok(FitModel {
            order,
            cell: self.cell,
            budget: self.budget,
        })
    }
}

/// ModelBuilt: validated search space plus fixed base parameters.
#[derive(Debug, Clone)]
pub struct FitModel {
    order: ModelOrder,
    cell: CellConstants,
    budget: Budget,
}

impl FitModel {
    pub fn order(&self) -> &ModelOrder {
        &self.order
    }

    pub fn cell(&self) -> &CellConstants {
        &self.cell
    }

    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    /// Bind one pulse's measurement.
    ///
    /// `ocv` is the open-circuit voltage at `initial_soc`. Time must be
    /// strictly increasing.
    pub fn problem(
        &self,
        measurement: Measurement,
        initial_soc: f64,
        ocv: f64,
    ) -> FitResult<FitProblem> {
        measurement.validate()?;
        if !initial_soc.is_finite() || !ocv.is_finite() {
            return Err(FitError::InvalidProblem {
                what: format!("initial SOC {initial_soc} and OCV {ocv} must be finite"),
            });
        }
        Ok(FitProblem {
            model: self.clone(),
            measurement,
            initial_soc,
            ocv,
        })
    }
}

/// Measured excitation and response of one pulse.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub time: Vec<f64>,
    pub current: Vec<f64>,
    pub voltage: Vec<f64>,
}

impl Measurement {
    fn validate(&self) -> FitResult<()> {
        let n = self.time.len();
        if self.current.len() != n || self.voltage.len() != n {
            return Err(FitError::InvalidProblem {
                what: format!(
                    "series lengths differ: time={n}, current={}, voltage={}",
                    self.current.len(),
                    self.voltage.len()
                ),
            });
        }
        if n < 2 {
            return Err(FitError::InvalidProblem {
                what: format!("need at least 2 samples, got {n}"),
            });
        }
        if self.time.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(FitError::InvalidProblem {
                what: "time must be strictly increasing".to_string(),
            });
        }
        let all_finite = self
            .time
            .iter()
            .chain(&self.current)
            .chain(&self.voltage)
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(FitError::InvalidProblem {
                what: "non-finite sample".to_string(),
            });
        }
        Ok(())
    }
}

/// ProblemReady: a model bound to one pulse.
#[derive(Debug, Clone)]
pub struct FitProblem {
    model: FitModel,
    measurement: Measurement,
    initial_soc: f64,
    ocv: f64,
}

impl FitProblem {
    pub fn model(&self) -> &FitModel {
        &self.model
    }

    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    pub fn initial_soc(&self) -> f64 {
        self.initial_soc
    }

    pub fn ocv(&self) -> f64 {
        self.ocv
    }

    /// SSE of the candidate `x`; any evaluator failure scores infinity.
    pub fn cost(&self, evaluator: &dyn ModelEvaluator, x: &[f64]) -> f64 {
        let Ok(params) =
            TheveninParameters::from_vector(&self.model.order, x, self.initial_soc, self.ocv)
        else {
            return f64::INFINITY;
        };
        let excitation = Excitation {
            time: &self.measurement.time,
            current: &self.measurement.current,
        };
        match evaluator.simulate(&params, excitation) {
            Ok(predicted) => sum_squared_error(&predicted, &self.measurement.voltage),
            Err(e) => {
                tracing::trace!(error = %e, "trial scored as infinite cost");
                f64::INFINITY
            }
        }
    }

    pub fn optimize(
        self,
        evaluator: &dyn ModelEvaluator,
        optimizer: &dyn Optimizer,
        cancel: &CancelToken,
    ) -> FitResult<FitOutcome> {
        let specs = self.model.order.specs();
        let objective = |x: &[f64]| self.cost(evaluator, x);
        let optimum = optimizer.minimize(&objective, &specs, &self.model.budget, cancel)?;

        let timed_out = optimum.stop == StopReason::Cancelled && cancel.deadline_passed();
        let (status, parameters, warnings) = if timed_out {
            (FitStatus::TimedOut, None, Vec::new())
        } else if optimum.stop == StopReason::Cancelled || !optimum.is_finite() {
            (FitStatus::Failed, None, Vec::new())
        } else {
            let params = TheveninParameters::from_vector(
                &self.model.order,
                &optimum.x,
                self.initial_soc,
                self.ocv,
            )?;
            let warnings = boundary_warnings(&specs, &optimum.x);
            let status = if warnings.is_empty() {
                FitStatus::Succeeded
            } else {
                FitStatus::SucceededWithWarnings
            };
            (status, Some(params), warnings)
        };

        for w in &warnings {
            tracing::warn!(warning = %w, "low-confidence fit");
        }
        tracing::debug!(
            %status,
            cost = optimum.cost,
            iterations = optimum.iterations,
            evaluations = optimum.evaluations,
            "fit finished"
        );

        Ok(FitOutcome {
            rc_pairs: self.model.order.rc_pairs(),
            cell: self.model.cell,
            initial_soc: self.initial_soc,
            ocv: self.ocv,
            parameters,
            cost: optimum.cost,
            iterations: optimum.iterations,
            evaluations: optimum.evaluations,
            finite_evaluations: optimum.finite_evaluations,
            stop: optimum.stop,
            status,
            warnings,
        })
    }
}

/// Optimized: best parameters, cost and convergence status of one pulse.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    pub rc_pairs: RcPairs,
    pub cell: CellConstants,
    pub initial_soc: f64,
    pub ocv: f64,
    /// `None` unless the status carries parameters.
    pub parameters: Option<TheveninParameters>,
    pub cost: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub finite_evaluations: usize,
    pub stop: StopReason,
    pub status: FitStatus,
    pub warnings: Vec<FitWarning>,
}

impl FitOutcome {
    /// Placeholder for a pulse whose fit never produced an outcome.
    pub fn failed(
        rc_pairs: RcPairs,
        cell: CellConstants,
        initial_soc: f64,
        ocv: f64,
        status: FitStatus,
    ) -> Self {
        Self {
            rc_pairs,
            cell,
            initial_soc,
            ocv,
            parameters: None,
            cost: f64::INFINITY,
            iterations: 0,
            evaluations: 0,
            finite_evaluations: 0,
            stop: StopReason::Cancelled,
            status,
            warnings: Vec::new(),
        }
    }

    /// Fitted vector in model order, when available.
    pub fn vector(&self) -> Option<Vec<f64>> {
        self.parameters.as_ref().map(TheveninParameters::to_vector)
    }

    pub fn export(self) -> ExportedFit {
        ExportedFit { outcome: self }
    }
}

/// Exported: frozen outcome with the flat parameter set for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFit {
    outcome: FitOutcome,
}

impl ExportedFit {
    pub fn outcome(&self) -> &FitOutcome {
        &self.outcome
    }

    pub fn status(&self) -> FitStatus {
        self.outcome.status
    }

    /// Base cell parameters merged with the fitted elements.
    ///
    /// Fitted keys are absent when the fit failed.
    pub fn parameter_set(&self) -> BTreeMap<String, f64> {
        let o = &self.outcome;
        let mut set = BTreeMap::new();
        let mut put = |k: &str, v: f64| {
            set.insert(k.to_string(), v);
        };
        put("Initial SoC", o.initial_soc);
        put("Cell capacity [A.h]", raw::amp_hours_of(o.cell.capacity));
        put(
            "Nominal cell capacity [A.h]",
            raw::amp_hours_of(o.cell.nominal_capacity),
        );
        put("Upper voltage cut-off [V]", raw::volts_of(o.cell.upper_cutoff));
        put("Lower voltage cut-off [V]", raw::volts_of(o.cell.lower_cutoff));
        put("Ambient temperature [K]", raw::kelvin_of(o.cell.temperature));
        put("Open-circuit voltage [V]", o.ocv);
        for n in 1..=o.rc_pairs.count() {
            put(&format!("Element-{n} initial overpotential [V]"), 0.0);
        }
        if let Some(p) = &o.parameters {
            for parameter in [
                Parameter::R0,
                Parameter::R1,
                Parameter::C1,
                Parameter::R2,
                Parameter::C2,
            ] {
                if let Some(v) = p.value(parameter) {
                    put(parameter.key(), v);
                }
            }
        }
        set
    }
}
