//! Outcome classification of a pulse fit.

use crate::model::{Bounds, Parameter, ParameterSpec};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    Succeeded,
    SucceededWithWarnings,
    Failed,
    TimedOut,
}

impl FitStatus {
    /// Whether fitted parameters are available.
    pub fn has_parameters(self) -> bool {
        matches!(self, FitStatus::Succeeded | FitStatus::SucceededWithWarnings)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FitStatus::Succeeded => "succeeded",
            FitStatus::SucceededWithWarnings => "succeeded_with_warnings",
            FitStatus::Failed => "failed",
            FitStatus::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for FitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal observation about a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FitWarning {
    BoundaryConvergence {
        parameter: Parameter,
        value: f64,
        bound: f64,
    },
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitWarning::BoundaryConvergence {
                parameter,
                value,
                bound,
            } => write!(f, "{parameter} converged to bound {bound} (value {value})"),
        }
    }
}

/// Relative distance to a bound below which a value counts as on it.
const BOUNDARY_TOLERANCE: f64 = 1e-6;

/// Warnings for every element of `x` sitting on one of its bounds.
pub fn boundary_warnings(specs: &[&ParameterSpec], x: &[f64]) -> Vec<FitWarning> {
    specs
        .iter()
        .zip(x)
        .filter_map(|(spec, &value)| {
            on_bound(&spec.bounds, value).map(|bound| FitWarning::BoundaryConvergence {
                parameter: spec.parameter,
                value,
                bound,
            })
        })
        .collect()
}

fn on_bound(bounds: &Bounds, value: f64) -> Option<f64> {
    let tol = BOUNDARY_TOLERANCE * bounds.width().abs().max(f64::MIN_POSITIVE);
    if (value - bounds.lower).abs() <= tol {
        Some(bounds.lower)
    } else if (value - bounds.upper).abs() <= tol {
        Some(bounds.upper)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelOrder, RcPairs};

    #[test]
    fn values_on_bounds_are_flagged() {
        let order = ModelOrder::with_defaults(RcPairs::One, 0.005);
        let specs = order.specs();
        let warnings = boundary_warnings(&specs, &[0.0, 0.004, 2000.0]);
        assert_eq!(warnings.len(), 2);
        assert_eq!(
            warnings[0],
            FitWarning::BoundaryConvergence {
                parameter: Parameter::R0,
                value: 0.0,
                bound: 0.0
            }
        );
        assert!(matches!(
            warnings[1],
            FitWarning::BoundaryConvergence { parameter: Parameter::C1, bound, .. } if bound == 2000.0
        ));
    }

    #[test]
    fn interior_values_are_quiet() {
        let order = ModelOrder::with_defaults(RcPairs::One, 0.005);
        assert!(boundary_warnings(&order.specs(), &[0.01, 0.01, 600.0]).is_empty());
    }

    #[test]
    fn only_successful_statuses_carry_parameters() {
        assert!(FitStatus::Succeeded.has_parameters());
        assert!(FitStatus::SucceededWithWarnings.has_parameters());
        assert!(!FitStatus::Failed.has_parameters());
        assert!(!FitStatus::TimedOut.has_parameters());
        assert_eq!(FitStatus::TimedOut.to_string(), "timed_out");
    }
}
