//! Black-box bounded minimisation.

use crate::cancel::CancelToken;
use crate::error::FitResult;
use crate::model::ParameterSpec;
use serde::{Deserialize, Serialize};

/// Iteration caps for one optimisation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Budget {
    /// Hard cap on iterations (generations for population methods).
    pub max_iterations: usize,
    /// Stop after this many consecutive iterations without improvement.
    pub max_unchanged_iterations: usize,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_unchanged_iterations: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxIterations,
    Unchanged,
    Cancelled,
}

/// Best point found and how the search ended.
#[derive(Debug, Clone, PartialEq)]
pub struct Optimum {
    pub x: Vec<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub evaluations: usize,
    /// Evaluations that returned a finite cost.
    pub finite_evaluations: usize,
    pub stop: StopReason,
}

impl Optimum {
    pub fn is_finite(&self) -> bool {
        self.cost.is_finite()
    }
}

/// Scalar cost over a parameter vector; infinite for failed evaluations.
pub type Objective<'a> = dyn Fn(&[f64]) -> f64 + 'a;

/// Derivative-free minimiser over a bounded domain with priors.
///
/// Implementations stay within the bounds of `space`, respect `budget`,
/// and poll `cancel` at least once per iteration.
pub trait Optimizer: Send + Sync {
    fn minimize(
        &self,
        objective: &Objective<'_>,
        space: &[&ParameterSpec],
        budget: &Budget,
        cancel: &CancelToken,
    ) -> FitResult<Optimum>;
}
