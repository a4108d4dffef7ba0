//! Bounded particle swarm optimisation.

use crate::cancel::CancelToken;
use crate::error::{FitError, FitResult};
use crate::model::ParameterSpec;
use crate::optimizer::{Budget, Objective, Optimizer, Optimum, StopReason};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Improvements smaller than this do not reset the unchanged counter.
const IMPROVEMENT_THRESHOLD: f64 = 1e-11;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSwarm {
    pub swarm_size: usize,
    pub seed: u64,
    pub inertia: f64,
    pub cognitive: f64,
    pub social: f64,
}

impl Default for ParticleSwarm {
    fn default() -> Self {
        Self {
            swarm_size: 24,
            seed: 42,
            inertia: 0.7298,
            cognitive: 1.4962,
            social: 1.4962,
        }
    }
}

struct Particle {
    x: Vec<f64>,
    v: Vec<f64>,
    best_x: Vec<f64>,
    best_cost: f64,
}

fn normal(mean: f64, sigma: f64) -> FitResult<Normal<f64>> {
    Normal::new(mean, sigma).map_err(|e| FitError::InvalidProblem {
        what: format!("normal({mean}, {sigma}): {e}"),
    })
}

impl ParticleSwarm {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// First particle sits on the prior means; the rest are prior draws.
    fn initial_swarm(&self, space: &[&ParameterSpec], rng: &mut StdRng) -> FitResult<Vec<Particle>> {
        let priors = space
            .iter()
            .map(|s| normal(s.prior.mean, s.prior.sigma))
            .collect::<FitResult<Vec<_>>>()?;
        let spreads = space
            .iter()
            .map(|s| normal(0.0, s.sigma0))
            .collect::<FitResult<Vec<_>>>()?;

        let mut swarm = Vec::with_capacity(self.swarm_size);
        for n in 0..self.swarm_size {
            let x: Vec<f64> = space
                .iter()
                .zip(&priors)
                .map(|(s, prior)| {
                    let raw = if n == 0 { s.prior.mean } else { prior.sample(rng) };
                    s.bounds.clamp(raw)
                })
                .collect();
            let v = spreads.iter().map(|d| d.sample(rng)).collect();
            swarm.push(Particle {
                best_x: x.clone(),
                x,
                v,
                best_cost: f64::INFINITY,
            });
        }
        Ok(swarm)
    }

    fn step(&self, p: &mut Particle, global: &[f64], space: &[&ParameterSpec], rng: &mut StdRng) {
        for d in 0..p.x.len() {
            let r1: f64 = rng.r#gen();
            let r2: f64 = rng.r#gen();
            p.v[d] = self.inertia * p.v[d]
                + self.cognitive * r1 * (p.best_x[d] - p.x[d])
                + self.social * r2 * (global[d] - p.x[d]);
            let moved = p.x[d] + p.v[d];
            let clamped = space[d].bounds.clamp(moved);
            if clamped != moved {
                p.v[d] = 0.0;
            }
            p.x[d] = clamped;
        }
    }
}

impl Optimizer for ParticleSwarm {
    fn minimize(
        &self,
        objective: &Objective<'_>,
        space: &[&ParameterSpec],
        budget: &Budget,
        cancel: &CancelToken,
    ) -> FitResult<Optimum> {
        if space.is_empty() {
            return Err(FitError::InvalidProblem {
                what: "empty search space".to_string(),
            });
        }
        if self.swarm_size == 0 || budget.max_iterations == 0 {
            return Err(FitError::InvalidProblem {
                what: "swarm size and max_iterations must be at least 1".to_string(),
            });
        }
        for spec in space {
            spec.validate()?;
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut swarm = self.initial_swarm(space, &mut rng)?;
        let mut best_x = swarm[0].x.clone();
        let mut best_cost = f64::INFINITY;
        let mut evaluations = 0;
        let mut finite_evaluations = 0;
        let mut unchanged = 0;
        let mut iterations = 0;
        let mut stop = StopReason::MaxIterations;

        while iterations < budget.max_iterations {
            if cancel.is_cancelled() {
                stop = StopReason::Cancelled;
                break;
            }
            if iterations > 0 {
                for p in swarm.iter_mut() {
                    self.step(p, &best_x, space, &mut rng);
                }
            }
            iterations += 1;

            let previous = best_cost;
            for p in swarm.iter_mut() {
                let cost = objective(p.x.as_slice());
                evaluations += 1;
                if !cost.is_finite() {
                    continue;
                }
                finite_evaluations += 1;
                if cost < p.best_cost {
                    p.best_cost = cost;
                    p.best_x.clone_from(&p.x);
                }
                if cost < best_cost {
                    best_cost = cost;
                    best_x.clone_from(&p.x);
                }
            }

            // the unchanged counter only runs once something finite was found
            if best_cost.is_finite() {
                if !previous.is_finite() || previous - best_cost > IMPROVEMENT_THRESHOLD {
                    unchanged = 0;
                } else {
                    unchanged += 1;
                }
                if unchanged >= budget.max_unchanged_iterations {
                    stop = StopReason::Unchanged;
                    break;
                }
            }
        }

        tracing::debug!(
            iterations,
            evaluations,
            finite_evaluations,
            cost = best_cost,
            ?stop,
            "particle swarm finished"
        );

        Ok(Optimum {
            x: best_x,
            cost: best_cost,
            iterations,
            evaluations,
            finite_evaluations,
            stop,
        })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::model::{ModelOrder, RcPairs};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn optimum_stays_inside_bounds(
            seed in any::<u64>(),
            two in any::<bool>(),
            weights in prop::collection::vec(-1e3_f64..1e3, 5),
        ) {
            let rc_pairs = if two { RcPairs::Two } else { RcPairs::One };
            let order = ModelOrder::with_defaults(rc_pairs, 0.005);
            let specs = order.specs();
            let objective = |x: &[f64]| x.iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>();
            let budget = Budget {
                max_iterations: 15,
                max_unchanged_iterations: 15,
            };
            let swarm = ParticleSwarm {
                swarm_size: 6,
                ..ParticleSwarm::with_seed(seed)
            };
            let opt = swarm
                .minimize(&objective, &specs, &budget, &CancelToken::new())
                .unwrap();
            prop_assert_eq!(opt.x.len(), specs.len());
            for (spec, x) in specs.iter().zip(&opt.x) {
                prop_assert!(spec.bounds.contains(*x), "{x} outside {:?}", spec.bounds);
            }
        }
    }
}
