//! Model order and the free-parameter search space.
//!
//! The fitted vector layout is derived from [`ModelOrder`]:
//! `(R0, R1, C1)` for one RC pair, `(R0, R1, R2, C1, C2)` for two.

use crate::error::{FitError, FitResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of RC branches in the Thevenin network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RcPairs {
    One,
    Two,
}

impl RcPairs {
    pub fn count(self) -> usize {
        match self {
            RcPairs::One => 1,
            RcPairs::Two => 2,
        }
    }

    /// Length of the fitted parameter vector.
    pub fn dimension(self) -> usize {
        1 + 2 * self.count()
    }
}

impl TryFrom<u8> for RcPairs {
    type Error = FitError;

    fn try_from(rc_pairs: u8) -> Result<Self, Self::Error> {
        match rc_pairs {
            1 => Ok(RcPairs::One),
            2 => Ok(RcPairs::Two),
            _ => Err(FitError::UnsupportedModelOrder { rc_pairs }),
        }
    }
}

impl From<RcPairs> for u8 {
    fn from(value: RcPairs) -> Self {
        value.count() as u8
    }
}

/// A fitted circuit element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parameter {
    R0,
    R1,
    R2,
    C1,
    C2,
}

impl Parameter {
    pub fn short_name(self) -> &'static str {
        match self {
            Parameter::R0 => "R0",
            Parameter::R1 => "R1",
            Parameter::R2 => "R2",
            Parameter::C1 => "C1",
            Parameter::C2 => "C2",
        }
    }

    /// Key used in exported parameter sets.
    pub fn key(self) -> &'static str {
        match self {
            Parameter::R0 => "R0 [Ohm]",
            Parameter::R1 => "R1 [Ohm]",
            Parameter::R2 => "R2 [Ohm]",
            Parameter::C1 => "C1 [F]",
            Parameter::C2 => "C2 [F]",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Gaussian prior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prior {
    pub mean: f64,
    pub sigma: f64,
}

/// Closed interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.lower, self.upper)
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.lower && x <= self.upper
    }
}

/// Prior, hard bounds and initial search spread of one free parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub parameter: Parameter,
    pub prior: Prior,
    pub bounds: Bounds,
    pub sigma0: f64,
}

impl ParameterSpec {
    fn resistance(parameter: Parameter, r_guess: f64) -> Self {
        Self {
            parameter,
            prior: Prior {
                mean: r_guess,
                sigma: r_guess / 10.0,
            },
            bounds: Bounds {
                lower: 0.0,
                upper: 0.5,
            },
            sigma0: 1e-3,
        }
    }

    fn c1() -> Self {
        Self {
            parameter: Parameter::C1,
            prior: Prior {
                mean: 500.0,
                sigma: 100.0,
            },
            bounds: Bounds {
                lower: 1.0,
                upper: 2000.0,
            },
            sigma0: 50.0,
        }
    }

    fn c2() -> Self {
        Self {
            parameter: Parameter::C2,
            prior: Prior {
                mean: 2000.0,
                sigma: 500.0,
            },
            bounds: Bounds {
                lower: 0.0,
                upper: 2000.0,
            },
            sigma0: 500.0,
        }
    }

    pub fn validate(&self) -> FitResult<()> {
        let invalid = |what: String| FitError::InvalidPrior {
            parameter: self.parameter,
            what,
        };
        let Bounds { lower, upper } = self.bounds;
        if !(lower.is_finite() && upper.is_finite()) || lower > upper {
            return Err(invalid(format!("bounds [{lower}, {upper}] are not an interval")));
        }
        if !self.prior.mean.is_finite() || !self.prior.sigma.is_finite() || self.prior.sigma < 0.0
        {
            return Err(invalid(format!(
                "prior ({}, {}) must have finite mean and non-negative sigma",
                self.prior.mean, self.prior.sigma
            )));
        }
        if !(self.sigma0.is_finite() && self.sigma0 >= 0.0) {
            return Err(invalid(format!("sigma0 {} must be non-negative", self.sigma0)));
        }
        Ok(())
    }

    /// Apply a partial override; unspecified fields keep their value.
    pub fn with_override(mut self, o: &PriorOverride) -> Self {
        if let Some(mean) = o.mean {
            self.prior.mean = mean;
        }
        if let Some(sigma) = o.sigma {
            self.prior.sigma = sigma;
        }
        if let Some(lower) = o.lower {
            self.bounds.lower = lower;
        }
        if let Some(upper) = o.upper {
            self.bounds.upper = upper;
        }
        if let Some(sigma0) = o.sigma0 {
            self.sigma0 = sigma0;
        }
        self
    }
}

/// User override of a default parameter spec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriorOverride {
    pub mean: Option<f64>,
    pub sigma: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub sigma0: Option<f64>,
}

pub type PriorOverrides = BTreeMap<Parameter, PriorOverride>;

/// Free parameters of the chosen network, tagged by model order.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOrder {
    One {
        r0: ParameterSpec,
        r1: ParameterSpec,
        c1: ParameterSpec,
    },
    Two {
        r0: ParameterSpec,
        r1: ParameterSpec,
        r2: ParameterSpec,
        c1: ParameterSpec,
        c2: ParameterSpec,
    },
}

impl ModelOrder {
    /// Default priors with every resistance centred on `r_guess`.
    pub fn with_defaults(rc_pairs: RcPairs, r_guess: f64) -> Self {
        let r = |p| ParameterSpec::resistance(p, r_guess);
        match rc_pairs {
            RcPairs::One => ModelOrder::One {
                r0: r(Parameter::R0),
                r1: r(Parameter::R1),
                c1: ParameterSpec::c1(),
            },
            RcPairs::Two => ModelOrder::Two {
                r0: r(Parameter::R0),
                r1: r(Parameter::R1),
                r2: r(Parameter::R2),
                c1: ParameterSpec::c1(),
                c2: ParameterSpec::c2(),
            },
        }
    }

    /// Apply overrides. Overrides for parameters this order lacks are rejected.
    pub fn with_overrides(self, overrides: &PriorOverrides) -> FitResult<Self> {
        let rc_pairs = self.rc_pairs();
        let mut specs: Vec<ParameterSpec> = self.specs().into_iter().copied().collect();
        for (parameter, o) in overrides {
            let Some(spec) = specs.iter_mut().find(|s| s.parameter == *parameter) else {
                return Err(FitError::InvalidPrior {
                    parameter: *parameter,
                    what: format!("not a free parameter of a {}-RC model", rc_pairs.count()),
                });
            };
            *spec = spec.with_override(o);
        }
        Self::from_specs(rc_pairs, &specs)
    }

    fn from_specs(rc_pairs: RcPairs, specs: &[ParameterSpec]) -> FitResult<Self> {
        match (rc_pairs, specs) {
            (RcPairs::One, &[r0, r1, c1]) => Ok(ModelOrder::One { r0, r1, c1 }),
            (RcPairs::Two, &[r0, r1, r2, c1, c2]) => Ok(ModelOrder::Two { r0, r1, r2, c1, c2 }),
            _ => Err(FitError::DimensionMismatch {
                expected: rc_pairs.dimension(),
                got: specs.len(),
            }),
        }
    }

    pub fn rc_pairs(&self) -> RcPairs {
        match self {
            ModelOrder::One { .. } => RcPairs::One,
            ModelOrder::Two { .. } => RcPairs::Two,
        }
    }

    pub fn dimension(&self) -> usize {
        self.rc_pairs().dimension()
    }

    /// Specs in vector order.
    pub fn specs(&self) -> Vec<&ParameterSpec> {
        match self {
            ModelOrder::One { r0, r1, c1 } => vec![r0, r1, c1],
            ModelOrder::Two { r0, r1, r2, c1, c2 } => vec![r0, r1, r2, c1, c2],
        }
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        self.specs().iter().map(|s| s.parameter).collect()
    }

    pub fn validate(&self) -> FitResult<()> {
        self.specs().into_iter().try_for_each(ParameterSpec::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rc_pair_count_is_checked() {
        assert_eq!(RcPairs::try_from(1).unwrap(), RcPairs::One);
        assert_eq!(RcPairs::try_from(2).unwrap(), RcPairs::Two);
        for n in [0_u8, 3, 7] {
            assert!(matches!(
                RcPairs::try_from(n),
                Err(FitError::UnsupportedModelOrder { rc_pairs }) if rc_pairs == n
            ));
        }
    }

    #[test]
    fn vector_layout_follows_order() {
        let one = ModelOrder::with_defaults(RcPairs::One, 0.005);
        assert_eq!(one.parameters(), vec![Parameter::R0, Parameter::R1, Parameter::C1]);
        let two = ModelOrder::with_defaults(RcPairs::Two, 0.005);
        assert_eq!(
            two.parameters(),
            vec![
                Parameter::R0,
                Parameter::R1,
                Parameter::R2,
                Parameter::C1,
                Parameter::C2
            ]
        );
        assert_eq!(two.dimension(), 5);
        assert!(two.validate().is_ok());
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let mut overrides = PriorOverrides::new();
        overrides.insert(
            Parameter::C1,
            PriorOverride {
                upper: Some(5000.0),
                ..Default::default()
            },
        );
        let model = ModelOrder::with_defaults(RcPairs::One, 0.005)
            .with_overrides(&overrides)
            .unwrap();
        let c1 = model.specs()[2];
        assert_eq!(c1.bounds.upper, 5000.0);
        assert_eq!(c1.bounds.lower, 1.0);
        assert_eq!(c1.prior.mean, 500.0);
    }

    #[test]
    fn override_of_absent_parameter_is_rejected() {
        let mut overrides = PriorOverrides::new();
        overrides.insert(Parameter::C2, PriorOverride::default());
        let err = ModelOrder::with_defaults(RcPairs::One, 0.005)
            .with_overrides(&overrides)
            .unwrap_err();
        assert!(matches!(err, FitError::InvalidPrior { parameter: Parameter::C2, .. }));
    }

    #[test]
    fn inverted_bounds_fail_validation() {
        let mut overrides = PriorOverrides::new();
        overrides.insert(
            Parameter::R0,
            PriorOverride {
                lower: Some(1.0),
                upper: Some(0.1),
                ..Default::default()
            },
        );
        let model = ModelOrder::with_defaults(RcPairs::Two, 0.005)
            .with_overrides(&overrides)
            .unwrap();
        assert!(model.validate().is_err());
    }
}
