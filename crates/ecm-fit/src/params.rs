//! Circuit parameter sets and fixed cell constants.

use crate::error::{FitError, FitResult};
use crate::model::{ModelOrder, Parameter, RcPairs};
use ecm_core::units::{Charge, Temperature, Voltage, amp_hours, k, raw, volts};
use serde::{Deserialize, Serialize};

/// One resistor-capacitor branch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RcBranch {
    pub r: f64,
    pub c: f64,
}

impl RcBranch {
    /// Time constant `R * C` [s].
    pub fn tau(&self) -> f64 {
        self.r * self.c
    }
}

/// Fitted Thevenin network of one pulse, frozen once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheveninParameters {
    pub r0: f64,
    pub branches: Vec<RcBranch>,
    pub initial_soc: f64,
    pub ocv: f64,
}

impl TheveninParameters {
    /// Decode an optimizer vector laid out as `order` dictates.
    pub fn from_vector(
        order: &ModelOrder,
        x: &[f64],
        initial_soc: f64,
        ocv: f64,
    ) -> FitResult<Self> {
        if x.len() != order.dimension() {
            return Err(FitError::DimensionMismatch {
                expected: order.dimension(),
                got: x.len(),
            });
        }
        let branches = match order.rc_pairs() {
            RcPairs::One => vec![RcBranch { r: x[1], c: x[2] }],
            RcPairs::Two => vec![RcBranch { r: x[1], c: x[3] }, RcBranch { r: x[2], c: x[4] }],
        };
        Ok(Self {
            r0: x[0],
            branches,
            initial_soc,
            ocv,
        })
    }

    pub fn rc_pairs(&self) -> usize {
        self.branches.len()
    }

    /// Inverse of [`Self::from_vector`].
    pub fn to_vector(&self) -> Vec<f64> {
        let mut x = Vec::with_capacity(1 + 2 * self.branches.len());
        x.push(self.r0);
        x.extend(self.branches.iter().map(|b| b.r));
        x.extend(self.branches.iter().map(|b| b.c));
        x
    }

    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        let branch = |i: usize| self.branches.get(i);
        match parameter {
            Parameter::R0 => Some(self.r0),
            Parameter::R1 => branch(0).map(|b| b.r),
            Parameter::C1 => branch(0).map(|b| b.c),
            Parameter::R2 => branch(1).map(|b| b.r),
            Parameter::C2 => branch(1).map(|b| b.c),
        }
    }
}

/// Fixed cell constants shared by every pulse of a label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellConstants {
    pub capacity: Charge,
    pub nominal_capacity: Charge,
    pub upper_cutoff: Voltage,
    pub lower_cutoff: Voltage,
    pub temperature: Temperature,
}

impl Default for CellConstants {
    fn default() -> Self {
        Self {
            capacity: amp_hours(4.85),
            nominal_capacity: amp_hours(4.85),
            upper_cutoff: volts(4.2),
            lower_cutoff: volts(2.5),
            temperature: k(298.15),
        }
    }
}

impl CellConstants {
    pub fn validate(&self) -> FitResult<()> {
        let cap = raw::amp_hours_of(self.capacity);
        if !(cap.is_finite() && cap > 0.0) {
            return Err(FitError::InvalidCell {
                what: format!("capacity must be positive, got {cap} A.h"),
            });
        }
        let (lo, hi) = (
            raw::volts_of(self.lower_cutoff),
            raw::volts_of(self.upper_cutoff),
        );
        if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
            return Err(FitError::InvalidCell {
                what: format!("cutoffs must satisfy lower < upper, got {lo} V / {hi} V"),
            });
        }
        let t = raw::kelvin_of(self.temperature);
        if !(t.is_finite() && t > 0.0) {
            return Err(FitError::InvalidCell {
                what: format!("temperature must be positive, got {t} K"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_pair_vector_round_trips() {
        let order = ModelOrder::with_defaults(RcPairs::Two, 0.005);
        let x = [0.01, 0.02, 0.03, 400.0, 1500.0];
        let p = TheveninParameters::from_vector(&order, &x, 0.8, 3.9).unwrap();
        assert_eq!(p.branches[0], RcBranch { r: 0.02, c: 400.0 });
        assert_eq!(p.branches[1], RcBranch { r: 0.03, c: 1500.0 });
        assert_eq!(p.to_vector(), x.to_vec());
        assert_eq!(p.value(Parameter::C2), Some(1500.0));
    }

    #[test]
    fn one_pair_has_no_second_branch() {
        let order = ModelOrder::with_defaults(RcPairs::One, 0.005);
        let p = TheveninParameters::from_vector(&order, &[0.01, 0.02, 400.0], 0.5, 3.7).unwrap();
        assert_eq!(p.rc_pairs(), 1);
        assert_eq!(p.value(Parameter::R2), None);
        assert!(TheveninParameters::from_vector(&order, &[0.01, 0.02], 0.5, 3.7).is_err());
    }

    #[test]
    fn default_cell_is_valid() {
        assert!(CellConstants::default().validate().is_ok());
        let mut cell = CellConstants::default();
        cell.lower_cutoff = volts(4.3);
        assert!(cell.validate().is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn vector_layout_round_trips(
            two in any::<bool>(),
            x in prop::collection::vec(1e-6_f64..1e4, 5),
            soc in 0.0_f64..1.0,
        ) {
            let rc_pairs = if two { RcPairs::Two } else { RcPairs::One };
            let order = ModelOrder::with_defaults(rc_pairs, 0.005);
            let x = &x[..order.dimension()];
            let p = TheveninParameters::from_vector(&order, x, soc, 3.7).unwrap();
            prop_assert_eq!(p.rc_pairs(), rc_pairs.count());
            prop_assert_eq!(p.to_vector(), x.to_vec());
            prop_assert_eq!(p.value(Parameter::R0), Some(x[0]));
        }
    }
}
