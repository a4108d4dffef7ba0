//! Current-step pulse detection.
//!
//! A crossing is any index `k` with `|I[k+1] - I[k]| > threshold`. Crossings
//! are accepted greedily left to right; a crossing closer than
//! `min_distance` samples to the last accepted start is treated as part of
//! that pulse (its other edge, or noise on it).

use crate::error::{PulseError, PulseResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum |dI| between consecutive samples [A].
    pub current_threshold_a: f64,
    /// Minimum spacing between accepted pulse starts [samples].
    pub min_distance: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            current_threshold_a: 0.1,
            min_distance: 1000,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> PulseResult<()> {
        if !(self.current_threshold_a.is_finite() && self.current_threshold_a > 0.0) {
            return Err(PulseError::InvalidConfig {
                what: format!(
                    "current threshold must be positive, got {}",
                    self.current_threshold_a
                ),
            });
        }
        if self.min_distance == 0 {
            return Err(PulseError::InvalidConfig {
                what: "min_distance must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Start indices of the main pulses in `current`, strictly increasing.
///
/// An empty result is not an error here; see [`require_pulses`].
pub fn find_pulse_starts(current: &[f64], config: &DetectionConfig) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut last: Option<usize> = None;

    for (idx, w) in current.windows(2).enumerate() {
        if (w[1] - w[0]).abs() <= config.current_threshold_a {
            continue;
        }
        let far_enough = match last {
            None => true,
            Some(prev) => idx - prev >= config.min_distance,
        };
        if far_enough {
            starts.push(idx);
            last = Some(idx);
        }
    }

    starts
}

/// Fail with [`PulseError::NoPulsesDetected`] when `starts` is empty.
pub fn require_pulses(starts: &[usize], cycle: usize) -> PulseResult<&[usize]> {
    if starts.is_empty() {
        return Err(PulseError::NoPulsesDetected { cycle });
    }
    Ok(starts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_and_discharge_steps_yield_two_starts() {
        let mut current = vec![0.0, 0.0, 0.0, 5.0, 5.0, 5.0, 5.0];
        current.extend(vec![0.0; 10]);
        current.extend([-5.0, -5.0, -5.0, 0.0, 0.0]);
        let cfg = DetectionConfig {
            current_threshold_a: 0.1,
            min_distance: 5,
        };
        assert_eq!(find_pulse_starts(&current, &cfg), vec![2, 16]);
    }

    #[test]
    fn small_changes_are_ignored() {
        let current = vec![0.0, 0.05, 0.1, 0.15, 0.2];
        assert!(find_pulse_starts(&current, &DetectionConfig::default()).is_empty());
    }

    #[test]
    fn first_crossing_at_index_zero_is_accepted() {
        let current = vec![0.0, 3.0, 3.0];
        let cfg = DetectionConfig {
            current_threshold_a: 0.1,
            min_distance: 1000,
        };
        assert_eq!(find_pulse_starts(&current, &cfg), vec![0]);
    }

    #[test]
    fn empty_and_single_sample_series() {
        let cfg = DetectionConfig::default();
        assert!(find_pulse_starts(&[], &cfg).is_empty());
        assert!(find_pulse_starts(&[1.0], &cfg).is_empty());
    }

    #[test]
    fn require_pulses_reports_cycle() {
        let err = require_pulses(&[], 7).unwrap_err();
        assert!(matches!(err, PulseError::NoPulsesDetected { cycle: 7 }));
        assert_eq!(require_pulses(&[3], 0).unwrap(), &[3]);
    }

    #[test]
    fn config_validation() {
        assert!(DetectionConfig::default().validate().is_ok());
        let bad = DetectionConfig {
            current_threshold_a: 0.0,
            min_distance: 10,
        };
        assert!(bad.validate().is_err());
        let bad = DetectionConfig {
            current_threshold_a: 0.1,
            min_distance: 0,
        };
        assert!(bad.validate().is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn starts_are_increasing_and_spaced(
            current in prop::collection::vec(-6.0_f64..6.0, 0..400),
            min_distance in 1_usize..60,
            threshold in 0.05_f64..3.0,
        ) {
            let cfg = DetectionConfig { current_threshold_a: threshold, min_distance };
            let starts = find_pulse_starts(&current, &cfg);
            for w in starts.windows(2) {
                prop_assert!(w[0] < w[1]);
                prop_assert!(w[1] - w[0] >= min_distance);
            }
            for &s in &starts {
                prop_assert!(s + 1 < current.len());
                prop_assert!((current[s + 1] - current[s]).abs() > threshold);
            }
        }
    }
}
