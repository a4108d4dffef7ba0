//! JSON parameter documents.

use crate::types::LookupTableRow;
use ecm_core::units::raw;
use ecm_fit::{CellConstants, ExportedFit, FitStatus, FitWarning, Parameter, RcPairs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One pulse's parameter set, flat under the cell-model keys, with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseParameterDoc {
    pub battery_label: String,
    pub cycle: usize,
    pub pulse_number: usize,
    pub status: FitStatus,
    /// `None` when no finite cost was reached.
    pub cost: Option<f64>,
    #[serde(default)]
    pub warnings: Vec<FitWarning>,
    #[serde(flatten)]
    pub parameters: BTreeMap<String, f64>,
}

impl PulseParameterDoc {
    pub fn new(label: &str, cycle: usize, pulse_number: usize, fit: &ExportedFit) -> Self {
        let outcome = fit.outcome();
        Self {
            battery_label: label.to_string(),
            cycle,
            pulse_number,
            status: outcome.status,
            cost: outcome.cost.is_finite().then_some(outcome.cost),
            warnings: outcome.warnings.clone(),
            parameters: fit.parameter_set(),
        }
    }

    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        self.parameters.get(parameter.key()).copied()
    }
}

/// Every pulse of one cycle: shared cell constants plus per-pulse arrays.
///
/// Array entries are `null` for pulses whose fit produced no parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateParameters {
    pub battery_label: String,
    pub cycle: usize,
    pub rc_pairs: u8,
    pub common: BTreeMap<String, f64>,
    pub pulse_number: Vec<usize>,
    #[serde(rename = "Initial SoC")]
    pub initial_soc: Vec<f64>,
    #[serde(rename = "Open-circuit voltage [V]")]
    pub ocv: Vec<f64>,
    pub parameters: BTreeMap<String, Vec<Option<f64>>>,
}

impl AggregateParameters {
    /// Rows are expected in pulse order, as from a cycle snapshot.
    pub fn from_rows(
        label: &str,
        cycle: usize,
        rc_pairs: RcPairs,
        cell: &CellConstants,
        rows: &[LookupTableRow],
    ) -> Self {
        let mut common = BTreeMap::new();
        common.insert(
            "Cell capacity [A.h]".to_string(),
            raw::amp_hours_of(cell.capacity),
        );
        common.insert(
            "Nominal cell capacity [A.h]".to_string(),
            raw::amp_hours_of(cell.nominal_capacity),
        );
        common.insert(
            "Upper voltage cut-off [V]".to_string(),
            raw::volts_of(cell.upper_cutoff),
        );
        common.insert(
            "Lower voltage cut-off [V]".to_string(),
            raw::volts_of(cell.lower_cutoff),
        );
        common.insert(
            "Ambient temperature [K]".to_string(),
            raw::kelvin_of(cell.temperature),
        );

        let fitted: &[Parameter] = match rc_pairs {
            RcPairs::One => &[Parameter::R0, Parameter::R1, Parameter::C1],
            RcPairs::Two => &[
                Parameter::R0,
                Parameter::R1,
                Parameter::C1,
                Parameter::R2,
                Parameter::C2,
            ],
        };
        let parameters = fitted
            .iter()
            .map(|&p| {
                let values = rows.iter().map(|r| r.value(p)).collect();
                (p.key().to_string(), values)
            })
            .collect();

        Self {
            battery_label: label.to_string(),
            cycle,
            rc_pairs: u8::from(rc_pairs),
            common,
            pulse_number: rows.iter().map(|r| r.pulse_number).collect(),
            initial_soc: rows.iter().map(|r| r.soc).collect(),
            ocv: rows.iter().map(|r| r.voltage).collect(),
            parameters,
        }
    }

    pub fn len(&self) -> usize {
        self.pulse_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulse_number.is_empty()
    }

    pub fn series(&self, parameter: Parameter) -> Option<&[Option<f64>]> {
        self.parameters.get(parameter.key()).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::row;
    use ecm_fit::{FitOutcome, RcBranch, StopReason, TheveninParameters};

    fn outcome(status: FitStatus) -> FitOutcome {
        let parameters = status.has_parameters().then(|| TheveninParameters {
            r0: 0.011,
            branches: vec![RcBranch { r: 0.004, c: 650.0 }],
            initial_soc: 0.8,
            ocv: 3.95,
        });
        FitOutcome {
            rc_pairs: RcPairs::One,
            cell: CellConstants::default(),
            initial_soc: 0.8,
            ocv: 3.95,
            parameters,
            cost: if status.has_parameters() { 1.5e-4 } else { f64::INFINITY },
            iterations: 40,
            evaluations: 960,
            finite_evaluations: 900,
            stop: StopReason::Unchanged,
            status,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn pulse_doc_is_flat_json() {
        let doc = PulseParameterDoc::new("G1", 2, 5, &outcome(FitStatus::Succeeded).export());
        let json: serde_json::Value = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["battery_label"], "G1");
        assert_eq!(json["R0 [Ohm]"], 0.011);
        assert_eq!(json["C1 [F]"], 650.0);
        assert_eq!(json["Open-circuit voltage [V]"], 3.95);
        assert_eq!(json["status"], "succeeded");

        let back: PulseParameterDoc = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
        assert_eq!(back.value(Parameter::R1), Some(0.004));
    }

    #[test]
    fn failed_pulse_doc_has_no_fitted_keys() {
        let doc = PulseParameterDoc::new("G1", 0, 0, &outcome(FitStatus::TimedOut).export());
        assert_eq!(doc.cost, None);
        assert_eq!(doc.value(Parameter::R0), None);
        assert_eq!(doc.parameters["Initial SoC"], 0.8);
    }

    #[test]
    fn aggregate_lines_up_pulses() {
        let rows = vec![row("G1", 1, 0, Some(0.01)), row("G1", 1, 1, None)];
        let agg = AggregateParameters::from_rows(
            "G1",
            1,
            RcPairs::One,
            &CellConstants::default(),
            &rows,
        );
        assert_eq!(agg.len(), 2);
        assert_eq!(agg.series(Parameter::R0), Some(&[Some(0.01), None][..]));
        assert!(agg.series(Parameter::R2).is_none());
        assert_eq!(agg.common["Cell capacity [A.h]"], 4.85);
        let json = serde_json::to_string(&agg).unwrap();
        let back: AggregateParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, agg);
    }
}
