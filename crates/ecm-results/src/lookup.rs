//! SOC-indexed interpolation of fitted parameters.

use crate::types::LookupTableRow;
use crate::{ResultsError, ResultsResult};
use ecm_core::{Extrapolation, interp_linear};
use ecm_fit::Parameter;
use std::collections::BTreeMap;

/// Piecewise-linear parameter tables over SOC.
///
/// Only fitted rows take part. When several rows share an SOC the first
/// one wins. Queries outside the SOC range extend the end segments.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterLookup {
    soc: Vec<f64>,
    columns: BTreeMap<Parameter, Vec<f64>>,
}

impl ParameterLookup {
    pub fn from_rows(rows: &[LookupTableRow]) -> ResultsResult<Self> {
        let mut kept: Vec<&LookupTableRow> = Vec::new();
        for row in rows.iter().filter(|r| r.is_fitted() && r.soc.is_finite()) {
            if !kept.iter().any(|k| k.soc == row.soc) {
                kept.push(row);
            }
        }
        if kept.is_empty() {
            return Err(ResultsError::Lookup {
                what: "no fitted rows to interpolate".to_string(),
            });
        }
        kept.sort_by(|a, b| a.soc.total_cmp(&b.soc));

        let columns = [
            Parameter::R0,
            Parameter::R1,
            Parameter::C1,
            Parameter::R2,
            Parameter::C2,
        ]
        .into_iter()
        .filter_map(|p| {
            let values: Option<Vec<f64>> = kept.iter().map(|r| r.value(p)).collect();
            values.map(|v| (p, v))
        })
        .collect();

        Ok(Self {
            soc: kept.iter().map(|r| r.soc).collect(),
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.soc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.soc.is_empty()
    }

    pub fn soc(&self) -> &[f64] {
        &self.soc
    }

    pub fn soc_range(&self) -> (f64, f64) {
        (
            self.soc.first().copied().unwrap_or(f64::NAN),
            self.soc.last().copied().unwrap_or(f64::NAN),
        )
    }

    pub fn parameters(&self) -> impl Iterator<Item = Parameter> + '_ {
        self.columns.keys().copied()
    }

    pub fn value(&self, parameter: Parameter, soc: f64) -> ResultsResult<f64> {
        let ys = self.columns.get(&parameter).ok_or_else(|| ResultsError::Lookup {
            what: format!("{parameter} is not in the table"),
        })?;
        Ok(interp_linear(soc, &self.soc, ys, Extrapolation::Linear)?)
    }

    /// Every available parameter at `soc`.
    pub fn at(&self, soc: f64) -> ResultsResult<BTreeMap<Parameter, f64>> {
        self.parameters()
            .map(|p| self.value(p, soc).map(|v| (p, v)))
            .collect()
    }
}
