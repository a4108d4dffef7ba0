//! Read-only access to stored batch results.

use ecm_fit::Parameter;
use ecm_results::{LookupTableRow, ParameterLookup, ResultStore, RunManifest};
use std::collections::BTreeMap;

use crate::error::AppResult;

/// The label-wide lookup table, or no rows when none was saved yet.
pub fn load_label_table(store: &ResultStore, label: &str) -> AppResult<Vec<LookupTableRow>> {
    let path = store.label_table_path(label)?;
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(store.load_table(&path)?)
}

pub fn load_run(store: &ResultStore, run_id: &str) -> AppResult<RunManifest> {
    Ok(store.load_manifest(run_id)?)
}

/// Stored runs, newest first.
pub fn list_runs(store: &ResultStore) -> AppResult<Vec<RunManifest>> {
    Ok(store.list_runs()?)
}

/// Fitted parameters of `label` at `soc`, interpolated across its pulses.
///
/// `cycle` restricts the table to one cycle.
pub fn interpolate_parameters(
    store: &ResultStore,
    label: &str,
    cycle: Option<usize>,
    soc: f64,
) -> AppResult<BTreeMap<Parameter, f64>> {
    let mut rows = load_label_table(store, label)?;
    if let Some(cycle) = cycle {
        rows.retain(|r| r.cycle == cycle);
    }
    let lookup = ParameterLookup::from_rows(&rows)?;
    Ok(lookup.at(soc)?)
}
