//! On-disk result layout.
//!
//! ```text
//! <root>/<label>/battery_<label>_soc_ocv_fitted.csv
//! <root>/<label>/battery_<label>_soc_ocv_fitted.key
//! <root>/<label>/lookup_table.csv
//! <root>/<label>/cycle_<c>/lookup_table.csv
//! <root>/<label>/cycle_<c>/final_ecm_parameters.json
//! <root>/<label>/cycle_<c>/pulse_<p>_parameters.json
//! <root>/<label>/cycle_<c>/pulse_<p>_hppc.csv
//! <root>/runs/<run_id>/manifest.json
//! <root>/runs/<run_id>/lookup_table.csv
//! ```
//!
//! The label tables accumulate across runs; each run also keeps its own
//! rows next to its manifest.

use crate::csv::{check_label, parse_csv_str, table_order, to_csv_string};
use crate::export::{AggregateParameters, PulseParameterDoc};
use crate::types::{LookupTableRow, RunManifest};
use crate::{ResultsError, ResultsResult};
use ecm_fit::RcPairs;
use ecm_ocv::OcvCurve;
use ecm_ocv::io::{curve_file_name, load_csv, save_csv};
use std::fs;
use std::path::{Path, PathBuf};

const LOOKUP_TABLE: &str = "lookup_table.csv";
const AGGREGATE: &str = "final_ecm_parameters.json";
const RUNS_DIR: &str = "runs";
const MANIFEST: &str = "manifest.json";

/// Aligned columns of one pulse window.
#[derive(Debug, Clone, Copy)]
pub struct TraceColumns<'a> {
    pub time: &'a [f64],
    pub current: &'a [f64],
    pub voltage: &'a [f64],
    pub soc: &'a [f64],
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    root_dir: PathBuf,
}

impl ResultStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    pub fn label_dir(&self, label: &str) -> ResultsResult<PathBuf> {
        check_label(label)?;
        if label.contains(['/', '\\']) || label == "." || label == ".." || label == RUNS_DIR {
            return Err(ResultsError::InvalidLabel {
                label: label.to_string(),
                reason: "label cannot be used as a directory name".to_string(),
            });
        }
        Ok(self.root_dir.join(label))
    }

    pub fn cycle_dir(&self, label: &str, cycle: usize) -> ResultsResult<PathBuf> {
        Ok(self.label_dir(label)?.join(format!("cycle_{cycle}")))
    }

    pub fn ocv_curve_path(&self, label: &str) -> ResultsResult<PathBuf> {
        Ok(self.label_dir(label)?.join(curve_file_name(label)))
    }

    fn ocv_key_path(&self, label: &str) -> ResultsResult<PathBuf> {
        Ok(self.ocv_curve_path(label)?.with_extension("key"))
    }

    /// Save a curve along with the key it was fitted for.
    pub fn save_ocv_curve(
        &self,
        label: &str,
        curve: &OcvCurve,
        key: &str,
    ) -> ResultsResult<PathBuf> {
        let path = self.ocv_curve_path(label)?;
        save_csv(&path, curve)?;
        write_file(&self.ocv_key_path(label)?, key.as_bytes())?;
        Ok(path)
    }

    /// The persisted curve for `label`, if one was saved under `key`.
    pub fn load_ocv_curve(&self, label: &str, key: &str) -> ResultsResult<Option<OcvCurve>> {
        let path = self.ocv_curve_path(label)?;
        let key_path = self.ocv_key_path(label)?;
        if !path.exists() || !key_path.exists() {
            return Ok(None);
        }
        let stored = fs::read_to_string(&key_path)?;
        if stored.trim() != key {
            tracing::debug!(label, "saved OCV curve was fitted from other data or settings");
            return Ok(None);
        }
        Ok(Some(load_csv(&path)?))
    }

    pub fn label_table_path(&self, label: &str) -> ResultsResult<PathBuf> {
        Ok(self.label_dir(label)?.join(LOOKUP_TABLE))
    }

    pub fn cycle_table_path(&self, label: &str, cycle: usize) -> ResultsResult<PathBuf> {
        Ok(self.cycle_dir(label, cycle)?.join(LOOKUP_TABLE))
    }

    pub fn pulse_doc_path(
        &self,
        label: &str,
        cycle: usize,
        pulse: usize,
    ) -> ResultsResult<PathBuf> {
        Ok(self
            .cycle_dir(label, cycle)?
            .join(format!("pulse_{pulse}_parameters.json")))
    }

    /// Rows must already be sorted; they are written as given.
    pub fn save_table(
        &self,
        path: &Path,
        rows: &[LookupTableRow],
        rc_pairs: RcPairs,
    ) -> ResultsResult<()> {
        let csv = to_csv_string(rows, rc_pairs)?;
        write_file(path, csv.as_bytes())?;
        tracing::debug!(path = %path.display(), rows = rows.len(), "lookup table written");
        Ok(())
    }

    pub fn load_table(&self, path: &Path) -> ResultsResult<Vec<LookupTableRow>> {
        let content = fs::read_to_string(path)?;
        parse_csv_str(&content)
    }

    /// Model order of the table at `path`, or `None` when there is none.
    pub fn table_order(&self, path: &Path) -> ResultsResult<Option<RcPairs>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(table_order(&content)?))
    }

    /// Fails when the table at `path` was written for another model order.
    pub fn ensure_table_order(&self, path: &Path, expected: RcPairs) -> ResultsResult<()> {
        match self.table_order(path)? {
            Some(found) if found != expected => Err(ResultsError::ModelOrderMismatch {
                path: path.display().to_string(),
                found: u8::from(found),
                expected: u8::from(expected),
            }),
            _ => Ok(()),
        }
    }

    pub fn save_pulse_doc(&self, doc: &PulseParameterDoc) -> ResultsResult<()> {
        let path = self.pulse_doc_path(&doc.battery_label, doc.cycle, doc.pulse_number)?;
        write_file(&path, serde_json::to_string_pretty(doc)?.as_bytes())
    }

    pub fn load_pulse_doc(
        &self,
        label: &str,
        cycle: usize,
        pulse: usize,
    ) -> ResultsResult<PulseParameterDoc> {
        let content = fs::read_to_string(self.pulse_doc_path(label, cycle, pulse)?)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_aggregate(&self, aggregate: &AggregateParameters) -> ResultsResult<()> {
        let path = self
            .cycle_dir(&aggregate.battery_label, aggregate.cycle)?
            .join(AGGREGATE);
        write_file(&path, serde_json::to_string_pretty(aggregate)?.as_bytes())
    }

    pub fn load_aggregate(&self, label: &str, cycle: usize) -> ResultsResult<AggregateParameters> {
        let content = fs::read_to_string(self.cycle_dir(label, cycle)?.join(AGGREGATE))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Per-pulse window as `Time,Current,Voltage,SoC`.
    pub fn save_pulse_trace(
        &self,
        label: &str,
        cycle: usize,
        pulse: usize,
        trace: TraceColumns<'_>,
    ) -> ResultsResult<PathBuf> {
        let path = self
            .cycle_dir(label, cycle)?
            .join(format!("pulse_{pulse}_hppc.csv"));
        let mut csv = String::from("Time,Current,Voltage,SoC\n");
        let rows = trace
            .time
            .iter()
            .zip(trace.current)
            .zip(trace.voltage)
            .zip(trace.soc);
        for (((t, i), v), s) in rows {
            csv.push_str(&format!("{t},{i},{v},{s}\n"));
        }
        write_file(&path, csv.as_bytes())?;
        Ok(path)
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root_dir.join(RUNS_DIR).join(run_id)
    }

    /// A completed run is stored under `run_id`. Partial runs do not count.
    pub fn has_run(&self, run_id: &str) -> bool {
        if !self.run_dir(run_id).join(MANIFEST).exists() {
            return false;
        }
        self.load_manifest(run_id).is_ok_and(|m| !m.partial)
    }

    pub fn save_manifest(&self, manifest: &RunManifest) -> ResultsResult<()> {
        let path = self.run_dir(&manifest.run_id).join(MANIFEST);
        write_file(&path, serde_json::to_string_pretty(manifest)?.as_bytes())
    }

    pub fn load_manifest(&self, run_id: &str) -> ResultsResult<RunManifest> {
        let manifest_path = self.run_dir(run_id).join(MANIFEST);

        if !manifest_path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }

        let content = fs::read_to_string(manifest_path)?;
        let manifest = serde_json::from_str(&content)?;
        Ok(manifest)
    }

    /// Rows produced by one run, frozen alongside its manifest.
    pub fn save_run_rows(
        &self,
        run_id: &str,
        rows: &[LookupTableRow],
        rc_pairs: RcPairs,
    ) -> ResultsResult<()> {
        self.save_table(&self.run_dir(run_id).join(LOOKUP_TABLE), rows, rc_pairs)
    }

    pub fn load_run_rows(&self, run_id: &str) -> ResultsResult<Vec<LookupTableRow>> {
        let path = self.run_dir(run_id).join(LOOKUP_TABLE);
        if !path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        self.load_table(&path)
    }

    /// Manifests of every stored run, newest first.
    pub fn list_runs(&self) -> ResultsResult<Vec<RunManifest>> {
        let mut runs = Vec::new();
        let runs_dir = self.root_dir.join(RUNS_DIR);

        if !runs_dir.exists() {
            return Ok(runs);
        }

        for entry in fs::read_dir(&runs_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                let run_id = entry.file_name().to_string_lossy().to_string();
                if let Ok(manifest) = self.load_manifest(&run_id) {
                    runs.push(manifest);
                }
            }
        }

        runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(runs)
    }

    pub fn delete_run(&self, run_id: &str) -> ResultsResult<()> {
        let run_dir = self.run_dir(run_id);
        if run_dir.exists() {
            fs::remove_dir_all(run_dir)?;
        }
        Ok(())
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> ResultsResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}
