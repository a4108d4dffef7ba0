//! OCV curve construction, once per label.

use ecm_ocv::{OcvCache, OcvCurve, fit_ocv_curve};
use ecm_project::{DataSource, PipelineConfig, TestKind};
use ecm_results::{ResultStore, compute_curve_key};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::AppResult;

/// Where a label's curve came from.
#[derive(Debug, Clone, PartialEq)]
pub enum CurveOrigin {
    Cache,
    Stored,
    Fitted {
        rms_residual: f64,
        cycles_used: usize,
        cycles_skipped: usize,
        samples: usize,
    },
}

#[derive(Debug, Clone)]
pub struct OcvReport {
    pub label: String,
    pub curve: Arc<OcvCurve>,
    pub origin: CurveOrigin,
    pub path: Option<PathBuf>,
}

/// Curve for `label`: from the cache, else the saved CSV, else a fresh fit.
///
/// A saved CSV is reused only when it was fitted from the same capacity
/// data with the same `ocv` settings. Fresh fits are written to the store
/// and published in the cache before returning. Setting `output.refit_ocv`
/// skips the saved CSV.
pub fn resolve_curve(
    source: &dyn DataSource,
    label: &str,
    config: &PipelineConfig,
    store: &ResultStore,
    cache: &OcvCache,
) -> AppResult<OcvReport> {
    if let Some(curve) = cache.get(label) {
        return Ok(OcvReport {
            label: label.to_string(),
            curve,
            origin: CurveOrigin::Cache,
            path: None,
        });
    }

    let raw = source.load(TestKind::Capacity, label)?;
    let key = compute_curve_key(&raw, &config.ocv);

    if !config.output.refit_ocv
        && let Some(curve) = store.load_ocv_curve(label, &key)?
    {
        tracing::info!(label, points = curve.len(), "reusing saved OCV curve");
        return Ok(OcvReport {
            label: label.to_string(),
            curve: cache.insert(label, curve),
            origin: CurveOrigin::Stored,
            path: Some(store.ocv_curve_path(label)?),
        });
    }

    let fit = fit_ocv_curve(&raw.voltage, &raw.capacity, &config.ocv)?;
    for (cycle, reason) in &fit.samples.cycles_skipped {
        tracing::debug!(label, cycle, ?reason, "capacity cycle excluded from OCV fit");
    }
    let path = store.save_ocv_curve(label, &fit.curve, &key)?;
    let origin = CurveOrigin::Fitted {
        rms_residual: fit.rms_residual,
        cycles_used: fit.samples.cycles_used.len(),
        cycles_skipped: fit.samples.cycles_skipped.len(),
        samples: fit.samples.len(),
    };
    Ok(OcvReport {
        label: label.to_string(),
        curve: cache.insert(label, fit.curve),
        origin,
        path: Some(path),
    })
}
