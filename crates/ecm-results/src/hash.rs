//! Content-based hashing for run IDs.

use ecm_ocv::OcvFitConfig;
use ecm_project::{PipelineConfig, RawCycles};
use sha2::{Digest, Sha256};

pub fn compute_run_id(config: &PipelineConfig, dataset_fingerprint: &str, version: &str) -> String {
    let mut hasher = Sha256::new();

    let config_json = serde_json::to_string(config).unwrap_or_default();
    hasher.update(config_json.as_bytes());

    hasher.update(dataset_fingerprint.as_bytes());
    hasher.update(version.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}

/// Identity of a fitted OCV curve: the capacity data and the fit settings.
pub fn compute_curve_key(capacity: &RawCycles, config: &OcvFitConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(capacity.digest().as_bytes());
    hasher.update(serde_json::to_string(config).unwrap_or_default().as_bytes());
    format!("{:x}", hasher.finalize())
}
