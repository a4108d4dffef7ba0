//! Configuration validation.

use crate::schema::{FitDef, PipelineConfig};
use std::collections::HashSet;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, value, "must be positive and finite"))
    }
}

/// Characters that would break a lookup-table row.
pub const RESERVED_LABEL_CHARS: &[char] = &[',', '"', '\n', '\r'];

pub fn validate_label(label: &str) -> Result<(), ValidationError> {
    if label.trim().is_empty() {
        return Err(invalid("jobs.labels", label, "label must not be empty"));
    }
    if label.contains(RESERVED_LABEL_CHARS) {
        return Err(invalid(
            "jobs.labels",
            label.escape_debug(),
            "label must not contain commas, quotes or line breaks",
        ));
    }
    Ok(())
}

pub fn validate_config(config: &PipelineConfig) -> Result<(), ValidationError> {
    if config.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: config.version,
        });
    }

    positive("record.sample_period_s", config.record.sample_period_s)?;

    if config.ocv.degree == 0 {
        return Err(invalid("ocv.degree", 0, "must be at least 1"));
    }
    if config.ocv.resolution < 2 {
        return Err(invalid("ocv.resolution", config.ocv.resolution, "must be at least 2"));
    }

    positive(
        "detection.current_threshold_a",
        config.detection.current_threshold_a,
    )?;
    if config.detection.min_distance == 0 {
        return Err(invalid("detection.min_distance", 0, "must be at least 1"));
    }
    if config.extraction.window_size == 0 {
        return Err(invalid("extraction.window_size", 0, "must be at least 1"));
    }

    validate_fit(&config.fit)?;

    if config.jobs.labels.is_empty() {
        return Err(invalid("jobs.labels", "[]", "at least one label is required"));
    }
    let mut labels = HashSet::new();
    for label in &config.jobs.labels {
        validate_label(label)?;
        if !labels.insert(label) {
            return Err(ValidationError::DuplicateId {
                id: label.clone(),
                context: "jobs.labels".to_string(),
            });
        }
    }
    if let Some(cycles) = &config.jobs.cycles {
        let mut seen = HashSet::new();
        for cycle in cycles {
            if !seen.insert(cycle) {
                return Err(ValidationError::DuplicateId {
                    id: cycle.to_string(),
                    context: "jobs.cycles".to_string(),
                });
            }
        }
    }
    if config.jobs.threads == Some(0) {
        return Err(invalid("jobs.threads", 0, "must be at least 1"));
    }

    Ok(())
}

fn validate_fit(fit: &FitDef) -> Result<(), ValidationError> {
    let rc_pairs = fit
        .rc_pairs()
        .map_err(|e| invalid("fit.rc_pairs", fit.rc_pairs, &e.to_string()))?;
    positive("fit.r_guess_ohm", fit.r_guess_ohm)?;
    if fit.max_iterations == 0 {
        return Err(invalid("fit.max_iterations", 0, "must be at least 1"));
    }
    if fit.max_unchanged_iterations == 0 {
        return Err(invalid("fit.max_unchanged_iterations", 0, "must be at least 1"));
    }
    if fit.swarm_size == 0 {
        return Err(invalid("fit.swarm_size", 0, "must be at least 1"));
    }
    if let Some(t) = fit.timeout_s {
        positive("fit.timeout_s", t)?;
    }

    let cell = &fit.cell;
    positive("fit.cell.capacity_ah", cell.capacity_ah)?;
    if let Some(nominal) = cell.nominal_capacity_ah {
        positive("fit.cell.nominal_capacity_ah", nominal)?;
    }
    positive("fit.cell.temperature_k", cell.temperature_k)?;
    if !(cell.lower_cutoff_v.is_finite() && cell.upper_cutoff_v.is_finite())
        || cell.lower_cutoff_v >= cell.upper_cutoff_v
    {
        return Err(invalid(
            "fit.cell",
            format!("[{}, {}]", cell.lower_cutoff_v, cell.upper_cutoff_v),
            "lower cutoff must be below upper cutoff",
        ));
    }

    let order = ecm_fit::ModelOrder::with_defaults(rc_pairs, fit.r_guess_ohm)
        .with_overrides(&fit.priors)
        .map_err(|e| invalid("fit.priors", format!("{:?}", fit.priors.keys()), &e.to_string()))?;
    order
        .validate()
        .map_err(|e| invalid("fit.priors", "override", &e.to_string()))?;
    Ok(())
}
