//! Raw cycling data ingestion.
//!
//! A [`DataSource`] hands out per-cycle voltage, current and capacity
//! arrays for one test kind of one cell label. Missing samples are `NaN`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Capacity,
    PulsePower,
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestKind::Capacity => f.write_str("capacity"),
            TestKind::PulsePower => f.write_str("pulse_power"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    #[error("Battery label '{label}' not found; known labels: {}", known.join(", "))]
    LabelNotFound { label: String, known: Vec<String> },

    #[error("No {kind} test data for label '{label}'")]
    TestMissing { label: String, kind: TestKind },

    #[error("Malformed dataset: {what}")]
    Malformed { what: String },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DatasetResult<T> = Result<T, DatasetError>;

/// Parallel per-cycle series of one test.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCycles {
    pub voltage: Vec<Vec<f64>>,
    pub current: Vec<Vec<f64>>,
    pub capacity: Vec<Vec<f64>>,
}

impl RawCycles {
    /// Cycles present in every series.
    pub fn cycle_count(&self) -> usize {
        self.voltage
            .len()
            .min(self.current.len())
            .min(self.capacity.len())
    }

    /// SHA-256 over every sample's bit pattern, NaN included.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        self.hash_into(&mut hasher);
        format!("{:x}", hasher.finalize())
    }

    fn hash_into(&self, hasher: &mut Sha256) {
        for series in [&self.voltage, &self.current, &self.capacity] {
            hasher.update((series.len() as u64).to_le_bytes());
            for cycle in series {
                hasher.update((cycle.len() as u64).to_le_bytes());
                for v in cycle {
                    hasher.update(v.to_bits().to_le_bytes());
                }
            }
        }
    }
}

pub trait DataSource: Send + Sync {
    /// Every label the source knows, sorted.
    fn labels(&self) -> Vec<String>;

    fn load(&self, kind: TestKind, label: &str) -> DatasetResult<RawCycles>;

    /// Short string identifying the source contents, for run ids.
    fn fingerprint(&self) -> String;

    fn require_label(&self, label: &str) -> DatasetResult<()> {
        let known = self.labels();
        if known.iter().any(|l| l == label) {
            Ok(())
        } else {
            Err(DatasetError::LabelNotFound {
                label: label.to_string(),
                known,
            })
        }
    }
}

/// In-memory source, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSource {
    cells: BTreeMap<String, BTreeMap<TestKind, RawCycles>>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: &str, kind: TestKind, cycles: RawCycles) {
        self.cells
            .entry(label.to_string())
            .or_default()
            .insert(kind, cycles);
    }

    pub fn with(mut self, label: &str, kind: TestKind, cycles: RawCycles) -> Self {
        self.insert(label, kind, cycles);
        self
    }
}

impl DataSource for InMemoryDataSource {
    fn labels(&self) -> Vec<String> {
        self.cells.keys().cloned().collect()
    }

    fn load(&self, kind: TestKind, label: &str) -> DatasetResult<RawCycles> {
        let Some(tests) = self.cells.get(label) else {
            return Err(DatasetError::LabelNotFound {
                label: label.to_string(),
                known: self.labels(),
            });
        };
        tests
            .get(&kind)
            .cloned()
            .ok_or_else(|| DatasetError::TestMissing {
                label: label.to_string(),
                kind,
            })
    }

    fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (label, tests) in &self.cells {
            for (kind, cycles) in tests {
                hasher.update(format!("{label}/{kind}\n").as_bytes());
                cycles.hash_into(&mut hasher);
            }
        }
        format!("memory:{:x}", hasher.finalize())
    }
}

/// On-disk layout of a JSON dataset.
///
/// ```json
/// { "cells": { "G1": { "capacity": { "voltage": [[4.1, null]], ... },
///                      "pulse_power": { ... } } } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetFile {
    pub cells: BTreeMap<String, CellTests>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellTests {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<SeriesDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulse_power: Option<SeriesDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesDef {
    #[serde(default)]
    pub voltage: Vec<Vec<Option<f64>>>,
    #[serde(default)]
    pub current: Vec<Vec<Option<f64>>>,
    #[serde(default)]
    pub capacity: Vec<Vec<Option<f64>>>,
}

impl SeriesDef {
    fn to_raw(&self) -> RawCycles {
        let nan = |cycles: &[Vec<Option<f64>>]| -> Vec<Vec<f64>> {
            cycles
                .iter()
                .map(|c| c.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
                .collect()
        };
        RawCycles {
            voltage: nan(&self.voltage),
            current: nan(&self.current),
            capacity: nan(&self.capacity),
        }
    }

    pub fn from_raw(raw: &RawCycles) -> Self {
        let opt = |cycles: &[Vec<f64>]| -> Vec<Vec<Option<f64>>> {
            cycles
                .iter()
                .map(|c| c.iter().map(|v| v.is_finite().then_some(*v)).collect())
                .collect()
        };
        Self {
            voltage: opt(&raw.voltage),
            current: opt(&raw.current),
            capacity: opt(&raw.capacity),
        }
    }
}

/// JSON file source, parsed once on open.
#[derive(Debug, Clone)]
pub struct JsonDataSource {
    path: PathBuf,
    file: DatasetFile,
    digest: String,
}

impl JsonDataSource {
    pub fn open(path: &Path) -> DatasetResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), cells = source.file.cells.len(), "dataset loaded");
        Ok(Self {
            path: path.to_path_buf(),
            ..source
        })
    }

    pub fn parse(content: &str) -> DatasetResult<Self> {
        let file: DatasetFile = serde_json::from_str(content)?;
        if let Some(label) = file.cells.keys().find(|l| l.trim().is_empty()) {
            return Err(DatasetError::Malformed {
                what: format!("blank cell label {label:?}"),
            });
        }
        Ok(Self {
            path: PathBuf::new(),
            file,
            digest: format!("{:x}", Sha256::digest(content.as_bytes())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for JsonDataSource {
    fn labels(&self) -> Vec<String> {
        self.file.cells.keys().cloned().collect()
    }

    fn load(&self, kind: TestKind, label: &str) -> DatasetResult<RawCycles> {
        let Some(cell) = self.file.cells.get(label) else {
            return Err(DatasetError::LabelNotFound {
                label: label.to_string(),
                known: self.labels(),
            });
        };
        let series = match kind {
            TestKind::Capacity => cell.capacity.as_ref(),
            TestKind::PulsePower => cell.pulse_power.as_ref(),
        };
        series
            .map(SeriesDef::to_raw)
            .ok_or_else(|| DatasetError::TestMissing {
                label: label.to_string(),
                kind,
            })
    }

    /// Hash of the file contents; moving the file keeps it.
    fn fingerprint(&self) -> String {
        format!("json:{}", self.digest)
    }
}
