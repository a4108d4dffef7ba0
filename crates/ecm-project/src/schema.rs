//! Pipeline configuration schema.

use ecm_core::units::{amp_hours, k, volts};
use ecm_fit::{Budget, CellConstants, FitError, ParticleSwarm, PriorOverrides, RcPairs};
use ecm_ocv::{OcvFitConfig, SocExtrapolation};
use ecm_pulse::{DetectionConfig, ExtractionConfig, PulseConfig, RecordConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    pub version: u32,
    pub name: String,
    pub dataset: DatasetDef,
    #[serde(default)]
    pub record: RecordConfig,
    #[serde(default)]
    pub ocv: OcvFitConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub soc: SocDef,
    #[serde(default)]
    pub fit: FitDef,
    #[serde(default)]
    pub jobs: JobsDef,
    #[serde(default)]
    pub output: OutputDef,
}

impl PipelineConfig {
    /// Minimal configuration with every tunable at its default.
    pub fn new(name: &str, dataset: impl Into<PathBuf>, labels: Vec<String>) -> Self {
        Self {
            version: crate::migrate::LATEST_VERSION,
            name: name.to_string(),
            dataset: DatasetDef {
                path: dataset.into(),
            },
            record: RecordConfig::default(),
            ocv: OcvFitConfig::default(),
            detection: DetectionConfig::default(),
            extraction: ExtractionConfig::default(),
            soc: SocDef::default(),
            fit: FitDef::default(),
            jobs: JobsDef {
                labels,
                ..JobsDef::default()
            },
            output: OutputDef::default(),
        }
    }

    pub fn pulse_config(&self) -> PulseConfig {
        PulseConfig {
            detection: self.detection,
            extraction: self.extraction,
            soc_policy: self.soc.extrapolation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetDef {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SocDef {
    pub extrapolation: SocExtrapolation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FitDef {
    pub rc_pairs: u8,
    pub r_guess_ohm: f64,
    pub max_iterations: usize,
    pub max_unchanged_iterations: usize,
    pub swarm_size: usize,
    pub seed: u64,
    /// Per-pulse wall-clock limit; `None` disables it.
    pub timeout_s: Option<f64>,
    pub cell: CellDef,
    pub priors: PriorOverrides,
}

impl Default for FitDef {
    fn default() -> Self {
        Self {
            rc_pairs: 2,
            r_guess_ohm: 0.005,
            max_iterations: 100,
            max_unchanged_iterations: 30,
            swarm_size: 24,
            seed: 42,
            timeout_s: Some(120.0),
            cell: CellDef::default(),
            priors: PriorOverrides::new(),
        }
    }
}

impl FitDef {
    pub fn rc_pairs(&self) -> Result<RcPairs, FitError> {
        RcPairs::try_from(self.rc_pairs)
    }

    pub fn budget(&self) -> Budget {
        Budget {
            max_iterations: self.max_iterations,
            max_unchanged_iterations: self.max_unchanged_iterations,
        }
    }

    pub fn swarm(&self) -> ParticleSwarm {
        ParticleSwarm {
            swarm_size: self.swarm_size,
            seed: self.seed,
            ..ParticleSwarm::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_s
            .filter(|t| t.is_finite() && *t > 0.0)
            .map(Duration::from_secs_f64)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CellDef {
    pub capacity_ah: f64,
    /// Defaults to `capacity_ah`.
    pub nominal_capacity_ah: Option<f64>,
    pub upper_cutoff_v: f64,
    pub lower_cutoff_v: f64,
    pub temperature_k: f64,
}

impl Default for CellDef {
    fn default() -> Self {
        Self {
            capacity_ah: 4.85,
            nominal_capacity_ah: None,
            upper_cutoff_v: 4.2,
            lower_cutoff_v: 2.5,
            temperature_k: 298.15,
        }
    }
}

impl CellDef {
    pub fn constants(&self) -> CellConstants {
        CellConstants {
            capacity: amp_hours(self.capacity_ah),
            nominal_capacity: amp_hours(self.nominal_capacity_ah.unwrap_or(self.capacity_ah)),
            upper_cutoff: volts(self.upper_cutoff_v),
            lower_cutoff: volts(self.lower_cutoff_v),
            temperature: k(self.temperature_k),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JobsDef {
    pub labels: Vec<String>,
    /// Cycle indices to analyse; `None` means every cycle.
    pub cycles: Option<Vec<usize>>,
    /// Worker threads; `None` uses every available core.
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputDef {
    pub dir: PathBuf,
    /// Refit the OCV curve even when a saved one exists.
    pub refit_ocv: bool,
    /// Also write each pulse window as `Time,Current,Voltage,SoC`.
    pub pulse_traces: bool,
}

impl Default for OutputDef {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("out"),
            refit_ocv: false,
            pulse_traces: false,
        }
    }
}
