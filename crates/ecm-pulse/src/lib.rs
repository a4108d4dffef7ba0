//! Pulse segmentation of HPPC cycling records.
//!
//! A [`CyclingRecord`] is scanned for current steps ([`detect`]), each step
//! is cut into a fixed-size window ([`extract`]) and annotated with SOC from
//! the cell's OCV curve. [`HppcCycle`] bundles the three for one cycle.

pub mod analysis;
pub mod detect;
pub mod error;
pub mod extract;
pub mod record;

pub use analysis::{HppcCycle, PulseConfig};
pub use detect::{DetectionConfig, find_pulse_starts, require_pulses};
pub use error::{PulseError, PulseResult};
pub use extract::{ExtractionConfig, Pulse, PulseSummary, PulseTrace, extract_pulse};
pub use record::{CyclingRecord, RecordConfig};
