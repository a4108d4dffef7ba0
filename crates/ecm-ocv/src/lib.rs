//! SOC-OCV characterization from low-rate capacity tests.
//!
//! The pipeline is: per-cycle SOC extraction from the capacity trace
//! ([`capacity`]), a least-squares polynomial fit over all cycles
//! ([`polyfit`], [`fitter`]), and a resampled [`OcvCurve`] that downstream
//! stages interpolate to assign an SOC to any measured voltage.

pub mod cache;
pub mod capacity;
pub mod curve;
pub mod error;
pub mod fitter;
pub mod io;
pub mod polyfit;

pub use cache::OcvCache;
pub use capacity::{SkipReason, SocOcvSamples, extract_soc_ocv};
pub use curve::{OcvCurve, SocExtrapolation};
pub use error::{OcvError, OcvResult};
pub use fitter::{OcvFit, OcvFitConfig, fit_ocv_curve};
pub use polyfit::{Polynomial, fit_polynomial};
