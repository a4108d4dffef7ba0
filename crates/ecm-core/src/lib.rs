//! ecm-core: shared foundation for the ECM identification workspace.
//!
//! Contains:
//! - units (uom SI electrical types + constructors)
//! - numeric (Real + tolerances + float helpers + 1-D interpolation)
//! - timing (wall-clock timers for fit instrumentation)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod timing;
pub mod units;

pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use units::*;
