//! Thevenin equivalent-circuit parameter identification for single pulses.
//!
//! The circuit simulation and the optimiser sit behind the
//! [`ModelEvaluator`] and [`Optimizer`] traits; [`TheveninEvaluator`] and
//! [`ParticleSwarm`] are the bundled implementations. A fit moves through
//! the stages in [`pipeline`].

pub mod cancel;
pub mod cost;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod optimizer;
pub mod params;
pub mod pipeline;
pub mod pso;
pub mod status;

pub use cancel::CancelToken;
pub use cost::sum_squared_error;
pub use error::{EvalError, EvalResult, FitError, FitResult};
pub use evaluator::{Excitation, ModelEvaluator, TheveninEvaluator};
pub use model::{
    Bounds, ModelOrder, Parameter, ParameterSpec, Prior, PriorOverride, PriorOverrides, RcPairs,
};
pub use optimizer::{Budget, Objective, Optimizer, Optimum, StopReason};
pub use params::{CellConstants, RcBranch, TheveninParameters};
pub use pipeline::{ExportedFit, FitBuilder, FitModel, FitOutcome, FitProblem, Measurement};
pub use pso::ParticleSwarm;
pub use status::{FitStatus, FitWarning, boundary_warnings};
