#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]

//! Ask/tell adaptive experiment design for expensive black-box simulations.
//!
//! The crate proposes parameter settings for a simulator, absorbs the
//! measured objectives, and refines later proposals with a Gaussian-process
//! surrogate. Evaluation itself stays with the caller: the driver only
//! exchanges [`TrialRecord`]s.
//!
//! # Getting Started
//!
//! ```
//! use sim_optimizer::prelude::*;
//!
//! let mut driver = AdaptiveDriver::builder(
//!     vec![
//!         VaryingParameter::new("x", 0.0, 1.0),
//!         VaryingParameter::new("y", 0.0, 1.0),
//!     ],
//!     vec![Objective::new("f")],
//! )
//! .n_init(4)
//! .n_candidates(128)
//! .seed(0)
//! .build()
//! .unwrap();
//!
//! for _ in 0..3 {
//!     let placeholders = driver.new_trials(2);
//!     let mut batch = driver.ask(placeholders).unwrap();
//!     for trial in &mut batch {
//!         let (x, y) = (trial.value_of("x").unwrap(), trial.value_of("y").unwrap());
//!         let f = trial.objectives()[0].clone();
//!         trial
//!             .complete_evaluation(ObjectiveEvaluation::new(&f, (x - 0.2).powi(2) + (y - 0.7).powi(2)))
//!             .unwrap();
//!     }
//!     driver.tell(&mut batch).unwrap();
//! }
//! assert_eq!(driver.model().n_observations(), 6);
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`AdaptiveDriver`] | Fill placeholder records (`ask`), absorb evaluated ones (`tell`), merge and sanitize for transfer. |
//! | [`TrialRecord`] | One point of the parameter space and its objective evaluations. |
//! | [`SurrogateModel`](model::SurrogateModel) | The contract the driver proposes through; [`ExperimentClient`](model::ExperimentClient) implements it. |
//! | [`GenerationStrategy`](model::GenerationStrategy) | Exploration phase with a trial budget followed by model-based generation. |
//! | [`Evaluator`](evaluator::Evaluator) | Runs the simulation for a record; owned by the caller. |
//! | [`Exploration`](exploration::Exploration) | Caller-side loop tying driver, evaluator and checkpointer together. |
//!
//! # External data
//!
//! Records that were never proposed by the model (historical runs, warm
//! starts) are told like any other. They are attached to the model as new
//! trials, and each one replaces one exploration trial the model would
//! otherwise have generated, unless
//! [`enforce_n_init`](DriverBuilder::enforce_n_init) is set.
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `async` | [`Exploration::run_async`](exploration::Exploration::run_async) via tokio | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at proposal, absorption, merge and checkpoint points | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

pub mod checkpoint;
mod driver;
mod error;
pub mod evaluator;
pub mod exploration;
pub mod model;
pub mod objective;
pub mod parameter;
pub mod sampler;
pub mod search_space;
mod trial;
mod types;

pub use driver::{AdaptiveDriver, DriverBuilder};
pub use error::{Error, Result};
pub use model::{ModelKind, TrialIndex};
pub use objective::{Objective, ObjectiveEvaluation};
pub use trial::{AttrValue, TrialRecord};
pub use types::{Direction, TrialState};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use sim_optimizer::prelude::*;
/// ```
pub mod prelude {
    pub use crate::checkpoint::ModelCheckpointer;
    pub use crate::driver::{AdaptiveDriver, DriverBuilder};
    pub use crate::error::{Error, Result};
    pub use crate::evaluator::{EvaluationOutcome, EvaluationStatus, Evaluator, FnEvaluator};
    pub use crate::exploration::Exploration;
    pub use crate::model::{
        Budget, ExperimentClient, GenerationStep, GenerationStrategy, ModelKind, SurrogateModel,
        TrialIndex,
    };
    pub use crate::objective::{Objective, ObjectiveEvaluation};
    pub use crate::parameter::{AnalyzedParameter, ValueType, VaryingParameter};
    pub use crate::search_space::{FixedFeatures, RangeParameter, SearchSpace};
    pub use crate::trial::{AttrValue, TrialRecord};
    pub use crate::types::{Direction, TrialState};
}
