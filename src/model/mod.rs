//! The surrogate-model contract and its reference implementation.
//!
//! The [`SurrogateModel`] trait is the seam between the
//! [`AdaptiveDriver`](crate::AdaptiveDriver) and whatever proposes new
//! candidates. It exposes exactly what the driver needs:
//!
//! | Operation | Purpose |
//! |-----------|---------|
//! | [`propose`](SurrogateModel::propose) | Generate one candidate, honouring fixed features |
//! | [`complete`](SurrogateModel::complete) | Absorb the result of a proposed trial |
//! | [`attach`](SurrogateModel::attach) | Register an externally chosen parameter set |
//! | [`current_phase_budget`](SurrogateModel::current_phase_budget) | Trials the current phase still wants to generate / complete |
//! | [`current_phase_kind`](SurrogateModel::current_phase_kind) | Which kind of generator the current phase uses |
//! | [`reduce_current_phase_budget`](SurrogateModel::reduce_current_phase_budget) | Give up one unit of exploration budget |
//! | [`merge_from`](SurrogateModel::merge_from) / [`clear_fitted_model`](SurrogateModel::clear_fitted_model) | Transfer support |
//!
//! [`ExperimentClient`] implements the contract with a two-phase generation
//! strategy: quasi-random exploration followed by Gaussian-process
//! Bayesian optimization.

mod client;
pub mod generation;

use core::fmt;
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use client::ExperimentClient;
pub use generation::{Budget, GenerationStep, GenerationStrategy, ModelKind};

use crate::error::Result;
use crate::search_space::{FixedFeatures, ParameterMap, RangeParameter};

/// Opaque correlation id of a trial inside the surrogate model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrialIndex(pub u64);

impl fmt::Display for TrialIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A measured objective value with its optional standard error of the mean.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// The measured value.
    pub value: f64,
    /// Standard error of the mean, if known.
    pub sem: Option<f64>,
}

/// Objective name to measurement.
pub type RawData = BTreeMap<String, Measurement>;

/// Remaining work of the current generation phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseBudget {
    /// Trials the phase still intends to generate.
    pub to_generate: Budget,
    /// Completed trials the phase still needs before the strategy may move on.
    pub to_complete: usize,
}

/// Status of a trial inside the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelTrialStatus {
    /// Proposed or attached, result not yet absorbed.
    Running,
    /// Result absorbed into the observation history.
    Completed,
    /// Abandoned after a failed evaluation.
    Failed,
}

/// The contract an adaptive-sampling model fulfils for the driver.
///
/// Implementations are not required to be thread-safe: all calls against
/// one model instance are serialized by its owning driver.
pub trait SurrogateModel: Send {
    /// Generates one new candidate, with `fixed` parameters pinned.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot produce a candidate.
    fn propose(&mut self, fixed: &FixedFeatures) -> Result<(ParameterMap, TrialIndex)>;

    /// Absorbs the result of a running trial.
    ///
    /// # Errors
    ///
    /// Returns an error if the trial is unknown, not running, or the data
    /// does not cover every objective.
    fn complete(&mut self, index: TrialIndex, data: RawData) -> Result<()>;

    /// Registers an externally chosen parameter set as a new running trial.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters do not match the search space.
    fn attach(&mut self, parameters: ParameterMap) -> Result<TrialIndex>;

    /// Marks a running trial as failed; it never becomes an observation.
    ///
    /// # Errors
    ///
    /// Returns an error if the trial is unknown or not running.
    fn mark_failed(&mut self, index: TrialIndex) -> Result<()>;

    /// Returns the status of a trial, or `None` if the model does not know it.
    fn trial_status(&self, index: TrialIndex) -> Option<ModelTrialStatus>;

    /// Returns the remaining budget of the current phase.
    fn current_phase_budget(&self) -> PhaseBudget;

    /// Returns the generator kind of the current phase.
    fn current_phase_kind(&self) -> ModelKind;

    /// Decrements the current phase's trial budget by one if it is an
    /// exploratory phase that still has trials to generate. Returns whether
    /// the budget changed.
    fn reduce_current_phase_budget(&mut self) -> bool;

    /// Replaces one parameter definition in the live search space.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is unknown or malformed.
    fn update_search_space_parameter(&mut self, definition: RangeParameter) -> Result<()>;

    /// Returns the number of absorbed observations.
    fn n_observations(&self) -> usize;

    /// Adopts the bookkeeping state of `other` in place, keeping this
    /// instance's live fitted-model caches.
    fn merge_from(&mut self, other: Self)
    where
        Self: Sized;

    /// Drops any fitted-model artifact held by the model.
    fn clear_fitted_model(&mut self);

    /// Returns `true` if a fitted-model artifact is attached.
    fn has_fitted_model(&self) -> bool;

    /// Writes a snapshot of the model to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be encoded or written.
    fn save(&self, path: &Path) -> Result<()>;
}
