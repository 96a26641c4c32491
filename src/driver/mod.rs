//! The ask/tell adaptive driver.
//!
//! [`AdaptiveDriver`] sits between a batch of caller-owned
//! [`TrialRecord`]s and a [`SurrogateModel`]. It fills placeholder records
//! with proposals ([`ask`](AdaptiveDriver::ask)), routes evaluated records
//! back into the model ([`tell`](AdaptiveDriver::tell)), and keeps the
//! model's generation-strategy bookkeeping consistent when results arrive
//! from outside the ask cycle.
//!
//! # Absorption paths
//!
//! A told record is absorbed in one of two ways:
//!
//! - **Normal completion**: the record carries a correlation id the model
//!   knows as running. Its evaluations are completed against that id.
//! - **External attachment**: the record has no id, or an id the model does
//!   not know. Its parameter values are attached as a new trial and then
//!   completed. If the current phase is an exploration phase with trials
//!   left to generate, its budget shrinks by one, unless
//!   [`enforce_n_init`](DriverBuilder::enforce_n_init) is set.
//!
//! Every record of a `tell` batch is validated before any of them is
//! absorbed; a rejected batch leaves the model untouched.
//!
//! # Transfer
//!
//! A driver can be shipped to another context and merged back:
//! [`prepare_to_send`](AdaptiveDriver::prepare_to_send) strips fitted-model
//! artifacts before serialization, and [`update`](AdaptiveDriver::update)
//! merges an incoming driver into a long-lived one without replacing its
//! model object.
//!
//! # Examples
//!
//! ```
//! use sim_optimizer::parameter::VaryingParameter;
//! use sim_optimizer::{AdaptiveDriver, Objective, ObjectiveEvaluation};
//!
//! let mut driver = AdaptiveDriver::builder(
//!     vec![VaryingParameter::new("x", 0.0, 1.0)],
//!     vec![Objective::new("f")],
//! )
//! .n_init(2)
//! .seed(7)
//! .build()
//! .unwrap();
//!
//! let placeholders = driver.new_trials(2);
//! let mut batch = driver.ask(placeholders).unwrap();
//! for trial in &mut batch {
//!     let x = trial.value_of("x").unwrap();
//!     let f = driver.objectives()[0].clone();
//!     trial.complete_evaluation(ObjectiveEvaluation::new(&f, (x - 0.3).powi(2))).unwrap();
//! }
//! driver.tell(&mut batch).unwrap();
//! assert_eq!(driver.n_completed_trials(), 2);
//! ```

mod builder;

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use builder::DriverBuilder;

use crate::error::{Error, Result};
use crate::model::{ExperimentClient, Measurement, ModelTrialStatus, RawData, SurrogateModel, TrialIndex};
use crate::objective::{self, Objective};
use crate::parameter::{self, AnalyzedParameter, VaryingParameter};
use crate::search_space::{FixedFeatures, ParameterMap};
use crate::trial::TrialRecord;
use crate::types::TrialState;

/// How one validated record will be absorbed.
enum Absorption {
    Complete(TrialIndex),
    Attach(ParameterMap),
}

/// Ask/tell driver over a [`SurrogateModel`].
///
/// All calls against one driver are serialized through `&mut self`; the
/// driver never runs evaluations itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdaptiveDriver<M = ExperimentClient> {
    varying_parameters: Arc<[VaryingParameter]>,
    objectives: Arc<[Objective]>,
    analyzed_parameters: Vec<AnalyzedParameter>,
    model: M,
    fixed_features: FixedFeatures,
    n_init: usize,
    enforce_n_init: bool,
    n_completed_trials: usize,
    next_index: u64,
}

impl AdaptiveDriver<ExperimentClient> {
    /// Returns a builder for a driver backed by an [`ExperimentClient`].
    #[must_use]
    pub fn builder(varying_parameters: Vec<VaryingParameter>, objectives: Vec<Objective>) -> DriverBuilder {
        DriverBuilder::new(varying_parameters, objectives)
    }
}

impl<M: SurrogateModel> AdaptiveDriver<M> {
    /// Creates a driver around an already configured model.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the parameters or objectives are
    /// empty, malformed, or not uniquely named.
    pub fn with_model(
        varying_parameters: Vec<VaryingParameter>,
        objectives: Vec<Objective>,
        model: M,
    ) -> Result<Self> {
        parameter::validate_all(&varying_parameters)?;
        objective::validate_all(&objectives)?;
        Ok(Self::assemble(
            Arc::from(varying_parameters),
            Arc::from(objectives),
            model,
        ))
    }

    fn assemble(varying_parameters: Arc<[VaryingParameter]>, objectives: Arc<[Objective]>, model: M) -> Self {
        let fixed_features = derive_fixed_features(&varying_parameters);
        Self {
            varying_parameters,
            objectives,
            analyzed_parameters: Vec::new(),
            model,
            fixed_features,
            n_init: 0,
            enforce_n_init: false,
            n_completed_trials: 0,
            next_index: 0,
        }
    }

    /// Returns the varying parameters, in positional order.
    #[must_use]
    pub fn varying_parameters(&self) -> &Arc<[VaryingParameter]> {
        &self.varying_parameters
    }

    /// Returns the objectives.
    #[must_use]
    pub fn objectives(&self) -> &Arc<[Objective]> {
        &self.objectives
    }

    /// Returns the analyzed parameters.
    #[must_use]
    pub fn analyzed_parameters(&self) -> &[AnalyzedParameter] {
        &self.analyzed_parameters
    }

    /// Returns the parameters currently pinned during proposals.
    #[must_use]
    pub fn fixed_features(&self) -> &FixedFeatures {
        &self.fixed_features
    }

    /// Returns the surrogate model.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Returns the configured number of exploration trials.
    #[must_use]
    pub fn n_init(&self) -> usize {
        self.n_init
    }

    /// Returns whether external data leaves the exploration budget untouched.
    #[must_use]
    pub fn enforce_n_init(&self) -> bool {
        self.enforce_n_init
    }

    /// Sets whether external data leaves the exploration budget untouched.
    pub fn set_enforce_n_init(&mut self, enforce: bool) {
        self.enforce_n_init = enforce;
    }

    /// Returns the number of records absorbed through [`tell`](Self::tell).
    #[must_use]
    pub fn n_completed_trials(&self) -> usize {
        self.n_completed_trials
    }

    /// Creates `n` placeholder records with consecutive caller indices.
    #[must_use]
    pub fn new_trials(&mut self, n: usize) -> Vec<TrialRecord> {
        (0..n)
            .map(|_| {
                let index = self.next_index;
                self.next_index += 1;
                TrialRecord::new(Arc::clone(&self.varying_parameters), Arc::clone(&self.objectives))
                    .index(index)
            })
            .collect()
    }

    /// Fills each placeholder with a new proposal, in input order.
    ///
    /// Parameters marked fixed are pinned to their default value. Each
    /// record receives one value per varying parameter and the model's
    /// correlation id.
    ///
    /// # Errors
    ///
    /// Rejects the whole batch with [`Error::NotAPlaceholder`], before
    /// proposing anything, if any record already has values, a correlation
    /// id or evaluations. Otherwise returns an error if the model cannot
    /// produce a candidate; records proposed before the failure stay
    /// registered with the model.
    pub fn ask(&mut self, mut trials: Vec<TrialRecord>) -> Result<Vec<TrialRecord>> {
        if let Some(trial) = trials.iter().find(|t| !t.is_placeholder()) {
            return Err(Error::NotAPlaceholder(trial.label()));
        }
        for trial in &mut trials {
            let (parameters, id) = self.model.propose(&self.fixed_features)?;
            let values = trial
                .varying_parameters()
                .iter()
                .map(|p| {
                    parameters
                        .get(p.name())
                        .copied()
                        .ok_or_else(|| Error::UnknownParameter(p.name().to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            trial.set_parameter_values(values)?;
            trial.set_model_trial_id(id);
        }
        trace_info!(n_trials = trials.len(), "asked for trials");
        Ok(trials)
    }

    /// Absorbs evaluated records into the model, exactly once each.
    ///
    /// # Errors
    ///
    /// The whole batch is rejected, with nothing absorbed, if any record:
    ///
    /// - lacks an evaluation for one of the objectives ([`Error::MissingObjective`]);
    /// - was already told ([`Error::TrialAlreadyCompleted`]) or reported
    ///   failed ([`Error::TrialAbandoned`]);
    /// - shares its correlation id with another record ([`Error::DuplicateTrial`]);
    /// - needs the external path but has no or malformed parameter values
    ///   ([`Error::MissingParameterValues`], [`Error::ParameterCountMismatch`],
    ///   [`Error::OutOfBounds`], [`Error::UnknownParameter`]).
    pub fn tell(&mut self, trials: &mut [TrialRecord]) -> Result<()> {
        let plan = self.plan_absorption(trials)?;

        for (trial, (absorption, data)) in trials.iter_mut().zip(plan) {
            match absorption {
                Absorption::Complete(id) => {
                    self.model.complete(id, data)?;
                    trace_debug!(trial = trial.label(), id = id.0, "trial completed");
                }
                Absorption::Attach(parameters) => {
                    let id = self.model.attach(parameters)?;
                    self.model.complete(id, data)?;
                    trial.set_model_trial_id(id);
                    trace_info!(trial = trial.label(), id = id.0, "external data attached");
                    self.reduce_exploration_budget();
                }
            }
            trial.set_complete();
            self.n_completed_trials += 1;
        }
        Ok(())
    }

    /// Validates a batch and decides how each record is absorbed.
    fn plan_absorption(&self, trials: &[TrialRecord]) -> Result<Vec<(Absorption, RawData)>> {
        let mut seen = HashSet::new();
        let mut plan = Vec::with_capacity(trials.len());

        for trial in trials {
            match trial.state() {
                TrialState::Complete => {
                    return Err(Error::TrialAlreadyCompleted(
                        trial.model_trial_id().unwrap_or(TrialIndex(trial.label())),
                    ));
                }
                TrialState::Failed => return Err(Error::TrialAbandoned(trial.label())),
                TrialState::Pending | TrialState::Running => {}
            }

            let data = self.raw_data(trial)?;

            let status = trial
                .model_trial_id()
                .and_then(|id| self.model.trial_status(id).map(|s| (id, s)));
            let absorption = match status {
                Some((id, ModelTrialStatus::Running)) => {
                    if !seen.insert(id) {
                        return Err(Error::DuplicateTrial(id));
                    }
                    Absorption::Complete(id)
                }
                Some((id, ModelTrialStatus::Completed)) => return Err(Error::TrialAlreadyCompleted(id)),
                Some((_, ModelTrialStatus::Failed)) => return Err(Error::TrialAbandoned(trial.label())),
                None => Absorption::Attach(self.external_parameters(trial)?),
            };
            plan.push((absorption, data));
        }
        Ok(plan)
    }

    /// Objective name to measurement, requiring every objective.
    fn raw_data(&self, trial: &TrialRecord) -> Result<RawData> {
        self.objectives
            .iter()
            .map(|objective| {
                let evaluation = trial
                    .evaluation(objective.name())
                    .ok_or_else(|| Error::MissingObjective {
                        trial: trial.label(),
                        objective: objective.name().to_string(),
                    })?;
                Ok((
                    objective.name().to_string(),
                    Measurement {
                        value: evaluation.value(),
                        sem: evaluation.sem(),
                    },
                ))
            })
            .collect()
    }

    /// Parameter mapping of a record taking the external path.
    fn external_parameters(&self, trial: &TrialRecord) -> Result<ParameterMap> {
        let values = trial.parameter_values();
        if values.is_empty() {
            return Err(Error::MissingParameterValues(trial.label()));
        }
        if values.len() != self.varying_parameters.len() {
            return Err(Error::ParameterCountMismatch {
                expected: self.varying_parameters.len(),
                got: values.len(),
            });
        }
        let parameters = trial.parameters();
        for (name, &value) in &parameters {
            let definition = self
                .varying_parameters
                .iter()
                .find(|p| p.name() == name)
                .ok_or_else(|| Error::UnknownParameter(name.clone()))?;
            if !definition.contains(value) {
                return Err(Error::OutOfBounds {
                    name: name.clone(),
                    value,
                });
            }
        }
        Ok(parameters)
    }

    /// Gives up one unit of exploration budget for an externally supplied trial.
    fn reduce_exploration_budget(&mut self) {
        if self.enforce_n_init || !self.model.current_phase_kind().is_exploratory() {
            return;
        }
        let budget = self.model.current_phase_budget();
        if budget.to_generate.has_remaining() && self.model.reduce_current_phase_budget() {
            trace_info!(
                remaining = ?self.model.current_phase_budget().to_generate,
                "exploration budget reduced"
            );
        }
    }

    /// Declares evaluation failures for running records.
    ///
    /// Records known to the model as running are abandoned there; every
    /// record ends in [`TrialState::Failed`] and never joins the history.
    ///
    /// # Errors
    ///
    /// Rejects the whole batch with [`Error::TrialAlreadyCompleted`] if any
    /// record was already told.
    pub fn report_failed(&mut self, trials: &mut [TrialRecord]) -> Result<()> {
        for trial in trials.iter() {
            if trial.state() == TrialState::Complete {
                return Err(Error::TrialAlreadyCompleted(
                    trial.model_trial_id().unwrap_or(TrialIndex(trial.label())),
                ));
            }
        }
        for trial in trials.iter_mut() {
            if let Some(id) = trial.model_trial_id()
                && self.model.trial_status(id) == Some(ModelTrialStatus::Running)
            {
                self.model.mark_failed(id)?;
            }
            trace_info!(trial = trial.label(), "trial evaluation failed");
            trial.set_failed();
        }
        Ok(())
    }

    /// Replaces one varying parameter's definition, in the driver and in the
    /// model's live search space.
    ///
    /// The fixed-feature overrides are re-derived; in-flight records keep
    /// their values. Every other parameter is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownParameter`] if no parameter has that name, or
    /// a configuration error if the definition is malformed.
    pub fn update_parameter(&mut self, parameter: &VaryingParameter) -> Result<()> {
        parameter.validate()?;
        let position = self
            .varying_parameters
            .iter()
            .position(|p| p.name() == parameter.name())
            .ok_or_else(|| Error::UnknownParameter(parameter.name().to_string()))?;

        self.model.update_search_space_parameter(parameter.to_range())?;

        let mut parameters = self.varying_parameters.to_vec();
        parameters[position] = parameter.clone();
        self.varying_parameters = Arc::from(parameters);
        self.fixed_features = derive_fixed_features(&self.varying_parameters);

        trace_info!(
            parameter = parameter.name(),
            lower = parameter.lower_bound(),
            upper = parameter.upper_bound(),
            fixed = parameter.is_fixed(),
            "search-space parameter updated"
        );
        Ok(())
    }

    /// Merges a driver received from another context into this one.
    ///
    /// This driver keeps its model object and merges the incoming model's
    /// bookkeeping into it, so live fitted-model caches survive. Every other
    /// attribute is taken from `incoming`.
    pub fn update(&mut self, incoming: Self) {
        let AdaptiveDriver {
            varying_parameters,
            objectives,
            analyzed_parameters,
            model,
            fixed_features,
            n_init,
            enforce_n_init,
            n_completed_trials,
            next_index,
        } = incoming;

        self.model.merge_from(model);
        self.varying_parameters = varying_parameters;
        self.objectives = objectives;
        self.analyzed_parameters = analyzed_parameters;
        self.fixed_features = fixed_features;
        self.n_init = n_init;
        self.enforce_n_init = enforce_n_init;
        self.n_completed_trials = n_completed_trials;
        self.next_index = next_index;

        trace_info!(
            n_completed = self.n_completed_trials,
            n_observations = self.model.n_observations(),
            "driver merged"
        );
    }

    /// Strips fitted-model artifacts before this driver crosses a process or
    /// serialization boundary.
    pub fn prepare_to_send(&mut self) {
        self.model.clear_fitted_model();
        trace_debug!("fitted model cleared for transfer");
    }
}

/// Pins every parameter marked fixed to its default value.
fn derive_fixed_features(parameters: &[VaryingParameter]) -> FixedFeatures {
    parameters
        .iter()
        .filter_map(|p| p.fixed_value().map(|v| (p.name().to_string(), v)))
        .collect()
}
