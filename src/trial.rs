//! Trial records exchanged between the caller and the driver.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::TrialIndex;
use crate::objective::{Objective, ObjectiveEvaluation};
use crate::parameter::VaryingParameter;
use crate::search_space::ParameterMap;
use crate::types::TrialState;

/// A value stored in a trial's metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// A floating-point value.
    Float(f64),
    /// An integer value.
    Int(i64),
    /// A string value.
    String(String),
    /// A boolean value.
    Bool(bool),
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// A point of the parameter space and, once evaluated, its results.
///
/// Records are created empty by the caller, filled by
/// [`AdaptiveDriver::ask`](crate::AdaptiveDriver::ask) (or constructed with
/// values for external data), receive one [`ObjectiveEvaluation`] per
/// objective, and are absorbed by
/// [`AdaptiveDriver::tell`](crate::AdaptiveDriver::tell).
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use sim_optimizer::parameter::VaryingParameter;
/// use sim_optimizer::{Objective, ObjectiveEvaluation, TrialRecord, TrialState};
///
/// let params: Arc<[VaryingParameter]> = vec![VaryingParameter::new("x", 0.0, 1.0)].into();
/// let objectives: Arc<[Objective]> = vec![Objective::new("f")].into();
///
/// let mut trial = TrialRecord::with_values(params, objectives.clone(), vec![0.25]).unwrap();
/// trial.complete_evaluation(ObjectiveEvaluation::new(&objectives[0], 1.5)).unwrap();
/// assert_eq!(trial.state(), TrialState::Running);
/// assert!(trial.is_evaluated());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrialRecord {
    varying_parameters: Arc<[VaryingParameter]>,
    objectives: Arc<[Objective]>,
    parameter_values: Vec<f64>,
    model_trial_id: Option<TrialIndex>,
    objective_evaluations: Vec<ObjectiveEvaluation>,
    index: Option<u64>,
    state: TrialState,
    metadata: BTreeMap<String, AttrValue>,
}

impl TrialRecord {
    /// Creates an empty placeholder to be filled by `ask`.
    #[must_use]
    pub fn new(varying_parameters: Arc<[VaryingParameter]>, objectives: Arc<[Objective]>) -> Self {
        Self {
            varying_parameters,
            objectives,
            parameter_values: Vec::new(),
            model_trial_id: None,
            objective_evaluations: Vec::new(),
            index: None,
            state: TrialState::Pending,
            metadata: BTreeMap::new(),
        }
    }

    /// Creates a record with externally chosen parameter values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParameterCountMismatch`] unless there is exactly one
    /// value per varying parameter.
    pub fn with_values(
        varying_parameters: Arc<[VaryingParameter]>,
        objectives: Arc<[Objective]>,
        values: Vec<f64>,
    ) -> Result<Self> {
        let mut record = Self::new(varying_parameters, objectives);
        record.set_parameter_values(values)?;
        Ok(record)
    }

    /// Sets the caller-assigned index.
    #[must_use]
    pub fn index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }

    /// Returns the caller-assigned index.
    #[must_use]
    pub fn trial_index(&self) -> Option<u64> {
        self.index
    }

    /// Returns the varying parameters this record is aligned with.
    #[must_use]
    pub fn varying_parameters(&self) -> &[VaryingParameter] {
        &self.varying_parameters
    }

    /// Returns the objectives of the experiment.
    #[must_use]
    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    /// Returns the parameter values, positionally aligned with the varying parameters.
    #[must_use]
    pub fn parameter_values(&self) -> &[f64] {
        &self.parameter_values
    }

    /// Returns the parameter values keyed by name.
    #[must_use]
    pub fn parameters(&self) -> ParameterMap {
        self.varying_parameters
            .iter()
            .zip(&self.parameter_values)
            .map(|(p, &v)| (p.name().to_string(), v))
            .collect()
    }

    /// Returns the value of the named parameter, if set.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.varying_parameters
            .iter()
            .position(|p| p.name() == name)
            .and_then(|i| self.parameter_values.get(i).copied())
    }

    /// Returns the model correlation id, if the model knows this trial.
    #[must_use]
    pub fn model_trial_id(&self) -> Option<TrialIndex> {
        self.model_trial_id
    }

    /// Returns the recorded objective evaluations.
    #[must_use]
    pub fn objective_evaluations(&self) -> &[ObjectiveEvaluation] {
        &self.objective_evaluations
    }

    /// Returns the evaluation of the named objective, if recorded.
    #[must_use]
    pub fn evaluation(&self, objective: &str) -> Option<&ObjectiveEvaluation> {
        self.objective_evaluations
            .iter()
            .find(|e| e.objective().name() == objective)
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> TrialState {
        self.state
    }

    /// Returns `true` once every objective has an evaluation.
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.objectives
            .iter()
            .all(|o| self.evaluation(o.name()).is_some())
    }

    /// Records the evaluation of one objective.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownObjective`] for objectives outside the
    /// experiment and [`Error::DuplicateEvaluation`] when the objective was
    /// already evaluated.
    pub fn complete_evaluation(&mut self, evaluation: ObjectiveEvaluation) -> Result<()> {
        let name = evaluation.objective().name();
        if !self.objectives.iter().any(|o| o.name() == name) {
            return Err(Error::UnknownObjective(name.to_string()));
        }
        if self.evaluation(name).is_some() {
            return Err(Error::DuplicateEvaluation(name.to_string()));
        }
        self.objective_evaluations.push(evaluation);
        Ok(())
    }

    /// Sets a metadata entry.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Gets a metadata entry.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&AttrValue> {
        self.metadata.get(key)
    }

    /// Returns all metadata entries.
    #[must_use]
    pub fn all_metadata(&self) -> &BTreeMap<String, AttrValue> {
        &self.metadata
    }

    /// Returns `true` for an untouched record that `ask` may fill.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.state == TrialState::Pending
            && self.parameter_values.is_empty()
            && self.model_trial_id.is_none()
            && self.objective_evaluations.is_empty()
    }

    pub(crate) fn set_parameter_values(&mut self, values: Vec<f64>) -> Result<()> {
        if values.len() != self.varying_parameters.len() {
            return Err(Error::ParameterCountMismatch {
                expected: self.varying_parameters.len(),
                got: values.len(),
            });
        }
        self.parameter_values = values;
        self.state = TrialState::Running;
        Ok(())
    }

    pub(crate) fn set_model_trial_id(&mut self, id: TrialIndex) {
        self.model_trial_id = Some(id);
    }

    pub(crate) fn set_complete(&mut self) {
        self.state = TrialState::Complete;
    }

    pub(crate) fn set_failed(&mut self) {
        self.state = TrialState::Failed;
    }

    /// Caller index used in error messages.
    pub(crate) fn label(&self) -> u64 {
        self.index.unwrap_or(u64::MAX)
    }
}
