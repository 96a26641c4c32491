use crate::model::TrialIndex;

/// Errors produced while configuring the experiment, proposing trials, or
/// absorbing their results.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a parameter's lower bound is not strictly below its upper bound.
    #[error("invalid bounds for '{name}': lower ({lower}) must be less than upper ({upper})")]
    InvalidBounds {
        /// The parameter name.
        name: String,
        /// The lower bound value.
        lower: f64,
        /// The upper bound value.
        upper: f64,
    },

    /// Returned when a fidelity parameter has no target value.
    #[error("fidelity parameter '{0}' requires a target value")]
    MissingFidelityTarget(String),

    /// Returned when a fixed parameter has no default value to pin it to.
    #[error("fixed parameter '{0}' requires a default value")]
    MissingDefaultValue(String),

    /// Returned when a default value lies outside the parameter's bounds.
    #[error("default value {value} of '{name}' is outside its bounds")]
    DefaultOutOfBounds {
        /// The parameter name.
        name: String,
        /// The offending default value.
        value: f64,
    },

    /// Returned when two parameters or objectives share a name.
    #[error("duplicate name '{0}'")]
    DuplicateName(String),

    /// Returned when an experiment is configured without objectives.
    #[error("at least one objective is required")]
    NoObjectives,

    /// Returned when an experiment is configured without varying parameters.
    #[error("at least one varying parameter is required")]
    NoVaryingParameters,

    /// Returned when a parameter name is not part of the search space.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// Returned when the model cannot produce a candidate.
    #[error("model failed to propose a candidate: {0}")]
    ProposalFailed(String),

    /// Returned when a generation step needs more completed trials before it can move on.
    #[error("generation step requires {required} completed trials but only {observed} are available")]
    DataRequired {
        /// Completed trials the step needs.
        required: usize,
        /// Completed trials the step has.
        observed: usize,
    },

    /// Returned when a told trial lacks an evaluation for one of the objectives.
    #[error("trial {trial} is missing an evaluation for objective '{objective}'")]
    MissingObjective {
        /// The caller-assigned trial index.
        trial: u64,
        /// The objective without an evaluation.
        objective: String,
    },

    /// Returned when an evaluation references an objective not in the experiment.
    #[error("unknown objective '{0}'")]
    UnknownObjective(String),

    /// Returned when an objective is evaluated twice for the same trial.
    #[error("objective '{0}' was already evaluated for this trial")]
    DuplicateEvaluation(String),

    /// Returned when a trial carries the wrong number of parameter values.
    #[error("expected {expected} parameter values, got {got}")]
    ParameterCountMismatch {
        /// The number of varying parameters.
        expected: usize,
        /// The number of values supplied.
        got: usize,
    },

    /// Returned when a parameter value lies outside its bounds.
    #[error("value {value} of '{name}' is outside its bounds")]
    OutOfBounds {
        /// The parameter name.
        name: String,
        /// The offending value.
        value: f64,
    },

    /// Returned when a trial without a correlation id carries no parameter values.
    #[error("trial {0} has neither a correlation id nor parameter values")]
    MissingParameterValues(u64),

    /// Returned when the model has no trial with the given index.
    #[error("unknown trial {0}")]
    UnknownTrial(TrialIndex),

    /// Returned when a trial's result has already been absorbed.
    #[error("trial {0} was already completed")]
    TrialAlreadyCompleted(TrialIndex),

    /// Returned when a trial that was reported as failed is told or failed again.
    #[error("trial {0} was abandoned after a failed evaluation")]
    TrialAbandoned(u64),

    /// Returned when `ask` is handed a record that already carries values,
    /// a correlation id or evaluations.
    #[error("trial {0} is not an empty placeholder")]
    NotAPlaceholder(u64),

    /// Returned when the same correlation id appears twice in one batch.
    #[error("trial {0} appears more than once in the batch")]
    DuplicateTrial(TrialIndex),

    /// Returned when the evaluator cannot accept a trial.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Returned when reading or writing a snapshot fails.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when a snapshot cannot be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Returned when an internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),

    /// Returned when an async task fails.
    #[cfg(feature = "async")]
    #[error("async task error: {0}")]
    TaskError(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
