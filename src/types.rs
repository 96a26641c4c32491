//! Core types shared across the crate.

use serde::{Deserialize, Serialize};

/// The direction of optimization for an objective.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Minimize the objective value.
    Minimize,
    /// Maximize the objective value.
    Maximize,
}

impl Direction {
    /// Sign that turns a value into a quantity to minimize.
    #[must_use]
    pub(crate) fn sign(self) -> f64 {
        match self {
            Direction::Minimize => 1.0,
            Direction::Maximize => -1.0,
        }
    }
}

/// The state of a [`TrialRecord`](crate::TrialRecord) in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialState {
    /// Created by the caller, no parameter values yet.
    Pending,
    /// Parameter values set, waiting for its evaluation to be told.
    Running,
    /// Evaluations absorbed into the model.
    Complete,
    /// The evaluation failed and the trial was abandoned.
    Failed,
}
