//! Optimization objectives and their measured evaluations.

use serde::{Deserialize, Serialize};

use crate::types::Direction;

/// A scalar quantity the experiment optimizes.
///
/// # Examples
///
/// ```
/// use sim_optimizer::{Direction, Objective};
///
/// let f = Objective::new("f");
/// assert!(f.minimize());
///
/// let charge = Objective::maximize("charge");
/// assert_eq!(charge.direction(), Direction::Maximize);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    name: String,
    direction: Direction,
}

impl Objective {
    /// Creates an objective to minimize.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_direction(name, Direction::Minimize)
    }

    /// Creates an objective to maximize.
    #[must_use]
    pub fn maximize(name: impl Into<String>) -> Self {
        Self::with_direction(name, Direction::Maximize)
    }

    /// Creates an objective with an explicit direction.
    #[must_use]
    pub fn with_direction(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            name: name.into(),
            direction,
        }
    }

    /// Returns the objective name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the optimization direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns `true` if lower values are better.
    #[must_use]
    pub fn minimize(&self) -> bool {
        self.direction == Direction::Minimize
    }
}

/// One completed measurement of an [`Objective`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveEvaluation {
    objective: Objective,
    value: f64,
    sem: Option<f64>,
}

impl ObjectiveEvaluation {
    /// Creates a noiseless evaluation.
    #[must_use]
    pub fn new(objective: &Objective, value: f64) -> Self {
        Self {
            objective: objective.clone(),
            value,
            sem: None,
        }
    }

    /// Creates an evaluation with a standard error of the mean.
    #[must_use]
    pub fn with_sem(objective: &Objective, value: f64, sem: f64) -> Self {
        Self {
            objective: objective.clone(),
            value,
            sem: Some(sem),
        }
    }

    /// Returns the evaluated objective.
    #[must_use]
    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Returns the measured value.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Returns the standard error of the mean, if known.
    #[must_use]
    pub fn sem(&self) -> Option<f64> {
        self.sem
    }
}

/// Checks that objective names are unique and the list is non-empty.
pub(crate) fn validate_all(objectives: &[Objective]) -> crate::Result<()> {
    if objectives.is_empty() {
        return Err(crate::Error::NoObjectives);
    }
    let mut seen = std::collections::HashSet::new();
    for obj in objectives {
        if !seen.insert(obj.name()) {
            return Err(crate::Error::DuplicateName(obj.name().to_string()));
        }
    }
    Ok(())
}
