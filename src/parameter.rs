//! Parameter definitions for an experiment.
//!
//! A [`VaryingParameter`] is a continuous input of the simulation that the
//! optimizer is free to choose within `[lower_bound, upper_bound]`. It can be
//! marked as a fidelity parameter (with the value used for final,
//! high-fidelity evaluations) or pinned to a fixed default value.
//!
//! An [`AnalyzedParameter`] is a quantity measured by each simulation that is
//! recorded alongside the objectives but never drives the optimization.
//!
//! # Examples
//!
//! ```
//! use sim_optimizer::parameter::VaryingParameter;
//!
//! let x = VaryingParameter::new("x", 0.0, 1.0);
//! let res = VaryingParameter::new("resolution", 1.0, 8.0).fidelity(8.0);
//! let beam = VaryingParameter::new("beam_i", 1.0, 10.0).fixed(2.5);
//!
//! assert!(x.validate().is_ok());
//! assert!(res.is_fidelity());
//! assert_eq!(beam.fixed_value(), Some(2.5));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::search_space::RangeParameter;

/// A continuous input parameter varied by the optimizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaryingParameter {
    name: String,
    lower_bound: f64,
    upper_bound: f64,
    is_fidelity: bool,
    fidelity_target_value: Option<f64>,
    is_fixed: bool,
    default_value: Option<f64>,
}

impl VaryingParameter {
    /// Creates a free parameter with the given bounds.
    #[must_use]
    pub fn new(name: impl Into<String>, lower_bound: f64, upper_bound: f64) -> Self {
        Self {
            name: name.into(),
            lower_bound,
            upper_bound,
            is_fidelity: false,
            fidelity_target_value: None,
            is_fixed: false,
            default_value: None,
        }
    }

    /// Marks this parameter as a fidelity parameter with the given target value.
    #[must_use]
    pub fn fidelity(mut self, target_value: f64) -> Self {
        self.is_fidelity = true;
        self.fidelity_target_value = Some(target_value);
        self
    }

    /// Sets the default value without fixing the parameter.
    #[must_use]
    pub fn default_value(mut self, value: f64) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Pins this parameter to `value` for every proposal.
    #[must_use]
    pub fn fixed(mut self, value: f64) -> Self {
        self.is_fixed = true;
        self.default_value = Some(value);
        self
    }

    /// Releases a fixed parameter so the optimizer may vary it again.
    #[must_use]
    pub fn unfixed(mut self) -> Self {
        self.is_fixed = false;
        self
    }

    /// Returns a copy with new bounds.
    #[must_use]
    pub fn with_bounds(mut self, lower_bound: f64, upper_bound: f64) -> Self {
        self.lower_bound = lower_bound;
        self.upper_bound = upper_bound;
        self
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the lower bound.
    #[must_use]
    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    /// Returns the upper bound.
    #[must_use]
    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }

    /// Returns `true` if this is a fidelity parameter.
    #[must_use]
    pub fn is_fidelity(&self) -> bool {
        self.is_fidelity
    }

    /// Returns the fidelity target value, if any.
    #[must_use]
    pub fn fidelity_target_value(&self) -> Option<f64> {
        self.fidelity_target_value
    }

    /// Returns `true` if the parameter is pinned to its default value.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.is_fixed
    }

    /// Returns the default value, if any.
    #[must_use]
    pub fn default(&self) -> Option<f64> {
        self.default_value
    }

    /// Returns the value this parameter is pinned to, if it is fixed.
    #[must_use]
    pub fn fixed_value(&self) -> Option<f64> {
        if self.is_fixed {
            self.default_value
        } else {
            None
        }
    }

    /// Returns `true` if `value` lies within the bounds (inclusive).
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.lower_bound..=self.upper_bound).contains(&value)
    }

    /// Checks that the definition is usable.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the bounds are not ordered, a
    /// fidelity parameter lacks its target, or a fixed parameter has no
    /// default value inside its bounds.
    pub fn validate(&self) -> Result<()> {
        if self.lower_bound.is_nan()
            || self.upper_bound.is_nan()
            || self.lower_bound >= self.upper_bound
        {
            return Err(Error::InvalidBounds {
                name: self.name.clone(),
                lower: self.lower_bound,
                upper: self.upper_bound,
            });
        }
        if self.is_fidelity && self.fidelity_target_value.is_none() {
            return Err(Error::MissingFidelityTarget(self.name.clone()));
        }
        if self.is_fixed && self.default_value.is_none() {
            return Err(Error::MissingDefaultValue(self.name.clone()));
        }
        if let Some(value) = self.default_value
            && !self.contains(value)
        {
            return Err(Error::DefaultOutOfBounds {
                name: self.name.clone(),
                value,
            });
        }
        Ok(())
    }

    /// Converts this parameter into a search-space definition.
    #[must_use]
    pub fn to_range(&self) -> RangeParameter {
        RangeParameter {
            name: self.name.clone(),
            lower: self.lower_bound,
            upper: self.upper_bound,
            is_fidelity: self.is_fidelity,
            target_value: self.fidelity_target_value,
        }
    }
}

/// The value type of an [`AnalyzedParameter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    /// A floating-point quantity.
    Float,
    /// An integer quantity.
    Int,
    /// A boolean flag.
    Bool,
    /// Free-form text.
    Text,
}

/// A quantity recorded for each evaluation, for observability only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedParameter {
    name: String,
    value_type: ValueType,
}

impl AnalyzedParameter {
    /// Creates a float-valued analyzed parameter.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_type(name, ValueType::Float)
    }

    /// Creates an analyzed parameter with an explicit value type.
    #[must_use]
    pub fn with_type(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared value type.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
}

/// Checks a whole parameter list: each entry is valid and names are unique.
pub(crate) fn validate_all(parameters: &[VaryingParameter]) -> Result<()> {
    if parameters.is_empty() {
        return Err(Error::NoVaryingParameters);
    }
    let mut seen = std::collections::HashSet::new();
    for param in parameters {
        param.validate()?;
        if !seen.insert(param.name()) {
            return Err(Error::DuplicateName(param.name().to_string()));
        }
    }
    Ok(())
}
