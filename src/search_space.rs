//! Search-space definitions shared by the driver and the surrogate model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Parameter values keyed by parameter name.
pub type ParameterMap = BTreeMap<String, f64>;

/// A continuous range parameter as seen by the surrogate model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeParameter {
    /// Parameter name.
    pub name: String,
    /// Lower bound (inclusive).
    pub lower: f64,
    /// Upper bound (inclusive).
    pub upper: f64,
    /// Whether this parameter controls evaluation fidelity.
    pub is_fidelity: bool,
    /// Value used for full-fidelity evaluations.
    pub target_value: Option<f64>,
}

impl RangeParameter {
    /// Maps `value` into `[0, 1]` relative to the bounds.
    pub(crate) fn normalize(&self, value: f64) -> f64 {
        let width = self.upper - self.lower;
        if width.abs() < 1e-15 {
            0.5
        } else {
            (value - self.lower) / width
        }
    }

    /// Maps a point of `[0, 1]` back into the bounds.
    pub(crate) fn denormalize(&self, unit: f64) -> f64 {
        (self.lower + unit * (self.upper - self.lower)).clamp(self.lower, self.upper)
    }

    fn validate(&self) -> Result<()> {
        if self.lower.is_nan() || self.upper.is_nan() || self.lower >= self.upper {
            return Err(Error::InvalidBounds {
                name: self.name.clone(),
                lower: self.lower,
                upper: self.upper,
            });
        }
        if self.is_fidelity && self.target_value.is_none() {
            return Err(Error::MissingFidelityTarget(self.name.clone()));
        }
        Ok(())
    }
}

/// An ordered list of range parameters.
///
/// The order is significant: samplers assign one dimension per position.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<RangeParameter>,
}

impl SearchSpace {
    /// Builds a search space, validating bounds and name uniqueness.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for empty, duplicate or malformed definitions.
    pub fn new(parameters: Vec<RangeParameter>) -> Result<Self> {
        if parameters.is_empty() {
            return Err(Error::NoVaryingParameters);
        }
        for (i, param) in parameters.iter().enumerate() {
            param.validate()?;
            if parameters[..i].iter().any(|p| p.name == param.name) {
                return Err(Error::DuplicateName(param.name.clone()));
            }
        }
        Ok(Self { parameters })
    }

    /// Returns the parameters in dimension order.
    #[must_use]
    pub fn parameters(&self) -> &[RangeParameter] {
        &self.parameters
    }

    /// Returns the number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Returns `true` if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RangeParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Replaces the definition with the same name, leaving every other one untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownParameter`] if no parameter has that name, or a
    /// configuration error if the new definition is malformed.
    pub fn update_parameter(&mut self, definition: RangeParameter) -> Result<()> {
        definition.validate()?;
        let slot = self
            .parameters
            .iter_mut()
            .find(|p| p.name == definition.name)
            .ok_or_else(|| Error::UnknownParameter(definition.name.clone()))?;
        *slot = definition;
        Ok(())
    }

    /// Checks that `parameters` names exactly this space's parameters and lies within bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownParameter`], [`Error::ParameterCountMismatch`] or
    /// [`Error::OutOfBounds`].
    pub fn check_membership(&self, parameters: &ParameterMap) -> Result<()> {
        for name in parameters.keys() {
            if self.get(name).is_none() {
                return Err(Error::UnknownParameter(name.clone()));
            }
        }
        if parameters.len() != self.parameters.len() {
            return Err(Error::ParameterCountMismatch {
                expected: self.parameters.len(),
                got: parameters.len(),
            });
        }
        for param in &self.parameters {
            let value = parameters[&param.name];
            if !(param.lower..=param.upper).contains(&value) {
                return Err(Error::OutOfBounds {
                    name: param.name.clone(),
                    value,
                });
            }
        }
        Ok(())
    }

    /// Normalizes a parameter map into a point of the unit cube, in dimension order.
    pub(crate) fn to_unit(&self, parameters: &ParameterMap) -> Option<Vec<f64>> {
        self.parameters
            .iter()
            .map(|p| parameters.get(&p.name).map(|&v| p.normalize(v)))
            .collect()
    }

    /// Maps a point of the unit cube back to a parameter map.
    pub(crate) fn from_unit(&self, point: &[f64]) -> ParameterMap {
        self.parameters
            .iter()
            .zip(point)
            .map(|(p, &u)| (p.name.clone(), p.denormalize(u)))
            .collect()
    }
}

/// Parameters pinned to fixed values during proposal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedFeatures {
    values: ParameterMap,
}

impl FixedFeatures {
    /// Creates an empty set of fixed features.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins `name` to `value`.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Returns the pinned value of `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Returns `true` if no parameter is pinned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over pinned `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Overwrites the pinned entries of `parameters`.
    pub(crate) fn apply(&self, parameters: &mut ParameterMap) {
        for (name, &value) in &self.values {
            if let Some(slot) = parameters.get_mut(name) {
                *slot = value;
            }
        }
    }
}

impl FromIterator<(String, f64)> for FixedFeatures {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(name: &str, lower: f64, upper: f64) -> RangeParameter {
        RangeParameter {
            name: name.to_string(),
            lower,
            upper,
            is_fidelity: false,
            target_value: None,
        }
    }

    #[test]
    fn test_update_parameter_preserves_others() {
        let mut space = SearchSpace::new(vec![range("a", 0.0, 1.0), range("b", -1.0, 1.0)]).unwrap();
        space.update_parameter(range("a", 0.2, 0.4)).unwrap();
        assert_eq!(space.get("a").unwrap().lower, 0.2);
        assert_eq!(space.get("b").unwrap(), &range("b", -1.0, 1.0));
        assert_eq!(space.parameters()[0].name, "a");
    }

    #[test]
    fn test_update_unknown_parameter() {
        let mut space = SearchSpace::new(vec![range("a", 0.0, 1.0)]).unwrap();
        assert!(matches!(
            space.update_parameter(range("z", 0.0, 1.0)),
            Err(Error::UnknownParameter(n)) if n == "z"
        ));
    }

    #[test]
    fn test_fidelity_requires_target() {
        let mut p = range("res", 1.0, 2.0);
        p.is_fidelity = true;
        assert!(matches!(
            SearchSpace::new(vec![p]),
            Err(Error::MissingFidelityTarget(_))
        ));
    }

    #[test]
    fn test_check_membership() {
        let space = SearchSpace::new(vec![range("a", 0.0, 1.0), range("b", 0.0, 1.0)]).unwrap();
        let ok: ParameterMap = [("a".to_string(), 0.5), ("b".to_string(), 1.0)].into();
        assert!(space.check_membership(&ok).is_ok());

        let out: ParameterMap = [("a".to_string(), 1.5), ("b".to_string(), 0.0)].into();
        assert!(matches!(space.check_membership(&out), Err(Error::OutOfBounds { .. })));

        let short: ParameterMap = [("a".to_string(), 0.5)].into();
        assert!(matches!(
            space.check_membership(&short),
            Err(Error::ParameterCountMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_unit_round_trip_and_fixed_features() {
        let space = SearchSpace::new(vec![range("a", -2.0, 2.0), range("b", 10.0, 20.0)]).unwrap();
        let mut params = space.from_unit(&[0.5, 1.0]);
        assert!((params["a"] - 0.0).abs() < 1e-12);
        assert!((params["b"] - 20.0).abs() < 1e-12);

        let fixed: FixedFeatures = [("b".to_string(), 12.0)].into_iter().collect();
        fixed.apply(&mut params);
        assert_eq!(params["b"], 12.0);
        let unit = space.to_unit(&params).unwrap();
        assert!((unit[1] - 0.2).abs() < 1e-12);
    }
}
