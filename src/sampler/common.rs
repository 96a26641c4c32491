//! Shared unit-cube utilities used across multiple samplers.

use crate::search_space::{FixedFeatures, ParameterMap, SearchSpace};

/// One observation as seen by a sampler.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    /// Parameter values normalized to `[0, 1]`, in dimension order.
    pub point: Vec<f64>,
    /// Scalarized objective value; lower is better.
    pub value: f64,
    /// Standard error of `value`, if known.
    pub sem: Option<f64>,
}

/// Draw a uniform point of the unit cube.
pub(crate) fn random_unit_point(rng: &mut fastrand::Rng, n_dims: usize) -> Vec<f64> {
    (0..n_dims)
        .map(|_| rng.f64())
        .collect()
}

/// Unit-cube coordinates of every pinned dimension, as `(dimension, value)`.
pub(crate) fn pinned_dimensions(space: &SearchSpace, fixed: &FixedFeatures) -> Vec<(usize, f64)> {
    space
        .parameters()
        .iter()
        .enumerate()
        .filter_map(|(i, p)| fixed.get(&p.name).map(|v| (i, p.normalize(v))))
        .collect()
}

/// Map a unit-cube point into the space and apply the fixed features.
pub(crate) fn materialize(space: &SearchSpace, fixed: &FixedFeatures, point: &[f64]) -> ParameterMap {
    let mut params = space.from_unit(point);
    fixed.apply(&mut params);
    params
}
