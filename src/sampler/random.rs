//! Random sampler implementation.

use parking_lot::Mutex;

use super::common::{materialize, random_unit_point};
use super::{Observation, Sampler};
use crate::search_space::{FixedFeatures, ParameterMap, SearchSpace};

/// A simple random sampler that samples uniformly within the bounds.
///
/// This sampler ignores the history. It serves as a baseline exploration
/// phase and as the fallback of the model-based sampler when too few
/// observations exist to fit a model.
///
/// # Examples
///
/// ```
/// use sim_optimizer::sampler::RandomSampler;
///
/// // Create with default RNG
/// let sampler = RandomSampler::new();
///
/// // Create with a fixed seed for reproducibility
/// let sampler = RandomSampler::with_seed(42);
/// ```
pub struct RandomSampler {
    rng: Mutex<fastrand::Rng>,
}

impl RandomSampler {
    /// Creates a new random sampler with a default random seed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Creates a new random sampler with a fixed seed for reproducibility.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }
}

impl Default for RandomSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for RandomSampler {
    fn sample(
        &self,
        space: &SearchSpace,
        fixed: &FixedFeatures,
        _position: u64,
        _history: &[Observation],
    ) -> ParameterMap {
        let point = random_unit_point(&mut self.rng.lock(), space.len());
        materialize(space, fixed, &point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_space::RangeParameter;

    fn space() -> SearchSpace {
        SearchSpace::new(vec![
            RangeParameter {
                name: "x".into(),
                lower: -5.0,
                upper: 5.0,
                is_fidelity: false,
                target_value: None,
            },
            RangeParameter {
                name: "y".into(),
                lower: 100.0,
                upper: 200.0,
                is_fidelity: false,
                target_value: None,
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_random_sampler_within_bounds() {
        let sampler = RandomSampler::with_seed(42);
        let space = space();
        for i in 0..100 {
            let params = sampler.sample(&space, &FixedFeatures::new(), i, &[]);
            assert!((-5.0..=5.0).contains(&params["x"]));
            assert!((100.0..=200.0).contains(&params["y"]));
        }
    }

    #[test]
    fn test_random_sampler_respects_fixed() {
        let sampler = RandomSampler::with_seed(1);
        let mut fixed = FixedFeatures::new();
        fixed.insert("y", 150.0);
        for i in 0..20 {
            let params = sampler.sample(&space(), &fixed, i, &[]);
            assert_eq!(params["y"], 150.0);
        }
    }

    #[test]
    fn test_random_sampler_reproducible() {
        let a = RandomSampler::with_seed(7);
        let b = RandomSampler::with_seed(7);
        let space = space();
        for i in 0..10 {
            assert_eq!(
                a.sample(&space, &FixedFeatures::new(), i, &[]),
                b.sample(&space, &FixedFeatures::new(), i, &[])
            );
        }
    }
}
