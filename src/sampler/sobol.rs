//! Quasi-random sampler using Sobol low-discrepancy sequences.
//!
//! [`SobolSampler`] generates points from a Sobol sequence (scrambled via the
//! Burley 2020 algorithm) to fill the parameter space more uniformly than
//! pure random sampling. This makes it the default generator for the
//! initial exploration phase of an experiment.
//!
//! # How it works
//!
//! The candidate's position within the exploration phase selects the Sobol
//! sequence index, and each parameter maps to its own Sobol dimension (in
//! search-space order). The resulting point in \[0, 1) is scaled to the
//! parameter bounds.
//!
//! # Example
//!
//! ```
//! use sim_optimizer::sampler::{Sampler, SobolSampler};
//! use sim_optimizer::search_space::{FixedFeatures, RangeParameter, SearchSpace};
//!
//! let space = SearchSpace::new(vec![RangeParameter {
//!     name: "x".into(),
//!     lower: 0.0,
//!     upper: 1.0,
//!     is_fidelity: false,
//!     target_value: None,
//! }])
//! .unwrap();
//!
//! let sampler = SobolSampler::with_seed(42);
//! let candidate = sampler.sample(&space, &FixedFeatures::new(), 0, &[]);
//! assert!((0.0..=1.0).contains(&candidate["x"]));
//! ```

use sobol_burley::sample;

use super::common::materialize;
use super::{Observation, Sampler};
use crate::search_space::{FixedFeatures, ParameterMap, SearchSpace};

/// Quasi-random sampler using Sobol low-discrepancy sequences.
///
/// Sobol sequences are most effective in moderate dimensions (up to ~20).
/// The underlying generator supports up to 256 dimensions; extra
/// dimensions wrap around with a different scramble seed.
pub struct SobolSampler {
    seed: u32,
}

/// Number of dimensions supported by `sobol_burley`.
const MAX_DIMENSIONS: u32 = 256;

impl SobolSampler {
    /// Creates a new Sobol sampler with a default seed of 0.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Creates a new Sobol sampler with the given seed.
    ///
    /// Different seeds produce statistically independent Sobol sequences.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: seed as u32 }
    }

    /// Returns the point at `index` of the sequence in `n_dims` dimensions.
    #[allow(clippy::cast_possible_truncation)]
    fn point(&self, index: u64, n_dims: usize) -> Vec<f64> {
        let index = index as u32;
        (0..n_dims as u32)
            .map(|dim| {
                let seed = self.seed.wrapping_add(dim / MAX_DIMENSIONS);
                f64::from(sample(index, dim % MAX_DIMENSIONS, seed))
            })
            .collect()
    }
}

impl Default for SobolSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SobolSampler {
    fn sample(
        &self,
        space: &SearchSpace,
        fixed: &FixedFeatures,
        position: u64,
        _history: &[Observation],
    ) -> ParameterMap {
        let point = self.point(position, space.len());
        materialize(space, fixed, &point)
    }
}
