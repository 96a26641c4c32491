//! Sampler trait and implementations for candidate generation.
//!
//! Each generation phase of a [`GenerationStrategy`](crate::model::GenerationStrategy)
//! delegates to one sampler:
//!
//! | Sampler | Algorithm | Phase |
//! |---------|-----------|-------|
//! | [`RandomSampler`] | Uniform random | Exploration |
//! | [`SobolSampler`] | Scrambled Sobol sequence | Exploration |
//! | [`GpSampler`] | Gaussian Process + Expected Improvement | Model-based |

mod common;
pub mod gp;
pub mod random;
pub mod sobol;

pub use common::Observation;
pub use gp::{FittedGp, GpSampler, GpSamplerBuilder};
pub use random::RandomSampler;
pub use sobol::SobolSampler;

use crate::search_space::{FixedFeatures, ParameterMap, SearchSpace};

/// Trait for pluggable candidate generation strategies.
///
/// A sampler produces one full candidate per call. The trait requires
/// `Send + Sync` so samplers can be shared with worker threads; samplers
/// with mutable state keep it behind a lock.
pub trait Sampler: Send + Sync {
    /// Samples a candidate from `space` with `fixed` parameters pinned.
    ///
    /// # Arguments
    ///
    /// * `space` - The search space to sample from.
    /// * `fixed` - Parameters that must take the given values.
    /// * `position` - Sequence position of this candidate within its phase.
    /// * `history` - Observations for informed sampling, in unit-cube coordinates.
    fn sample(
        &self,
        space: &SearchSpace,
        fixed: &FixedFeatures,
        position: u64,
        history: &[Observation],
    ) -> ParameterMap;
}
