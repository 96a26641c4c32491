use std::sync::Arc;

use crate::error::Result;
use crate::model::{ExperimentClient, GenerationStrategy, ModelKind};
use crate::objective::{self, Objective};
use crate::parameter::{self, AnalyzedParameter, VaryingParameter};
use crate::search_space::SearchSpace;

use super::AdaptiveDriver;

/// A builder for an [`AdaptiveDriver`] backed by an [`ExperimentClient`].
///
/// Created via [`AdaptiveDriver::builder()`].
///
/// # Defaults
///
/// - `n_init`: 4 exploration trials
/// - `enforce_n_init`: `false`
/// - Exploration generator: [`ModelKind::Sobol`]
/// - Seed: random
/// - EI candidates: 1000
/// - Noise variance: `1e-6`
///
/// # Examples
///
/// ```
/// use sim_optimizer::parameter::VaryingParameter;
/// use sim_optimizer::{AdaptiveDriver, ModelKind, Objective};
///
/// let driver = AdaptiveDriver::builder(
///     vec![VaryingParameter::new("x", 0.0, 1.0), VaryingParameter::new("y", -2.0, 2.0)],
///     vec![Objective::new("f")],
/// )
/// .n_init(8)
/// .exploration(ModelKind::Random)
/// .seed(42)
/// .build()
/// .unwrap();
///
/// assert_eq!(driver.n_init(), 8);
/// ```
#[derive(Clone, Debug)]
pub struct DriverBuilder {
    varying_parameters: Vec<VaryingParameter>,
    objectives: Vec<Objective>,
    analyzed_parameters: Vec<AnalyzedParameter>,
    n_init: usize,
    enforce_n_init: bool,
    seed: Option<u64>,
    n_candidates: usize,
    noise_variance: f64,
    exploration: ModelKind,
}

impl DriverBuilder {
    pub(super) fn new(varying_parameters: Vec<VaryingParameter>, objectives: Vec<Objective>) -> Self {
        Self {
            varying_parameters,
            objectives,
            analyzed_parameters: Vec::new(),
            n_init: 4,
            enforce_n_init: false,
            seed: None,
            n_candidates: 1000,
            noise_variance: 1e-6,
            exploration: ModelKind::Sobol,
        }
    }

    /// Set the quantities recorded alongside the objectives.
    #[must_use]
    pub fn analyzed_parameters(mut self, analyzed: Vec<AnalyzedParameter>) -> Self {
        self.analyzed_parameters = analyzed;
        self
    }

    /// Set the number of exploration trials before model-based generation.
    #[must_use]
    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Keep the exploration budget untouched when external data is told.
    #[must_use]
    pub fn enforce_n_init(mut self, enforce: bool) -> Self {
        self.enforce_n_init = enforce;
        self
    }

    /// Set the seed of every generator.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the number of random candidates scored by Expected Improvement.
    #[must_use]
    pub fn n_candidates(mut self, n: usize) -> Self {
        self.n_candidates = n;
        self
    }

    /// Set the base observation noise variance of the Gaussian process.
    #[must_use]
    pub fn noise_variance(mut self, v: f64) -> Self {
        self.noise_variance = v;
        self
    }

    /// Set the generator of the exploration phase.
    #[must_use]
    pub fn exploration(mut self, kind: ModelKind) -> Self {
        self.exploration = kind;
        self
    }

    /// Validate the configuration and build the driver.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the parameters or objectives are
    /// empty, malformed, or not uniquely named.
    pub fn build(self) -> Result<AdaptiveDriver<ExperimentClient>> {
        parameter::validate_all(&self.varying_parameters)?;
        objective::validate_all(&self.objectives)?;

        let space = SearchSpace::new(
            self.varying_parameters
                .iter()
                .map(VaryingParameter::to_range)
                .collect(),
        )?;
        let seed = self.seed.unwrap_or_else(|| fastrand::u64(..));
        let strategy = GenerationStrategy::two_phase(self.exploration, self.n_init, seed)
            .n_candidates(self.n_candidates)
            .noise_variance(self.noise_variance);
        let model = ExperimentClient::new(space, self.objectives.clone(), strategy);

        trace_info!(
            n_parameters = self.varying_parameters.len(),
            n_objectives = self.objectives.len(),
            n_init = self.n_init,
            seed,
            "adaptive driver created"
        );

        let mut driver = AdaptiveDriver::assemble(
            Arc::from(self.varying_parameters),
            Arc::from(self.objectives),
            model,
        );
        driver.analyzed_parameters = self.analyzed_parameters;
        driver.n_init = self.n_init;
        driver.enforce_n_init = self.enforce_n_init;
        Ok(driver)
    }
}
