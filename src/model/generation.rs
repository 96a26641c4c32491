//! Multi-phase generation strategy.
//!
//! A [`GenerationStrategy`] is an ordered list of [`GenerationStep`]s. Each
//! step names the kind of generator it uses and how many trials it should
//! produce before the strategy moves on. The default strategy is a
//! quasi-random exploration phase of `n_init` trials followed by an
//! unlimited Gaussian-process phase.
//!
//! Transitions are lazy: the strategy only moves to the next step when a
//! new candidate is requested and the current step has generated its full
//! budget. Until then the exhausted step stays current and reports zero
//! trials left to generate.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::PhaseBudget;
use crate::error::{Error, Result};
use crate::sampler::{FittedGp, GpSampler, Observation, RandomSampler, Sampler, SobolSampler};
use crate::search_space::{FixedFeatures, ParameterMap, SearchSpace};

/// Generator used by a generation step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    /// Uniform random exploration.
    Random,
    /// Scrambled Sobol quasi-random exploration.
    Sobol,
    /// Gaussian process with Expected Improvement.
    GpEi,
}

impl ModelKind {
    /// Returns `true` for undirected exploration generators.
    #[must_use]
    pub fn is_exploratory(self) -> bool {
        matches!(self, ModelKind::Random | ModelKind::Sobol)
    }
}

/// A trial count that may be unlimited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Budget {
    /// A fixed number of trials.
    Limited(usize),
    /// No limit.
    Unlimited,
}

impl Budget {
    /// Returns `true` if at least one more trial fits in the budget.
    #[must_use]
    pub fn has_remaining(self) -> bool {
        match self {
            Budget::Limited(n) => n > 0,
            Budget::Unlimited => true,
        }
    }
}

/// One phase of a [`GenerationStrategy`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationStep {
    model: ModelKind,
    num_trials: Budget,
    min_trials_observed: usize,
    n_generated: usize,
    n_completed: usize,
    #[serde(skip)]
    fitted_model: Option<Arc<FittedGp>>,
}

impl GenerationStep {
    /// Creates a step generating `num_trials` trials with `model`.
    #[must_use]
    pub fn new(model: ModelKind, num_trials: Budget) -> Self {
        Self {
            model,
            num_trials,
            min_trials_observed: 0,
            n_generated: 0,
            n_completed: 0,
            fitted_model: None,
        }
    }

    /// Requires `n` trials of this step to be completed before moving on.
    #[must_use]
    pub fn min_trials_observed(mut self, n: usize) -> Self {
        self.min_trials_observed = n;
        self
    }

    /// Returns the generator kind.
    #[must_use]
    pub fn model(&self) -> ModelKind {
        self.model
    }

    /// Returns the configured trial budget.
    #[must_use]
    pub fn num_trials(&self) -> Budget {
        self.num_trials
    }

    /// Returns the number of trials generated by this step.
    #[must_use]
    pub fn n_generated(&self) -> usize {
        self.n_generated
    }

    /// Returns the number of this step's trials that were completed.
    #[must_use]
    pub fn n_completed(&self) -> usize {
        self.n_completed
    }

    /// Returns the fitted model cached by this step, if any.
    #[must_use]
    pub fn fitted_model(&self) -> Option<&Arc<FittedGp>> {
        self.fitted_model.as_ref()
    }

    /// Returns `(to_generate, to_complete)` for this step.
    #[must_use]
    pub fn num_trials_to_gen_and_complete(&self) -> PhaseBudget {
        let to_generate = match self.num_trials {
            Budget::Limited(n) => Budget::Limited(n.saturating_sub(self.n_generated)),
            Budget::Unlimited => Budget::Unlimited,
        };
        PhaseBudget {
            to_generate,
            to_complete: self.min_trials_observed.saturating_sub(self.n_completed),
        }
    }

    fn is_exhausted(&self) -> bool {
        !self.num_trials_to_gen_and_complete().to_generate.has_remaining()
    }

    /// Adopts the counters of `other`, keeping this step's fitted model.
    fn merge_from(&mut self, other: GenerationStep) {
        let fitted_model = self.fitted_model.take();
        *self = GenerationStep {
            fitted_model,
            ..other
        };
    }
}

/// Ordered generation phases plus the cached fitted model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationStrategy {
    steps: Vec<GenerationStep>,
    current: usize,
    seed: u64,
    n_candidates: usize,
    noise_variance: f64,
    #[serde(skip)]
    model: Option<Arc<FittedGp>>,
}

/// Default number of candidate points for EI optimization.
const DEFAULT_N_CANDIDATES: usize = 1000;
/// Default observation noise variance.
const DEFAULT_NOISE_VAR: f64 = 1e-6;

impl GenerationStrategy {
    /// Creates a strategy from explicit steps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProposalFailed`] if `steps` is empty.
    pub fn new(steps: Vec<GenerationStep>, seed: u64) -> Result<Self> {
        if steps.is_empty() {
            return Err(Error::ProposalFailed(
                "generation strategy needs at least one step".to_string(),
            ));
        }
        Ok(Self {
            steps,
            current: 0,
            seed,
            n_candidates: DEFAULT_N_CANDIDATES,
            noise_variance: DEFAULT_NOISE_VAR,
            model: None,
        })
    }

    /// Creates the default two-phase strategy: `n_init` trials of
    /// `exploration`, then unlimited GP-based optimization.
    #[must_use]
    pub fn two_phase(exploration: ModelKind, n_init: usize, seed: u64) -> Self {
        Self {
            steps: vec![
                GenerationStep::new(exploration, Budget::Limited(n_init)),
                GenerationStep::new(ModelKind::GpEi, Budget::Unlimited),
            ],
            current: 0,
            seed,
            n_candidates: DEFAULT_N_CANDIDATES,
            noise_variance: DEFAULT_NOISE_VAR,
            model: None,
        }
    }

    /// Sets the number of EI candidates used by GP steps.
    #[must_use]
    pub fn n_candidates(mut self, n: usize) -> Self {
        self.n_candidates = n;
        self
    }

    /// Sets the base noise variance used by GP steps.
    #[must_use]
    pub fn noise_variance(mut self, v: f64) -> Self {
        self.noise_variance = v;
        self
    }

    /// Returns all steps.
    #[must_use]
    pub fn steps(&self) -> &[GenerationStep] {
        &self.steps
    }

    /// Returns the position of the current step.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Returns the current step.
    #[must_use]
    pub fn current_step(&self) -> &GenerationStep {
        &self.steps[self.current]
    }

    /// Returns the top-level cached model, if any.
    #[must_use]
    pub fn model(&self) -> Option<&Arc<FittedGp>> {
        self.model.as_ref()
    }

    /// Returns `(to_generate, to_complete)` for the current step.
    #[must_use]
    pub fn num_trials_to_gen_and_complete(&self) -> PhaseBudget {
        self.current_step().num_trials_to_gen_and_complete()
    }

    /// Decrements the current step's budget by one if it is exploratory and
    /// still has trials to generate. Returns whether the budget changed.
    pub fn reduce_current_step_budget(&mut self) -> bool {
        let step = &mut self.steps[self.current];
        if !step.model.is_exploratory() {
            return false;
        }
        match step.num_trials {
            Budget::Limited(n) if n > step.n_generated => {
                step.num_trials = Budget::Limited(n - 1);
                true
            }
            _ => false,
        }
    }

    /// Records that a trial generated by step `step` was completed.
    pub(crate) fn record_completion(&mut self, step: usize) {
        if let Some(step) = self.steps.get_mut(step) {
            step.n_completed += 1;
        }
    }

    /// Drops every fitted-model artifact.
    pub fn clear_fitted_model(&mut self) {
        for step in &mut self.steps {
            step.fitted_model = None;
        }
        self.model = None;
    }

    /// Returns `true` if a fitted-model artifact is attached.
    #[must_use]
    pub fn has_fitted_model(&self) -> bool {
        self.model.is_some() || self.steps.iter().any(|s| s.fitted_model.is_some())
    }

    /// Adopts the bookkeeping of `other`, keeping this strategy's fitted models.
    pub(crate) fn merge_from(&mut self, other: GenerationStrategy) {
        let GenerationStrategy {
            steps,
            current,
            seed,
            n_candidates,
            noise_variance,
            model: _,
        } = other;
        let mut old_steps = std::mem::take(&mut self.steps).into_iter();
        self.steps = steps
            .into_iter()
            .map(|incoming| match old_steps.next() {
                Some(mut local) => {
                    local.merge_from(incoming);
                    local
                }
                None => incoming,
            })
            .collect();
        self.current = current.min(self.steps.len().saturating_sub(1));
        self.seed = seed;
        self.n_candidates = n_candidates;
        self.noise_variance = noise_variance;
    }

    /// Moves past exhausted steps.
    fn advance(&mut self) -> Result<()> {
        while self.steps[self.current].is_exhausted() {
            let budget = self.num_trials_to_gen_and_complete();
            if budget.to_complete > 0 {
                let step = self.current_step();
                return Err(Error::DataRequired {
                    required: step.min_trials_observed,
                    observed: step.n_completed,
                });
            }
            if self.current + 1 >= self.steps.len() {
                return Err(Error::ProposalFailed(
                    "all generation steps are exhausted".to_string(),
                ));
            }
            self.current += 1;
            trace_info!(
                step = self.current,
                model = ?self.steps[self.current].model,
                "moved to next generation step"
            );
        }
        Ok(())
    }

    /// Generates one candidate. Returns the parameters and the index of the
    /// step that generated them.
    pub(crate) fn generate(
        &mut self,
        space: &SearchSpace,
        fixed: &FixedFeatures,
        history: &[Observation],
    ) -> Result<(ParameterMap, usize)> {
        self.advance()?;

        let total_generated: usize = self.steps.iter().map(|s| s.n_generated).sum();
        let position = self.steps[self.current].n_generated as u64;
        let seed = self.seed.wrapping_add(total_generated as u64);

        let parameters = match self.steps[self.current].model {
            ModelKind::Sobol => SobolSampler::with_seed(self.seed).sample(space, fixed, position, history),
            ModelKind::Random => RandomSampler::with_seed(seed).sample(space, fixed, position, history),
            ModelKind::GpEi => {
                let sampler = GpSampler::builder()
                    .n_candidates(self.n_candidates)
                    .noise_variance(self.noise_variance)
                    .seed(seed)
                    .build();
                let model = self.fitted_for(&sampler, history);
                sampler.sample_with(model.as_deref(), space, fixed)
            }
        };

        self.steps[self.current].n_generated += 1;
        Ok((parameters, self.current))
    }

    /// Returns the cached model if it was fitted on the current history,
    /// refitting otherwise.
    fn fitted_for(&mut self, sampler: &GpSampler, history: &[Observation]) -> Option<Arc<FittedGp>> {
        let step = &mut self.steps[self.current];
        if let Some(model) = &step.fitted_model
            && model.n_observations() == history.len()
        {
            return Some(Arc::clone(model));
        }
        let model = sampler.fit(history).map(Arc::new);
        trace_debug!(
            n_observations = history.len(),
            fitted = model.is_some(),
            "refitted surrogate model"
        );
        step.fitted_model.clone_from(&model);
        self.model.clone_from(&model);
        model
    }
}
