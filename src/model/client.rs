use std::path::Path;

use serde::{Deserialize, Serialize};

use super::generation::{GenerationStrategy, ModelKind};
use super::{Measurement, ModelTrialStatus, PhaseBudget, RawData, SurrogateModel, TrialIndex};
use crate::error::{Error, Result};
use crate::objective::Objective;
use crate::sampler::Observation;
use crate::search_space::{FixedFeatures, ParameterMap, RangeParameter, SearchSpace};

/// Current snapshot schema version.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ModelTrial {
    parameters: ParameterMap,
    /// Generation step that produced the trial; `None` for attached trials.
    step: Option<usize>,
    status: ModelTrialStatus,
    data: Option<RawData>,
}

/// Experiment-state container and reference [`SurrogateModel`].
///
/// Holds the search space, the objectives, the generation strategy and the
/// trial log. Trials are indexed by position, so a [`TrialIndex`] is stable
/// for the lifetime of the experiment and survives a save/load cycle.
///
/// Fitted Gaussian-process models are cached inside the strategy and are
/// never written to snapshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExperimentClient {
    version: u32,
    search_space: SearchSpace,
    objectives: Vec<Objective>,
    strategy: GenerationStrategy,
    trials: Vec<ModelTrial>,
}

impl ExperimentClient {
    /// Creates a client over `search_space` driven by `strategy`.
    #[must_use]
    pub fn new(search_space: SearchSpace, objectives: Vec<Objective>, strategy: GenerationStrategy) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            search_space,
            objectives,
            strategy,
            trials: Vec::new(),
        }
    }

    /// Returns the live search space.
    #[must_use]
    pub fn search_space(&self) -> &SearchSpace {
        &self.search_space
    }

    /// Returns the objectives.
    #[must_use]
    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    /// Returns the generation strategy.
    #[must_use]
    pub fn strategy(&self) -> &GenerationStrategy {
        &self.strategy
    }

    /// Returns the number of trials the model knows, in any status.
    #[must_use]
    pub fn n_trials(&self) -> usize {
        self.trials.len()
    }

    /// Returns the parameters of a trial.
    #[must_use]
    pub fn trial_parameters(&self, index: TrialIndex) -> Option<&ParameterMap> {
        self.trial(index).map(|t| &t.parameters)
    }

    /// Returns the absorbed data of a completed trial.
    #[must_use]
    pub fn trial_data(&self, index: TrialIndex) -> Option<&RawData> {
        self.trial(index).and_then(|t| t.data.as_ref())
    }

    /// Builds the observation history seen by the samplers.
    ///
    /// Every objective is turned into a quantity to minimize and the
    /// objectives are summed. Standard errors combine in quadrature.
    #[must_use]
    pub fn observations(&self) -> Vec<Observation> {
        self.trials
            .iter()
            .filter(|t| t.status == ModelTrialStatus::Completed)
            .filter_map(|t| {
                let data = t.data.as_ref()?;
                let point = self.search_space.to_unit(&t.parameters)?;
                let mut value = 0.0;
                let mut variance: Option<f64> = None;
                for objective in &self.objectives {
                    let Measurement { value: v, sem } = *data.get(objective.name())?;
                    value += objective.direction().sign() * v;
                    if let Some(sem) = sem {
                        *variance.get_or_insert(0.0) += sem * sem;
                    }
                }
                Some(Observation {
                    point,
                    value,
                    sem: variance.map(f64::sqrt),
                })
            })
            .collect()
    }

    /// Loads a client from a JSON snapshot written by [`SurrogateModel::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let client: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(client)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn trial(&self, index: TrialIndex) -> Option<&ModelTrial> {
        self.trials.get(index.0 as usize)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn trial_mut(&mut self, index: TrialIndex) -> Result<&mut ModelTrial> {
        self.trials
            .get_mut(index.0 as usize)
            .ok_or(Error::UnknownTrial(index))
    }

    fn push(&mut self, parameters: ParameterMap, step: Option<usize>) -> TrialIndex {
        let index = TrialIndex(self.trials.len() as u64);
        self.trials.push(ModelTrial {
            parameters,
            step,
            status: ModelTrialStatus::Running,
            data: None,
        });
        index
    }
}

/// Rejects any trial that is not running.
fn ensure_running(index: TrialIndex, status: ModelTrialStatus) -> Result<()> {
    match status {
        ModelTrialStatus::Running => Ok(()),
        ModelTrialStatus::Completed => Err(Error::TrialAlreadyCompleted(index)),
        ModelTrialStatus::Failed => Err(Error::TrialAbandoned(index.0)),
    }
}

impl SurrogateModel for ExperimentClient {
    fn propose(&mut self, fixed: &FixedFeatures) -> Result<(ParameterMap, TrialIndex)> {
        let history = self.observations();
        let (parameters, step) = self.strategy.generate(&self.search_space, fixed, &history)?;
        let index = self.push(parameters.clone(), Some(step));
        trace_debug!(trial = index.0, step, "proposed candidate");
        Ok((parameters, index))
    }

    fn complete(&mut self, index: TrialIndex, data: RawData) -> Result<()> {
        let trial = self.trial(index).ok_or(Error::UnknownTrial(index))?;
        ensure_running(index, trial.status)?;
        if let Some(missing) = self
            .objectives
            .iter()
            .find(|o| !data.contains_key(o.name()))
        {
            return Err(Error::MissingObjective {
                trial: index.0,
                objective: missing.name().to_string(),
            });
        }

        let trial = self.trial_mut(index)?;
        trial.status = ModelTrialStatus::Completed;
        trial.data = Some(data);
        let step = trial.step;
        if let Some(step) = step {
            self.strategy.record_completion(step);
        }
        Ok(())
    }

    fn attach(&mut self, parameters: ParameterMap) -> Result<TrialIndex> {
        self.search_space.check_membership(&parameters)?;
        let index = self.push(parameters, None);
        trace_debug!(trial = index.0, "attached external trial");
        Ok(index)
    }

    fn mark_failed(&mut self, index: TrialIndex) -> Result<()> {
        let trial = self.trial_mut(index)?;
        ensure_running(index, trial.status)?;
        trial.status = ModelTrialStatus::Failed;
        Ok(())
    }

    fn trial_status(&self, index: TrialIndex) -> Option<ModelTrialStatus> {
        self.trial(index).map(|t| t.status)
    }

    fn current_phase_budget(&self) -> PhaseBudget {
        self.strategy.num_trials_to_gen_and_complete()
    }

    fn current_phase_kind(&self) -> ModelKind {
        self.strategy.current_step().model()
    }

    fn reduce_current_phase_budget(&mut self) -> bool {
        self.strategy.reduce_current_step_budget()
    }

    fn update_search_space_parameter(&mut self, definition: RangeParameter) -> Result<()> {
        self.search_space.update_parameter(definition)?;
        // Cached fits live in the old unit cube.
        self.strategy.clear_fitted_model();
        Ok(())
    }

    fn n_observations(&self) -> usize {
        self.trials
            .iter()
            .filter(|t| t.status == ModelTrialStatus::Completed)
            .count()
    }

    fn merge_from(&mut self, other: Self) {
        let ExperimentClient {
            version,
            search_space,
            objectives,
            strategy,
            trials,
        } = other;
        if self.search_space != search_space {
            // Cached fits live in the old unit cube.
            self.strategy.clear_fitted_model();
        }
        self.version = version;
        self.search_space = search_space;
        self.objectives = objectives;
        self.strategy.merge_from(strategy);
        self.trials = trials;
    }

    fn clear_fitted_model(&mut self) {
        self.strategy.clear_fitted_model();
    }

    fn has_fitted_model(&self) -> bool {
        self.strategy.has_fitted_model()
    }

    fn save(&self, path: &Path) -> Result<()> {
        // Write to a sibling temp file, then rename over the target.
        let parent = path.parent().unwrap_or(Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        let file = std::fs::File::create(&tmp_path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}
