//! The caller-side run loop.
//!
//! [`Exploration`] keeps up to `sim_workers` evaluations in flight: it asks
//! the driver for new trials, submits them to the [`Evaluator`], polls the
//! running ones, tells finished batches back to the driver and hands the
//! driver to the checkpointer after each tell. It stops once `max_evals`
//! trials have been dispatched and all of them have finished.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use sim_optimizer::evaluator::{EvaluationOutcome, FnEvaluator};
//! use sim_optimizer::exploration::Exploration;
//! use sim_optimizer::parameter::VaryingParameter;
//! use sim_optimizer::{AdaptiveDriver, Objective, TrialRecord};
//!
//! let driver = AdaptiveDriver::builder(
//!     vec![VaryingParameter::new("x", -2.0, 2.0)],
//!     vec![Objective::new("f")],
//! )
//! .n_init(3)
//! .n_candidates(64)
//! .seed(1)
//! .build()
//! .unwrap();
//!
//! let evaluator = FnEvaluator::new(|t: &TrialRecord| {
//!     let x = t.value_of("x").unwrap_or_default();
//!     Ok::<_, String>(EvaluationOutcome::new().objective("f", x * x))
//! });
//!
//! let mut exploration = Exploration::new(driver, evaluator)
//!     .max_evals(6)
//!     .sim_workers(2)
//!     .poll_interval(Duration::from_millis(1));
//! exploration.run().unwrap();
//!
//! assert_eq!(exploration.history().len(), 6);
//! assert!(exploration.best_trial().is_some());
//! ```

use std::time::Duration;

use crate::checkpoint::ModelCheckpointer;
use crate::driver::AdaptiveDriver;
use crate::error::Result;
use crate::evaluator::{EvaluationOutcome, EvaluationStatus, Evaluator};
use crate::model::{ExperimentClient, SurrogateModel};
use crate::objective::ObjectiveEvaluation;
use crate::trial::TrialRecord;
use crate::types::TrialState;

/// What one pass of the loop achieved.
enum Progress {
    /// Everything dispatched has finished.
    Done,
    /// At least one evaluation finished.
    Advanced,
    /// Nothing finished; wait before polling again.
    Idle,
}

/// Runs an experiment end to end with a driver, an evaluator and an
/// optional checkpointer.
pub struct Exploration<E: Evaluator, M: SurrogateModel = ExperimentClient> {
    driver: AdaptiveDriver<M>,
    evaluator: E,
    max_evals: usize,
    sim_workers: usize,
    poll_interval: Duration,
    checkpointer: Option<ModelCheckpointer>,
    running: Vec<(TrialRecord, E::Handle)>,
    history: Vec<TrialRecord>,
    n_dispatched: usize,
}

impl<E: Evaluator, M: SurrogateModel> Exploration<E, M> {
    /// Creates a loop over `driver` and `evaluator`.
    ///
    /// Defaults: 10 evaluations, one worker, 100 ms between polls, no
    /// checkpointing.
    #[must_use]
    pub fn new(driver: AdaptiveDriver<M>, evaluator: E) -> Self {
        Self {
            driver,
            evaluator,
            max_evals: 10,
            sim_workers: 1,
            poll_interval: Duration::from_millis(100),
            checkpointer: None,
            running: Vec::new(),
            history: Vec::new(),
            n_dispatched: 0,
        }
    }

    /// Sets the number of trials to dispatch in total.
    #[must_use]
    pub fn max_evals(mut self, n: usize) -> Self {
        self.max_evals = n;
        self
    }

    /// Sets the number of evaluations kept in flight. Zero is treated as one.
    #[must_use]
    pub fn sim_workers(mut self, n: usize) -> Self {
        self.sim_workers = n.max(1);
        self
    }

    /// Sets the pause between polls when nothing finished.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Saves model snapshots with `checkpointer` after each tell.
    #[must_use]
    pub fn checkpointer(mut self, checkpointer: ModelCheckpointer) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// Returns the driver.
    #[must_use]
    pub fn driver(&self) -> &AdaptiveDriver<M> {
        &self.driver
    }

    /// Consumes the loop, returning the driver.
    #[must_use]
    pub fn into_driver(self) -> AdaptiveDriver<M> {
        self.driver
    }

    /// Returns every finished trial, evaluated or failed, in finishing order.
    #[must_use]
    pub fn history(&self) -> &[TrialRecord] {
        &self.history
    }

    /// Returns the completed trial with the best value of the first objective.
    #[must_use]
    pub fn best_trial(&self) -> Option<&TrialRecord> {
        let objective = self.driver.objectives().first()?;
        let sign = objective.direction().sign();
        self.history
            .iter()
            .filter(|t| t.state() == TrialState::Complete)
            .filter_map(|t| t.evaluation(objective.name()).map(|e| (t, sign * e.value())))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(t, _)| t)
    }

    /// Tells externally obtained records, which take the external-attachment
    /// path when they carry no correlation id.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if the batch is rejected, or a checkpoint
    /// error.
    pub fn attach_evaluations(&mut self, mut trials: Vec<TrialRecord>) -> Result<()> {
        self.driver.tell(&mut trials)?;
        self.history.extend(trials);
        self.checkpoint()
    }

    /// Runs until every evaluation has finished, sleeping between idle polls.
    ///
    /// # Errors
    ///
    /// Returns the first driver, evaluator or checkpoint error.
    pub fn run(&mut self) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "exploration",
            max_evals = self.max_evals,
            sim_workers = self.sim_workers
        )
        .entered();

        loop {
            match self.step()? {
                Progress::Done => break,
                Progress::Advanced => {}
                Progress::Idle => std::thread::sleep(self.poll_interval),
            }
        }
        trace_info!(n_finished = self.history.len(), "exploration finished");
        Ok(())
    }

    /// Like [`run`](Self::run), but waits between idle polls with
    /// [`tokio::time::sleep`].
    ///
    /// # Errors
    ///
    /// Returns the first driver, evaluator or checkpoint error.
    #[cfg(feature = "async")]
    pub async fn run_async(&mut self) -> Result<()> {
        loop {
            match self.step()? {
                Progress::Done => break,
                Progress::Advanced => {}
                Progress::Idle => tokio::time::sleep(self.poll_interval).await,
            }
        }
        trace_info!(n_finished = self.history.len(), "exploration finished");
        Ok(())
    }

    fn step(&mut self) -> Result<Progress> {
        self.dispatch()?;
        if self.running.is_empty() {
            return Ok(Progress::Done);
        }
        if self.collect()? {
            Ok(Progress::Advanced)
        } else {
            Ok(Progress::Idle)
        }
    }

    /// Fills free worker slots with new trials.
    fn dispatch(&mut self) -> Result<()> {
        let free = self.sim_workers.saturating_sub(self.running.len());
        let n = free.min(self.max_evals.saturating_sub(self.n_dispatched));
        if n == 0 {
            return Ok(());
        }
        let placeholders = self.driver.new_trials(n);
        let trials = self.driver.ask(placeholders)?;
        self.n_dispatched += n;
        let mut trials = trials.into_iter();
        let mut rejected = None;
        for trial in trials.by_ref() {
            match self.evaluator.submit(&trial) {
                Ok(handle) => self.running.push((trial, handle)),
                Err(e) => {
                    rejected = Some((trial, e));
                    break;
                }
            }
        }
        if let Some((trial, e)) = rejected {
            let mut abandoned: Vec<_> = core::iter::once(trial).chain(trials).collect();
            self.driver.report_failed(&mut abandoned)?;
            self.history.append(&mut abandoned);
            return Err(e);
        }
        Ok(())
    }

    /// Polls running evaluations and absorbs the finished ones. Returns
    /// whether any finished.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn collect(&mut self) -> Result<bool> {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (mut trial, handle) in std::mem::take(&mut self.running) {
            match self.evaluator.poll(&handle) {
                EvaluationStatus::Running => self.running.push((trial, handle)),
                EvaluationStatus::Succeeded(outcome) => match record_outcome(&mut trial, &outcome) {
                    Ok(()) => succeeded.push(trial),
                    Err(reason) => {
                        trace_info!(trial = trial.label(), reason = %reason, "evaluation incomplete");
                        failed.push(trial);
                    }
                },
                EvaluationStatus::Failed(reason) => {
                    trace_info!(trial = trial.label(), reason = %reason, "evaluation failed");
                    failed.push(trial);
                }
                EvaluationStatus::TimedOut => {
                    trace_info!(trial = trial.label(), "evaluation timed out");
                    failed.push(trial);
                }
            }
        }

        let finished = !succeeded.is_empty() || !failed.is_empty();
        if !failed.is_empty() {
            self.driver.report_failed(&mut failed)?;
            self.history.append(&mut failed);
        }
        if !succeeded.is_empty() {
            self.driver.tell(&mut succeeded)?;
            self.history.append(&mut succeeded);
            self.checkpoint()?;
        }
        Ok(finished)
    }

    fn checkpoint(&mut self) -> Result<()> {
        if let Some(checkpointer) = &mut self.checkpointer {
            checkpointer.maybe_save(&self.driver)?;
        }
        Ok(())
    }
}

/// Copies an outcome onto its record. Fails with the name of the first
/// objective the outcome does not cover.
fn record_outcome(trial: &mut TrialRecord, outcome: &EvaluationOutcome) -> core::result::Result<(), String> {
    let objectives = trial.objectives().to_vec();
    for objective in &objectives {
        let Some(m) = outcome.objectives().get(objective.name()) else {
            return Err(format!("missing objective '{}'", objective.name()));
        };
        let evaluation = match m.sem {
            Some(sem) => ObjectiveEvaluation::with_sem(objective, m.value, sem),
            None => ObjectiveEvaluation::new(objective, m.value),
        };
        trial
            .complete_evaluation(evaluation)
            .map_err(|e| e.to_string())?;
    }
    for (name, value) in outcome.analyzed_values() {
        trial.set_metadata(name.clone(), value.clone());
    }
    Ok(())
}
