//! The evaluation collaborator.
//!
//! An [`Evaluator`] runs the expensive simulation for one trial. The driver
//! never calls it; the caller submits records, polls the handles, and tells
//! the driver once results are in. Timeouts and cancellation belong to the
//! evaluator.
//!
//! [`FnEvaluator`] adapts a closure into an evaluator that runs each
//! submission on its own thread.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::model::Measurement;
use crate::trial::{AttrValue, TrialRecord};

/// Results of one successful simulation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvaluationOutcome {
    objectives: BTreeMap<String, Measurement>,
    analyzed: BTreeMap<String, AttrValue>,
}

impl EvaluationOutcome {
    /// Creates an empty outcome.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an objective value.
    #[must_use]
    pub fn objective(mut self, name: impl Into<String>, value: f64) -> Self {
        self.objectives
            .insert(name.into(), Measurement { value, sem: None });
        self
    }

    /// Adds an objective value with its standard error of the mean.
    #[must_use]
    pub fn objective_with_sem(mut self, name: impl Into<String>, value: f64, sem: f64) -> Self {
        self.objectives.insert(
            name.into(),
            Measurement {
                value,
                sem: Some(sem),
            },
        );
        self
    }

    /// Adds the value of an analyzed parameter.
    #[must_use]
    pub fn analyzed(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.analyzed.insert(name.into(), value.into());
        self
    }

    /// Returns the objective measurements.
    #[must_use]
    pub fn objectives(&self) -> &BTreeMap<String, Measurement> {
        &self.objectives
    }

    /// Returns the analyzed values.
    #[must_use]
    pub fn analyzed_values(&self) -> &BTreeMap<String, AttrValue> {
        &self.analyzed
    }
}

/// Status of a submitted evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum EvaluationStatus {
    /// Still running.
    Running,
    /// Finished with results.
    Succeeded(EvaluationOutcome),
    /// Finished without usable results.
    Failed(String),
    /// Stopped after exceeding its time limit.
    TimedOut,
}

impl EvaluationStatus {
    /// Returns `true` unless the evaluation is still running.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(self, EvaluationStatus::Running)
    }
}

/// Runs simulations for trial records.
pub trait Evaluator {
    /// Identifies one submitted evaluation.
    type Handle;

    /// Starts evaluating `trial`.
    ///
    /// # Errors
    ///
    /// Returns an error if the evaluation cannot be started.
    fn submit(&mut self, trial: &TrialRecord) -> Result<Self::Handle>;

    /// Reports the status of a submitted evaluation. A finished status is
    /// reported once; later polls of the same handle report
    /// [`EvaluationStatus::Failed`].
    fn poll(&mut self, handle: &Self::Handle) -> EvaluationStatus;
}

/// Results written by worker threads.
#[derive(Default)]
struct ResultTable {
    finished: HashMap<usize, EvaluationStatus>,
    /// Timed-out handles whose late results are dropped.
    abandoned: HashSet<usize>,
}

impl ResultTable {
    fn store(&mut self, handle: usize, status: EvaluationStatus) {
        if !self.abandoned.remove(&handle) {
            self.finished.insert(handle, status);
        }
    }
}

/// Message carried by a worker panic.
fn panic_message(payload: &(dyn core::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "evaluation panicked".to_string())
}

/// An [`Evaluator`] running a closure on a worker thread per submission.
///
/// # Examples
///
/// ```
/// use sim_optimizer::evaluator::{EvaluationOutcome, EvaluationStatus, Evaluator, FnEvaluator};
/// use sim_optimizer::parameter::VaryingParameter;
/// use sim_optimizer::{Objective, TrialRecord};
///
/// let mut evaluator = FnEvaluator::new(|trial: &TrialRecord| {
///     let x = trial.value_of("x").unwrap_or_default();
///     Ok::<_, String>(EvaluationOutcome::new().objective("f", x * x))
/// });
///
/// let trial = TrialRecord::with_values(
///     vec![VaryingParameter::new("x", 0.0, 1.0)].into(),
///     vec![Objective::new("f")].into(),
///     vec![0.5],
/// )
/// .unwrap();
/// let handle = evaluator.submit(&trial).unwrap();
/// let status = loop {
///     let status = evaluator.poll(&handle);
///     if status.is_finished() {
///         break status;
///     }
///     std::thread::yield_now();
/// };
/// assert!(matches!(status, EvaluationStatus::Succeeded(_)));
/// ```
pub struct FnEvaluator<F> {
    func: Arc<F>,
    results: Arc<Mutex<ResultTable>>,
    started: HashMap<usize, Instant>,
    timeout: Option<Duration>,
    next_handle: usize,
}

impl<F> FnEvaluator<F> {
    /// Wraps `func`.
    #[must_use]
    pub fn new(func: F) -> Self {
        Self {
            func: Arc::new(func),
            results: Arc::new(Mutex::new(ResultTable::default())),
            started: HashMap::new(),
            timeout: None,
            next_handle: 0,
        }
    }

    /// Reports evaluations still running after `timeout` as timed out.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl<F, E> Evaluator for FnEvaluator<F>
where
    F: Fn(&TrialRecord) -> core::result::Result<EvaluationOutcome, E> + Send + Sync + 'static,
    E: ToString,
{
    type Handle = usize;

    fn submit(&mut self, trial: &TrialRecord) -> Result<usize> {
        let handle = self.next_handle;
        self.next_handle += 1;

        let func = Arc::clone(&self.func);
        let results = Arc::clone(&self.results);
        let trial = trial.clone();
        std::thread::Builder::new()
            .name(format!("evaluation-{handle}"))
            .spawn(move || {
                let status = match catch_unwind(AssertUnwindSafe(|| func(&trial))) {
                    Ok(Ok(outcome)) => EvaluationStatus::Succeeded(outcome),
                    Ok(Err(e)) => EvaluationStatus::Failed(e.to_string()),
                    Err(payload) => EvaluationStatus::Failed(panic_message(payload.as_ref())),
                };
                results.lock().store(handle, status);
            })
            .map_err(|e| Error::Evaluation(e.to_string()))?;

        self.started.insert(handle, Instant::now());
        Ok(handle)
    }

    fn poll(&mut self, handle: &usize) -> EvaluationStatus {
        let Some(&started) = self.started.get(handle) else {
            return EvaluationStatus::Failed(format!("unknown evaluation handle {handle}"));
        };
        let mut results = self.results.lock();
        if let Some(status) = results.finished.remove(handle) {
            self.started.remove(handle);
            return status;
        }
        if let Some(timeout) = self.timeout
            && started.elapsed() >= timeout
        {
            results.abandoned.insert(*handle);
            self.started.remove(handle);
            return EvaluationStatus::TimedOut;
        }
        EvaluationStatus::Running
    }
}
