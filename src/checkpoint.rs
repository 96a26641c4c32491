//! Periodic snapshots of the surrogate model.

use std::path::{Path, PathBuf};

use crate::driver::AdaptiveDriver;
use crate::error::Result;
use crate::model::SurrogateModel;

/// Default number of completed trials between snapshots.
const DEFAULT_PERIOD: usize = 5;

/// Writes `model_at_eval_<n>.json` snapshots every `period` completed trials.
///
/// The driver never saves itself; the caller invokes
/// [`maybe_save`](Self::maybe_save) after each `tell`.
///
/// # Examples
///
/// ```no_run
/// use sim_optimizer::checkpoint::ModelCheckpointer;
///
/// let checkpointer = ModelCheckpointer::new("model_history").period(10);
/// assert_eq!(checkpointer.period_len(), 10);
/// ```
#[derive(Clone, Debug)]
pub struct ModelCheckpointer {
    dir: PathBuf,
    period: usize,
    last_saved: usize,
}

impl Default for ModelCheckpointer {
    fn default() -> Self {
        Self::new("model_history")
    }
}

impl ModelCheckpointer {
    /// Creates a checkpointer writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            period: DEFAULT_PERIOD,
            last_saved: 0,
        }
    }

    /// Sets the number of completed trials between snapshots. Zero is
    /// treated as one.
    #[must_use]
    pub fn period(mut self, period: usize) -> Self {
        self.period = period.max(1);
        self
    }

    /// Returns the snapshot directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the snapshot period.
    #[must_use]
    pub fn period_len(&self) -> usize {
        self.period
    }

    /// Path of the snapshot taken after `n_completed` trials.
    #[must_use]
    pub fn path_for(&self, n_completed: usize) -> PathBuf {
        self.dir.join(format!("model_at_eval_{n_completed}.json"))
    }

    /// Saves a snapshot if at least `period` trials completed since the last one.
    ///
    /// Returns the path written, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the snapshot
    /// cannot be written.
    pub fn maybe_save<M: SurrogateModel>(&mut self, driver: &AdaptiveDriver<M>) -> Result<Option<PathBuf>> {
        let n_completed = driver.n_completed_trials();
        if n_completed < self.last_saved + self.period {
            return Ok(None);
        }
        self.save_now(driver).map(Some)
    }

    /// Saves a snapshot unconditionally.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the snapshot
    /// cannot be written.
    pub fn save_now<M: SurrogateModel>(&mut self, driver: &AdaptiveDriver<M>) -> Result<PathBuf> {
        let n_completed = driver.n_completed_trials();
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(n_completed);
        driver.model().save(&path)?;
        self.last_saved = n_completed;
        trace_info!(path = %path.display(), n_completed, "model checkpoint written");
        Ok(path)
    }
}
