use std::path::PathBuf;
use std::time::Duration;

use sim_optimizer::checkpoint::ModelCheckpointer;
use sim_optimizer::evaluator::{EvaluationOutcome, FnEvaluator};
use sim_optimizer::exploration::Exploration;
use sim_optimizer::model::{ExperimentClient, SurrogateModel};
use sim_optimizer::parameter::VaryingParameter;
use sim_optimizer::{AdaptiveDriver, Objective, ObjectiveEvaluation, TrialRecord};

fn temp_dir() -> PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let mut path = std::env::temp_dir();
    path.push(format!(
        "sim_optimizer_checkpoint_test_{}_{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    path
}

fn driver() -> AdaptiveDriver {
    AdaptiveDriver::builder(
        vec![VaryingParameter::new("x", 0.0, 1.0)],
        vec![Objective::new("f")],
    )
    .n_init(3)
    .n_candidates(32)
    .seed(9)
    .build()
    .unwrap()
}

fn tell_batch(driver: &mut AdaptiveDriver, n: usize) {
    let placeholders = driver.new_trials(n);
    let mut trials = driver.ask(placeholders).unwrap();
    for trial in &mut trials {
        let objective = trial.objectives()[0].clone();
        let x = trial.value_of("x").unwrap();
        trial
            .complete_evaluation(ObjectiveEvaluation::new(&objective, x))
            .unwrap();
    }
    driver.tell(&mut trials).unwrap();
}

#[test]
fn test_saves_every_period() {
    let dir = temp_dir();
    let mut checkpointer = ModelCheckpointer::new(&dir).period(2);
    let mut driver = driver();

    tell_batch(&mut driver, 1);
    assert_eq!(checkpointer.maybe_save(&driver).unwrap(), None);
    assert!(!dir.exists(), "directory is created on first save");

    tell_batch(&mut driver, 1);
    let path = checkpointer.maybe_save(&driver).unwrap().unwrap();
    assert_eq!(path, dir.join("model_at_eval_2.json"));
    assert!(path.exists());

    tell_batch(&mut driver, 1);
    assert_eq!(checkpointer.maybe_save(&driver).unwrap(), None);
    tell_batch(&mut driver, 2);
    let path = checkpointer.maybe_save(&driver).unwrap().unwrap();
    assert_eq!(path, dir.join("model_at_eval_5.json"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_snapshot_restores_model() {
    let dir = temp_dir();
    let mut checkpointer = ModelCheckpointer::new(&dir);
    let mut driver = driver();
    tell_batch(&mut driver, 4);

    let path = checkpointer.save_now(&driver).unwrap();
    let restored = ExperimentClient::load(&path).unwrap();
    assert_eq!(restored.n_observations(), 4);
    assert_eq!(restored.n_trials(), driver.model().n_trials());
    assert_eq!(
        restored.current_phase_budget(),
        driver.model().current_phase_budget()
    );
    assert!(!restored.has_fitted_model());

    // No temp file is left behind.
    let leftovers: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_exploration_writes_checkpoints() {
    let dir = temp_dir();
    let evaluator = FnEvaluator::new(|t: &TrialRecord| {
        let x = t.value_of("x").unwrap_or_default();
        Ok::<_, String>(EvaluationOutcome::new().objective("f", (x - 0.3).abs()))
    });
    let mut exploration = Exploration::new(driver(), evaluator)
        .max_evals(10)
        .poll_interval(Duration::from_millis(1))
        .checkpointer(ModelCheckpointer::new(&dir).period(5));
    exploration.run().unwrap();

    assert!(dir.join("model_at_eval_5.json").exists());
    assert!(dir.join("model_at_eval_10.json").exists());
    let restored = ExperimentClient::load(dir.join("model_at_eval_10.json")).unwrap();
    assert_eq!(restored.n_observations(), 10);

    std::fs::remove_dir_all(&dir).ok();
}
