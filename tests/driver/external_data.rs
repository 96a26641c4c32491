use sim_optimizer::model::{Budget, ModelTrialStatus, SurrogateModel};
use sim_optimizer::{Error, ModelKind, TrialIndex, TrialState};

use crate::{evaluate, external, unit_driver};

#[test]
fn test_external_tell_reduces_exploration_budget() {
    let mut driver = unit_driver(4);
    let mut trials = vec![external(&driver, vec![0.1, 0.2, 0.3], 1.0)];
    driver.tell(&mut trials).unwrap();

    assert_eq!(driver.model().n_observations(), 1);
    assert_eq!(
        driver.model().current_phase_budget().to_generate,
        Budget::Limited(3)
    );
    let id = trials[0].model_trial_id().expect("attached trial gets an id");
    assert_eq!(
        driver.model().trial_status(id),
        Some(ModelTrialStatus::Completed)
    );
    assert_eq!(trials[0].state(), TrialState::Complete);
}

#[test]
fn test_each_external_trial_reduces_by_one() {
    let mut driver = unit_driver(4);
    let mut trials = vec![
        external(&driver, vec![0.1, 0.2, 0.3], 1.0),
        external(&driver, vec![0.4, 0.5, 0.6], 2.0),
    ];
    driver.tell(&mut trials).unwrap();
    assert_eq!(
        driver.model().current_phase_budget().to_generate,
        Budget::Limited(2)
    );

    // The remaining two exploration trials come from the model itself.
    let placeholders = driver.new_trials(2);
    let mut asked = driver.ask(placeholders).unwrap();
    assert_eq!(
        driver.model().current_phase_budget().to_generate,
        Budget::Limited(0)
    );
    for trial in &mut asked {
        evaluate(trial, 0.5);
    }
    driver.tell(&mut asked).unwrap();
    assert_eq!(driver.model().n_observations(), 4);

    let placeholders = driver.new_trials(1);
    driver.ask(placeholders).unwrap();
    assert_eq!(driver.model().current_phase_kind(), ModelKind::GpEi);
}

#[test]
fn test_enforce_n_init_keeps_budget() {
    let mut driver = unit_driver(4);
    driver.set_enforce_n_init(true);
    let mut trials = vec![external(&driver, vec![0.1, 0.2, 0.3], 1.0)];
    driver.tell(&mut trials).unwrap();

    assert_eq!(driver.model().n_observations(), 1);
    assert_eq!(
        driver.model().current_phase_budget().to_generate,
        Budget::Limited(4)
    );
}

#[test]
fn test_exhausted_exploration_budget_is_unchanged() {
    let mut driver = unit_driver(2);
    let placeholders = driver.new_trials(2);
    driver.ask(placeholders).unwrap();
    assert_eq!(
        driver.model().current_phase_budget().to_generate,
        Budget::Limited(0)
    );

    let mut trials = vec![external(&driver, vec![0.9, 0.9, 0.9], 1.0)];
    driver.tell(&mut trials).unwrap();
    assert_eq!(
        driver.model().current_phase_budget().to_generate,
        Budget::Limited(0)
    );
}

#[test]
fn test_model_phase_budget_is_unchanged() {
    let mut driver = unit_driver(0);
    for v in [0.2, 0.6] {
        let mut trials = vec![external(&driver, vec![v, v, v], v)];
        driver.tell(&mut trials).unwrap();
    }
    let placeholders = driver.new_trials(1);
    let mut asked = driver.ask(placeholders).unwrap();
    assert_eq!(driver.model().current_phase_kind(), ModelKind::GpEi);
    evaluate(&mut asked[0], 0.0);
    driver.tell(&mut asked).unwrap();

    let mut trials = vec![external(&driver, vec![0.3, 0.3, 0.3], 0.1)];
    driver.tell(&mut trials).unwrap();
    assert_eq!(
        driver.model().current_phase_budget().to_generate,
        Budget::Unlimited
    );
    assert_eq!(driver.model().n_observations(), 4);
}

#[test]
fn test_stale_id_falls_back_to_attachment() {
    let mut driver = unit_driver(4);
    let placeholders = driver.new_trials(1);
    let mut asked = driver.ask(placeholders).unwrap();
    evaluate(&mut asked[0], 1.0);

    // A record carried over from another experiment: its id is unknown here.
    let mut fresh = unit_driver(4);
    assert!(fresh.model().trial_status(asked[0].model_trial_id().unwrap()).is_none());
    fresh.tell(&mut asked).unwrap();

    assert_eq!(fresh.model().n_observations(), 1);
    assert_eq!(
        fresh.model().current_phase_budget().to_generate,
        Budget::Limited(3)
    );
    assert_eq!(asked[0].model_trial_id(), Some(TrialIndex(0)));
}

#[test]
fn test_external_values_are_validated_before_absorbing() {
    let mut driver = unit_driver(4);
    let mut trials = vec![
        external(&driver, vec![0.1, 0.2, 0.3], 1.0),
        external(&driver, vec![0.1, 1.5, 0.3], 1.0),
    ];
    let err = driver.tell(&mut trials).unwrap_err();
    assert!(
        matches!(&err, Error::OutOfBounds { name, .. } if name == "x1"),
        "unexpected error: {err}"
    );
    assert_eq!(driver.model().n_observations(), 0);
    assert_eq!(
        driver.model().current_phase_budget().to_generate,
        Budget::Limited(4)
    );
}
