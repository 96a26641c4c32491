use sim_optimizer::model::{Budget, SurrogateModel};
use sim_optimizer::parameter::VaryingParameter;
use sim_optimizer::{AdaptiveDriver, Error, ModelKind, Objective, ObjectiveEvaluation, TrialState};

use crate::{evaluate, unit_driver};

#[test]
fn test_end_to_end_exploration_phase() {
    let mut driver = unit_driver(4);
    let placeholders = driver.new_trials(4);
    let mut trials = driver.ask(placeholders).unwrap();

    assert_eq!(trials.len(), 4);
    for (i, trial) in trials.iter().enumerate() {
        assert_eq!(trial.trial_index(), Some(i as u64), "order must be preserved");
        assert_eq!(trial.parameter_values().len(), 3);
        for &v in trial.parameter_values() {
            assert!((0.0..=1.0).contains(&v), "value {v} out of bounds");
        }
        assert!(trial.model_trial_id().is_some());
    }
    for i in 0..trials.len() {
        for j in (i + 1)..trials.len() {
            assert_ne!(
                trials[i].parameter_values(),
                trials[j].parameter_values(),
                "proposals {i} and {j} coincide"
            );
        }
    }

    for (trial, value) in trials.iter_mut().zip([0.5, 0.3, 0.9, 0.1]) {
        evaluate(trial, value);
    }
    driver.tell(&mut trials).unwrap();

    assert_eq!(driver.model().n_observations(), 4);
    assert_eq!(driver.n_completed_trials(), 4);
    let budget = driver.model().current_phase_budget();
    assert_eq!(budget.to_generate, Budget::Limited(0));
    assert_eq!(driver.model().current_phase_kind(), ModelKind::Sobol);
    assert!(trials.iter().all(|t| t.state() == TrialState::Complete));
}

#[test]
fn test_model_phase_after_exploration() {
    let mut driver = unit_driver(3);
    for round in 0..3 {
        let placeholders = driver.new_trials(3);
        let mut trials = driver.ask(placeholders).unwrap();
        for trial in &mut trials {
            let x: f64 = trial.parameter_values().iter().map(|v| (v - 0.5).powi(2)).sum();
            evaluate(trial, x);
        }
        driver.tell(&mut trials).unwrap();
        assert_eq!(driver.model().n_observations(), 3 * (round + 1));
    }
    assert_eq!(driver.model().current_phase_kind(), ModelKind::GpEi);
    assert_eq!(driver.model().current_phase_budget().to_generate, Budget::Unlimited);
}

#[test]
fn test_tell_increases_observations_by_batch_size() {
    let mut driver = unit_driver(8);
    let placeholders = driver.new_trials(5);
    let mut trials = driver.ask(placeholders).unwrap();
    for trial in &mut trials[..2] {
        evaluate(trial, 1.0);
    }
    driver.tell(&mut trials[..2]).unwrap();
    assert_eq!(driver.model().n_observations(), 2);

    for trial in &mut trials[2..] {
        evaluate(trial, 2.0);
    }
    driver.tell(&mut trials[2..]).unwrap();
    assert_eq!(driver.model().n_observations(), 5);
}

#[test]
fn test_double_tell_is_rejected() {
    let mut driver = unit_driver(4);
    let placeholders = driver.new_trials(2);
    let mut trials = driver.ask(placeholders).unwrap();
    for trial in &mut trials {
        evaluate(trial, 1.0);
    }
    driver.tell(&mut trials).unwrap();

    let result = driver.tell(&mut trials);
    assert!(matches!(result, Err(Error::TrialAlreadyCompleted(_))));
    assert_eq!(driver.model().n_observations(), 2);
}

#[test]
fn test_double_tell_of_cloned_record_is_rejected() {
    let mut driver = unit_driver(4);
    let placeholders = driver.new_trials(1);
    let mut trials = driver.ask(placeholders).unwrap();
    evaluate(&mut trials[0], 1.0);
    let mut copy = trials.clone();
    driver.tell(&mut trials).unwrap();

    // The copy is still running locally, but the model already absorbed it.
    assert!(matches!(
        driver.tell(&mut copy),
        Err(Error::TrialAlreadyCompleted(_))
    ));
    assert_eq!(driver.model().n_observations(), 1);
}

#[test]
fn test_ask_rejects_told_record() {
    let mut driver = unit_driver(4);
    let placeholders = driver.new_trials(1);
    let mut trials = driver.ask(placeholders).unwrap();
    evaluate(&mut trials[0], 1.0);
    driver.tell(&mut trials).unwrap();
    let values = trials[0].parameter_values().to_vec();
    let n_trials = driver.model().n_trials();

    let err = driver.ask(trials.clone()).unwrap_err();
    assert!(matches!(err, Error::NotAPlaceholder(0)), "unexpected error: {err}");
    assert_eq!(driver.model().n_trials(), n_trials, "nothing may be proposed");
    assert_eq!(trials[0].parameter_values(), values.as_slice());
    assert!(matches!(
        driver.tell(&mut trials),
        Err(Error::TrialAlreadyCompleted(_))
    ));
    assert_eq!(driver.model().n_observations(), 1);
}

#[test]
fn test_ask_rejects_mixed_batch_before_proposing() {
    let mut driver = unit_driver(4);
    let mut batch = driver.new_trials(2);
    batch.push(crate::external(&driver, vec![0.1, 0.2, 0.3], 1.0));

    assert!(matches!(driver.ask(batch), Err(Error::NotAPlaceholder(_))));
    assert_eq!(driver.model().n_trials(), 0);
    assert_eq!(
        driver.model().current_phase_budget().to_generate,
        Budget::Limited(4)
    );
}

#[test]
fn test_duplicate_ids_in_one_batch_are_rejected() {
    let mut driver = unit_driver(4);
    let placeholders = driver.new_trials(1);
    let mut trials = driver.ask(placeholders).unwrap();
    evaluate(&mut trials[0], 1.0);
    trials.push(trials[0].clone());

    assert!(matches!(driver.tell(&mut trials), Err(Error::DuplicateTrial(_))));
    assert_eq!(driver.model().n_observations(), 0);
}

#[test]
fn test_incomplete_batch_absorbs_nothing() {
    let mut driver = AdaptiveDriver::builder(
        vec![VaryingParameter::new("x", 0.0, 1.0)],
        vec![Objective::new("cost"), Objective::maximize("yield")],
    )
    .seed(1)
    .build()
    .unwrap();
    let placeholders = driver.new_trials(3);
    let mut trials = driver.ask(placeholders).unwrap();
    for trial in &mut trials {
        let cost = trial.objectives()[0].clone();
        trial
            .complete_evaluation(ObjectiveEvaluation::new(&cost, 1.0))
            .unwrap();
    }
    let yield_ = trials[0].objectives()[1].clone();
    trials[0]
        .complete_evaluation(ObjectiveEvaluation::with_sem(&yield_, 0.4, 0.01))
        .unwrap();

    let err = driver.tell(&mut trials).unwrap_err();
    assert!(
        matches!(&err, Error::MissingObjective { trial: 1, objective } if objective == "yield"),
        "unexpected error: {err}"
    );
    assert_eq!(driver.model().n_observations(), 0);
    assert_eq!(driver.n_completed_trials(), 0);
}

#[test]
fn test_fixed_parameters_hold_default() {
    let mut driver = AdaptiveDriver::builder(
        vec![
            VaryingParameter::new("x", -1.0, 1.0),
            VaryingParameter::new("beam", 0.0, 10.0).fixed(3.0),
        ],
        vec![Objective::new("f")],
    )
    .n_init(2)
    .n_candidates(64)
    .seed(5)
    .build()
    .unwrap();

    for _ in 0..3 {
        let placeholders = driver.new_trials(2);
        let mut trials = driver.ask(placeholders).unwrap();
        for trial in &mut trials {
            assert_eq!(trial.value_of("beam"), Some(3.0));
            let x = trial.value_of("x").unwrap();
            assert!((-1.0..=1.0).contains(&x));
            evaluate(trial, x * x);
        }
        driver.tell(&mut trials).unwrap();
    }
}

#[test]
fn test_configuration_errors() {
    let inverted = AdaptiveDriver::builder(
        vec![VaryingParameter::new("res", 1.0, 8.0).fidelity(8.0).with_bounds(8.0, 1.0)],
        vec![Objective::new("f")],
    )
    .build();
    assert!(matches!(inverted, Err(Error::InvalidBounds { .. })));

    let duplicate = AdaptiveDriver::builder(
        vec![VaryingParameter::new("x", 0.0, 1.0), VaryingParameter::new("x", 0.0, 2.0)],
        vec![Objective::new("f")],
    )
    .build();
    assert!(matches!(duplicate, Err(Error::DuplicateName(_))));

    let no_objectives =
        AdaptiveDriver::builder(vec![VaryingParameter::new("x", 0.0, 1.0)], vec![]).build();
    assert!(matches!(no_objectives, Err(Error::NoObjectives)));
}
