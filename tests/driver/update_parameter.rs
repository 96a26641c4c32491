use sim_optimizer::model::SurrogateModel;
use sim_optimizer::parameter::VaryingParameter;
use sim_optimizer::{Error, TrialState};

use crate::{evaluate, unit_driver};

#[test]
fn test_narrowed_bounds_apply_to_later_proposals() {
    let mut driver = unit_driver(3);
    let placeholders = driver.new_trials(3);
    let mut trials = driver.ask(placeholders).unwrap();
    for trial in &mut trials {
        let x0 = trial.parameter_values()[0];
        evaluate(trial, x0);
    }
    driver.tell(&mut trials).unwrap();

    driver
        .update_parameter(&VaryingParameter::new("x1", 0.25, 0.5))
        .unwrap();

    let space = driver.model().search_space();
    assert_eq!(space.get("x1").map(|p| (p.lower, p.upper)), Some((0.25, 0.5)));
    assert_eq!(space.get("x0").map(|p| (p.lower, p.upper)), Some((0.0, 1.0)));
    assert_eq!(space.get("x2").map(|p| (p.lower, p.upper)), Some((0.0, 1.0)));

    for _ in 0..4 {
        let placeholders = driver.new_trials(2);
        let mut trials = driver.ask(placeholders).unwrap();
        for trial in &mut trials {
            let x1 = trial.value_of("x1").unwrap();
            assert!((0.25..=0.5).contains(&x1), "x1 = {x1} outside the new bounds");
            evaluate(trial, x1);
        }
        driver.tell(&mut trials).unwrap();
    }
}

#[test]
fn test_in_flight_trials_keep_their_values() {
    let mut driver = unit_driver(4);
    let placeholders = driver.new_trials(2);
    let mut trials = driver.ask(placeholders).unwrap();
    let before: Vec<Vec<f64>> = trials.iter().map(|t| t.parameter_values().to_vec()).collect();

    driver
        .update_parameter(&VaryingParameter::new("x0", 0.0, 0.1))
        .unwrap();

    for (trial, values) in trials.iter_mut().zip(&before) {
        assert_eq!(trial.parameter_values(), values.as_slice());
        evaluate(trial, 1.0);
    }
    driver.tell(&mut trials).unwrap();
    assert!(trials.iter().all(|t| t.state() == TrialState::Complete));
}

#[test]
fn test_fixing_a_parameter_pins_it() {
    let mut driver = unit_driver(6);
    driver
        .update_parameter(&VaryingParameter::new("x2", 0.0, 1.0).fixed(0.125))
        .unwrap();
    assert_eq!(driver.fixed_features().get("x2"), Some(0.125));

    let placeholders = driver.new_trials(3);
    let trials = driver.ask(placeholders).unwrap();
    for trial in &trials {
        assert_eq!(trial.value_of("x2"), Some(0.125));
    }

    driver
        .update_parameter(&VaryingParameter::new("x2", 0.0, 1.0))
        .unwrap();
    assert!(driver.fixed_features().get("x2").is_none());
}

#[test]
fn test_invalid_update_leaves_everything_unchanged() {
    let mut driver = unit_driver(4);
    assert!(matches!(
        driver.update_parameter(&VaryingParameter::new("x0", 1.0, 0.0)),
        Err(Error::InvalidBounds { .. })
    ));
    assert!(matches!(
        driver.update_parameter(&VaryingParameter::new("nope", 0.0, 1.0)),
        Err(Error::UnknownParameter(name)) if name == "nope"
    ));
    assert_eq!(driver.varying_parameters()[0].upper_bound(), 1.0);
    assert_eq!(driver.model().search_space().get("x0").unwrap().upper, 1.0);
}
