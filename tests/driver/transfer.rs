use std::sync::Arc;

use sim_optimizer::AdaptiveDriver;
use sim_optimizer::model::SurrogateModel;
use sim_optimizer::parameter::VaryingParameter;

use crate::{evaluate, unit_driver};

/// A driver past its exploration phase, holding a fitted model.
fn fitted_driver() -> AdaptiveDriver {
    let mut driver = unit_driver(3);
    let placeholders = driver.new_trials(3);
    let mut trials = driver.ask(placeholders).unwrap();
    for (trial, v) in trials.iter_mut().zip([0.4, 0.2, 0.7]) {
        evaluate(trial, v);
    }
    driver.tell(&mut trials).unwrap();
    let placeholders = driver.new_trials(1);
    driver.ask(placeholders).unwrap();
    assert!(driver.model().has_fitted_model());
    driver
}

/// Serializes and deserializes, as across a process boundary.
fn ship(driver: &AdaptiveDriver) -> AdaptiveDriver {
    let json = serde_json::to_string(driver).unwrap();
    serde_json::from_str(&json).unwrap()
}

#[test]
fn test_prepare_to_send_strips_fitted_model() {
    let mut driver = fitted_driver();
    driver.prepare_to_send();

    assert!(!driver.model().has_fitted_model());
    assert!(driver.model().strategy().model().is_none());
    assert!(driver.model().strategy().current_step().fitted_model().is_none());
    // Bookkeeping is untouched.
    assert_eq!(driver.model().n_observations(), 3);
    assert_eq!(driver.model().n_trials(), 4);
}

#[test]
fn test_shipped_driver_keeps_bookkeeping() {
    let mut driver = fitted_driver();
    driver.prepare_to_send();
    let received = ship(&driver);

    assert_eq!(received.n_completed_trials(), 3);
    assert_eq!(received.model().n_observations(), 3);
    assert_eq!(received.model().n_trials(), 4);
    assert_eq!(
        received.model().current_phase_kind(),
        driver.model().current_phase_kind()
    );
    assert!(!received.model().has_fitted_model());
}

#[test]
fn test_update_keeps_local_model_object() {
    let mut local = fitted_driver();
    let model_addr = std::ptr::from_ref(local.model());
    let cached = Arc::clone(local.model().strategy().model().unwrap());

    let mut remote = local.clone();
    remote.prepare_to_send();
    let mut remote = ship(&remote);
    let placeholders = remote.new_trials(2);
    let mut trials = remote.ask(placeholders).unwrap();
    for trial in &mut trials {
        evaluate(trial, 0.05);
    }
    remote.tell(&mut trials).unwrap();
    remote.set_enforce_n_init(true);
    remote.prepare_to_send();
    let incoming = ship(&remote);

    local.update(incoming);

    assert!(std::ptr::eq(model_addr, local.model()));
    assert!(
        Arc::ptr_eq(&cached, local.model().strategy().model().unwrap()),
        "live fitted model must survive the merge"
    );
    assert_eq!(local.n_completed_trials(), remote.n_completed_trials());
    assert!(local.enforce_n_init());
    assert_eq!(local.model().n_observations(), remote.model().n_observations());
    assert_eq!(local.model().n_trials(), remote.model().n_trials());
    assert_eq!(
        local.model().strategy().current_step().n_generated(),
        remote.model().strategy().current_step().n_generated()
    );

    // New placeholders continue the merged index sequence.
    let next = local.new_trials(1);
    assert_eq!(next[0].trial_index(), Some(6));
}

#[test]
fn test_update_with_changed_bounds_drops_local_fit() {
    let mut local = fitted_driver();
    let cached = Arc::clone(local.model().strategy().model().unwrap());

    let mut remote = local.clone();
    remote
        .update_parameter(&VaryingParameter::new("x0", 0.0, 100.0))
        .unwrap();
    assert!(!remote.model().has_fitted_model());

    local.update(remote);
    assert!(!local.model().has_fitted_model());

    let placeholders = local.new_trials(1);
    local.ask(placeholders).unwrap();
    let refit = local.model().strategy().model().unwrap();
    assert!(!Arc::ptr_eq(&cached, refit), "fit from the old bounds was reused");
}

#[test]
fn test_update_adopts_search_space_changes() {
    let mut local = unit_driver(4);
    let mut remote = local.clone();
    remote
        .update_parameter(&VaryingParameter::new("x0", 0.5, 1.0).fixed(0.75))
        .unwrap();

    local.update(remote);

    assert_eq!(local.varying_parameters()[0].lower_bound(), 0.5);
    assert_eq!(local.fixed_features().get("x0"), Some(0.75));
    assert_eq!(local.model().search_space().get("x0").unwrap().lower, 0.5);

    let placeholders = local.new_trials(2);
    for trial in local.ask(placeholders).unwrap() {
        assert_eq!(trial.value_of("x0"), Some(0.75));
    }
}
