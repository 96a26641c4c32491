#![allow(clippy::cast_precision_loss)]

mod ask_tell;
mod external_data;
mod transfer;
mod update_parameter;

use sim_optimizer::parameter::VaryingParameter;
use sim_optimizer::{AdaptiveDriver, Objective, ObjectiveEvaluation, TrialRecord};

/// Three parameters in `[0, 1]`, one minimized objective.
pub fn unit_driver(n_init: usize) -> AdaptiveDriver {
    AdaptiveDriver::builder(
        vec![
            VaryingParameter::new("x0", 0.0, 1.0),
            VaryingParameter::new("x1", 0.0, 1.0),
            VaryingParameter::new("x2", 0.0, 1.0),
        ],
        vec![Objective::new("f")],
    )
    .n_init(n_init)
    .n_candidates(128)
    .seed(42)
    .build()
    .unwrap()
}

/// Records one evaluation per objective, all with `value`.
pub fn evaluate(trial: &mut TrialRecord, value: f64) {
    let objectives = trial.objectives().to_vec();
    for objective in &objectives {
        trial
            .complete_evaluation(ObjectiveEvaluation::new(objective, value))
            .unwrap();
    }
}

/// A record built outside the ask cycle.
pub fn external(driver: &AdaptiveDriver, values: Vec<f64>, value: f64) -> TrialRecord {
    let mut trial = TrialRecord::with_values(
        driver.varying_parameters().clone(),
        driver.objectives().clone(),
        values,
    )
    .unwrap();
    evaluate(&mut trial, value);
    trial
}
