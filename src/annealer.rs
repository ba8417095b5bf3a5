// src/annealer.rs
//
// Scenario runner used by the job worker: a seeded simulated-annealing walk
// over single action toggles that minimises one decision variable while
// staying inside the scenario's limits.

use rand::{rngs::StdRng, Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info};

use crate::catchment::{CatchmentModel, ScenarioConfig, ScenarioError};
use crate::codec::{self, ActionStates};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error("objective [{0}] is not a decision variable of the model")]
    UnknownObjective(String),

    #[error("invalid annealer parameter: {0}")]
    InvalidParameter(String),

    #[error("no state satisfying the scenario limits was found")]
    NoFeasibleState,

    #[error("scenario run aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub encoding: String,
    pub objective: String,
    pub objective_value: f64,
    pub iterations: u64,
}

/// Executes one scenario to completion. Runs on a blocking thread, one at a
/// time.
pub trait ScenarioRunner: Send + Sync {
    fn run(&self, scenario: &ScenarioConfig) -> Result<RunOutcome, RunError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnnealingRunner;

impl ScenarioRunner for AnnealingRunner {
    fn run(&self, scenario: &ScenarioConfig) -> Result<RunOutcome, RunError> {
        let mut model = scenario.interpret()?;
        let params = scenario.annealer();

        if params.temperature.is_nan() || params.temperature <= 0.0 {
            return Err(RunError::InvalidParameter(format!(
                "Temperature must be positive, got {}",
                params.temperature
            )));
        }
        if params.cooling_factor.is_nan() || params.cooling_factor <= 0.0 || params.cooling_factor >= 1.0 {
            return Err(RunError::InvalidParameter(format!(
                "CoolingFactor must lie strictly between 0 and 1, got {}",
                params.cooling_factor
            )));
        }
        let objective = match params.objective {
            Some(name) => name,
            None => model
                .decision_variable_names()
                .first()
                .map(|name| name.to_string())
                .ok_or_else(|| RunError::UnknownObjective(String::new()))?,
        };
        if model.value_of(&objective).is_none() {
            return Err(RunError::UnknownObjective(objective));
        }

        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        model.initialise_with(params.initial_state, &mut rng);

        let mut current = energy(&model, &objective);
        let mut best = (model.action_flags(), current);
        let mut temperature = params.temperature;
        let actions = model.action_count();

        let mut iterations = 0;
        while iterations < params.maximum_iterations && actions > 0 {
            iterations += 1;
            let index = rng.gen_range(0..actions);
            model.toggle_management_action(index);
            let candidate = energy(&model, &objective);

            if accept(current, candidate, temperature, &mut rng) {
                current = candidate;
                if current < best.1 {
                    best = (model.action_flags(), current);
                }
            } else {
                model.toggle_management_action(index);
            }
            temperature *= params.cooling_factor;
        }
        debug!(iterations, temperature, "annealing finished");

        let (flags, value) = best;
        if !value.is_finite() {
            return Err(RunError::NoFeasibleState);
        }
        let outcome = RunOutcome {
            encoding: codec::encode_flags(&flags),
            objective,
            objective_value: value,
            iterations,
        };
        info!(scenario = %scenario.scenario.name, encoding = %outcome.encoding, value, "scenario run finished");
        Ok(outcome)
    }
}

// States outside the limits are infinitely bad.
fn energy(model: &CatchmentModel, objective: &str) -> f64 {
    if model.is_valid() {
        model.value_of(objective).unwrap_or(f64::INFINITY)
    } else {
        f64::INFINITY
    }
}

fn accept<R: Rng>(current: f64, candidate: f64, temperature: f64, rng: &mut R) -> bool {
    if !current.is_finite() || candidate <= current {
        return true;
    }
    if !candidate.is_finite() {
        return false;
    }
    rng.gen::<f64>() < (-(candidate - current) / temperature).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catchment::scenario::AnnealerConfig;
    use crate::test_support::{job_scenario_toml, SCENARIO_TOML};

    fn config(seed: u64) -> ScenarioConfig {
        ScenarioConfig::from_toml(&job_scenario_toml(seed)).unwrap()
    }

    #[test]
    fn run_improves_on_as_is_within_limits() {
        let outcome = AnnealingRunner.run(&config(11)).unwrap();

        assert_eq!(outcome.objective, "SedimentLoad");
        assert!(outcome.objective_value < 1000.0);
        assert_eq!(outcome.iterations, 200);

        let mut model = config(11).interpret().unwrap();
        codec::decode(&outcome.encoding, &mut model).unwrap();
        assert!(model.is_valid());
        assert_eq!(model.value_of("SedimentLoad"), Some(outcome.objective_value));
    }

    #[test]
    fn seeded_runs_are_repeatable() {
        let first = AnnealingRunner.run(&config(5)).unwrap();
        let second = AnnealingRunner.run(&config(5)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn objective_defaults_to_first_decision_variable() {
        let mut scenario = ScenarioConfig::from_toml(SCENARIO_TOML).unwrap();
        scenario.annealer = Some(AnnealerConfig {
            seed: Some(1),
            maximum_iterations: 20,
            ..AnnealerConfig::default()
        });
        assert_eq!(AnnealingRunner.run(&scenario).unwrap().objective, "SedimentLoad");
    }

    #[test]
    fn unknown_objective_is_an_error() {
        let mut scenario = config(1);
        if let Some(annealer) = scenario.annealer.as_mut() {
            annealer.objective = Some("Nitrogen".into());
        }
        assert!(matches!(
            AnnealingRunner.run(&scenario),
            Err(RunError::UnknownObjective(name)) if name == "Nitrogen"
        ));
    }

    #[test]
    fn cooling_factor_is_checked() {
        let mut scenario = config(1);
        if let Some(annealer) = scenario.annealer.as_mut() {
            annealer.cooling_factor = 1.5;
        }
        assert!(matches!(AnnealingRunner.run(&scenario), Err(RunError::InvalidParameter(_))));
    }
}
