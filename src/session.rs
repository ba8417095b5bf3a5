// src/session.rs
//
// Everything tied to the currently loaded scenario. Handlers only reach it
// through the mutex in `AppState`, so each request sees and leaves it whole.

use tracing::info;

use crate::catchment::{ScenarioConfig, ScenarioError, Solution};
use crate::error::CompositeError;
use crate::pool::{ModelPool, PoolError, SolutionPool, AS_IS, SCRATCHPAD};
use crate::solution_set::{SolutionSet, SolutionSetError};

#[derive(Debug)]
pub struct ScenarioSession {
    text: String,
    config: ScenarioConfig,
    pool: ModelPool,
    solution_set: Option<SolutionSet>,
    solutions: SolutionPool,
}

impl ScenarioSession {
    pub fn load(text: &str) -> Result<Self, ScenarioError> {
        let config = ScenarioConfig::from_toml(text)?;
        let model = config.interpret()?;
        let pool = ModelPool::initialise(&model);
        info!(
            scenario = model.name(),
            planning_units = model.planning_units().len(),
            actions = model.management_actions().len(),
            models = ?pool.labels(),
            "scenario loaded"
        );
        Ok(Self {
            text: text.to_string(),
            config,
            pool,
            solution_set: None,
            solutions: SolutionPool::default(),
        })
    }

    /// The scenario exactly as it was posted.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn pool(&self) -> &ModelPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ModelPool {
        &mut self.pool
    }

    pub fn solution_set(&self) -> Option<&SolutionSet> {
        self.solution_set.as_ref()
    }

    /// Recomputes derived attributes and the snapshot for `label`.
    pub fn refresh(&mut self, label: &str) -> Result<(), PoolError> {
        self.pool.refresh(label, self.solution_set.as_ref())
    }

    /// Replaces the solution set. Solutions materialised from the previous set
    /// are dropped.
    pub fn load_solution_set(&mut self, text: &str) -> Result<(), SolutionSetError> {
        let Some(as_is) = self.pool.model(AS_IS) else {
            let mut errors = CompositeError::new("invalid solution set");
            errors.add(format!("no [{AS_IS}] model to check against"));
            return Err(errors.into());
        };
        let set = SolutionSet::ingest(text, as_is)?;

        let dropped = self.solutions.clear();
        self.solution_set = Some(set);
        if dropped > 0 {
            info!(dropped, "dropped solutions from the previous solution set");
        }
        // Scratchpad membership of the front may have changed.
        self.pool
            .refresh(SCRATCHPAD, self.solution_set.as_ref())
            .map_err(|err| {
                let mut errors = CompositeError::new("unable to refresh scratchpad");
                errors.add(err.to_string());
                SolutionSetError::Invalid(errors)
            })
    }

    pub fn instantiate(&mut self, label: &str, token: &str, summary: &str) -> Result<&Solution, PoolError> {
        self.pool.instantiate_model(label, token, summary)?;
        self.refresh(label)?;
        self.pool
            .solution(label)
            .ok_or_else(|| PoolError::UnknownLabel(label.to_string()))
    }

    /// Solution for the solution-set row labelled `label`, materialised on
    /// first request. `Ok(None)` when no set is loaded or it has no such row;
    /// models in the pool are never consulted.
    pub fn solution(&mut self, label: &str) -> Result<Option<&Solution>, PoolError> {
        let Some(set) = self.solution_set.as_ref().filter(|set| set.contains(label)) else {
            return Ok(None);
        };
        if !self.solutions.has_solution(label) {
            let Some(row) = set.lookup(label) else {
                return Ok(None);
            };
            let as_is = self
                .pool
                .model(AS_IS)
                .ok_or_else(|| PoolError::UnknownLabel(AS_IS.to_string()))?;
            self.solutions.materialise(as_is, label, &row.actions, &row.summary, set)?;
        }
        Ok(self.solutions.solution(label))
    }
}
