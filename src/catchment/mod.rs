// src/catchment/mod.rs
//
// In-process catchment model: planning units carrying toggleable management
// actions, whose effects shift a set of decision variables away from their
// base values.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{self, ActionStates};
use crate::error::CompositeError;
use crate::models::Attributes;

pub mod scenario;
pub mod solution;

pub use scenario::{ScenarioConfig, ScenarioError};
pub use solution::{DecisionVariable, Solution};

// Derived attribute names maintained by `refresh_attributes`.
pub const ENCODING: &str = "Encoding";
pub const SUMMARY: &str = "Summary";
pub const PARETO_FRONT_MEMBER: &str = "ParetoFrontMember";
pub const VALID_AGAINST_SCENARIO: &str = "ValidAgainstScenario";
pub const VALIDATION_ERRORS: &str = "ValidationErrors";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialisationType {
    #[default]
    AsIs,
    Random,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("planning unit [{0}] does not exist")]
    UnknownPlanningUnit(u32),

    #[error("planning unit [{planning_unit}] has no [{action_type}] action")]
    UnknownAction { planning_unit: u32, action_type: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManagementAction {
    pub planning_unit: u32,
    pub action_type: String,
    pub active: bool,
    pub effects: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionVariableSpec {
    pub name: String,
    pub unit_of_measure: String,
    pub base_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub variable: String,
    pub maximum: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchmentModel {
    name: String,
    planning_units: Vec<u32>,
    actions: Vec<ManagementAction>,
    decision_variables: Vec<DecisionVariableSpec>,
    limits: Vec<Limit>,
    attributes: Attributes,
}

impl CatchmentModel {
    pub fn new(
        name: String,
        planning_units: Vec<u32>,
        actions: Vec<ManagementAction>,
        decision_variables: Vec<DecisionVariableSpec>,
        limits: Vec<Limit>,
    ) -> Self {
        Self { name, planning_units, actions, decision_variables, limits, attributes: Attributes::default() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn planning_units(&self) -> &[u32] {
        &self.planning_units
    }

    pub fn has_planning_unit(&self, planning_unit: u32) -> bool {
        self.planning_units.contains(&planning_unit)
    }

    pub fn management_actions(&self) -> &[ManagementAction] {
        &self.actions
    }

    pub fn actions_at(&self, planning_unit: u32) -> impl Iterator<Item = &ManagementAction> {
        self.actions.iter().filter(move |a| a.planning_unit == planning_unit)
    }

    /// Every distinct action type, sorted.
    pub fn action_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.actions.iter().map(|a| a.action_type.clone()).collect();
        types.sort();
        types.dedup();
        types
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn initialise(&mut self, mode: InitialisationType) {
        self.initialise_with(mode, &mut rand::thread_rng());
    }

    pub fn initialise_with<R: Rng + ?Sized>(&mut self, mode: InitialisationType, rng: &mut R) {
        for action in &mut self.actions {
            action.active = match mode {
                InitialisationType::AsIs => false,
                InitialisationType::Random => rng.gen_bool(0.5),
            };
        }
    }

    pub fn set_management_action(&mut self, index: usize, active: bool) {
        if let Some(action) = self.actions.get_mut(index) {
            action.active = active;
        }
    }

    pub fn toggle_management_action(&mut self, index: usize) {
        if let Some(action) = self.actions.get(index) {
            let active = !action.active;
            self.set_management_action(index, active);
        }
    }

    pub fn set_planning_unit_action(
        &mut self,
        planning_unit: u32,
        action_type: &str,
        active: bool,
    ) -> Result<(), ModelError> {
        if !self.has_planning_unit(planning_unit) {
            return Err(ModelError::UnknownPlanningUnit(planning_unit));
        }
        let action = self
            .actions
            .iter_mut()
            .find(|a| a.planning_unit == planning_unit && a.action_type == action_type)
            .ok_or_else(|| ModelError::UnknownAction {
                planning_unit,
                action_type: action_type.to_string(),
            })?;
        action.active = active;
        Ok(())
    }

    pub fn decision_variables(&self) -> Vec<DecisionVariable> {
        self.decision_variables
            .iter()
            .map(|spec| DecisionVariable {
                name: spec.name.clone(),
                value: self.compute(spec),
                measure: spec.unit_of_measure.clone(),
            })
            .collect()
    }

    pub fn decision_variable_names(&self) -> Vec<&str> {
        self.decision_variables.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn value_of(&self, variable: &str) -> Option<f64> {
        self.decision_variables
            .iter()
            .find(|spec| spec.name == variable)
            .map(|spec| self.compute(spec))
    }

    fn compute(&self, spec: &DecisionVariableSpec) -> f64 {
        self.actions
            .iter()
            .filter(|a| a.active)
            .filter_map(|a| a.effects.get(&spec.name))
            .fold(spec.base_value, |total, delta| total + delta)
    }

    /// Checks the current action state against the scenario's limits.
    pub fn state_validity(&self) -> Result<(), CompositeError> {
        let mut errors = CompositeError::new("model state exceeds scenario limits");
        for limit in &self.limits {
            if let Some(value) = self.value_of(&limit.variable) {
                if value > limit.maximum {
                    errors.add(format!(
                        "{} = {value} exceeds maximum {}",
                        limit.variable, limit.maximum
                    ));
                }
            }
        }
        errors.into_result()
    }

    pub fn is_valid(&self) -> bool {
        self.state_validity().is_ok()
    }

    /// Recomputes the attributes derived from action state. `on_front` is
    /// `None` when no solution set is loaded.
    pub fn refresh_attributes(&mut self, on_front: Option<bool>) {
        let encoding = codec::encode(&*self);
        let validity = self.state_validity();

        self.attributes.set(ENCODING, encoding);
        match on_front {
            Some(member) => self.attributes.set(PARETO_FRONT_MEMBER, member),
            None => {
                self.attributes.remove(PARETO_FRONT_MEMBER);
            }
        }
        self.attributes.set(VALID_AGAINST_SCENARIO, validity.is_ok());
        match validity {
            Ok(()) => {
                self.attributes.remove(VALIDATION_ERRORS);
            }
            Err(errors) => self.attributes.set(VALIDATION_ERRORS, errors.to_string()),
        }
    }
}

impl ActionStates for CatchmentModel {
    fn action_count(&self) -> usize {
        self.actions.len()
    }

    fn action_flags(&self) -> Vec<bool> {
        self.actions.iter().map(|a| a.active).collect()
    }

    fn apply_action_flags(&mut self, flags: &[bool]) {
        for (index, active) in flags.iter().enumerate() {
            self.set_management_action(index, *active);
        }
    }
}
