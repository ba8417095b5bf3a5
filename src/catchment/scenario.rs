// src/catchment/scenario.rs

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{CatchmentModel, DecisionVariableSpec, InitialisationType, Limit, ManagementAction};
use crate::error::CompositeError;

pub const MODEL_TYPE: &str = "CatchmentModel";

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("unable to decode scenario configuration: {0}")]
    Decode(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] CompositeError),
}

// ─────────────────────────────────────────────────────────────────────────────
// TOML shape
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ScenarioConfig {
    pub scenario: ScenarioSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annealer: Option<AnnealerConfig>,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ScenarioSection {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct AnnealerConfig {
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_cooling_factor")]
    pub cooling_factor: f64,
    #[serde(default = "default_maximum_iterations")]
    pub maximum_iterations: u64,
    #[serde(default)]
    pub initial_state: InitialisationType,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_temperature() -> f64 {
    100.0
}

fn default_cooling_factor() -> f64 {
    0.99
}

fn default_maximum_iterations() -> u64 {
    1_000
}

impl Default for AnnealerConfig {
    fn default() -> Self {
        Self {
            objective: None,
            temperature: default_temperature(),
            cooling_factor: default_cooling_factor(),
            maximum_iterations: default_maximum_iterations(),
            initial_state: InitialisationType::default(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ModelConfig {
    pub r#type: String,
    #[serde(default)]
    pub decision_variables: Vec<DecisionVariableConfig>,
    #[serde(default)]
    pub planning_units: Vec<PlanningUnitConfig>,
    #[serde(default)]
    pub limits: Vec<LimitConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct DecisionVariableConfig {
    pub name: String,
    #[serde(default)]
    pub unit_of_measure: String,
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct PlanningUnitConfig {
    pub id: u32,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ActionConfig {
    pub r#type: String,
    #[serde(default)]
    pub effects: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct LimitConfig {
    pub variable: String,
    pub maximum: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding & interpretation
// ─────────────────────────────────────────────────────────────────────────────

impl ScenarioConfig {
    pub fn from_toml(text: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(text)?)
    }

    pub fn annealer(&self) -> AnnealerConfig {
        self.annealer.clone().unwrap_or_default()
    }

    /// Builds the catchment model this configuration describes, reporting every
    /// parameter problem at once.
    pub fn interpret(&self) -> Result<CatchmentModel, ScenarioError> {
        let mut errors = CompositeError::new("invalid scenario parameters");
        let model = &self.model;

        if self.scenario.name.trim().is_empty() {
            errors.add("Scenario.Name must not be empty");
        }
        if model.r#type != MODEL_TYPE {
            errors.add(format!(
                "Model.Type [{}] is not supported, expected [{MODEL_TYPE}]",
                model.r#type
            ));
        }

        let mut variables = Vec::with_capacity(model.decision_variables.len());
        let mut variable_names = HashSet::new();
        for variable in &model.decision_variables {
            if variable.name.trim().is_empty() {
                errors.add("decision variable with an empty name");
                continue;
            }
            if !variable_names.insert(variable.name.as_str()) {
                errors.add(format!("decision variable [{}] declared twice", variable.name));
                continue;
            }
            variables.push(DecisionVariableSpec {
                name: variable.name.clone(),
                unit_of_measure: variable.unit_of_measure.clone(),
                base_value: variable.value,
            });
        }

        let mut planning_units = Vec::with_capacity(model.planning_units.len());
        let mut actions = Vec::new();
        for unit in &model.planning_units {
            if planning_units.contains(&unit.id) {
                errors.add(format!("planning unit [{}] declared twice", unit.id));
                continue;
            }
            planning_units.push(unit.id);

            let mut seen = HashSet::new();
            for action in &unit.actions {
                if action.r#type.trim().is_empty() {
                    errors.add(format!("planning unit [{}] has an action with no type", unit.id));
                    continue;
                }
                if !seen.insert(action.r#type.as_str()) {
                    errors.add(format!(
                        "planning unit [{}] declares action [{}] twice",
                        unit.id, action.r#type
                    ));
                    continue;
                }
                for variable in action.effects.keys() {
                    if !variable_names.contains(variable.as_str()) {
                        errors.add(format!(
                            "action [{}] at planning unit [{}] affects unknown decision variable [{variable}]",
                            action.r#type, unit.id
                        ));
                    }
                }
                actions.push(ManagementAction {
                    planning_unit: unit.id,
                    action_type: action.r#type.clone(),
                    active: false,
                    effects: action.effects.clone(),
                });
            }
        }

        let mut limits = Vec::with_capacity(model.limits.len());
        for limit in &model.limits {
            if !variable_names.contains(limit.variable.as_str()) {
                errors.add(format!("limit on unknown decision variable [{}]", limit.variable));
                continue;
            }
            limits.push(Limit { variable: limit.variable.clone(), maximum: limit.maximum });
        }

        errors.into_result()?;
        Ok(CatchmentModel::new(
            self.scenario.name.clone(),
            planning_units,
            actions,
            variables,
            limits,
        ))
    }
}
