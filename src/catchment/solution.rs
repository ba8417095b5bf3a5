// src/catchment/solution.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::CatchmentModel;
use crate::codec;
use crate::models::Attributes;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DecisionVariable {
    pub name: String,
    pub value: f64,
    pub measure: String,
}

/// Read-only snapshot of a model. Built with `Solution::of`, never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Solution {
    pub id: String,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    pub decision_variables: Vec<DecisionVariable>,
    pub encoded_actions: String,
    pub active_management_actions: BTreeMap<u32, Vec<String>>,
    #[serde(skip)]
    pub planning_units: Vec<u32>,
    #[serde(skip)]
    pub inactive_management_actions: BTreeMap<u32, Vec<String>>,
}

impl Solution {
    pub fn of(id: impl Into<String>, model: &CatchmentModel) -> Self {
        let mut active: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        let mut inactive: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for action in model.management_actions() {
            let side = if action.active { &mut active } else { &mut inactive };
            side.entry(action.planning_unit).or_default().push(action.action_type.clone());
        }
        for types in active.values_mut().chain(inactive.values_mut()) {
            types.sort();
        }

        Self {
            id: id.into(),
            attributes: model.attributes().clone(),
            decision_variables: model.decision_variables(),
            encoded_actions: codec::encode(model),
            active_management_actions: active,
            planning_units: model.planning_units().to_vec(),
            inactive_management_actions: inactive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::reference_model;
    use serde_json::json;

    #[test]
    fn as_is_snapshot_has_no_active_actions() {
        let solution = Solution::of("As-Is", &reference_model());

        assert!(solution.active_management_actions.is_empty());
        assert_eq!(solution.inactive_management_actions.len(), 3);
        assert_eq!(solution.planning_units, vec![12, 17, 23]);
        assert_eq!(solution.encoded_actions, "80");
    }

    #[test]
    fn snapshot_does_not_follow_later_mutation() {
        let mut model = reference_model();
        let before = Solution::of("Scratchpad", &model);
        model.set_planning_unit_action(17, "GullyRestoration", true).unwrap();
        let after = Solution::of("Scratchpad", &model);

        assert!(!before.active_management_actions.contains_key(&17));
        assert_eq!(after.active_management_actions[&17], vec!["GullyRestoration"]);
        assert_eq!(after.inactive_management_actions[&17], vec!["RiverBankRestoration"]);
    }

    #[test]
    fn hidden_fields_are_not_serialized() {
        let mut model = reference_model();
        model.set_planning_unit_action(23, "WetlandsEstablishment", true).unwrap();
        let rendered = serde_json::to_value(Solution::of("x", &model)).unwrap();

        assert_eq!(rendered["Id"], "x");
        assert_eq!(rendered["ActiveManagementActions"], json!({"23": ["WetlandsEstablishment"]}));
        assert_eq!(rendered["DecisionVariables"][0]["Name"], "SedimentLoad");
        assert!(rendered.get("PlanningUnits").is_none());
        assert!(rendered.get("InactiveManagementActions").is_none());
    }
}
