// src/pool.rs
//
// Label-keyed caches. `ModelPool` holds the reserved and client-instantiated
// models with their solution snapshots; snapshots are only recomputed by
// `update`, so callers mutating a model in place must call it afterwards.
// `SolutionPool` holds solutions materialised from solution-set rows under
// their own labels, so the two namespaces never shadow each other.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::catchment::{CatchmentModel, InitialisationType, Solution, SUMMARY};
use crate::codec::{self, CodecError};
use crate::solution_set::SolutionSet;

pub const AS_IS: &str = "As-Is";
pub const SCRATCHPAD: &str = "Scratchpad";

const AS_IS_SUMMARY: &str = "As-Is Model. No active management actions.";
const SCRATCHPAD_SUMMARY: &str = "Scratchpad";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("model [{0}] is protected and cannot be re-instantiated")]
    Protected(String),

    #[error("model [{0}] has already been instantiated")]
    AlreadyInstantiated(String),

    #[error("no model labelled [{0}]")]
    UnknownLabel(String),

    #[error("encoding [{token}] cannot be applied to model [{label}]: {source}")]
    InvalidEncoding {
        label: String,
        token: String,
        #[source]
        source: CodecError,
    },
}

/// Where a pool entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Reserved,
    Client,
}

#[derive(Debug, Clone)]
pub struct ModelContainer {
    label: String,
    model: CatchmentModel,
    solution: Solution,
    last_updated: DateTime<Utc>,
    origin: Origin,
}

impl ModelContainer {
    fn new(label: &str, model: CatchmentModel, origin: Origin) -> Self {
        let solution = Solution::of(label, &model);
        Self { label: label.to_string(), model, solution, last_updated: Utc::now(), origin }
    }

    pub fn model(&self) -> &CatchmentModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut CatchmentModel {
        &mut self.model
    }

    pub fn solution(&self) -> &Solution {
        &self.solution
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn update(&mut self) {
        self.solution = Solution::of(&self.label, &self.model);
        self.last_updated = Utc::now();
    }
}

#[derive(Debug, Clone)]
pub struct ModelPool {
    entries: HashMap<String, ModelContainer>,
}

impl ModelPool {
    /// Seeds "As-Is" (nothing active) and "Scratchpad" (a copy of "As-Is")
    /// from the reference model.
    pub fn initialise(reference: &CatchmentModel) -> Self {
        let mut as_is = reference.clone();
        as_is.initialise(InitialisationType::AsIs);
        let mut scratchpad = as_is.clone();
        as_is.attributes_mut().set(SUMMARY, AS_IS_SUMMARY);
        as_is.refresh_attributes(None);
        scratchpad.attributes_mut().set(SUMMARY, SCRATCHPAD_SUMMARY);
        scratchpad.refresh_attributes(None);

        let mut entries = HashMap::new();
        entries.insert(AS_IS.to_string(), ModelContainer::new(AS_IS, as_is, Origin::Reserved));
        entries.insert(
            SCRATCHPAD.to_string(),
            ModelContainer::new(SCRATCHPAD, scratchpad, Origin::Reserved),
        );
        Self { entries }
    }

    pub fn has_model(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    pub fn model(&self, label: &str) -> Option<&CatchmentModel> {
        self.entries.get(label).map(ModelContainer::model)
    }

    pub fn model_mut(&mut self, label: &str) -> Option<&mut CatchmentModel> {
        self.entries.get_mut(label).map(ModelContainer::model_mut)
    }

    pub fn solution(&self, label: &str) -> Option<&Solution> {
        self.container(label).map(ModelContainer::solution)
    }

    pub fn container(&self, label: &str) -> Option<&ModelContainer> {
        self.entries.get(label)
    }

    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    pub fn update(&mut self, label: &str) -> Result<(), PoolError> {
        let container = self
            .entries
            .get_mut(label)
            .ok_or_else(|| PoolError::UnknownLabel(label.to_string()))?;
        container.update();
        debug!(label, updated = %container.last_updated(), "solution recomputed");
        Ok(())
    }

    /// Recomputes the derived model attributes and then the snapshot.
    pub fn refresh(&mut self, label: &str, front: Option<&SolutionSet>) -> Result<(), PoolError> {
        let container = self
            .entries
            .get_mut(label)
            .ok_or_else(|| PoolError::UnknownLabel(label.to_string()))?;
        let on_front = front.map(|set| {
            set.encoding_found_in_front(&codec::encode(container.model())).is_some()
        });
        container.model_mut().refresh_attributes(on_front);
        self.update(label)
    }

    pub fn instantiate_model(
        &mut self,
        label: &str,
        token: &str,
        summary: &str,
    ) -> Result<&ModelContainer, PoolError> {
        if label == AS_IS {
            return Err(PoolError::Protected(label.to_string()));
        }
        if label != SCRATCHPAD && self.entries.contains_key(label) {
            return Err(PoolError::AlreadyInstantiated(label.to_string()));
        }

        let as_is = self.model(AS_IS).ok_or_else(|| PoolError::UnknownLabel(AS_IS.to_string()))?;
        let model = variant_of(as_is, label, token, summary)?;

        let origin = if label == SCRATCHPAD { Origin::Reserved } else { Origin::Client };
        info!(label, token, "model instantiated");
        self.entries.insert(label.to_string(), ModelContainer::new(label, model, origin));
        self.entries
            .get(label)
            .ok_or_else(|| PoolError::UnknownLabel(label.to_string()))
    }
}

/// Clones `as_is` and applies `token` and `summary` to the copy.
fn variant_of(
    as_is: &CatchmentModel,
    label: &str,
    token: &str,
    summary: &str,
) -> Result<CatchmentModel, PoolError> {
    let mut model = as_is.clone();
    codec::decode(token, &mut model).map_err(|source| PoolError::InvalidEncoding {
        label: label.to_string(),
        token: token.to_string(),
        source,
    })?;
    model.attributes_mut().set(SUMMARY, summary);
    model.refresh_attributes(None);
    Ok(model)
}

// ─────────────────────────────────────────────────────────────────────────────
// Solution-set entries
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SolutionPool {
    entries: HashMap<String, Solution>,
}

impl SolutionPool {
    pub fn solution(&self, label: &str) -> Option<&Solution> {
        self.entries.get(label)
    }

    pub fn has_solution(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    /// Builds the solution for one solution-set row from the As-Is model and
    /// caches it under the row's label.
    pub fn materialise(
        &mut self,
        as_is: &CatchmentModel,
        label: &str,
        token: &str,
        summary: &str,
        front: &SolutionSet,
    ) -> Result<&Solution, PoolError> {
        let mut model = variant_of(as_is, label, token, summary)?;
        let on_front = front.encoding_found_in_front(&codec::encode(&model)).is_some();
        model.refresh_attributes(Some(on_front));

        info!(label, token, "solution materialised from solution set");
        self.entries.insert(label.to_string(), Solution::of(label, &model));
        self.entries
            .get(label)
            .ok_or_else(|| PoolError::UnknownLabel(label.to_string()))
    }

    /// Forgets every materialised solution, returning how many went.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catchment::PARETO_FRONT_MEMBER;
    use crate::test_support::{reference_model, SOLUTION_SET_CSV};

    fn pool() -> ModelPool {
        ModelPool::initialise(&reference_model())
    }

    #[test]
    fn initialise_seeds_reserved_entries() {
        let pool = pool();

        assert_eq!(pool.labels(), vec![AS_IS, SCRATCHPAD]);
        assert!(pool.solution(AS_IS).unwrap().active_management_actions.is_empty());
        assert_eq!(pool.solution(SCRATCHPAD).unwrap().encoded_actions, "80");
        assert!(pool.model("missing").is_none());
        assert!(pool.solution("missing").is_none());
    }

    #[test]
    fn scratchpad_is_independent_of_as_is() {
        let mut pool = pool();
        pool.model_mut(SCRATCHPAD).unwrap().toggle_management_action(0);
        pool.update(SCRATCHPAD).unwrap();

        assert_eq!(pool.solution(SCRATCHPAD).unwrap().encoded_actions, "81");
        assert_eq!(pool.solution(AS_IS).unwrap().encoded_actions, "80");
    }

    #[test]
    fn snapshot_is_stale_until_updated() {
        let mut pool = pool();
        let before = pool.container(SCRATCHPAD).unwrap().last_updated();
        pool.model_mut(SCRATCHPAD).unwrap().toggle_management_action(2);
        assert!(pool.solution(SCRATCHPAD).unwrap().active_management_actions.is_empty());

        pool.update(SCRATCHPAD).unwrap();
        assert_eq!(pool.solution(SCRATCHPAD).unwrap().active_management_actions[&17], vec!["GullyRestoration"]);
        assert!(pool.container(SCRATCHPAD).unwrap().last_updated() >= before);
    }

    #[test]
    fn as_is_is_protected() {
        let mut pool = pool();
        assert_eq!(
            pool.instantiate_model(AS_IS, "A1", "nope").unwrap_err(),
            PoolError::Protected(AS_IS.to_string())
        );
        assert_eq!(pool.solution(AS_IS).unwrap().encoded_actions, "80");
    }

    #[test]
    fn scratchpad_can_always_be_overwritten() {
        let mut pool = pool();
        pool.instantiate_model(SCRATCHPAD, "A1", "first").unwrap();
        let container = pool.instantiate_model(SCRATCHPAD, "A3", "second").unwrap();

        assert_eq!(container.solution().encoded_actions, "A3");
        assert_eq!(container.model().attributes().get_str(SUMMARY), Some("second"));
        assert_eq!(container.origin(), Origin::Reserved);
    }

    #[test]
    fn second_instantiation_under_a_new_label_fails_distinctly() {
        let mut pool = pool();
        let first = pool.instantiate_model("NewLabel", "A1", "s").unwrap();
        assert_eq!(first.solution().encoded_actions, "A1");

        assert_eq!(
            pool.instantiate_model("NewLabel", "A3", "s").unwrap_err(),
            PoolError::AlreadyInstantiated("NewLabel".to_string())
        );
        assert_eq!(pool.solution("NewLabel").unwrap().encoded_actions, "A1");
    }

    #[test]
    fn bad_tokens_store_nothing() {
        let mut pool = pool();
        let err = pool.instantiate_model("Broken", "XYZ", "s").unwrap_err();

        assert!(matches!(err, PoolError::InvalidEncoding { .. }));
        assert!(!pool.has_model("Broken"));
    }

    #[test]
    fn reserved_entries_carry_a_summary() {
        let pool = pool();

        let as_is = pool.solution(AS_IS).unwrap();
        assert_eq!(as_is.attributes.get_str(SUMMARY), Some("As-Is Model. No active management actions."));
        let scratchpad = pool.solution(SCRATCHPAD).unwrap();
        assert_eq!(scratchpad.attributes.get_str(SUMMARY), Some("Scratchpad"));
        assert_eq!(pool.container(AS_IS).unwrap().origin(), Origin::Reserved);
    }

    #[test]
    fn client_models_are_tagged_as_such() {
        let mut pool = pool();
        let container = pool.instantiate_model("Mine", "A1", "").unwrap();
        assert_eq!(container.origin(), Origin::Client);
        assert_eq!(pool.labels(), vec![AS_IS, "Mine", SCRATCHPAD]);
    }

    #[test]
    fn solution_pool_materialises_rows_apart_from_models() {
        let pool = pool();
        let as_is = pool.model(AS_IS).unwrap();
        let set = SolutionSet::ingest(SOLUTION_SET_CSV, as_is).unwrap();
        let mut solutions = SolutionPool::default();

        let solution = solutions.materialise(as_is, "Front-1", "A1", "front", &set).unwrap();
        assert_eq!(solution.encoded_actions, "A1");
        assert_eq!(solution.attributes.get_str(SUMMARY), Some("front"));
        assert_eq!(
            solution.attributes.get(PARETO_FRONT_MEMBER),
            Some(&serde_json::Value::Bool(true))
        );
        assert!(solutions.has_solution("Front-1"));
        assert!(!pool.has_model("Front-1"));

        assert_eq!(solutions.clear(), 1);
        assert!(solutions.solution("Front-1").is_none());
    }
}
