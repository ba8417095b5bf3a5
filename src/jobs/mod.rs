// src/jobs/mod.rs

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::annealer::{RunError, RunOutcome};
use crate::catchment::{ScenarioConfig, ScenarioError};
use crate::models::Attributes;

pub mod queue;

pub use queue::{JobQueue, JobWorker, QueueError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Created,
    Completed,
    Errored,
    Invalid,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Created)
    }

    /// Processed jobs may be purged from history.
    pub fn is_processed(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Invalid)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    pub id: Uuid,
    pub creation_time: DateTime<Utc>,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip)]
    scenario_text: String,
    #[serde(skip)]
    scenario: Option<ScenarioConfig>,
}

impl Job {
    pub fn new(scenario_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            creation_time: Utc::now(),
            status: JobStatus::Created,
            completed_time: None,
            error_detail: None,
            attributes: Attributes::default(),
            scenario_text: scenario_text.into(),
            scenario: None,
        }
    }

    pub fn scenario_text(&self) -> &str {
        &self.scenario_text
    }

    pub fn scenario(&self) -> Option<&ScenarioConfig> {
        self.scenario.as_ref()
    }

    /// Decodes and checks the configuration text. A failure marks the job
    /// `Invalid`.
    pub fn parse_configuration(&mut self) -> Result<(), ScenarioError> {
        let parsed = ScenarioConfig::from_toml(&self.scenario_text)
            .and_then(|config| config.interpret().map(|_| config));
        match parsed {
            Ok(config) => {
                self.scenario = Some(config);
                Ok(())
            }
            Err(err) => {
                self.status = JobStatus::Invalid;
                self.completed_time = Some(Utc::now());
                self.error_detail = Some(err.to_string());
                warn!(job = %self.id, error = %err, "job configuration invalid");
                Err(err)
            }
        }
    }

    pub fn complete(&mut self, outcome: &RunOutcome) {
        self.status = JobStatus::Completed;
        self.completed_time = Some(Utc::now());
        self.attributes.set("SolutionEncoding", outcome.encoding.clone());
        self.attributes.set("Objective", outcome.objective.clone());
        self.attributes.set("ObjectiveValue", outcome.objective_value);
        self.attributes.set("Iterations", outcome.iterations);
        self.scenario = None;
        info!(job = %self.id, objective_value = outcome.objective_value, "job completed");
    }

    pub fn fail(&mut self, err: &RunError) {
        self.status = JobStatus::Errored;
        self.completed_time = Some(Utc::now());
        self.error_detail = Some(err.to_string());
        warn!(job = %self.id, error = %err, "job errored");
    }
}

/// Every job ever submitted, newest first.
#[derive(Debug, Clone, Default)]
pub struct JobHistory {
    jobs: Arc<Mutex<VecDeque<Job>>>,
}

impl JobHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, job: Job) {
        self.jobs.lock().await.push_front(job);
    }

    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.lock().await.iter().find(|job| job.id == id).cloned()
    }

    pub async fn list(&self) -> Vec<Job> {
        self.jobs.lock().await.iter().cloned().collect()
    }

    /// Applies `change` to the job with `id`. Returns false if it is gone.
    pub async fn update<F>(&self, id: Uuid, change: F) -> bool
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.lock().await;
        match jobs.iter_mut().find(|job| job.id == id) {
            Some(job) => {
                change(job);
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, id: Uuid) -> Option<Job> {
        let mut jobs = self.jobs.lock().await;
        let index = jobs.iter().position(|job| job.id == id)?;
        jobs.remove(index)
    }

    /// Drops completed and invalid jobs, returning them newest first.
    pub async fn purge_processed(&self) -> Vec<Job> {
        let mut jobs = self.jobs.lock().await;
        let (purged, kept): (VecDeque<Job>, VecDeque<Job>) =
            jobs.drain(..).partition(|job| job.status.is_processed());
        *jobs = kept;
        info!(purged = purged.len(), retained = jobs.len(), "job history purged");
        purged.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{job_scenario_toml, SCENARIO_TOML};

    #[test]
    fn parse_keeps_the_configuration_hidden() {
        let mut job = Job::new(SCENARIO_TOML);
        job.parse_configuration().unwrap();

        assert_eq!(job.status, JobStatus::Created);
        assert!(job.scenario().is_some());
        let rendered = serde_json::to_value(&job).unwrap();
        assert_eq!(rendered["Status"], "CREATED");
        assert!(rendered.get("ScenarioText").is_none());
        assert!(rendered.get("Scenario").is_none());
        assert!(rendered.get("CompletedTime").is_none());
    }

    #[test]
    fn unparsable_configuration_invalidates() {
        let mut job = Job::new("this is [ not toml");
        assert!(job.parse_configuration().is_err());

        assert_eq!(job.status, JobStatus::Invalid);
        assert!(job.completed_time.is_some());
        assert!(job.error_detail.is_some());
        assert!(job.scenario().is_none());
    }

    #[test]
    fn completion_drops_parsed_configuration_but_keeps_text() {
        let text = job_scenario_toml(1);
        let mut job = Job::new(text.clone());
        job.parse_configuration().unwrap();
        job.complete(&RunOutcome {
            encoding: "A1".into(),
            objective: "SedimentLoad".into(),
            objective_value: 870.0,
            iterations: 10,
        });

        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.scenario().is_none());
        assert_eq!(job.scenario_text(), text);
        assert_eq!(job.attributes.get_str("SolutionEncoding"), Some("A1"));
    }

    #[tokio::test]
    async fn history_is_newest_first_and_purges_processed_only() {
        let history = JobHistory::new();

        let mut invalid = Job::new("nope = [");
        let _ = invalid.parse_configuration();
        let created = Job::new(SCENARIO_TOML);
        let mut errored = Job::new(SCENARIO_TOML);
        errored.fail(&RunError::NoFeasibleState);

        let (invalid_id, created_id, errored_id) = (invalid.id, created.id, errored.id);
        history.add(invalid).await;
        history.add(created).await;
        history.add(errored).await;

        let order: Vec<Uuid> = history.list().await.iter().map(|job| job.id).collect();
        assert_eq!(order, vec![errored_id, created_id, invalid_id]);

        let purged = history.purge_processed().await;
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].id, invalid_id);

        let remaining: Vec<Uuid> = history.list().await.iter().map(|job| job.id).collect();
        assert_eq!(remaining, vec![errored_id, created_id]);
    }

    #[tokio::test]
    async fn update_reports_missing_jobs() {
        let history = JobHistory::new();
        assert!(!history.update(Uuid::new_v4(), |job| job.status = JobStatus::Completed).await);
        assert!(history.get(Uuid::new_v4()).await.is_none());
    }
}
