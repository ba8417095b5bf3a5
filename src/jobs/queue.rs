// src/jobs/queue.rs
//
// Bounded hand-off between request handlers and the single job worker.
// Producers never wait: a full queue is reported straight back.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::JobHistory;
use crate::annealer::{RunError, ScenarioRunner};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("job queue is full ({capacity} waiting)")]
    Full { capacity: usize },

    #[error("job worker has stopped")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<Uuid>,
    capacity: usize,
}

impl JobQueue {
    /// Creates the queue and the worker that drains it.
    pub fn new(
        capacity: usize,
        history: JobHistory,
        runner: Arc<dyn ScenarioRunner>,
    ) -> (Self, JobWorker) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender, capacity }, JobWorker { receiver, history, runner })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn enqueue(&self, id: Uuid) -> Result<(), QueueError> {
        self.sender.try_send(id).map_err(|err| match err {
            TrySendError::Full(_) => QueueError::Full { capacity: self.capacity },
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}

pub struct JobWorker {
    receiver: mpsc::Receiver<Uuid>,
    history: JobHistory,
    runner: Arc<dyn ScenarioRunner>,
}

impl JobWorker {
    /// Runs queued jobs one after another until `shutdown` fires or every
    /// queue handle is dropped. A job in progress is always finished first.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("job worker started");
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("job worker received shutdown signal");
                    break;
                }

                next = self.receiver.recv() => match next {
                    Some(id) => self.process(id).await,
                    None => break,
                },
            }
        }
        info!("job worker stopped");
    }

    async fn process(&self, id: Uuid) {
        let Some(job) = self.history.get(id).await else {
            warn!(job = %id, "queued job left history before it started");
            return;
        };
        if job.status.is_terminal() {
            warn!(job = %id, status = ?job.status, "queued job already finished, skipping");
            return;
        }
        let Some(scenario) = job.scenario().cloned() else {
            warn!(job = %id, "queued job has no configuration, skipping");
            return;
        };

        info!(job = %id, scenario = %scenario.scenario.name, "job started");
        let runner = Arc::clone(&self.runner);
        let result = tokio::task::spawn_blocking(move || runner.run(&scenario))
            .await
            .unwrap_or_else(|err| {
                error!(job = %id, error = %err, "scenario runner aborted");
                Err(RunError::Aborted(err.to_string()))
            });

        let found = self
            .history
            .update(id, |job| match &result {
                Ok(outcome) => job.complete(outcome),
                Err(err) => job.fail(err),
            })
            .await;
        if !found {
            warn!(job = %id, "job left history before it finished");
        }
    }
}
