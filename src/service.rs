// src/service.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::{timestamp, ServiceStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Running,
    ShuttingDown,
    Dead,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Starting => "STARTING",
            RunState::Running => "RUNNING",
            RunState::ShuttingDown => "SHUTTING_DOWN",
            RunState::Dead => "DEAD",
        })
    }
}

/// Process-wide status plus the token both listeners and the job worker
/// watch for shutdown.
#[derive(Debug, Clone)]
pub struct Service {
    name: Arc<str>,
    state: Arc<RwLock<RunState>>,
    shutdown: CancellationToken,
}

impl Service {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            state: Arc::new(RwLock::new(RunState::Starting)),
            shutdown: CancellationToken::new(),
        }
    }

    pub async fn state(&self) -> RunState {
        *self.state.read().await
    }

    pub async fn set_state(&self, state: RunState) {
        *self.state.write().await = state;
        info!(service = %self.name, %state, "service state changed");
    }

    pub async fn status(&self) -> ServiceStatus {
        ServiceStatus {
            service_name: self.name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: self.state().await.to_string(),
            time: timestamp(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Marks the service as shutting down and releases everything waiting on
    /// the shutdown token.
    pub async fn request_shutdown(&self) {
        self.set_state(RunState::ShuttingDown).await;
        self.shutdown.cancel();
    }

    /// Blocks until `/shutdown` is posted or the process is interrupted.
    pub async fn wait_for_shutdown(&self) {
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!(error = %err, "unable to listen for interrupt, shutting down");
                } else {
                    info!("interrupt received");
                }
                self.request_shutdown().await;
            }
        }
    }
}
