//! Startup and shutdown of the stateful collaborators behind the relay.
//!
//! Startup and shutdown deliberately use different join strategies: `start`
//! is fail-fast so the listener never binds on a half-initialized process,
//! while `stop` settles every close and reports each outcome.

use async_trait::async_trait;
use futures::future::{join_all, try_join_all};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

use crate::error::{SuppressionError, SuppressionResult};

/// Something with a connection to open at startup and close at shutdown.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Collaborator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn init(&self) -> SuppressionResult<()>;

    async fn close(&self) -> SuppressionResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseOutcome {
    pub collaborator: &'static str,
    pub result: Result<(), String>,
}

/// Per-collaborator outcome of [`ServiceLifecycle::stop`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub outcomes: Vec<CloseOutcome>,
}

impl ShutdownReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &CloseOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Process exit code: 0 when every close succeeded, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.all_succeeded() { 0 } else { 1 }
    }
}

/// Drives `Stopped -> Starting -> Running -> Stopping -> Stopped`.
pub struct ServiceLifecycle {
    collaborators: Vec<Arc<dyn Collaborator>>,
    state: Mutex<LifecycleState>,
}

impl ServiceLifecycle {
    pub fn new(collaborators: Vec<Arc<dyn Collaborator>>) -> Self {
        Self {
            collaborators,
            state: Mutex::new(LifecycleState::Stopped),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        info!(from = %*state, to = %next, "Lifecycle transition");
        *state = next;
    }

    /// Initialize every collaborator concurrently.
    ///
    /// The first failure fails the whole start. Collaborators that did come
    /// up are then closed on a best-effort basis and the lifecycle returns to
    /// `Stopped`.
    pub async fn start(&self) -> SuppressionResult<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != LifecycleState::Stopped {
                return Err(SuppressionError::InvalidTransition {
                    action: "start",
                    state: state.as_str(),
                });
            }
            *state = LifecycleState::Starting;
        }
        info!(collaborators = self.collaborators.len(), "Starting collaborators");

        let inits = self.collaborators.iter().map(|collaborator| async move {
            collaborator
                .init()
                .await
                .map_err(|e| (collaborator.name(), e))
        });

        match try_join_all(inits).await {
            Ok(_) => {
                self.set_state(LifecycleState::Running);
                Ok(())
            }
            Err((collaborator, e)) => {
                error!(collaborator, error = %e, "Collaborator failed to start");
                let report = self.close_all().await;
                for failure in report.failures() {
                    warn!(collaborator = failure.collaborator, "Cleanup after failed start did not close cleanly");
                }
                self.set_state(LifecycleState::Stopped);
                Err(SuppressionError::Startup {
                    collaborator: collaborator.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Close every collaborator concurrently and wait for all of them.
    ///
    /// Never fails: errors and panics from individual closes are logged and
    /// collected in the report. Requests still in flight are not drained.
    pub async fn stop(&self) -> ShutdownReport {
        self.set_state(LifecycleState::Stopping);
        let report = self.close_all().await;
        self.set_state(LifecycleState::Stopped);

        if report.all_succeeded() {
            info!("All collaborators closed");
        }
        report
    }

    async fn close_all(&self) -> ShutdownReport {
        let handles = self.collaborators.iter().map(|collaborator| {
            let collaborator = Arc::clone(collaborator);
            let name = collaborator.name();
            (name, tokio::spawn(async move { collaborator.close().await }))
        });
        let (names, handles): (Vec<_>, Vec<_>) = handles.unzip();

        let outcomes = names
            .into_iter()
            .zip(join_all(handles).await)
            .map(|(collaborator, joined)| {
                let result = match joined {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(e) => Err(format!("close task failed: {}", e)),
                };
                if let Err(reason) = &result {
                    error!(collaborator, reason = %reason, "Failed to close collaborator");
                }
                CloseOutcome {
                    collaborator,
                    result,
                }
            })
            .collect();

        ShutdownReport { outcomes }
    }
}
