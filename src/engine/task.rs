//! Start/stop handle for the reply poller.
//!
//! The handle wraps a `watch` channel holding the task status. Starting
//! is a compare-and-set from `Idle` to `Running`, so a second start is
//! rejected rather than queued. Stop requests are observed cooperatively,
//! and `sleep` wakes as soon as one arrives.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::types::{PipelineError, TaskStatus};

#[derive(Debug, Clone)]
pub struct PollerHandle {
    status: Arc<watch::Sender<TaskStatus>>,
}

impl Default for PollerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PollerHandle {
    pub fn new() -> Self {
        let (status, _) = watch::channel(TaskStatus::Idle);
        Self { status: Arc::new(status) }
    }

    pub fn status(&self) -> TaskStatus {
        *self.status.borrow()
    }

    /// Running, including while a stop request is pending.
    pub fn is_running(&self) -> bool {
        self.status() != TaskStatus::Idle
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == TaskStatus::StopRequested
    }

    /// Claim the handle for a new run.
    pub fn try_start(&self) -> Result<(), PipelineError> {
        let started = self.status.send_if_modified(|status| {
            if *status == TaskStatus::Idle {
                *status = TaskStatus::Running;
                true
            } else {
                false
            }
        });
        if started {
            Ok(())
        } else {
            Err(PipelineError::AlreadyRunning)
        }
    }

    /// Ask a running task to stop. Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        self.status.send_if_modified(|status| {
            if *status == TaskStatus::Running {
                *status = TaskStatus::StopRequested;
                true
            } else {
                false
            }
        })
    }

    /// Mark the run as over; called by the task itself on exit.
    pub fn finish(&self) {
        self.status.send_replace(TaskStatus::Idle);
    }

    /// Sleep for `duration` unless a stop request arrives first.
    /// Returns true when the full duration elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let mut rx = self.status.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = rx.wait_for(|s| *s == TaskStatus::StopRequested) => false,
        }
    }
}
