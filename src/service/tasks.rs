//! Fire-and-forget execution of side effects that must not delay a request:
//! the post-login sweep and the post-validation refresh.

use crate::error::app_error::AppError;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

pub type BackgroundTask = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

#[async_trait::async_trait]
pub trait TaskRunner: Send + Sync {
    /// Hands `task` off for execution. Failures are logged and dropped, never returned.
    async fn submit(&self, name: &'static str, task: BackgroundTask);
}

/// Detaches each task onto the tokio runtime, bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct TokioTaskRunner {
    timeout: Duration,
}

impl TokioTaskRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait::async_trait]
impl TaskRunner for TokioTaskRunner {
    async fn submit(&self, name: &'static str, task: BackgroundTask) {
        let timeout = self.timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, task).await {
                Ok(result) => log_outcome(name, result),
                Err(_) => warn!(task = name, timeout_secs = timeout.as_secs(), "background task timed out"),
            }
        });
    }
}

/// Runs the task to completion before `submit` returns.
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineTaskRunner;

#[cfg(test)]
#[async_trait::async_trait]
impl TaskRunner for InlineTaskRunner {
    async fn submit(&self, name: &'static str, task: BackgroundTask) {
        log_outcome(name, task.await);
    }
}

fn log_outcome(name: &'static str, result: Result<(), AppError>) {
    match result {
        Ok(()) => debug!(task = name, "background task finished"),
        Err(err) => warn!(task = name, error = ?err, "background task failed"),
    }
}
