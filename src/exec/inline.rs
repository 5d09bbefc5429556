// src/exec/inline.rs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::dag::task::Task;
use crate::engine::result::{Outcome, OutcomeSender, TaskResult};
use crate::errors::WorkerError;
use crate::exec::body::run_task_body;
use crate::exec::ExecutorBackend;
use crate::scheduler_client::TaskId;

/// Runs tasks as plain Tokio tasks in the worker's own process.
///
/// Selected when `[worker].processes <= 1`: no process isolation, no
/// re-exec, just an async task per in-flight job. Appropriate for trusted,
/// short-lived task bodies and for tests.
pub struct InlineExecutor {
    outcome_tx: OutcomeSender,
}

impl InlineExecutor {
    pub fn new(outcome_tx: OutcomeSender) -> Self {
        Self { outcome_tx }
    }
}

#[async_trait]
impl ExecutorBackend for InlineExecutor {
    async fn submit(&self, task_id: TaskId, task: Arc<dyn Task>, timeout: Option<Duration>) {
        let outcome_tx = self.outcome_tx.clone();

        tokio::spawn(async move {
            let result = match timeout {
                Some(dur) => match tokio::time::timeout(dur, run_task_body(&task)).await {
                    Ok(result) => result,
                    Err(_) => {
                        let err = WorkerError::ChildLiveness {
                            task_id: task_id.clone(),
                            reason: "timed out and was terminated".to_string(),
                        };
                        warn!(error = %err, timeout_secs = dur.as_secs(), "task timed out");
                        TaskResult::Failure("timed out and was terminated".to_string())
                    }
                },
                None => run_task_body(&task).await,
            };

            let _ = outcome_tx.send(Outcome { task_id, result }).await;
        });
    }
}
