// src/exec/process.rs

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::dag::task::Task;
use crate::engine::result::{Outcome, OutcomeSender, TaskResult};
use crate::errors::WorkerError;
use crate::exec::ExecutorBackend;
use crate::scheduler_client::TaskId;

/// Prefix a re-exec'd child prints before the JSON-encoded [`TaskResult`] on
/// its last stdout line, so the parent can tell a task's own stdout apart
/// from the control-channel result.
pub const RESULT_MARKER: &str = "WORKDAG_RESULT:";

/// Runs each task in a freshly spawned copy of this same binary, isolating
/// task bodies from the worker process and from each other.
///
/// Selected when `[worker].processes > 1`. Spawns
/// `current_exe() --worker-run-task <json> --config <path>`; the child
/// re-enters `main()`, resolves the task via the same statically-registered
/// [`crate::exec::registry::TaskRegistry`], runs it, and reports the result
/// back over stdout rather than re-deriving the scheduler connection.
///
/// Shares its spawn lock (the "fork lock") with
/// [`crate::engine::keep_alive::KeepAlive`]: process creation and scheduler
/// keep-alive pings are serialised against each other, even though neither
/// actually depends on the other here — it keeps PIDs and ping timing easy
/// to reason about from logs alone.
pub struct ProcessExecutor {
    outcome_tx: OutcomeSender,
    current_exe: PathBuf,
    config_path: String,
    fork_lock: Arc<Mutex<()>>,
}

impl ProcessExecutor {
    pub fn new(
        config_path: impl Into<String>,
        outcome_tx: OutcomeSender,
        fork_lock: Arc<Mutex<()>>,
    ) -> anyhow::Result<Self> {
        let current_exe = std::env::current_exe()?;
        Ok(Self {
            outcome_tx,
            current_exe,
            config_path: config_path.into(),
            fork_lock,
        })
    }
}

#[async_trait]
impl ExecutorBackend for ProcessExecutor {
    async fn submit(&self, task_id: TaskId, task: Arc<dyn Task>, timeout: Option<Duration>) {
        let key = task.key();
        let key_json = match serde_json::to_string(&key) {
            Ok(s) => s,
            Err(err) => {
                let _ = self
                    .outcome_tx
                    .send(Outcome {
                        task_id,
                        result: TaskResult::Failure(format!("failed to serialise task key: {err}")),
                    })
                    .await;
                return;
            }
        };

        let current_exe = self.current_exe.clone();
        let config_path = self.config_path.clone();
        let outcome_tx = self.outcome_tx.clone();
        let fork_lock = self.fork_lock.clone();

        tokio::spawn(async move {
            let result = run_child(
                &task_id,
                &current_exe,
                &config_path,
                &key_json,
                timeout,
                &fork_lock,
            )
            .await
            .unwrap_or_else(|err| TaskResult::Failure(err.to_string()));
            let _ = outcome_tx.send(Outcome { task_id, result }).await;
        });
    }
}

async fn run_child(
    task_id: &TaskId,
    current_exe: &PathBuf,
    config_path: &str,
    key_json: &str,
    timeout: Option<Duration>,
    fork_lock: &Arc<Mutex<()>>,
) -> anyhow::Result<TaskResult> {
    let mut child = {
        let _guard = fork_lock.lock().await;
        Command::new(current_exe)
            .arg("--config")
            .arg(config_path)
            .arg("--worker-run-task")
            .arg(key_json)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_task = tokio::spawn(async move {
        let mut result_line: Option<String> = None;
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(payload) = line.strip_prefix(RESULT_MARKER) {
                    result_line = Some(payload.to_string());
                } else {
                    debug!("child stdout: {}", line);
                }
            }
        }
        result_line
    });

    if let Some(stderr) = stderr {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("child stderr: {}", line);
            }
        });
    }

    let wait_result = match timeout {
        Some(dur) => tokio::time::timeout(dur, child.wait()).await,
        None => Ok(child.wait().await),
    };

    let status = match wait_result {
        Ok(status) => status?,
        Err(_) => {
            let err = WorkerError::ChildLiveness {
                task_id: task_id.clone(),
                reason: "timed out and was terminated".to_string(),
            };
            warn!(error = %err, timeout_secs = timeout.map(|d| d.as_secs()), "child task exceeded worker_timeout");
            return Ok(TaskResult::Failure("timed out and was terminated".to_string()));
        }
    };

    let result_line = stdout_task.await.unwrap_or(None);

    if !status.success() && result_line.is_none() {
        let err = WorkerError::ChildLiveness {
            task_id: task_id.clone(),
            reason: format!("exited with status {status} and produced no result"),
        };
        warn!(error = %err, "child process produced no result");
        return Ok(TaskResult::Failure(format!(
            "child process exited with status {status} and produced no result"
        )));
    }

    match result_line {
        Some(line) => Ok(serde_json::from_str(&line)?),
        None => {
            let err = WorkerError::ChildLiveness {
                task_id: task_id.clone(),
                reason: "exited without reporting a result".to_string(),
            };
            warn!(error = %err, "child process exited without reporting a result");
            Ok(TaskResult::Failure(
                "child process exited without reporting a result".to_string(),
            ))
        }
    }
}
