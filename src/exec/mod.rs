// src/exec/mod.rs

//! Task execution backends.
//!
//! Both backends share [`body::run_task_body`] so the semantics of running a
//! task (checking `complete()`, driving a lazy dependency sequence,
//! reporting the outcome) never drift between isolation strategies — only
//! *where* the body runs differs.
//!
//! - [`inline`] runs task bodies as plain Tokio tasks in this process.
//! - [`process`] runs each task body in a freshly re-exec'd child process.
//! - [`registry`] resolves a task id handed back by the scheduler into a
//!   runnable [`crate::dag::task::Task`].

pub mod body;
pub mod inline;
pub mod process;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::dag::task::Task;
use crate::scheduler_client::TaskId;

pub use inline::InlineExecutor;
pub use process::ProcessExecutor;
pub use registry::{StaticTaskRegistry, TaskRegistry};

/// Dispatches a single task for execution and reports its outcome
/// asynchronously on the channel the backend was constructed with.
///
/// `submit` itself never blocks on the task's completion; it hands the work
/// off (to a Tokio task or a child process) and returns immediately so the
/// coordinator can keep servicing `get_work` up to `worker_processes`
/// in-flight tasks.
#[async_trait]
pub trait ExecutorBackend: Send + Sync {
    async fn submit(&self, task_id: TaskId, task: Arc<dyn Task>, timeout: Option<Duration>);
}

/// Select an executor backend based on configured process count: inline for
/// a single in-flight task, a re-exec'd child process per task otherwise.
pub fn backend_for_processes(
    processes: usize,
    config_path: &str,
    outcome_tx: crate::engine::result::OutcomeSender,
    fork_lock: Arc<Mutex<()>>,
) -> anyhow::Result<Arc<dyn ExecutorBackend>> {
    if processes <= 1 {
        Ok(Arc::new(InlineExecutor::new(outcome_tx)))
    } else {
        Ok(Arc::new(ProcessExecutor::new(config_path, outcome_tx, fork_lock)?))
    }
}
