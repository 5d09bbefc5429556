// src/dag/task.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifies a task's implementation independent of its parameters: the
/// pair used to look it up again in a [`crate::exec::registry::TaskRegistry`]
/// after a round trip through the scheduler, or across the OS-process
/// boundary of the process executor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub module: String,
    pub family: String,
    pub params: HashMap<String, String>,
}

/// A unit of work this worker can claim, run, and report on.
///
/// A stable identity (`task_id`/`family`/`params`), a way to check whether
/// its output already holds (`complete`), and a body (`run`) that may
/// itself discover further dependencies while executing.
#[async_trait]
pub trait Task: Send + Sync {
    /// Stable, globally unique identifier for this task instance.
    fn task_id(&self) -> &str;

    /// Human-readable task family/class name (used for registry lookup and
    /// scheduler bookkeeping).
    fn family(&self) -> &str {
        "task"
    }

    /// The defining module of this task's implementation, used together
    /// with `family` to resolve a [`TaskKey`] back into a `Task` via the
    /// registry.
    fn module(&self) -> &str {
        "default"
    }

    /// String-serialised parameters identifying this task instance.
    fn params(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    fn key(&self) -> TaskKey {
        TaskKey {
            module: self.module().to_string(),
            family: self.family().to_string(),
            params: self.params(),
        }
    }

    /// Scheduling priority; higher runs first among otherwise-ready tasks.
    fn priority(&self) -> i64 {
        0
    }

    /// Named resource requirements and the amount of each consumed while
    /// running (advisory; enforced by the scheduler, not this worker).
    fn resources(&self) -> HashMap<String, f64> {
        HashMap::new()
    }

    /// If true, this task is never registered as runnable work; it exists
    /// only to be depended upon and checked for completeness.
    fn disabled(&self) -> bool {
        false
    }

    /// Declares that this task has no `run()` body of its own — it only
    /// ever checks `complete()` against something produced outside this
    /// worker's control (a file drop, an upstream system). The enqueuer
    /// uses this to decide whether an incomplete instance should be
    /// reported to the scheduler as runnable at all: without a body there
    /// is nothing a worker could do with it besides poll `complete()`
    /// again later.
    fn is_external(&self) -> bool {
        false
    }

    /// Per-task override of the worker's default timeout, in seconds.
    /// `None` defers to `[worker].worker-timeout`.
    fn worker_timeout(&self) -> Option<Duration> {
        None
    }

    /// Direct dependencies, known statically ahead of `run()`.
    ///
    /// Tasks that discover dependencies dynamically (lazily, during `run`)
    /// typically return an empty vec here and yield dependencies from
    /// `run()`'s [`RunOutcome::Lazy`] sequence instead.
    fn deps(&self) -> Vec<Arc<dyn Task>> {
        Vec::new()
    }

    /// Whether this task's output already exists. Checked before
    /// scheduling and again after a dependency batch resolves.
    async fn complete(&self) -> Result<bool>;

    /// Execute the task. Returning `None` means this task has no body of
    /// its own (an "external" task: it only checks `complete()`).
    async fn run(&self) -> Option<RunOutcome> {
        None
    }

    /// Called after a successful `run()` (or a `complete()` that turned out
    /// already true for an external task). The returned value is JSON-
    /// encoded and reported to the scheduler as the outcome's explanation.
    async fn on_success(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Called when `run()` returns an error, or a lazily-yielded dependency
    /// batch never completes within the reschedule budget. The returned
    /// string is reported to the scheduler as the outcome's explanation —
    /// the Rust analogue of a wrapped traceback.
    async fn on_failure(&self, err: &anyhow::Error) -> String {
        format!("{err:?}")
    }

    /// Lifecycle hook invoked by the executor and enqueuer at the points
    /// described by [`TaskEvent`]. Default is a no-op; override to observe
    /// `START`, `PROCESSING_TIME`, `SUCCESS`, `FAILURE`,
    /// `DEPENDENCY_DISCOVERED`, `DEPENDENCY_MISSING`, `DEPENDENCY_PRESENT`,
    /// or `BROKEN_TASK`.
    fn trigger_event(&self, _event: TaskEvent) {}
}

/// The result of running a task's `run()` body.
pub enum RunOutcome {
    /// A task that runs to completion in one shot, synchronously from the
    /// worker's point of view.
    Unit(Result<()>),

    /// A task whose `run()` is itself a sequence of steps, each of which may
    /// yield further tasks to depend on before continuing. Mirrors a
    /// generator-style `run()` that does `deps = yield other_task`.
    Lazy(Box<dyn LazyDependencySequence>),
}

/// One step of a lazily-evaluated task body.
///
/// A lazy task's execution alternates between this sequence producing a
/// batch of dependencies and the caller resolving them via `complete()`
/// checks before calling back in. All of this happens within a single
/// process invocation: a batch that is not yet complete causes the task to
/// suspend and be rescheduled as a whole, replaying from the start and
/// fast-forwarding through already-satisfied batches.
#[async_trait]
pub trait LazyDependencySequence: Send {
    /// Produce the next batch of dependencies to wait on, or `None` if the
    /// sequence is finished (the task's body has run to completion).
    async fn next(&mut self) -> Result<Option<Vec<Arc<dyn Task>>>>;
}

/// Lifecycle events a task may want to observe via [`Task::trigger_event`].
///
/// Emitted at the points named in each variant; a task implementation
/// overrides `trigger_event` to act on the ones it cares about (metrics,
/// notifications) and ignores the rest via the default no-op.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    Started { task_id: String },
    ProcessingTime { task_id: String, seconds: f64 },
    Success { task_id: String },
    Failure { task_id: String, reason: String },
    DependencyDiscovered { task_id: String, dep_task_id: String },
    DependencyMissing { task_id: String },
    DependencyPresent { task_id: String },
    BrokenTask { task_id: String, reason: String },
}
