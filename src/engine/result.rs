// src/engine/result.rs

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::dag::task::TaskKey;
use crate::scheduler_client::TaskId;

/// What became of a dispatched task, as reported back to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskResult {
    /// Carries the JSON-encoded return value of `Task::on_success()`, used
    /// as the outcome's explanation when reported to the scheduler.
    Success(String),
    Failure(String),
    /// The task's lazily-evaluated body yielded a batch of dependencies
    /// that were not all complete; the task itself did not finish and
    /// should be rescheduled once they are. Carries the newly discovered
    /// dependency keys so the coordinator can register them.
    Suspended(Vec<TaskKey>),
    /// A statically-declared dependency (`Task::deps()`) failed its
    /// last-moment `complete()` recheck at run time. Reported as a terminal
    /// failure with an explanation, but carries the offending dependency
    /// ids so the coordinator applies the same reschedule bookkeeping as
    /// `Suspended` rather than abandoning the task outright.
    MissingDeps(Vec<TaskId>, String),
}

/// One entry on the result channel: which task, and what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub task_id: TaskId,
    pub result: TaskResult,
}

pub type OutcomeSender = mpsc::Sender<Outcome>;
pub type OutcomeReceiver = mpsc::Receiver<Outcome>;

/// Create the bounded channel executors report results on.
///
/// Sized generously relative to `worker_processes`: a burst of simultaneous
/// completions should never block a backend from reporting.
pub fn outcome_channel(capacity: usize) -> (OutcomeSender, OutcomeReceiver) {
    mpsc::channel(capacity.max(16))
}
