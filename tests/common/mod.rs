// tests/common/mod.rs

//! Shared scaffolding for the integration tests under `tests/`: a couple of
//! small `Task` implementations the individual scenario files build on top
//! of, beyond what `workdag::testing::TestTask` already covers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use workdag::config::model::WorkerSection;
use workdag::dag::task::{LazyDependencySequence, RunOutcome, Task};

/// A `WorkerSection` with every field defaulted except the ones a scenario
/// cares about overriding.
pub fn worker_section(f: impl FnOnce(&mut WorkerSection)) -> WorkerSection {
    let mut cfg = WorkerSection::default();
    f(&mut cfg);
    cfg
}

/// A task whose completeness is driven by a shared flag, and whose `run()`
/// flips that flag on success — the building block for a chain where each
/// link only becomes complete once it has actually run.
pub struct ChainTask {
    id: String,
    deps: Vec<Arc<dyn Task>>,
    complete: Arc<AtomicBool>,
    log: Arc<std::sync::Mutex<Vec<String>>>,
}

impl ChainTask {
    pub fn new(id: impl Into<String>, log: Arc<std::sync::Mutex<Vec<String>>>) -> Self {
        Self {
            id: id.into(),
            deps: Vec::new(),
            complete: Arc::new(AtomicBool::new(false)),
            log,
        }
    }

    pub fn with_deps(mut self, deps: Vec<Arc<dyn Task>>) -> Self {
        self.deps = deps;
        self
    }

    /// Mark this task complete without driving it through `run()`, for
    /// scenarios that start from "already done" rather than "becomes done".
    pub fn force_complete(&self) {
        self.complete.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Task for ChainTask {
    fn task_id(&self) -> &str {
        &self.id
    }

    fn family(&self) -> &str {
        "ChainTask"
    }

    fn deps(&self) -> Vec<Arc<dyn Task>> {
        self.deps.clone()
    }

    async fn complete(&self) -> Result<bool> {
        Ok(self.complete.load(Ordering::SeqCst))
    }

    async fn run(&self) -> Option<RunOutcome> {
        self.log.lock().unwrap().push(self.id.clone());
        self.complete.store(true, Ordering::SeqCst);
        Some(RunOutcome::Unit(Ok(())))
    }
}

/// An external task (no `run()` body) whose completeness is controlled
/// entirely from outside via a shared flag — mirrors a file-drop or
/// upstream system the worker can only poll.
pub struct ExternalTask {
    id: String,
    complete: Arc<AtomicBool>,
}

impl ExternalTask {
    pub fn new(id: impl Into<String>, complete: Arc<AtomicBool>) -> Self {
        Self { id: id.into(), complete }
    }
}

#[async_trait]
impl Task for ExternalTask {
    fn task_id(&self) -> &str {
        &self.id
    }

    fn family(&self) -> &str {
        "ExternalTask"
    }

    fn is_external(&self) -> bool {
        true
    }

    async fn complete(&self) -> Result<bool> {
        Ok(self.complete.load(Ordering::SeqCst))
    }
}

/// A task that sleeps past any reasonable worker timeout, for exercising
/// the executor's deadline enforcement.
pub struct SleepTask {
    id: String,
    sleep_for: Duration,
}

impl SleepTask {
    pub fn new(id: impl Into<String>, sleep_for: Duration) -> Self {
        Self { id: id.into(), sleep_for }
    }
}

#[async_trait]
impl Task for SleepTask {
    fn task_id(&self) -> &str {
        &self.id
    }

    fn family(&self) -> &str {
        "SleepTask"
    }

    async fn complete(&self) -> Result<bool> {
        Ok(false)
    }

    async fn run(&self) -> Option<RunOutcome> {
        tokio::time::sleep(self.sleep_for).await;
        Some(RunOutcome::Unit(Ok(())))
    }
}

/// A task whose `run()` is a lazy, one-batch dependency sequence: yield a
/// single dependency, then finish once resumed. A fresh instance of the
/// sequence is built on every `run()` call (mirroring "replay from the
/// start" semantics, see `workdag`'s design notes on lazy sequences), so
/// calling `run()` again after the yielded dependency becomes complete
/// drives it straight through to completion.
pub struct YieldingTask {
    id: String,
    dep: Arc<dyn Task>,
}

impl YieldingTask {
    pub fn new(id: impl Into<String>, dep: Arc<dyn Task>) -> Self {
        Self { id: id.into(), dep }
    }
}

#[async_trait]
impl Task for YieldingTask {
    fn task_id(&self) -> &str {
        &self.id
    }

    fn family(&self) -> &str {
        "YieldingTask"
    }

    async fn complete(&self) -> Result<bool> {
        Ok(false)
    }

    async fn run(&self) -> Option<RunOutcome> {
        Some(RunOutcome::Lazy(Box::new(OneBatchSequence {
            dep: Some(self.dep.clone()),
        })))
    }
}

struct OneBatchSequence {
    dep: Option<Arc<dyn Task>>,
}

#[async_trait]
impl LazyDependencySequence for OneBatchSequence {
    async fn next(&mut self) -> Result<Option<Vec<Arc<dyn Task>>>> {
        match self.dep.take() {
            Some(dep) => Ok(Some(vec![dep])),
            None => Ok(None),
        }
    }
}

#[allow(dead_code)]
pub fn empty_params() -> HashMap<String, String> {
    HashMap::new()
}
