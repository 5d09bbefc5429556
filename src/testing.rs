// src/testing.rs

//! Test doubles for exercising the coordinator without a real scheduler
//! process.
//!
//! Mirrors the shape of `watchdag-cli`'s `test-utils` crate: a fake backend
//! that records what ran, plus a `tracing` init helper safe to call more
//! than once per test binary.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};

use anyhow::Result;
use async_trait::async_trait;
use tracing_subscriber::{fmt, EnvFilter};

use crate::dag::task::{RunOutcome, Task};
use crate::dag::worker_info::WorkerInfo;
use crate::scheduler_client::{AddTaskRequest, GetWorkResponse, SchedulerClient, TaskId};

static INIT: Once = Once::new();

/// Initialise tracing for tests; safe to call from every test function.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a bounded timeout so a hung test doesn't wedge the
/// whole suite.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("test timed out after 5 seconds")
}

/// In-memory scheduler that always hands back exactly the task ids it was
/// told about via [`FakeSchedulerClient::seed_work`], in order, and records
/// every `add_task`/`add_worker`/`ping` call it received.
#[derive(Default)]
pub struct FakeSchedulerClient {
    inner: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    work_queue: std::collections::VecDeque<TaskId>,
    added_tasks: Vec<(TaskId, String)>,
    added_workers: Vec<String>,
    pings: Vec<String>,
}

impl FakeSchedulerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task id to be handed back from the next `get_work` call.
    pub fn seed_work(&self, task_id: impl Into<String>) {
        self.inner.lock().unwrap().work_queue.push_back(task_id.into());
    }

    /// Snapshot of every `(task_id, status)` pair reported via `add_task`.
    pub fn reported_statuses(&self) -> Vec<(TaskId, String)> {
        self.inner.lock().unwrap().added_tasks.clone()
    }

    pub fn ping_count(&self) -> usize {
        self.inner.lock().unwrap().pings.len()
    }
}

#[async_trait]
impl SchedulerClient for FakeSchedulerClient {
    async fn add_worker(&self, info: &WorkerInfo) -> Result<()> {
        self.inner.lock().unwrap().added_workers.push(info.worker_id.clone());
        Ok(())
    }

    async fn ping(&self, worker_id: &str) -> Result<()> {
        self.inner.lock().unwrap().pings.push(worker_id.to_string());
        Ok(())
    }

    async fn add_task(&self, req: AddTaskRequest<'_>) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .added_tasks
            .push((req.task_id.to_string(), format!("{:?}", req.status)));
        Ok(())
    }

    async fn get_work(
        &self,
        _worker_id: &str,
        _host: Option<&str>,
        _assistant: bool,
    ) -> Result<GetWorkResponse> {
        let mut state = self.inner.lock().unwrap();
        let task_id = state.work_queue.pop_front();
        let n_pending_tasks = state.work_queue.len() as u64;
        Ok(GetWorkResponse {
            task_id,
            running_tasks: Vec::new(),
            n_pending_tasks,
            n_unique_pending: n_pending_tasks,
            task_module: None,
            task_family: None,
            task_params: None,
        })
    }
}

/// A configurable `Task` for tests: completes according to a shared flag,
/// optionally fails `run()`, and records every invocation of `run()` into a
/// shared log so assertions can check ordering.
pub struct TestTask {
    id: String,
    family: String,
    complete: Arc<std::sync::atomic::AtomicBool>,
    fail: bool,
    deps: Vec<Arc<dyn Task>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl TestTask {
    pub fn new(id: impl Into<String>, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            id: id.into(),
            family: "TestTask".to_string(),
            complete: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            fail: false,
            deps: Vec::new(),
            log,
        }
    }

    pub fn with_deps(mut self, deps: Vec<Arc<dyn Task>>) -> Self {
        self.deps = deps;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// A handle test code can use to flip this task's `complete()` state
    /// from outside, simulating an externally-produced artifact appearing.
    pub fn completion_flag(&self) -> Arc<std::sync::atomic::AtomicBool> {
        self.complete.clone()
    }
}

#[async_trait]
impl Task for TestTask {
    fn task_id(&self) -> &str {
        &self.id
    }

    fn family(&self) -> &str {
        &self.family
    }

    fn deps(&self) -> Vec<Arc<dyn Task>> {
        self.deps.clone()
    }

    async fn complete(&self) -> Result<bool> {
        Ok(self.complete.load(std::sync::atomic::Ordering::SeqCst))
    }

    async fn run(&self) -> Option<RunOutcome> {
        self.log.lock().unwrap().push(self.id.clone());
        if self.fail {
            Some(RunOutcome::Unit(Err(anyhow::anyhow!("simulated failure"))))
        } else {
            self.complete.store(true, std::sync::atomic::Ordering::SeqCst);
            Some(RunOutcome::Unit(Ok(())))
        }
    }
}

/// Build a `HashMap<String, String>` param set from `key, value` pairs
/// without the `.to_string()` boilerplate at every call site.
pub fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
