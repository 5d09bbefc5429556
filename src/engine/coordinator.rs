// src/engine/coordinator.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::model::WorkerSection;
use crate::dag::enqueuer::{ApplyAsync, Enqueuer, InlineApply};
use crate::dag::task::Task;
use crate::dag::worker_info::WorkerInfo;
use crate::engine::result::{outcome_channel, OutcomeReceiver, TaskResult};
use crate::errors::WorkerError;
use crate::exec::{backend_for_processes, ExecutorBackend, TaskRegistry};
use crate::scheduler_client::{AddTaskRequest, SchedulerClient, TaskId, TaskStatus};

/// Drives the claim/run/report cycle against a scheduler: the async
/// analogue of `Worker.run`.
pub struct Coordinator {
    scheduler: Arc<dyn SchedulerClient>,
    executor: Arc<dyn ExecutorBackend>,
    registry: Arc<dyn TaskRegistry>,
    outcome_rx: OutcomeReceiver,
    worker_info: WorkerInfo,
    fork_lock: Arc<Mutex<()>>,

    processes: usize,
    wait_interval: Duration,
    max_reschedules: u32,
    worker_timeout: Option<Duration>,
    task_limit: usize,
    retry_external_tasks: bool,
    keep_alive: bool,
    count_uniques: bool,
    assistant: bool,

    scheduled: HashMap<TaskId, Arc<dyn Task>>,
    running: std::collections::HashSet<TaskId>,
    unfulfilled_counts: HashMap<TaskId, u32>,
    run_succeeded: bool,
}

impl Coordinator {
    pub fn new(
        scheduler: Arc<dyn SchedulerClient>,
        registry: Arc<dyn TaskRegistry>,
        worker_info: WorkerInfo,
        cfg: &WorkerSection,
        config_path: &str,
    ) -> Result<Self> {
        let (outcome_tx, outcome_rx) = outcome_channel(cfg.processes * 2);
        let fork_lock = Arc::new(Mutex::new(()));
        let executor =
            backend_for_processes(cfg.processes, config_path, outcome_tx, fork_lock.clone())?;

        let worker_timeout = if cfg.worker_timeout > 0 {
            Some(Duration::from_secs(cfg.worker_timeout))
        } else {
            None
        };

        Ok(Self {
            scheduler,
            executor,
            registry,
            outcome_rx,
            worker_info,
            fork_lock,
            processes: cfg.processes.max(1),
            wait_interval: Duration::from_secs(cfg.wait_interval.max(1)),
            max_reschedules: cfg.max_reschedules,
            worker_timeout,
            task_limit: cfg.task_limit,
            retry_external_tasks: cfg.retry_external_tasks,
            keep_alive: cfg.keep_alive,
            count_uniques: cfg.count_uniques,
            assistant: cfg.assistant,
            scheduled: HashMap::new(),
            running: std::collections::HashSet::new(),
            unfulfilled_counts: HashMap::new(),
            run_succeeded: true,
        })
    }

    pub fn fork_lock(&self) -> Arc<Mutex<()>> {
        self.fork_lock.clone()
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_info.worker_id
    }

    /// Register `root` with the scheduler, then run the claim/execute loop
    /// to completion. Returns `true` if every task this worker ever ran (or
    /// found already complete) finished successfully.
    pub async fn run(&mut self, root: Arc<dyn Task>) -> Result<bool> {
        info!(processes = self.processes, "worker run loop starting");

        if let Err(err) = self.scheduler.add_worker(&self.worker_info).await {
            warn!(error = %err, "add_worker RPC failed; continuing anyway");
        }

        self.worker_info.note_first_task(root.task_id());
        self.enqueue(root).await;

        loop {
            while self.running.len() >= self.processes {
                self.handle_next_task().await?;
            }

            let work = tokio::select! {
                res = self.scheduler.get_work(
                    &self.worker_info.worker_id,
                    self.worker_info.host.as_deref(),
                    self.assistant,
                ) => res,
                _ = tokio::signal::ctrl_c() => {
                    warn!("received interrupt; draining in-flight tasks before exit");
                    break;
                }
            };

            let resp = match work {
                Ok(resp) => resp,
                Err(err) => {
                    warn!(error = %err, "get_work RPC failed; backing off");
                    tokio::time::sleep(self.wait_interval).await;
                    continue;
                }
            };

            match resp.task_id {
                None => {
                    debug!(
                        pending = resp.n_pending_tasks,
                        unique_pending = resp.n_unique_pending,
                        "no work available"
                    );
                    if self.running.is_empty() {
                        if self.should_keep_alive(resp.n_pending_tasks, resp.n_unique_pending) {
                            tokio::time::sleep(self.wait_interval).await;
                            continue;
                        } else {
                            break;
                        }
                    } else {
                        self.handle_next_task().await?;
                        continue;
                    }
                }
                Some(task_id) => {
                    debug!(pending = resp.n_pending_tasks, "pending tasks");
                    if !self.scheduled.contains_key(&task_id) {
                        let params = resp
                            .task_params
                            .as_deref()
                            .and_then(parse_params)
                            .unwrap_or_default();
                        match self.registry.resolve(
                            resp.task_module.as_deref(),
                            resp.task_family.as_deref().unwrap_or_default(),
                            &params,
                        ) {
                            Ok(task) => {
                                info!(task_id = %task_id, "did not have task scheduled, loaded it dynamically");
                                self.scheduled.insert(task_id.clone(), task);
                            }
                            Err(err) => {
                                let err = WorkerError::Resolution {
                                    task_id: task_id.clone(),
                                    source: err,
                                };
                                warn!(task_id = %task_id, error = %err, "could not resolve dynamically assigned task");
                                self.run_succeeded = false;
                                let _ = self
                                    .scheduler
                                    .add_task(AddTaskRequest {
                                        worker: &self.worker_info.worker_id,
                                        task_id: &task_id,
                                        status: TaskStatus::Failed,
                                        runnable: Some(false),
                                        deps: Vec::new(),
                                        new_deps: Vec::new(),
                                        expl: Some(err.to_string()),
                                        priority: 0,
                                        resources: HashMap::new(),
                                        family: "",
                                        module: "",
                                        params: HashMap::new(),
                                    })
                                    .await;
                                continue;
                            }
                        }
                    }
                    self.dispatch(task_id).await;
                }
            }
        }

        while !self.running.is_empty() {
            self.handle_next_task().await?;
        }

        Ok(self.run_succeeded)
    }

    fn should_keep_alive(&self, n_pending_tasks: u64, n_unique_pending: u64) -> bool {
        keep_alive_policy(
            self.keep_alive,
            self.assistant,
            self.count_uniques,
            n_pending_tasks,
            n_unique_pending,
        )
    }

    async fn enqueue(&mut self, task: Arc<dyn Task>) -> bool {
        let enqueuer = Enqueuer::new(
            self.scheduler.clone(),
            &self.worker_info,
            self.retry_external_tasks,
        );
        let apply: Arc<dyn ApplyAsync> = Arc::new(InlineApply);
        let ok = enqueuer
            .add(task, apply, self.task_limit, &mut self.scheduled)
            .await;
        self.run_succeeded &= ok;
        ok
    }

    async fn dispatch(&mut self, task_id: TaskId) {
        let Some(task) = self.scheduled.get(&task_id).cloned() else {
            warn!(task_id = %task_id, "dispatch requested for unknown task");
            return;
        };

        self.running.insert(task_id.clone());
        let deadline = task.worker_timeout().or(self.worker_timeout);
        self.executor.submit(task_id, task, deadline).await;
    }

    /// Block (up to `wait_interval`) for the next task outcome, and apply
    /// it: report to the scheduler, handle rescheduling on suspension, and
    /// update `run_succeeded`.
    async fn handle_next_task(&mut self) -> Result<()> {
        let outcome = match tokio::time::timeout(self.wait_interval, self.outcome_rx.recv()).await
        {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                warn!("outcome channel closed; no more executors can report results");
                self.running.clear();
                return Ok(());
            }
            Err(_) => return Ok(()),
        };

        self.running.remove(&outcome.task_id);
        let Some(task) = self.scheduled.get(&outcome.task_id).cloned() else {
            debug!(task_id = %outcome.task_id, "outcome for task no longer tracked");
            return Ok(());
        };

        match outcome.result {
            TaskResult::Success(expl) => {
                self.report(&outcome.task_id, &task, TaskStatus::Done, Some(expl), Vec::new())
                    .await;
                self.run_succeeded &= true;
            }
            TaskResult::Failure(reason) => {
                warn!(task_id = %outcome.task_id, reason = %reason, "task failed");
                self.report(
                    &outcome.task_id,
                    &task,
                    TaskStatus::Failed,
                    Some(reason),
                    Vec::new(),
                )
                .await;
                self.run_succeeded = false;
            }
            TaskResult::Suspended(new_deps) => {
                // A checkpoint, not a failure: §4.4 step 5's lazy sequence
                // yielded a batch that wasn't all complete yet. This is the
                // normal, unbounded way a lazy task makes progress (§9) —
                // unlike `MissingDeps`, the reschedule ceiling does not apply
                // here, and `unfulfilled_counts` is left untouched.
                let mut new_dep_ids = Vec::new();
                for key in &new_deps {
                    match self
                        .registry
                        .resolve(Some(&key.module), &key.family, &key.params)
                    {
                        Ok(dep_task) => {
                            new_dep_ids.push(dep_task.task_id().to_string());
                            self.enqueue(dep_task).await;
                        }
                        Err(err) => {
                            warn!(module = %key.module, family = %key.family, error = %err, "could not resolve newly discovered dependency");
                        }
                    }
                }

                self.report(
                    &outcome.task_id,
                    &task,
                    TaskStatus::Suspended,
                    None,
                    new_dep_ids,
                )
                .await;

                self.enqueue(task).await;
            }
            TaskResult::MissingDeps(missing_ids, expl) => {
                warn!(task_id = %outcome.task_id, explanation = %expl, "declared dependency failed run-time recheck");

                let mut reschedule = true;
                for missing_id in &missing_ids {
                    let count = self.unfulfilled_counts.entry(missing_id.clone()).or_insert(0);
                    *count += 1;
                    if *count > self.max_reschedules {
                        reschedule = false;
                    }
                }

                self.report(
                    &outcome.task_id,
                    &task,
                    TaskStatus::Failed,
                    Some(expl),
                    Vec::new(),
                )
                .await;

                if reschedule {
                    self.enqueue(task).await;
                } else {
                    warn!(
                        task_id = %outcome.task_id,
                        max_reschedules = self.max_reschedules,
                        "exceeded max-reschedules on unfulfilled declared dependency; abandoning task"
                    );
                    self.run_succeeded = false;
                }
            }
        }

        Ok(())
    }

    async fn report(
        &self,
        task_id: &str,
        task: &Arc<dyn Task>,
        status: TaskStatus,
        expl: Option<String>,
        new_deps: Vec<TaskId>,
    ) {
        let req = AddTaskRequest {
            worker: &self.worker_info.worker_id,
            task_id,
            status,
            runnable: None,
            deps: Vec::new(),
            new_deps,
            expl,
            priority: task.priority(),
            resources: task.resources(),
            family: task.family(),
            module: task.module(),
            params: task.params(),
        };

        if let Err(err) = self.scheduler.add_task(req).await {
            warn!(task_id = %task_id, error = %err, "add_task RPC failed while reporting outcome");
        }
    }
}

fn parse_params(raw: &str) -> Option<HashMap<String, String>> {
    serde_json::from_str(raw).ok()
}

/// Pure decision function behind [`Coordinator::should_keep_alive`], pulled
/// out of the method so it can be unit tested without constructing a whole
/// `Coordinator`. Mirrors §4.8: stay alive iff `keep_alive` is configured
/// and either this worker is an assistant, or there is pending work it
/// isn't excluded from by `count_uniques`.
fn keep_alive_policy(
    keep_alive: bool,
    assistant: bool,
    count_uniques: bool,
    n_pending_tasks: u64,
    n_unique_pending: u64,
) -> bool {
    if !keep_alive {
        false
    } else if assistant {
        true
    } else {
        n_pending_tasks > 0 && (n_unique_pending > 0 || !count_uniques)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_alive_off_never_stays() {
        assert!(!keep_alive_policy(false, true, false, 10, 10));
    }

    #[test]
    fn assistant_stays_regardless_of_pending() {
        assert!(keep_alive_policy(true, true, false, 0, 0));
    }

    #[test]
    fn non_assistant_needs_pending_work() {
        assert!(!keep_alive_policy(true, false, false, 0, 0));
        assert!(keep_alive_policy(true, false, false, 3, 0));
    }

    #[test]
    fn count_uniques_requires_a_unique_pending_task() {
        assert!(!keep_alive_policy(true, false, true, 5, 0));
        assert!(keep_alive_policy(true, false, true, 5, 1));
    }

    #[test]
    fn parse_params_round_trips_json_map() {
        let raw = r#"{"a":"1","b":"2"}"#;
        let parsed = parse_params(raw).unwrap();
        assert_eq!(parsed.get("a").map(String::as_str), Some("1"));
        assert_eq!(parsed.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn parse_params_rejects_garbage() {
        assert!(parse_params("not json").is_none());
    }
}
