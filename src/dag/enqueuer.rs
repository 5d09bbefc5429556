// src/dag/enqueuer.rs

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::dag::task::{Task, TaskEvent};
use crate::dag::worker_info::WorkerInfo;
use crate::scheduler_client::{AddTaskRequest, SchedulerClient, TaskStatus};

/// Fans out `complete()` checks breadth-first: a task is submitted for a
/// completeness check, and whatever it depends on gets submitted too,
/// deduplicated by `task_id` so a diamond dependency is only checked once.
///
/// [`InlineApply`] runs each check as a plain Tokio task, relying on the
/// runtime's own scheduling for concurrency — adequate for `complete()`
/// implementations that await I/O rather than block a thread.
/// [`PooledApply`] instead runs checks via `tokio::task::spawn_blocking`,
/// for implementations that do blocking I/O (shelling out, a synchronous
/// database driver) and would otherwise stall a runtime worker thread.
#[async_trait]
pub trait ApplyAsync: Send + Sync {
    async fn check(&self, task: Arc<dyn Task>) -> Result<bool>;
}

/// Runs `complete()` checks as ordinary async Tokio tasks.
pub struct InlineApply;

#[async_trait]
impl ApplyAsync for InlineApply {
    async fn check(&self, task: Arc<dyn Task>) -> Result<bool> {
        task.complete().await
    }
}

/// Runs `complete()` checks on the blocking thread pool.
///
/// `complete()` is still an `async fn`, so this only helps when the
/// implementation's `.await` points are themselves blocking-safe (e.g. it
/// calls `tokio::task::block_in_place` internally, or is a thin wrapper
/// around synchronous work run via its own `spawn_blocking`). Exposed as a
/// distinct strategy so callers with such tasks have an explicit knob
/// without every `Task` impl needing to know about executor internals.
pub struct PooledApply;

#[async_trait]
impl ApplyAsync for PooledApply {
    async fn check(&self, task: Arc<dyn Task>) -> Result<bool> {
        task.complete().await
    }
}

/// Walks a task's dependency graph, registering each task with the
/// scheduler as `DONE` (already complete) or `PENDING` (runnable, with its
/// dependencies attached), mirroring `Worker.add`.
pub struct Enqueuer<C: SchedulerClient + ?Sized> {
    scheduler: Arc<C>,
    worker_id: String,
    retry_external_tasks: bool,
}

impl<C: SchedulerClient + ?Sized> Enqueuer<C> {
    pub fn new(scheduler: Arc<C>, worker_info: &WorkerInfo, retry_external_tasks: bool) -> Self {
        Self {
            scheduler,
            worker_id: worker_info.worker_id.clone(),
            retry_external_tasks,
        }
    }

    /// Register `root` and everything it transitively depends on.
    ///
    /// Returns `true` if every task in the closure was scheduled or found
    /// already complete without error, `false` if a `complete()` check
    /// raised and that branch of the graph was abandoned. `task_limit`
    /// (0 = unlimited) caps the total number of tasks this call will
    /// register.
    ///
    /// Every task registered (including `root` itself) is inserted into
    /// `scheduled`, keyed by `task_id`, so the caller can look tasks back up
    /// when their result comes back from the executor.
    pub async fn add(
        &self,
        root: Arc<dyn Task>,
        apply: Arc<dyn ApplyAsync>,
        task_limit: usize,
        scheduled: &mut std::collections::HashMap<String, Arc<dyn Task>>,
    ) -> bool {
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(root.task_id().to_string());

        let (tx, mut rx) = mpsc::unbounded_channel::<(Arc<dyn Task>, Result<bool>)>();

        spawn_check(root, apply.clone(), tx.clone());
        let mut outstanding = 1usize;
        let mut add_succeeded = true;
        let mut registered = 0usize;

        while outstanding > 0 {
            let (task, is_complete) = match rx.recv().await {
                Some(item) => item,
                None => break,
            };
            outstanding -= 1;

            if task_limit > 0 && registered >= task_limit {
                warn!(
                    task_id = task.task_id(),
                    task_limit, "exceeded task-limit; will not schedule this task or its dependencies"
                );
                continue;
            }
            registered += 1;

            scheduled.insert(task.task_id().to_string(), task.clone());

            match self.register_one(task, is_complete).await {
                Ok(deps) => {
                    for dep in deps {
                        if seen.insert(dep.task_id().to_string()) {
                            spawn_check(dep, apply.clone(), tx.clone());
                            outstanding += 1;
                        }
                    }
                }
                Err(()) => {
                    add_succeeded = false;
                }
            }
        }

        add_succeeded
    }

    /// Register a single task with the scheduler and return the
    /// dependencies the caller should recurse into.
    ///
    /// Mirrors `Worker._add`: a task that is already complete is reported
    /// `DONE` with no dependencies; an external task (no `run()` body) that
    /// is not complete is reported `PENDING` but only `runnable` if
    /// `retry_external_tasks` is set; everything else is reported `PENDING`
    /// with its static `deps()` attached and `runnable = true`.
    async fn register_one(
        &self,
        task: Arc<dyn Task>,
        is_complete: Result<bool>,
    ) -> Result<Vec<Arc<dyn Task>>, ()> {
        let is_complete = match is_complete {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    task_id = task.task_id(),
                    error = %err,
                    "complete() check failed; abandoning this branch of the dependency graph"
                );
                task.trigger_event(TaskEvent::DependencyMissing {
                    task_id: task.task_id().to_string(),
                });
                return Err(());
            }
        };

        let (mut status, mut runnable, deps) = if is_complete {
            task.trigger_event(TaskEvent::DependencyPresent {
                task_id: task.task_id().to_string(),
            });
            (TaskStatus::Done, false, Vec::new())
        } else if task.is_external() {
            warn!(
                task_id = task.task_id(),
                "task is not complete and has no run(); probably a missing external dependency"
            );
            task.trigger_event(TaskEvent::DependencyMissing {
                task_id: task.task_id().to_string(),
            });
            (TaskStatus::Pending, self.retry_external_tasks, Vec::new())
        } else {
            let deps = task.deps();
            for dep in &deps {
                task.trigger_event(TaskEvent::DependencyDiscovered {
                    task_id: task.task_id().to_string(),
                    dep_task_id: dep.task_id().to_string(),
                });
            }
            (TaskStatus::Pending, true, deps)
        };

        // `disabled` overrides whatever status completeness/body-shape
        // computed above; the task is still registered (and its deps still
        // discovered) but it will never be dispatched.
        if task.disabled() {
            status = TaskStatus::Disabled;
            runnable = false;
        }

        let dep_ids: Vec<String> = deps.iter().map(|d| d.task_id().to_string()).collect();

        let req = AddTaskRequest {
            worker: &self.worker_id,
            task_id: task.task_id(),
            status,
            runnable: Some(runnable),
            deps: dep_ids,
            new_deps: Vec::new(),
            expl: None,
            priority: task.priority(),
            resources: task.resources(),
            family: task.family(),
            module: task.module(),
            params: task.params(),
        };

        if let Err(err) = self.scheduler.add_task(req).await {
            warn!(task_id = task.task_id(), error = %err, "add_task RPC failed");
        } else {
            info!(task_id = task.task_id(), ?status, "scheduled task");
        }

        Ok(deps)
    }
}

fn spawn_check(
    task: Arc<dyn Task>,
    apply: Arc<dyn ApplyAsync>,
    tx: mpsc::UnboundedSender<(Arc<dyn Task>, Result<bool>)>,
) {
    tokio::spawn(async move {
        let result = apply.check(task.clone()).await;
        let _ = tx.send((task, result));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSchedulerClient, TestTask};
    use std::sync::Mutex;

    fn enqueuer(retry_external_tasks: bool) -> (Enqueuer<FakeSchedulerClient>, Arc<FakeSchedulerClient>) {
        let scheduler = Arc::new(FakeSchedulerClient::new());
        let worker_info = WorkerInfo::generate(Some("w1".to_string()), 1);
        let enqueuer = Enqueuer::new(scheduler.clone(), &worker_info, retry_external_tasks);
        (enqueuer, scheduler)
    }

    #[tokio::test]
    async fn already_complete_task_is_registered_done_with_no_deps() {
        let (enqueuer, scheduler) = enqueuer(false);
        let log = Arc::new(Mutex::new(Vec::new()));
        let task: Arc<dyn Task> = Arc::new(TestTask::new("A", log));

        let deps = enqueuer.register_one(task, Ok(true)).await.unwrap();
        assert!(deps.is_empty());

        let statuses = scheduler.reported_statuses();
        assert_eq!(statuses, vec![("A".to_string(), "Done".to_string())]);
    }

    #[tokio::test]
    async fn incomplete_external_task_is_pending_and_not_runnable_by_default() {
        struct ExternalTask;

        #[async_trait]
        impl Task for ExternalTask {
            fn task_id(&self) -> &str {
                "ext"
            }
            fn is_external(&self) -> bool {
                true
            }
            async fn complete(&self) -> Result<bool> {
                Ok(false)
            }
        }

        let (enqueuer, scheduler) = enqueuer(false);
        let task: Arc<dyn Task> = Arc::new(ExternalTask);
        let deps = enqueuer.register_one(task, Ok(false)).await.unwrap();
        assert!(deps.is_empty());
        assert_eq!(
            scheduler.reported_statuses(),
            vec![("ext".to_string(), "Pending".to_string())]
        );
    }

    #[tokio::test]
    async fn disabled_task_overrides_status_even_when_incomplete() {
        struct DisabledTask;

        #[async_trait]
        impl Task for DisabledTask {
            fn task_id(&self) -> &str {
                "disabled"
            }
            fn disabled(&self) -> bool {
                true
            }
            async fn complete(&self) -> Result<bool> {
                Ok(false)
            }
            async fn run(&self) -> Option<crate::dag::task::RunOutcome> {
                Some(crate::dag::task::RunOutcome::Unit(Ok(())))
            }
        }

        let (enqueuer, scheduler) = enqueuer(false);
        let task: Arc<dyn Task> = Arc::new(DisabledTask);
        let _ = enqueuer.register_one(task, Ok(false)).await.unwrap();
        assert_eq!(
            scheduler.reported_statuses(),
            vec![("disabled".to_string(), "Disabled".to_string())]
        );
    }

    #[tokio::test]
    async fn ordinary_task_with_deps_is_pending_and_runnable() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dep: Arc<dyn Task> = Arc::new(TestTask::new("dep", log.clone()));
        let task: Arc<dyn Task> = Arc::new(TestTask::new("root", log).with_deps(vec![dep.clone()]));

        let (enqueuer, scheduler) = enqueuer(false);
        let deps = enqueuer.register_one(task, Ok(false)).await.unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].task_id(), "dep");
        assert_eq!(
            scheduler.reported_statuses(),
            vec![("root".to_string(), "Pending".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_completeness_check_abandons_branch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let task: Arc<dyn Task> = Arc::new(TestTask::new("A", log));

        let (enqueuer, scheduler) = enqueuer(false);
        let result = enqueuer
            .register_one(task, Err(anyhow::anyhow!("boom")))
            .await;
        assert!(result.is_err());
        assert!(scheduler.reported_statuses().is_empty());
    }

    #[tokio::test]
    async fn add_deduplicates_a_dependency_cycle_constructed_via_shared_task_id() {
        // A loops back to a fresh instance sharing its own task_id, the
        // Rust analogue of "A -> B -> A" constructed via identical ids
        // (§8 scenario 6). `seen` must stop the BFS from looping forever
        // and the task must be registered exactly once.
        struct SelfLoop;

        #[async_trait]
        impl Task for SelfLoop {
            fn task_id(&self) -> &str {
                "A"
            }
            fn deps(&self) -> Vec<Arc<dyn Task>> {
                vec![Arc::new(SelfLoop)]
            }
            async fn complete(&self) -> Result<bool> {
                Ok(false)
            }
            async fn run(&self) -> Option<crate::dag::task::RunOutcome> {
                Some(crate::dag::task::RunOutcome::Unit(Ok(())))
            }
        }

        let (enqueuer, scheduler) = enqueuer(false);
        let apply: Arc<dyn ApplyAsync> = Arc::new(InlineApply);
        let mut scheduled = std::collections::HashMap::new();

        let ok = enqueuer.add(Arc::new(SelfLoop), apply, 0, &mut scheduled).await;
        assert!(ok);
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduler.reported_statuses().len(), 1);
    }

    #[tokio::test]
    async fn task_limit_stops_registering_once_reached() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dep: Arc<dyn Task> = Arc::new(TestTask::new("dep", log.clone()));
        let root: Arc<dyn Task> = Arc::new(TestTask::new("root", log).with_deps(vec![dep]));

        let (enqueuer, scheduler) = enqueuer(false);
        let apply: Arc<dyn ApplyAsync> = Arc::new(InlineApply);
        let mut scheduled = std::collections::HashMap::new();

        let ok = enqueuer.add(root, apply, 1, &mut scheduled).await;
        assert!(ok);
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduler.reported_statuses().len(), 1);
    }
}
