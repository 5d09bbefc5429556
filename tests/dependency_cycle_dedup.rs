// tests/dependency_cycle_dedup.rs
//
// §8 scenario 6: a dependency cycle A -> B -> A, constructed via tasks that
// share task_ids across instances. The BFS's `seen` set must stop the walk
// from looping forever, and each task_id registers exactly once.

mod common;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use workdag::dag::enqueuer::{ApplyAsync, Enqueuer, InlineApply};
use workdag::dag::task::{RunOutcome, Task};
use workdag::dag::worker_info::WorkerInfo;
use workdag::testing::FakeSchedulerClient;

/// `CycleTask("A")` depends on a fresh `CycleTask("B")`, which in turn
/// depends on a fresh `CycleTask("A")` — two classes, mutually referencing
/// each other's task_id, the way a real scheduler-side cycle would be
/// constructed from two user task definitions rather than a literal
/// self-reference.
struct CycleTask {
    id: &'static str,
    other_id: &'static str,
}

#[async_trait]
impl Task for CycleTask {
    fn task_id(&self) -> &str {
        self.id
    }

    fn family(&self) -> &str {
        "CycleTask"
    }

    fn deps(&self) -> Vec<Arc<dyn Task>> {
        vec![Arc::new(CycleTask {
            id: self.other_id,
            other_id: self.id,
        })]
    }

    async fn complete(&self) -> Result<bool> {
        Ok(false)
    }

    async fn run(&self) -> Option<RunOutcome> {
        Some(RunOutcome::Unit(Ok(())))
    }
}

#[tokio::test]
async fn cycle_is_deduplicated_and_each_id_registers_once() {
    let root: Arc<dyn Task> = Arc::new(CycleTask { id: "A", other_id: "B" });

    let scheduler = Arc::new(FakeSchedulerClient::new());
    let worker_info = WorkerInfo::generate(Some("test-worker".to_string()), 1);
    let enqueuer = Enqueuer::new(scheduler.clone(), &worker_info, false);
    let apply: Arc<dyn ApplyAsync> = Arc::new(InlineApply);

    let mut scheduled = std::collections::HashMap::new();
    let ok = enqueuer.add(root, apply, 0, &mut scheduled).await;
    assert!(ok);

    assert_eq!(scheduled.len(), 2);
    assert!(scheduled.contains_key("A"));
    assert!(scheduled.contains_key("B"));

    let statuses = scheduler.reported_statuses();
    assert_eq!(statuses.len(), 2, "each task_id must be registered exactly once: {statuses:?}");
}
