// tests/already_complete_dependency.rs
//
// §8 scenario 2: A is already complete, B depends on A. Registering both
// should report the scheduler (A, DONE, runnable=false) and
// (B, PENDING, deps=[A]).

mod common;

use std::sync::{Arc, Mutex};

use workdag::dag::enqueuer::{ApplyAsync, Enqueuer, InlineApply};
use workdag::dag::task::Task;
use workdag::dag::worker_info::WorkerInfo;
use workdag::testing::FakeSchedulerClient;

use common::ChainTask;

#[tokio::test]
async fn already_complete_dependency_is_done_not_runnable() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let a_concrete = ChainTask::new("A", log.clone());
    a_concrete.force_complete();
    let a: Arc<dyn Task> = Arc::new(a_concrete);

    let b: Arc<dyn Task> = Arc::new(ChainTask::new("B", log).with_deps(vec![a.clone()]));

    let scheduler = Arc::new(FakeSchedulerClient::new());
    let worker_info = WorkerInfo::generate(Some("test-worker".to_string()), 1);
    let enqueuer = Enqueuer::new(scheduler.clone(), &worker_info, false);
    let apply: Arc<dyn ApplyAsync> = Arc::new(InlineApply);

    let mut scheduled = std::collections::HashMap::new();
    let ok = enqueuer.add(b, apply, 0, &mut scheduled).await;
    assert!(ok);

    assert!(scheduled.contains_key("A"));
    assert!(scheduled.contains_key("B"));

    let statuses: std::collections::HashMap<_, _> = scheduler.reported_statuses().into_iter().collect();
    assert_eq!(statuses.get("A").map(String::as_str), Some("Done"));
    assert_eq!(statuses.get("B").map(String::as_str), Some("Pending"));
}
