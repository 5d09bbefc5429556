// tests/linear_dependency_chain.rs
//
// §8 scenario 1: linear graph A -> B -> C (A has no deps, B depends on A, C
// depends on B), all incomplete, worker_processes=1, keep_alive=false.
// Expect terminal statuses reported to the scheduler in the order
// (A,DONE), (B,DONE), (C,DONE), and the run to report success overall.

mod common;

use std::sync::{Arc, Mutex};

use workdag::config::model::WorkerSection;
use workdag::dag::task::Task;
use workdag::engine::Coordinator;
use workdag::exec::registry::{StaticTaskRegistry, TaskRegistry};
use workdag::scheduler_client::SchedulerClient;
use workdag::testing::{init_tracing, with_timeout, FakeSchedulerClient};

use common::ChainTask;

#[tokio::test]
async fn linear_chain_completes_in_dependency_order() {
    init_tracing();

    let log = Arc::new(Mutex::new(Vec::new()));
    let a: Arc<dyn Task> = Arc::new(ChainTask::new("A", log.clone()));
    let b: Arc<dyn Task> = Arc::new(ChainTask::new("B", log.clone()).with_deps(vec![a.clone()]));
    let c: Arc<dyn Task> = Arc::new(ChainTask::new("C", log.clone()).with_deps(vec![b.clone()]));

    let scheduler = Arc::new(FakeSchedulerClient::new());
    // A real scheduler would only ever hand back a task whose dependencies
    // are already satisfied; this fake is dumb and just replays whatever
    // order the test seeds, so we seed the dependency-respecting order
    // directly.
    scheduler.seed_work("A");
    scheduler.seed_work("B");
    scheduler.seed_work("C");

    let registry: Arc<dyn TaskRegistry> = Arc::new(StaticTaskRegistry::new());
    let cfg = WorkerSection::default();

    let mut coordinator = Coordinator::new(
        scheduler.clone() as Arc<dyn SchedulerClient>,
        registry,
        worker_info(),
        &cfg,
        "unused.toml",
    )
    .unwrap();

    let succeeded = with_timeout(coordinator.run(c)).await.unwrap();
    assert!(succeeded);

    let done_order: Vec<String> = scheduler
        .reported_statuses()
        .into_iter()
        .filter(|(_, status)| status == "Done")
        .map(|(id, _)| id)
        .collect();
    assert_eq!(done_order, vec!["A".to_string(), "B".to_string(), "C".to_string()]);

    assert_eq!(*log.lock().unwrap(), vec!["A".to_string(), "B".to_string(), "C".to_string()]);
}

fn worker_info() -> workdag::dag::worker_info::WorkerInfo {
    workdag::dag::worker_info::WorkerInfo::generate(Some("test-worker".to_string()), 1)
}
