// tests/external_task_completion.rs
//
// §8 scenario 5: T is external (no run()). First pass: complete()=false, so
// the enqueuer registers it PENDING with runnable=retry_external_tasks
// (false by default). On executor invocation, once complete()=true, the
// executor reports (T, DONE) without ever calling a run() body.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use workdag::dag::enqueuer::{ApplyAsync, Enqueuer, InlineApply};
use workdag::dag::task::Task;
use workdag::dag::worker_info::WorkerInfo;
use workdag::engine::result::TaskResult;
use workdag::exec::body::run_task_body;
use workdag::testing::FakeSchedulerClient;

use common::ExternalTask;

#[tokio::test]
async fn incomplete_then_complete_external_task() {
    let flag = Arc::new(AtomicBool::new(false));
    let t: Arc<dyn Task> = Arc::new(ExternalTask::new("T", flag.clone()));

    let scheduler = Arc::new(FakeSchedulerClient::new());
    let worker_info = WorkerInfo::generate(Some("test-worker".to_string()), 1);
    let enqueuer = Enqueuer::new(scheduler.clone(), &worker_info, false);
    let apply: Arc<dyn ApplyAsync> = Arc::new(InlineApply);

    let mut scheduled = std::collections::HashMap::new();
    let ok = enqueuer.add(t.clone(), apply, 0, &mut scheduled).await;
    assert!(ok);
    assert_eq!(
        scheduler.reported_statuses(),
        vec![("T".to_string(), "Pending".to_string())]
    );

    flag.store(true, Ordering::SeqCst);

    let outcome = run_task_body(&t).await;
    assert!(matches!(outcome, TaskResult::Success(_)), "expected Success, got {outcome:?}");
}
