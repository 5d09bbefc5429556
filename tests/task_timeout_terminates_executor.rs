// tests/task_timeout_terminates_executor.rs
//
// §8 scenario 4: a task with worker_timeout=1s whose run() sleeps far
// longer is terminated and reported as a failed outcome, never as a hang.

mod common;

use std::sync::Arc;
use std::time::Duration;

use workdag::dag::task::Task;
use workdag::engine::result::{outcome_channel, TaskResult};
use workdag::exec::{ExecutorBackend, InlineExecutor};
use workdag::testing::with_timeout;

use common::SleepTask;

#[tokio::test]
async fn timed_out_task_reports_failure_not_success() {
    let (tx, mut rx) = outcome_channel(4);
    let executor = InlineExecutor::new(tx);

    let task: Arc<dyn Task> = Arc::new(SleepTask::new("T", Duration::from_secs(10)));

    executor
        .submit("T".to_string(), task, Some(Duration::from_millis(200)))
        .await;

    let outcome = with_timeout(async { rx.recv().await }).await.expect("channel closed early");

    assert_eq!(outcome.task_id, "T");
    match outcome.result {
        TaskResult::Failure(reason) => {
            assert!(
                reason.to_lowercase().contains("timeout") || reason.to_lowercase().contains("timed out"),
                "unexpected failure reason: {reason}"
            );
        }
        other => panic!("expected Failure, got {other:?}"),
    }
}
