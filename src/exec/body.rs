// src/exec/body.rs

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::dag::task::{RunOutcome, Task, TaskEvent};
use crate::engine::result::TaskResult;

/// Run one task to completion (or suspension), shared by both the inline
/// and OS-process executor backends so behaviour never drifts between
/// them.
///
/// A lazily-evaluated body alternates between yielding a dependency batch
/// and this function checking each dependency's `complete()`. If every
/// dependency in a batch is already complete, the sequence is driven
/// forward immediately within this same call (mirroring a generator that
/// resumes without actually suspending the OS process). The first batch
/// with an incomplete dependency ends the call with `TaskResult::Suspended`
/// — re-running this task from the start is the only way to make further
/// progress, since the yielded dependency objects cannot be recreated
/// without replaying `run()`.
pub async fn run_task_body(task: &Arc<dyn Task>) -> TaskResult {
    let started_at = Instant::now();
    task.trigger_event(TaskEvent::Started {
        task_id: task.task_id().to_string(),
    });

    if task.is_external() {
        let result = match task.complete().await {
            Ok(true) => {
                debug!(task_id = task.task_id(), "external task found complete");
                let expl = success_explanation(task).await;
                task.trigger_event(TaskEvent::Success {
                    task_id: task.task_id().to_string(),
                });
                TaskResult::Success(expl)
            }
            Ok(false) => {
                let msg = "external task not yet complete".to_string();
                let expl = task.on_failure(&anyhow::anyhow!(msg.clone())).await;
                task.trigger_event(TaskEvent::Failure {
                    task_id: task.task_id().to_string(),
                    reason: msg.clone(),
                });
                TaskResult::Failure(expl)
            }
            Err(err) => {
                warn!(task_id = task.task_id(), error = %err, "complete() check failed");
                let expl = task.on_failure(&err).await;
                task.trigger_event(TaskEvent::Failure {
                    task_id: task.task_id().to_string(),
                    reason: err.to_string(),
                });
                TaskResult::Failure(expl)
            }
        };
        task.trigger_event(TaskEvent::ProcessingTime {
            task_id: task.task_id().to_string(),
            seconds: started_at.elapsed().as_secs_f64(),
        });
        return result;
    }

    match task.complete().await {
        Ok(true) => {
            debug!(task_id = task.task_id(), "already complete, skipping run");
            let expl = success_explanation(task).await;
            task.trigger_event(TaskEvent::Success {
                task_id: task.task_id().to_string(),
            });
            return TaskResult::Success(expl);
        }
        Ok(false) => {}
        Err(err) => {
            warn!(task_id = task.task_id(), error = %err, "complete() check failed");
            let expl = task.on_failure(&err).await;
            task.trigger_event(TaskEvent::Failure {
                task_id: task.task_id().to_string(),
                reason: err.to_string(),
            });
            return TaskResult::Failure(expl);
        }
    }

    {
        let mut missing = Vec::new();
        for dep in task.deps() {
            match dep.complete().await {
                Ok(true) => {}
                Ok(false) => missing.push(dep.task_id().to_string()),
                Err(err) => {
                    let expl = task.on_failure(&err).await;
                    return TaskResult::Failure(expl);
                }
            }
        }
        if !missing.is_empty() {
            let msg = format!("Unfulfilled dependencies at run time: {}", missing.join(", "));
            warn!(task_id = task.task_id(), "{}", msg);
            let _ = task.on_failure(&anyhow::anyhow!(msg.clone())).await;
            task.trigger_event(TaskEvent::Failure {
                task_id: task.task_id().to_string(),
                reason: msg.clone(),
            });
            return TaskResult::MissingDeps(missing, msg);
        }
    }

    let Some(outcome) = task.run().await else {
        let msg = "task declared itself not external but has no run() body".to_string();
        warn!(task_id = task.task_id(), "{}", msg);
        task.trigger_event(TaskEvent::BrokenTask {
            task_id: task.task_id().to_string(),
            reason: msg.clone(),
        });
        return TaskResult::Failure(msg);
    };

    match outcome {
        RunOutcome::Unit(Ok(())) => {
            let expl = success_explanation(task).await;
            task.trigger_event(TaskEvent::Success {
                task_id: task.task_id().to_string(),
            });
            TaskResult::Success(expl)
        }
        RunOutcome::Unit(Err(err)) => {
            let expl = task.on_failure(&err).await;
            task.trigger_event(TaskEvent::Failure {
                task_id: task.task_id().to_string(),
                reason: err.to_string(),
            });
            TaskResult::Failure(expl)
        }
        RunOutcome::Lazy(mut seq) => loop {
            match seq.next().await {
                Ok(None) => {
                    let expl = success_explanation(task).await;
                    task.trigger_event(TaskEvent::Success {
                        task_id: task.task_id().to_string(),
                    });
                    return TaskResult::Success(expl);
                }
                Ok(Some(deps)) if deps.is_empty() => continue,
                Ok(Some(deps)) => {
                    let mut all_complete = true;
                    for dep in &deps {
                        match dep.complete().await {
                            Ok(true) => {}
                            Ok(false) => all_complete = false,
                            Err(err) => {
                                let expl = task.on_failure(&err).await;
                                task.trigger_event(TaskEvent::Failure {
                                    task_id: task.task_id().to_string(),
                                    reason: err.to_string(),
                                });
                                return TaskResult::Failure(expl);
                            }
                        }
                    }

                    if all_complete {
                        debug!(
                            task_id = task.task_id(),
                            batch_size = deps.len(),
                            "yielded dependency batch already complete, continuing"
                        );
                        continue;
                    }

                    debug!(
                        task_id = task.task_id(),
                        batch_size = deps.len(),
                        "suspending on incomplete dependency batch"
                    );
                    return TaskResult::Suspended(deps.iter().map(|d| d.key()).collect());
                }
                Err(err) => {
                    let expl = task.on_failure(&err).await;
                    task.trigger_event(TaskEvent::Failure {
                        task_id: task.task_id().to_string(),
                        reason: err.to_string(),
                    });
                    return TaskResult::Failure(expl);
                }
            }
        },
    }
}

/// JSON-encode `Task::on_success()`'s return value for use as an outcome
/// explanation, falling back to the value's debug form if it somehow
/// refuses to serialise (it's already a `serde_json::Value`, so this can't
/// actually fail, but `to_string` on a `Value` never panics either way).
async fn success_explanation(task: &Arc<dyn Task>) -> String {
    serde_json::to_string(&task.on_success().await).unwrap_or_default()
}
