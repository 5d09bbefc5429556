// src/scheduler_client.rs

//! The HTTP-facing RPC surface this worker speaks to a scheduler with.
//!
//! `SchedulerClient` is a trait so the coordinator can be driven by a fake
//! in tests without a real scheduler process. [`HttpSchedulerClient`] is the
//! production implementation, backed by `reqwest`.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dag::worker_info::WorkerInfo;

/// A task id as reported by / sent to the scheduler. Opaque from the
/// worker's point of view; the scheduler computes it from family + params.
pub type TaskId = String;

/// The response shape of `get_work`, tolerant of the legacy 2-tuple form a
/// scheduler predating `running_tasks`/`n_unique_pending` would return.
#[derive(Debug, Clone, Default)]
pub struct GetWorkResponse {
    pub task_id: Option<TaskId>,
    pub running_tasks: Vec<TaskId>,
    pub n_pending_tasks: u64,
    pub n_unique_pending: u64,
    /// Present when `task_id` was not one this worker had already
    /// registered: the scheduler hands back enough to resolve it via the
    /// registry instead.
    pub task_module: Option<String>,
    pub task_family: Option<String>,
    pub task_params: Option<String>,
}

impl<'de> Deserialize<'de> for GetWorkResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Legacy(u64, Option<TaskId>),
            Modern {
                n_pending_tasks: u64,
                task_id: Option<TaskId>,
                #[serde(default)]
                running_tasks: Vec<TaskId>,
                #[serde(default)]
                n_unique_pending: u64,
                #[serde(default)]
                task_module: Option<String>,
                #[serde(default)]
                task_family: Option<String>,
                #[serde(default)]
                task_params: Option<String>,
            },
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Legacy(n_pending_tasks, task_id) => GetWorkResponse {
                task_id,
                running_tasks: Vec::new(),
                n_pending_tasks,
                n_unique_pending: 0,
                task_module: None,
                task_family: None,
                task_params: None,
            },
            Wire::Modern {
                n_pending_tasks,
                task_id,
                running_tasks,
                n_unique_pending,
                task_module,
                task_family,
                task_params,
            } => GetWorkResponse {
                task_id,
                running_tasks,
                n_pending_tasks,
                n_unique_pending,
                task_module,
                task_family,
                task_params,
            },
        })
    }
}

/// Status reported to the scheduler for a task via `add_task`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
    /// Reported when a task's `run()` suspended itself to wait on a newly
    /// discovered batch of dependencies.
    Suspended,
    /// A task whose `disabled()` flag is set; registered but never
    /// dispatched regardless of its completeness.
    Disabled,
}

/// Request body for `add_task`.
#[derive(Debug, Clone, Serialize)]
pub struct AddTaskRequest<'a> {
    pub worker: &'a str,
    pub task_id: &'a str,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runnable: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<TaskId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub new_deps: Vec<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expl: Option<String>,
    pub priority: i64,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub resources: HashMap<String, f64>,
    pub family: &'a str,
    pub module: &'a str,
    pub params: HashMap<String, String>,
}

/// The worker's side of the scheduler RPC surface.
///
/// Transport errors are reported via `anyhow::Result`; callers generally
/// log and continue rather than propagate, so a scheduler hiccup never
/// takes the whole worker down with it.
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    async fn add_worker(&self, info: &WorkerInfo) -> Result<()>;

    async fn ping(&self, worker_id: &str) -> Result<()>;

    async fn add_task(&self, req: AddTaskRequest<'_>) -> Result<()>;

    async fn get_work(&self, worker_id: &str, host: Option<&str>, assistant: bool)
        -> Result<GetWorkResponse>;
}

/// `reqwest`-backed scheduler client talking JSON RPC over HTTP, the way
/// the rest of this crate's network-facing pieces use `reqwest` + `serde`.
pub struct HttpSchedulerClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpSchedulerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/api/{}", self.base_url.trim_end_matches('/'), method)
    }
}

#[async_trait]
impl SchedulerClient for HttpSchedulerClient {
    async fn add_worker(&self, info: &WorkerInfo) -> Result<()> {
        let body = serde_json::json!({
            "worker": info.worker_id,
            "info": info.to_pairs(),
        });
        self.http
            .post(self.endpoint("add_worker"))
            .json(&body)
            .send()
            .await
            .context("sending add_worker request")?
            .error_for_status()
            .context("add_worker returned an error status")?;
        Ok(())
    }

    async fn ping(&self, worker_id: &str) -> Result<()> {
        self.http
            .post(self.endpoint("ping"))
            .json(&serde_json::json!({ "worker": worker_id }))
            .send()
            .await
            .context("sending ping request")?
            .error_for_status()
            .context("ping returned an error status")?;
        Ok(())
    }

    async fn add_task(&self, req: AddTaskRequest<'_>) -> Result<()> {
        self.http
            .post(self.endpoint("add_task"))
            .json(&req)
            .send()
            .await
            .context("sending add_task request")?
            .error_for_status()
            .context("add_task returned an error status")?;
        Ok(())
    }

    async fn get_work(
        &self,
        worker_id: &str,
        host: Option<&str>,
        assistant: bool,
    ) -> Result<GetWorkResponse> {
        let resp = self
            .http
            .post(self.endpoint("get_work"))
            .json(&serde_json::json!({
                "worker": worker_id,
                "host": host,
                "assistant": assistant,
            }))
            .send()
            .await
            .context("sending get_work request")?
            .error_for_status()
            .context("get_work returned an error status")?
            .json::<GetWorkResponse>()
            .await
            .context("parsing get_work response")?;
        Ok(resp)
    }
}
