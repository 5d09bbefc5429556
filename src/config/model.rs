// src/config/model.rs

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// All sections are optional and have reasonable defaults, so an absent or
/// partial config file is fine:
///
/// ```toml
/// [worker]
/// processes = 4
/// keep-alive = true
///
/// [scheduler]
/// url = "http://localhost:8082"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub worker: WorkerSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
}

/// `[worker]` section — the recognised configuration keys from the worker
/// runtime's configuration contract.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSection {
    /// `worker-ping-interval`: seconds between keep-alive pings.
    #[serde(default = "default_ping_interval", rename = "ping-interval")]
    pub ping_interval: f64,

    /// `worker-keep-alive`: stay alive waiting for more work when idle.
    #[serde(default, rename = "keep-alive")]
    pub keep_alive: bool,

    /// `worker-count-uniques`: require a pending task unique to this worker
    /// before keep-alive will hold it alive.
    #[serde(default, rename = "count-uniques")]
    pub count_uniques: bool,

    /// `worker-wait-interval`: seconds the coordinator blocks on the result
    /// channel before re-checking for dead/timed-out children.
    #[serde(default = "default_wait_interval", rename = "wait-interval")]
    pub wait_interval: u64,

    /// `max-reschedules`: how many times a task may be rescheduled due to
    /// unfulfilled dependencies before it is abandoned.
    #[serde(default = "default_max_reschedules", rename = "max-reschedules")]
    pub max_reschedules: u32,

    /// `worker-timeout`: default per-task timeout in seconds; `0` disables
    /// it. A task's own `worker_timeout()` overrides this.
    #[serde(default, rename = "worker-timeout")]
    pub worker_timeout: u64,

    /// `worker-task-limit`: maximum number of tasks this worker will ever
    /// register in a session; `0` means unlimited.
    #[serde(default, rename = "task-limit")]
    pub task_limit: usize,

    /// `retry-external-tasks`: whether an incomplete external task (no
    /// `run()`) is registered as runnable anyway.
    #[serde(default, rename = "retry-external-tasks")]
    pub retry_external_tasks: bool,

    /// Number of concurrent in-flight tasks (`worker_processes`). `1` means
    /// the inline (same-process) executor backend is used; anything greater
    /// selects the OS-process executor backend.
    #[serde(default = "default_processes")]
    pub processes: usize,

    /// Whether this worker is an "assistant" (stays alive under keep-alive
    /// regardless of whether it owns any pending work belonging to others).
    #[serde(default)]
    pub assistant: bool,
}

fn default_ping_interval() -> f64 {
    1.0
}

fn default_wait_interval() -> u64 {
    1
}

fn default_max_reschedules() -> u32 {
    1
}

fn default_processes() -> usize {
    1
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            ping_interval: default_ping_interval(),
            keep_alive: false,
            count_uniques: false,
            wait_interval: default_wait_interval(),
            max_reschedules: default_max_reschedules(),
            worker_timeout: 0,
            task_limit: 0,
            retry_external_tasks: false,
            processes: default_processes(),
            assistant: false,
        }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Base URL of the scheduler's HTTP RPC endpoint.
    #[serde(default = "default_scheduler_url")]
    pub url: String,
}

fn default_scheduler_url() -> String {
    "http://localhost:8082".to_string()
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            url: default_scheduler_url(),
        }
    }
}
