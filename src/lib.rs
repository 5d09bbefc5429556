// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod scheduler_client;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::task::Task;
use crate::dag::worker_info::WorkerInfo;
use crate::engine::{Coordinator, KeepAlive};
use crate::exec::body::run_task_body;
use crate::exec::registry::TaskRegistry;
use crate::scheduler_client::{HttpSchedulerClient, SchedulerClient};

/// High-level entry point used by `main.rs`.
///
/// `registry` and `root` are supplied by the embedding application: this
/// crate provides the worker runtime (config, scheduler RPC, the
/// claim/run/report loop, executor backends) but the actual `Task`
/// implementations are application code, the same way a Luigi script
/// defines `Task` subclasses and hands the root task to `luigi.build()`.
pub async fn run(
    args: CliArgs,
    registry: Arc<dyn TaskRegistry>,
    root: impl FnOnce() -> Result<Arc<dyn Task>>,
) -> Result<bool> {
    // Hidden re-exec path used by the OS-process executor: resolve the task
    // passed on the CLI, run it, and report the result on stdout instead of
    // entering the normal coordinator loop.
    if let Some(ref key_json) = args.worker_run_task {
        return run_worker_task_subprocess(key_json, &registry).await.map(|_| true);
    }

    let cfg = load_and_validate(&args.config).context("loading configuration")?;
    let cfg = apply_cli_overrides(cfg, &args);

    let scheduler: Arc<dyn SchedulerClient> = Arc::new(HttpSchedulerClient::new(&cfg.scheduler.url));

    let worker_info = WorkerInfo::generate(args.worker_id.clone(), cfg.worker.processes);
    info!(worker_id = %worker_info.worker_id, url = %cfg.scheduler.url, "starting worker");

    let mut coordinator =
        Coordinator::new(scheduler.clone(), registry, worker_info, &cfg.worker, &args.config)?;

    let keep_alive = KeepAlive::spawn(
        scheduler,
        coordinator.worker_id().to_string(),
        std::time::Duration::from_secs_f64(cfg.worker.ping_interval),
        coordinator.fork_lock(),
    );

    let root_task = root()?;
    let result = coordinator.run(root_task).await;

    keep_alive.stop().await;

    result
}

fn apply_cli_overrides(mut cfg: ConfigFile, args: &CliArgs) -> ConfigFile {
    if let Some(url) = &args.scheduler_url {
        cfg.scheduler.url = url.clone();
    }
    if let Some(processes) = args.processes {
        cfg.worker.processes = processes;
    }
    if args.assistant {
        cfg.worker.assistant = true;
    }
    cfg
}

/// Body of the hidden `--worker-run-task` re-exec mode: resolve the task
/// described by the JSON-encoded [`crate::dag::task::TaskKey`] argument,
/// run it, and print the JSON-encoded result prefixed with
/// [`crate::exec::process::RESULT_MARKER`] so the parent process can parse
/// it out of the child's stdout.
async fn run_worker_task_subprocess(
    key_json: &str,
    registry: &Arc<dyn TaskRegistry>,
) -> Result<()> {
    let key: crate::dag::task::TaskKey =
        serde_json::from_str(key_json).context("parsing --worker-run-task payload")?;

    let task = registry
        .resolve(Some(&key.module), &key.family, &key.params)
        .context("resolving task for subprocess execution")?;

    let result = run_task_body(&task).await;
    let payload = serde_json::to_string(&result).context("serialising task result")?;
    println!("{}{}", crate::exec::process::RESULT_MARKER, payload);
    Ok(())
}

/// Convenience constructor for a params map, re-exported for application
/// code wiring up `Task` impls outside of tests.
pub fn empty_params() -> HashMap<String, String> {
    HashMap::new()
}
