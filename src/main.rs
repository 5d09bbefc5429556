// src/main.rs

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use workdag::dag::task::{RunOutcome, Task};
use workdag::exec::registry::{StaticTaskRegistry, TaskRegistry};
use workdag::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("workdag error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;

    let registry: Arc<dyn TaskRegistry> = Arc::new(build_demo_registry());

    let root_id = std::env::var("WORKDAG_ROOT_TASK_ID").unwrap_or_else(|_| "root".to_string());
    let root_cmd =
        std::env::var("WORKDAG_ROOT_CMD").unwrap_or_else(|_| "true".to_string());
    let root_marker = std::env::var("WORKDAG_ROOT_MARKER").ok();

    let succeeded = run(args, registry, move || {
        Ok(Arc::new(ShellTask::new(root_id, root_cmd, root_marker)) as Arc<dyn Task>)
    })
    .await?;

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

/// Minimal task implementation: runs a shell command, and considers itself
/// complete once an optional marker file exists. A real embedding
/// application registers its own `Task` implementations in place of this;
/// it exists so the binary is runnable end-to-end without extra crates.
struct ShellTask {
    task_id: String,
    cmd: String,
    marker: Option<PathBuf>,
}

impl ShellTask {
    fn new(task_id: String, cmd: String, marker: Option<String>) -> Self {
        Self {
            task_id,
            cmd,
            marker: marker.map(PathBuf::from),
        }
    }
}

#[async_trait]
impl Task for ShellTask {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn family(&self) -> &str {
        "ShellTask"
    }

    fn params(&self) -> HashMap<String, String> {
        let mut p = HashMap::new();
        p.insert("cmd".to_string(), self.cmd.clone());
        p
    }

    async fn complete(&self) -> Result<bool> {
        Ok(match &self.marker {
            Some(path) => path.exists(),
            None => false,
        })
    }

    async fn run(&self) -> Option<RunOutcome> {
        Some(RunOutcome::Unit(run_shell(&self.task_id, &self.cmd).await))
    }
}

async fn run_shell(task_id: &str, cmd: &str) -> Result<()> {
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for task '{task_id}'"))?;

    if let Some(stdout) = child.stdout.take() {
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task_id = %task_id, "stdout: {}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task_id = %task_id, "stderr: {}", line);
            }
        });
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of task '{task_id}'"))?;

    if status.success() {
        Ok(())
    } else {
        anyhow::bail!("task '{task_id}' exited with status {status}")
    }
}

fn build_demo_registry() -> StaticTaskRegistry {
    let mut registry = StaticTaskRegistry::new();
    registry.register("ShellTask", |params| {
        let cmd = params
            .get("cmd")
            .cloned()
            .unwrap_or_else(|| "true".to_string());
        let task_id = params
            .get("task_id")
            .cloned()
            .unwrap_or_else(|| "root".to_string());
        Ok(Arc::new(ShellTask::new(task_id, cmd, None)) as Arc<dyn Task>)
    });
    registry
}
