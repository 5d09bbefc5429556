// src/dag/worker_info.rs

use rand::Rng;

/// Identity and environment metadata this worker reports to the scheduler
/// on every `add_worker` / keep-alive ping.
///
/// A random `salt` combined with host/pid is how the scheduler tells apart
/// multiple workers started on the same machine within the same second.
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    pub worker_id: String,
    pub salt: u32,
    pub workers: usize,
    pub host: Option<String>,
    pub username: Option<String>,
    pub pid: u32,
    pub sudo_user: Option<String>,
    /// `task_id` of the first task this worker ever claimed; reported back
    /// so a human reading the scheduler UI can tell sibling workers apart
    /// even when their `worker_id` is opaque.
    pub first_task: Option<String>,
}

impl WorkerInfo {
    /// Build worker identity, generating a random salt and reading host /
    /// username / `SUDO_USER` from the environment.
    pub fn generate(explicit_worker_id: Option<String>, worker_processes: usize) -> Self {
        let salt: u32 = rand::rng().random_range(0..999_999_999);
        let host = hostname();
        let username = username();
        let pid = std::process::id();

        let worker_id = explicit_worker_id.unwrap_or_else(|| {
            format!(
                "{}:{}:{}",
                host.as_deref().unwrap_or("unknown-host"),
                pid,
                salt
            )
        });

        Self {
            worker_id,
            salt,
            workers: worker_processes,
            host,
            username,
            pid,
            sudo_user: std::env::var("SUDO_USER").ok(),
            first_task: None,
        }
    }

    /// Record the first task this worker has claimed, if not already set.
    pub fn note_first_task(&mut self, task_id: &str) {
        if self.first_task.is_none() {
            self.first_task = Some(task_id.to_string());
        }
    }

    /// Flatten into the `(key, value)` pairs the scheduler's `add_worker`
    /// RPC expects.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("salt", self.salt.to_string()),
            ("workers", self.workers.to_string()),
            ("pid", self.pid.to_string()),
        ];
        if let Some(ref host) = self.host {
            pairs.push(("host", host.clone()));
        }
        if let Some(ref username) = self.username {
            pairs.push(("username", username.clone()));
        }
        if let Some(ref sudo_user) = self.sudo_user {
            pairs.push(("sudo_user", sudo_user.clone()));
        }
        if let Some(ref first_task) = self.first_task {
            pairs.push(("first_task", first_task.clone()));
        }
        pairs
    }
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| {
            std::process::Command::new("hostname")
                .output()
                .ok()
                .and_then(|o| String::from_utf8(o.stdout).ok())
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
}

fn username() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|s| !s.is_empty())
}
