// src/engine/keep_alive.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};

use crate::scheduler_client::SchedulerClient;

/// Periodically pings the scheduler so it knows this worker is still
/// alive, independent of whatever the main coordinator loop is doing.
///
/// Runs as a background Tokio task; call [`KeepAlive::stop`] to end it
/// before dropping the worker. `fork_lock` is shared with the process
/// executor's spawn lock so a ping never races a child-process spawn —
/// the two are otherwise unrelated but both touch global process/runtime
/// state serialised behind a single lock.
pub struct KeepAlive {
    stop: Arc<Notify>,
    handle: tokio::task::JoinHandle<()>,
}

impl KeepAlive {
    pub fn spawn(
        scheduler: Arc<dyn SchedulerClient>,
        worker_id: String,
        ping_interval: Duration,
        fork_lock: Arc<Mutex<()>>,
    ) -> Self {
        let stop = Arc::new(Notify::new());
        let stop_signal = stop.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(ping_interval) => {}
                    _ = stop_signal.notified() => {
                        info!(worker_id = %worker_id, "keep-alive stopped");
                        break;
                    }
                }

                let _guard = fork_lock.lock().await;
                if let Err(err) = scheduler.ping(&worker_id).await {
                    warn!(worker_id = %worker_id, error = %err, "failed pinging scheduler");
                }
            }
        });

        Self { stop, handle }
    }

    pub async fn stop(self) {
        self.stop.notify_one();
        let _ = self.handle.await;
    }
}
