// src/config/validate.rs

use url::Url;

use crate::config::model::ConfigFile;
use crate::errors::WorkerError;

/// Run basic semantic validation against a loaded configuration.
///
/// This checks:
/// - `[worker].processes >= 1`
/// - `[worker].ping-interval >= 0`
/// - `[worker].wait-interval >= 1`
/// - `[scheduler].url` parses as a URL
pub fn validate_config(cfg: &ConfigFile) -> Result<(), WorkerError> {
    validate_worker_section(cfg)?;
    validate_scheduler_section(cfg)?;
    Ok(())
}

fn validate_worker_section(cfg: &ConfigFile) -> Result<(), WorkerError> {
    if cfg.worker.processes == 0 {
        return Err(WorkerError::Config(
            "[worker].processes must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.worker.ping_interval < 0.0 {
        return Err(WorkerError::Config(format!(
            "[worker].ping-interval must be >= 0 (got {})",
            cfg.worker.ping_interval
        )));
    }

    if cfg.worker.wait_interval == 0 {
        return Err(WorkerError::Config(
            "[worker].wait-interval must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_scheduler_section(cfg: &ConfigFile) -> Result<(), WorkerError> {
    Url::parse(&cfg.scheduler.url).map_err(|err| {
        WorkerError::Config(format!(
            "[scheduler].url is not a valid URL: {:?}: {err}",
            cfg.scheduler.url
        ))
    })?;
    Ok(())
}
