// src/errors.rs

//! Crate-wide error types.
//!
//! Most IO and config-loading paths use plain [`anyhow::Result`] with
//! `.context(...)` at each boundary, same as the rest of the ecosystem this
//! crate borrows from. The worker's own error taxonomy (validation vs
//! user-code vs transport vs child-liveness vs resolution) gets a typed enum
//! so call sites can `match` on it instead of string-sniffing.

pub use anyhow::{Context, Error, Result};

/// Typed error taxonomy for the coordinator and its collaborators.
///
/// This does not replace `anyhow::Result` everywhere — it exists for the
/// handful of call sites that need to branch on *kind* of failure rather
/// than just log-and-continue.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// A task or dependency failed basic validation (e.g. a non-task yielded
    /// from `deps()`, or a self-dependency).
    #[error("validation failed for task '{task_id}': {reason}")]
    Validation { task_id: String, reason: String },

    /// A loaded configuration failed semantic validation (a field outside
    /// its documented valid range, an unparseable scheduler URL).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An exception escaped user code (`complete()`, `run()`, or a hook).
    #[error("user code failed for task '{task_id}': {source}")]
    UserCode {
        task_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// The scheduler RPC failed. Always logged and swallowed by the caller;
    /// this variant exists for the handful of call sites that want to
    /// record *why* rather than just emit a warning.
    #[error("scheduler transport error during {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A dispatched task's child process died unexpectedly or exceeded its
    /// deadline.
    #[error("task '{task_id}' child process failure: {reason}")]
    ChildLiveness { task_id: String, reason: String },

    /// A task id returned by `get_work` could not be resolved back into a
    /// `Task` via the registry.
    #[error("could not resolve task '{task_id}' via registry: {source}")]
    Resolution {
        task_id: String,
        #[source]
        source: anyhow::Error,
    },
}
