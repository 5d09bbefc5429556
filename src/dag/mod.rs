// src/dag/mod.rs

//! Task identity and dependency discovery.
//!
//! - [`task`] defines the `Task` trait workers execute against, plus the
//!   lazily-evaluated dependency sequence shape for dynamic dependency
//!   discovery.
//! - [`enqueuer`] walks a task's dependency closure and registers each node
//!   with the scheduler, mirroring `Worker.add`/`Worker._add`.
//! - [`worker_info`] builds the identity payload reported on `add_worker`.

pub mod enqueuer;
pub mod task;
pub mod worker_info;

pub use enqueuer::{ApplyAsync, Enqueuer, InlineApply, PooledApply};
pub use task::{LazyDependencySequence, RunOutcome, Task, TaskEvent, TaskKey};
pub use worker_info::WorkerInfo;
