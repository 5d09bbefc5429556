// src/engine/mod.rs

//! Coordination layer: the claim/run/report loop and its supporting
//! background tasks.
//!
//! - [`coordinator`] is the async analogue of `Worker.run`.
//! - [`keep_alive`] pings the scheduler on a timer, independent of the
//!   coordinator's own loop.
//! - [`result`] defines the channel executors report task outcomes on.

pub mod coordinator;
pub mod keep_alive;
pub mod result;

pub use coordinator::Coordinator;
pub use keep_alive::KeepAlive;
pub use result::{outcome_channel, Outcome, OutcomeReceiver, OutcomeSender, TaskResult};
