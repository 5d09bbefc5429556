// src/config/mod.rs

//! Configuration loading and validation for workdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`): the `[worker]` and
//!   `[scheduler]` sections this worker recognises.
//! - Load a config file from disk (`loader.rs`), tolerating a missing file
//!   entirely (every key defaults).
//! - Validate basic invariants (`validate.rs`): positive intervals, a
//!   sane process count, a parseable scheduler URL.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, SchedulerSection, WorkerSection};
pub use validate::validate_config;
