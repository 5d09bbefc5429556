// src/exec/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::dag::task::Task;

/// Resolves a `(module, family, params)` triple back into a runnable
/// [`Task`].
///
/// This is the Rust analogue of the dynamic `load_task` used when a worker
/// is handed a `task_id` it never scheduled itself: the scheduler only
/// stores identity, not behaviour, so the worker (or, under the process
/// executor, the freshly re-exec'd child) needs a way to reconstruct the
/// actual task object from its class name and parameters.
pub trait TaskRegistry: Send + Sync {
    /// Build a `Task` instance given its module, family, and string params.
    fn resolve(
        &self,
        module: Option<&str>,
        family: &str,
        params: &HashMap<String, String>,
    ) -> Result<Arc<dyn Task>>;
}

/// A registry backed by a fixed set of constructor functions, keyed by
/// family name. Sufficient for a single binary that statically knows all
/// its task types at compile time.
#[derive(Default)]
pub struct StaticTaskRegistry {
    constructors: HashMap<String, TaskConstructor>,
}

type TaskConstructor = Box<dyn Fn(&HashMap<String, String>) -> Result<Arc<dyn Task>> + Send + Sync>;

impl StaticTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for the given task family name.
    pub fn register<F>(&mut self, family: impl Into<String>, ctor: F)
    where
        F: Fn(&HashMap<String, String>) -> Result<Arc<dyn Task>> + Send + Sync + 'static,
    {
        self.constructors.insert(family.into(), Box::new(ctor));
    }
}

impl TaskRegistry for StaticTaskRegistry {
    fn resolve(
        &self,
        _module: Option<&str>,
        family: &str,
        params: &HashMap<String, String>,
    ) -> Result<Arc<dyn Task>> {
        let ctor = self
            .constructors
            .get(family)
            .ok_or_else(|| anyhow!("no task registered for family '{family}'"))?;
        ctor(params)
    }
}
