//! Task registry and autodiscovery (§4.2 / §9 design notes, C4).
//!
//! The original's dynamic module-import autodiscovery has no equivalent at
//! compile time; it is replaced here with explicit `register` calls over a
//! fixed list, which `autodiscover` drives — registering handlers one at a
//! time into a shared map rather than scanning the filesystem.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::task::Task;

/// A task constructor: builds a fresh `Task` instance from its run
/// arguments. Registered once per task type, invoked once per submission.
pub type TaskConstructor = Arc<dyn Fn(Value) -> anyhow::Result<Arc<dyn Task>> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct TaskTypeInfo {
    pub is_exclusive: bool,
    pub is_blocking: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("task type '{0}' is already registered")]
    Conflict(String),
    #[error("task type '{0}' is not registered")]
    Unknown(String),
    #[error("task name '{0}' is empty; require_explicit_name forbids registering an unnamed task type")]
    MissingName(String),
    #[error("failed to construct task '{0}': {1}")]
    ConstructionFailed(String, String),
}

struct Entry {
    info: TaskTypeInfo,
    constructor: TaskConstructor,
}

/// Options controlling how `register` resolves naming conflicts.
///
/// Defaults match the safer behavior: registering an already-known name is
/// an error rather than a silent override.
#[derive(Debug, Clone, Copy)]
pub struct RegistryOptions {
    /// When true, a second `register` call for the same name replaces the
    /// first instead of erroring.
    pub override_on_conflict: bool,
    /// When true, `register` rejects an empty task name outright instead of
    /// accepting it and failing later at lookup time.
    pub require_explicit_name: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            override_on_conflict: false,
            require_explicit_name: true,
        }
    }
}

/// The set of task types the scheduler knows how to construct.
///
/// Read-mostly after boot: `autodiscover` populates it once at startup,
/// then `construct`/`is_registered`/`registered_names` are called per
/// submission and during `restore`.
pub struct TaskRegistry {
    entries: HashMap<String, Entry>,
    options: RegistryOptions,
}

impl TaskRegistry {
    pub fn new(options: RegistryOptions) -> Self {
        Self {
            entries: HashMap::new(),
            options,
        }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        info: TaskTypeInfo,
        constructor: impl Fn(Value) -> anyhow::Result<Arc<dyn Task>> + Send + Sync + 'static,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.options.require_explicit_name && name.is_empty() {
            return Err(RegistryError::MissingName(name));
        }
        if self.entries.contains_key(&name) && !self.options.override_on_conflict {
            return Err(RegistryError::Conflict(name));
        }
        self.entries.insert(
            name,
            Entry {
                info,
                constructor: Arc::new(constructor),
            },
        );
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn info(&self, name: &str) -> Option<TaskTypeInfo> {
        self.entries.get(name).map(|e| e.info)
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn construct(&self, name: &str, args: Value) -> Result<Arc<dyn Task>, RegistryError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;
        (entry.constructor)(args.clone())
            .map_err(|e| RegistryError::ConstructionFailed(name.to_string(), e.to_string()))
    }
}

/// Runs a list of `register` calls against a fresh registry, collecting the
/// first error rather than registering partially. The "fixed list" this
/// drives over is assembled by the embedding binary (cf. `openscan3-tasks`),
/// which is the explicit, compile-time stand-in for the original's
/// directory-scanning autodiscovery.
pub fn autodiscover<F>(options: RegistryOptions, register_all: F) -> Result<TaskRegistry, RegistryError>
where
    F: FnOnce(&mut TaskRegistry) -> Result<(), RegistryError>,
{
    let mut registry = TaskRegistry::new(options);
    register_all(&mut registry)?;
    Ok(registry)
}
