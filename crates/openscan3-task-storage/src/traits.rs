//! Core task record and the `TaskStorage` trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use openscan3_core::{TaskProgress, TaskStatus};

use crate::error::TaskStorageError;

/// Persistence model for a task (§3.3).
///
/// Contains only serializable fields — the pause gate, cancel flag, and
/// execution handle are runtime-only and live on the scheduler's live
/// instance, never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Opaque unique id (UUID v7, so task ids sort in creation order).
    pub id: String,
    /// Registered task name — also the `task_type` used to reconstruct on restart.
    pub name: String,
    /// Copied from the task class at creation; immutable afterwards.
    pub is_exclusive: bool,
    /// Copied from the task class at creation; immutable afterwards.
    pub is_blocking: bool,
    pub status: TaskStatus,
    pub progress: TaskProgress,
    pub error: Option<String>,
    /// Must be JSON-serializable; set by the task itself, not the scheduler.
    pub result: Option<Value>,
    /// Captured at creation, used to reconstruct the task on `restart`.
    pub run_args: Option<Value>,
    /// Set when `run_args` could not be serialized — see §4.3.
    pub non_restartable: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TaskRecord {
    pub fn new(id: String, name: impl Into<String>, is_exclusive: bool, is_blocking: bool, run_args: Option<Value>) -> Self {
        Self {
            id,
            name: name.into(),
            is_exclusive,
            is_blocking,
            status: TaskStatus::Pending,
            progress: TaskProgress::default(),
            error: None,
            result: None,
            run_args,
            non_restartable: false,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Resets a terminal record back to a fresh `Pending` state for `restart`,
    /// preserving `id`, `name`, and the original `run_args`.
    pub fn reset_for_restart(&mut self) {
        self.status = TaskStatus::Pending;
        self.progress = TaskProgress::default();
        self.error = None;
        self.result = None;
        self.started_at = None;
        self.completed_at = None;
    }
}

/// Core trait for task storage backends.
///
/// Implementations must be `Send + Sync` for use across async contexts.
#[async_trait]
pub trait TaskStorage: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn create_task(&self, task: TaskRecord) -> Result<TaskRecord, TaskStorageError>;

    async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>, TaskStorageError>;

    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, TaskStorageError>;

    /// Update a task's status with state machine validation, returning the
    /// updated record.
    async fn update_task_status(
        &self,
        task_id: &str,
        new_status: TaskStatus,
        error: Option<String>,
    ) -> Result<TaskRecord, TaskStorageError>;

    /// Persist a progress update without touching status.
    async fn update_progress(
        &self,
        task_id: &str,
        progress: TaskProgress,
    ) -> Result<TaskRecord, TaskStorageError>;

    /// Overwrite the whole record (used by `restart`, and by tasks setting
    /// their own `result`).
    async fn put_task(&self, task: TaskRecord) -> Result<(), TaskStorageError>;

    /// Delete a task's persisted state. Only legal when the record is
    /// terminal or already absent — `StillActive` otherwise.
    async fn delete_task(&self, task_id: &str) -> Result<(), TaskStorageError>;

    /// Walk the state directory / store on boot, applying the recovery
    /// rules from §4.3: drop completed records, flag unregistered task
    /// types as `Error`, and rewrite `Running`/`Paused` to `Interrupted`.
    async fn restore(&self, registered: &[String]) -> Result<Vec<TaskRecord>, TaskStorageError>;
}
