//! In-memory task storage backend — no durability across restarts.
//!
//! Useful for tests and for collaborators that don't need the file store's
//! write-temp-then-rename machinery.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use openscan3_core::{TaskProgress, TaskStatus};

use crate::error::TaskStorageError;
use crate::state_machine;
use crate::traits::{TaskRecord, TaskStorage};

#[derive(Clone, Default)]
pub struct InMemoryTaskStorage {
    tasks: Arc<RwLock<HashMap<String, TaskRecord>>>,
}

impl InMemoryTaskStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStorage for InMemoryTaskStorage {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn create_task(&self, task: TaskRecord) -> Result<TaskRecord, TaskStorageError> {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>, TaskStorageError> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }

    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, TaskStorageError> {
        let mut records: Vec<TaskRecord> = self.tasks.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        new_status: TaskStatus,
        error: Option<String>,
    ) -> Result<TaskRecord, TaskStorageError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskStorageError::UnknownTask(task_id.to_string()))?;

        state_machine::validate_transition(task.status, new_status)?;

        task.status = new_status;
        if error.is_some() {
            task.error = error;
        }
        match new_status {
            TaskStatus::Running if task.started_at.is_none() => {
                task.started_at = Some(chrono::Utc::now());
            }
            s if s.is_terminal() => {
                task.completed_at = Some(chrono::Utc::now());
                if s == TaskStatus::Completed && task.progress.total > 0 {
                    task.progress.current = task.progress.total;
                }
            }
            _ => {}
        }
        Ok(task.clone())
    }

    async fn update_progress(
        &self,
        task_id: &str,
        progress: TaskProgress,
    ) -> Result<TaskRecord, TaskStorageError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskStorageError::UnknownTask(task_id.to_string()))?;
        task.progress = progress;
        Ok(task.clone())
    }

    async fn put_task(&self, task: TaskRecord) -> Result<(), TaskStorageError> {
        self.tasks.write().await.insert(task.id.clone(), task);
        Ok(())
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), TaskStorageError> {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get(task_id) {
            if !task.status.is_terminal() {
                return Err(TaskStorageError::StillActive(task_id.to_string()));
            }
        }
        tasks.remove(task_id);
        Ok(())
    }

    async fn restore(&self, _registered: &[String]) -> Result<Vec<TaskRecord>, TaskStorageError> {
        Ok(Vec::new())
    }
}
