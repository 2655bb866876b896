//! Durable file-per-task JSON storage.
//!
//! One file per task under a configured state directory, named `<id>.json`.
//! Writes go to a temporary sibling then `rename` into place, so a crash
//! mid-write never leaves a half-written record (§6.1).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use openscan3_core::{TaskProgress, TaskStatus};

use crate::error::TaskStorageError;
use crate::state_machine;
use crate::traits::{TaskRecord, TaskStorage};

/// File-per-task JSON backend.
///
/// Keeps an in-memory mirror for fast reads; every mutation is written
/// through to disk before the in-memory copy is updated, so the two never
/// diverge under normal operation.
#[derive(Clone)]
pub struct FileTaskStorage {
    dir: PathBuf,
    tasks: Arc<RwLock<HashMap<String, TaskRecord>>>,
}

impl FileTaskStorage {
    /// Opens (creating if necessary) a state directory for task persistence.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, TaskStorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            tasks: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    fn path_for(&self, task_id: &str) -> PathBuf {
        self.dir.join(format!("{task_id}.json"))
    }

    /// Write `task` to its file atomically: write a temp sibling, then rename.
    ///
    /// If full serialization fails (non-serializable `run_args`), retries
    /// without `run_args` and flags the record `non_restartable`, matching
    /// the source's fallback-and-warn policy (§4.3).
    async fn persist(&self, task: &TaskRecord) -> Result<(), TaskStorageError> {
        let path = self.path_for(&task.id);
        let tmp = self.dir.join(format!("{}.json.tmp", task.id));

        let json = match serde_json::to_string_pretty(task) {
            Ok(s) => s,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "task record failed to serialize in full; retrying without run_args");
                let mut stripped = task.clone();
                stripped.run_args = None;
                stripped.non_restartable = true;
                serde_json::to_string_pretty(&stripped)?
            }
        };

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(task_id = %task.id, path = %path.display(), "persisted task state");
        Ok(())
    }

    async fn delete_file(&self, task_id: &str) {
        let path = self.path_for(task_id);
        if path.exists() {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(task_id = %task_id, error = %e, "failed to delete persisted task state");
            } else {
                debug!(task_id = %task_id, "deleted persisted task state");
            }
        }
    }
}

#[async_trait]
impl TaskStorage for FileTaskStorage {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn create_task(&self, task: TaskRecord) -> Result<TaskRecord, TaskStorageError> {
        self.persist(&task).await?;
        self.tasks.write().await.insert(task.id.clone(), task.clone());
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
        let updated = {
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
            task.clone()
        };
        self.persist(&updated).await?;
        Ok(updated)
    }

    async fn update_progress(
        &self,
        task_id: &str,
        progress: TaskProgress,
    ) -> Result<TaskRecord, TaskStorageError> {
        let updated = {
            let mut tasks = self.tasks.write().await;
            let task = tasks
                .get_mut(task_id)
                .ok_or_else(|| TaskStorageError::UnknownTask(task_id.to_string()))?;
            task.progress = progress;
            task.clone()
        };
        self.persist(&updated).await?;
        Ok(updated)
    }

    async fn put_task(&self, task: TaskRecord) -> Result<(), TaskStorageError> {
        self.persist(&task).await?;
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
        drop(tasks);
        self.delete_file(task_id).await;
        Ok(())
    }

    async fn restore(&self, registered: &[String]) -> Result<Vec<TaskRecord>, TaskStorageError> {
        info!(dir = %self.dir.display(), "restoring persisted tasks");

        let mut loaded = 0usize;
        let mut interrupted = 0usize;
        let mut cleaned = 0usize;
        let mut restored = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let bytes = match tokio::fs::read(&path).await {
                Ok(b) => b,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not read task file; skipping");
                    continue;
                }
            };

            let mut record: TaskRecord = match serde_json::from_slice(&bytes) {
                Ok(r) => r,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not parse task file; skipping");
                    continue;
                }
            };

            if record.status == TaskStatus::Completed {
                self.delete_file(&record.id).await;
                cleaned += 1;
                continue;
            }

            if !registered.iter().any(|name| name == &record.name) {
                record.status = TaskStatus::Error;
                record.error = Some(format!(
                    "Task type '{}' is not registered. Cannot restore.",
                    record.name
                ));
                self.persist(&record).await?;
                restored.push(record);
                loaded += 1;
                continue;
            }

            if matches!(record.status, TaskStatus::Running | TaskStatus::Paused) {
                record.status = TaskStatus::Interrupted;
                record.error = Some("Task was interrupted by application shutdown".to_string());
                self.persist(&record).await?;
                interrupted += 1;
            }

            restored.push(record);
            loaded += 1;
        }

        {
            let mut tasks = self.tasks.write().await;
            for record in &restored {
                tasks.insert(record.id.clone(), record.clone());
            }
        }

        if loaded > 0 || cleaned > 0 || interrupted > 0 {
            info!(loaded, interrupted, cleaned, "task restore complete");
        }

        Ok(restored)
    }
}

/// Default state directory used when the caller doesn't provide one.
pub fn default_state_dir() -> PathBuf {
    Path::new("data").join("tasks")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(id: &str, name: &str) -> TaskRecord {
        TaskRecord::new(id.to_string(), name.to_string(), false, false, None)
    }

    #[tokio::test]
    async fn persisted_round_trip_survives_restore() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTaskStorage::open(dir.path()).await.unwrap();
        storage.create_task(make("a", "demo")).await.unwrap();

        let reopened = FileTaskStorage::open(dir.path()).await.unwrap();
        let restored = reopened.restore(&["demo".to_string()]).await.unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn completed_task_files_are_cleaned_up_on_restore() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTaskStorage::open(dir.path()).await.unwrap();
        let mut task = make("b", "demo");
        task.status = TaskStatus::Completed;
        storage.put_task(task).await.unwrap();

        let reopened = FileTaskStorage::open(dir.path()).await.unwrap();
        let restored = reopened.restore(&["demo".to_string()]).await.unwrap();
        assert!(restored.is_empty());
        assert!(!dir.path().join("b.json").exists());
    }

    #[tokio::test]
    async fn running_becomes_interrupted_on_restore() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTaskStorage::open(dir.path()).await.unwrap();
        let mut task = make("c", "demo");
        task.status = TaskStatus::Running;
        storage.put_task(task).await.unwrap();

        let reopened = FileTaskStorage::open(dir.path()).await.unwrap();
        let restored = reopened.restore(&["demo".to_string()]).await.unwrap();
        assert_eq!(restored[0].status, TaskStatus::Interrupted);
        assert_eq!(
            restored[0].error.as_deref(),
            Some("Task was interrupted by application shutdown")
        );
    }

    #[tokio::test]
    async fn unregistered_task_type_becomes_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTaskStorage::open(dir.path()).await.unwrap();
        storage.put_task(make("d", "nonexistent")).await.unwrap();

        let reopened = FileTaskStorage::open(dir.path()).await.unwrap();
        let restored = reopened.restore(&["demo".to_string()]).await.unwrap();
        assert_eq!(restored[0].status, TaskStatus::Error);
        assert!(restored[0].error.as_ref().unwrap().contains("nonexistent"));
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTaskStorage::open(dir.path()).await.unwrap();
        let mut task = make("e", "demo");
        task.status = TaskStatus::Cancelled;
        storage.put_task(task).await.unwrap();
        assert!(dir.path().join("e.json").exists());

        storage.delete_task("e").await.unwrap();
        assert!(!dir.path().join("e.json").exists());
    }
}
