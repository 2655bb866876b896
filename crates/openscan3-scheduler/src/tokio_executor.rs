//! Tokio-based task executor — default in-process execution using `tokio::spawn`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};
use tracing::debug;

use openscan3_core::TaskStatus;
use openscan3_task_storage::{is_terminal, TaskStorageError};

use crate::cancellation::CancellationHandle;
use crate::executor::{BoxedTaskWork, TaskExecutor, TaskHandle, TaskOutcome};

struct TokioTaskEntry {
    cancellation: CancellationHandle,
    status_tx: watch::Sender<TaskStatus>,
}

/// In-process task executor using the Tokio runtime.
pub struct TokioTaskExecutor {
    entries: Arc<RwLock<HashMap<String, TokioTaskEntry>>>,
}

impl TokioTaskExecutor {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for TokioTaskExecutor {
    fn default() -> Self {
        Self::new()
    }
}

struct TokioTaskHandle {
    cancellation: CancellationHandle,
}

impl TaskHandle for TokioTaskHandle {
    fn cancel(&self) {
        self.cancellation.cancel();
    }
    fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[async_trait]
impl TaskExecutor for TokioTaskExecutor {
    async fn start_task(
        &self,
        task_id: &str,
        work: BoxedTaskWork,
    ) -> Result<Box<dyn TaskHandle>, TaskStorageError> {
        let cancellation = CancellationHandle::new();
        let (status_tx, _) = watch::channel(TaskStatus::Running);

        let entry = TokioTaskEntry {
            cancellation: cancellation.clone(),
            status_tx: status_tx.clone(),
        };
        self.entries.write().await.insert(task_id.to_string(), entry);

        let task_id_owned = task_id.to_string();
        let entries = Arc::clone(&self.entries);

        // Two-phase cancellation (§5): the work closure is expected to poll
        // its own `CancellationHandle` copy at checkpoints; aborting the
        // JoinHandle on drop is the second phase for work that never yields.
        tokio::spawn(async move {
            let outcome = (work)().await;

            let terminal_status = match &outcome {
                TaskOutcome::Success(_) => TaskStatus::Completed,
                TaskOutcome::Error(_) => TaskStatus::Error,
            };
            if let Some(entry) = entries.read().await.get(&task_id_owned) {
                let _ = entry.status_tx.send(terminal_status);
            }
            // Let watchers observe the terminal status before cleanup.
            tokio::task::yield_now().await;
            entries.write().await.remove(&task_id_owned);

            debug!(task_id = %task_id_owned, status = ?terminal_status, "task execution finished");
        });

        Ok(Box::new(TokioTaskHandle { cancellation }))
    }

    async fn cancel_task(&self, task_id: &str) -> Result<(), TaskStorageError> {
        if let Some(entry) = self.entries.read().await.get(task_id) {
            entry.cancellation.cancel();
            Ok(())
        } else {
            Err(TaskStorageError::UnknownTask(task_id.to_string()))
        }
    }

    async fn await_terminal(&self, task_id: &str) -> Option<TaskStatus> {
        let mut rx = {
            let entries = self.entries.read().await;
            entries.get(task_id)?.status_tx.subscribe()
        };
        loop {
            if rx.changed().await.is_err() {
                return None;
            }
            let status = *rx.borrow();
            if is_terminal(status) {
                return Some(status);
            }
        }
    }
}
