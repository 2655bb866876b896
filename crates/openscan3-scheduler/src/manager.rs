//! The scheduler core (§4.2-§4.5, C5) and its lifecycle operations (§4.5, C6).
//!
//! Grounded directly in `task_manager.py`'s `_can_run_task` /
//! `_try_run_pending_tasks` / `_run_wrapper` / `cancel_task` / `pause_task` /
//! `resume_task` / `restart_task` / `delete_task` / `wait_for_task`. The
//! admission-control loop keeps the Python original's FIFO-with-strict-head
//! rule: the queue is only ever advanced from its head, so a task that
//! cannot yet run blocks everything behind it rather than letting a later,
//! more eligible task jump ahead and starve it forever.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex, RwLock};

use openscan3_core::TaskStatus;
use openscan3_task_storage::{TaskRecord, TaskStorage, TaskStorageError};

use crate::cancellation::{CancellationHandle, PauseGate};
use crate::events::{EventPublisher, TaskEvent, TaskEventKind};
use crate::executor::{BoxedTaskWork, TaskExecutor, TaskHandle, TaskOutcome};
use crate::registry::TaskRegistry;
use crate::task::{Task, TaskContext};

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error(transparent)]
    Storage(#[from] TaskStorageError),

    #[error("task type '{0}' is not registered")]
    UnknownTaskType(String),

    #[error("failed to construct task '{0}': {1}")]
    Construction(String, String),

    #[error("task '{0}' has no saved run_args and cannot be restarted")]
    MissingRunArgs(String),

    #[error("timed out waiting for task '{0}'")]
    WaitTimeout(String),
}

/// Bounds on concurrent execution (§4.2). `max_cooperative` is the only
/// tunable; exclusive tasks always run alone and blocking tasks run on the
/// worker pool unbounded by this figure.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub max_cooperative: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_cooperative: 3 }
    }
}

struct PendingEntry {
    task_id: String,
    task: Arc<dyn Task>,
    args: Value,
    is_exclusive: bool,
    is_blocking: bool,
}

#[derive(Default)]
struct SchedulerState {
    pending: VecDeque<PendingEntry>,
    running_ids: HashSet<String>,
    cooperative_running: usize,
    exclusive_running: bool,
}

/// The durable, in-process task scheduler.
///
/// Cloning is cheap (an `Arc` wrapper internally) and every clone shares
/// the same pending queue, running set, and storage backend.
pub struct TaskManager {
    registry: Arc<TaskRegistry>,
    storage: Arc<dyn TaskStorage>,
    executor: Arc<dyn TaskExecutor>,
    events: EventPublisher,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    cancel_handles: RwLock<HashMap<String, CancellationHandle>>,
    pause_gates: RwLock<HashMap<String, PauseGate>>,
    handles: RwLock<HashMap<String, Box<dyn TaskHandle>>>,
}

impl TaskManager {
    pub fn new(
        registry: Arc<TaskRegistry>,
        storage: Arc<dyn TaskStorage>,
        executor: Arc<dyn TaskExecutor>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            storage,
            executor,
            events: EventPublisher::new(),
            config,
            state: Mutex::new(SchedulerState::default()),
            cancel_handles: RwLock::new(HashMap::new()),
            pause_gates: RwLock::new(HashMap::new()),
            handles: RwLock::new(HashMap::new()),
        })
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    /// Boot recovery (§4.3): walks persisted state, drops completed
    /// records, flags unregistered task types as errored, and marks any
    /// `Running`/`Paused` record `Interrupted`. Nothing in the recovered
    /// set is runnable; an operator must `restart` an interrupted task
    /// explicitly.
    pub async fn restore(&self) -> Result<Vec<TaskRecord>, ManagerError> {
        let registered = self.registry.registered_names();
        Ok(self.storage.restore(&registered).await?)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<TaskRecord, ManagerError> {
        self.storage
            .get_task(task_id)
            .await?
            .ok_or_else(|| TaskStorageError::UnknownTask(task_id.to_string()).into())
    }

    pub async fn list_tasks(&self) -> Result<Vec<TaskRecord>, ManagerError> {
        Ok(self.storage.list_tasks().await?)
    }

    /// Submits a new task run. Constructs the task eagerly so a bad
    /// `args` payload fails the call instead of silently dying once
    /// admitted.
    pub async fn submit(self: &Arc<Self>, task_name: &str, args: Value) -> Result<TaskRecord, ManagerError> {
        let info = self
            .registry
            .info(task_name)
            .ok_or_else(|| ManagerError::UnknownTaskType(task_name.to_string()))?;
        let task = self
            .registry
            .construct(task_name, args.clone())
            .map_err(|e| ManagerError::Construction(task_name.to_string(), e.to_string()))?;

        let task_id = uuid::Uuid::now_v7().to_string();
        let record = TaskRecord::new(
            task_id.clone(),
            task_name,
            info.is_exclusive,
            info.is_blocking,
            Some(args.clone()),
        );
        let record = self.storage.create_task(record).await?;
        self.events.publish_task(TaskEvent {
            kind: TaskEventKind::Create,
            record: record.clone(),
        });

        {
            let mut state = self.state.lock().await;
            state.pending.push_back(PendingEntry {
                task_id,
                task,
                args,
                is_exclusive: info.is_exclusive,
                is_blocking: info.is_blocking,
            });
        }
        self.try_run_pending().await;

        Ok(record)
    }

    /// Cancels a task. A still-pending task is pulled out of the queue
    /// and moved straight to `Cancelled`; a running task's cancel flag is
    /// flipped and its executor handle aborted — the running wrapper
    /// observes the flag (or the abort) and persists `Cancelled` itself.
    pub async fn cancel_task(self: &Arc<Self>, task_id: &str) -> Result<TaskRecord, ManagerError> {
        {
            let mut state = self.state.lock().await;
            if let Some(pos) = state.pending.iter().position(|e| e.task_id == task_id) {
                state.pending.remove(pos);
                drop(state);
                let cancelled = self
                    .storage
                    .update_task_status(task_id, TaskStatus::Cancelled, None)
                    .await?;
                // Removing a queued-but-not-yet-admitted entry can unblock
                // whatever was stuck behind it at the head of the line.
                self.try_run_pending().await;
                return Ok(cancelled);
            }
        }

        if let Some(handle) = self.cancel_handles.read().await.get(task_id) {
            handle.cancel();
        }
        // A task parked in `wait_for_pause()` never reaches another
        // checkpoint to observe the flag above unless the gate is also
        // opened here (§5: cancel must work on a PAUSED task without
        // requiring a resume first).
        if let Some(gate) = self.pause_gates.read().await.get(task_id) {
            gate.resume();
        }
        if let Some(handle) = self.handles.read().await.get(task_id) {
            handle.cancel();
        }
        let _ = self.executor.cancel_task(task_id).await;

        self.get_task(task_id).await
    }

    /// Closes the pause gate for a running task. Idempotent: already-PAUSED
    /// stays PAUSED, and a task that isn't currently running (no registered
    /// gate) returns its record unchanged rather than erroring (§7, §8).
    pub async fn pause_task(&self, task_id: &str) -> Result<TaskRecord, ManagerError> {
        let record = self.get_task(task_id).await?;
        let Some(gate) = self.pause_gates.read().await.get(task_id).cloned() else {
            return Ok(record);
        };
        if record.status == TaskStatus::Paused {
            return Ok(record);
        }
        gate.pause();
        Ok(self.storage.update_task_status(task_id, TaskStatus::Paused, None).await?)
    }

    /// Opens the pause gate for a running task. Idempotent: already-RUNNING
    /// stays RUNNING, and a task that isn't currently running (no registered
    /// gate) returns its record unchanged rather than erroring (§7, §8).
    pub async fn resume_task(&self, task_id: &str) -> Result<TaskRecord, ManagerError> {
        let record = self.get_task(task_id).await?;
        let Some(gate) = self.pause_gates.read().await.get(task_id).cloned() else {
            return Ok(record);
        };
        if record.status == TaskStatus::Running {
            return Ok(record);
        }
        gate.resume();
        Ok(self.storage.update_task_status(task_id, TaskStatus::Running, None).await?)
    }

    /// Re-queues a terminal, restartable task from its originally saved
    /// `run_args`, resetting progress and clearing the previous result.
    pub async fn restart_task(self: &Arc<Self>, task_id: &str) -> Result<TaskRecord, ManagerError> {
        let mut record = self.get_task(task_id).await?;
        if !openscan3_task_storage::is_terminal(record.status) {
            return Err(TaskStorageError::InvalidTransition {
                current: record.status,
                requested: TaskStatus::Pending,
            }
            .into());
        }
        if record.non_restartable {
            return Err(TaskStorageError::NotRestartable(task_id.to_string()).into());
        }
        let args = record
            .run_args
            .clone()
            .ok_or_else(|| ManagerError::MissingRunArgs(task_id.to_string()))?;

        let task = self
            .registry
            .construct(&record.name, args.clone())
            .map_err(|e| ManagerError::Construction(record.name.clone(), e.to_string()))?;

        record.reset_for_restart();
        self.storage.put_task(record.clone()).await?;

        {
            let mut state = self.state.lock().await;
            state.pending.push_back(PendingEntry {
                task_id: task_id.to_string(),
                task,
                args,
                is_exclusive: record.is_exclusive,
                is_blocking: record.is_blocking,
            });
        }
        self.try_run_pending().await;

        Ok(record)
    }

    /// Deletes a task's persisted state. Storage itself enforces that the
    /// task is terminal (or already absent) before allowing deletion.
    pub async fn delete_task(&self, task_id: &str) -> Result<(), ManagerError> {
        let record = self.storage.get_task(task_id).await?;
        self.storage.delete_task(task_id).await?;
        if let Some(record) = record {
            self.events.publish_task(TaskEvent {
                kind: TaskEventKind::Delete,
                record,
            });
        }
        Ok(())
    }

    /// Polls until the task reaches a terminal status or the timeout
    /// elapses.
    pub async fn wait_for_task(&self, task_id: &str, timeout: Option<Duration>) -> Result<TaskRecord, ManagerError> {
        const POLL_INTERVAL: Duration = Duration::from_millis(25);
        let poll = async {
            loop {
                let record = self.get_task(task_id).await?;
                if openscan3_task_storage::is_terminal(record.status) {
                    return Ok(record);
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        match timeout {
            Some(duration) => tokio::time::timeout(duration, poll)
                .await
                .map_err(|_| ManagerError::WaitTimeout(task_id.to_string()))?,
            None => poll.await,
        }
    }

    fn can_admit(entry: &PendingEntry, state: &SchedulerState, max_cooperative: usize) -> bool {
        if state.exclusive_running {
            return false;
        }
        if entry.is_exclusive {
            return state.running_ids.is_empty();
        }
        if entry.is_blocking {
            return true;
        }
        state.cooperative_running < max_cooperative
    }

    /// The admission loop (§4.2). Only ever inspects the head of the
    /// queue: the first entry that can't run yet stops the scan, so a
    /// task never gets starved by later, lower-class arrivals cutting in
    /// line.
    async fn try_run_pending(self: &Arc<Self>) {
        let mut to_start = Vec::new();
        {
            let mut state = self.state.lock().await;
            while let Some(front) = state.pending.front() {
                if Self::can_admit(front, &state, self.config.max_cooperative) {
                    let entry = state.pending.pop_front().expect("front checked above");
                    if entry.is_exclusive {
                        state.exclusive_running = true;
                    } else if !entry.is_blocking {
                        state.cooperative_running += 1;
                    }
                    state.running_ids.insert(entry.task_id.clone());
                    to_start.push(entry);
                } else {
                    break;
                }
            }
        }

        for entry in to_start {
            self.start_entry(entry).await;
        }
    }

    async fn start_entry(self: &Arc<Self>, entry: PendingEntry) {
        let PendingEntry {
            task_id,
            task,
            args,
            is_exclusive,
            is_blocking,
        } = entry;

        match self.storage.update_task_status(&task_id, TaskStatus::Running, None).await {
            Ok(record) => self.events.publish_task(TaskEvent {
                kind: TaskEventKind::Update,
                record,
            }),
            Err(err) => tracing::error!(task_id = %task_id, error = %err, "failed to mark task running"),
        }

        let cancellation = CancellationHandle::new();
        let pause = PauseGate::new();
        self.cancel_handles.write().await.insert(task_id.clone(), cancellation.clone());
        self.pause_gates.write().await.insert(task_id.clone(), pause.clone());

        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        self.spawn_progress_sink(task_id.clone(), progress_rx);

        let ctx = TaskContext::new(task_id.clone(), cancellation.clone(), pause, progress_tx);

        let storage = Arc::clone(&self.storage);
        let events = self.events.clone();
        let work_task_id = task_id.clone();
        let work_cancellation = cancellation.clone();
        let work: BoxedTaskWork = Box::new(move || {
            Box::pin(async move {
                let run_result = if is_blocking {
                    let blocking_task = Arc::clone(&task);
                    let blocking_args = args.clone();
                    tokio::task::spawn_blocking(move || blocking_task.run_blocking(blocking_args))
                        .await
                        .unwrap_or_else(|e| Err(anyhow::anyhow!("task panicked: {e}")))
                } else {
                    task.run(ctx, args.clone()).await
                };

                let status = if work_cancellation.is_cancelled() {
                    // A cooperative task observes cancellation and returns
                    // `Ok` from its own checkpoint (§5) rather than an `Err`,
                    // so the flag — not the `Result` variant — is what
                    // decides `Cancelled` vs `Completed`/`Error`.
                    TaskStatus::Cancelled
                } else {
                    match &run_result {
                        Ok(_) => TaskStatus::Completed,
                        Err(_) => TaskStatus::Error,
                    }
                };
                let error_message = match (&run_result, status) {
                    (Err(e), TaskStatus::Error) => Some(e.to_string()),
                    _ => None,
                };

                match storage.update_task_status(&work_task_id, status, error_message).await {
                    Ok(mut record) => {
                        if status == TaskStatus::Completed {
                            record.progress.current = record.progress.current.max(record.progress.total);
                            record.result = run_result.ok().flatten();
                            let _ = storage.put_task(record.clone()).await;
                        }
                        events.publish_task(TaskEvent {
                            kind: TaskEventKind::Update,
                            record,
                        });
                    }
                    Err(err) => {
                        tracing::error!(task_id = %work_task_id, error = %err, "failed to persist terminal task state");
                    }
                }

                TaskOutcome::Success(None)
            })
        });

        match self.executor.start_task(&task_id, work).await {
            Ok(handle) => {
                self.handles.write().await.insert(task_id.clone(), handle);
            }
            Err(err) => {
                tracing::error!(task_id = %task_id, error = %err, "failed to start task execution");
            }
        }

        let manager = Arc::clone(self);
        let finish_task_id = task_id.clone();
        tokio::spawn(async move {
            manager.executor.await_terminal(&finish_task_id).await;
            manager.on_task_finished(&finish_task_id, is_exclusive, is_blocking).await;
        });
    }

    fn spawn_progress_sink(
        &self,
        task_id: String,
        mut progress_rx: mpsc::UnboundedReceiver<openscan3_core::TaskProgress>,
    ) {
        let storage = Arc::clone(&self.storage);
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(progress) = progress_rx.recv().await {
                match storage.update_progress(&task_id, progress).await {
                    Ok(record) => events.publish_task(TaskEvent {
                        kind: TaskEventKind::Update,
                        record,
                    }),
                    Err(err) => {
                        tracing::warn!(task_id = %task_id, error = %err, "failed to persist progress update");
                    }
                }
            }
        });
    }

    async fn on_task_finished(self: &Arc<Self>, task_id: &str, is_exclusive: bool, is_blocking: bool) {
        {
            let mut state = self.state.lock().await;
            state.running_ids.remove(task_id);
            if is_exclusive {
                state.exclusive_running = false;
            } else if !is_blocking {
                state.cooperative_running = state.cooperative_running.saturating_sub(1);
            }
        }
        self.cancel_handles.write().await.remove(task_id);
        self.pause_gates.write().await.remove(task_id);
        self.handles.write().await.remove(task_id);

        self.try_run_pending().await;
    }
}
