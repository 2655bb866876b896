//! The task base abstraction (§4.1, C2): cooperation primitives every task
//! is handed, and the trait every task type implements.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use openscan3_core::TaskProgress;

use crate::cancellation::{CancellationHandle, PauseGate};

/// Per-task cooperation primitives and the progress sink, handed to a
/// task's `run`/`run_blocking` method by the scheduler.
///
/// Mirrors the push-channel model from §9's design notes: a streaming task
/// is just one that calls `emit_progress` more than once before returning.
#[derive(Clone)]
pub struct TaskContext {
    pub task_id: String,
    cancellation: CancellationHandle,
    pause: PauseGate,
    progress_tx: mpsc::UnboundedSender<TaskProgress>,
}

impl TaskContext {
    /// Exposed beyond this crate so that a task type defined elsewhere can
    /// build a `TaskContext` in its own unit tests without a running
    /// scheduler.
    pub fn new(
        task_id: String,
        cancellation: CancellationHandle,
        pause: PauseGate,
        progress_tx: mpsc::UnboundedSender<TaskProgress>,
    ) -> Self {
        Self {
            task_id,
            cancellation,
            pause,
            progress_tx,
        }
    }

    /// Returns the cancel flag. MUST be polled at every natural checkpoint.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Suspends until the pause gate is open. MUST be awaited at every
    /// natural checkpoint; a no-op when not paused.
    pub async fn wait_for_pause(&self) {
        self.pause.wait_for_pause().await
    }

    /// Emits a progress update. The scheduler persists updates in the order
    /// emitted (§5 ordering guarantees); `current` must be monotonically
    /// non-decreasing within a run.
    pub fn emit_progress(&self, progress: TaskProgress) {
        // An error here only means the scheduler's reader already exited
        // (e.g. the task outlived its own wrapper) — nothing to recover.
        let _ = self.progress_tx.send(progress);
    }
}

/// A registered task type (C2).
///
/// Every implementor declares, via the trait methods below, whether it is
/// exclusive and/or blocking, then implements exactly one of `run` (default
/// panics into an error) or `run_blocking`.
#[async_trait]
pub trait Task: Send + Sync {
    /// Globally unique within the registry.
    fn task_name(&self) -> &'static str;

    /// An exclusive task requires sole access to the scheduler — no other
    /// task runs concurrently with it.
    fn is_exclusive(&self) -> bool {
        false
    }

    /// A blocking task's work does not yield; it runs on the worker pool
    /// and is not pause/resume/cancel-cooperative.
    fn is_blocking(&self) -> bool {
        false
    }

    /// Cooperative single-shot or streaming execution.
    ///
    /// MUST poll `ctx.is_cancelled()` and await `ctx.wait_for_pause()` at
    /// every natural checkpoint, and MUST emit a final progress update with
    /// `current == total` on success (the scheduler also enforces this).
    async fn run(&self, ctx: TaskContext, args: Value) -> anyhow::Result<Option<Value>> {
        let _ = (ctx, args);
        Err(anyhow::anyhow!(
            "task '{}' does not implement cooperative run()",
            self.task_name()
        ))
    }

    /// Synchronous execution on the worker pool. Only legal when
    /// `is_blocking()` is true.
    fn run_blocking(&self, args: Value) -> anyhow::Result<Option<Value>> {
        let _ = args;
        Err(anyhow::anyhow!(
            "task '{}' does not implement run_blocking()",
            self.task_name()
        ))
    }
}
