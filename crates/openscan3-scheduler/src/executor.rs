//! The `TaskExecutor` abstraction: plugs the scheduler's admission-control
//! logic into a concrete concurrency runtime. `TokioTaskExecutor` is the
//! only implementation shipped, but keeping the seam lets the scheduler
//! core stay runtime-agnostic, separate from any one Tokio-specific
//! execution strategy.

use futures::future::BoxFuture;

use openscan3_core::TaskStatus;
use openscan3_task_storage::TaskStorageError;

/// The terminal outcome of a single task execution.
pub enum TaskOutcome {
    Success(Option<serde_json::Value>),
    Error(String),
}

/// A unit of work handed to the executor: produced once per run, consumed
/// exactly once. Boxed because the scheduler erases the concrete task type.
pub type BoxedTaskWork = Box<dyn FnOnce() -> BoxFuture<'static, TaskOutcome> + Send>;

/// A live handle to a running (or recently-running) execution.
pub trait TaskHandle: Send + Sync {
    fn cancel(&self);
    fn is_cancelled(&self) -> bool;
}

/// Starts, cancels, and awaits the completion of task executions.
///
/// Implementations own the concurrency primitives (spawn, cancellation,
/// status propagation) but know nothing about admission control, the
/// pending queue, or persistence — that's the scheduler's job.
#[async_trait::async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn start_task(
        &self,
        task_id: &str,
        work: BoxedTaskWork,
    ) -> Result<Box<dyn TaskHandle>, TaskStorageError>;

    async fn cancel_task(&self, task_id: &str) -> Result<(), TaskStorageError>;

    /// Waits for the task to reach a terminal status, returning it. `None`
    /// if the task id is unknown to the executor (already cleaned up, or
    /// never started).
    async fn await_terminal(&self, task_id: &str) -> Option<TaskStatus>;
}
