//! Unified error types for task storage operations.

use openscan3_core::TaskStatus;

/// Errors surfaced by task storage and the lifecycle operations layered on it.
///
/// Mirrors the error taxonomy in §7 of the task subsystem design: most of
/// these map 1:1 onto a named failure mode rather than a generic catch-all.
#[derive(Debug, thiserror::Error)]
pub enum TaskStorageError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Invalid state transition: {current:?} -> {requested:?}")]
    InvalidTransition {
        current: TaskStatus,
        requested: TaskStatus,
    },

    #[error("Task is in terminal state: {0:?}")]
    TerminalState(TaskStatus),

    #[error("Task '{0}' is still active; cancel it before deleting")]
    StillActive(String),

    #[error("Task '{0}' is not in a restartable state")]
    NotRestartable(String),

    #[error("Timed out waiting for task '{0}' to reach a terminal state")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Generic storage error: {0}")]
    Generic(String),
}

impl From<serde_json::Error> for TaskStorageError {
    fn from(err: serde_json::Error) -> Self {
        TaskStorageError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for TaskStorageError {
    fn from(err: std::io::Error) -> Self {
        TaskStorageError::Io(err.to_string())
    }
}
