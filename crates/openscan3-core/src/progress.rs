//! Task status and progress — the closed data model shared by every task record.

use serde::{Deserialize, Serialize};

/// Closed set of task lifecycle states.
///
/// Terminal states are `Completed`, `Cancelled`, `Error`, and `Interrupted` —
/// once a record reaches one of these it is never mutated again except by
/// `restart`, which resets it to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Cancelled,
    Error,
    Interrupted,
}

impl TaskStatus {
    /// Terminal statuses admit no further transitions except via `restart`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed
                | TaskStatus::Cancelled
                | TaskStatus::Error
                | TaskStatus::Interrupted
        )
    }
}

/// Streaming progress for a cooperative task.
///
/// `current` is monotonically non-decreasing while the task runs and is
/// reset to zero on `restart`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub current: u64,
    pub total: u64,
    pub message: String,
}

impl TaskProgress {
    pub fn new(current: u64, total: u64, message: impl Into<String>) -> Self {
        Self {
            current,
            total,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
        assert!(TaskStatus::Interrupted.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Paused.is_terminal());
    }

    #[test]
    fn progress_serde_roundtrip() {
        let progress = TaskProgress::new(3, 10, "Scan in progress.");
        let json = serde_json::to_string(&progress).unwrap();
        let back: TaskProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(progress, back);
    }
}
