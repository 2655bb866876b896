//! # Task Storage
//!
//! Durable per-task JSON persistence and state-machine enforcement for the
//! OpenScan3 task subsystem (§3, §4.3).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use openscan3_task_storage::prelude::*;
//! use openscan3_core::TaskStatus;
//!
//! # async fn example() -> Result<(), TaskStorageError> {
//! let storage = FileTaskStorage::open("data/tasks").await?;
//!
//! let task = TaskRecord::new("01930000-0000-7000-8000-000000000000".into(), "scan_task", true, false, None);
//! let created = storage.create_task(task).await?;
//!
//! let running = storage.update_task_status(&created.id, TaskStatus::Running, None).await?;
//! assert_eq!(running.status, TaskStatus::Running);
//! # Ok(())
//! # }
//! ```

pub mod error;
#[cfg(feature = "file")]
pub mod file;
#[cfg(feature = "in-memory")]
pub mod in_memory;
pub mod prelude;
pub mod state_machine;
pub mod traits;

pub use error::TaskStorageError;
#[cfg(feature = "file")]
pub use file::{default_state_dir, FileTaskStorage};
#[cfg(feature = "in-memory")]
pub use in_memory::InMemoryTaskStorage;
pub use state_machine::{is_terminal, validate_transition};
pub use traits::{TaskRecord, TaskStorage};
