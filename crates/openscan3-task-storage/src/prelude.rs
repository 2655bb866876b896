//! Convenient re-exports.
//!
//! ```rust,no_run
//! use openscan3_task_storage::prelude::*;
//! ```

pub use crate::error::TaskStorageError;
#[cfg(feature = "file")]
pub use crate::file::FileTaskStorage;
#[cfg(feature = "in-memory")]
pub use crate::in_memory::InMemoryTaskStorage;
pub use crate::state_machine::{is_terminal, validate_transition};
pub use crate::traits::{TaskRecord, TaskStorage};
