//! # Task Scheduler
//!
//! The durable, in-process task scheduler for the OpenScan3 firmware:
//! admission control over exclusive/blocking/cooperative task classes, a
//! pluggable execution runtime, cooperative cancellation and pause, and
//! best-effort event fan-out (§4).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use openscan3_scheduler::{SchedulerConfig, TaskManager, TaskRegistry, RegistryOptions, TaskTypeInfo};
//! use openscan3_scheduler::tokio_executor::TokioTaskExecutor;
//! use openscan3_task_storage::InMemoryTaskStorage;
//! use serde_json::json;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut registry = TaskRegistry::new(RegistryOptions::default());
//! registry.register(
//!     "example_task",
//!     TaskTypeInfo { is_exclusive: false, is_blocking: false },
//!     |_args| Err(anyhow::anyhow!("wire up a real constructor here")),
//! )?;
//!
//! let manager = TaskManager::new(
//!     Arc::new(registry),
//!     Arc::new(InMemoryTaskStorage::new()),
//!     Arc::new(TokioTaskExecutor::new()),
//!     SchedulerConfig::default(),
//! );
//! manager.restore().await?;
//! let _record = manager.submit("example_task", json!({})).await?;
//! # Ok(())
//! # }
//! ```

pub mod cancellation;
pub mod events;
pub mod executor;
pub mod manager;
pub mod registry;
pub mod task;
pub mod tokio_executor;

pub use cancellation::{CancellationHandle, PauseGate};
pub use events::{DeviceEvent, EventPublisher, TaskEvent, TaskEventKind};
pub use executor::{BoxedTaskWork, TaskExecutor, TaskHandle, TaskOutcome};
pub use manager::{ManagerError, SchedulerConfig, TaskManager};
pub use registry::{autodiscover, RegistryError, RegistryOptions, TaskConstructor, TaskRegistry, TaskTypeInfo};
pub use task::{Task, TaskContext};
