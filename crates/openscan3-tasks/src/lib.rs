//! # Task Types
//!
//! Concrete `Task` implementations for the OpenScan3 firmware: the
//! production scan workflow, cloud project sync, focus stacking, crop
//! detection, and a set of autodiscoverable demo tasks used to exercise the
//! scheduler end-to-end.
//!
//! This crate only provides task logic and the collaborator traits each
//! task depends on (camera, motors, project storage, cloud API, ...).
//! Wiring concrete collaborator implementations, building a `TaskRegistry`,
//! and constructing a `TaskManager` is the embedding binary's job — see
//! `openscan3-scheduler`'s crate docs for that wiring.
//!
//! ## Registering every task type
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use openscan3_scheduler::{RegistryOptions, TaskRegistry, TaskTypeInfo};
//! use openscan3_tasks::examples::demo::{
//!     ExampleGeneratorTask, ExclusiveDemoTask, FailingTask, HelloWorldAsyncTask, HelloWorldBlockingTask,
//! };
//!
//! # fn example() -> anyhow::Result<TaskRegistry> {
//! let mut registry = TaskRegistry::new(RegistryOptions::default());
//!
//! registry.register(
//!     "hello_world_blocking_task",
//!     TaskTypeInfo { is_exclusive: false, is_blocking: true },
//!     |_args| Ok(Arc::new(HelloWorldBlockingTask) as Arc<dyn openscan3_scheduler::Task>),
//! )?;
//! registry.register(
//!     "hello_world_async_task",
//!     TaskTypeInfo { is_exclusive: false, is_blocking: false },
//!     |_args| Ok(Arc::new(HelloWorldAsyncTask) as Arc<dyn openscan3_scheduler::Task>),
//! )?;
//! registry.register(
//!     "exclusive_demo_task",
//!     TaskTypeInfo { is_exclusive: true, is_blocking: false },
//!     |_args| Ok(Arc::new(ExclusiveDemoTask) as Arc<dyn openscan3_scheduler::Task>),
//! )?;
//! registry.register(
//!     "generator_task",
//!     TaskTypeInfo { is_exclusive: false, is_blocking: false },
//!     |_args| Ok(Arc::new(ExampleGeneratorTask) as Arc<dyn openscan3_scheduler::Task>),
//! )?;
//! registry.register(
//!     "failing_task",
//!     TaskTypeInfo { is_exclusive: false, is_blocking: false },
//!     |_args| Ok(Arc::new(FailingTask) as Arc<dyn openscan3_scheduler::Task>),
//! )?;
//! # Ok(registry)
//! # }
//! ```

pub mod core {
    pub mod cloud_task;
    pub mod scan_task;
}

pub mod crop_task;
pub mod focus_stacking_task;

pub mod examples {
    pub mod demo;
}

pub use core::cloud_task::{CloudApi, CloudDownloadTask, CloudProjectStore, CloudUploadTask, CreateProjectResponse, FsCloudProjectStore};
pub use core::scan_task::{ScanTask, ScanTaskArgs, ScanTaskDeps};
pub use crop_task::CropTask;
pub use focus_stacking_task::{FocusStacker, FocusStackSource, FocusStackingTask};
