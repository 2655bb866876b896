//! Domain types shared by the OpenScan3 task subsystem.
//!
//! This crate carries only plain data and the collaborator interfaces the
//! scheduler and its tasks consume — no scheduling logic, no persistence,
//! no hardware drivers. Keeping it dependency-light lets both
//! `openscan3-task-storage` and `openscan3-scheduler` sit on top of it
//! without a cycle.

pub mod collaborators;
pub mod path;
pub mod progress;
pub mod scan;

pub use collaborators::{
    CameraController, CameraSettings, MotorSubsystem, PathGenerator, ProjectHandle, ProjectManager,
};
pub use path::{PolarPoint3D, ScanPath};
pub use progress::{TaskProgress, TaskStatus};
pub use scan::{PhotoData, Scan, ScanMetadata, ScanSettings, ScanStatus};
