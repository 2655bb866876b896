//! Collaborator interfaces consumed by `ScanTask` and the supporting tasks.
//!
//! Concrete hardware drivers and cloud wire protocols are out of scope for
//! this subsystem; these traits are the stable seam the tasks program
//! against. Implementations live outside this crate (real drivers, or test
//! doubles).

use async_trait::async_trait;

use crate::path::{PolarPoint3D, ScanPath};
use crate::scan::{PhotoData, Scan, ScanSettings};

/// Mutable camera settings a task may read and adjust mid-scan.
#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub af: bool,
    pub manual_focus: f64,
    pub orientation_flag: u8,
    /// Percent of the oriented image cropped away on each axis, set by
    /// the crop-detection task.
    pub crop_width: u32,
    pub crop_height: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            af: true,
            manual_focus: 0.0,
            orientation_flag: 1,
            crop_width: 0,
            crop_height: 0,
        }
    }
}

/// A named camera a `ScanTask` drives through a scan.
#[async_trait]
pub trait CameraController: Send + Sync {
    /// Capture a single photo in the given image format (e.g. `"jpeg"`).
    async fn photo(&self, format: &str) -> anyhow::Result<PhotoData>;

    /// Capture a low-resolution preview, used for project thumbnails.
    async fn preview(&self) -> anyhow::Result<Vec<u8>>;

    async fn is_busy(&self) -> bool;

    fn settings(&self) -> CameraSettings;

    fn set_settings(&self, settings: CameraSettings);
}

/// Drives the scanner's stepper motors.
#[async_trait]
pub trait MotorSubsystem: Send + Sync {
    async fn move_to_point(&self, point: PolarPoint3D) -> anyhow::Result<()>;
}

/// Owns on-disk project state: scan records, the captured path, and photos.
#[async_trait]
pub trait ProjectManager: Send + Sync {
    async fn get_project_by_name(&self, name: &str) -> anyhow::Result<ProjectHandle>;

    async fn add_scan(&self, project_name: &str, scan: &Scan) -> anyhow::Result<()>;

    async fn save_scan_state(&self, scan: &Scan) -> anyhow::Result<()>;

    async fn save_scan_path(&self, scan: &Scan, path: &ScanPath) -> anyhow::Result<()>;

    /// Hands a captured photo to the project's own save pipeline. Callers
    /// must not await this inline in the capture loop — it is meant to be
    /// spawned as an independent job so disk IO never blocks the motors.
    async fn add_photo_async(&self, photo: PhotoData) -> anyhow::Result<()>;
}

/// A resolved project: just enough to let a task locate its files on disk.
#[derive(Debug, Clone)]
pub struct ProjectHandle {
    pub name: String,
    pub path: std::path::PathBuf,
    pub thumbnail_exists: bool,
}

/// Pure function turning scan settings into an ordered scan path.
/// Path geometry itself (Fibonacci sphere, optimization heuristics) is
/// outside this subsystem's scope — implementations are opaque to it.
pub trait PathGenerator: Send + Sync {
    fn generate(&self, settings: &ScanSettings) -> anyhow::Result<ScanPath>;
}
