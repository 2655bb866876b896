//! Scan-specific entities owned by `ScanTask` but consumed through the
//! `ProjectManager` collaborator — these are plain data, not behavior.

use serde::{Deserialize, Serialize};

use crate::path::PolarPoint3D;

/// Mirrors the subset of `TaskStatus` meaningful for a scan's own record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Pending,
    Running,
    Cancelled,
    Completed,
    Error,
}

/// Scan configuration captured at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    pub points: u32,
    pub min_theta: f64,
    pub max_theta: f64,
    pub optimize_path: bool,
    pub optimization_algorithm: String,
    pub image_format: String,
    /// Number of photos taken per position with varying focus. `1` disables
    /// focus stacking.
    pub focus_stacks: u32,
    /// Total focus travel, linearly interpolated into `focus_stacks` positions.
    pub focus_range: f64,
}

impl ScanSettings {
    /// Linearly interpolated manual-focus positions over `focus_range`,
    /// one per configured focus stack.
    pub fn focus_positions(&self) -> Vec<f64> {
        if self.focus_stacks <= 1 {
            return Vec::new();
        }
        let steps = self.focus_stacks - 1;
        (0..self.focus_stacks)
            .map(|i| (i as f64 / steps as f64) * self.focus_range)
            .collect()
    }
}

/// Persistent, incrementally-updated state of one scan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub project_name: String,
    pub index: u32,
    pub status: ScanStatus,
    pub settings: ScanSettings,
    pub camera_name: String,
    pub camera_settings: serde_json::Value,
    pub current_step: u64,
    pub duration: f64,
    pub photos: Vec<String>,
    pub task_id: Option<String>,
    pub system_message: Option<String>,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

/// Metadata attached to a captured photo before it enters the project's
/// asynchronous save pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanMetadata {
    pub step: usize,
    pub polar: PolarPoint3D,
    pub project_name: String,
    pub scan_index: u32,
    pub stack_index: Option<usize>,
}

/// Raw captured image bytes plus the metadata identifying where it belongs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoData {
    pub bytes: Vec<u8>,
    pub scan_metadata: Option<ScanMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(focus_stacks: u32) -> ScanSettings {
        ScanSettings {
            points: 10,
            min_theta: 0.0,
            max_theta: 180.0,
            optimize_path: false,
            optimization_algorithm: "nearest_neighbor".to_string(),
            image_format: "jpeg".to_string(),
            focus_stacks,
            focus_range: 10.0,
        }
    }

    #[test]
    fn no_focus_positions_when_disabled() {
        assert!(settings(1).focus_positions().is_empty());
        assert!(settings(0).focus_positions().is_empty());
    }

    #[test]
    fn focus_positions_span_the_full_range() {
        let positions = settings(3).focus_positions();
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0], 0.0);
        assert_eq!(positions[2], 10.0);
        assert!((positions[1] - 5.0).abs() < 1e-9);
    }
}
