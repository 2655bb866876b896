//! The production scan task: drives motors and camera along a generated
//! path, capturing photos (optionally focus-stacked) at each stop.
//!
//! Grounded directly in the original `ScanTask`: exclusive (sole access to
//! motors/camera), cooperative pause/cancel checked once per step, photo
//! saves handed off to a fire-and-forget pipeline so disk IO never stalls
//! the capture loop, and a cleanup phase that always runs — on success,
//! cancellation, or error alike — to home the motors and restore focus
//! settings.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use openscan3_core::{
    CameraController, CameraSettings, MotorSubsystem, PathGenerator, PolarPoint3D, ProjectManager,
    Scan, ScanMetadata, ScanStatus, TaskProgress,
};
use openscan3_scheduler::task::{Task, TaskContext};

/// The hardware and persistence collaborators a `ScanTask` drives. Built
/// once by the embedding binary and handed to the task registry's
/// constructor closure — see `openscan3-tasks`' crate docs for the wiring.
#[derive(Clone)]
pub struct ScanTaskDeps {
    pub camera: Arc<dyn CameraController>,
    pub motors: Arc<dyn MotorSubsystem>,
    pub projects: Arc<dyn ProjectManager>,
    pub path_generator: Arc<dyn PathGenerator>,
}

#[derive(Debug, Deserialize)]
pub struct ScanTaskArgs {
    pub scan: Scan,
    #[serde(default)]
    pub start_from_step: usize,
}

/// Performs the core scan workflow. Exclusive because it requires sole
/// access to motors and the camera.
pub struct ScanTask {
    deps: ScanTaskDeps,
}

impl ScanTask {
    pub const TASK_NAME: &'static str = "scan_task";

    pub fn new(deps: ScanTaskDeps) -> Self {
        Self { deps }
    }

    async fn ensure_project_thumbnail(&self, scan: &Scan) -> anyhow::Result<()> {
        let project = self.deps.projects.get_project_by_name(&scan.project_name).await?;
        if project.thumbnail_exists {
            return Ok(());
        }
        std::fs::create_dir_all(&project.path)?;
        let thumbnail_path = project.path.join("thumbnail.jpg");

        let preview_bytes = self.deps.camera.preview().await?;
        let orientation_flag = self.deps.camera.settings().orientation_flag;

        tokio::task::spawn_blocking(move || save_thumbnail_jpeg(&preview_bytes, &thumbnail_path, orientation_flag))
            .await??;
        Ok(())
    }

    async fn setup_focus_stacking(&self, scan: &Scan) -> Option<(CameraSettings, Vec<f64>)> {
        let positions = scan.settings.focus_positions();
        if positions.is_empty() {
            return None;
        }
        let previous = self.deps.camera.settings();
        self.deps.camera.set_settings(CameraSettings {
            af: false,
            ..previous.clone()
        });
        Some((previous, positions))
    }

    async fn capture_at_position(
        &self,
        scan: &Scan,
        point: PolarPoint3D,
        original_index: usize,
        focus: Option<&(CameraSettings, Vec<f64>)>,
    ) -> anyhow::Result<()> {
        match focus {
            None => {
                let mut photo = self.deps.camera.photo(&scan.settings.image_format).await?;
                photo.scan_metadata = Some(ScanMetadata {
                    step: original_index,
                    polar: point,
                    project_name: scan.project_name.clone(),
                    scan_index: scan.index,
                    stack_index: None,
                });
                self.spawn_photo_save(photo);
            }
            Some((_, positions)) => {
                for (stack_index, focus_value) in positions.iter().enumerate() {
                    let mut settings = self.deps.camera.settings();
                    settings.manual_focus = *focus_value;
                    self.deps.camera.set_settings(settings);

                    let mut photo = self.deps.camera.photo(&scan.settings.image_format).await?;
                    photo.scan_metadata = Some(ScanMetadata {
                        step: original_index,
                        polar: point,
                        project_name: scan.project_name.clone(),
                        scan_index: scan.index,
                        stack_index: Some(stack_index),
                    });
                    self.spawn_photo_save(photo);
                }
            }
        }
        Ok(())
    }

    /// Hands the photo to the project's save pipeline on its own task so a
    /// slow disk never stalls the next motor move.
    fn spawn_photo_save(&self, photo: openscan3_core::PhotoData) {
        let projects = Arc::clone(&self.deps.projects);
        tokio::spawn(async move {
            if let Err(err) = projects.add_photo_async(photo).await {
                tracing::error!(error = %err, "failed to save captured photo");
            }
        });
    }

    async fn execute_scan_loop(
        &self,
        ctx: &TaskContext,
        scan: &mut Scan,
        path: &[(PolarPoint3D, usize)],
        start_from_step: usize,
        total: usize,
        focus: Option<&(CameraSettings, Vec<f64>)>,
    ) -> anyhow::Result<()> {
        for (step, (point, original_index)) in path.iter().enumerate() {
            let step_start = chrono::Utc::now();
            scan.status = ScanStatus::Running;

            if ctx.is_cancelled() {
                scan.status = ScanStatus::Cancelled;
                ctx.emit_progress(TaskProgress::new(
                    (step + start_from_step + 1) as u64,
                    total as u64,
                    "Scan cancelled by request.",
                ));
                return Ok(());
            }

            ctx.wait_for_pause().await;
            if ctx.is_cancelled() {
                scan.status = ScanStatus::Cancelled;
                ctx.emit_progress(TaskProgress::new(
                    (step + start_from_step + 1) as u64,
                    total as u64,
                    "Scan cancelled by request.",
                ));
                return Ok(());
            }

            self.deps.motors.move_to_point(*point).await?;
            self.capture_at_position(scan, *point, *original_index, focus).await?;

            scan.duration += (chrono::Utc::now() - step_start).num_milliseconds() as f64 / 1000.0;
            scan.current_step = (step + start_from_step + 1) as u64;
            self.deps.projects.save_scan_state(scan).await?;

            ctx.emit_progress(TaskProgress::new(scan.current_step, total as u64, "Scan in progress."));
        }

        scan.status = ScanStatus::Completed;
        ctx.emit_progress(TaskProgress::new(total as u64, total as u64, "Scan completed successfully."));
        Ok(())
    }

    async fn cleanup(&self, focus: Option<(CameraSettings, Vec<f64>)>) -> anyhow::Result<()> {
        self.deps.motors.move_to_point(PolarPoint3D::home()).await?;
        if let Some((previous_settings, _)) = focus {
            self.deps.camera.set_settings(previous_settings);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Task for ScanTask {
    fn task_name(&self) -> &'static str {
        Self::TASK_NAME
    }

    fn is_exclusive(&self) -> bool {
        true
    }

    async fn run(&self, ctx: TaskContext, args: Value) -> anyhow::Result<Option<Value>> {
        let ScanTaskArgs { mut scan, start_from_step } = serde_json::from_value(args)?;

        self.ensure_project_thumbnail(&scan).await?;

        let mut path = self.deps.path_generator.generate(&scan.settings)?;
        let total = path.len();
        self.deps.projects.save_scan_path(&scan, &path).await?;

        if start_from_step > 0 && start_from_step < path.len() {
            path = path.split_off(start_from_step);
        }

        let focus = self.setup_focus_stacking(&scan).await;

        let run_result = self
            .execute_scan_loop(&ctx, &mut scan, &path, start_from_step, total, focus.as_ref())
            .await;

        if let Err(err) = &run_result {
            scan.status = ScanStatus::Error;
            scan.system_message = Some(format!("Error during scan: {err}"));
            let _ = self.deps.projects.save_scan_state(&scan).await;
        }

        // Cleanup always runs, on every exit path.
        let cleanup_result = self.cleanup(focus).await;

        run_result?;
        cleanup_result?;

        Ok(Some(serde_json::to_value(&scan)?))
    }
}

fn save_thumbnail_jpeg(bytes: &[u8], path: &std::path::Path, orientation_flag: u8) -> anyhow::Result<()> {
    let image = image::load_from_memory(bytes)?;
    let oriented = apply_orientation(image, orientation_flag);
    let thumbnail = oriented.thumbnail(512, 512);
    thumbnail.save_with_format(path, image::ImageFormat::Jpeg)?;
    Ok(())
}

/// EXIF-style orientation flags 1..8, matching the convention the camera
/// driver reports (1 = no transform).
fn apply_orientation(image: image::DynamicImage, orientation_flag: u8) -> image::DynamicImage {
    match orientation_flag {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.fliph().rotate90(),
        6 => image.rotate90(),
        7 => image.fliph().rotate270(),
        8 => image.rotate270(),
        _ => image,
    }
}
