//! Focus stacking: combines each batch of same-position, varying-focus
//! photos captured by a scan into one sharp composite image.
//!
//! No source implementation of the original task survived into the
//! retrieval pack — only its behavioral test suite did — so this port is
//! grounded directly on that suite's observed contract: batches keyed by
//! stack position, a calibration pass against the first batch, per-batch
//! pause/cancel checkpoints (cancellation mid-batch yields no result), and
//! deterministic output filenames that a resumed run can use to skip
//! already-stacked batches.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{json, Value};

use openscan3_scheduler::task::{Task, TaskContext};

/// Where a scan's captured, focus-bracketed photos live, grouped into
/// batches by stack position (one batch per output image). The alignment
/// and blending algorithm itself is opaque to this subsystem, same as
/// `PathGenerator` is opaque to path geometry — implementations live
/// outside this crate.
#[async_trait::async_trait]
pub trait FocusStackSource: Send + Sync {
    /// Batches ordered by stack position; each inner vec holds the
    /// focus-bracketed photo paths for one output image.
    async fn batches(&self, project_name: &str, scan_index: u32) -> anyhow::Result<Vec<Vec<PathBuf>>>;

    async fn output_directory(&self, project_name: &str) -> anyhow::Result<PathBuf>;
}

/// Aligns and blends a batch of focus-bracketed photos into one image.
/// Synchronous and CPU-bound; the task drives it from `spawn_blocking`.
pub trait FocusStacker: Send + Sync {
    /// Calibrates an alignment transform from the first batch. Must be
    /// called once before any `stack` call.
    fn calibrate(&self, first_batch: &[PathBuf]) -> anyhow::Result<()>;

    fn stack(&self, batch: &[PathBuf]) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
pub struct FocusStackingArgs {
    pub project_name: String,
    pub scan_index: u32,
    /// When true, a batch whose output file already exists is left alone
    /// rather than recomputed — lets a resumed run finish only what an
    /// earlier, interrupted run left missing.
    #[serde(default)]
    pub resume_missing_only: bool,
}

pub struct FocusStackingTask {
    source: std::sync::Arc<dyn FocusStackSource>,
    stacker: std::sync::Arc<dyn FocusStacker>,
}

impl FocusStackingTask {
    pub const TASK_NAME: &'static str = "focus_stacking_task";

    pub fn new(source: std::sync::Arc<dyn FocusStackSource>, stacker: std::sync::Arc<dyn FocusStacker>) -> Self {
        Self { source, stacker }
    }
}

fn output_filename(scan_index: u32, position: usize) -> String {
    format!("stacked_scan{scan_index:02}_{position:03}.jpg")
}

#[async_trait::async_trait]
impl Task for FocusStackingTask {
    fn task_name(&self) -> &'static str {
        Self::TASK_NAME
    }

    async fn run(&self, ctx: TaskContext, args: Value) -> anyhow::Result<Option<Value>> {
        let FocusStackingArgs {
            project_name,
            scan_index,
            resume_missing_only,
        } = serde_json::from_value(args)?;

        let batches = self.source.batches(&project_name, scan_index).await?;
        if batches.is_empty() {
            return Ok(Some(json!({"stacked_image_count": 0, "output_paths": Vec::<String>::new()})));
        }

        let output_dir = self.source.output_directory(&project_name).await?;
        tokio::fs::create_dir_all(&output_dir).await?;

        let stacker = std::sync::Arc::clone(&self.stacker);
        let first_batch = batches[0].clone();
        tokio::task::spawn_blocking(move || stacker.calibrate(&first_batch)).await??;

        let total = batches.len() as u64;
        let mut output_paths = Vec::with_capacity(batches.len());

        for (position, batch) in batches.into_iter().enumerate() {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            ctx.wait_for_pause().await;
            if ctx.is_cancelled() {
                return Ok(None);
            }

            let output_path = output_dir.join(output_filename(scan_index, position));

            if resume_missing_only && tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
                output_paths.push(output_path);
                ctx.emit_progress(openscan3_core::TaskProgress::new(
                    (position + 1) as u64,
                    total,
                    format!("Batch {} already stacked, skipping.", position + 1),
                ));
                continue;
            }

            let stacker = std::sync::Arc::clone(&self.stacker);
            let batch_for_blocking = batch.clone();
            let stacked_bytes = tokio::task::spawn_blocking(move || stacker.stack(&batch_for_blocking)).await??;

            tokio::fs::write(&output_path, &stacked_bytes).await?;
            output_paths.push(output_path);

            ctx.emit_progress(openscan3_core::TaskProgress::new(
                (position + 1) as u64,
                total,
                format!("Stacked batch {} of {}.", position + 1, total),
            ));
        }

        Ok(Some(json!({
            "stacked_image_count": output_paths.len(),
            "output_paths": output_paths.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn ctx_with_cancellation(
        cancellation: openscan3_scheduler::cancellation::CancellationHandle,
    ) -> (TaskContext, mpsc::UnboundedReceiver<openscan3_core::TaskProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            TaskContext::new("t".into(), cancellation, openscan3_scheduler::cancellation::PauseGate::new(), tx),
            rx,
        )
    }

    struct FakeSource {
        dir: tempfile::TempDir,
        batch_count: usize,
    }

    #[async_trait::async_trait]
    impl FocusStackSource for FakeSource {
        async fn batches(&self, _project_name: &str, _scan_index: u32) -> anyhow::Result<Vec<Vec<PathBuf>>> {
            Ok((0..self.batch_count)
                .map(|i| vec![self.dir.path().join(format!("photo_{i}_0.jpg")), self.dir.path().join(format!("photo_{i}_1.jpg"))])
                .collect())
        }
        async fn output_directory(&self, _project_name: &str) -> anyhow::Result<PathBuf> {
            Ok(self.dir.path().join("stacked"))
        }
    }

    struct CountingStacker {
        calibrations: AtomicUsize,
        stacks: AtomicUsize,
    }

    impl FocusStacker for CountingStacker {
        fn calibrate(&self, _first_batch: &[PathBuf]) -> anyhow::Result<()> {
            self.calibrations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn stack(&self, batch: &[PathBuf]) -> anyhow::Result<Vec<u8>> {
            self.stacks.fetch_add(1, Ordering::SeqCst);
            Ok(format!("stacked:{}", batch.len()).into_bytes())
        }
    }

    #[tokio::test]
    async fn stacks_every_batch_and_calibrates_once() {
        let source = std::sync::Arc::new(FakeSource {
            dir: tempfile::tempdir().unwrap(),
            batch_count: 3,
        });
        let stacker = std::sync::Arc::new(CountingStacker {
            calibrations: AtomicUsize::new(0),
            stacks: AtomicUsize::new(0),
        });
        let task = FocusStackingTask::new(source.clone(), stacker.clone());

        let (ctx, _rx) = ctx_with_cancellation(openscan3_scheduler::cancellation::CancellationHandle::new());
        let args = serde_json::to_value(serde_json::json!({
            "project_name": "demo",
            "scan_index": 2,
        }))
        .unwrap();

        let result = task.run(ctx, args).await.unwrap().unwrap();
        assert_eq!(result["stacked_image_count"], 3);
        assert_eq!(stacker.calibrations.load(Ordering::SeqCst), 1);
        assert_eq!(stacker.stacks.load(Ordering::SeqCst), 3);

        let first_output = source.dir.path().join("stacked").join("stacked_scan02_000.jpg");
        assert!(first_output.exists());
    }

    #[tokio::test]
    async fn cancellation_mid_batch_returns_no_result() {
        let source = std::sync::Arc::new(FakeSource {
            dir: tempfile::tempdir().unwrap(),
            batch_count: 3,
        });
        let stacker = std::sync::Arc::new(CountingStacker {
            calibrations: AtomicUsize::new(0),
            stacks: AtomicUsize::new(0),
        });
        let task = FocusStackingTask::new(source, stacker);

        let cancellation = openscan3_scheduler::cancellation::CancellationHandle::new();
        cancellation.cancel();
        let (ctx, _rx) = ctx_with_cancellation(cancellation);
        let args = serde_json::to_value(serde_json::json!({
            "project_name": "demo",
            "scan_index": 1,
        }))
        .unwrap();

        let result = task.run(ctx, args).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn resume_missing_only_skips_existing_outputs() {
        let source = std::sync::Arc::new(FakeSource {
            dir: tempfile::tempdir().unwrap(),
            batch_count: 2,
        });
        let stacked_dir = source.dir.path().join("stacked");
        tokio::fs::create_dir_all(&stacked_dir).await.unwrap();
        tokio::fs::write(stacked_dir.join("stacked_scan00_000.jpg"), b"already-there").await.unwrap();

        let stacker = std::sync::Arc::new(CountingStacker {
            calibrations: AtomicUsize::new(0),
            stacks: AtomicUsize::new(0),
        });
        let task = FocusStackingTask::new(source, stacker.clone());

        let (ctx, _rx) = ctx_with_cancellation(openscan3_scheduler::cancellation::CancellationHandle::new());
        let args = serde_json::to_value(serde_json::json!({
            "project_name": "demo",
            "scan_index": 0,
            "resume_missing_only": true,
        }))
        .unwrap();

        let result = task.run(ctx, args).await.unwrap().unwrap();
        assert_eq!(result["stacked_image_count"], 2);
        // Only the missing second batch actually went through the stacker.
        assert_eq!(stacker.stacks.load(Ordering::SeqCst), 1);
    }
}
