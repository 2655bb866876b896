//! Autodiscoverable demo tasks exercising every corner of the task
//! contract: a blocking sleep, a cooperative streaming counter, an
//! exclusive lock-holder, a resumable generator, and a task that always
//! fails. Grounded directly in the original `demo_examples` module, which
//! serves the same purpose there: safe-to-register-at-startup tasks with no
//! hardware side effects, used to exercise the scheduler end-to-end.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use openscan3_core::TaskProgress;
use openscan3_scheduler::task::{Task, TaskContext};

#[derive(Debug, Deserialize)]
struct BlockingArgs {
    #[serde(default = "default_duration_secs")]
    duration_secs: u64,
}

fn default_duration_secs() -> u64 {
    3
}

/// Demonstrates a blocking task: runs on the worker pool, not
/// pause/cancel-cooperative.
pub struct HelloWorldBlockingTask;

impl Task for HelloWorldBlockingTask {
    fn task_name(&self) -> &'static str {
        "hello_world_blocking_task"
    }

    fn is_blocking(&self) -> bool {
        true
    }

    fn run_blocking(&self, args: Value) -> anyhow::Result<Option<Value>> {
        let BlockingArgs { duration_secs } = serde_json::from_value(args)?;
        std::thread::sleep(Duration::from_secs(duration_secs));
        Ok(Some(json!("Blocking task complete.")))
    }
}

#[derive(Debug, Deserialize)]
struct AsyncArgs {
    #[serde(default = "default_total_steps")]
    total_steps: u64,
    #[serde(default = "default_delay_ms")]
    delay_ms: u64,
}

fn default_total_steps() -> u64 {
    5
}

fn default_delay_ms() -> u64 {
    100
}

/// Demonstrates a cooperative, streaming task with pause/cancel checkpoints.
pub struct HelloWorldAsyncTask;

#[async_trait::async_trait]
impl Task for HelloWorldAsyncTask {
    fn task_name(&self) -> &'static str {
        "hello_world_async_task"
    }

    async fn run(&self, ctx: TaskContext, args: Value) -> anyhow::Result<Option<Value>> {
        let AsyncArgs { total_steps, delay_ms } = serde_json::from_value(args)?;

        ctx.emit_progress(TaskProgress::new(0, total_steps, "Starting Hello World Task..."));

        for step in 1..=total_steps {
            ctx.wait_for_pause().await;
            if ctx.is_cancelled() {
                ctx.emit_progress(TaskProgress::new(step - 1, total_steps, "Hello World task cancelled."));
                return Ok(Some(json!("Hello World task cancelled by request.")));
            }

            ctx.emit_progress(TaskProgress::new(step, total_steps, format!("Hello World! Step {step} of {total_steps}")));
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let final_message = format!("Hello World! Completed {total_steps} steps successfully.");
        Ok(Some(json!(final_message)))
    }
}

#[derive(Debug, Deserialize)]
struct ExclusiveArgs {
    #[serde(default = "default_exclusive_duration_secs")]
    duration_secs: f64,
}

fn default_exclusive_duration_secs() -> f64 {
    1.0
}

/// Demonstrates an exclusive task: no other task runs while this is active.
pub struct ExclusiveDemoTask;

#[async_trait::async_trait]
impl Task for ExclusiveDemoTask {
    fn task_name(&self) -> &'static str {
        "exclusive_demo_task"
    }

    fn is_exclusive(&self) -> bool {
        true
    }

    async fn run(&self, ctx: TaskContext, args: Value) -> anyhow::Result<Option<Value>> {
        let ExclusiveArgs { duration_secs } = serde_json::from_value(args)?;

        ctx.emit_progress(TaskProgress::new(0, 1, "Starting exclusive lock"));
        tokio::time::sleep(Duration::from_secs_f64(duration_secs)).await;
        ctx.emit_progress(TaskProgress::new(1, 1, "Finished exclusive lock"));

        Ok(Some(json!({"status": "completed", "duration": duration_secs})))
    }
}

#[derive(Debug, Deserialize)]
struct GeneratorArgs {
    #[serde(default = "default_total_steps")]
    total_steps: u64,
    #[serde(default)]
    start_from_step: u64,
    #[serde(default = "default_interval_ms")]
    interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    500
}

/// Demonstrates a resumable streaming task. Where the original reads its
/// own persisted `progress.current` to decide where to resume, this port
/// takes `start_from_step` explicitly — the push-channel model (§9) has no
/// way for a task to read back what the scheduler already persisted, so the
/// caller (a restart, typically) supplies it instead.
pub struct ExampleGeneratorTask;

#[async_trait::async_trait]
impl Task for ExampleGeneratorTask {
    fn task_name(&self) -> &'static str {
        "generator_task"
    }

    async fn run(&self, ctx: TaskContext, args: Value) -> anyhow::Result<Option<Value>> {
        let GeneratorArgs {
            total_steps,
            start_from_step,
            interval_ms,
        } = serde_json::from_value(args)?;

        if start_from_step >= total_steps {
            ctx.emit_progress(TaskProgress::new(total_steps, total_steps, "Task already completed."));
            return Ok(Some(json!(format!("Generator task completed after {total_steps} steps."))));
        }

        ctx.emit_progress(TaskProgress::new(
            start_from_step,
            total_steps,
            format!("Starting/Resuming from step {start_from_step}."),
        ));

        for step in start_from_step..total_steps {
            ctx.wait_for_pause().await;
            if ctx.is_cancelled() {
                return Ok(None);
            }

            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            ctx.emit_progress(TaskProgress::new(step + 1, total_steps, format!("Step {} of {total_steps} complete.", step + 1)));
        }

        Ok(Some(json!(format!("Generator task completed after {total_steps} steps."))))
    }
}

#[derive(Debug, Deserialize)]
struct FailingArgs {
    #[serde(default = "default_error_message")]
    error_message: String,
}

fn default_error_message() -> String {
    "This task was designed to fail.".to_string()
}

/// Always fails after a brief delay, to exercise error-path handling.
pub struct FailingTask;

#[async_trait::async_trait]
impl Task for FailingTask {
    fn task_name(&self) -> &'static str {
        "failing_task"
    }

    async fn run(&self, _ctx: TaskContext, args: Value) -> anyhow::Result<Option<Value>> {
        let FailingArgs { error_message } = serde_json::from_value(args)?;
        tokio::time::sleep(Duration::from_millis(10)).await;
        Err(anyhow::anyhow!(error_message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn ctx() -> (TaskContext, mpsc::UnboundedReceiver<TaskProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            TaskContext::new(
                "demo".into(),
                openscan3_scheduler::cancellation::CancellationHandle::new(),
                openscan3_scheduler::cancellation::PauseGate::new(),
                tx,
            ),
            rx,
        )
    }

    #[tokio::test]
    async fn hello_world_async_streams_every_step() {
        let (ctx, mut rx) = ctx();
        let args = json!({"total_steps": 3, "delay_ms": 1});
        let result = HelloWorldAsyncTask.run(ctx, args).await.unwrap();
        assert_eq!(result.unwrap(), json!("Hello World! Completed 3 steps successfully."));

        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        assert_eq!(updates.len(), 4); // initial + 3 steps
        assert_eq!(updates.last().unwrap().current, 3);
    }

    #[tokio::test]
    async fn generator_resumes_from_explicit_step() {
        let (ctx, _rx) = ctx();
        let args = json!({"total_steps": 5, "start_from_step": 3, "interval_ms": 1});
        let result = ExampleGeneratorTask.run(ctx, args).await.unwrap();
        assert_eq!(result.unwrap(), json!("Generator task completed after 5 steps."));
    }

    #[tokio::test]
    async fn generator_already_complete_short_circuits() {
        let (ctx, _rx) = ctx();
        let args = json!({"total_steps": 5, "start_from_step": 5});
        let result = ExampleGeneratorTask.run(ctx, args).await.unwrap();
        assert_eq!(result.unwrap(), json!("Generator task completed after 5 steps."));
    }

    #[tokio::test]
    async fn failing_task_propagates_its_message() {
        let (ctx, _rx) = ctx();
        let args = json!({"error_message": "boom"});
        let err = FailingTask.run(ctx, args).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn hello_world_blocking_sleeps_and_completes() {
        let args = json!({"duration_secs": 0});
        let result = HelloWorldBlockingTask.run_blocking(args).unwrap();
        assert_eq!(result.unwrap(), json!("Blocking task complete."));
    }
}
