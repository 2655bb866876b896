//! Fire-and-forget event fan-out (§4.6, C7).
//!
//! Uses `tokio::sync::broadcast` with a best-effort `subscribe`/`send`: a
//! slow or absent subscriber never blocks the scheduler, and a lagged
//! subscriber just misses events rather than stalling the publisher.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use openscan3_task_storage::TaskRecord;

const CHANNEL_CAPACITY: usize = 256;

/// What kind of change produced a `TaskEvent` (§6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    Create,
    Update,
    Delete,
}

/// A task lifecycle event, published on every persisted create, status
/// change, progress update, or delete. Carries the full post-transition
/// record rather than a diff — subscribers are expected to replace their
/// view of the task wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    pub record: TaskRecord,
}

/// A device-state event, published by tasks that move hardware (motors,
/// camera) so other subsystems can observe state without polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub source: String,
    pub payload: serde_json::Value,
    /// Dotted paths into `payload` that changed since the last snapshot
    /// from this source, e.g. `["motors.theta", "camera.is_busy"]`.
    pub changed: Vec<String>,
}

/// Best-effort fan-out for task and device events.
///
/// Cloning shares the underlying channels — every clone publishes to and
/// can subscribe from the same broadcast.
#[derive(Clone)]
pub struct EventPublisher {
    tasks: broadcast::Sender<TaskEvent>,
    device: broadcast::Sender<DeviceEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (tasks, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (device, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tasks, device }
    }

    /// Publish a task event. Dropped silently if there are no subscribers.
    pub fn publish_task(&self, event: TaskEvent) {
        let _ = self.tasks.send(event);
    }

    /// Publish a device event. Dropped silently if there are no subscribers.
    pub fn publish_device(&self, event: DeviceEvent) {
        let _ = self.device.send(event);
    }

    pub fn subscribe_tasks(&self) -> broadcast::Receiver<TaskEvent> {
        self.tasks.subscribe()
    }

    pub fn subscribe_device(&self) -> broadcast::Receiver<DeviceEvent> {
        self.device.subscribe()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openscan3_core::TaskStatus;

    fn record(id: &str, status: TaskStatus) -> TaskRecord {
        let mut record = TaskRecord::new(id.to_string(), "scan_task", false, false, None);
        record.status = status;
        record
    }

    #[tokio::test]
    async fn subscriber_receives_published_task_event() {
        let publisher = EventPublisher::new();
        let mut rx = publisher.subscribe_tasks();

        publisher.publish_task(TaskEvent {
            kind: TaskEventKind::Update,
            record: record("t-1", TaskStatus::Running),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, TaskEventKind::Update);
        assert_eq!(event.record.id, "t-1");
        assert_eq!(event.record.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let publisher = EventPublisher::new();
        publisher.publish_task(TaskEvent {
            kind: TaskEventKind::Delete,
            record: record("t-2", TaskStatus::Completed),
        });
        publisher.publish_device(DeviceEvent {
            source: "motors".into(),
            payload: serde_json::json!({"theta": 90.0, "fi": 90.0}),
            changed: vec!["motors.theta".into(), "motors.fi".into()],
        });
    }

    #[tokio::test]
    async fn device_events_are_independent_of_task_events() {
        let publisher = EventPublisher::new();
        let mut tasks_rx = publisher.subscribe_tasks();
        let mut device_rx = publisher.subscribe_device();

        publisher.publish_device(DeviceEvent {
            source: "camera".into(),
            payload: serde_json::json!({"busy": true}),
            changed: vec!["camera.busy".into()],
        });

        device_rx.recv().await.unwrap();
        assert!(tasks_rx.try_recv().is_err());
    }
}
