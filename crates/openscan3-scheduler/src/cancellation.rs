//! Cooperative cancellation and pause primitives for in-process task execution.
//!
//! Both wrap `tokio::sync::watch` channels — runtime-specific primitives
//! that don't belong in `openscan3-task-storage`'s backend-agnostic model.

use tokio::sync::watch;

/// A cooperative cancellation handle.
///
/// Clone-friendly — both the task executor and the running task hold copies.
/// Cancellation is two-phase (§5): this flag is polled by the task at its
/// own checkpoints, and the scheduler separately aborts the execution handle.
#[derive(Clone)]
pub struct CancellationHandle {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// The pause gate a cooperative task awaits at every checkpoint (§3.4, §4.1).
///
/// Open by default. `pause()` closes it; `resume()` reopens it.
/// `wait_for_pause()` is a no-op when the gate is open and suspends the
/// calling task otherwise.
#[derive(Clone)]
pub struct PauseGate {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl PauseGate {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(true);
        Self { tx, rx }
    }

    /// Close the gate — the next `wait_for_pause()` call will suspend.
    pub fn pause(&self) {
        let _ = self.tx.send(false);
    }

    /// Open the gate, waking any suspended waiter.
    pub fn resume(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_open(&self) -> bool {
        *self.rx.borrow()
    }

    /// Suspend until the gate is open. Returns immediately if already open.
    pub async fn wait_for_pause(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        loop {
            if rx.changed().await.is_err() {
                return;
            }
            if *rx.borrow() {
                return;
            }
        }
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}
