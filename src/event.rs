//! Domain events emitted by the orchestration core.
//!
//! The monitors publish structured events over broadcast channels; observers
//! (UI layers, notification sinks) subscribe without the core knowing about
//! presentation. Slow subscribers lag rather than block the pollers.

use std::time::Duration;

use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::state::{TaskInfo, TaskStatus};

/// Capacity of the event channels. Lagging receivers drop oldest events.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle events for monitored tasks.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// A task was registered and its poller started.
    Registered { task_id: String },
    /// The backend reported a different status than the previous cycle.
    StatusChanged {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
    /// Terminal success; carries the final record (already removed from the
    /// store by the time this fires).
    Completed(TaskInfo),
    /// Terminal failure.
    Failed(TaskInfo),
    /// Terminal cancellation.
    Cancelled(TaskInfo),
    /// An automatic retry was scheduled after a failure.
    RetryScheduled {
        task_id: String,
        attempt: u32,
        delay: Duration,
    },
    /// The retry budget is spent; the failure is final.
    RetryExhausted { task_id: String, attempts: u32 },
    /// Monitoring was stopped before a terminal status was observed.
    MonitoringStopped { task_id: String },
}

/// Liveness events from the health monitor.
#[derive(Debug, Clone)]
pub enum HealthEvent {
    BackendDown { consecutive_failures: u32 },
    BackendRecovered,
}

/// Broadcast sender wrapper shared by the emitting component.
#[derive(Debug, Clone)]
pub struct EventBus<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn emit(&self, event: E) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    /// Subscribes as a `Stream` for consumers driving a select loop.
    /// Lagged receivers observe a `BroadcastStreamRecvError` item instead of
    /// the dropped events.
    pub fn stream(&self) -> impl Stream<Item = Result<E, BroadcastStreamRecvError>>
    where
        E: Send + 'static,
    {
        BroadcastStream::new(self.sender.subscribe())
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
