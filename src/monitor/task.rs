//! Task monitoring.
//!
//! One poller per registered task id, querying the status endpoint on a
//! fixed interval and updating the shared task store. The backend is the
//! sole source of truth for task status: transport failures while polling
//! are logged and skipped, never treated as task failures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::Stream;
use tokio::time::{self, MissedTickBehavior};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::event::{EventBus, TaskEvent};
use crate::notify::UserNotifier;
use crate::remote::RenderBackend;
use crate::state::{TaskInfo, TaskStatus, TaskStore, Transition};

/// Callback invoked with a task record at a lifecycle point.
pub type TaskCallback = Arc<dyn Fn(&TaskInfo) + Send + Sync>;

/// Per-task monitoring options.
#[derive(Clone, Default)]
pub struct MonitorOptions {
    /// Overrides the monitor's configured poll interval for this task.
    pub poll_interval: Option<std::time::Duration>,
    /// Fires once per poll cycle in which the reported status differs from
    /// the stored one.
    pub on_status_change: Option<TaskCallback>,
    /// Fires exactly once, after teardown, when the task completes.
    pub on_complete: Option<TaskCallback>,
    /// Fires exactly once, after teardown, when the backend reports failure.
    pub on_error: Option<TaskCallback>,
}

impl std::fmt::Debug for MonitorOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorOptions")
            .field("poll_interval", &self.poll_interval)
            .field("on_status_change", &self.on_status_change.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Task monitor: registry of pollers plus the task store they feed.
///
/// Cloning shares the underlying registry; instances are independent only
/// when constructed separately.
#[derive(Clone)]
pub struct TaskMonitor {
    backend: Arc<dyn RenderBackend>,
    config: MonitorConfig,
    store: TaskStore,
    notifier: Arc<dyn UserNotifier>,
    pollers: Arc<Mutex<HashMap<String, CancellationToken>>>,
    events: EventBus<TaskEvent>,
}

impl TaskMonitor {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        notifier: Arc<dyn UserNotifier>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            backend,
            config,
            store: TaskStore::new(),
            notifier,
            pollers: Arc::new(Mutex::new(HashMap::new())),
            events: EventBus::new(),
        }
    }

    /// Starts monitoring a task.
    ///
    /// Idempotent: a task id that is already registered keeps its existing
    /// poller and this call does nothing, so at most one poller exists per
    /// id at any time.
    pub fn monitor_task(&self, task_id: &str, command: &str, options: MonitorOptions) {
        self.monitor_task_seeded(task_id, command, 0, options);
    }

    /// Registers a task whose record starts at a given retry count. Used by
    /// the dispatcher when re-arming monitoring on a resubmitted task.
    pub(crate) fn monitor_task_seeded(
        &self,
        task_id: &str,
        command: &str,
        retry_count: u32,
        options: MonitorOptions,
    ) {
        let token = {
            let mut pollers = self.pollers.lock().expect("poller registry lock poisoned");
            if pollers.contains_key(task_id) {
                debug!(%task_id, "task already monitored; ignoring duplicate registration");
                return;
            }
            let token = CancellationToken::new();
            pollers.insert(task_id.to_string(), token.clone());
            token
        };

        let mut info = TaskInfo::new(task_id, command);
        info.retry_count = retry_count;
        self.store.insert(info);

        info!(%task_id, "monitoring task");
        self.events.emit(TaskEvent::Registered {
            task_id: task_id.to_string(),
        });

        let monitor = self.clone();
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            monitor.poll_loop(task_id, token, options).await;
        });
    }

    async fn poll_loop(&self, task_id: String, token: CancellationToken, options: MonitorOptions) {
        let poll_interval = options.poll_interval.unwrap_or(self.config.poll_interval);
        let mut ticker = time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval resolves immediately; consume
        // it so the first status request happens one interval after
        // registration.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if self.poll_once(&task_id, &token, &options).await {
                        break;
                    }
                }
            }
        }
    }

    /// Runs one poll cycle. Returns true when monitoring is finished.
    async fn poll_once(
        &self,
        task_id: &str,
        token: &CancellationToken,
        options: &MonitorOptions,
    ) -> bool {
        let payload = match time::timeout(
            self.config.status_timeout,
            self.backend.task_status(task_id),
        )
        .await
        {
            Ok(Ok(payload)) => payload,
            Ok(Err(error)) => {
                debug!(%task_id, %error, "status poll failed; skipping cycle");
                return false;
            }
            Err(_) => {
                debug!(%task_id, timeout = ?self.config.status_timeout, "status poll timed out; skipping cycle");
                return false;
            }
        };

        // A response that resolves after teardown is discarded.
        if token.is_cancelled() || !self.is_registered(task_id) {
            return true;
        }

        let Some((info, transition)) = self.store.update(task_id, |info| {
            let transition = info.absorb(payload);
            (info.clone(), transition)
        }) else {
            return true;
        };

        let Transition::Changed { from, to } = transition else {
            return false;
        };

        if let Some(on_status_change) = &options.on_status_change {
            on_status_change(&info);
        }
        self.events.emit(TaskEvent::StatusChanged {
            task_id: task_id.to_string(),
            from,
            to,
        });

        if !to.is_terminal() {
            return false;
        }

        // Teardown before the terminal callback: the registration and the
        // store record are gone by the time consumers observe the terminal
        // state, so no further poll can fire for this id.
        self.remove_registration(task_id);
        self.store.remove(task_id);

        info!(%task_id, status = %to, "task reached terminal status");
        match to {
            TaskStatus::Completed => {
                if let Some(on_complete) = &options.on_complete {
                    on_complete(&info);
                }
                self.events.emit(TaskEvent::Completed(info));
            }
            TaskStatus::Failed => {
                if let Some(on_error) = &options.on_error {
                    on_error(&info);
                }
                self.events.emit(TaskEvent::Failed(info));
            }
            TaskStatus::Cancelled => {
                self.events.emit(TaskEvent::Cancelled(info));
            }
            _ => unreachable!("non-terminal status after terminal check"),
        }
        true
    }

    /// Stops monitoring a task. Idempotent; unknown ids are a no-op.
    pub fn stop_monitoring(&self, task_id: &str) {
        let token = {
            let mut pollers = self.pollers.lock().expect("poller registry lock poisoned");
            pollers.remove(task_id)
        };
        match token {
            Some(token) => {
                token.cancel();
                self.store.remove(task_id);
                info!(%task_id, "stopped monitoring task");
                self.events.emit(TaskEvent::MonitoringStopped {
                    task_id: task_id.to_string(),
                });
            }
            None => debug!(%task_id, "stop requested for task with no active poller"),
        }
    }

    /// Synchronous snapshot of one task.
    pub fn get_task_info(&self, task_id: &str) -> Option<TaskInfo> {
        self.store.get(task_id)
    }

    /// Synchronous snapshot of every monitored task.
    pub fn all_tasks(&self) -> Vec<TaskInfo> {
        self.store.all()
    }

    /// Retries a task that is still in the store.
    ///
    /// Returns `Ok(None)`, with a user notification and without any network
    /// call, when the id is unknown or its retry budget is spent.
    /// Otherwise increments `retry_count` on the existing record, resubmits
    /// the command, and returns the newly assigned task id. The new id is
    /// not monitored; callers re-register it themselves.
    pub async fn retry_task(&self, task_id: &str, command: &str) -> Result<Option<String>> {
        let max_retries = self.config.max_retries;
        let eligible = self.store.update(task_id, |info| {
            if info.retry_count >= max_retries {
                None
            } else {
                info.retry_count += 1;
                Some(info.retry_count)
            }
        });

        let attempt = match eligible {
            None => {
                self.notifier
                    .error(&format!("Cannot retry unknown task {task_id}"));
                return Ok(None);
            }
            Some(None) => {
                self.notifier
                    .error(&format!("Task {task_id} has exhausted its retries"));
                return Ok(None);
            }
            Some(Some(attempt)) => attempt,
        };

        let new_task_id = self.submit(command).await?;
        info!(%task_id, %new_task_id, attempt, "task resubmitted");
        Ok(Some(new_task_id))
    }

    /// Retries from a terminal record captured by a lifecycle callback.
    ///
    /// Store records are dropped at teardown, so the automatic retry path
    /// (and a UI-driven retry of a finished task) carries the last known
    /// record instead of a store id. Same budget rule as [`retry_task`]:
    /// `Ok(None)` and no network call once `retry_count` reaches
    /// `max_retries`.
    pub async fn resubmit(
        &self,
        info: &TaskInfo,
        max_retries: u32,
    ) -> Result<Option<String>> {
        if info.retry_count >= max_retries {
            self.notifier.error(&format!(
                "Task {} has exhausted its retries",
                info.task_id
            ));
            return Ok(None);
        }
        let new_task_id = self.submit(&info.command).await?;
        info!(
            previous = %info.task_id,
            %new_task_id,
            attempt = info.retry_count + 1,
            "task resubmitted"
        );
        Ok(Some(new_task_id))
    }

    async fn submit(&self, command: &str) -> Result<String> {
        match time::timeout(self.config.submit_timeout, self.backend.submit_command(command))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.config.submit_timeout, "command submission timed out");
                Err(Error::Timeout(self.config.submit_timeout))
            }
        }
    }

    fn is_registered(&self, task_id: &str) -> bool {
        self.pollers
            .lock()
            .expect("poller registry lock poisoned")
            .contains_key(task_id)
    }

    fn remove_registration(&self, task_id: &str) {
        self.pollers
            .lock()
            .expect("poller registry lock poisoned")
            .remove(task_id);
    }

    /// Number of active pollers.
    pub fn active_pollers(&self) -> usize {
        self.pollers
            .lock()
            .expect("poller registry lock poisoned")
            .len()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Subscribes to the task event firehose.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    /// Subscribes as a `Stream`.
    pub fn event_stream(
        &self,
    ) -> impl Stream<Item = std::result::Result<TaskEvent, BroadcastStreamRecvError>> {
        self.events.stream()
    }

    pub(crate) fn events(&self) -> &EventBus<TaskEvent> {
        &self.events
    }
}

impl std::fmt::Debug for TaskMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskMonitor")
            .field("config", &self.config)
            .field("active_pollers", &self.active_pollers())
            .finish_non_exhaustive()
    }
}
