//! Reactive adapter for presentation code.
//!
//! `TaskBinding` mirrors the task store into a `watch` channel on its own
//! refresh cadence, deliberately decoupled from the network polling
//! interval, and exposes the execute/retry/cancel/reset actions a view
//! layer needs. The terminal record is captured through the monitor
//! callbacks because the store drops it the moment the poller stops.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::BindingConfig;
use crate::dispatch::{CommandDispatcher, DispatchOptions};
use crate::error::Result;
use crate::remote::RenderBackend;
use crate::state::{TaskInfo, TaskStatus};

/// Snapshot of the bound task, refreshed on the binding's interval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSnapshot {
    pub task_id: Option<String>,
    pub task_info: Option<TaskInfo>,
    pub status: Option<TaskStatus>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl TaskSnapshot {
    fn from_info(info: TaskInfo) -> Self {
        Self {
            task_id: Some(info.task_id.clone()),
            status: Some(info.status),
            is_loading: info.is_active(),
            error: info.error.clone(),
            task_info: Some(info),
        }
    }
}

/// One command's worth of reactive state plus its actions.
pub struct TaskBinding {
    backend: Arc<dyn RenderBackend>,
    dispatcher: CommandDispatcher,
    config: BindingConfig,
    options: DispatchOptions,
    state: Arc<watch::Sender<TaskSnapshot>>,
    sync: Arc<Mutex<Option<CancellationToken>>>,
    /// Last terminal record, captured by the monitor callbacks.
    terminal: Arc<Mutex<Option<TaskInfo>>>,
}

impl TaskBinding {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        dispatcher: CommandDispatcher,
        config: BindingConfig,
        options: DispatchOptions,
    ) -> Self {
        let (state, _) = watch::channel(TaskSnapshot::default());
        Self {
            backend,
            dispatcher,
            config,
            options,
            state: Arc::new(state),
            sync: Arc::new(Mutex::new(None)),
            terminal: Arc::new(Mutex::new(None)),
        }
    }

    /// Submits a command and starts mirroring its state.
    pub async fn execute(&self, command: &str) -> Result<String> {
        self.stop_sync();
        *self.terminal.lock().expect("terminal record lock poisoned") = None;
        self.state.send_replace(TaskSnapshot {
            is_loading: true,
            ..TaskSnapshot::default()
        });

        match self.dispatcher.submit(command, self.wrapped_options()).await {
            Ok(task_id) => {
                self.state.send_replace(TaskSnapshot {
                    task_id: Some(task_id.clone()),
                    is_loading: true,
                    ..TaskSnapshot::default()
                });
                self.start_sync(task_id.clone());
                Ok(task_id)
            }
            Err(error) => {
                self.state.send_replace(TaskSnapshot {
                    error: Some(error.to_string()),
                    ..TaskSnapshot::default()
                });
                Err(error)
            }
        }
    }

    /// Retries the bound command from its last known record.
    ///
    /// Returns `Ok(None)` when there is nothing to retry or the retry
    /// budget is spent.
    pub async fn retry(&self) -> Result<Option<String>> {
        let captured = {
            let terminal = self.terminal.lock().expect("terminal record lock poisoned");
            terminal
                .clone()
                .or_else(|| self.state.borrow().task_info.clone())
        };
        let Some(info) = captured else {
            debug!("retry requested with no task bound");
            return Ok(None);
        };

        let monitor = self.dispatcher.monitor().clone();
        match monitor.resubmit(&info, self.options.max_retries).await? {
            None => Ok(None),
            Some(new_task_id) => {
                *self.terminal.lock().expect("terminal record lock poisoned") = None;
                self.dispatcher.adopt(
                    &new_task_id,
                    &info.command,
                    info.retry_count + 1,
                    self.wrapped_options(),
                );
                self.state.send_replace(TaskSnapshot {
                    task_id: Some(new_task_id.clone()),
                    is_loading: true,
                    ..TaskSnapshot::default()
                });
                self.start_sync(new_task_id.clone());
                Ok(Some(new_task_id))
            }
        }
    }

    /// Cancels the bound task on the backend.
    ///
    /// On success the local status flips to `cancelled` immediately, without
    /// waiting for the next poll cycle; a retry sitting in its backoff
    /// window is pre-empted either way.
    pub async fn cancel(&self) -> Result<bool> {
        let Some(task_id) = self.state.borrow().task_id.clone() else {
            return Ok(false);
        };
        self.dispatcher.cancel_pending_retry(&task_id);

        match self.backend.cancel_task(&task_id).await {
            Ok(()) => {
                self.dispatcher.monitor().stop_monitoring(&task_id);
                self.stop_sync();
                self.state.send_modify(|snapshot| {
                    snapshot.status = Some(TaskStatus::Cancelled);
                    snapshot.is_loading = false;
                    if let Some(info) = &mut snapshot.task_info {
                        info.status = TaskStatus::Cancelled;
                    }
                });
                Ok(true)
            }
            Err(error) => {
                warn!(%task_id, %error, "cancellation request failed");
                Err(error)
            }
        }
    }

    /// Clears the binding back to its idle state.
    pub fn reset(&self) {
        self.stop_sync();
        *self.terminal.lock().expect("terminal record lock poisoned") = None;
        self.state.send_replace(TaskSnapshot::default());
    }

    /// Subscribes to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        self.state.borrow().clone()
    }

    pub fn task_id(&self) -> Option<String> {
        self.state.borrow().task_id.clone()
    }

    pub fn status(&self) -> Option<TaskStatus> {
        self.state.borrow().status
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Caller options wrapped so the binding sees terminal records before
    /// the caller's callbacks run.
    fn wrapped_options(&self) -> DispatchOptions {
        let mut options = self.options.clone();

        let state = Arc::clone(&self.state);
        let terminal = Arc::clone(&self.terminal);
        let sync = Arc::clone(&self.sync);
        let user_on_complete = options.on_complete.clone();
        options.on_complete = Some(Arc::new(move |info: &TaskInfo| {
            *terminal.lock().expect("terminal record lock poisoned") = Some(info.clone());
            state.send_replace(TaskSnapshot::from_info(info.clone()));
            if let Some(token) = sync.lock().expect("sync guard lock poisoned").take() {
                token.cancel();
            }
            if let Some(callback) = &user_on_complete {
                callback(info);
            }
        }));

        let state = Arc::clone(&self.state);
        let terminal = Arc::clone(&self.terminal);
        let sync = Arc::clone(&self.sync);
        let user_on_error = options.on_error.clone();
        options.on_error = Some(Arc::new(move |info: &TaskInfo| {
            *terminal.lock().expect("terminal record lock poisoned") = Some(info.clone());
            state.send_replace(TaskSnapshot::from_info(info.clone()));
            if let Some(token) = sync.lock().expect("sync guard lock poisoned").take() {
                token.cancel();
            }
            if let Some(callback) = &user_on_error {
                callback(info);
            }
        }));

        options
    }

    /// Starts the local refresh loop mirroring the store into the snapshot.
    fn start_sync(&self, task_id: String) {
        self.stop_sync();
        let token = CancellationToken::new();
        *self.sync.lock().expect("sync guard lock poisoned") = Some(token.clone());

        let monitor = self.dispatcher.monitor().clone();
        let state = Arc::clone(&self.state);
        let refresh_interval = self.config.refresh_interval;
        tokio::spawn(async move {
            let mut ticker = time::interval(refresh_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        match monitor.get_task_info(&task_id) {
                            Some(info) => {
                                state.send_replace(TaskSnapshot::from_info(info));
                            }
                            // Record gone: either a terminal callback already
                            // wrote the final snapshot, or monitoring was
                            // stopped externally.
                            None => break,
                        }
                    }
                }
            }
        });
    }

    fn stop_sync(&self) {
        if let Some(token) = self.sync.lock().expect("sync guard lock poisoned").take() {
            token.cancel();
        }
    }
}

impl Drop for TaskBinding {
    fn drop(&mut self) {
        self.stop_sync();
    }
}

impl std::fmt::Debug for TaskBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskBinding")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}
