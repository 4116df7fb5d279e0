//! Command submission and retry escalation.
//!
//! The dispatcher is the write path: it submits a command, registers the
//! assigned task with the monitor, and wires terminal transitions to user
//! notifications, operator escalation, and the caller's callbacks. With
//! `retry_on_failure` it also drives the bounded exponential-backoff retry
//! chain.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_MAX_TASK_RETRIES;
use crate::error::{Error, Result};
use crate::event::TaskEvent;
use crate::monitor::{MonitorOptions, TaskCallback, TaskMonitor};
use crate::notify::{AdminReporter, UserNotifier};
use crate::remote::RenderBackend;
use crate::state::TaskInfo;

/// Callback invoked synchronously before submission.
pub type StartCallback = Arc<dyn Fn() + Send + Sync>;

/// Per-submission options.
#[derive(Clone)]
pub struct DispatchOptions {
    /// Emit user-facing progress/result notifications.
    pub notify: bool,
    /// Automatically retry when the backend reports task failure.
    pub retry_on_failure: bool,
    /// Retry budget for this command.
    pub max_retries: u32,
    /// Overrides the monitor's poll interval for this task.
    pub poll_interval: Option<Duration>,
    pub on_start: Option<StartCallback>,
    pub on_complete: Option<TaskCallback>,
    pub on_error: Option<TaskCallback>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            notify: true,
            retry_on_failure: false,
            max_retries: DEFAULT_MAX_TASK_RETRIES,
            poll_interval: None,
            on_start: None,
            on_complete: None,
            on_error: None,
        }
    }
}

impl std::fmt::Debug for DispatchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchOptions")
            .field("notify", &self.notify)
            .field("retry_on_failure", &self.retry_on_failure)
            .field("max_retries", &self.max_retries)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

/// Submits commands and supervises their retry lifecycle.
#[derive(Clone)]
pub struct CommandDispatcher {
    backend: Arc<dyn RenderBackend>,
    monitor: TaskMonitor,
    notifier: Arc<dyn UserNotifier>,
    reporter: AdminReporter,
    submit_timeout: Duration,
    /// Pending backoff waits, keyed by the failed task id, so a manual
    /// cancel can pre-empt a scheduled retry.
    backoffs: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl CommandDispatcher {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        monitor: TaskMonitor,
        notifier: Arc<dyn UserNotifier>,
    ) -> Self {
        let reporter = AdminReporter::new(Arc::clone(&backend));
        let submit_timeout = monitor.config().submit_timeout;
        Self {
            backend,
            monitor,
            notifier,
            reporter,
            submit_timeout,
            backoffs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Submits a command and starts monitoring the assigned task.
    ///
    /// Submission failures surface immediately and are never auto-retried;
    /// only post-submission task failures enter the retry cycle.
    pub async fn submit(&self, command: &str, options: DispatchOptions) -> Result<String> {
        if command.trim().is_empty() {
            return Err(Error::EmptyCommand);
        }
        if let Some(on_start) = &options.on_start {
            on_start();
        }
        if options.notify {
            self.notifier.info("Submitting command to the render backend");
        }

        let submitted = match time::timeout(
            self.submit_timeout,
            self.backend.submit_command(command),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.submit_timeout)),
        };

        let task_id = match submitted {
            Ok(task_id) => task_id,
            Err(error) => {
                warn!(%error, "command submission failed");
                if options.notify {
                    self.notifier
                        .error(&format!("Command submission failed: {error}"));
                }
                return Err(error);
            }
        };

        info!(%task_id, "command submitted");
        self.adopt(&task_id, command, 0, options);
        Ok(task_id)
    }

    /// Registers monitoring for a task the backend already assigned,
    /// wiring terminal transitions to notifications and retries. The
    /// record starts at `retry_count` so a retry chain keeps its budget
    /// across task ids.
    pub fn adopt(&self, task_id: &str, command: &str, retry_count: u32, options: DispatchOptions) {
        let monitor_options = MonitorOptions {
            poll_interval: options.poll_interval,
            on_status_change: None,
            on_complete: Some(self.completion_callback(&options)),
            on_error: Some(self.failure_callback(command, &options)),
        };
        self.monitor
            .monitor_task_seeded(task_id, command, retry_count, monitor_options);
    }

    fn completion_callback(&self, options: &DispatchOptions) -> TaskCallback {
        let dispatcher = self.clone();
        let options = options.clone();
        Arc::new(move |info: &TaskInfo| {
            if options.notify {
                dispatcher
                    .notifier
                    .success(&format!("Command completed: {}", info.task_id));
            }
            if let Some(on_complete) = &options.on_complete {
                on_complete(info);
            }
        })
    }

    fn failure_callback(&self, command: &str, options: &DispatchOptions) -> TaskCallback {
        let dispatcher = self.clone();
        let options = options.clone();
        let command = command.to_string();
        Arc::new(move |info: &TaskInfo| {
            if !options.retry_on_failure {
                dispatcher.report_failure(info, &options);
            } else if info.retry_count >= options.max_retries {
                dispatcher.give_up(info, &options);
            } else {
                dispatcher.schedule_retry(info.clone(), command.clone(), options.clone());
            }
        })
    }

    /// Schedules a resubmission after an exponential backoff of
    /// `2^retry_count` seconds. The wait is cancellable through
    /// [`cancel_pending_retry`](Self::cancel_pending_retry).
    fn schedule_retry(&self, info: TaskInfo, command: String, options: DispatchOptions) {
        let delay = Duration::from_secs(1u64 << info.retry_count.min(MAX_BACKOFF_EXPONENT));
        let attempt = info.retry_count + 1;

        let token = CancellationToken::new();
        self.backoffs
            .lock()
            .expect("backoff registry lock poisoned")
            .insert(info.task_id.clone(), token.clone());

        if options.notify {
            self.notifier.info(&format!(
                "Command failed; retrying (attempt {attempt} of {}) in {}s",
                options.max_retries,
                delay.as_secs()
            ));
        }
        self.monitor.events().emit(TaskEvent::RetryScheduled {
            task_id: info.task_id.clone(),
            attempt,
            delay,
        });

        let dispatcher = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(task_id = %info.task_id, "scheduled retry cancelled");
                    return;
                }
                _ = time::sleep(delay) => {}
            }
            dispatcher
                .backoffs
                .lock()
                .expect("backoff registry lock poisoned")
                .remove(&info.task_id);

            match dispatcher.monitor.resubmit(&info, options.max_retries).await {
                Ok(Some(new_task_id)) => {
                    if options.notify {
                        dispatcher
                            .notifier
                            .info(&format!("Retry submitted as task {new_task_id}"));
                    }
                    dispatcher.adopt(&new_task_id, &command, info.retry_count + 1, options);
                }
                Ok(None) => dispatcher.give_up(&info, &options),
                Err(error) => {
                    warn!(task_id = %info.task_id, %error, "retry submission failed");
                    dispatcher.give_up(&info, &options);
                }
            }
        });
    }

    /// Pre-empts a retry scheduled for `task_id` while it is still in its
    /// backoff window. No-op when none is pending.
    pub fn cancel_pending_retry(&self, task_id: &str) {
        let token = self
            .backoffs
            .lock()
            .expect("backoff registry lock poisoned")
            .remove(task_id);
        if let Some(token) = token {
            token.cancel();
        }
    }

    fn report_failure(&self, info: &TaskInfo, options: &DispatchOptions) {
        if options.notify {
            self.notifier.error(&format!(
                "Command failed: {}",
                info.error.as_deref().unwrap_or("no error detail reported")
            ));
        }
        self.reporter
            .report_task_failure(&info.task_id, info.error.as_deref());
        if let Some(on_error) = &options.on_error {
            on_error(info);
        }
    }

    fn give_up(&self, info: &TaskInfo, options: &DispatchOptions) {
        warn!(task_id = %info.task_id, attempts = info.retry_count, "retries exhausted");
        if options.notify {
            self.notifier.error(&format!(
                "Command failed after {} retries",
                info.retry_count
            ));
        }
        self.monitor.events().emit(TaskEvent::RetryExhausted {
            task_id: info.task_id.clone(),
            attempts: info.retry_count,
        });
        self.reporter
            .report_task_failure(&info.task_id, info.error.as_deref());
        if let Some(on_error) = &options.on_error {
            on_error(info);
        }
    }

    pub fn monitor(&self) -> &TaskMonitor {
        &self.monitor
    }
}

/// Caps the backoff shift; the retry budget runs out long before this.
const MAX_BACKOFF_EXPONENT: u32 = 10;

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("submit_timeout", &self.submit_timeout)
            .finish_non_exhaustive()
    }
}
