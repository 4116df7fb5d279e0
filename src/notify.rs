//! User-facing notifications and operator escalation.
//!
//! Both channels are strictly best-effort: the orchestration core must keep
//! working when nobody is listening and when delivery fails.

use std::sync::Arc;

use tracing::{info, warn};

use crate::remote::{AdminReport, RenderBackend};

/// Sink for transient user-facing notifications (toasts in the host UI).
///
/// Implementations must be cheap and non-blocking; the dispatcher calls
/// these inline between state transitions.
pub trait UserNotifier: Send + Sync {
    fn info(&self, message: &str);
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Default notifier that routes messages to the tracing subscriber.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl UserNotifier for LogNotifier {
    fn info(&self, message: &str) {
        info!(target: "bookcast_tasks::notify", "{message}");
    }

    fn success(&self, message: &str) {
        info!(target: "bookcast_tasks::notify", "{message}");
    }

    fn error(&self, message: &str) {
        warn!(target: "bookcast_tasks::notify", "{message}");
    }
}

/// Fire-and-forget reporter for the operator channel.
///
/// Delivery failures are logged and swallowed; this path never returns an
/// error and never blocks the caller (no escalation of escalation).
#[derive(Clone)]
pub struct AdminReporter {
    backend: Arc<dyn RenderBackend>,
}

impl AdminReporter {
    pub fn new(backend: Arc<dyn RenderBackend>) -> Self {
        Self { backend }
    }

    /// Delivers a report, swallowing any failure.
    pub async fn notify_admin(&self, report: AdminReport) {
        if let Err(error) = self.backend.notify_admin(&report).await {
            warn!(issue = %report.issue, %error, "failed to deliver operator notification");
        }
    }

    /// Spawns a delivery without waiting for it.
    pub fn notify_admin_detached(&self, report: AdminReport) {
        let reporter = self.clone();
        tokio::spawn(async move {
            reporter.notify_admin(report).await;
        });
    }

    pub fn report_backend_down(&self, consecutive_failures: u32) {
        self.notify_admin_detached(
            AdminReport::new("render backend unreachable").with_details(format!(
                "{consecutive_failures} consecutive liveness probes failed"
            )),
        );
    }

    pub fn report_task_failure(&self, task_id: &str, error: Option<&str>) {
        self.notify_admin_detached(
            AdminReport::new("render task failed")
                .with_details(format!(
                    "task {task_id}: {}",
                    error.unwrap_or("no error detail reported")
                )),
        );
    }
}

impl std::fmt::Debug for AdminReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminReporter").finish_non_exhaustive()
    }
}
