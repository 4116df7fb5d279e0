//! Remote backend boundary.
//!
//! The orchestration core talks to the render backend exclusively through
//! the [`RenderBackend`] trait, so tests can substitute a scripted fake and
//! production code uses the HTTP client in [`http`].

pub mod http;

pub use http::HttpRenderBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::TaskStatus;

/// One status report for a task, as returned by the status endpoint.
///
/// Everything except `status` is optional; absent fields leave the stored
/// record untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<DateTime<Utc>>,
}

impl StatusPayload {
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status,
            command: None,
            output: None,
            error: None,
            start_time: None,
            completed_time: None,
        }
    }
}

/// Response of the command submission endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub task_id: Option<String>,
}

/// Fire-and-forget report for the operator notification endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AdminReport {
    pub issue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AdminReport {
    pub fn new(issue: impl Into<String>) -> Self {
        Self {
            issue: issue.into(),
            details: None,
            user: None,
            project_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// The five backend endpoints the orchestration layer consumes.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Submits a command for execution; returns the assigned task id.
    async fn submit_command(&self, command: &str) -> Result<String>;

    /// Fetches the current status of a task.
    async fn task_status(&self, task_id: &str) -> Result<StatusPayload>;

    /// Requests cancellation of a task.
    async fn cancel_task(&self, task_id: &str) -> Result<()>;

    /// Probes backend liveness. Any `Ok` counts as alive.
    async fn probe_liveness(&self) -> Result<()>;

    /// Delivers an operator notification.
    async fn notify_admin(&self, report: &AdminReport) -> Result<()>;
}
