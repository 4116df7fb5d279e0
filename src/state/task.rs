//! Task state management.
//!
//! Tracks the lifecycle of render commands submitted to the Bookcast backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::remote::StatusPayload;

/// Task status as reported by the backend.
///
/// `queued` and `running` are non-terminal; the other three end monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    #[serde(rename = "error")]
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "error",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of absorbing one status report into a task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Changed { from: TaskStatus, to: TaskStatus },
}

impl Transition {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Transition::Changed { to, .. } if to.is_terminal())
    }
}

/// Task state.
///
/// One record per submitted command. Lives in the task store exactly as long
/// as a poller is registered for it; consumers wanting the terminal record
/// must capture it from the terminal callback.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInfo {
    pub task_id: String,
    pub status: TaskStatus,
    /// Original command text, retained so the task can be retried.
    pub command: String,
    pub output: Option<String>,
    pub error: Option<String>,
    /// Set by the backend, copied as-is. Never synthesized locally.
    pub start_time: Option<DateTime<Utc>>,
    pub completed_time: Option<DateTime<Utc>>,
    /// Incremented only by explicit retry, never by polling.
    pub retry_count: u32,
}

impl TaskInfo {
    pub fn new(task_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Queued,
            command: command.into(),
            output: None,
            error: None,
            start_time: None,
            completed_time: None,
            retry_count: 0,
        }
    }

    /// Applies one backend status report to this record.
    ///
    /// Pure transition function: no timers, no I/O. `retry_count` is
    /// preserved across reports, and the stored command is kept when the
    /// backend omits it.
    pub fn absorb(&mut self, payload: StatusPayload) -> Transition {
        let from = self.status;
        self.status = payload.status;
        if let Some(command) = payload.command {
            self.command = command;
        }
        self.output = payload.output.or(self.output.take());
        self.error = payload.error.or(self.error.take());
        self.start_time = payload.start_time.or(self.start_time);
        self.completed_time = payload.completed_time.or(self.completed_time);

        if from == self.status {
            Transition::Unchanged
        } else {
            Transition::Changed {
                from,
                to: self.status,
            }
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn payload(status: TaskStatus) -> StatusPayload {
        StatusPayload {
            status,
            command: None,
            output: None,
            error: None,
            start_time: None,
            completed_time: None,
        }
    }

    #[rstest]
    #[case(TaskStatus::Queued, false)]
    #[case(TaskStatus::Running, false)]
    #[case(TaskStatus::Completed, true)]
    #[case(TaskStatus::Failed, true)]
    #[case(TaskStatus::Cancelled, true)]
    fn terminality(#[case] status: TaskStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[test]
    fn wire_names_round_trip() {
        for (status, wire) in [
            (TaskStatus::Queued, "\"queued\""),
            (TaskStatus::Running, "\"running\""),
            (TaskStatus::Completed, "\"completed\""),
            (TaskStatus::Failed, "\"error\""),
            (TaskStatus::Cancelled, "\"cancelled\""),
        ] {
            assert_eq!(serde_json::to_string(&status).unwrap(), wire);
            assert_eq!(serde_json::from_str::<TaskStatus>(wire).unwrap(), status);
        }
    }

    #[test]
    fn absorb_reports_status_change_once() {
        let mut info = TaskInfo::new("task-1", "build");
        assert_eq!(
            info.absorb(payload(TaskStatus::Running)),
            Transition::Changed {
                from: TaskStatus::Queued,
                to: TaskStatus::Running,
            }
        );
        assert_eq!(info.absorb(payload(TaskStatus::Running)), Transition::Unchanged);
    }

    #[test]
    fn absorb_preserves_retry_count_and_command() {
        let mut info = TaskInfo::new("task-1", "build");
        info.retry_count = 2;
        let transition = info.absorb(payload(TaskStatus::Completed));
        assert!(transition.is_terminal());
        assert_eq!(info.retry_count, 2);
        assert_eq!(info.command, "build");
    }

    #[test]
    fn absorb_keeps_earlier_output_when_report_omits_it() {
        let mut info = TaskInfo::new("task-1", "build");
        let mut with_output = payload(TaskStatus::Running);
        with_output.output = Some("partial".into());
        info.absorb(with_output);
        info.absorb(payload(TaskStatus::Completed));
        assert_eq!(info.output.as_deref(), Some("partial"));
    }
}
