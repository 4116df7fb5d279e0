//! Shared test doubles: a scripted backend and a recording notifier.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use bookcast_tasks::{
    AdminReport, Error, RenderBackend, Result, StatusPayload, TaskStatus, UserNotifier,
};

/// One scripted answer of the status endpoint.
#[derive(Clone)]
pub enum ScriptedPoll {
    Status(StatusPayload),
    TransportError,
}

/// Scripted in-memory backend.
///
/// Status scripts are consumed one entry per poll; the last entry is sticky
/// so a finished script keeps answering with its final payload.
#[derive(Default)]
pub struct FakeBackend {
    assigned_ids: Mutex<VecDeque<String>>,
    submitted: Mutex<Vec<String>>,
    submit_failures: Mutex<u32>,
    hang_submissions: AtomicBool,
    scripts: Mutex<HashMap<String, VecDeque<ScriptedPoll>>>,
    status_calls: Mutex<HashMap<String, usize>>,
    liveness: Mutex<VecDeque<bool>>,
    liveness_default: AtomicBool,
    probe_calls: AtomicUsize,
    cancel_ok: AtomicBool,
    cancelled: Mutex<Vec<String>>,
    admin_ok: AtomicBool,
    admin_reports: Mutex<Vec<AdminReport>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        let backend = Self::default();
        backend.liveness_default.store(true, Ordering::SeqCst);
        backend.cancel_ok.store(true, Ordering::SeqCst);
        backend.admin_ok.store(true, Ordering::SeqCst);
        Arc::new(backend)
    }

    pub fn assign_ids(&self, ids: &[&str]) {
        let mut assigned = self.assigned_ids.lock().unwrap();
        assigned.extend(ids.iter().map(|id| id.to_string()));
    }

    pub fn script_task(&self, task_id: &str, polls: Vec<ScriptedPoll>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(task_id.to_string(), polls.into());
    }

    pub fn script_statuses(&self, task_id: &str, statuses: &[TaskStatus]) {
        self.script_task(
            task_id,
            statuses
                .iter()
                .map(|status| ScriptedPoll::Status(payload(*status)))
                .collect(),
        );
    }

    pub fn set_liveness_sequence(&self, sequence: &[bool]) {
        let mut liveness = self.liveness.lock().unwrap();
        liveness.extend(sequence.iter().copied());
    }

    pub fn fail_next_submissions(&self, count: u32) {
        *self.submit_failures.lock().unwrap() = count;
    }

    pub fn hang_submissions(&self) {
        self.hang_submissions.store(true, Ordering::SeqCst);
    }

    pub fn refuse_cancellation(&self) {
        self.cancel_ok.store(false, Ordering::SeqCst);
    }

    pub fn drop_admin_notifications(&self) {
        self.admin_ok.store(false, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn status_calls(&self, task_id: &str) -> usize {
        self.status_calls
            .lock()
            .unwrap()
            .get(task_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn admin_reports(&self) -> Vec<AdminReport> {
        self.admin_reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderBackend for FakeBackend {
    async fn submit_command(&self, command: &str) -> Result<String> {
        if self.hang_submissions.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        {
            let mut failures = self.submit_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::Backend {
                    status: 500,
                    message: "submission rejected".into(),
                });
            }
        }
        let count = {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(command.to_string());
            submitted.len()
        };
        let assigned = self.assigned_ids.lock().unwrap().pop_front();
        Ok(assigned.unwrap_or_else(|| format!("task-{count}")))
    }

    async fn task_status(&self, task_id: &str) -> Result<StatusPayload> {
        *self
            .status_calls
            .lock()
            .unwrap()
            .entry(task_id.to_string())
            .or_insert(0) += 1;

        let mut scripts = self.scripts.lock().unwrap();
        let Some(queue) = scripts.get_mut(task_id) else {
            return Err(Error::Backend {
                status: 404,
                message: "unknown task".into(),
            });
        };
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match next {
            Some(ScriptedPoll::Status(payload)) => Ok(payload),
            Some(ScriptedPoll::TransportError) | None => Err(Error::Backend {
                status: 503,
                message: "status endpoint unavailable".into(),
            }),
        }
    }

    async fn cancel_task(&self, task_id: &str) -> Result<()> {
        self.cancelled.lock().unwrap().push(task_id.to_string());
        if self.cancel_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Backend {
                status: 409,
                message: "cancellation refused".into(),
            })
        }
    }

    async fn probe_liveness(&self) -> Result<()> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.liveness.lock().unwrap().pop_front();
        let alive = scripted.unwrap_or_else(|| self.liveness_default.load(Ordering::SeqCst));
        if alive {
            Ok(())
        } else {
            Err(Error::Backend {
                status: 503,
                message: "backend down".into(),
            })
        }
    }

    async fn notify_admin(&self, report: &AdminReport) -> Result<()> {
        if self.admin_ok.load(Ordering::SeqCst) {
            self.admin_reports.lock().unwrap().push(report.clone());
            Ok(())
        } else {
            Err(Error::Backend {
                status: 500,
                message: "notification endpoint down".into(),
            })
        }
    }
}

/// Notifier that records every message for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn contains(&self, level: &str, needle: &str) -> bool {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .any(|(l, m)| l == level && m.contains(needle))
    }
}

impl UserNotifier for RecordingNotifier {
    fn info(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(("info".into(), message.into()));
    }

    fn success(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(("success".into(), message.into()));
    }

    fn error(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(("error".into(), message.into()));
    }
}

pub fn payload(status: TaskStatus) -> StatusPayload {
    StatusPayload::with_status(status)
}

pub fn payload_with_output(status: TaskStatus, output: &str) -> StatusPayload {
    let mut payload = StatusPayload::with_status(status);
    payload.output = Some(output.to_string());
    payload
}

pub fn payload_with_error(status: TaskStatus, error: &str) -> StatusPayload {
    let mut payload = StatusPayload::with_status(status);
    payload.error = Some(error.to_string());
    payload
}
