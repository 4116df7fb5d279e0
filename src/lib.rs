//! Client-side orchestration of long-running render commands for the
//! Bookcast pipeline.
//!
//! The backend executes commands (narration synthesis, video rendering)
//! asynchronously and offers no push channel, only a status endpoint. This
//! crate supplies the machinery a client needs on top of that:
//!
//! - [`TaskMonitor`]: one poller per task, duplicate-free, with terminal
//!   callbacks that fire exactly once
//! - [`CommandDispatcher`]: submission plus bounded exponential-backoff
//!   retries of failed tasks
//! - [`HealthMonitor`]: periodic liveness probing with edge-triggered
//!   operator escalation
//! - [`TaskBinding`]: a watch-channel adapter presentation code subscribes
//!   to
//!
//! [`TasksClient`] wires the services together over one HTTP connection.

pub mod binding;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod monitor;
pub mod notify;
pub mod remote;
pub mod state;

pub use binding::{TaskBinding, TaskSnapshot};
pub use client::{TasksClient, TasksClientBuilder};
pub use config::{BindingConfig, HealthConfig, MonitorConfig};
pub use dispatch::{CommandDispatcher, DispatchOptions};
pub use error::{Error, Result};
pub use event::{HealthEvent, TaskEvent};
pub use monitor::{HealthMonitor, HealthOptions, MonitorOptions, TaskMonitor};
pub use notify::{AdminReporter, LogNotifier, UserNotifier};
pub use remote::{AdminReport, HttpRenderBackend, RenderBackend, StatusPayload};
pub use state::{HealthState, TaskInfo, TaskStatus};
