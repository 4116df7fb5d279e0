//! Monitoring components for task lifecycle and backend liveness.
//!
//! These components own every timer in the crate:
//!
//! - One poller per registered task, querying the status endpoint
//! - A single liveness prober flipping the process-wide health flag
//!
//! Both are started and stopped explicitly and publish structured events;
//! nothing here knows about presentation.

pub mod health;
pub mod task;

pub use health::{BackendDownCallback, HealthMonitor, HealthOptions, HealthStatusCallback};
pub use task::{MonitorOptions, TaskCallback, TaskMonitor};
