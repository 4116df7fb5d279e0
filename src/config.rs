//! Configuration for the monitors and the UI binding.
//!
//! Every knob has a default matching the deployed backend's cadence and can
//! be overridden per instance.

use std::time::Duration;

/// Default interval between status polls for a task.
pub const DEFAULT_TASK_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default deadline for a single status poll.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Default deadline for command submission.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default retry budget for a failed task.
pub const DEFAULT_MAX_TASK_RETRIES: u32 = 3;

/// Default interval between liveness probes.
pub const DEFAULT_HEALTH_PROBE_INTERVAL: Duration = Duration::from_secs(60);

/// Default deadline for a liveness probe.
pub const DEFAULT_HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default failure streak that flips the health flag.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Default interval at which the UI binding refreshes its snapshot.
pub const DEFAULT_BINDING_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Task monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How often each poller queries the status endpoint.
    pub poll_interval: Duration,
    /// Deadline applied to each individual status poll.
    pub status_timeout: Duration,
    /// Deadline applied to submissions made through `retry_task`.
    pub submit_timeout: Duration,
    /// Retry budget enforced by `retry_task`.
    pub max_retries: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_TASK_POLL_INTERVAL,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            max_retries: DEFAULT_MAX_TASK_RETRIES,
        }
    }
}

impl MonitorConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Health monitor configuration.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    /// Consecutive failures required to flip the health flag.
    pub max_consecutive_failures: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_interval: DEFAULT_HEALTH_PROBE_INTERVAL,
            probe_timeout: DEFAULT_HEALTH_PROBE_TIMEOUT,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

impl HealthConfig {
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }
}

/// UI binding configuration.
#[derive(Debug, Clone)]
pub struct BindingConfig {
    /// Local snapshot refresh cadence, independent of network polling.
    pub refresh_interval: Duration,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_BINDING_REFRESH_INTERVAL,
        }
    }
}
