//! Backend liveness monitoring.
//!
//! A single periodic prober drives the process-wide [`HealthState`].
//! Transitions are edge-triggered: going down fires once per outage, and
//! the first successful probe afterwards fires the recovery exactly once.

use std::sync::{Arc, Mutex};

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::HealthConfig;
use crate::event::{EventBus, HealthEvent};
use crate::notify::{AdminReporter, UserNotifier};
use crate::remote::RenderBackend;
use crate::state::{HealthState, HealthTransition};

/// Callback fired with the new health flag on every edge.
pub type HealthStatusCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Callback fired once when the backend goes down.
pub type BackendDownCallback = Arc<dyn Fn() + Send + Sync>;

/// Options for one monitoring run.
#[derive(Clone, Default)]
pub struct HealthOptions {
    pub on_status_change: Option<HealthStatusCallback>,
    pub on_backend_down: Option<BackendDownCallback>,
}

impl std::fmt::Debug for HealthOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthOptions")
            .field("on_status_change", &self.on_status_change.is_some())
            .field("on_backend_down", &self.on_backend_down.is_some())
            .finish()
    }
}

/// Periodic liveness prober with escalation on sustained failure.
#[derive(Clone)]
pub struct HealthMonitor {
    backend: Arc<dyn RenderBackend>,
    config: HealthConfig,
    state: Arc<Mutex<HealthState>>,
    probe: Arc<Mutex<Option<CancellationToken>>>,
    events: EventBus<HealthEvent>,
    notifier: Arc<dyn UserNotifier>,
    reporter: AdminReporter,
}

impl HealthMonitor {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        notifier: Arc<dyn UserNotifier>,
        config: HealthConfig,
    ) -> Self {
        let reporter = AdminReporter::new(Arc::clone(&backend));
        Self {
            backend,
            config,
            state: Arc::new(Mutex::new(HealthState::new())),
            probe: Arc::new(Mutex::new(None)),
            events: EventBus::new(),
            notifier,
            reporter,
        }
    }

    /// Starts the probe timer. Calling again while running is a no-op.
    pub fn start_monitoring(&self, options: HealthOptions) {
        let token = {
            let mut probe = self.probe.lock().expect("probe guard lock poisoned");
            if probe.is_some() {
                debug!("health monitoring already running");
                return;
            }
            let token = CancellationToken::new();
            *probe = Some(token.clone());
            token
        };

        info!(interval = ?self.config.probe_interval, "starting health monitoring");
        let monitor = self.clone();
        tokio::spawn(async move {
            monitor.probe_loop(token, options).await;
        });
    }

    /// Stops the probe timer and resets the state to healthy.
    pub fn stop_monitoring(&self) {
        let token = {
            let mut probe = self.probe.lock().expect("probe guard lock poisoned");
            probe.take()
        };
        if let Some(token) = token {
            token.cancel();
            *self.state.lock().expect("health state lock poisoned") = HealthState::new();
            info!("stopped health monitoring");
        }
    }

    async fn probe_loop(&self, token: CancellationToken, options: HealthOptions) {
        let mut ticker = time::interval(self.config.probe_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick; the first probe runs one interval
        // after start.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.probe_once(&options).await,
            }
        }
    }

    async fn probe_once(&self, options: &HealthOptions) {
        let alive = matches!(
            time::timeout(self.config.probe_timeout, self.backend.probe_liveness()).await,
            Ok(Ok(()))
        );

        let (transition, failures) = {
            let mut state = self.state.lock().expect("health state lock poisoned");
            let transition = if alive {
                state.observe_success()
            } else {
                state.observe_failure(self.config.max_consecutive_failures)
            };
            (transition, state.consecutive_failures)
        };

        match transition {
            HealthTransition::None => {
                if !alive {
                    debug!(consecutive_failures = failures, "liveness probe failed");
                }
            }
            HealthTransition::Recovered => {
                info!("backend recovered");
                if let Some(on_status_change) = &options.on_status_change {
                    on_status_change(true);
                }
                self.events.emit(HealthEvent::BackendRecovered);
                self.notifier.success("Render backend recovered");
            }
            HealthTransition::WentDown => {
                warn!(consecutive_failures = failures, "backend is down");
                if let Some(on_status_change) = &options.on_status_change {
                    on_status_change(false);
                }
                if let Some(on_backend_down) = &options.on_backend_down {
                    on_backend_down();
                }
                self.events.emit(HealthEvent::BackendDown {
                    consecutive_failures: failures,
                });
                self.notifier
                    .error("Render backend is not responding; service degraded");
                self.reporter.report_backend_down(failures);
            }
        }
    }

    /// Cheap liveness signal for any consumer.
    pub fn is_healthy(&self) -> bool {
        self.state
            .lock()
            .expect("health state lock poisoned")
            .is_healthy
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state
            .lock()
            .expect("health state lock poisoned")
            .consecutive_failures
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<HealthEvent> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("config", &self.config)
            .field("is_healthy", &self.is_healthy())
            .finish_non_exhaustive()
    }
}
