//! Wiring of the orchestration services.
//!
//! Everything is explicitly constructed and dependency-injected; nothing in
//! this crate is a process-global, so tests build isolated instances per
//! case.

use std::sync::Arc;

use crate::binding::TaskBinding;
use crate::config::{BindingConfig, HealthConfig, MonitorConfig};
use crate::dispatch::{CommandDispatcher, DispatchOptions};
use crate::monitor::{HealthMonitor, TaskMonitor};
use crate::notify::{AdminReporter, LogNotifier, UserNotifier};
use crate::remote::{HttpRenderBackend, RenderBackend};

/// The assembled client: monitors, dispatcher, and escalation, sharing one
/// backend connection and one notifier.
#[derive(Clone)]
pub struct TasksClient {
    backend: Arc<dyn RenderBackend>,
    tasks: TaskMonitor,
    health: HealthMonitor,
    dispatcher: CommandDispatcher,
    reporter: AdminReporter,
    binding_config: BindingConfig,
}

impl TasksClient {
    /// Builds a client over HTTP with default configuration.
    pub fn connect(base_url: impl Into<String>) -> Self {
        Self::builder(Arc::new(HttpRenderBackend::new(base_url))).build()
    }

    pub fn builder(backend: Arc<dyn RenderBackend>) -> TasksClientBuilder {
        TasksClientBuilder {
            backend,
            notifier: Arc::new(LogNotifier),
            monitor_config: MonitorConfig::default(),
            health_config: HealthConfig::default(),
            binding_config: BindingConfig::default(),
        }
    }

    pub fn tasks(&self) -> &TaskMonitor {
        &self.tasks
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn reporter(&self) -> &AdminReporter {
        &self.reporter
    }

    /// Creates a fresh reactive binding for one command slot.
    pub fn binding(&self, options: DispatchOptions) -> TaskBinding {
        TaskBinding::new(
            Arc::clone(&self.backend),
            self.dispatcher.clone(),
            self.binding_config.clone(),
            options,
        )
    }
}

/// Builder injecting alternative configuration or a custom notifier.
pub struct TasksClientBuilder {
    backend: Arc<dyn RenderBackend>,
    notifier: Arc<dyn UserNotifier>,
    monitor_config: MonitorConfig,
    health_config: HealthConfig,
    binding_config: BindingConfig,
}

impl std::fmt::Debug for TasksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TasksClient")
            .field("tasks", &self.tasks)
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

impl TasksClientBuilder {
    pub fn notifier(mut self, notifier: Arc<dyn UserNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn monitor_config(mut self, config: MonitorConfig) -> Self {
        self.monitor_config = config;
        self
    }

    pub fn health_config(mut self, config: HealthConfig) -> Self {
        self.health_config = config;
        self
    }

    pub fn binding_config(mut self, config: BindingConfig) -> Self {
        self.binding_config = config;
        self
    }

    pub fn build(self) -> TasksClient {
        let tasks = TaskMonitor::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.notifier),
            self.monitor_config,
        );
        let health = HealthMonitor::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.notifier),
            self.health_config,
        );
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&self.backend),
            tasks.clone(),
            Arc::clone(&self.notifier),
        );
        let reporter = AdminReporter::new(Arc::clone(&self.backend));
        TasksClient {
            backend: self.backend,
            tasks,
            health,
            dispatcher,
            reporter,
            binding_config: self.binding_config,
        }
    }
}
