//! Attaches a health check manager to an axum service

use axum::{routing::get, Router};
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::error::Result;
use crate::handlers::health::handle_health;
use crate::health::{
    CheckFunction, CheckRunner, ComponentHealth, HealthCheckManager, ManagerConfig, ServiceInfo,
    SystemHealth,
};

pub const DEFAULT_HEALTH_ENDPOINT: &str = "/health";

/// Runs continuous background checks and serves their aggregate on an HTTP
/// endpoint.
///
/// The host calls `start()` once its runtime is up and `shutdown()` after it
/// stops serving requests; `router()` is merged into the host's router.
#[derive(Clone)]
pub struct HealthMonitor {
    manager: HealthCheckManager,
    health_endpoint: String,
}

impl HealthMonitor {
    pub fn new(service: ServiceInfo, config: ManagerConfig) -> Self {
        Self {
            manager: HealthCheckManager::new(service, config),
            health_endpoint: DEFAULT_HEALTH_ENDPOINT.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.service.service_info(), config.monitor.manager_config())
            .with_endpoint(config.monitor.health_endpoint.clone())
    }

    pub fn with_endpoint(mut self, health_endpoint: impl Into<String>) -> Self {
        self.health_endpoint = health_endpoint.into();
        self
    }

    pub fn manager(&self) -> &HealthCheckManager {
        &self.manager
    }

    pub fn health_endpoint(&self) -> &str {
        &self.health_endpoint
    }

    /// Registers a component and the function that checks it.
    ///
    /// The component starts out `unknown` and is first checked on the next
    /// poll cycle. The configured per-check timeout applies.
    pub fn add_component<C>(&self, component: ComponentHealth, check_fn: C) -> Arc<CheckRunner>
    where
        C: CheckFunction + 'static,
    {
        let key = component.key();
        let runner = Arc::new(
            CheckRunner::new(component, check_fn).with_timeout(self.manager.config().check_timeout),
        );
        self.manager.add_check_runner(runner.clone());
        info!("added check runner: {}", key);
        runner
    }

    pub fn start(&self) -> Result<()> {
        info!("service starting");
        self.manager.start()
    }

    pub async fn shutdown(&self) {
        info!("service shutting down");
        self.manager.shutdown().await;
    }

    pub fn get_response(&self) -> SystemHealth {
        self.manager.get_response()
    }

    /// Routes for the health endpoint, with and without a trailing slash.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let endpoint = self.health_endpoint.trim_end_matches('/');
        let router = if endpoint.is_empty() {
            Router::new().route("/", get(handle_health))
        } else {
            Router::new()
                .route(endpoint, get(handle_health))
                .route(&format!("{}/", endpoint), get(handle_health))
        };

        router.with_state(self.manager.clone())
    }
}
