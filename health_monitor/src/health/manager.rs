//! Background polling loop that aggregates component checks into one snapshot

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::error::{panic_message, HealthError, Result};
use crate::health::models::{
    aggregate_status, ComponentHealth, ComponentType, HealthStatus, SystemHealth,
};
use crate::health::runner::CheckRunner;

pub const DEFAULT_CHECK_DELAY: Duration = Duration::from_secs(10);
pub const UPTIME_CHECK_KEY: &str = "uptime";

/// Identity of the service reported in every snapshot.
#[derive(Debug, Clone, Default)]
pub struct ServiceInfo {
    pub service_id: String,
    pub version: String,
    pub release_id: String,
    pub description: Option<String>,
    pub notes: Vec<String>,
}

impl ServiceInfo {
    pub fn new(
        service_id: impl Into<String>,
        version: impl Into<String>,
        release_id: impl Into<String>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            version: version.into(),
            release_id: release_id.into(),
            description: None,
            notes: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes = notes;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub check_delay: Duration,
    /// Applied to runners registered through `HealthMonitor::add_component`.
    pub check_timeout: Option<Duration>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            check_delay: DEFAULT_CHECK_DELAY,
            check_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Startup {
    timestamp: DateTime<Utc>,
    instant: Instant,
}

/// Everything a reader needs, published as one unit.
#[derive(Debug, Default)]
struct PublishedState {
    status: HealthStatus,
    startup: Option<Startup>,
    last_checked: Option<DateTime<Utc>>,
    checks: Arc<HashMap<String, ComponentHealth>>,
}

struct ManagerInner {
    service: ServiceInfo,
    config: ManagerConfig,
    state: RwLock<PublishedState>,
    runners: RwLock<Vec<Arc<CheckRunner>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Owns the registered check runners, drives the polling loop and serves the
/// latest `SystemHealth` snapshot.
///
/// Cloning is cheap; all clones share the same registry and snapshot.
#[derive(Clone)]
pub struct HealthCheckManager {
    inner: Arc<ManagerInner>,
}

impl HealthCheckManager {
    pub fn new(service: ServiceInfo, config: ManagerConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                service,
                config,
                state: RwLock::new(PublishedState::default()),
                runners: RwLock::new(Vec::new()),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn service(&self) -> &ServiceInfo {
        &self.inner.service
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub fn status(&self) -> HealthStatus {
        self.inner.state.read().status
    }

    pub fn runner_count(&self) -> usize {
        self.inner.runners.read().len()
    }

    /// Registers a runner; the same instance is only ever registered once.
    ///
    /// Returns `false` when `runner` was already present. Runners added after
    /// `start()` join the next poll cycle.
    pub fn add_check_runner(&self, runner: Arc<CheckRunner>) -> bool {
        let mut runners = self.inner.runners.write();
        if runners.iter().any(|r| Arc::ptr_eq(r, &runner)) {
            return false;
        }

        let key = runner.key();
        if runners.iter().any(|r| r.key() == key) {
            warn!(component = %key, "check runner key already registered, later results will overwrite earlier ones");
        }

        runners.push(runner);
        debug!(component = %key, "added check runner");
        true
    }

    /// Records the startup time and spawns the polling loop on the current
    /// tokio runtime. Fails without touching state when called outside one.
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| HealthError::NoRuntime)?;

        {
            let mut state = self.inner.state.write();
            if state.status != HealthStatus::Unknown {
                return Err(HealthError::InvalidState(state.status));
            }
            state.startup = Some(Startup {
                timestamp: Utc::now(),
                instant: Instant::now(),
            });
            state.status = HealthStatus::StartingUp;
        }

        info!("starting health check manager");

        let manager = self.clone();
        let handle = runtime.spawn(
            async move {
                let cycle_manager = manager.clone();
                manager
                    .run(move || {
                        let manager = cycle_manager.clone();
                        async move { manager.update_checks().await }
                    })
                    .await;
            }
            .in_current_span(),
        );
        *self.inner.task.lock() = Some(handle);

        Ok(())
    }

    /// Asks the loop to exit. An in-flight check is allowed to finish; only
    /// the inter-cycle sleep is interrupted.
    pub fn stop(&self) {
        self.inner.state.write().status = HealthStatus::ShuttingDown;
        self.inner.cancel.cancel();
        info!("stopped health check manager");
    }

    /// Stops the manager and waits for the loop task to finish.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("health check loop task failed: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Current snapshot; never waits for or triggers a poll cycle.
    pub fn get_response(&self) -> SystemHealth {
        let state = self.inner.state.read();
        let service = &self.inner.service;

        let mut notes = Vec::with_capacity(service.notes.len() + 2);
        notes.push(format!(
            "startup_timestamp={}",
            state
                .startup
                .map(|s| s.timestamp.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string())
        ));
        notes.push(format!(
            "last_checked_timestamp={}",
            state
                .last_checked
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string())
        ));
        notes.extend(service.notes.iter().cloned());

        SystemHealth {
            service_id: Some(service.service_id.clone()),
            status: state.status,
            version: Some(service.version.clone()),
            release_id: Some(service.release_id.clone()),
            description: service.description.clone(),
            notes,
            output: None,
            checks: (*state.checks).clone(),
        }
    }

    pub(crate) async fn run<F, Fut>(&self, mut cycle: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        while self.status() != HealthStatus::ShuttingDown {
            let outcome = match AssertUnwindSafe(cycle()).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => Err(HealthError::Cycle(format!(
                    "health check cycle panicked: {}",
                    panic_message(payload.as_ref())
                ))),
            };

            match outcome {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {
                    debug!("health check cycle cancelled, leaving refresh loop");
                    break;
                }
                Err(e) => error!("manager loop error: {}", e),
            }

            tokio::select! {
                _ = self.inner.cancel.cancelled() => {}
                _ = tokio::time::sleep(self.inner.config.check_delay) => {}
            }
        }

        info!("stopped health check refresh");
    }

    /// Runs every registered check once, in registration order, and publishes
    /// the aggregated result.
    pub(crate) async fn update_checks(&self) -> Result<()> {
        let runners: Vec<Arc<CheckRunner>> = self.inner.runners.read().clone();

        let mut results = Vec::with_capacity(runners.len());
        for runner in &runners {
            if self.inner.cancel.is_cancelled() {
                return Err(HealthError::Cancelled);
            }
            results.push(runner.run_check().await);
        }

        if self.inner.cancel.is_cancelled() {
            return Err(HealthError::Cancelled);
        }

        let status = aggregate_status(&results);

        let mut checks: HashMap<String, ComponentHealth> =
            results.into_iter().map(|c| (c.key(), c)).collect();

        let startup = self.inner.state.read().startup;
        checks.extend(system_checks(startup));

        let now = Utc::now();
        let mut state = self.inner.state.write();
        if state.status != HealthStatus::ShuttingDown {
            state.status = status;
        }
        state.checks = Arc::new(checks);
        state.last_checked = Some(now);
        drop(state);

        debug!(status = %status, "health checks updated");
        Ok(())
    }
}

fn system_checks(startup: Option<Startup>) -> Vec<(String, ComponentHealth)> {
    let uptime = ComponentHealth {
        measurement_name: Some(UPTIME_CHECK_KEY.to_string()),
        component_type: Some(ComponentType::System),
        observed_value: startup
            .map(|s| serde_json::json!(s.instant.elapsed().as_secs_f64())),
        observed_unit: Some("s".to_string()),
        status: HealthStatus::Ok,
        time: Some(Utc::now()),
        ..Default::default()
    };

    vec![(UPTIME_CHECK_KEY.to_string(), uptime)]
}

impl std::fmt::Debug for HealthCheckManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthCheckManager")
            .field("service", &self.inner.service)
            .field("status", &self.status())
            .field("runners", &self.runner_count())
            .finish()
    }
}
