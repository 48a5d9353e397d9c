//! Execution of a single component's check function with failure isolation

use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::{CheckError, CheckResult};
use crate::health::models::{ComponentHealth, HealthStatus};

pub const CHECK_FAILURE_OUTPUT: &str = "Failed to run component health check function.";

/// Caller-supplied logic that inspects a component and reports its health.
///
/// The function receives the component's last record and returns the record
/// that replaces it. Setting an appropriate status is the function's job.
#[async_trait]
pub trait CheckFunction: Send + Sync {
    async fn check(&self, component: ComponentHealth) -> CheckResult;
}

#[async_trait]
impl<F, Fut> CheckFunction for F
where
    F: Fn(ComponentHealth) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CheckResult> + Send + 'static,
{
    async fn check(&self, component: ComponentHealth) -> CheckResult {
        (self)(component).await
    }
}

/// Check function that runs synchronous code on the blocking thread pool.
pub struct BlockingCheck<F> {
    check_fn: Arc<F>,
}

/// Wraps a synchronous check so blocking I/O inside it never stalls the
/// runtime driving the polling loop.
pub fn blocking<F>(check_fn: F) -> BlockingCheck<F>
where
    F: Fn(ComponentHealth) -> CheckResult + Send + Sync + 'static,
{
    BlockingCheck {
        check_fn: Arc::new(check_fn),
    }
}

#[async_trait]
impl<F> CheckFunction for BlockingCheck<F>
where
    F: Fn(ComponentHealth) -> CheckResult + Send + Sync + 'static,
{
    async fn check(&self, component: ComponentHealth) -> CheckResult {
        let check_fn = self.check_fn.clone();
        match tokio::task::spawn_blocking(move || check_fn(component)).await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                Err(CheckError::from_panic(join_error.into_panic()))
            }
            Err(join_error) => Err(CheckError::failed(join_error.to_string())),
        }
    }
}

/// Binds one component record to the function that checks it.
pub struct CheckRunner {
    component: Mutex<ComponentHealth>,
    check_fn: Box<dyn CheckFunction>,
    timeout: Option<Duration>,
}

impl CheckRunner {
    pub fn new<C>(component: ComponentHealth, check_fn: C) -> Self
    where
        C: CheckFunction + 'static,
    {
        Self {
            component: Mutex::new(component),
            check_fn: Box::new(check_fn),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn key(&self) -> String {
        self.component.lock().key()
    }

    /// Latest record without running the check.
    pub fn component(&self) -> ComponentHealth {
        self.component.lock().clone()
    }

    /// Runs the check once and returns the resulting record.
    ///
    /// Errors returned by the check, panics while it runs and an elapsed
    /// timeout all turn into an `error` status with a fixed output; none of
    /// them escape this call. The record is timestamped either way.
    pub async fn run_check(&self) -> ComponentHealth {
        let current = self.component.lock().clone();
        let key = current.key();

        let outcome = match self.timeout {
            Some(limit) => {
                tokio::time::timeout(limit, self.guarded_check(current.clone()))
                    .await
                    .unwrap_or(Err(CheckError::TimedOut(limit)))
            }
            None => self.guarded_check(current.clone()).await,
        };

        let mut updated = match outcome {
            Ok(component) => {
                debug!(component = %key, status = %component.status, "component health check completed");
                component
            }
            Err(e) => {
                error!(component = %key, error = ?e, "component health check failed: {}", e);
                let mut failed = current;
                failed.status = HealthStatus::Error;
                failed.output = Some(CHECK_FAILURE_OUTPUT.to_string());
                failed
            }
        };

        updated.time = Some(chrono::Utc::now());
        *self.component.lock() = updated.clone();
        updated
    }

    async fn guarded_check(&self, component: ComponentHealth) -> CheckResult {
        match AssertUnwindSafe(self.check_fn.check(component)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(CheckError::from_panic(payload)),
        }
    }
}

impl std::fmt::Debug for CheckRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckRunner")
            .field("component", &*self.component.lock())
            .field("timeout", &self.timeout)
            .finish()
    }
}
