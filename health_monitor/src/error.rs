//! Error types for the health monitor and for component check functions

use std::time::Duration;
use thiserror::Error;

use crate::health::HealthStatus;

pub type Result<T> = std::result::Result<T, HealthError>;

#[derive(Error, Debug)]
pub enum HealthError {
    #[error("health check manager cannot start from state '{0}'")]
    InvalidState(HealthStatus),

    #[error("no tokio runtime available to run the health check loop")]
    NoRuntime,

    #[error("health check cycle cancelled")]
    Cancelled,

    #[error("{0}")]
    Cycle(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HealthError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, HealthError::Cancelled)
    }
}

/// Outcome of a single component check that did not produce a record.
///
/// The runner converts every variant into an `error` status on the
/// component; the detail only ever reaches the logs.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("{0}")]
    Failed(String),

    #[error("check function panicked: {0}")]
    Panicked(String),

    #[error("check function timed out after {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CheckError {
    pub fn failed(message: impl Into<String>) -> Self {
        CheckError::Failed(message.into())
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        CheckError::Panicked(panic_message(payload.as_ref()))
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub type CheckResult = std::result::Result<crate::health::ComponentHealth, CheckError>;
