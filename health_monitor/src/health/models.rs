//! Health record shapes shared by runners, the manager and the HTTP binding

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Error,
    StartingUp,
    ShuttingDown,
    #[default]
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Ok => "ok",
            HealthStatus::Error => "error",
            HealthStatus::StartingUp => "starting_up",
            HealthStatus::ShuttingDown => "shutting_down",
            HealthStatus::Unknown => "unknown",
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == HealthStatus::Ok
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ok" => Ok(HealthStatus::Ok),
            "error" => Ok(HealthStatus::Error),
            "starting_up" => Ok(HealthStatus::StartingUp),
            "shutting_down" => Ok(HealthStatus::ShuttingDown),
            "unknown" => Ok(HealthStatus::Unknown),
            other => Err(format!("unrecognized health status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Component,
    Datastore,
    System,
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentType::Component => write!(f, "component"),
            ComponentType::Datastore => write!(f, "datastore"),
            ComponentType::System => write!(f, "system"),
        }
    }
}

/// Health of one logical dependency or sub-component, as reported by its
/// check function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ComponentHealth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<ComponentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_unit: Option<String>,
    #[serde(default)]
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ComponentHealth {
    pub fn new(component_name: impl Into<String>, measurement_name: impl Into<String>) -> Self {
        Self {
            component_name: Some(component_name.into()),
            measurement_name: Some(measurement_name.into()),
            ..Default::default()
        }
    }

    pub fn with_component_id(mut self, component_id: impl Into<String>) -> Self {
        self.component_id = Some(component_id.into());
        self
    }

    pub fn with_component_type(mut self, component_type: ComponentType) -> Self {
        self.component_type = Some(component_type);
        self
    }

    pub fn with_observed_unit(mut self, observed_unit: impl Into<String>) -> Self {
        self.observed_unit = Some(observed_unit.into());
        self
    }

    pub fn with_observed_value(mut self, observed_value: serde_json::Value) -> Self {
        self.observed_value = Some(observed_value);
        self
    }

    pub fn with_status(mut self, status: HealthStatus) -> Self {
        self.status = status;
        self
    }

    /// Key under which this record appears in `SystemHealth::checks`.
    pub fn key(&self) -> String {
        format!(
            "{}:{}",
            self.component_name.as_deref().unwrap_or_default(),
            self.measurement_name.as_deref().unwrap_or_default()
        )
    }
}

/// Aggregated health of the whole service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemHealth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default)]
    pub checks: HashMap<String, ComponentHealth>,
}

impl SystemHealth {
    pub fn is_healthy(&self) -> bool {
        self.status.is_ok()
    }
}

/// Verdict over one cycle's results: `error` as soon as any record is not `ok`.
pub fn aggregate_status<'a, I>(results: I) -> HealthStatus
where
    I: IntoIterator<Item = &'a ComponentHealth>,
{
    if results.into_iter().any(|c| !c.status.is_ok()) {
        HealthStatus::Error
    } else {
        HealthStatus::Ok
    }
}
