//! Ready-made check functions for common local dependencies

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::CheckResult;
use crate::health::models::{ComponentHealth, HealthStatus};
use crate::health::runner::CheckFunction;

/// Verifies that a set of paths exist and can be read and written.
///
/// The per-path findings are reported as the observed value; any issue marks
/// the component as `error` and lists the issues in `output`.
pub struct FilesystemCheck {
    paths: Vec<PathBuf>,
}

impl FilesystemCheck {
    pub fn new<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl CheckFunction for FilesystemCheck {
    async fn check(&self, mut component: ComponentHealth) -> CheckResult {
        let mut issues = Vec::new();
        let mut details = serde_json::Map::new();

        for path in &self.paths {
            let display = path.display().to_string();

            if fs::metadata(path).await.is_err() {
                issues.push(format!("Path does not exist: {}", display));
                details.insert(display, serde_json::json!({
                    "exists": false,
                    "writable": false
                }));
                continue;
            }

            let writable = probe_writable(path).await;
            if !writable {
                issues.push(format!("Cannot write to path: {}", display));
            }

            details.insert(display, serde_json::json!({
                "exists": true,
                "writable": writable
            }));
        }

        component.observed_value = Some(serde_json::Value::Object(details));
        if issues.is_empty() {
            component.status = HealthStatus::Ok;
            component.output = None;
        } else {
            component.status = HealthStatus::Error;
            component.output = Some(issues.join(", "));
        }

        Ok(component)
    }
}

async fn probe_writable(path: &Path) -> bool {
    let dir = if fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false) {
        path
    } else {
        match path.parent() {
            Some(parent) => parent,
            None => return false,
        }
    };

    let probe = dir.join(".health_check_probe");
    match fs::write(&probe, b"probe").await {
        Ok(()) => {
            let _ = fs::remove_file(&probe).await;
            true
        }
        Err(_) => false,
    }
}
