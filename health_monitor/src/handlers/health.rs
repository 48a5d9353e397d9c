//! Health endpoint handler serving the manager's latest snapshot

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{info, warn};

use crate::health::{HealthCheckManager, HealthStatus};

/// `ok` maps to `200 OK`; every other aggregate status to `503`.
pub fn status_code_for(status: HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Ok => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub async fn handle_health(State(manager): State<HealthCheckManager>) -> impl IntoResponse {
    let system_health = manager.get_response();
    let status_code = status_code_for(system_health.status);

    if status_code == StatusCode::OK {
        info!("health status: {}", status_code.as_u16());
    } else {
        warn!(status = %system_health.status, "health status: {}", status_code.as_u16());
    }

    (status_code, Json(system_health))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(status_code_for(HealthStatus::Ok), StatusCode::OK);
        assert_eq!(status_code_for(HealthStatus::Error), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_code_for(HealthStatus::StartingUp), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_code_for(HealthStatus::ShuttingDown), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_code_for(HealthStatus::Unknown), StatusCode::SERVICE_UNAVAILABLE);
    }
}
