//! Request logging for services exposing a health endpoint

use axum::{body::Body, response::Response, Router};
use http::{Request, StatusCode};
use std::time::Duration;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::trace::TraceLayer;
use tracing::info_span;

/// Wraps `router` in a trace layer that treats `503 Service Unavailable` as
/// a reported health state rather than a server failure.
pub fn with_request_logging<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            info_span!(
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &tracing::Span| {
            tracing::debug!(
                "started processing request {} {}",
                request.method(),
                request.uri().path()
            );
        })
        .on_response(|response: &Response, latency: Duration, _span: &tracing::Span| {
            let status = response.status();
            let latency_ms = latency.as_millis();

            if status == StatusCode::SERVICE_UNAVAILABLE {
                tracing::warn!(
                    status = status.as_u16(),
                    latency_ms = latency_ms,
                    "service reported unavailable"
                );
            } else if status.is_server_error() {
                tracing::error!(
                    status = status.as_u16(),
                    latency_ms = latency_ms,
                    "server error response"
                );
            } else if status.is_client_error() {
                tracing::warn!(
                    status = status.as_u16(),
                    latency_ms = latency_ms,
                    "client error response"
                );
            } else {
                tracing::info!(
                    status = status.as_u16(),
                    latency_ms = latency_ms,
                    "request completed"
                );
            }
        })
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                if let ServerErrorsFailureClass::StatusCode(StatusCode::SERVICE_UNAVAILABLE) = error {
                    return;
                }
                tracing::error!(
                    latency_ms = latency.as_millis(),
                    error = %error,
                    "request failed"
                );
            },
        );

    router.layer(layer)
}
