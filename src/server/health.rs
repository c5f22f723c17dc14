//! Health check endpoint for liveness probes.
//!
//! Returns 200 OK if the server is running. This is intended for use with
//! load balancers and orchestration systems (e.g., Kubernetes liveness
//! probes).

use axum::http::StatusCode;

/// Health check handler.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
