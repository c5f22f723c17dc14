//! HTTP server for the relay.
//!
//! # Endpoints
//!
//! - `POST /api/v1/messages/{service_id}` - Accepts webhook deliveries and
//!   publishes them to the message bus (returns 202 Accepted)
//! - `GET /healthz` - Returns 200 if the server is running

pub mod health;
pub mod messages;

pub use health::health_handler;
pub use messages::create_message_handler;

use crate::ingest::Ingestor;

/// Shared application state.
///
/// Passed to all handlers via Axum's `State` extractor. The ingestor holds
/// the port handles (directory, resolver, publisher) constructed once at
/// startup and passed in explicitly — there are no ambient globals.
#[derive(Clone)]
pub struct AppState {
    ingestor: Ingestor,
}

impl AppState {
    pub fn new(ingestor: Ingestor) -> Self {
        AppState { ingestor }
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/api/v1/messages/{service_id}", post(create_message_handler))
        .route("/healthz", get(health_handler))
        .with_state(app_state)
}
