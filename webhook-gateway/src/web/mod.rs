//! Web server module for the deploy webhook.
//!
//! This module provides a small loopback-only web server that:
//! - Answers health checks
//! - Verifies signed `/deploy` requests
//! - Runs the deploy script and reports its outcome
//!
//! TLS and public exposure are left to a reverse proxy in front of it.

pub mod handlers;
pub mod responses;
pub mod signature;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{deploy, health, AppState};
pub use responses::{
    DeployFailureResponse, DeployResponse, ErrorResponse, HealthResponse, WebhookError,
    SERVICE_NAME,
};
pub use signature::{sign, verify, SIGNATURE_HEADER, SIGNATURE_PREFIX};

/// Largest `/deploy` body accepted for signing.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the router serving `/health` and `/deploy`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/deploy",
            post(deploy).layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
