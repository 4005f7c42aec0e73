//! HTTP endpoint handlers.
//!
//! `/deploy` runs in two stages:
//! 1. Verify the body signature against the shared secret
//! 2. Run the deploy and wait for it to finish or time out
//!
//! The response is only sent once the deploy has reached a terminal state.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use tracing::{error, info, warn};

use crate::deploy::{DeployInvoker, ScriptInvoker};
use crate::web::responses::{DeployResponse, HealthResponse, WebhookError};
use crate::web::signature::{verify, SIGNATURE_HEADER};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub invoker: Arc<dyn DeployInvoker>,
}

impl AppState {
    /// State running the configured deploy script.
    pub fn new(config: Config) -> Self {
        let invoker = ScriptInvoker::from_config(&config);
        Self::with_invoker(config, Arc::new(invoker))
    }

    pub fn with_invoker(config: Config, invoker: Arc<dyn DeployInvoker>) -> Self {
        Self {
            config: Arc::new(config),
            invoker,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

// =============================================================================
// Deploy
// =============================================================================

/// Deploy endpoint.
///
/// The body is used only to compute the signature; it is never parsed and
/// never passed to the deploy script.
pub async fn deploy(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DeployResponse>, WebhookError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    info!(
        body_length = body.len(),
        has_signature = signature.is_some(),
        "deploy_request_received"
    );

    check_signature(&body, signature, &state.config.deploy_secret)?;

    // The deploy runs on its own task: a client hanging up does not cancel
    // it, only the invoker's timeout does.
    let invoker = Arc::clone(&state.invoker);
    let outcome = tokio::spawn(async move { invoker.invoke().await })
        .await
        .map_err(|e| {
            error!(error = %e, "deploy_task_failed");
            WebhookError::Unexpected("Deployment task failed".to_string())
        })?;

    info!(outcome = outcome.label(), "deploy_request_completed");

    let output = outcome.into_result()?;
    Ok(Json(DeployResponse::success(output)))
}

/// Reject the request unless `signature` is valid for `body`.
fn check_signature(
    body: &[u8],
    signature: Option<&str>,
    secret: &[u8],
) -> Result<(), WebhookError> {
    match signature {
        None | Some("") => {
            warn!("deploy_signature_missing");
            Err(WebhookError::SignatureMissing)
        }
        Some(_) if !verify(body, signature, secret) => {
            warn!("deploy_signature_invalid");
            Err(WebhookError::SignatureMismatch)
        }
        Some(_) => Ok(()),
    }
}
