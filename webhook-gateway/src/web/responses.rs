//! Response bodies and the mapping from request errors to HTTP responses.
//!
//! Every way a `/deploy` request can end is decided here, once, so handlers
//! only ever return `Result<_, WebhookError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Service name reported by the health endpoint.
pub const SERVICE_NAME: &str = "portfolio-webhook";

/// Terminal errors of a `/deploy` request. None are retried.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Invalid signature")]
    SignatureMissing,

    #[error("Invalid signature")]
    SignatureMismatch,

    #[error("Deployment failed")]
    DeployNonZeroExit { code: Option<i32>, stderr: String },

    #[error("Deployment timed out")]
    DeployTimeout,

    #[error("{0}")]
    DeploySpawnError(String),

    #[error("{0}")]
    Unexpected(String),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::SignatureMissing | WebhookError::SignatureMismatch => {
                StatusCode::FORBIDDEN
            }
            WebhookError::DeployNonZeroExit { .. }
            | WebhookError::DeployTimeout
            | WebhookError::DeploySpawnError(_)
            | WebhookError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            WebhookError::DeployNonZeroExit { stderr, .. } => (
                status,
                Json(DeployFailureResponse {
                    status: "error",
                    message: "Deployment failed",
                    error: stderr,
                }),
            )
                .into_response(),
            other => (
                status,
                Json(ErrorResponse {
                    error: other.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy",
            service: SERVICE_NAME,
        }
    }
}

/// Successful deploy response.
#[derive(Debug, Serialize)]
pub struct DeployResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub output: String,
}

impl DeployResponse {
    pub fn success(output: String) -> Self {
        Self {
            status: "success",
            message: "Deployment completed successfully",
            output,
        }
    }
}

/// Deploy script exited non-zero.
#[derive(Debug, Serialize)]
pub struct DeployFailureResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub error: String,
}

/// Any other rejected or failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
