//! Deploy outcome type.

use crate::web::WebhookError;

/// Result of running the deploy executable once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Exited with status 0
    Success { stdout: String },
    /// Exited non-zero, or was killed by a signal (`code` is `None`)
    Failure { code: Option<i32>, stderr: String },
    /// Did not finish within the configured timeout and was killed
    Timeout,
    /// Could not be started or waited on
    InvocationError { message: String },
}

impl DeployOutcome {
    /// Short label used in log events.
    pub fn label(&self) -> &'static str {
        match self {
            DeployOutcome::Success { .. } => "success",
            DeployOutcome::Failure { .. } => "failure",
            DeployOutcome::Timeout => "timeout",
            DeployOutcome::InvocationError { .. } => "invocation_error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DeployOutcome::Success { .. })
    }

    /// Split into the captured stdout or the error reported to the caller.
    pub fn into_result(self) -> Result<String, WebhookError> {
        match self {
            DeployOutcome::Success { stdout } => Ok(stdout),
            DeployOutcome::Failure { code, stderr } => {
                Err(WebhookError::DeployNonZeroExit { code, stderr })
            }
            DeployOutcome::Timeout => Err(WebhookError::DeployTimeout),
            DeployOutcome::InvocationError { message } => {
                Err(WebhookError::DeploySpawnError(message))
            }
        }
    }
}
