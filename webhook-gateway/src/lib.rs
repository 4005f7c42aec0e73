//! Portfolio Webhook - signed deployment trigger.
//!
//! This library backs two binaries:
//! - `portfolio-webhook`: loopback HTTP listener running the deploy script
//! - `portfolio-webhook-sign`: computes the signature header for a body
//!
//! ## Request flow
//!
//! ```text
//! POST /deploy → verify signature → run deploy script → JSON response
//! ```

pub mod config;
pub mod deploy;
pub mod web;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use deploy::{DeployInvoker, DeployOutcome, ScriptInvoker};
pub use web::{router, AppState, WebhookError};
