//! Deploy invocation module.
//!
//! This module provides:
//! - The outcome type of a single deploy run
//! - The `DeployInvoker` seam used by the HTTP layer
//! - `ScriptInvoker`, which runs the configured deploy executable
//!
//! ## Flow
//!
//! ```text
//! verified request → DeployInvoker::invoke() → DeployOutcome → HTTP response
//! ```

pub mod invoker;
pub mod types;

pub use invoker::{invoke, DeployInvoker, ScriptInvoker};
pub use types::DeployOutcome;
