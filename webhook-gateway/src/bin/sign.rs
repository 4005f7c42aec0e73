//! Portfolio Webhook Signer - computes `X-Deploy-Signature` for a body.
//!
//! Reads the body from the file given as the only argument, or from stdin
//! when no argument (or `-`) is given, and prints the header value using
//! the secret in `DEPLOY_SECRET`:
//!
//! ```text
//! printf '{}' | portfolio-webhook-sign
//! curl -X POST -d '{}' -H "X-Deploy-Signature: $(printf '{}' | portfolio-webhook-sign)" \
//!     http://127.0.0.1:9000/deploy
//! ```

use std::io::Read;

use anyhow::{bail, Context, Result};
use tracing::warn;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use portfolio_webhook::web::sign;
use portfolio_webhook::Config;

fn main() -> Result<()> {
    // Diagnostics go to stderr so stdout carries only the signature
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();
    if config.uses_default_secret() {
        warn!("deploy_secret_default_in_use");
    }

    let body = read_body(std::env::args().nth(1))?;

    let signature = match sign(&body, &config.deploy_secret) {
        Some(signature) => signature,
        None => bail!("Deploy secret rejected by HMAC"),
    };

    println!("{}", signature);
    Ok(())
}

fn read_body(source: Option<String>) -> Result<Vec<u8>> {
    match source.as_deref() {
        None | Some("-") => {
            let mut body = Vec::new();
            std::io::stdin()
                .read_to_end(&mut body)
                .context("Failed to read body from stdin")?;
            Ok(body)
        }
        Some(path) => {
            std::fs::read(path).with_context(|| format!("Failed to read body from {}", path))
        }
    }
}
