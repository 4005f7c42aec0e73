//! Configuration module for environment variable parsing.
//!
//! Everything the gateway needs is read once at startup and then shared
//! read-only between request handlers.

use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Secret used when `DEPLOY_SECRET` is unset. Must be overridden in production.
pub const DEFAULT_SECRET: &str = "change-this-secret-token-now";

/// Deploy script invoked when `DEPLOY_SCRIPT` is unset.
pub const DEFAULT_SCRIPT: &str = "/home/server/Code/Portfolio/deploy.sh";

/// Default deploy timeout (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub const DEFAULT_PORT: u16 = 9000;

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Shared secret used to sign `/deploy` request bodies
    pub deploy_secret: Vec<u8>,

    /// Executable run on every authenticated deploy request
    pub deploy_script: PathBuf,

    /// Maximum wall time allowed for the deploy script
    pub deploy_timeout: Duration,

    /// Address to bind; loopback unless a reverse proxy needs otherwise
    pub host: IpAddr,

    /// Port for the web server to listen on
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            deploy_secret: env::var("DEPLOY_SECRET")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_SECRET.to_string())
                .into_bytes(),

            deploy_script: env::var("DEPLOY_SCRIPT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT)),

            deploy_timeout: Duration::from_secs(parse_var(
                "DEPLOY_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )),

            host: parse_var("HOST", IpAddr::V4(Ipv4Addr::LOCALHOST)),

            port: parse_var("PORT", DEFAULT_PORT),
        }
    }

    /// Socket address the listener binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the built-in placeholder secret is in effect.
    pub fn uses_default_secret(&self) -> bool {
        self.deploy_secret == DEFAULT_SECRET.as_bytes()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            deploy_secret: DEFAULT_SECRET.as_bytes().to_vec(),
            deploy_script: PathBuf::from(DEFAULT_SCRIPT),
            deploy_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
        }
    }
}

// The secret must never reach the logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("deploy_secret", &"<redacted>")
            .field("deploy_script", &self.deploy_script)
            .field("deploy_timeout", &self.deploy_timeout)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// Parse an environment variable, falling back to `default` when it is
/// unset or does not parse.
fn parse_var<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}
