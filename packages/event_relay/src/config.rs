use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Unified config (figment-deserialized from defaults / relay.toml / env vars)
// =============================================================================
//
// Two equivalent ways to configure:
//
//   relay.toml:      [server]
//                    port = 9000
//
//   env var:         RELAY_SERVER__PORT=9000   (double underscore = nesting)
//
//   (single underscore stays within field names: RELAY_HANDSHAKE__IDLE_TIMEOUT_SECS)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub handshake: HandshakeFileConfig,
}

/// Bind address knobs (lives under `[server]` in relay.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Connection keep-alive timing (lives under `[handshake]` in relay.toml).
///
/// The server enforces the idle deadline and ping cadence itself;
/// `connect_timeout_secs` is how long clients get for the upgrade attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandshakeFileConfig {
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HandshakeFileConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            ping_interval_secs: default_ping_interval(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl HandshakeFileConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

impl FileConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| {
                format!(
                    "invalid bind address {}:{}",
                    self.server.host, self.server.port
                )
            })
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8081
}
fn default_idle_timeout() -> u64 {
    30
}
fn default_ping_interval() -> u64 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}

/// Build a figment that layers: defaults → relay.toml → RELAY_* env vars,
/// and extract the merged view.
///
/// An explicit `--config` path must exist; the implicit `relay.toml` in the
/// working directory is optional.
pub fn load(path: Option<&Path>) -> Result<FileConfig> {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let toml = match path {
        Some(p) => Toml::file_exact(p),
        None => Toml::file("relay.toml"),
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(toml)
        .merge(Env::prefixed("RELAY_").split("__"))
        .extract()
        .context("invalid relay configuration")
}
