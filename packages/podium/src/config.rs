use anyhow::{Context, Result, bail};
use podium_auth::SessionSecret;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::urls::normalize_base_path;

// =============================================================================
// Unified config (figment-deserialized from defaults / podium.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   podium.toml:     [websocket]
//                    ping_interval_secs = 10
//
//   env var:         PODIUM_WEBSOCKET__PING_INTERVAL_SECS=10   (double underscore = nesting)
//
//   CLI flag:        --port 9000   (top-level keys only)

pub const DEFAULT_CONFIG_FILE: &str = "podium.toml";

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_presentation_path")]
    pub presentation_path: PathBuf,
    /// Directory served under `{base}_remote/`
    #[serde(default)]
    pub remote_ui_path: Option<PathBuf>,
    /// Resumption secret. A random one is generated per process when unset,
    /// so hashes do not survive a restart.
    #[serde(default)]
    pub hash_secret: Option<String>,
    /// `*`, or a comma-separated origin list
    #[serde(default)]
    pub cors_origin: Option<String>,
    #[serde(default)]
    pub https: bool,
    #[serde(default)]
    pub websocket: WebSocketFileConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_path: default_base_path(),
            presentation_path: default_presentation_path(),
            remote_ui_path: None,
            hash_secret: None,
            cors_origin: None,
            https: false,
            websocket: WebSocketFileConfig::default(),
        }
    }
}

/// WebSocket tunables (lives under `[websocket]` in podium.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSocketFileConfig {
    #[serde(default = "default_send_channel_capacity")]
    pub send_channel_capacity: usize,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

impl Default for WebSocketFileConfig {
    fn default() -> Self {
        Self {
            send_channel_capacity: default_send_channel_capacity(),
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_base_path() -> String {
    "/".to_string()
}
fn default_presentation_path() -> PathBuf {
    PathBuf::from("./presentations")
}
fn default_send_channel_capacity() -> usize {
    64
}
fn default_ping_interval_secs() -> u64 {
    25
}

/// Flags given on the command line. Only set fields override lower layers.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_ui_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors_origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https: Option<bool>,
}

/// Build a figment that layers: defaults → podium.toml → PODIUM_* env vars → CLI flags.
///
/// Env vars use double-underscore for nesting into sections:
///   `PODIUM_PORT=9000`  →  `port = 9000`
///   `PODIUM_WEBSOCKET__SEND_CHANNEL_CAPACITY=128`  →  `websocket.send_channel_capacity = 128`
pub fn load_config(config_file: &Path, cli: &CliOverrides) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_file))
        .merge(Env::prefixed("PODIUM_").split("__"))
        .merge(Serialized::defaults(cli))
}

// =============================================================================
// Runtime config structs (derived from FileConfig, used throughout the server)
// =============================================================================

/// Cross-origin policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CorsSetting {
    Disabled,
    Any,
    List(Vec<String>),
}

impl CorsSetting {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::Disabled;
        };
        if raw == "*" {
            return Self::Any;
        }
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if origins.is_empty() {
            Self::Disabled
        } else {
            Self::List(origins)
        }
    }
}

#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// Channel capacity for messages to client
    pub send_channel_capacity: usize,
    /// Server ping period (None = disabled)
    pub ping_interval: Option<Duration>,
}

impl WebSocketConfig {
    pub fn from_file(fc: &WebSocketFileConfig) -> Self {
        Self {
            send_channel_capacity: fc.send_channel_capacity.max(1),
            ping_interval: if fc.ping_interval_secs == 0 {
                None
            } else {
                Some(Duration::from_secs(fc.ping_interval_secs))
            },
        }
    }
}

/// Broker configuration for runtime behavior.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    pub bind_addr: SocketAddr,
    /// Always starts and ends with `/`
    pub base_path: String,
    pub presentation_path: PathBuf,
    pub remote_ui_path: Option<PathBuf>,
    pub secret: SessionSecret,
    /// True when the secret was generated rather than configured
    pub secret_generated: bool,
    pub cors: CorsSetting,
    pub https: bool,
    pub websocket: WebSocketConfig,
}

impl BrokerConfig {
    pub fn from_file(fc: &FileConfig) -> Result<Self> {
        if fc.port == 0 {
            bail!("port must be between 1 and 65535");
        }
        let bind_addr: SocketAddr = format!("{}:{}", fc.host, fc.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", fc.host, fc.port))?;

        let (secret, secret_generated) = match fc.hash_secret.as_deref() {
            Some(s) => (
                SessionSecret::new(s).context("hash_secret must not be empty")?,
                false,
            ),
            None => (SessionSecret::generate(), true),
        };

        Ok(Self {
            bind_addr,
            base_path: normalize_base_path(&fc.base_path),
            presentation_path: fc.presentation_path.clone(),
            remote_ui_path: fc.remote_ui_path.clone(),
            secret,
            secret_generated,
            cors: CorsSetting::parse(fc.cors_origin.as_deref()),
            https: fc.https,
            websocket: WebSocketConfig::from_file(&fc.websocket),
        })
    }
}
