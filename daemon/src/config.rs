//! Daemon configuration with TOML file support.

use anyhow::Context;
use roomvote_engine::EngineConfig;
use roomvote_utils::LogFormat;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

/// Configuration for a roomvote daemon.
///
/// Can be loaded from a TOML file via [`DaemonConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Interface both servers bind to.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// HTTP API port.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Whether to enable the WebSocket server.
    #[serde(default)]
    pub enable_websocket: bool,

    /// WebSocket port (if enabled).
    #[serde(default = "default_ws_port")]
    pub websocket_port: u16,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Engine tunables.
    #[serde(default)]
    pub engine: EngineConfig,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_api_port() -> u16 {
    5000
}

fn default_ws_port() -> u16 {
    5001
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn api_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.api_port)
    }

    pub fn websocket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.websocket_port)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_port: default_api_port(),
            enable_websocket: false,
            websocket_port: default_ws_port(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            engine: EngineConfig::default(),
        }
    }
}
