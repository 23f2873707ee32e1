//! Roomvote daemon: entry point for running the voting service.

mod config;
mod shutdown;

use clap::Parser;
use roomvote_engine::RoomEngine;
use roomvote_rpc::RpcServer;
use roomvote_store_mem::MemoryRoomStore;
use roomvote_utils::{init_logging, LogFormat};
use roomvote_websocket::WebSocketServer;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::DaemonConfig;
use crate::shutdown::ShutdownController;

#[derive(Debug, Parser)]
#[command(name = "roomvote-daemon", about = "Room voting service daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "ROOMVOTE_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind both servers to.
    #[arg(long, env = "ROOMVOTE_BIND")]
    bind: Option<IpAddr>,

    /// HTTP API port.
    #[arg(long, env = "ROOMVOTE_API_PORT")]
    api_port: Option<u16>,

    /// Enable the WebSocket server.
    #[arg(long, env = "ROOMVOTE_ENABLE_WEBSOCKET")]
    websocket: bool,

    /// WebSocket server port.
    #[arg(long, env = "ROOMVOTE_WS_PORT")]
    websocket_port: Option<u16>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "ROOMVOTE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "ROOMVOTE_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Layer CLI flags and env vars over the file (or default) config.
    fn apply(self, base: DaemonConfig) -> DaemonConfig {
        DaemonConfig {
            bind_address: self.bind.unwrap_or(base.bind_address),
            api_port: self.api_port.unwrap_or(base.api_port),
            enable_websocket: self.websocket || base.enable_websocket,
            websocket_port: self.websocket_port.unwrap_or(base.websocket_port),
            log_level: self.log_level.unwrap_or(base.log_level),
            log_format: self.log_format.unwrap_or(base.log_format),
            ..base
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();

    let file_config = match cli.config.take() {
        Some(path) => DaemonConfig::from_toml_file(&path)?,
        None => DaemonConfig::default(),
    };
    let config = cli.apply(file_config);

    init_logging(config.log_format, &config.log_level);
    tracing::info!(
        "Starting roomvote daemon (API:{}, WS:{})",
        config.api_addr(),
        if config.enable_websocket {
            config.websocket_addr().to_string()
        } else {
            "off".into()
        },
    );

    let store = Arc::new(MemoryRoomStore::new());
    let engine = Arc::new(RoomEngine::new(store, config.engine.clone()));

    let shutdown = Arc::new(ShutdownController::new());
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { shutdown.wait_for_signal().await });
    }

    let api = RpcServer::new(config.api_addr(), engine.clone());
    let api_task = tokio::spawn(api.start(shutdown.signal()));

    let ws_task = config.enable_websocket.then(|| {
        let ws = WebSocketServer::new(config.websocket_addr(), engine.clone());
        tokio::spawn(ws.start(shutdown.signal()))
    });

    let api_result = api_task.await;
    // a failed API server takes the WebSocket server down with it
    shutdown.shutdown();
    if let Some(ws_task) = ws_task {
        ws_task.await??;
    }
    api_result??;

    tracing::info!("roomvote daemon exited cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_file_values() {
        let cli = Cli::parse_from([
            "roomvote-daemon",
            "--api-port",
            "8080",
            "--log-format",
            "json",
            "--websocket",
        ]);
        let base = DaemonConfig {
            api_port: 5000,
            websocket_port: 7001,
            log_level: "debug".into(),
            ..DaemonConfig::default()
        };
        let config = cli.apply(base);
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.websocket_port, 7001);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.enable_websocket);
    }

    #[test]
    fn no_flags_keep_file_config() {
        let cli = Cli::parse_from(["roomvote-daemon"]);
        let base = DaemonConfig {
            enable_websocket: true,
            ..DaemonConfig::default()
        };
        assert_eq!(cli.apply(base.clone()), base);
    }
}
