//! Savant REST relay - main entry point

use clap::Parser;
use savant_relay::command::CommandSender;
use savant_relay::directory::ServiceDirectory;
use savant_relay::discovery::UisDiscovery;
use savant_relay::http::{router, AppState};
use savant_relay::lighting::LightingSession;
use savant_relay::state::StateCache;
use savant_relay::watcher::StatusFileWatcher;
use savant_relay::{RelayConfig, RelayError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Savant REST relay configuration
#[derive(Parser, Debug)]
#[command(name = "savant-relay")]
#[command(about = "REST relay bridging Savant host internals to a local JSON API")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, env = "SAVANT_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Service implementation database path
    #[arg(long, env = "SAVANT_DB_PATH")]
    db_path: Option<PathBuf>,

    /// UIS host
    #[arg(long, env = "SAVANT_CONTROL_HOST")]
    control_host: Option<String>,

    /// Listen port for the JSON API
    #[arg(short, long, env = "SAVANT_RELAY_PORT")]
    port: Option<u16>,

    /// Lighting processor host
    #[arg(long, env = "LUTRON_HOST")]
    lutron_host: Option<String>,

    /// Lighting processor telnet port
    #[arg(long, env = "LUTRON_PORT")]
    lutron_port: Option<u16>,

    /// Lighting processor login
    #[arg(long, env = "LUTRON_PASSWORD")]
    lutron_password: Option<String>,

    /// Status file directory
    #[arg(long, env = "SAVANT_STATUS_DIR")]
    status_dir: Option<PathBuf>,
}

impl Cli {
    /// Initialize logging based on debug flag
    fn initialize_logging(&self) {
        let filter = if self.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }

    /// Config file (or defaults) with CLI/env overrides applied
    fn build_config(&self) -> Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::from_file(path)?,
            None => RelayConfig::default(),
        };
        if let Some(path) = &self.db_path {
            config.directory.db_path = path.clone();
        }
        if let Some(host) = &self.control_host {
            config.control.host = host.clone();
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(host) = &self.lutron_host {
            config.lighting.host = host.clone();
        }
        if let Some(port) = self.lutron_port {
            config.lighting.port = port;
        }
        if let Some(password) = &self.lutron_password {
            config.lighting.password = password.clone();
        }
        if let Some(dir) = &self.status_dir {
            config.watcher.status_dir = dir.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.initialize_logging();
    let config = cli.build_config()?;

    info!("starting savant-relay v{}", env!("CARGO_PKG_VERSION"));

    let cache = Arc::new(StateCache::new());
    let directory = ServiceDirectory::new(config.directory.db_path.clone());
    let discovery = UisDiscovery::new(&config.control);
    let sender = match config.control.port {
        Some(port) => CommandSender::with_endpoint(config.control.host.clone(), port, discovery),
        None => CommandSender::new(config.control.host.clone(), discovery),
    };

    // Address->kind map for switch normalization. Directory trouble here
    // degrades to dimmer semantics instead of blocking startup; the feeds
    // are best-effort.
    let kinds = match directory.light_kinds().await {
        Ok(kinds) => kinds,
        Err(e) => {
            warn!("could not load light kinds: {e}");
            Default::default()
        }
    };

    tokio::spawn(LightingSession::new(config.lighting.clone(), cache.clone(), kinds).run());
    tokio::spawn(StatusFileWatcher::new(config.watcher.status_dir.clone(), cache.clone()).run());

    let state = Arc::new(AppState {
        directory,
        cache,
        sender,
        started_at: Instant::now(),
    });

    let addr = format!("{}:{}", config.http.listen_address, config.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::config(format!("cannot bind {addr}: {e}")))?;
    info!("relay listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RelayError::connection(format!("server error: {e}")))?;

    info!("shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for ctrl-c: {e}");
    }
}
