//! Configuration for the relay daemon
//!
//! Defaults mirror a stock Savant host install: the service implementation
//! database and status files live under the RPM user's GNUstep tree, the UIS
//! and the Lutron processor are reachable on the loopback/LAN, and the relay
//! listens on 8081. Everything is overridable from a TOML file or the CLI.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level relay configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP request server
    pub http: HttpConfig,

    /// Service implementation database
    pub directory: DirectoryConfig,

    /// UIS command endpoint and its discovery
    pub control: ControlConfig,

    /// Lutron lighting controller session
    pub lighting: LightingConfig,

    /// Status file directory watch
    pub watcher: WatcherConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub listen_address: String,

    /// Listen port
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

/// Service directory store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Path to the read-only service implementation SQLite database
    pub db_path: PathBuf,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(
                "/home/RPM/GNUstep/Library/ApplicationSupport/RacePointMedia/serviceImplementation.sqlite",
            ),
        }
    }
}

/// UIS control endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Host the UIS runs on
    pub host: String,

    /// Static UIS port; skips discovery entirely when set
    pub port: Option<u16>,

    /// mDNS service type advertised by the UIS
    pub service_type: String,

    /// Upper bound on the one-shot discovery lookup
    #[serde(with = "humantime_serde")]
    pub discovery_timeout: Duration,

    /// Port used when discovery times out or fails
    pub fallback_port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: None,
            service_type: "_uis_ssp._udp.local.".to_string(),
            discovery_timeout: Duration::from_secs(3),
            fallback_port: 45600,
        }
    }
}

/// Lutron lighting session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Lighting processor host
    pub host: String,

    /// Telnet port
    pub port: u16,

    /// Login sent in response to the processor's prompt
    pub password: String,

    /// Upper bound on connect + login handshake
    #[serde(with = "humantime_serde")]
    pub handshake_timeout: Duration,

    /// Fixed delay before each reconnect attempt
    #[serde(with = "humantime_serde")]
    pub reconnect_delay: Duration,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.50".to_string(),
            port: 23,
            password: "lutron".to_string(),
            handshake_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(10),
        }
    }
}

/// Status file watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Directory of status files rewritten by the host processes
    pub status_dir: PathBuf,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            status_dir: PathBuf::from(
                "/home/RPM/GNUstep/Library/ApplicationSupport/RacePointMedia/status",
            ),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| RelayError::config(format!("invalid config {}: {e}", path.display())))
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<()> {
        if self.http.port == 0 {
            return Err(RelayError::config("http.port must be nonzero"));
        }
        if self.directory.db_path.as_os_str().is_empty() {
            return Err(RelayError::config("directory.db_path must be set"));
        }
        if self.control.fallback_port == 0 {
            return Err(RelayError::config("control.fallback_port must be nonzero"));
        }
        if self.lighting.port == 0 {
            return Err(RelayError::config("lighting.port must be nonzero"));
        }
        if self.control.discovery_timeout.is_zero() {
            return Err(RelayError::config(
                "control.discovery_timeout must be nonzero",
            ));
        }
        Ok(())
    }
}
