//! One-shot mDNS discovery of the UIS command endpoint
//!
//! The UIS advertises its datagram port over Bonjour under a site-specific
//! service type. The lookup runs at most once per process, bounded by a
//! timeout, and any failure falls back to the well-known port the UIS binds
//! when it cannot register with the responder. There is no re-resolution:
//! if the UIS restarts on a different port, the relay must be restarted too.

use crate::config::ControlConfig;
use crate::error::{RelayError, Result};
use mdns_sd::{ServiceDaemon, ServiceEvent};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Resolver for the UIS datagram port
#[derive(Debug, Clone)]
pub struct UisDiscovery {
    service_type: String,
    timeout: Duration,
    fallback_port: u16,
}

impl UisDiscovery {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            service_type: config.service_type.clone(),
            timeout: config.discovery_timeout,
            fallback_port: config.fallback_port,
        }
    }

    /// Resolve the UIS port, falling back on timeout or lookup failure.
    ///
    /// Infallible by design: the original relay treated every discovery
    /// problem as "use the fallback port", and callers memoize whatever
    /// this returns for the rest of the process lifetime.
    pub async fn resolve(&self) -> u16 {
        match self.browse().await {
            Ok(Some(port)) => {
                info!("discovered UIS port {port} via {}", self.service_type);
                port
            }
            Ok(None) => {
                info!(
                    "no UIS advertisement within {:?}, using fallback port {}",
                    self.timeout, self.fallback_port
                );
                self.fallback_port
            }
            Err(e) => {
                warn!("UIS discovery failed: {e}; using fallback port {}", self.fallback_port);
                self.fallback_port
            }
        }
    }

    /// Browse for the first resolved advertisement within the timeout
    async fn browse(&self) -> Result<Option<u16>> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| RelayError::discovery(format!("mDNS daemon: {e}")))?;
        let receiver = daemon
            .browse(&self.service_type)
            .map_err(|e| RelayError::discovery(format!("browse {}: {e}", self.service_type)))?;

        let port = tokio::time::timeout(self.timeout, async {
            loop {
                match receiver.recv_async().await {
                    Ok(ServiceEvent::ServiceResolved(info)) => {
                        return Some(info.get_port());
                    }
                    Ok(event) => debug!("mDNS event: {event:?}"),
                    Err(_) => return None,
                }
            }
        })
        .await
        .unwrap_or(None);

        daemon.shutdown().ok();
        Ok(port)
    }
}
