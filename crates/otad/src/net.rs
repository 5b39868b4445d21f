//! Connectivity provider: bring the network link up within a bound.

use async_trait::async_trait;
use ota_common::config::NetworkConfig;
use std::process::Command;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Link establishment seam.
///
/// Exposes only "connected / not connected within the bound". Callers never
/// learn why a link failed; a missed check is a deferred one, not an error.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn ensure_link(&self, timeout: Duration) -> bool;
}

/// Production link provider.
///
/// Joins the configured network when credentials are present, then
/// TCP-probes a well-known address once a second until success or deadline.
pub struct NetLink {
    ssid: Option<String>,
    psk: Option<String>,
    probe_addr: String,
}

impl NetLink {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            ssid: config.ssid.clone(),
            psk: config.psk.clone(),
            probe_addr: config.probe_addr.clone(),
        }
    }

    /// Best-effort network join via nmcli. Already-connected and
    /// unavailable-tool cases are both non-fatal.
    fn join_network(&self) {
        let Some(ssid) = &self.ssid else {
            return;
        };

        let mut cmd = Command::new("nmcli");
        cmd.args(["device", "wifi", "connect", ssid]);
        if let Some(psk) = &self.psk {
            cmd.args(["password", psk]);
        }

        match cmd.output() {
            Ok(out) if out.status.success() => info!("Joined network {}", ssid),
            Ok(out) => warn!(
                "Network join failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ),
            Err(e) => warn!("nmcli not available: {}", e),
        }
    }
}

#[async_trait]
impl Connectivity for NetLink {
    async fn ensure_link(&self, timeout: Duration) -> bool {
        self.join_network();

        let deadline = Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, TcpStream::connect(self.probe_addr.as_str()))
                .await
            {
                Ok(Ok(_)) => {
                    debug!("Link up ({})", self.probe_addr);
                    return true;
                }
                Ok(Err(e)) => {
                    debug!("Link probe failed: {}", e);
                    if Instant::now() >= deadline {
                        return false;
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(_) => return false,
            }
        }
    }
}
