//! # Connectivity Monitor
//!
//! Answers one question: can we reach the network right now?
//!
//! ```text
//!   TcpProbe::probe()
//!        │
//!        ▼
//!   timeout(3s, TcpStream::connect("8.8.8.8:53"))
//!        │
//!        ├── connected      → drop stream → true
//!        ├── refused/DNS    → false
//!        └── elapsed        → false
//! ```
//!
//! The probe never returns an error. Every failure is just "offline".

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

/// Reachability check used by the sync engine.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// TCP connect probe against a well-known endpoint.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        TcpProbe {
            addr: addr.into(),
            timeout,
        }
    }

    pub fn from_config(config: &crate::MedinvConfig) -> Self {
        Self::new(config.sync.probe_addr.clone(), config.sync.probe_timeout())
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn probe(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!(addr = %self.addr, error = %e, "Connectivity probe failed");
                false
            }
            Err(_) => {
                debug!(addr = %self.addr, timeout_ms = self.timeout.as_millis() as u64, "Connectivity probe timed out");
                false
            }
        }
    }
}
