use duet_core::IceServerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for [`WebRtcTransport`](crate::WebRtcTransport).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
    pub keepalive_interval_ms: u64,
    /// Silence on the keepalive channel longer than this marks the peer unresponsive.
    pub keepalive_timeout_ms: u64,
}

impl TransportConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms.max(1))
    }

    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_millis(self.keepalive_timeout_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec!["stun:stun.l.google.com:19302".to_owned()],
                username: None,
                credential: None,
            }],
            keepalive_interval_ms: 2_000,
            keepalive_timeout_ms: 6_000,
        }
    }
}
