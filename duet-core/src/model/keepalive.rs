use serde::{Deserialize, Serialize};

/// Packets exchanged on the keepalive data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeepalivePacket {
    Ping { timestamp: u64 },
    Pong { timestamp: u64 },
}
