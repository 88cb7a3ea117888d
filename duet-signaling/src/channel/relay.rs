use crate::error::ChannelError;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Raw delivery from a relay subscription, before decoding.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// Full membership snapshot.
    Sync(Vec<String>),
    Join(String),
    Leave(String),
    Broadcast { event: String, payload: Value },
    Error(ChannelError),
}

/// A pub/sub service with presence, scoped by topic. Broadcasts are
/// at-most-once and unordered; the relay never retries on its own.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Resolves once the relay acknowledged the subscription.
    async fn subscribe(
        &self,
        topic: &str,
        key: &str,
        events: mpsc::Sender<RelayEvent>,
    ) -> Result<(), ChannelError>;

    /// Announce `key` as present on `topic`.
    async fn track(&self, topic: &str, key: &str) -> Result<(), ChannelError>;

    async fn broadcast(
        &self,
        topic: &str,
        key: &str,
        event: &str,
        payload: Value,
    ) -> Result<(), ChannelError>;

    async fn unsubscribe(&self, topic: &str, key: &str);
}
