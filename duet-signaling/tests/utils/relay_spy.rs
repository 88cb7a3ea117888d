use async_trait::async_trait;
use duet_signaling::{ChannelError, MemoryRelay, Relay, RelayEvent};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// One broadcast seen by the spy.
#[derive(Debug, Clone)]
pub struct SentBroadcast {
    pub sender: String,
    pub event: String,
    pub payload: Value,
}

/// [`MemoryRelay`] wrapper that records every broadcast in send order.
#[derive(Clone)]
pub struct RelaySpy {
    relay: MemoryRelay,
    sent: Arc<Mutex<Vec<SentBroadcast>>>,
}

impl RelaySpy {
    pub fn new(relay: MemoryRelay) -> Self {
        Self {
            relay,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn relay(&self) -> &MemoryRelay {
        &self.relay
    }

    pub async fn sent(&self) -> Vec<SentBroadcast> {
        self.sent.lock().await.clone()
    }

    /// Event names broadcast by `sender`, in order.
    pub async fn events_from(&self, sender: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|b| b.sender == sender)
            .map(|b| b.event.clone())
            .collect()
    }

    pub async fn count(&self, event: &str) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|b| b.event == event)
            .count()
    }
}

#[async_trait]
impl Relay for RelaySpy {
    async fn subscribe(
        &self,
        topic: &str,
        key: &str,
        events: mpsc::Sender<RelayEvent>,
    ) -> Result<(), ChannelError> {
        self.relay.subscribe(topic, key, events).await
    }

    async fn track(&self, topic: &str, key: &str) -> Result<(), ChannelError> {
        self.relay.track(topic, key).await
    }

    async fn broadcast(
        &self,
        topic: &str,
        key: &str,
        event: &str,
        payload: Value,
    ) -> Result<(), ChannelError> {
        tracing::debug!("[RelaySpy] {} -> {}", key, event);
        self.sent.lock().await.push(SentBroadcast {
            sender: key.to_owned(),
            event: event.to_owned(),
            payload: payload.clone(),
        });
        self.relay.broadcast(topic, key, event, payload).await
    }

    async fn unsubscribe(&self, topic: &str, key: &str) {
        self.relay.unsubscribe(topic, key).await
    }
}
