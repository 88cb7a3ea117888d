use crate::channel::{Relay, RelayEvent};
use crate::error::ChannelError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Default)]
struct Topic {
    subscribers: HashMap<String, mpsc::Sender<RelayEvent>>,
    present: BTreeSet<String>,
}

impl Topic {
    fn snapshot(&self) -> Vec<String> {
        self.present.iter().cloned().collect()
    }

    fn senders(&self) -> Vec<(String, mpsc::Sender<RelayEvent>)> {
        self.subscribers
            .iter()
            .map(|(key, tx)| (key.clone(), tx.clone()))
            .collect()
    }
}

#[derive(Default)]
struct MemoryRelayInner {
    topics: DashMap<String, Topic>,
    echo: AtomicBool,
    duplicate: AtomicBool,
    stalled: AtomicBool,
    unresponsive: bool,
}

/// In-process [`Relay`] with presence. Can echo broadcasts back to their
/// sender, deliver everything twice, or never acknowledge subscriptions
/// or broadcasts.
#[derive(Clone, Default)]
pub struct MemoryRelay {
    inner: Arc<MemoryRelayInner>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// A relay whose subscriptions are never acknowledged.
    pub fn unresponsive() -> Self {
        Self {
            inner: Arc::new(MemoryRelayInner {
                unresponsive: true,
                ..MemoryRelayInner::default()
            }),
        }
    }

    /// Deliver broadcasts to their sender too.
    pub fn set_echo(&self, enabled: bool) {
        self.inner.echo.store(enabled, Ordering::SeqCst);
    }

    /// Deliver every broadcast twice.
    pub fn set_duplicate(&self, enabled: bool) {
        self.inner.duplicate.store(enabled, Ordering::SeqCst);
    }

    /// Leave every later broadcast and unsubscribe pending forever.
    pub fn set_stalled(&self, enabled: bool) {
        self.inner.stalled.store(enabled, Ordering::SeqCst);
    }

    async fn stall(&self) {
        if self.inner.stalled.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
    }

    pub fn members(&self, topic: &str) -> Vec<String> {
        self.inner
            .topics
            .get(topic)
            .map(|t| t.snapshot())
            .unwrap_or_default()
    }

    /// Push a channel error to every subscriber of `topic`.
    pub async fn fail(&self, topic: &str, error: ChannelError) {
        let senders = self
            .inner
            .topics
            .get(topic)
            .map(|t| t.senders())
            .unwrap_or_default();
        for (_, tx) in senders {
            let _ = tx.send(RelayEvent::Error(error.clone())).await;
        }
    }

    async fn presence_changed(&self, topic: &str, change: RelayEvent) {
        let (snapshot, senders) = match self.inner.topics.get(topic) {
            Some(t) => (t.snapshot(), t.senders()),
            None => return,
        };
        for (_, tx) in senders {
            let _ = tx.send(change.clone()).await;
            let _ = tx.send(RelayEvent::Sync(snapshot.clone())).await;
        }
    }
}

#[async_trait]
impl Relay for MemoryRelay {
    async fn subscribe(
        &self,
        topic: &str,
        key: &str,
        events: mpsc::Sender<RelayEvent>,
    ) -> Result<(), ChannelError> {
        if self.inner.unresponsive {
            futures::future::pending::<()>().await;
        }
        debug!("{} subscribed to {}", key, topic);
        self.inner
            .topics
            .entry(topic.to_owned())
            .or_default()
            .subscribers
            .insert(key.to_owned(), events);
        Ok(())
    }

    async fn track(&self, topic: &str, key: &str) -> Result<(), ChannelError> {
        {
            let mut entry = self.inner.topics.get_mut(topic).ok_or_else(|| {
                ChannelError::ChannelError(format!("{key} is not subscribed to {topic}"))
            })?;
            if !entry.present.insert(key.to_owned()) {
                return Ok(());
            }
        }
        info!("{} is present on {}", key, topic);
        self.presence_changed(topic, RelayEvent::Join(key.to_owned()))
            .await;
        Ok(())
    }

    async fn broadcast(
        &self,
        topic: &str,
        key: &str,
        event: &str,
        payload: Value,
    ) -> Result<(), ChannelError> {
        self.stall().await;
        let senders = self
            .inner
            .topics
            .get(topic)
            .map(|t| t.senders())
            .ok_or(ChannelError::Closed)?;

        let echo = self.inner.echo.load(Ordering::SeqCst);
        let copies = if self.inner.duplicate.load(Ordering::SeqCst) {
            2
        } else {
            1
        };

        for (subscriber, tx) in senders {
            if subscriber == key && !echo {
                continue;
            }
            for _ in 0..copies {
                let _ = tx
                    .send(RelayEvent::Broadcast {
                        event: event.to_owned(),
                        payload: payload.clone(),
                    })
                    .await;
            }
        }
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str, key: &str) {
        self.stall().await;
        let was_present = {
            let Some(mut entry) = self.inner.topics.get_mut(topic) else {
                return;
            };
            entry.subscribers.remove(key);
            entry.present.remove(key)
        };
        debug!("{} unsubscribed from {}", key, topic);
        if was_present {
            self.presence_changed(topic, RelayEvent::Leave(key.to_owned()))
                .await;
        }
    }
}
