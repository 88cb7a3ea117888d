use crate::channel::{ChannelEvent, Relay, RelayEvent};
use crate::error::ChannelError;
use duet_core::{Envelope, ParticipantId, RoomId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 256;

/// One participant's subscription to a room topic on a [`Relay`].
pub struct SignalingChannel {
    relay: Arc<dyn Relay>,
    room: RoomId,
    local: ParticipantId,
    timeout: Duration,
    left: AtomicBool,
    forwarder: JoinHandle<()>,
}

impl SignalingChannel {
    /// Subscribe, then announce presence once the relay acknowledged.
    /// Every relay call this channel makes is bounded by `timeout`.
    pub async fn join(
        relay: Arc<dyn Relay>,
        room: RoomId,
        local: ParticipantId,
        timeout: Duration,
    ) -> Result<(Self, mpsc::Receiver<ChannelEvent>), ChannelError> {
        let topic = room.topic();
        let (relay_tx, relay_rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::time::timeout(timeout, relay.subscribe(&topic, local.as_str(), relay_tx))
            .await
            .map_err(|_| {
                warn!("Subscribing to {} timed out after {:?}", topic, timeout);
                ChannelError::TimedOut
            })??;

        tokio::time::timeout(timeout, relay.track(&topic, local.as_str()))
            .await
            .map_err(|_| ChannelError::TimedOut)??;

        info!("Participant {} joined {}", local, topic);

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let forwarder = tokio::spawn(forward(relay_rx, tx));

        Ok((
            Self {
                relay,
                room,
                local,
                timeout,
                left: AtomicBool::new(false),
                forwarder,
            },
            rx,
        ))
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn local(&self) -> &ParticipantId {
        &self.local
    }

    /// At-most-once broadcast to the room.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), ChannelError> {
        if self.left.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        let payload = envelope
            .to_payload()
            .map_err(|e| ChannelError::ChannelError(e.to_string()))?;
        debug!("{} -> {} ({})", self.local, envelope.event_name(), envelope.id);
        let topic = self.room.topic();
        let broadcast = self.relay.broadcast(
            &topic,
            self.local.as_str(),
            envelope.event_name(),
            payload,
        );
        tokio::time::timeout(self.timeout, broadcast)
            .await
            .map_err(|_| {
                warn!(
                    "Broadcasting {} timed out after {:?}",
                    envelope.event_name(),
                    self.timeout
                );
                ChannelError::TimedOut
            })?
    }

    pub async fn leave(&self) {
        if self.left.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Participant {} leaving {}", self.local, self.room);
        let topic = self.room.topic();
        let unsubscribe = self.relay.unsubscribe(&topic, self.local.as_str());
        if tokio::time::timeout(self.timeout, unsubscribe).await.is_err() {
            warn!(
                "Unsubscribing {} from {} timed out after {:?}",
                self.local, self.room, self.timeout
            );
        }
        self.forwarder.abort();
    }
}

impl Drop for SignalingChannel {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

async fn forward(mut relay_rx: mpsc::Receiver<RelayEvent>, tx: mpsc::Sender<ChannelEvent>) {
    while let Some(event) = relay_rx.recv().await {
        let event = match event {
            RelayEvent::Sync(keys) => {
                ChannelEvent::PresenceSync(keys.into_iter().map(ParticipantId::from).collect())
            }
            RelayEvent::Join(key) => ChannelEvent::PresenceJoin(ParticipantId::from(key)),
            RelayEvent::Leave(key) => ChannelEvent::PresenceLeave(ParticipantId::from(key)),
            RelayEvent::Broadcast { event, payload } => match Envelope::decode(&event, payload) {
                Ok(envelope) => ChannelEvent::Message(envelope),
                Err(e) => {
                    warn!("Dropping malformed '{}' broadcast: {}", event, e);
                    continue;
                }
            },
            RelayEvent::Error(e) => ChannelEvent::Error(e),
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }
}
