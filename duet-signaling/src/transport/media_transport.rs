use crate::error::TransportError;
use crate::transport::TransportEvent;
use async_trait::async_trait;
use duet_core::{Candidate, Role, SdpKind, SessionDescription};
use tokio::sync::mpsc;

/// The media engine as seen by the call: it creates descriptions, applies
/// remote ones and candidates, and reports progress through the
/// [`TransportEvent`] sender it was created with.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    fn instance(&self) -> u64;

    /// Create and set the local offer or answer.
    async fn create_local_description(
        &self,
        kind: SdpKind,
        ice_restart: bool,
    ) -> Result<SessionDescription, TransportError>;

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError>;

    async fn apply_candidate(&self, candidate: Candidate) -> Result<(), TransportError>;

    /// Discard gathered candidates; the next offer re-probes the network.
    async fn restart_path_discovery(&self) -> Result<(), TransportError>;

    async fn stop_local_media(&self);

    async fn close(&self) -> Result<(), TransportError>;
}

#[async_trait]
pub trait MediaTransportFactory: Send + Sync {
    async fn create(
        &self,
        instance: u64,
        role: Role,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn MediaTransport>, TransportError>;
}
