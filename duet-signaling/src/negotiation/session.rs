use duet_core::{Candidate, Envelope, SessionDescription};

/// Live state of one offer/answer cycle. Replaced wholesale when a new
/// cycle starts; nothing carries over.
#[derive(Debug, Default)]
pub struct NegotiationSession {
    pub(crate) generation: u32,
    /// Offer re-creation with `ice_restart` on the existing transport.
    pub(crate) restart: bool,

    pub(crate) local_description: Option<SessionDescription>,
    pub(crate) remote_description: Option<SessionDescription>,
    pub(crate) remote_applied: bool,

    /// Every candidate gathered locally, in gathering order.
    pub(crate) local_candidates: Vec<Candidate>,
    pub(crate) gathering_complete: bool,
    /// Batch attached to the remote description, applied right after it.
    pub(crate) remote_batch: Vec<Candidate>,
    /// Individually sent remote candidates that beat the remote description.
    pub(crate) buffered_remote: Vec<Candidate>,

    pub(crate) offer_created: bool,
    pub(crate) offer_sent: bool,
    pub(crate) answer_created: bool,
    pub(crate) answer_sent: bool,
    pub(crate) remote_processed: bool,
    pub(crate) remote_media: bool,

    /// The description broadcast exactly as sent, for retransmission.
    pub(crate) sent_description: Option<Envelope>,
}

impl NegotiationSession {
    pub fn new(generation: u32) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn offer_created(&self) -> bool {
        self.offer_created
    }

    pub fn offer_sent(&self) -> bool {
        self.offer_sent
    }

    pub fn answer_sent(&self) -> bool {
        self.answer_sent
    }

    pub fn remote_processed(&self) -> bool {
        self.remote_processed
    }

    pub fn remote_applied(&self) -> bool {
        self.remote_applied
    }

    pub fn local_candidates(&self) -> &[Candidate] {
        &self.local_candidates
    }

    pub fn buffered_remote(&self) -> &[Candidate] {
        &self.buffered_remote
    }

    /// Whether the local side already sent its description with the batch.
    pub fn batch_sent(&self) -> bool {
        self.offer_sent || self.answer_sent
    }

    /// Nothing has happened in this session yet.
    pub fn is_pristine(&self) -> bool {
        !self.offer_created
            && !self.answer_created
            && !self.remote_processed
            && self.local_description.is_none()
            && self.local_candidates.is_empty()
    }
}
