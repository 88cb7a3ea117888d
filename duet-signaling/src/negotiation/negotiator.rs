use crate::call::{Effect, NegotiationStep, TimerKind, TimerSlot};
use crate::negotiation::session::NegotiationSession;
use duet_core::{
    AnswerPayload, Candidate, CandidatePayload, Envelope, OfferPayload, ParticipantId, SdpKind,
    SessionDescription, SignalMessage,
};
use std::mem;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How an inbound offer was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    Accepted,
    /// Belongs to an older session.
    Stale,
    /// This session already processed an offer.
    Duplicate,
}

/// Drives the offer/answer/candidate exchange for the current
/// [`NegotiationSession`]. The organizer offers, the joiner answers.
#[derive(Debug)]
pub struct Negotiator {
    local: ParticipantId,
    gathering_timeout: Duration,
    session: NegotiationSession,
    next_generation: u32,
    pending_offer: Option<OfferPayload>,
    /// Candidates tagged with a session that has not started here yet.
    early_candidates: Vec<(u32, Candidate)>,
}

impl Negotiator {
    pub fn new(local: ParticipantId, gathering_timeout: Duration) -> Self {
        Self {
            local,
            gathering_timeout,
            session: NegotiationSession::new(0),
            next_generation: 1,
            pending_offer: None,
            early_candidates: Vec::new(),
        }
    }

    pub fn session(&self) -> &NegotiationSession {
        &self.session
    }

    pub fn generation(&self) -> u32 {
        self.session.generation
    }

    /// Organizer: replace the live session with a new generation.
    pub fn start_session(&mut self, restart: bool) -> u32 {
        let generation = self.next_generation.max(self.session.generation + 1);
        self.next_generation = generation + 1;
        self.replace_session(generation);
        self.session.restart = restart;
        generation
    }

    /// Drop the session, any buffered offer and held candidates.
    pub fn reset(&mut self) {
        debug!("Resetting negotiation (was session {})", self.session.generation);
        self.session = NegotiationSession::new(0);
        self.pending_offer = None;
        self.early_candidates.clear();
    }

    fn replace_session(&mut self, generation: u32) {
        debug!(
            "Negotiation session {} replaces {}",
            generation, self.session.generation
        );
        self.session = NegotiationSession::new(generation);

        for (tagged, candidate) in mem::take(&mut self.early_candidates) {
            if tagged == generation {
                self.session.buffered_remote.push(candidate);
            } else if tagged > generation {
                self.early_candidates.push((tagged, candidate));
            }
        }
    }

    /// Organizer: request the offer for this session. One-shot until the
    /// session is replaced or creation fails.
    pub fn create_offer(&mut self, fx: &mut Vec<Effect>) -> bool {
        if self.session.offer_created {
            debug!(
                "Offer already created for session {}",
                self.session.generation
            );
            return false;
        }
        self.session.offer_created = true;
        fx.push(Effect::CreateOffer {
            generation: self.session.generation,
            ice_restart: self.session.restart,
        });
        true
    }

    pub fn on_local_description(
        &mut self,
        generation: u32,
        description: SessionDescription,
        fx: &mut Vec<Effect>,
    ) {
        if generation != self.session.generation {
            debug!(
                "Ignoring local description for session {} (current {})",
                generation, self.session.generation
            );
            return;
        }
        if self.session.local_description.is_some() {
            debug!("Local description already set for session {}", generation);
            return;
        }

        self.session.local_description = Some(description);
        if self.session.gathering_complete {
            self.send_description(fx);
        } else {
            fx.push(Effect::ScheduleTimer {
                timer: TimerKind::GatheringDeadline { generation },
                after: self.gathering_timeout,
            });
        }
    }

    pub fn on_local_candidate(&mut self, candidate: Candidate, fx: &mut Vec<Effect>) {
        if self.session.batch_sent() {
            let message = SignalMessage::IceCandidate(CandidatePayload {
                candidate: candidate.clone(),
                from: self.local.clone(),
                session: Some(self.session.generation),
            });
            fx.push(Effect::Broadcast(Envelope::new(message)));
        }
        self.session.local_candidates.push(candidate);
    }

    pub fn on_gathering_complete(&mut self, fx: &mut Vec<Effect>) {
        self.session.gathering_complete = true;
        if self.session.local_description.is_some() {
            self.send_description(fx);
        }
    }

    pub fn on_gathering_deadline(&mut self, generation: u32, fx: &mut Vec<Effect>) {
        if generation != self.session.generation || self.session.batch_sent() {
            return;
        }
        debug!(
            "Gathering window elapsed with {} candidates",
            self.session.local_candidates.len()
        );
        self.send_description(fx);
    }

    fn send_description(&mut self, fx: &mut Vec<Effect>) {
        if self.session.batch_sent() {
            return;
        }
        let Some(description) = self.session.local_description.clone() else {
            return;
        };

        let candidates = self.session.local_candidates.clone();
        let count = candidates.len();
        let session = Some(self.session.generation);
        let message = match description.kind {
            SdpKind::Offer => {
                self.session.offer_sent = true;
                SignalMessage::WebrtcOffer(OfferPayload {
                    offer: description,
                    candidates,
                    from: self.local.clone(),
                    session,
                    restart: self.session.restart,
                })
            }
            SdpKind::Answer => {
                self.session.answer_sent = true;
                SignalMessage::WebrtcAnswer(AnswerPayload {
                    answer: description,
                    candidates,
                    from: self.local.clone(),
                    session,
                })
            }
        };

        info!(
            "Sending {} for session {} with {} candidates",
            message.event_name(),
            self.session.generation,
            count
        );
        let envelope = Envelope::new(message);
        self.session.sent_description = Some(envelope.clone());
        fx.push(Effect::CancelTimer(TimerSlot::Gathering));
        fx.push(Effect::Broadcast(envelope));
    }

    /// The description broadcast for this session, unchanged (same id).
    pub fn retransmission(&self) -> Option<&Envelope> {
        self.session.sent_description.as_ref()
    }

    /// Joiner: hold an offer that arrived before approval. Latest wins.
    pub fn buffer_offer(&mut self, offer: OfferPayload) {
        if let Some(previous) = self.pending_offer.replace(offer) {
            debug!(
                "Buffered offer for session {:?} replaced",
                previous.session
            );
        }
    }

    pub fn take_buffered_offer(&mut self) -> Option<OfferPayload> {
        self.pending_offer.take()
    }

    pub fn has_buffered_offer(&self) -> bool {
        self.pending_offer.is_some()
    }

    /// Joiner: process an offer. Newer sessions replace the current one.
    pub fn on_offer(&mut self, offer: OfferPayload, fx: &mut Vec<Effect>) -> OfferOutcome {
        let current = self.session.generation;
        let generation = offer.session.unwrap_or(current);

        if generation < current {
            debug!("Stale offer for session {} (current {})", generation, current);
            return OfferOutcome::Stale;
        }
        if generation == current && self.session.remote_processed {
            debug!("Offer for session {} already processed", generation);
            return OfferOutcome::Duplicate;
        }
        if generation > current {
            let reset_transport = !offer.restart && !self.session.is_pristine();
            self.replace_session(generation);
            self.session.restart = offer.restart;
            if reset_transport {
                fx.push(Effect::ResetTransport);
            }
        }

        self.session.remote_processed = true;
        self.session.remote_description = Some(offer.offer.clone());
        self.session.remote_batch = offer.candidates;
        fx.push(Effect::SetRemoteDescription {
            generation,
            description: offer.offer,
        });
        OfferOutcome::Accepted
    }

    /// Organizer: process the answer to this session's offer.
    pub fn on_answer(&mut self, answer: AnswerPayload, fx: &mut Vec<Effect>) -> bool {
        let current = self.session.generation;
        let generation = answer.session.unwrap_or(current);

        if generation != current {
            debug!("Stale answer for session {} (current {})", generation, current);
            return false;
        }
        if !self.session.offer_sent {
            warn!("Answer for session {} before an offer was sent", generation);
            return false;
        }
        if self.session.remote_processed {
            debug!("Answer for session {} already processed", generation);
            return false;
        }

        self.session.remote_processed = true;
        self.session.remote_description = Some(answer.answer.clone());
        self.session.remote_batch = answer.candidates;
        fx.push(Effect::SetRemoteDescription {
            generation,
            description: answer.answer,
        });
        true
    }

    pub fn on_remote_candidate(&mut self, payload: CandidatePayload, fx: &mut Vec<Effect>) {
        let current = self.session.generation;
        let generation = payload.session.unwrap_or(current);

        if generation < current {
            debug!("Dropping candidate from session {}", generation);
        } else if generation > current {
            self.early_candidates.push((generation, payload.candidate));
        } else if self.session.remote_applied {
            fx.push(Effect::ApplyCandidate(payload.candidate));
        } else {
            self.session.buffered_remote.push(payload.candidate);
        }
    }

    /// The remote description is set: flush the attached batch, then the
    /// buffered candidates in arrival order. A joiner then creates its answer.
    pub fn on_remote_applied(&mut self, generation: u32, fx: &mut Vec<Effect>) -> Option<SdpKind> {
        if generation != self.session.generation || self.session.remote_applied {
            return None;
        }
        let kind = self.session.remote_description.as_ref()?.kind;
        self.session.remote_applied = true;

        let batch = mem::take(&mut self.session.remote_batch);
        let buffered = mem::take(&mut self.session.buffered_remote);
        debug!(
            "Remote {:?} applied; flushing {} batched and {} buffered candidates",
            kind,
            batch.len(),
            buffered.len()
        );
        fx.extend(batch.into_iter().chain(buffered).map(Effect::ApplyCandidate));

        if kind == SdpKind::Offer && !self.session.answer_created {
            self.session.answer_created = true;
            fx.push(Effect::CreateAnswer { generation });
        }
        Some(kind)
    }

    /// Reset the guard of the failed step so it can run again.
    pub fn on_failure(&mut self, generation: u32, step: NegotiationStep) -> bool {
        if generation != self.session.generation {
            return false;
        }
        match step {
            NegotiationStep::CreateOffer => self.session.offer_created = false,
            NegotiationStep::CreateAnswer => self.session.answer_created = false,
            NegotiationStep::ApplyRemote => {
                self.session.remote_processed = false;
                self.session.remote_applied = false;
                self.session.remote_description = None;
                self.session.remote_batch.clear();
            }
        }
        true
    }

    /// First remote media of this session?
    pub fn mark_remote_media(&mut self) -> bool {
        !mem::replace(&mut self.session.remote_media, true)
    }
}
