use crate::approval::{ApprovalGate, ApprovalState, RequestOutcome};
use crate::call::{CallEvent, CallNotification, Effect, ExitReason, NegotiationStep, TimerKind, TimerSlot};
use crate::config::CallConfig;
use crate::lifecycle::{SessionTimer, TimerSignal};
use crate::negotiation::{Negotiator, OfferOutcome};
use crate::recovery::{HealthSignal, RecoveryController, RecoveryDecision, RecoveryKind, Regression};
use crate::role::{Election, RoleArbiter};
use duet_core::{
    AnswerPayload, CandidatePayload, ConnectionStatus, Envelope, JoinPayload, MessageId,
    OfferPayload, ParticipantId, RejectReason, Role, RoomId, SignalMessage,
};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const ALL_TIMERS: [TimerSlot; 4] = [
    TimerSlot::Handshake,
    TimerSlot::Gathering,
    TimerSlot::Negotiation,
    TimerSlot::Retry,
];

/// One participant's call as a sans-IO state machine. Every input is a
/// [`CallEvent`]; every side effect comes back as an [`Effect`] for the
/// caller to execute in order.
pub struct Call {
    config: CallConfig,
    room: RoomId,
    local: ParticipantId,
    presence: BTreeSet<ParticipantId>,
    arbiter: RoleArbiter,
    role: Role,
    peer: Option<ParticipantId>,
    gate: ApprovalGate,
    approval: ApprovalState,
    negotiator: Negotiator,
    recovery: RecoveryController,
    timer: SessionTimer,
    status: ConnectionStatus,
    /// Message ids delivered during the session `seen_generation`.
    seen: HashSet<MessageId>,
    seen_generation: u32,
    handshake_round: u32,
    closed: bool,
}

impl Call {
    pub fn new(local: ParticipantId, room: RoomId, config: CallConfig) -> Self {
        Self {
            arbiter: RoleArbiter::new(local.clone()),
            negotiator: Negotiator::new(local.clone(), config.gathering_timeout()),
            recovery: RecoveryController::new(config.retry.clone()),
            timer: SessionTimer::new(config.session.clone()),
            config,
            room,
            local,
            presence: BTreeSet::new(),
            role: Role::Undetermined,
            peer: None,
            gate: ApprovalGate::new(),
            approval: ApprovalState::Unrequested,
            status: ConnectionStatus::Initializing,
            seen: HashSet::new(),
            seen_generation: 0,
            handshake_round: 0,
            closed: false,
        }
    }

    pub fn local(&self) -> &ParticipantId {
        &self.local
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn peer(&self) -> Option<&ParticipantId> {
        self.peer.as_ref()
    }

    /// Joiner-side view of its own approval.
    pub fn approval(&self) -> ApprovalState {
        self.approval
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    pub fn recovery(&self) -> &RecoveryController {
        &self.recovery
    }

    pub fn session_timer(&self) -> &SessionTimer {
        &self.timer
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn apply(&mut self, event: CallEvent) -> Vec<Effect> {
        let mut fx = Vec::new();
        if self.closed {
            debug!("{} ignoring {:?} after teardown", self.local, event);
            return fx;
        }

        match event {
            CallEvent::PresenceSync(members) => {
                self.presence = members.into_iter().collect();
                self.on_presence(&mut fx);
            }
            CallEvent::PresenceJoin(id) => {
                if self.presence.insert(id) {
                    self.on_presence(&mut fx);
                }
            }
            CallEvent::PresenceLeave(id) => {
                if self.presence.remove(&id) {
                    self.on_presence_left(&id, &mut fx);
                    self.on_presence(&mut fx);
                }
            }
            CallEvent::Message(envelope) => self.on_message(envelope, &mut fx),
            CallEvent::ChannelFailed(e) => {
                error!("Signaling channel failed for {}: {}", self.local, e);
                self.exit(ExitReason::ChannelFailed(e), &mut fx);
            }

            CallEvent::ApprovalDecision { joiner, approved } => {
                self.on_decision(joiner, approved, &mut fx)
            }
            CallEvent::ExtendSession => match self.timer.extend() {
                Some(limit) => fx.push(Effect::Notify(CallNotification::SessionExtended { limit })),
                None => debug!("Session already expired, extension ignored"),
            },
            CallEvent::Leave => self.exit(ExitReason::Left, &mut fx),

            CallEvent::LocalDescriptionCreated {
                generation,
                description,
            } => self
                .negotiator
                .on_local_description(generation, description, &mut fx),
            CallEvent::RemoteDescriptionApplied { generation } => {
                self.negotiator.on_remote_applied(generation, &mut fx);
            }
            CallEvent::NegotiationFailed {
                generation,
                step,
                reason,
            } => self.on_negotiation_failed(generation, step, reason, &mut fx),

            CallEvent::CandidateGathered(candidate) => {
                self.negotiator.on_local_candidate(candidate, &mut fx)
            }
            CallEvent::GatheringComplete => self.negotiator.on_gathering_complete(&mut fx),
            CallEvent::TransportState(state) => {
                let signal = self.recovery.observe_transport(state);
                self.on_health(signal, &mut fx);
            }
            CallEvent::PathState(state) => {
                let signal = self.recovery.observe_path(state);
                self.on_health(signal, &mut fx);
            }
            CallEvent::RemoteMediaAvailable => {
                if self.negotiator.mark_remote_media() {
                    fx.push(Effect::Notify(CallNotification::RemoteMediaAvailable));
                }
            }
            // Heuristic only: never a regression on its own.
            CallEvent::KeepaliveLost => {
                fx.push(Effect::Notify(CallNotification::PeerUnresponsive))
            }
            CallEvent::KeepaliveRestored => {
                fx.push(Effect::Notify(CallNotification::PeerResponsive))
            }

            CallEvent::TimerFired(timer) => self.on_timer(timer, &mut fx),
            CallEvent::Tick(delta) => self.on_tick(delta, &mut fx),
        }
        fx
    }

    fn set_status(&mut self, status: ConnectionStatus, fx: &mut Vec<Effect>) {
        if self.status == status {
            return;
        }
        info!("{}: {} -> {}", self.local, self.status, status);
        self.status = status;
        fx.push(Effect::Notify(CallNotification::StatusChanged(status)));
    }

    fn broadcast(&self, message: SignalMessage, fx: &mut Vec<Effect>) {
        fx.push(Effect::Broadcast(Envelope::new(message)));
    }

    fn from_peer(&self, sender: &ParticipantId) -> bool {
        self.peer.as_ref() == Some(sender)
    }

    // Presence

    fn on_presence(&mut self, fx: &mut Vec<Effect>) {
        let election = self.arbiter.evaluate(&self.presence);
        if election.role != self.role {
            info!("{} is {} ({} present)", self.local, election.role, election.members);
            self.role = election.role;
            fx.push(Effect::Notify(CallNotification::RoleAssigned(self.role)));
        }
        if self.role == Role::Undetermined {
            return;
        }
        if self.status == ConnectionStatus::Initializing {
            self.set_status(ConnectionStatus::WaitingForParticipant, fx);
        }

        match self.role {
            Role::Organizer => self.gate.approve_self(&self.local),
            Role::Joiner => self.request_to_join(&election, fx),
            Role::Undetermined => {}
        }
    }

    fn request_to_join(&mut self, election: &Election, fx: &mut Vec<Effect>) {
        if election.members < 2
            || self.status != ConnectionStatus::WaitingForParticipant
            || self.approval != ApprovalState::Unrequested
        {
            return;
        }
        let Some(organizer) = election.organizer.clone() else {
            return;
        };

        self.approval.request();
        info!("{} asking {} to join", self.local, organizer);
        self.peer = Some(organizer);
        self.broadcast(
            SignalMessage::JoinRequest(JoinPayload::from_joiner(self.local.clone())),
            fx,
        );
        self.set_status(ConnectionStatus::RequestingApproval, fx);
        self.arm_handshake(fx);
    }

    fn on_presence_left(&mut self, id: &ParticipantId, fx: &mut Vec<Effect>) {
        if !self.from_peer(id) {
            self.gate.forget(id);
            return;
        }
        if self.status.is_connected() {
            info!("Peer {} left presence while connected", id);
            return;
        }
        self.abandon_peer(fx);
    }

    /// Drop the current peer and everything negotiated with it.
    fn abandon_peer(&mut self, fx: &mut Vec<Effect>) {
        info!("{} abandoning negotiation with {:?}", self.local, self.peer);
        if let Some(peer) = self.peer.take() {
            self.gate.forget(&peer);
        }
        self.approval = ApprovalState::Unrequested;
        self.arbiter.unpin();
        self.negotiator.reset();
        self.recovery.reset();
        self.timer.stop();
        self.seen.clear();
        self.seen_generation = 0;
        self.handshake_round = 0;
        self.cancel_timers(fx);
        fx.push(Effect::ResetTransport);
        self.set_status(ConnectionStatus::WaitingForParticipant, fx);
    }

    // Messages

    fn on_message(&mut self, envelope: Envelope, fx: &mut Vec<Effect>) {
        let Envelope { id, message, .. } = envelope;
        if message.sender() == Some(&self.local) {
            debug!("{} ignoring own {}", self.local, message.event_name());
            return;
        }
        self.scope_dedupe(None);
        if !self.seen.insert(id) {
            debug!("{} ignoring duplicate {} {}", self.local, message.event_name(), id);
            return;
        }

        match message {
            SignalMessage::JoinRequest(payload) => self.on_join_request(payload, fx),
            SignalMessage::JoinApproved(payload) => self.on_join_decision(payload, true, fx),
            SignalMessage::JoinRejected(payload) => self.on_join_decision(payload, false, fx),
            SignalMessage::JoinerReady(payload) => self.on_joiner_ready(payload, fx),
            SignalMessage::WebrtcOffer(payload) => self.on_offer(payload, fx),
            SignalMessage::WebrtcAnswer(payload) => self.on_answer(payload, fx),
            SignalMessage::IceCandidate(payload) => self.on_remote_candidate(payload, fx),
        }
        self.scope_dedupe(Some(id));
    }

    /// Forget ids from earlier negotiation sessions once a new one is live.
    /// `keep` survives the reset so the message that opened the session
    /// stays deduplicated.
    fn scope_dedupe(&mut self, keep: Option<MessageId>) {
        let generation = self.negotiator.generation();
        if generation == self.seen_generation {
            return;
        }
        debug!(
            "{} dropping {} remembered ids from session {}",
            self.local,
            self.seen.len(),
            self.seen_generation
        );
        self.seen.clear();
        self.seen_generation = generation;
        if let Some(id) = keep {
            self.seen.insert(id);
        }
    }

    fn on_join_request(&mut self, payload: JoinPayload, fx: &mut Vec<Effect>) {
        if self.role != Role::Organizer {
            debug!("{} is {}, ignoring join request", self.local, self.role);
            return;
        }
        let joiner = payload.joiner_id;
        match self.gate.on_request(&joiner) {
            RequestOutcome::Prompt => {
                info!("Join request from {}", joiner);
                self.arbiter.pin(Role::Organizer);
                self.peer = Some(joiner.clone());
                fx.push(Effect::Notify(CallNotification::ApprovalRequested(joiner)));
            }
            RequestOutcome::AwaitingDecision => {
                debug!("Still waiting on a decision for {}", joiner)
            }
            RequestOutcome::AlreadyApproved => self.send_decision(joiner, None, fx),
            RequestOutcome::AlreadyRejected => {
                self.send_decision(joiner, Some(RejectReason::Declined), fx)
            }
            RequestOutcome::OverCapacity => {
                self.send_decision(joiner, Some(RejectReason::RoomFull), fx)
            }
        }
    }

    fn send_decision(
        &self,
        joiner: ParticipantId,
        rejection: Option<RejectReason>,
        fx: &mut Vec<Effect>,
    ) {
        let mut payload = JoinPayload::from_organizer(joiner, self.local.clone());
        let message = match rejection {
            None => SignalMessage::JoinApproved(payload),
            Some(reason) => {
                payload.reason = Some(reason);
                SignalMessage::JoinRejected(payload)
            }
        };
        self.broadcast(message, fx);
    }

    fn on_decision(&mut self, joiner: ParticipantId, approved: bool, fx: &mut Vec<Effect>) {
        if self.role != Role::Organizer {
            warn!("{} is not organizing, ignoring decision for {}", self.local, joiner);
            return;
        }
        match self.gate.decide(&joiner, approved) {
            Err(e) => warn!("Ignoring decision: {}", e),
            Ok(ApprovalState::Approved) => {
                info!("{} approved", joiner);
                self.send_decision(joiner, None, fx);
                self.set_status(ConnectionStatus::Signaling, fx);
            }
            Ok(_) => {
                info!("{} rejected", joiner);
                if self.from_peer(&joiner) {
                    self.peer = None;
                    self.arbiter.unpin();
                }
                self.send_decision(joiner, Some(RejectReason::Declined), fx);
            }
        }
    }

    fn on_join_decision(&mut self, payload: JoinPayload, approved: bool, fx: &mut Vec<Effect>) {
        if payload.joiner_id != self.local {
            return;
        }
        if let (Some(from), Some(peer)) = (&payload.from, &self.peer) {
            if from != peer {
                warn!("Decision from {} who is not the organizer {}", from, peer);
                return;
            }
        }
        if !self.approval.resolve(approved) {
            debug!("{} already decided ({:?})", self.local, self.approval);
            return;
        }

        fx.push(Effect::CancelTimer(TimerSlot::Handshake));
        self.handshake_round = 0;

        if approved {
            info!("{} approved to join", self.local);
            self.arbiter.pin(Role::Joiner);
            self.set_status(ConnectionStatus::Signaling, fx);
            match self.negotiator.take_buffered_offer() {
                Some(offer) => {
                    info!("Replaying buffered offer");
                    self.process_offer(offer, fx);
                }
                None => {
                    self.broadcast(
                        SignalMessage::JoinerReady(JoinPayload::from_joiner(self.local.clone())),
                        fx,
                    );
                    self.arm_handshake(fx);
                }
            }
        } else {
            info!("{} rejected ({:?})", self.local, payload.reason);
            self.exit(ExitReason::Rejected, fx);
        }
    }

    fn on_joiner_ready(&mut self, payload: JoinPayload, fx: &mut Vec<Effect>) {
        if self.role != Role::Organizer {
            return;
        }
        let joiner = payload.joiner_id;
        if !self.from_peer(&joiner) || self.gate.state(&joiner) != ApprovalState::Approved {
            warn!("joiner_ready from {} who is not approved", joiner);
            return;
        }
        if let Some(offer) = self.negotiator.retransmission() {
            info!("{} ready again, re-sending offer {}", joiner, offer.id);
            fx.push(Effect::Broadcast(offer.clone()));
            return;
        }
        if self.negotiator.session().offer_created() {
            debug!("Offer for {} already in progress", joiner);
            return;
        }
        self.begin_offer(false, fx);
    }

    fn on_offer(&mut self, payload: OfferPayload, fx: &mut Vec<Effect>) {
        if self.role != Role::Joiner {
            debug!("{} is {}, ignoring offer", self.local, self.role);
            return;
        }
        if self.peer.is_some() && !self.from_peer(&payload.from) {
            debug!("Ignoring offer from {}", payload.from);
            return;
        }
        if self.approval == ApprovalState::Approved {
            self.process_offer(payload, fx);
        } else {
            info!("Buffering offer from {} until approved", payload.from);
            self.negotiator.buffer_offer(payload);
        }
    }

    fn process_offer(&mut self, payload: OfferPayload, fx: &mut Vec<Effect>) {
        if self.negotiator.on_offer(payload, fx) == OfferOutcome::Accepted {
            fx.push(Effect::CancelTimer(TimerSlot::Handshake));
            self.handshake_round = 0;
            if !self.status.is_connected() {
                self.set_status(ConnectionStatus::Signaling, fx);
            }
        }
    }

    fn on_answer(&mut self, payload: AnswerPayload, fx: &mut Vec<Effect>) {
        if self.role != Role::Organizer || !self.from_peer(&payload.from) {
            debug!("Ignoring answer from {}", payload.from);
            return;
        }
        self.negotiator.on_answer(payload, fx);
    }

    fn on_remote_candidate(&mut self, payload: CandidatePayload, fx: &mut Vec<Effect>) {
        if !self.from_peer(&payload.from) {
            debug!("Ignoring candidate from {}", payload.from);
            return;
        }
        self.negotiator.on_remote_candidate(payload, fx);
    }

    // Negotiation and recovery

    fn begin_offer(&mut self, restart: bool, fx: &mut Vec<Effect>) {
        let generation = self.negotiator.start_session(restart);
        self.negotiator.create_offer(fx);
        fx.push(Effect::ScheduleTimer {
            timer: TimerKind::NegotiationDeadline { generation },
            after: self.config.negotiation_timeout(),
        });
        self.set_status(ConnectionStatus::Signaling, fx);
    }

    fn on_negotiation_failed(
        &mut self,
        generation: u32,
        step: NegotiationStep,
        reason: String,
        fx: &mut Vec<Effect>,
    ) {
        warn!("{:?} failed in session {}: {}", step, generation, reason);
        if !self.negotiator.on_failure(generation, step) {
            return;
        }
        if self.role == Role::Organizer {
            self.recover(Regression::NegotiationError, fx);
        }
    }

    fn on_health(&mut self, signal: HealthSignal, fx: &mut Vec<Effect>) {
        match signal {
            HealthSignal::Unchanged => {}
            HealthSignal::Closed => debug!("Transport closed"),
            HealthSignal::Connecting => self.set_status(ConnectionStatus::Connecting, fx),
            HealthSignal::Connected => {
                if self.status.is_connected() {
                    return;
                }
                self.recovery.on_connected();
                fx.push(Effect::CancelTimer(TimerSlot::Retry));
                fx.push(Effect::CancelTimer(TimerSlot::Negotiation));
                fx.push(Effect::CancelTimer(TimerSlot::Handshake));
                self.timer.start();
                self.set_status(ConnectionStatus::Connected, fx);
            }
            HealthSignal::Regressed(regression) => {
                self.timer.stop();
                let status = match regression {
                    Regression::Failed => ConnectionStatus::Failed,
                    _ => ConnectionStatus::Disconnected,
                };
                self.set_status(status, fx);

                let peer_present = self
                    .peer
                    .as_ref()
                    .is_some_and(|peer| self.presence.contains(peer));
                if !peer_present {
                    self.abandon_peer(fx);
                    self.on_presence(fx);
                } else if self.role == Role::Organizer {
                    self.recover(regression, fx);
                }
            }
        }
    }

    fn recover(&mut self, regression: Regression, fx: &mut Vec<Effect>) {
        match self.recovery.on_regression(regression) {
            RecoveryDecision::Scheduled { attempt, after, .. } => fx.push(Effect::ScheduleTimer {
                timer: TimerKind::Retry { attempt },
                after,
            }),
            RecoveryDecision::Immediate { kind, .. } => {
                fx.push(Effect::CancelTimer(TimerSlot::Retry));
                self.run_recovery(kind, fx);
            }
            RecoveryDecision::AlreadyPending => {}
            RecoveryDecision::Exhausted => {
                error!(
                    "{} giving up after {} recovery attempts",
                    self.local, self.config.retry.max_retries
                );
                self.exit(ExitReason::RetriesExhausted, fx);
            }
        }
    }

    fn run_recovery(&mut self, kind: RecoveryKind, fx: &mut Vec<Effect>) {
        info!(
            "{} recovering with {:?} (attempt {})",
            self.local,
            kind,
            self.recovery.attempts()
        );
        fx.push(Effect::CancelTimer(TimerSlot::Gathering));
        fx.push(Effect::CancelTimer(TimerSlot::Negotiation));
        match kind {
            RecoveryKind::Reconnect => {
                fx.push(Effect::ResetTransport);
                self.begin_offer(false, fx);
            }
            RecoveryKind::PathRestart => {
                fx.push(Effect::RestartPathDiscovery);
                self.begin_offer(true, fx);
            }
            RecoveryKind::RetryOffer => self.begin_offer(false, fx),
        }
    }

    // Timers

    fn arm_handshake(&mut self, fx: &mut Vec<Effect>) {
        self.handshake_round = 1;
        fx.push(Effect::ScheduleTimer {
            timer: TimerKind::Handshake { round: 1 },
            after: self.config.handshake_resend(),
        });
    }

    fn cancel_timers(&self, fx: &mut Vec<Effect>) {
        fx.extend(ALL_TIMERS.into_iter().map(Effect::CancelTimer));
    }

    fn on_timer(&mut self, timer: TimerKind, fx: &mut Vec<Effect>) {
        match timer {
            TimerKind::Handshake { round } => self.on_handshake_timer(round, fx),
            TimerKind::GatheringDeadline { generation } => {
                self.negotiator.on_gathering_deadline(generation, fx)
            }
            TimerKind::NegotiationDeadline { generation } => {
                if self.role != Role::Organizer
                    || generation != self.negotiator.generation()
                    || self.status.is_connected()
                {
                    return;
                }
                warn!("Session {} did not connect in time", generation);
                self.recover(Regression::Disconnected, fx);
            }
            TimerKind::Retry { attempt } => {
                if let Some(kind) = self.recovery.take_due(attempt) {
                    self.run_recovery(kind, fx);
                }
            }
        }
    }

    fn on_handshake_timer(&mut self, round: u32, fx: &mut Vec<Effect>) {
        if round == 0 || round != self.handshake_round {
            return;
        }
        let message = match (self.role, self.approval) {
            (Role::Joiner, ApprovalState::Pending) => {
                SignalMessage::JoinRequest(JoinPayload::from_joiner(self.local.clone()))
            }
            (Role::Joiner, ApprovalState::Approved)
                if !self.negotiator.session().remote_processed() =>
            {
                SignalMessage::JoinerReady(JoinPayload::from_joiner(self.local.clone()))
            }
            _ => {
                self.handshake_round = 0;
                return;
            }
        };

        if round > self.config.handshake_attempts {
            warn!(
                "No response to {} after {} resends",
                message.event_name(),
                self.config.handshake_attempts
            );
            self.handshake_round = 0;
            return;
        }

        debug!("Resending {} (round {})", message.event_name(), round);
        self.broadcast(message, fx);
        self.handshake_round = round + 1;
        fx.push(Effect::ScheduleTimer {
            timer: TimerKind::Handshake {
                round: self.handshake_round,
            },
            after: self.config.handshake_resend(),
        });
    }

    fn on_tick(&mut self, delta: Duration, fx: &mut Vec<Effect>) {
        for signal in self.timer.advance(delta) {
            match signal {
                TimerSignal::Warning { remaining } => {
                    info!("Session ends in {:?}", remaining);
                    fx.push(Effect::Notify(CallNotification::SessionWarning { remaining }));
                }
                TimerSignal::Expired => {
                    fx.push(Effect::Notify(CallNotification::SessionExpired));
                    self.exit(ExitReason::SessionExpired, fx);
                }
            }
        }
    }

    /// Final transition; the runtime tears down on the emitted [`Effect::Teardown`].
    fn exit(&mut self, reason: ExitReason, fx: &mut Vec<Effect>) {
        if self.closed {
            return;
        }
        info!("{} exiting: {:?}", self.local, reason);
        self.cancel_timers(fx);
        self.timer.stop();
        self.arbiter.unpin();
        let status = match reason {
            ExitReason::Rejected => ConnectionStatus::Rejected,
            ExitReason::RetriesExhausted => ConnectionStatus::Failed,
            _ => ConnectionStatus::Closed,
        };
        self.set_status(status, fx);
        fx.push(Effect::Notify(CallNotification::Exited(reason)));
        fx.push(Effect::Teardown);
        self.closed = true;
    }
}
