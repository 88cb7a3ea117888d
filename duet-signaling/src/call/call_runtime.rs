use crate::call::{
    Call, CallCommand, CallEvent, CallHandle, CallNotification, Effect, NegotiationStep, TimerKind,
    TimerSlot,
};
use crate::channel::{ChannelEvent, Relay, SignalingChannel};
use crate::config::CallConfig;
use crate::error::{ChannelError, TransportError};
use crate::transport::{MediaTransport, MediaTransportFactory, TransportEvent};
use duet_core::{ParticipantId, RoomId, SdpKind};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Drives a [`Call`] against a signaling channel and a media transport.
/// One task owns everything; inputs are multiplexed with `select!`.
pub struct CallRuntime {
    call: Call,
    channel: SignalingChannel,
    channel_rx: mpsc::Receiver<ChannelEvent>,
    command_rx: mpsc::Receiver<CallCommand>,
    notifications: mpsc::UnboundedSender<CallNotification>,
    factory: Arc<dyn MediaTransportFactory>,
    transport: Option<Box<dyn MediaTransport>>,
    next_instance: u64,
    transport_rx: mpsc::Receiver<TransportEvent>,
    transport_tx: mpsc::Sender<TransportEvent>,
    timer_rx: mpsc::Receiver<TimerKind>,
    timer_tx: mpsc::Sender<TimerKind>,
    timers: HashMap<TimerSlot, JoinHandle<()>>,
    torn_down: bool,
}

impl CallRuntime {
    /// Join `room` and spawn the call. Fails if the relay does not
    /// acknowledge the subscription in time.
    pub async fn start(
        relay: Arc<dyn Relay>,
        factory: Arc<dyn MediaTransportFactory>,
        room: RoomId,
        local: ParticipantId,
        config: CallConfig,
    ) -> Result<(CallHandle, mpsc::UnboundedReceiver<CallNotification>), ChannelError> {
        let (channel, channel_rx) =
            SignalingChannel::join(relay, room.clone(), local.clone(), config.join_timeout())
                .await?;

        let (command_tx, command_rx) = mpsc::channel(32);
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::channel(256);
        let (timer_tx, timer_rx) = mpsc::channel(16);

        let runtime = Self {
            call: Call::new(local.clone(), room, config),
            channel,
            channel_rx,
            command_rx,
            notifications: notify_tx,
            factory,
            transport: None,
            next_instance: 0,
            transport_rx,
            transport_tx,
            timer_rx,
            timer_tx,
            timers: HashMap::new(),
            torn_down: false,
        };
        tokio::spawn(runtime.run());

        Ok((CallHandle::new(local, command_tx), notify_rx))
    }

    async fn run(mut self) {
        info!(
            "Call runtime for {} in {} started",
            self.call.local(),
            self.call.room()
        );

        let mut tick = tokio::time::interval(self.call.config().tick());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = tick.tick().await;

        while !self.torn_down {
            let event = tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(command) => CallEvent::from(command),
                    None => {
                        info!("All call handles dropped, leaving");
                        CallEvent::Leave
                    }
                },

                evt = self.channel_rx.recv() => match evt {
                    Some(event) => CallEvent::from(event),
                    None => {
                        warn!("Signaling channel closed unexpectedly");
                        CallEvent::ChannelFailed(ChannelError::Closed)
                    }
                },

                Some(evt) = self.transport_rx.recv() => {
                    if !self.is_current(evt.instance) {
                        debug!("Dropping event from replaced transport {}", evt.instance);
                        continue;
                    }
                    CallEvent::from(evt.kind)
                },

                Some(timer) = self.timer_rx.recv() => {
                    self.timers.remove(&timer.slot());
                    CallEvent::TimerFired(timer)
                },

                now = tick.tick() => {
                    let delta = now.duration_since(last_tick);
                    last_tick = now;
                    CallEvent::Tick(delta)
                },
            };

            self.dispatch(event).await;
        }

        info!("Call runtime for {} finished", self.call.local());
    }

    /// Apply `event` and execute its effects in order. Transport results
    /// feed back as follow-up events.
    async fn dispatch(&mut self, event: CallEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for effect in self.call.apply(event) {
                if let Some(follow_up) = self.execute(effect).await {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    async fn execute(&mut self, effect: Effect) -> Option<CallEvent> {
        match effect {
            Effect::Broadcast(envelope) => {
                if let Err(e) = self.channel.send(&envelope).await {
                    warn!("Failed to broadcast {}: {}", envelope.event_name(), e);
                }
                None
            }
            Effect::CreateOffer {
                generation,
                ice_restart,
            } => Some(self.describe(generation, SdpKind::Offer, ice_restart).await),
            Effect::CreateAnswer { generation } => {
                Some(self.describe(generation, SdpKind::Answer, false).await)
            }
            Effect::SetRemoteDescription {
                generation,
                description,
            } => {
                let timeout = self.operation_timeout();
                let result = match self.ensure_transport().await {
                    Ok(transport) => {
                        bounded(timeout, transport.set_remote_description(description)).await
                    }
                    Err(e) => Err(e),
                };
                Some(match result {
                    Ok(()) => CallEvent::RemoteDescriptionApplied { generation },
                    Err(e) => CallEvent::NegotiationFailed {
                        generation,
                        step: NegotiationStep::ApplyRemote,
                        reason: e.to_string(),
                    },
                })
            }
            Effect::ApplyCandidate(candidate) => {
                let timeout = self.operation_timeout();
                match &self.transport {
                    Some(transport) => {
                        if let Err(e) = bounded(timeout, transport.apply_candidate(candidate)).await {
                            warn!("Failed to apply candidate: {}", e);
                        }
                    }
                    None => debug!("No transport for remote candidate"),
                }
                None
            }
            Effect::RestartPathDiscovery => {
                let timeout = self.operation_timeout();
                if let Some(transport) = &self.transport {
                    if let Err(e) = bounded(timeout, transport.restart_path_discovery()).await {
                        warn!("Path restart failed: {}", e);
                    }
                }
                None
            }
            Effect::ResetTransport => {
                self.close_transport().await;
                None
            }
            Effect::ScheduleTimer { timer, after } => {
                self.schedule(timer, after);
                None
            }
            Effect::CancelTimer(slot) => {
                if let Some(handle) = self.timers.remove(&slot) {
                    handle.abort();
                }
                None
            }
            Effect::Notify(notification) => {
                let _ = self.notifications.send(notification);
                None
            }
            Effect::Teardown => {
                self.teardown().await;
                None
            }
        }
    }

    fn operation_timeout(&self) -> Duration {
        self.call.config().operation_timeout()
    }

    fn is_current(&self, instance: u64) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|t| t.instance() == instance)
    }

    async fn ensure_transport(&mut self) -> Result<&dyn MediaTransport, TransportError> {
        if self.transport.is_none() {
            self.next_instance += 1;
            let instance = self.next_instance;
            info!(
                "Creating media transport {} as {}",
                instance,
                self.call.role()
            );
            let transport = self
                .factory
                .create(instance, self.call.role(), self.transport_tx.clone())
                .await?;
            self.transport = Some(transport);
        }
        self.transport.as_deref().ok_or(TransportError::Closed)
    }

    async fn describe(&mut self, generation: u32, kind: SdpKind, ice_restart: bool) -> CallEvent {
        let step = match kind {
            SdpKind::Offer => NegotiationStep::CreateOffer,
            SdpKind::Answer => NegotiationStep::CreateAnswer,
        };
        let timeout = self.operation_timeout();
        let result = match self.ensure_transport().await {
            Ok(transport) => {
                bounded(timeout, transport.create_local_description(kind, ice_restart)).await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(description) => CallEvent::LocalDescriptionCreated {
                generation,
                description,
            },
            Err(e) => CallEvent::NegotiationFailed {
                generation,
                step,
                reason: e.to_string(),
            },
        }
    }

    fn schedule(&mut self, timer: TimerKind, after: Duration) {
        let tx = self.timer_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(timer).await;
        });
        if let Some(previous) = self.timers.insert(timer.slot(), handle) {
            previous.abort();
        }
    }

    async fn close_transport(&mut self) {
        let Some(transport) = self.transport.take() else {
            return;
        };
        info!("Closing media transport {}", transport.instance());
        if let Err(e) = bounded(self.operation_timeout(), transport.close()).await {
            error!("Failed to close transport {}: {}", transport.instance(), e);
        }
    }

    /// Stop capture, close the transport, leave the channel, clear timers.
    async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        info!("Tearing down call for {}", self.call.local());

        if let Some(transport) = &self.transport {
            let timeout = self.operation_timeout();
            if tokio::time::timeout(timeout, transport.stop_local_media())
                .await
                .is_err()
            {
                warn!(
                    "Stopping local media on {} timed out after {:?}",
                    transport.instance(),
                    timeout
                );
            }
        }
        self.close_transport().await;
        self.channel.leave().await;
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

async fn bounded<T>(
    timeout: Duration,
    operation: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    tokio::time::timeout(timeout, operation)
        .await
        .map_err(|_| TransportError::TimedOut)?
}
