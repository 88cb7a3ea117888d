use crate::error::TransportError;
use crate::transport::{
    MediaTransport, MediaTransportFactory, PathState, TransportConfig, TransportEvent,
    TransportEventKind, TransportState,
};
use async_trait::async_trait;
use bytes::Bytes;
use duet_core::{Candidate, KeepalivePacket, Role, SdpKind, SessionDescription};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_remote::TrackRemote;

const KEEPALIVE_LABEL: &str = "keepalive";

/// [`MediaTransport`] backed by a webrtc-rs peer connection with one audio
/// and one video transceiver and a keepalive data channel.
pub struct WebRtcTransport {
    instance: u64,
    peer_connection: Arc<RTCPeerConnection>,
    keepalive: Arc<KeepaliveLink>,
}

impl WebRtcTransport {
    pub async fn new(
        instance: u64,
        role: Role,
        config: TransportConfig,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Self, TransportError> {
        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media)?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);
        let keepalive = Arc::new(KeepaliveLink::new(instance, &config, events.clone()));

        let state_tx = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    info!("Transport {} connection state: {}", instance, s);
                    let Some(state) = connection_state(s) else {
                        return;
                    };
                    let _ = tx
                        .send(TransportEvent::new(
                            instance,
                            TransportEventKind::ConnectionState(state),
                        ))
                        .await;
                })
            },
        ));

        let path_tx = events.clone();
        peer_connection.on_ice_connection_state_change(Box::new(
            move |s: RTCIceConnectionState| {
                let tx = path_tx.clone();
                Box::pin(async move {
                    debug!("Transport {} path state: {}", instance, s);
                    let Some(state) = path_state(s) else {
                        return;
                    };
                    let _ = tx
                        .send(TransportEvent::new(
                            instance,
                            TransportEventKind::PathState(state),
                        ))
                        .await;
                })
            },
        ));

        let ice_tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let kind = match c {
                    None => TransportEventKind::GatheringComplete,
                    Some(candidate) => match candidate.to_json() {
                        Ok(init) => TransportEventKind::CandidateGathered(from_init(init)),
                        Err(e) => {
                            warn!("Dropping unserializable candidate: {}", e);
                            return;
                        }
                    },
                };
                let _ = tx.send(TransportEvent::new(instance, kind)).await;
            })
        }));

        let track_tx = events.clone();
        let media_seen = Arc::new(AtomicBool::new(false));
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                let media_seen = media_seen.clone();
                Box::pin(async move {
                    debug!("Transport {} remote {:?} track", instance, track.kind());
                    if !media_seen.swap(true, Ordering::SeqCst) {
                        let _ = tx
                            .send(TransportEvent::new(
                                instance,
                                TransportEventKind::RemoteMediaAvailable,
                            ))
                            .await;
                    }
                })
            },
        ));

        match role {
            Role::Organizer => {
                peer_connection
                    .add_transceiver_from_kind(RTPCodecType::Audio, None)
                    .await?;
                peer_connection
                    .add_transceiver_from_kind(RTPCodecType::Video, None)
                    .await?;
                let channel = peer_connection
                    .create_data_channel(KEEPALIVE_LABEL, None)
                    .await?;
                KeepaliveLink::attach(&keepalive, channel);
            }
            _ => {
                let link = keepalive.clone();
                peer_connection.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
                    let link = link.clone();
                    Box::pin(async move {
                        if channel.label() == KEEPALIVE_LABEL {
                            KeepaliveLink::attach(&link, channel);
                        } else {
                            debug!("Ignoring data channel '{}'", channel.label());
                        }
                    })
                }));
            }
        }

        Ok(Self {
            instance,
            peer_connection,
            keepalive,
        })
    }
}

#[async_trait]
impl MediaTransport for WebRtcTransport {
    fn instance(&self) -> u64 {
        self.instance
    }

    async fn create_local_description(
        &self,
        kind: SdpKind,
        ice_restart: bool,
    ) -> Result<SessionDescription, TransportError> {
        let description = match kind {
            SdpKind::Offer => {
                let options = ice_restart.then_some(RTCOfferOptions {
                    voice_activity_detection: false,
                    ice_restart: true,
                });
                self.peer_connection.create_offer(options).await?
            }
            SdpKind::Answer => self.peer_connection.create_answer(None).await?,
        };
        self.peer_connection
            .set_local_description(description.clone())
            .await?;
        Ok(SessionDescription {
            kind,
            sdp: description.sdp,
        })
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        let remote = match description.kind {
            SdpKind::Offer => RTCSessionDescription::offer(description.sdp)?,
            SdpKind::Answer => RTCSessionDescription::answer(description.sdp)?,
        };
        self.peer_connection.set_remote_description(remote).await?;
        Ok(())
    }

    async fn apply_candidate(&self, candidate: Candidate) -> Result<(), TransportError> {
        self.peer_connection
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: candidate.username_fragment,
            })
            .await?;
        Ok(())
    }

    async fn restart_path_discovery(&self) -> Result<(), TransportError> {
        // The restart itself rides on the next offer (`ice_restart`).
        info!("Transport {} restarting path discovery", self.instance);
        Ok(())
    }

    async fn stop_local_media(&self) {
        for sender in self.peer_connection.get_senders().await {
            if let Err(e) = sender.stop().await {
                debug!("Failed to stop sender: {}", e);
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.keepalive.stop();
        self.peer_connection.close().await?;
        Ok(())
    }
}

/// Creates a [`WebRtcTransport`] per instance.
#[derive(Debug, Clone, Default)]
pub struct WebRtcTransportFactory {
    config: TransportConfig,
}

impl WebRtcTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MediaTransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        instance: u64,
        role: Role,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn MediaTransport>, TransportError> {
        let transport = WebRtcTransport::new(instance, role, self.config.clone(), events).await?;
        Ok(Box::new(transport))
    }
}

fn from_init(init: RTCIceCandidateInit) -> Candidate {
    Candidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_m_line_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn connection_state(state: RTCPeerConnectionState) -> Option<TransportState> {
    Some(match state {
        RTCPeerConnectionState::New => TransportState::New,
        RTCPeerConnectionState::Connecting => TransportState::Connecting,
        RTCPeerConnectionState::Connected => TransportState::Connected,
        RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
        RTCPeerConnectionState::Failed => TransportState::Failed,
        RTCPeerConnectionState::Closed => TransportState::Closed,
        _ => return None,
    })
}

fn path_state(state: RTCIceConnectionState) -> Option<PathState> {
    Some(match state {
        RTCIceConnectionState::New => PathState::New,
        RTCIceConnectionState::Checking => PathState::Checking,
        RTCIceConnectionState::Connected => PathState::Connected,
        RTCIceConnectionState::Completed => PathState::Completed,
        RTCIceConnectionState::Disconnected => PathState::Disconnected,
        RTCIceConnectionState::Failed => PathState::Failed,
        RTCIceConnectionState::Closed => PathState::Closed,
        _ => return None,
    })
}

/// Ping/pong over the keepalive data channel. Silence beyond the timeout is
/// reported once as lost; the next packet reports it restored.
struct KeepaliveLink {
    instance: u64,
    events: mpsc::Sender<TransportEvent>,
    interval: Duration,
    timeout: Duration,
    started: Instant,
    last_heard_ms: AtomicU64,
    lost: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl KeepaliveLink {
    fn new(instance: u64, config: &TransportConfig, events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            instance,
            events,
            interval: config.keepalive_interval(),
            timeout: config.keepalive_timeout(),
            started: Instant::now(),
            last_heard_ms: AtomicU64::new(0),
            lost: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn attach(link: &Arc<Self>, channel: Arc<RTCDataChannel>) {
        let opened = link.clone();
        let weak = Arc::downgrade(&channel);
        channel.on_open(Box::new(move || {
            let opened = opened.clone();
            let weak = weak.clone();
            Box::pin(async move {
                info!("Keepalive channel open on transport {}", opened.instance);
                opened.last_heard_ms.store(opened.now_ms(), Ordering::SeqCst);
                let handle = tokio::spawn(opened.clone().ping_loop(weak));
                if let Ok(mut slot) = opened.task.lock() {
                    if let Some(previous) = slot.replace(handle) {
                        previous.abort();
                    }
                }
            })
        }));

        let receiver = link.clone();
        let weak = Arc::downgrade(&channel);
        channel.on_message(Box::new(move |msg: DataChannelMessage| {
            let link = receiver.clone();
            let weak = weak.clone();
            Box::pin(async move {
                link.on_packet(&msg.data, weak).await;
            })
        }));
    }

    async fn ping_loop(self: Arc<Self>, channel: Weak<RTCDataChannel>) {
        let mut interval = tokio::time::interval(self.interval);
        loop {
            interval.tick().await;
            let Some(channel) = channel.upgrade() else {
                break;
            };

            let ping = KeepalivePacket::Ping {
                timestamp: self.now_ms(),
            };
            if let Err(e) = send_packet(&channel, &ping).await {
                debug!("Keepalive ping failed: {}", e);
                break;
            }

            let silent = self
                .now_ms()
                .saturating_sub(self.last_heard_ms.load(Ordering::SeqCst));
            if Duration::from_millis(silent) > self.timeout && !self.lost.swap(true, Ordering::SeqCst)
            {
                warn!(
                    "No keepalive from peer on transport {} for {}ms",
                    self.instance, silent
                );
                self.emit(TransportEventKind::KeepaliveLost).await;
            }
        }
    }

    async fn on_packet(&self, data: &[u8], channel: Weak<RTCDataChannel>) {
        let packet: KeepalivePacket = match postcard::from_bytes(data) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Ignoring malformed keepalive packet: {}", e);
                return;
            }
        };

        self.last_heard_ms.store(self.now_ms(), Ordering::SeqCst);
        if self.lost.swap(false, Ordering::SeqCst) {
            info!("Keepalive restored on transport {}", self.instance);
            self.emit(TransportEventKind::KeepaliveRestored).await;
        }

        if let KeepalivePacket::Ping { timestamp } = packet {
            if let Some(channel) = channel.upgrade() {
                if let Err(e) = send_packet(&channel, &KeepalivePacket::Pong { timestamp }).await {
                    debug!("Keepalive pong failed: {}", e);
                }
            }
        }
    }

    async fn emit(&self, kind: TransportEventKind) {
        let _ = self.events.send(TransportEvent::new(self.instance, kind)).await;
    }

    fn stop(&self) {
        if let Ok(mut slot) = self.task.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

async fn send_packet(
    channel: &RTCDataChannel,
    packet: &KeepalivePacket,
) -> Result<(), TransportError> {
    let encoded = postcard::to_allocvec(packet)?;
    channel.send(&Bytes::from(encoded)).await?;
    Ok(())
}
