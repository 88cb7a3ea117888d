use async_trait::async_trait;
use duet_core::{Candidate, Role, SdpKind, SessionDescription};
use duet_signaling::{
    MediaTransport, MediaTransportFactory, TransportError, TransportEvent, TransportEventKind,
    TransportState,
};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

struct ControlInner {
    connect: AtomicBool,
    failing_offers: AtomicU32,
    created: AtomicU64,
    closed: AtomicU64,
    candidates: Mutex<Vec<Candidate>>,
    current: Mutex<Option<(u64, mpsc::Sender<TransportEvent>)>>,
}

/// Test-side switches and counters shared by every transport a
/// [`LoopbackFactory`] creates.
#[derive(Clone)]
pub struct LoopbackControl {
    inner: Arc<ControlInner>,
}

impl LoopbackControl {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ControlInner {
                connect: AtomicBool::new(true),
                failing_offers: AtomicU32::new(0),
                created: AtomicU64::new(0),
                closed: AtomicU64::new(0),
                candidates: Mutex::new(Vec::new()),
                current: Mutex::new(None),
            }),
        }
    }

    /// Transports never report `connected`.
    pub fn never_connect(&self) {
        self.inner.connect.store(false, Ordering::SeqCst);
    }

    pub fn fail_next_offers(&self, count: u32) {
        self.inner.failing_offers.store(count, Ordering::SeqCst);
    }

    pub fn created(&self) -> u64 {
        self.inner.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u64 {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn applied_candidates(&self) -> Vec<Candidate> {
        self.inner.candidates.lock().unwrap().clone()
    }

    /// Inject an event as if the newest transport reported it.
    pub async fn emit(&self, kind: TransportEventKind) -> bool {
        let current = self.inner.current.lock().unwrap().clone();
        match current {
            Some((instance, tx)) => tx.send(TransportEvent::new(instance, kind)).await.is_ok(),
            None => false,
        }
    }

    fn take_offer_failure(&self) -> bool {
        self.inner
            .failing_offers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Media transport that "connects" as soon as it holds both descriptions.
pub struct LoopbackTransport {
    instance: u64,
    control: LoopbackControl,
    events: mpsc::Sender<TransportEvent>,
    has_local: AtomicBool,
    has_remote: AtomicBool,
    connected: AtomicBool,
}

impl LoopbackTransport {
    fn emit_later(&self, kinds: Vec<TransportEventKind>) {
        let tx = self.events.clone();
        let instance = self.instance;
        tokio::spawn(async move {
            for kind in kinds {
                if tx.send(TransportEvent::new(instance, kind)).await.is_err() {
                    break;
                }
            }
        });
    }

    fn maybe_connect(&self) {
        if !self.control.inner.connect.load(Ordering::SeqCst)
            || !self.has_local.load(Ordering::SeqCst)
            || !self.has_remote.load(Ordering::SeqCst)
            || self.connected.swap(true, Ordering::SeqCst)
        {
            return;
        }
        self.emit_later(vec![
            TransportEventKind::ConnectionState(TransportState::Connecting),
            TransportEventKind::ConnectionState(TransportState::Connected),
            TransportEventKind::RemoteMediaAvailable,
        ]);
    }
}

#[async_trait]
impl MediaTransport for LoopbackTransport {
    fn instance(&self) -> u64 {
        self.instance
    }

    async fn create_local_description(
        &self,
        kind: SdpKind,
        ice_restart: bool,
    ) -> Result<SessionDescription, TransportError> {
        if kind == SdpKind::Offer && self.control.take_offer_failure() {
            return Err(TransportError::Other("injected offer failure".into()));
        }

        let sdp = format!("v=0 loopback-{}-{:?}-restart={}", self.instance, kind, ice_restart);
        self.has_local.store(true, Ordering::SeqCst);
        self.emit_later(vec![
            TransportEventKind::CandidateGathered(Candidate::new(format!(
                "candidate:{} 1 udp 2130706431 127.0.0.1 {} typ host",
                self.instance,
                40_000 + self.instance
            ))),
            TransportEventKind::GatheringComplete,
        ]);
        self.maybe_connect();
        Ok(SessionDescription { kind, sdp })
    }

    async fn set_remote_description(
        &self,
        _description: SessionDescription,
    ) -> Result<(), TransportError> {
        self.has_remote.store(true, Ordering::SeqCst);
        self.maybe_connect();
        Ok(())
    }

    async fn apply_candidate(&self, candidate: Candidate) -> Result<(), TransportError> {
        self.control.inner.candidates.lock().unwrap().push(candidate);
        Ok(())
    }

    async fn restart_path_discovery(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        self.has_remote.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_local_media(&self) {}

    async fn close(&self) -> Result<(), TransportError> {
        self.control.inner.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct LoopbackFactory {
    control: LoopbackControl,
}

impl LoopbackFactory {
    pub fn new(control: LoopbackControl) -> Self {
        Self { control }
    }
}

#[async_trait]
impl MediaTransportFactory for LoopbackFactory {
    async fn create(
        &self,
        instance: u64,
        _role: Role,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn MediaTransport>, TransportError> {
        self.control.inner.created.fetch_add(1, Ordering::SeqCst);
        *self.control.inner.current.lock().unwrap() = Some((instance, events.clone()));
        Ok(Box::new(LoopbackTransport {
            instance,
            control: self.control.clone(),
            events,
            has_local: AtomicBool::new(false),
            has_remote: AtomicBool::new(false),
            connected: AtomicBool::new(false),
        }))
    }
}
