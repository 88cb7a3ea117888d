use anyhow::{Context, Result};
use duet_core::{ConnectionStatus, ParticipantId, RoomId};
use duet_signaling::{
    CallConfig, CallHandle, CallNotification, CallRuntime, MediaTransportFactory, Relay,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Timeout for a single expected notification (ms).
pub const NOTIFY_TIMEOUT_MS: u64 = 5000;

/// Timeout for a call to reach `connected` (ms).
pub const CONNECT_TIMEOUT_MS: u64 = 10000;

pub type Notifications = mpsc::UnboundedReceiver<CallNotification>;

/// Start one participant on `relay` in room "r1".
pub async fn start_participant(
    relay: Arc<dyn Relay>,
    factory: Arc<dyn MediaTransportFactory>,
    id: &str,
    config: CallConfig,
) -> Result<(CallHandle, Notifications)> {
    CallRuntime::start(
        relay,
        factory,
        RoomId::new("r1"),
        ParticipantId::from(id),
        config,
    )
    .await
    .with_context(|| format!("{id} failed to join"))
}

/// Receive notifications until one matches, returning it and everything seen before.
pub async fn wait_for<F>(
    rx: &mut Notifications,
    timeout_ms: u64,
    mut matches: F,
) -> Result<(CallNotification, Vec<CallNotification>)>
where
    F: FnMut(&CallNotification) -> bool,
{
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let next = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .with_context(|| format!("timed out; saw {seen:?}"))?;
        match next {
            Some(notification) if matches(&notification) => return Ok((notification, seen)),
            Some(notification) => seen.push(notification),
            None => anyhow::bail!("notification channel closed; saw {seen:?}"),
        }
    }
}

pub async fn wait_for_status(rx: &mut Notifications, status: ConnectionStatus) -> Result<()> {
    wait_for(rx, CONNECT_TIMEOUT_MS, |n| {
        *n == CallNotification::StatusChanged(status)
    })
    .await
    .with_context(|| format!("never reached {status}"))?;
    Ok(())
}

pub async fn wait_for_approval_request(rx: &mut Notifications) -> Result<ParticipantId> {
    let (notification, _) = wait_for(rx, NOTIFY_TIMEOUT_MS, |n| {
        matches!(n, CallNotification::ApprovalRequested(_))
    })
    .await?;
    match notification {
        CallNotification::ApprovalRequested(joiner) => Ok(joiner),
        other => anyhow::bail!("unexpected {other:?}"),
    }
}

/// Everything already queued, without waiting.
pub fn drain(rx: &mut Notifications) -> Vec<CallNotification> {
    let mut pending = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        pending.push(notification);
    }
    pending
}
