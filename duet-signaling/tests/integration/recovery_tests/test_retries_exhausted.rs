use anyhow::Result;
use duet_core::ConnectionStatus;
use duet_signaling::{CallConfig, CallNotification, ExitReason, MemoryRelay};

use crate::integration::{init_tracing, join};
use crate::utils::{RelaySpy, wait_for, wait_for_approval_request, wait_for_status};

const LONG_WAIT_MS: u64 = 120_000;

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted() -> Result<()> {
    init_tracing();

    let config = CallConfig {
        negotiation_timeout_ms: 2_000,
        ..CallConfig::default()
    };
    let spy = RelaySpy::new(MemoryRelay::new());
    let mut organizer = join(&spy, "a7x", config.clone()).await?;
    let mut joiner = join(&spy, "m2q", config).await?;
    organizer.control.never_connect();
    joiner.control.never_connect();

    let requester = wait_for_approval_request(&mut organizer.notifications).await?;
    organizer.handle.approve(requester).await?;
    wait_for_status(&mut joiner.notifications, ConnectionStatus::Signaling).await?;

    let (_, seen) = wait_for(&mut organizer.notifications, LONG_WAIT_MS, |n| {
        *n == CallNotification::Exited(ExitReason::RetriesExhausted)
    })
    .await?;
    assert!(seen.contains(&CallNotification::StatusChanged(ConnectionStatus::Failed)));
    assert!(!seen.contains(&CallNotification::StatusChanged(ConnectionStatus::Connected)));
    organizer.handle.finished().await;

    // The first attempt plus one fresh transport per reconnect.
    let budget = CallConfig::default().retry.max_retries;
    assert_eq!(organizer.control.created(), 1 + u64::from(budget));
    assert_eq!(spy.count("webrtc_offer").await, 1 + budget as usize);

    // The joiner loses its organizer before connecting and starts over.
    wait_for_status(&mut joiner.notifications, ConnectionStatus::WaitingForParticipant).await?;
    assert!(!joiner.handle.is_finished());
    joiner.handle.leave().await?;
    Ok(())
}
