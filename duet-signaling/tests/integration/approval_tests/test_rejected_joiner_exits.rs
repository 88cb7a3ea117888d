use anyhow::Result;
use duet_core::ConnectionStatus;
use duet_signaling::{CallConfig, CallNotification, ExitReason, MemoryRelay};

use crate::integration::{init_tracing, join};
use crate::utils::{NOTIFY_TIMEOUT_MS, RelaySpy, drain, wait_for, wait_for_approval_request};

#[tokio::test]
async fn test_rejected_joiner_exits() -> Result<()> {
    init_tracing();

    let spy = RelaySpy::new(MemoryRelay::new());
    let mut organizer = join(&spy, "a7x", CallConfig::default()).await?;
    let mut joiner = join(&spy, "m2q", CallConfig::default()).await?;

    let requester = wait_for_approval_request(&mut organizer.notifications).await?;
    assert_eq!(requester.as_str(), "m2q");
    organizer.handle.reject(requester).await?;

    let (_, seen) = wait_for(&mut joiner.notifications, NOTIFY_TIMEOUT_MS, |n| {
        *n == CallNotification::Exited(ExitReason::Rejected)
    })
    .await?;
    assert!(seen.contains(&CallNotification::StatusChanged(ConnectionStatus::Rejected)));
    joiner.handle.finished().await;

    let rejection = spy
        .sent()
        .await
        .into_iter()
        .find(|b| b.event == "join_rejected")
        .expect("rejection recorded");
    assert_eq!(rejection.payload["joinerId"], "m2q");
    assert_eq!(rejection.payload["reason"], "declined");

    assert_eq!(spy.count("webrtc_offer").await, 0);
    assert_eq!(joiner.control.created(), 0);
    assert_eq!(spy.relay().members("room:r1"), vec!["a7x".to_owned()]);

    // The organizer keeps waiting for someone else.
    assert!(!organizer.handle.is_finished());
    assert!(
        drain(&mut organizer.notifications)
            .iter()
            .all(|n| !matches!(n, CallNotification::Exited(_)))
    );

    organizer.handle.leave().await?;
    Ok(())
}
