use anyhow::Result;
use duet_core::ConnectionStatus;
use duet_signaling::{CallConfig, CallNotification, ExitReason};

use crate::integration::{connected_pair, init_tracing, join};
use crate::utils::{NOTIFY_TIMEOUT_MS, drain, wait_for};

#[tokio::test]
async fn test_third_participant_room_full() -> Result<()> {
    init_tracing();

    let (spy, mut organizer, mut joiner) = connected_pair(CallConfig::default()).await?;

    let mut intruder = join(&spy, "z9z", CallConfig::default()).await?;
    let (_, seen) = wait_for(&mut intruder.notifications, NOTIFY_TIMEOUT_MS, |n| {
        *n == CallNotification::Exited(ExitReason::Rejected)
    })
    .await?;
    assert!(seen.contains(&CallNotification::StatusChanged(ConnectionStatus::Rejected)));

    let rejection = spy
        .sent()
        .await
        .into_iter()
        .find(|b| b.event == "join_rejected")
        .expect("rejection recorded");
    assert_eq!(rejection.sender, "a7x");
    assert_eq!(rejection.payload["joinerId"], "z9z");
    assert_eq!(rejection.payload["reason"], "room_full");

    intruder.handle.finished().await;

    // The established call never noticed, and no operator prompt was raised.
    for notification in drain(&mut organizer.notifications)
        .into_iter()
        .chain(drain(&mut joiner.notifications))
    {
        assert!(
            !matches!(
                notification,
                CallNotification::StatusChanged(_) | CallNotification::ApprovalRequested(_)
            ),
            "unexpected {notification:?}"
        );
    }
    assert_eq!(spy.count("webrtc_offer").await, 1);

    Ok(())
}
