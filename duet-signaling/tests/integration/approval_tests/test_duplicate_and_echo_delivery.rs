use anyhow::Result;
use duet_signaling::{CallConfig, CallNotification, MemoryRelay};

use crate::integration::{connect_on, init_tracing};
use crate::utils::{RelaySpy, drain};

/// Every broadcast reaches its sender and is delivered twice.
#[tokio::test]
async fn test_duplicate_and_echo_delivery() -> Result<()> {
    init_tracing();

    let relay = MemoryRelay::new();
    relay.set_echo(true);
    relay.set_duplicate(true);
    let spy = RelaySpy::new(relay);

    let (mut organizer, mut joiner) = connect_on(&spy, CallConfig::default()).await?;

    // connect_on consumed exactly one ApprovalRequested and one Connected each.
    for notification in drain(&mut organizer.notifications)
        .into_iter()
        .chain(drain(&mut joiner.notifications))
    {
        assert!(
            !matches!(
                notification,
                CallNotification::ApprovalRequested(_) | CallNotification::StatusChanged(_)
            ),
            "unexpected {notification:?}"
        );
    }

    // Replays of the same envelope never restart negotiation.
    assert_eq!(spy.count("webrtc_offer").await, 1);
    assert_eq!(spy.count("webrtc_answer").await, 1);
    assert_eq!(organizer.control.created(), 1);
    assert_eq!(joiner.control.created(), 1);
    assert_eq!(organizer.control.applied_candidates().len(), 1);
    assert_eq!(joiner.control.applied_candidates().len(), 1);

    organizer.handle.leave().await?;
    joiner.handle.leave().await?;
    Ok(())
}
