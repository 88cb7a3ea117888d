use anyhow::Result;
use duet_core::ConnectionStatus;
use duet_signaling::{CallConfig, CallError, CallNotification, ExitReason};

use crate::integration::{connected_pair, init_tracing};
use crate::utils::{NOTIFY_TIMEOUT_MS, drain, wait_for};

#[tokio::test]
async fn test_leave_tears_down_once() -> Result<()> {
    init_tracing();

    let (spy, mut organizer, mut joiner) = connected_pair(CallConfig::default()).await?;

    organizer.handle.leave().await?;
    let (_, seen) = wait_for(&mut organizer.notifications, NOTIFY_TIMEOUT_MS, |n| {
        *n == CallNotification::Exited(ExitReason::Left)
    })
    .await?;
    assert!(seen.contains(&CallNotification::StatusChanged(ConnectionStatus::Closed)));

    organizer.handle.finished().await;
    assert!(organizer.handle.is_finished());
    assert!(matches!(organizer.handle.leave().await, Err(CallError::Ended)));

    assert_eq!(organizer.control.closed(), 1);
    assert_eq!(spy.relay().members("room:r1"), vec!["m2q".to_owned()]);
    assert!(drain(&mut organizer.notifications).is_empty());

    // A connected peer leaving presence is not a regression by itself.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(
        drain(&mut joiner.notifications)
            .iter()
            .all(|n| !matches!(n, CallNotification::StatusChanged(_)))
    );

    Ok(())
}
