use anyhow::Result;
use duet_signaling::{CallConfig, CallNotification, ExitReason, SessionLimits};
use std::time::Duration;

use crate::integration::{connected_pair, init_tracing};
use crate::utils::wait_for;

const LONG_WAIT_MS: u64 = 60_000;

#[tokio::test(start_paused = true)]
async fn test_session_expiry() -> Result<()> {
    init_tracing();

    let config = CallConfig {
        session: SessionLimits {
            max_duration_secs: 10,
            warning_before_secs: 4,
            extension_secs: 5,
        },
        ..CallConfig::default()
    };
    let (_spy, mut organizer, mut joiner) = connected_pair(config).await?;

    let (warning, _) = wait_for(&mut organizer.notifications, LONG_WAIT_MS, |n| {
        matches!(n, CallNotification::SessionWarning { .. })
    })
    .await?;
    let CallNotification::SessionWarning { remaining } = warning else {
        unreachable!()
    };
    assert!(remaining <= Duration::from_secs(4));

    organizer.handle.extend_session().await?;
    wait_for(&mut organizer.notifications, LONG_WAIT_MS, |n| {
        *n == CallNotification::SessionExtended {
            limit: Duration::from_secs(15),
        }
    })
    .await?;

    // The joiner did not extend and runs out first.
    let (_, seen) = wait_for(&mut joiner.notifications, LONG_WAIT_MS, |n| {
        *n == CallNotification::Exited(ExitReason::SessionExpired)
    })
    .await?;
    assert_eq!(
        seen.iter()
            .filter(|n| matches!(n, CallNotification::SessionWarning { .. }))
            .count(),
        1
    );
    assert!(seen.contains(&CallNotification::SessionExpired));
    assert!(!organizer.handle.is_finished());

    let (_, seen) = wait_for(&mut organizer.notifications, LONG_WAIT_MS, |n| {
        *n == CallNotification::Exited(ExitReason::SessionExpired)
    })
    .await?;
    // The extension re-armed the warning once.
    assert_eq!(
        seen.iter()
            .filter(|n| matches!(n, CallNotification::SessionWarning { .. }))
            .count(),
        1
    );
    organizer.handle.finished().await;
    Ok(())
}
