use anyhow::Result;
use duet_core::ConnectionStatus;
use duet_signaling::{CallConfig, PathState, TransportEventKind};
use std::time::Duration;

use crate::integration::{connected_pair, init_tracing};
use crate::utils::wait_for_status;

#[tokio::test(start_paused = true)]
async fn test_stalled_relay() -> Result<()> {
    init_tracing();

    let config = CallConfig {
        join_timeout_ms: 1_000,
        ..CallConfig::default()
    };
    let (spy, mut organizer, _joiner) = connected_pair(config).await?;
    spy.relay().set_stalled(true);

    // The restart offer goes out on a relay that never acknowledges it.
    assert!(
        organizer
            .control
            .emit(TransportEventKind::PathState(PathState::Failed))
            .await
    );
    wait_for_status(&mut organizer.notifications, ConnectionStatus::Signaling).await?;

    organizer.handle.leave().await?;
    tokio::time::timeout(Duration::from_secs(30), organizer.handle.finished())
        .await
        .map_err(|_| anyhow::anyhow!("teardown hung on the stalled relay"))?;

    assert_eq!(organizer.control.closed(), organizer.control.created());
    // The unsubscribe never landed; only the bound let the call finish.
    assert!(spy.relay().members("room:r1").contains(&"a7x".to_string()));
    Ok(())
}
