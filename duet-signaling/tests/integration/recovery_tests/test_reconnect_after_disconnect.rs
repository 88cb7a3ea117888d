use anyhow::Result;
use duet_core::ConnectionStatus;
use duet_signaling::{CallConfig, CallNotification, TransportEventKind, TransportState};

use crate::integration::{connected_pair, init_tracing};
use crate::utils::{drain, wait_for_status};

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_disconnect() -> Result<()> {
    init_tracing();

    let (spy, mut organizer, mut joiner) = connected_pair(CallConfig::default()).await?;
    assert_eq!(organizer.control.created(), 1);

    assert!(
        organizer
            .control
            .emit(TransportEventKind::ConnectionState(TransportState::Disconnected))
            .await
    );
    wait_for_status(&mut organizer.notifications, ConnectionStatus::Disconnected).await?;

    // Reconnect replaces the transport and renegotiates in a new session.
    wait_for_status(&mut organizer.notifications, ConnectionStatus::Signaling).await?;
    wait_for_status(&mut organizer.notifications, ConnectionStatus::Connected).await?;

    assert_eq!(organizer.control.created(), 2);
    assert_eq!(organizer.control.closed(), 1);
    assert_eq!(joiner.control.created(), 2);
    assert_eq!(joiner.control.closed(), 1);

    let sessions: Vec<_> = spy
        .sent()
        .await
        .into_iter()
        .filter(|b| b.event == "webrtc_offer")
        .map(|b| b.payload["session"].as_u64())
        .collect();
    assert_eq!(sessions, vec![Some(1), Some(2)]);

    organizer.handle.leave().await?;
    joiner.handle.leave().await?;
    joiner.handle.finished().await;
    // Only the organizer regressed; the joiner followed the new offer.
    assert!(
        !drain(&mut joiner.notifications)
            .contains(&CallNotification::StatusChanged(ConnectionStatus::Disconnected))
    );
    Ok(())
}
