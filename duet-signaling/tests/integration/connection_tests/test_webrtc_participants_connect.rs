use anyhow::Result;
use duet_core::ConnectionStatus;
use duet_signaling::{CallConfig, MemoryRelay, TransportConfig, WebRtcTransportFactory};
use std::sync::Arc;

use crate::integration::init_tracing;
use crate::utils::{start_participant, wait_for_approval_request, wait_for_status};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "needs a network interface"]
async fn test_webrtc_participants_connect() -> Result<()> {
    init_tracing();

    let relay = MemoryRelay::new();
    let transport = TransportConfig {
        ice_servers: Vec::new(),
        ..TransportConfig::default()
    };
    let factory = Arc::new(WebRtcTransportFactory::new(transport));

    let (organizer, mut organizer_rx) = start_participant(
        Arc::new(relay.clone()),
        factory.clone(),
        "a7x",
        CallConfig::default(),
    )
    .await?;
    let (joiner, mut joiner_rx) =
        start_participant(Arc::new(relay), factory, "m2q", CallConfig::default()).await?;

    let requester = wait_for_approval_request(&mut organizer_rx).await?;
    organizer.approve(requester).await?;

    wait_for_status(&mut organizer_rx, ConnectionStatus::Connected).await?;
    wait_for_status(&mut joiner_rx, ConnectionStatus::Connected).await?;

    joiner.leave().await?;
    organizer.leave().await?;
    Ok(())
}
