use duet_core::{ParticipantId, RoomId};
use duet_signaling::{CallConfig, CallRuntime, ChannelError, MemoryRelay};
use std::sync::Arc;

use crate::integration::init_tracing;
use crate::utils::{LoopbackControl, LoopbackFactory};

#[tokio::test(start_paused = true)]
async fn test_unresponsive_relay() {
    init_tracing();

    let config = CallConfig {
        join_timeout_ms: 500,
        ..CallConfig::default()
    };
    let result = CallRuntime::start(
        Arc::new(MemoryRelay::unresponsive()),
        Arc::new(LoopbackFactory::new(LoopbackControl::new())),
        RoomId::new("r1"),
        ParticipantId::from("a7x"),
        config,
    )
    .await;

    assert!(matches!(result, Err(ChannelError::TimedOut)));
}
