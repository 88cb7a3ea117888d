pub mod approval_tests;
pub mod connection_tests;
pub mod recovery_tests;

use anyhow::Result;
use duet_core::ConnectionStatus;
use duet_signaling::{CallConfig, CallHandle, MemoryRelay};
use std::sync::Arc;
use tracing::Level;

use crate::utils::{
    LoopbackControl, LoopbackFactory, Notifications, RelaySpy, start_participant,
    wait_for_approval_request, wait_for_status,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// One side of a loopback call.
pub struct Participant {
    pub handle: CallHandle,
    pub notifications: Notifications,
    pub control: LoopbackControl,
}

pub async fn join(spy: &RelaySpy, id: &str, config: CallConfig) -> Result<Participant> {
    let control = LoopbackControl::new();
    let (handle, notifications) = start_participant(
        Arc::new(spy.clone()),
        Arc::new(LoopbackFactory::new(control.clone())),
        id,
        config,
    )
    .await?;
    Ok(Participant {
        handle,
        notifications,
        control,
    })
}

/// "a7x" organizes, "m2q" joins and is approved; both end up connected.
pub async fn connected_pair(config: CallConfig) -> Result<(RelaySpy, Participant, Participant)> {
    let spy = RelaySpy::new(MemoryRelay::new());
    let (organizer, joiner) = connect_on(&spy, config).await?;
    Ok((spy, organizer, joiner))
}

pub async fn connect_on(spy: &RelaySpy, config: CallConfig) -> Result<(Participant, Participant)> {
    let mut organizer = join(spy, "a7x", config.clone()).await?;
    let mut joiner = join(spy, "m2q", config).await?;

    let requester = wait_for_approval_request(&mut organizer.notifications).await?;
    organizer.handle.approve(requester).await?;

    wait_for_status(&mut organizer.notifications, ConnectionStatus::Connected).await?;
    wait_for_status(&mut joiner.notifications, ConnectionStatus::Connected).await?;
    Ok((organizer, joiner))
}
