pub use duet_core::{ParticipantId, RoomId};
pub use duet_signaling::{CallConfig, CallHandle, CallNotification, CallRuntime};

pub mod model {
    pub use duet_core::*;
}

pub mod signaling {
    pub use duet_signaling::*;
}
