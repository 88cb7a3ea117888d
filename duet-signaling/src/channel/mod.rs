mod channel_event;
mod memory_relay;
mod relay;
mod signaling_channel;

pub use channel_event::*;
pub use memory_relay::*;
pub use relay::*;
pub use signaling_channel::*;
