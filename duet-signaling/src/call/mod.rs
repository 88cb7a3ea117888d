mod call;
mod call_command;
mod call_event;
mod call_handle;
mod call_runtime;

pub use call::*;
pub use call_command::*;
pub use call_event::*;
pub use call_handle::*;
pub use call_runtime::*;
