mod recovery_controller;
mod retry_policy;

pub use recovery_controller::*;
pub use retry_policy::*;
