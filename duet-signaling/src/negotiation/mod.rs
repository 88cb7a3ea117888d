mod negotiator;
mod session;

pub use negotiator::*;
pub use session::*;
