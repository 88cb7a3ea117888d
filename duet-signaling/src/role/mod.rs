mod role_arbiter;

pub use role_arbiter::*;
