mod approval_gate;

pub use approval_gate::*;
