//! Two-party call signaling: role election, join approval, offer/answer
//! negotiation over an unreliable broadcast relay, recovery and session limits.
//!
//! [`Call`] is the sans-IO state machine; [`CallRuntime`] drives it against a
//! [`Relay`] and a [`MediaTransportFactory`].

pub mod approval;
pub mod call;
pub mod channel;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod negotiation;
pub mod recovery;
pub mod role;
pub mod transport;

pub use approval::*;
pub use call::*;
pub use channel::*;
pub use config::*;
pub use error::*;
pub use lifecycle::*;
pub use negotiation::*;
pub use recovery::*;
pub use role::*;
pub use transport::*;
