use thiserror::Error;

/// Channel-level failures surfaced by the relay. They are terminal for the
/// call; the adapter never retries on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel error: {0}")]
    ChannelError(String),

    #[error("timed out waiting for the relay")]
    TimedOut,

    #[error("channel closed")]
    Closed,
}

/// Failures reported by the media-transport collaborator.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("webrtc error: {0}")]
    Webrtc(#[from] webrtc::Error),

    #[error("keepalive encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("transport operation timed out")]
    TimedOut,

    #[error("transport closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Errors returned to users of a [`CallHandle`](crate::CallHandle).
#[derive(Error, Debug)]
pub enum CallError {
    #[error("call has already ended")]
    Ended,

    #[error(transparent)]
    Channel(#[from] ChannelError),
}
