use thiserror::Error;

/// A broadcast that could not be turned into a signaling message.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed signaling payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("event name '{received}' does not match payload event '{expected}'")]
    EventMismatch {
        expected: &'static str,
        received: String,
    },
}
