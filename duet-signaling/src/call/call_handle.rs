use crate::call::CallCommand;
use crate::error::CallError;
use duet_core::ParticipantId;
use tokio::sync::mpsc;

/// Cloneable control surface of a running call.
#[derive(Clone)]
pub struct CallHandle {
    local: ParticipantId,
    commands: mpsc::Sender<CallCommand>,
}

impl CallHandle {
    pub(crate) fn new(local: ParticipantId, commands: mpsc::Sender<CallCommand>) -> Self {
        Self { local, commands }
    }

    pub fn local(&self) -> &ParticipantId {
        &self.local
    }

    pub async fn approve(&self, joiner: ParticipantId) -> Result<(), CallError> {
        self.send(CallCommand::Decide {
            joiner,
            approved: true,
        })
        .await
    }

    pub async fn reject(&self, joiner: ParticipantId) -> Result<(), CallError> {
        self.send(CallCommand::Decide {
            joiner,
            approved: false,
        })
        .await
    }

    pub async fn extend_session(&self) -> Result<(), CallError> {
        self.send(CallCommand::ExtendSession).await
    }

    pub async fn leave(&self) -> Result<(), CallError> {
        self.send(CallCommand::Leave).await
    }

    pub fn is_finished(&self) -> bool {
        self.commands.is_closed()
    }

    /// Resolves once the runtime has torn down.
    pub async fn finished(&self) {
        self.commands.closed().await
    }

    async fn send(&self, command: CallCommand) -> Result<(), CallError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CallError::Ended)
    }
}
