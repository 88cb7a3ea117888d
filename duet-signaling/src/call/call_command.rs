use crate::call::CallEvent;
use duet_core::ParticipantId;

/// Operator input sent through a [`CallHandle`](crate::CallHandle).
#[derive(Debug, Clone)]
pub enum CallCommand {
    Decide {
        joiner: ParticipantId,
        approved: bool,
    },
    ExtendSession,
    Leave,
}

impl From<CallCommand> for CallEvent {
    fn from(command: CallCommand) -> Self {
        match command {
            CallCommand::Decide { joiner, approved } => {
                CallEvent::ApprovalDecision { joiner, approved }
            }
            CallCommand::ExtendSession => CallEvent::ExtendSession,
            CallCommand::Leave => CallEvent::Leave,
        }
    }
}
