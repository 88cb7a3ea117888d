use duet_core::{ParticipantId, Role};
use std::collections::BTreeSet;
use tracing::debug;

/// Organizer of a presence snapshot: its lexicographically smallest member.
pub fn elect_organizer<'a, I>(presence: I) -> Option<&'a ParticipantId>
where
    I: IntoIterator<Item = &'a ParticipantId>,
{
    presence.into_iter().min()
}

/// Outcome of evaluating one presence snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Election {
    pub role: Role,
    pub organizer: Option<ParticipantId>,
    pub members: usize,
}

/// Derives the local role from presence. Once pinned, the role no longer
/// follows presence order until [`RoleArbiter::unpin`].
#[derive(Debug)]
pub struct RoleArbiter {
    local: ParticipantId,
    pinned: Option<Role>,
}

impl RoleArbiter {
    pub fn new(local: ParticipantId) -> Self {
        Self {
            local,
            pinned: None,
        }
    }

    pub fn evaluate(&self, presence: &BTreeSet<ParticipantId>) -> Election {
        let organizer = elect_organizer(presence).cloned();

        let computed = match &organizer {
            _ if !presence.contains(&self.local) => Role::Undetermined,
            Some(id) if *id == self.local => Role::Organizer,
            Some(_) => Role::Joiner,
            None => Role::Undetermined,
        };

        let role = match self.pinned {
            Some(pinned) => {
                if pinned != computed {
                    debug!(
                        "Presence elects {} for {}, keeping pinned role {}",
                        computed, self.local, pinned
                    );
                }
                pinned
            }
            None => computed,
        };

        Election {
            role,
            organizer,
            members: presence.len(),
        }
    }

    pub fn pin(&mut self, role: Role) {
        if role != Role::Undetermined {
            self.pinned = Some(role);
        }
    }

    pub fn unpin(&mut self) {
        self.pinned = None;
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned.is_some()
    }
}
