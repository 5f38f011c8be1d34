//! Participants page of an event.

use serde::Serialize;

use crate::domain::entity::CremeEntity;
use crate::domain::event::{EventStats, InvitationStatus, PresenceStatus};

/// A contact related to the event through the invitation or presence types.
#[derive(Debug, Clone, Serialize)]
pub struct EventContact {
    pub contact: CremeEntity,
    pub invitation: InvitationStatus,
    pub presence: PresenceStatus,
}

#[derive(Debug, Serialize)]
pub struct EventPageData {
    pub stats: EventStats,
    pub contacts: Vec<EventContact>,
}
