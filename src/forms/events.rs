//! Forms of the event participants page.

use serde::Deserialize;

use crate::domain::event::{InvitationStatus, PresenceStatus};
use crate::domain::types::EntityId;
use crate::forms::FormError;

#[derive(Debug, Deserialize)]
pub struct InvitationForm {
    pub contact_id: i32,
    pub status: String,
}

impl TryFrom<InvitationForm> for (EntityId, InvitationStatus) {
    type Error = FormError;

    fn try_from(form: InvitationForm) -> Result<Self, Self::Error> {
        let contact = EntityId::new(form.contact_id).map_err(|_| FormError::InvalidId)?;
        let status = InvitationStatus::try_from(form.status.trim())
            .map_err(|err| FormError::invalid("status", err))?;
        Ok((contact, status))
    }
}

#[derive(Debug, Deserialize)]
pub struct PresenceForm {
    pub contact_id: i32,
    pub status: String,
}

impl TryFrom<PresenceForm> for (EntityId, PresenceStatus) {
    type Error = FormError;

    fn try_from(form: PresenceForm) -> Result<Self, Self::Error> {
        let contact = EntityId::new(form.contact_id).map_err(|_| FormError::InvalidId)?;
        let status = PresenceStatus::try_from(form.status.trim())
            .map_err(|err| FormError::invalid("status", err))?;
        Ok((contact, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_use_their_snake_case_names() {
        let form = InvitationForm {
            contact_id: 3,
            status: "accepted".into(),
        };
        let (_, status) = <(EntityId, InvitationStatus)>::try_from(form).expect("valid form");
        assert_eq!(status, InvitationStatus::Accepted);

        let form = PresenceForm {
            contact_id: 3,
            status: "maybe".into(),
        };
        assert!(<(EntityId, PresenceStatus)>::try_from(form).is_err());
    }
}
