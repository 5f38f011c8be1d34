//! Forms of the persons pages.

use serde::Deserialize;

use crate::domain::persons::CustomerStatus;
use crate::domain::types::EntityId;
use crate::forms::FormError;

/// Makes a person a customer, prospect, suspect or inactive customer of a
/// managed organisation.
#[derive(Debug, Deserialize)]
pub struct CustomerForm {
    pub status: String,
    pub managed_id: i32,
}

pub struct CustomerPayload {
    pub status: CustomerStatus,
    pub managed_id: EntityId,
}

impl TryFrom<CustomerForm> for CustomerPayload {
    type Error = FormError;

    fn try_from(form: CustomerForm) -> Result<Self, Self::Error> {
        Ok(Self {
            status: CustomerStatus::try_from(form.status.trim())
                .map_err(|err| FormError::invalid("status", err))?,
            managed_id: EntityId::new(form.managed_id).map_err(|_| FormError::InvalidId)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ManagedForm {
    #[serde(default)]
    pub is_managed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_form_parses_the_status() {
        let form = CustomerForm {
            status: " prospect ".into(),
            managed_id: 1,
        };
        let payload = CustomerPayload::try_from(form).expect("valid form");
        assert_eq!(payload.status, CustomerStatus::Prospect);

        let form = CustomerForm {
            status: "friend".into(),
            managed_id: 1,
        };
        assert!(CustomerPayload::try_from(form).is_err());
    }
}
