//! Forms of mailing lists, campaigns and sendings.

use chrono::NaiveDateTime;
use serde::Deserialize;
use validator::Validate;

use crate::domain::emails::SendingKind;
use crate::domain::fields::parse_datetime;
use crate::domain::types::{Email, EntityId};
use crate::forms::{FormError, parse_ids};

/// Contacts, organisations or child lists added to a mailing list.
#[derive(Debug, Deserialize, Validate)]
pub struct MembersForm {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub ids: Vec<i32>,
}

impl TryFrom<MembersForm> for Vec<EntityId> {
    type Error = FormError;

    fn try_from(form: MembersForm) -> Result<Self, Self::Error> {
        form.validate()?;
        parse_ids(&form.ids)
    }
}

/// Free addresses, one per line.
#[derive(Debug, Deserialize)]
pub struct RecipientsForm {
    #[serde(default)]
    pub recipients: String,
}

impl TryFrom<RecipientsForm> for Vec<String> {
    type Error = FormError;

    fn try_from(form: RecipientsForm) -> Result<Self, Self::Error> {
        let mut addresses: Vec<String> = Vec::new();
        for line in form
            .recipients
            .lines()
            .flat_map(|line| line.split([',', ';']))
            .map(str::trim)
            .filter(|line| !line.is_empty())
        {
            let email = Email::new(line).map_err(|_| FormError::InvalidEmail)?;
            if !addresses.iter().any(|known| known == email.as_str()) {
                addresses.push(email.as_str().to_string());
            }
        }
        if addresses.is_empty() {
            return Err(FormError::invalid("recipients", "no address given"));
        }
        Ok(addresses)
    }
}

#[derive(Debug, Deserialize)]
pub struct RemoveRecipientForm {
    pub address: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendingForm {
    #[validate(email)]
    pub sender: String,
    /// Code of the [`SendingKind`].
    pub kind: i32,
    #[serde(default)]
    pub sending_date: Option<String>,
    /// Template whose subject and bodies are copied.
    pub template_id: i32,
}

pub struct SendingPayload {
    pub sender: Email,
    pub kind: SendingKind,
    pub sending_date: Option<NaiveDateTime>,
    pub template_id: EntityId,
}

impl TryFrom<SendingForm> for SendingPayload {
    type Error = FormError;

    fn try_from(form: SendingForm) -> Result<Self, Self::Error> {
        form.validate()?;
        let kind = SendingKind::try_from(form.kind).map_err(|err| FormError::invalid("kind", err))?;
        let sending_date = match form.sending_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_datetime(raw).ok_or_else(|| FormError::InvalidDate(raw.into()))?),
        };
        if kind == SendingKind::Deferred && sending_date.is_none() {
            return Err(FormError::invalid(
                "sending_date",
                "a deferred sending needs a date",
            ));
        }
        Ok(Self {
            sender: Email::new(form.sender).map_err(|_| FormError::InvalidEmail)?,
            kind,
            sending_date,
            template_id: EntityId::new(form.template_id).map_err(|_| FormError::InvalidId)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients_are_split_and_deduplicated() {
        let form = RecipientsForm {
            recipients: "spike@bebop.mars\njet@bebop.mars; spike@bebop.mars\n\n".into(),
        };
        let addresses = Vec::<String>::try_from(form).expect("valid addresses");
        assert_eq!(addresses, vec!["spike@bebop.mars", "jet@bebop.mars"]);
    }

    #[test]
    fn invalid_recipients_are_rejected() {
        let form = RecipientsForm {
            recipients: "not an address".into(),
        };
        assert!(matches!(
            Vec::<String>::try_from(form),
            Err(FormError::InvalidEmail)
        ));
    }

    #[test]
    fn deferred_sendings_need_a_date() {
        let form = SendingForm {
            sender: "faye@bebop.mars".into(),
            kind: 2,
            sending_date: None,
            template_id: 4,
        };
        assert!(SendingPayload::try_from(form).is_err());
    }
}
