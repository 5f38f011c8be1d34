//! Polymorphic base record shared by every first-class CRM object.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{EntityId, PublicId, TypeConstraintError, UserId};

/// Kind ("content type") of an entity. The string form is `app.model`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntityKind {
    Contact,
    Organisation,
    Activity,
    Invoice,
    Quote,
    SalesOrder,
    CreditNote,
    TemplateBase,
    EmailCampaign,
    MailingList,
    EmailTemplate,
    Event,
    RecurrentGenerator,
}

impl EntityKind {
    pub const ALL: [EntityKind; 13] = [
        EntityKind::Contact,
        EntityKind::Organisation,
        EntityKind::Activity,
        EntityKind::Invoice,
        EntityKind::Quote,
        EntityKind::SalesOrder,
        EntityKind::CreditNote,
        EntityKind::TemplateBase,
        EntityKind::EmailCampaign,
        EntityKind::MailingList,
        EntityKind::EmailTemplate,
        EntityKind::Event,
        EntityKind::RecurrentGenerator,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Contact => "persons.contact",
            EntityKind::Organisation => "persons.organisation",
            EntityKind::Activity => "activities.activity",
            EntityKind::Invoice => "billing.invoice",
            EntityKind::Quote => "billing.quote",
            EntityKind::SalesOrder => "billing.salesorder",
            EntityKind::CreditNote => "billing.creditnote",
            EntityKind::TemplateBase => "billing.templatebase",
            EntityKind::EmailCampaign => "emails.emailcampaign",
            EntityKind::MailingList => "emails.mailinglist",
            EntityKind::EmailTemplate => "emails.emailtemplate",
            EntityKind::Event => "events.event",
            EntityKind::RecurrentGenerator => "recurrents.recurrentgenerator",
        }
    }

    pub const fn verbose_name(self) -> &'static str {
        match self {
            EntityKind::Contact => "Contact",
            EntityKind::Organisation => "Organisation",
            EntityKind::Activity => "Activity",
            EntityKind::Invoice => "Invoice",
            EntityKind::Quote => "Quote",
            EntityKind::SalesOrder => "Sales order",
            EntityKind::CreditNote => "Credit note",
            EntityKind::TemplateBase => "Template",
            EntityKind::EmailCampaign => "Emailing campaign",
            EntityKind::MailingList => "Mailing list",
            EntityKind::EmailTemplate => "Email template",
            EntityKind::Event => "Event",
            EntityKind::RecurrentGenerator => "Recurrent generator",
        }
    }

    /// Billing document kinds share the same storage and line management.
    pub const fn is_billing_document(self) -> bool {
        matches!(
            self,
            EntityKind::Invoice
                | EntityKind::Quote
                | EntityKind::SalesOrder
                | EntityKind::CreditNote
                | EntityKind::TemplateBase
        )
    }

    /// Short slug used in URLs (`/contact/12`, `/list/invoice`).
    pub fn slug(self) -> &'static str {
        self.as_str()
            .split_once('.')
            .map(|(_, model)| model)
            .unwrap_or(self.as_str())
    }

    pub fn from_slug(slug: &str) -> Option<EntityKind> {
        EntityKind::ALL.into_iter().find(|kind| kind.slug() == slug)
    }

    /// Parses a comma-separated list of kinds as stored in the database.
    pub fn parse_list(raw: &str) -> Result<Vec<EntityKind>, TypeConstraintError> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }

    pub fn join_list(kinds: &[EntityKind]) -> String {
        kinds
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = TypeConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TypeConstraintError::InvalidValue(format!("unknown entity kind {s}")))
    }
}

impl TryFrom<String> for EntityKind {
    type Error = TypeConstraintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityKind> for String {
    fn from(value: EntityKind) -> Self {
        value.as_str().to_string()
    }
}

/// Base data of every entity.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CremeEntity {
    pub id: EntityId,
    pub uuid: PublicId,
    pub kind: EntityKind,
    pub user_id: UserId,
    pub description: String,
    pub header_filter_search_field: String,
    pub is_deleted: bool,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

impl CremeEntity {
    /// Display label of the entity.
    pub fn label(&self) -> &str {
        &self.header_filter_search_field
    }
}

/// An entity together with its kind-specific data.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Entity<T> {
    pub base: CremeEntity,
    pub data: T,
}

impl<T> Entity<T> {
    pub fn id(&self) -> EntityId {
        self.base.id
    }
}

/// Base data required to create a new entity of any kind.
#[derive(Clone, Debug)]
pub struct NewEntity {
    pub uuid: PublicId,
    pub kind: EntityKind,
    pub user_id: UserId,
    pub description: String,
    pub header_filter_search_field: String,
}

impl NewEntity {
    pub fn new(kind: EntityKind, user_id: UserId, description: impl Into<String>) -> Self {
        Self {
            uuid: PublicId::new(),
            kind,
            user_id,
            description: ammonia::clean(description.into().trim()),
            header_filter_search_field: String::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.header_filter_search_field = label.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_strings_and_slugs() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>(), Ok(kind));
            assert_eq!(EntityKind::from_slug(kind.slug()), Some(kind));
        }
        assert!("persons.unknown".parse::<EntityKind>().is_err());
    }

    #[test]
    fn parses_comma_separated_kind_lists() {
        let kinds = EntityKind::parse_list("persons.contact, persons.organisation,").expect("valid");
        assert_eq!(kinds, vec![EntityKind::Contact, EntityKind::Organisation]);
        assert_eq!(EntityKind::join_list(&kinds), "persons.contact,persons.organisation");
        assert_eq!(EntityKind::parse_list("").expect("valid"), Vec::new());
    }
}
