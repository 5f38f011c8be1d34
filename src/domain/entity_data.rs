//! Kind-specific part of an entity, as one value.

use serde::Serialize;

use crate::domain::activity::Activity;
use crate::domain::billing::BillingDocument;
use crate::domain::emails::{EmailCampaign, EmailTemplate, MailingList};
use crate::domain::entity::{Entity, EntityKind};
use crate::domain::event::Event;
use crate::domain::fields::{EntityFields, FieldValue};
use crate::domain::persons::{Contact, Organisation};
use crate::domain::recurrent::RecurrentGenerator;
use crate::domain::types::TypeConstraintError;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EntityData {
    Contact(Contact),
    Organisation(Organisation),
    Activity(Activity),
    /// Every billing kind; the kind itself lives on the base record.
    Document(BillingDocument),
    MailingList(MailingList),
    EmailCampaign(EmailCampaign),
    EmailTemplate(EmailTemplate),
    Event(Event),
    RecurrentGenerator(RecurrentGenerator),
}

pub type AnyEntity = Entity<EntityData>;

impl EntityData {
    /// Blank data used by creation forms.
    ///
    /// Generators need a template and are built by their own form.
    pub fn blank(kind: EntityKind) -> Option<EntityData> {
        let data = match kind {
            EntityKind::Contact => EntityData::Contact(Contact::default()),
            EntityKind::Organisation => EntityData::Organisation(Organisation::default()),
            EntityKind::Activity => EntityData::Activity(Activity::default()),
            EntityKind::Invoice
            | EntityKind::Quote
            | EntityKind::SalesOrder
            | EntityKind::CreditNote
            | EntityKind::TemplateBase => EntityData::Document(BillingDocument::default()),
            EntityKind::MailingList => EntityData::MailingList(MailingList::default()),
            EntityKind::EmailCampaign => EntityData::EmailCampaign(EmailCampaign::default()),
            EntityKind::EmailTemplate => EntityData::EmailTemplate(EmailTemplate::default()),
            EntityKind::Event => EntityData::Event(Event::default()),
            EntityKind::RecurrentGenerator => return None,
        };
        Some(data)
    }

    /// Whether the data can be stored for an entity of `kind`.
    pub fn fits(&self, kind: EntityKind) -> bool {
        match self {
            EntityData::Contact(_) => kind == EntityKind::Contact,
            EntityData::Organisation(_) => kind == EntityKind::Organisation,
            EntityData::Activity(_) => kind == EntityKind::Activity,
            EntityData::Document(_) => kind.is_billing_document(),
            EntityData::MailingList(_) => kind == EntityKind::MailingList,
            EntityData::EmailCampaign(_) => kind == EntityKind::EmailCampaign,
            EntityData::EmailTemplate(_) => kind == EntityKind::EmailTemplate,
            EntityData::Event(_) => kind == EntityKind::Event,
            EntityData::RecurrentGenerator(_) => kind == EntityKind::RecurrentGenerator,
        }
    }

    fn fields(&self) -> &dyn EntityFields {
        match self {
            EntityData::Contact(data) => data,
            EntityData::Organisation(data) => data,
            EntityData::Activity(data) => data,
            EntityData::Document(data) => data,
            EntityData::MailingList(data) => data,
            EntityData::EmailCampaign(data) => data,
            EntityData::EmailTemplate(data) => data,
            EntityData::Event(data) => data,
            EntityData::RecurrentGenerator(data) => data,
        }
    }

    fn fields_mut(&mut self) -> &mut dyn EntityFields {
        match self {
            EntityData::Contact(data) => data,
            EntityData::Organisation(data) => data,
            EntityData::Activity(data) => data,
            EntityData::Document(data) => data,
            EntityData::MailingList(data) => data,
            EntityData::EmailCampaign(data) => data,
            EntityData::EmailTemplate(data) => data,
            EntityData::Event(data) => data,
            EntityData::RecurrentGenerator(data) => data,
        }
    }

    pub fn as_contact(&self) -> Option<&Contact> {
        match self {
            EntityData::Contact(contact) => Some(contact),
            _ => None,
        }
    }

    pub fn as_organisation(&self) -> Option<&Organisation> {
        match self {
            EntityData::Organisation(organisation) => Some(organisation),
            _ => None,
        }
    }

    pub fn as_activity(&self) -> Option<&Activity> {
        match self {
            EntityData::Activity(activity) => Some(activity),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&BillingDocument> {
        match self {
            EntityData::Document(document) => Some(document),
            _ => None,
        }
    }

    pub fn as_event(&self) -> Option<&Event> {
        match self {
            EntityData::Event(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_template(&self) -> Option<&EmailTemplate> {
        match self {
            EntityData::EmailTemplate(template) => Some(template),
            _ => None,
        }
    }

    pub fn as_generator(&self) -> Option<&RecurrentGenerator> {
        match self {
            EntityData::RecurrentGenerator(generator) => Some(generator),
            _ => None,
        }
    }

    /// Email address of a person, if any.
    pub fn email(&self) -> Option<&str> {
        match self {
            EntityData::Contact(contact) => contact.email.as_deref(),
            EntityData::Organisation(organisation) => organisation.email.as_deref(),
            _ => None,
        }
        .filter(|email| !email.is_empty())
    }
}

impl EntityFields for EntityData {
    fn field_values(&self) -> Vec<(&'static str, FieldValue)> {
        self.fields().field_values()
    }

    fn display_label(&self) -> String {
        self.fields().display_label()
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), TypeConstraintError> {
        self.fields_mut().set_field(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_data_fits_its_kind() {
        for kind in EntityKind::ALL {
            if let Some(data) = EntityData::blank(kind) {
                assert!(data.fits(kind), "{kind}");
            }
        }
        assert!(EntityData::blank(EntityKind::RecurrentGenerator).is_none());
        assert!(!EntityData::Contact(Contact::default()).fits(EntityKind::Organisation));
    }

    #[test]
    fn delegates_field_access() {
        let mut data = EntityData::Organisation(Organisation::new("Bebop"));
        data.set_field("sector", FieldValue::Text("Bounty hunting".into()))
            .expect("known field");
        assert_eq!(data.display_label(), "Bebop");
        assert!(
            data.field_values()
                .contains(&("sector", FieldValue::Text("Bounty hunting".into())))
        );
        assert_eq!(data.email(), None);
    }
}
