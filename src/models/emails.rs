//! Diesel models for mailing lists, templates, campaigns and their sendings.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::emails::{
    EmailCampaign as DomainCampaign, EmailSending as DomainSending,
    EmailTemplate as DomainTemplate, LightWeightEmail as DomainLightWeightEmail,
    MailStatus, MailingList as DomainMailingList, NewEmailSending as DomainNewSending,
    NewLightWeightEmail, SendingKind, SendingState,
};
use crate::domain::types::{EntityId, SendingId, TypeConstraintError};

#[derive(Debug, Clone, Identifiable, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::mailing_lists, primary_key(entity_id))]
pub struct MailingList {
    pub entity_id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Identifiable, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::email_campaigns, primary_key(entity_id))]
pub struct EmailCampaign {
    pub entity_id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Identifiable, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::email_templates, primary_key(entity_id))]
pub struct EmailTemplate {
    pub entity_id: i32,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub body_html: String,
}

#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::email_recipients)]
pub struct EmailRecipient {
    pub id: i32,
    pub ml_id: i32,
    pub address: String,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::email_recipients)]
pub struct NewEmailRecipient<'a> {
    pub ml_id: i32,
    pub address: &'a str,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::mailing_list_contacts)]
pub struct MailingListContact {
    pub ml_id: i32,
    pub contact_id: i32,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::mailing_list_organisations)]
pub struct MailingListOrganisation {
    pub ml_id: i32,
    pub organisation_id: i32,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::mailing_list_children)]
pub struct MailingListChild {
    pub parent_id: i32,
    pub child_id: i32,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::campaign_mailing_lists)]
pub struct CampaignMailingList {
    pub campaign_id: i32,
    pub ml_id: i32,
}

#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::email_sendings)]
pub struct EmailSending {
    pub id: i32,
    pub campaign_id: i32,
    pub sender: String,
    pub kind: i32,
    pub sending_date: NaiveDateTime,
    pub state: i32,
    pub subject: String,
    pub body: String,
    pub body_html: String,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::email_sendings)]
pub struct NewEmailSending<'a> {
    pub campaign_id: i32,
    pub sender: &'a str,
    pub kind: i32,
    pub sending_date: NaiveDateTime,
    pub state: i32,
    pub subject: &'a str,
    pub body: &'a str,
    pub body_html: &'a str,
}

#[derive(Debug, Clone, Identifiable, Queryable, Insertable)]
#[diesel(table_name = crate::schema::lightweight_emails)]
pub struct LightWeightEmail {
    pub id: String,
    pub sending_id: i32,
    pub recipient: String,
    pub recipient_entity_id: Option<i32>,
    pub status: i32,
    pub sending_date: Option<NaiveDateTime>,
    pub body: String,
}

impl MailingList {
    pub fn from_domain(entity_id: EntityId, list: &DomainMailingList) -> Self {
        Self {
            entity_id: entity_id.get(),
            name: list.name.clone(),
        }
    }
}

impl From<MailingList> for DomainMailingList {
    fn from(list: MailingList) -> Self {
        Self { name: list.name }
    }
}

impl EmailCampaign {
    pub fn from_domain(entity_id: EntityId, campaign: &DomainCampaign) -> Self {
        Self {
            entity_id: entity_id.get(),
            name: campaign.name.clone(),
        }
    }
}

impl From<EmailCampaign> for DomainCampaign {
    fn from(campaign: EmailCampaign) -> Self {
        Self {
            name: campaign.name,
        }
    }
}

impl EmailTemplate {
    pub fn from_domain(entity_id: EntityId, template: &DomainTemplate) -> Self {
        Self {
            entity_id: entity_id.get(),
            name: template.name.clone(),
            subject: template.subject.clone(),
            body: template.body.clone(),
            body_html: template.body_html.clone(),
        }
    }
}

impl From<EmailTemplate> for DomainTemplate {
    fn from(template: EmailTemplate) -> Self {
        Self {
            name: template.name,
            subject: template.subject,
            body: template.body,
            body_html: template.body_html,
        }
    }
}

impl TryFrom<EmailSending> for DomainSending {
    type Error = TypeConstraintError;

    fn try_from(sending: EmailSending) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SendingId::new(sending.id)?,
            campaign_id: EntityId::new(sending.campaign_id)?,
            sender: sending.sender,
            kind: SendingKind::try_from(sending.kind)?,
            sending_date: sending.sending_date,
            state: SendingState::try_from(sending.state)?,
            subject: sending.subject,
            body: sending.body,
            body_html: sending.body_html,
        })
    }
}

impl<'a> From<&'a DomainNewSending> for NewEmailSending<'a> {
    fn from(sending: &'a DomainNewSending) -> Self {
        Self {
            campaign_id: sending.campaign_id.get(),
            sender: &sending.sender,
            kind: sending.kind.code(),
            sending_date: sending.sending_date,
            state: SendingState::Planned.code(),
            subject: &sending.subject,
            body: &sending.body,
            body_html: &sending.body_html,
        }
    }
}

impl LightWeightEmail {
    /// Row of a new mail of the stored sending `sending_id`.
    pub fn pending(sending_id: i32, mail: &NewLightWeightEmail) -> Self {
        Self {
            id: mail.id.to_string(),
            sending_id,
            recipient: mail.recipient.clone(),
            recipient_entity_id: mail.recipient_entity_id.map(EntityId::get),
            status: MailStatus::NotSent.code(),
            sending_date: None,
            body: mail.body.clone(),
        }
    }
}

impl TryFrom<LightWeightEmail> for DomainLightWeightEmail {
    type Error = TypeConstraintError;

    fn try_from(mail: LightWeightEmail) -> Result<Self, Self::Error> {
        Ok(Self {
            id: mail.id.parse()?,
            sending_id: SendingId::new(mail.sending_id)?,
            recipient: mail.recipient,
            recipient_entity_id: mail.recipient_entity_id.map(EntityId::new).transpose()?,
            status: MailStatus::try_from(mail.status)?,
            sending_date: mail.sending_date,
            body: mail.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::emails::Recipient;

    #[test]
    fn new_sendings_are_planned() {
        let sending = DomainNewSending {
            campaign_id: EntityId::new(2).expect("valid id"),
            sender: "news@bebop.example".into(),
            kind: SendingKind::Deferred,
            sending_date: NaiveDateTime::default(),
            subject: "Hello".into(),
            body: "Hi {{first_name}}".into(),
            body_html: String::new(),
        };
        let db = NewEmailSending::from(&sending);
        assert_eq!(db.kind, 2);
        assert_eq!(db.state, SendingState::Planned.code());
    }

    #[test]
    fn lightweight_email_round_trip() {
        let recipient = Recipient {
            address: "faye@bebop.example".into(),
            entity_id: EntityId::new(9).ok(),
            vars: Default::default(),
        };
        let new = NewLightWeightEmail::new(&recipient).expect("serializable vars");
        let db = LightWeightEmail::pending(3, &new);
        assert_eq!(db.status, 1);
        let mail = DomainLightWeightEmail::try_from(db).expect("valid row");
        assert_eq!(mail.id, new.id);
        assert_eq!(mail.sending_id, SendingId::new(3).expect("valid id"));
        assert_eq!(mail.status, MailStatus::NotSent);
    }
}
