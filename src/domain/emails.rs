//! Mailing lists, email templates, campaigns and their sendings.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use thiserror::Error;

use crate::domain::entity::EntityKind;
use crate::domain::fields::{
    EntityFields, FieldDescriptor, FieldType, FieldValue, opt_text, required_text, unknown_field,
};
use crate::domain::types::{EntityId, PublicId, SendingId, TypeConstraintError};

pub const CAMPAIGN_FIELDS: &[FieldDescriptor] =
    &[FieldDescriptor::new("name", "Name of the campaign", FieldType::String).required()];

pub const MAILING_LIST_FIELDS: &[FieldDescriptor] =
    &[FieldDescriptor::new("name", "Name of the mailing list", FieldType::String).required()];

pub const TEMPLATE_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::new("name", "Name", FieldType::String).required(),
    FieldDescriptor::new("subject", "Subject", FieldType::String).required(),
    FieldDescriptor::new("body", "Body", FieldType::Text),
    FieldDescriptor::new("body_html", "Body (HTML)", FieldType::Text),
];

/// Variables available in template bodies.
pub const TEMPLATE_VARIABLES: &[&str] = &["first_name", "last_name", "civility", "name"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("a mailing list cannot contain itself or one of its parents")]
    MailingListCycle,
    #[error("invalid template: {0}")]
    InvalidTemplate(String),
    #[error("the campaign has no mailing list")]
    NoMailingList,
    #[error("the sender address is invalid")]
    InvalidSender,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MailingList {
    pub name: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct EmailCampaign {
    pub name: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct EmailTemplate {
    pub name: String,
    pub subject: String,
    pub body: String,
    pub body_html: String,
}

macro_rules! named_entity_fields {
    ($ty:ty) => {
        impl EntityFields for $ty {
            fn field_values(&self) -> Vec<(&'static str, FieldValue)> {
                vec![("name", FieldValue::text(Some(&self.name)))]
            }

            fn display_label(&self) -> String {
                self.name.clone()
            }

            fn set_field(
                &mut self,
                name: &str,
                value: FieldValue,
            ) -> Result<(), TypeConstraintError> {
                match name {
                    "name" => self.name = required_text(value)?,
                    _ => return Err(unknown_field(name)),
                }
                Ok(())
            }
        }
    };
}

named_entity_fields!(MailingList);
named_entity_fields!(EmailCampaign);

impl EntityFields for EmailTemplate {
    fn field_values(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("name", FieldValue::text(Some(&self.name))),
            ("subject", FieldValue::text(Some(&self.subject))),
            ("body", FieldValue::text(Some(&self.body))),
            ("body_html", FieldValue::text(Some(&self.body_html))),
        ]
    }

    fn display_label(&self) -> String {
        self.name.clone()
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), TypeConstraintError> {
        match name {
            "name" => self.name = required_text(value)?,
            "subject" => self.subject = required_text(value)?,
            "body" => {
                let body = opt_text(value).unwrap_or_default();
                validate_body(&body)
                    .map_err(|err| TypeConstraintError::InvalidValue(err.to_string()))?;
                self.body = body;
            }
            "body_html" => {
                let body = opt_text(value).unwrap_or_default();
                validate_body(&body)
                    .map_err(|err| TypeConstraintError::InvalidValue(err.to_string()))?;
                self.body_html = body;
            }
            _ => return Err(unknown_field(name)),
        }
        Ok(())
    }
}

impl EmailTemplate {
    pub fn validate(&self) -> Result<(), EmailError> {
        validate_body(&self.subject)?;
        validate_body(&self.body)?;
        validate_body(&self.body_html)
    }
}

/// Values substituted in a template for one recipient.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RecipientVars {
    pub first_name: String,
    pub last_name: String,
    pub civility: String,
    pub name: String,
}

/// Renders a template body; unknown variables are errors.
pub fn render_body(body: &str, vars: &RecipientVars, html: bool) -> Result<String, EmailError> {
    let context =
        Context::from_serialize(vars).map_err(|err| EmailError::InvalidTemplate(err.to_string()))?;
    Tera::one_off(body, &context, html).map_err(|err| EmailError::InvalidTemplate(error_chain(&err)))
}

/// Checks the body only uses the known variables.
pub fn validate_body(body: &str) -> Result<(), EmailError> {
    render_body(body, &RecipientVars::default(), false).map(|_| ())
}

fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Whether adding `child` into `parent` would create a cycle in the list hierarchy.
pub fn creates_cycle(
    children: &HashMap<EntityId, Vec<EntityId>>,
    parent: EntityId,
    child: EntityId,
) -> bool {
    let mut stack = vec![child];
    let mut seen = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == parent {
            return true;
        }
        if seen.insert(current)
            && let Some(next) = children.get(&current)
        {
            stack.extend(next.iter().copied());
        }
    }
    false
}

/// Every list reachable from `root`, including itself.
pub fn descendants(children: &HashMap<EntityId, Vec<EntityId>>, root: EntityId) -> Vec<EntityId> {
    let mut result = Vec::new();
    let mut stack = vec![root];
    let mut seen = HashSet::new();
    while let Some(current) = stack.pop() {
        if seen.insert(current) {
            result.push(current);
            if let Some(next) = children.get(&current) {
                stack.extend(next.iter().copied());
            }
        }
    }
    result
}

/// One candidate recipient gathered from a mailing list.
#[derive(Clone, Debug, PartialEq)]
pub struct Recipient {
    pub address: String,
    pub entity_id: Option<EntityId>,
    pub vars: RecipientVars,
}

/// Keeps the first recipient of every (case-insensitive) address, skipping empty ones.
pub fn dedup_recipients(candidates: impl IntoIterator<Item = Recipient>) -> Vec<Recipient> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|mut recipient| {
            let address = recipient.address.trim().to_lowercase();
            if address.is_empty() || !seen.insert(address.clone()) {
                return None;
            }
            recipient.address = address;
            Some(recipient)
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendingKind {
    Immediate,
    Deferred,
}

impl SendingKind {
    pub fn code(self) -> i32 {
        match self {
            SendingKind::Immediate => 1,
            SendingKind::Deferred => 2,
        }
    }
}

impl TryFrom<i32> for SendingKind {
    type Error = TypeConstraintError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SendingKind::Immediate),
            2 => Ok(SendingKind::Deferred),
            other => Err(TypeConstraintError::InvalidValue(format!(
                "sending kind {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendingState {
    Done,
    InProgress,
    Planned,
    Error,
}

impl SendingState {
    pub fn code(self) -> i32 {
        match self {
            SendingState::Done => 1,
            SendingState::InProgress => 2,
            SendingState::Planned => 3,
            SendingState::Error => 4,
        }
    }
}

impl TryFrom<i32> for SendingState {
    type Error = TypeConstraintError;

    fn try_from(value: i32) -> Result<Self, TypeConstraintError> {
        match value {
            1 => Ok(SendingState::Done),
            2 => Ok(SendingState::InProgress),
            3 => Ok(SendingState::Planned),
            4 => Ok(SendingState::Error),
            other => Err(TypeConstraintError::InvalidValue(format!(
                "sending state {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmailSending {
    pub id: SendingId,
    pub campaign_id: EntityId,
    pub sender: String,
    pub kind: SendingKind,
    pub sending_date: NaiveDateTime,
    pub state: SendingState,
    pub subject: String,
    pub body: String,
    pub body_html: String,
}

impl EmailSending {
    /// Planned sendings are sent once their date is reached.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.state == SendingState::Planned && self.sending_date <= now
    }
}

#[derive(Clone, Debug)]
pub struct NewEmailSending {
    pub campaign_id: EntityId,
    pub sender: String,
    pub kind: SendingKind,
    pub sending_date: NaiveDateTime,
    pub subject: String,
    pub body: String,
    pub body_html: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailStatus {
    NotSent,
    Sent,
    SendingError,
}

impl MailStatus {
    pub fn code(self) -> i32 {
        match self {
            MailStatus::NotSent => 1,
            MailStatus::Sent => 2,
            MailStatus::SendingError => 3,
        }
    }
}

impl TryFrom<i32> for MailStatus {
    type Error = TypeConstraintError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MailStatus::NotSent),
            2 => Ok(MailStatus::Sent),
            3 => Ok(MailStatus::SendingError),
            other => Err(TypeConstraintError::InvalidValue(format!(
                "mail status {other}"
            ))),
        }
    }
}

/// One recipient's copy of a sending.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LightWeightEmail {
    pub id: PublicId,
    pub sending_id: SendingId,
    pub recipient: String,
    pub recipient_entity_id: Option<EntityId>,
    pub status: MailStatus,
    pub sending_date: Option<NaiveDateTime>,
    /// Serialized [`RecipientVars`] used to render the body.
    pub body: String,
}

/// A recipient's mail before its sending is stored; it starts as not sent.
#[derive(Clone, Debug, PartialEq)]
pub struct NewLightWeightEmail {
    pub id: PublicId,
    pub recipient: String,
    pub recipient_entity_id: Option<EntityId>,
    pub body: String,
}

impl NewLightWeightEmail {
    pub fn new(recipient: &Recipient) -> Result<Self, EmailError> {
        let body = serde_json::to_string(&recipient.vars)
            .map_err(|err| EmailError::InvalidTemplate(err.to_string()))?;
        Ok(Self {
            id: PublicId::new(),
            recipient: recipient.address.clone(),
            recipient_entity_id: recipient.entity_id,
            body,
        })
    }
}

impl LightWeightEmail {
    pub fn vars(&self) -> RecipientVars {
        serde_json::from_str::<HashMap<String, String>>(&self.body)
            .map(|mut map| RecipientVars {
                first_name: map.remove("first_name").unwrap_or_default(),
                last_name: map.remove("last_name").unwrap_or_default(),
                civility: map.remove("civility").unwrap_or_default(),
                name: map.remove("name").unwrap_or_default(),
            })
            .unwrap_or_default()
    }
}

/// Fully rendered mail ready to be handed to a transport.
#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingMail {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub body_html: String,
}

impl OutgoingMail {
    pub fn render(sending: &EmailSending, mail: &LightWeightEmail) -> Result<Self, EmailError> {
        let vars = mail.vars();
        Ok(Self {
            sender: sending.sender.clone(),
            recipient: mail.recipient.clone(),
            subject: render_body(&sending.subject, &vars, false)?,
            body: render_body(&sending.body, &vars, false)?,
            body_html: render_body(&sending.body_html, &vars, true)?,
        })
    }
}

/// What a mailing list can hold besides raw addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListMemberKind {
    Contact,
    Organisation,
    ChildList,
}

impl ListMemberKind {
    pub fn entity_kind(self) -> EntityKind {
        match self {
            ListMemberKind::Contact => EntityKind::Contact,
            ListMemberKind::Organisation => EntityKind::Organisation,
            ListMemberKind::ChildList => EntityKind::MailingList,
        }
    }
}
