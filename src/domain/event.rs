//! Events (shows, conferences...) with invitations and presence tracking.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::fields::{
    EntityFields, FieldDescriptor, FieldType, FieldValue, opt_datetime, opt_decimal, opt_text,
    required_text, unknown_field,
};
use crate::domain::relation::ids;
use crate::domain::types::{Decimal2, TypeConstraintError};

pub const EVENT_TYPES: &[&str] = &["Show", "Conference", "Breakfast", "Brunch"];

pub const EVENT_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::new("name", "Name", FieldType::String).required(),
    FieldDescriptor::new("event_type", "Type", FieldType::Choice(EVENT_TYPES)).required(),
    FieldDescriptor::new("place", "Place", FieldType::String),
    FieldDescriptor::new("start_date", "Start date", FieldType::DateTime).required(),
    FieldDescriptor::new("end_date", "End date", FieldType::DateTime),
    FieldDescriptor::new("budget", "Budget", FieldType::Decimal),
    FieldDescriptor::new("final_cost", "Final cost", FieldType::Decimal),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("the end date is before the start date")]
    EndBeforeStart,
    #[error("the presence of a contact which was not invited cannot be set")]
    NotInvited,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub name: String,
    pub event_type: String,
    pub place: String,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub budget: Option<Decimal2>,
    pub final_cost: Option<Decimal2>,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            name: String::new(),
            event_type: EVENT_TYPES[0].to_string(),
            place: String::new(),
            start_date: NaiveDateTime::default(),
            end_date: None,
            budget: None,
            final_cost: None,
        }
    }
}

impl Event {
    pub fn validate(&self) -> Result<(), EventError> {
        match self.end_date {
            Some(end) if end < self.start_date => Err(EventError::EndBeforeStart),
            _ => Ok(()),
        }
    }
}

impl EntityFields for Event {
    fn field_values(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("name", FieldValue::text(Some(&self.name))),
            ("event_type", FieldValue::text(Some(&self.event_type))),
            ("place", FieldValue::text(Some(&self.place))),
            ("start_date", FieldValue::DateTime(self.start_date)),
            ("end_date", self.end_date.map_or(FieldValue::Null, FieldValue::DateTime)),
            ("budget", self.budget.map_or(FieldValue::Null, FieldValue::Decimal)),
            ("final_cost", self.final_cost.map_or(FieldValue::Null, FieldValue::Decimal)),
        ]
    }

    fn display_label(&self) -> String {
        self.name.clone()
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), TypeConstraintError> {
        match name {
            "name" => self.name = required_text(value)?,
            "event_type" => self.event_type = required_text(value)?,
            "place" => self.place = opt_text(value).unwrap_or_default(),
            "start_date" => {
                self.start_date = opt_datetime(value)?.ok_or(TypeConstraintError::EmptyString)?
            }
            "end_date" => self.end_date = opt_datetime(value)?,
            "budget" => self.budget = opt_decimal(value)?,
            "final_cost" => self.final_cost = opt_decimal(value)?,
            _ => return Err(unknown_field(name)),
        }
        self.validate()
            .map_err(|err| TypeConstraintError::InvalidValue(err.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    NotInvited,
    Invited,
    Accepted,
    Refused,
}

impl InvitationStatus {
    /// Relation types of the invitation family, from the contact to the event.
    pub const RELATION_TYPES: [&'static str; 3] =
        [ids::INVITED_TO, ids::ACCEPTED_INVITATION, ids::REFUSED_INVITATION];

    /// Relation types the contact must carry for this status.
    pub fn relation_types(self) -> &'static [&'static str] {
        match self {
            InvitationStatus::NotInvited => &[],
            InvitationStatus::Invited => &[ids::INVITED_TO],
            InvitationStatus::Accepted => &[ids::INVITED_TO, ids::ACCEPTED_INVITATION],
            InvitationStatus::Refused => &[ids::INVITED_TO, ids::REFUSED_INVITATION],
        }
    }

    /// Status derived from the relation types linking a contact to an event.
    pub fn from_relation_types<'a>(types: impl IntoIterator<Item = &'a str>) -> Self {
        let mut status = InvitationStatus::NotInvited;
        for type_id in types {
            status = match (type_id, status) {
                (ids::ACCEPTED_INVITATION, _) => InvitationStatus::Accepted,
                (ids::REFUSED_INVITATION, _) => InvitationStatus::Refused,
                (ids::INVITED_TO, InvitationStatus::NotInvited) => InvitationStatus::Invited,
                (_, current) => current,
            };
        }
        status
    }
}

impl TryFrom<&str> for InvitationStatus {
    type Error = TypeConstraintError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "not_invited" => Ok(InvitationStatus::NotInvited),
            "invited" => Ok(InvitationStatus::Invited),
            "accepted" => Ok(InvitationStatus::Accepted),
            "refused" => Ok(InvitationStatus::Refused),
            other => Err(TypeConstraintError::InvalidValue(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Unknown,
    Came,
    NotCame,
}

impl PresenceStatus {
    pub const RELATION_TYPES: [&'static str; 2] = [ids::CAME_EVENT, ids::NOT_CAME_EVENT];

    pub fn relation_type(self) -> Option<&'static str> {
        match self {
            PresenceStatus::Unknown => None,
            PresenceStatus::Came => Some(ids::CAME_EVENT),
            PresenceStatus::NotCame => Some(ids::NOT_CAME_EVENT),
        }
    }
}

impl TryFrom<&str> for PresenceStatus {
    type Error = TypeConstraintError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "unknown" => Ok(PresenceStatus::Unknown),
            "came" => Ok(PresenceStatus::Came),
            "not_came" => Ok(PresenceStatus::NotCame),
            other => Err(TypeConstraintError::InvalidValue(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EventStats {
    pub invitations_count: usize,
    pub accepted_count: usize,
    pub refused_count: usize,
    pub visitors_count: usize,
}

impl EventStats {
    /// Counts the relations of the event's participants, given their type ids.
    pub fn from_relation_types<'a>(types: impl IntoIterator<Item = &'a str>) -> Self {
        types.into_iter().fold(EventStats::default(), |mut stats, type_id| {
            match type_id {
                ids::INVITED_TO => stats.invitations_count += 1,
                ids::ACCEPTED_INVITATION => stats.accepted_count += 1,
                ids::REFUSED_INVITATION => stats.refused_count += 1,
                ids::CAME_EVENT => stats.visitors_count += 1,
                _ => {}
            }
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn invitation_status_from_relations() {
        assert_eq!(
            InvitationStatus::from_relation_types([ids::INVITED_TO, ids::ACCEPTED_INVITATION]),
            InvitationStatus::Accepted
        );
        assert_eq!(
            InvitationStatus::from_relation_types([ids::INVITED_TO]),
            InvitationStatus::Invited
        );
        assert_eq!(
            InvitationStatus::from_relation_types(Vec::<&str>::new()),
            InvitationStatus::NotInvited
        );
    }

    #[test]
    fn stats_count_each_family() {
        let stats = EventStats::from_relation_types([
            ids::INVITED_TO,
            ids::INVITED_TO,
            ids::ACCEPTED_INVITATION,
            ids::REFUSED_INVITATION,
            ids::CAME_EVENT,
            ids::NOT_CAME_EVENT,
        ]);
        assert_eq!(
            stats,
            EventStats {
                invitations_count: 2,
                accepted_count: 1,
                refused_count: 1,
                visitors_count: 1,
            }
        );
    }

    #[test]
    fn end_date_after_start() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .expect("valid datetime");
        let mut event = Event {
            name: "Expo".into(),
            start_date: start,
            ..Default::default()
        };
        assert!(event.validate().is_ok());
        event.end_date = Some(start - chrono::Duration::hours(1));
        assert_eq!(event.validate(), Err(EventError::EndBeforeStart));
    }
}
