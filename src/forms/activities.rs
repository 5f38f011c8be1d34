//! Forms of the activities and calendars pages.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use validator::Validate;

use crate::domain::activity::{Activity, ScheduleInput};
use crate::domain::fields::{parse_date, parse_datetime};
use crate::domain::types::{CalendarId, EntityId};
use crate::forms::{FormError, parse_ids};

fn optional<T>(
    raw: &Option<String>,
    field: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, FormError> {
    match raw.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => parse(value)
            .map(Some)
            .ok_or_else(|| FormError::invalid(field, format!("invalid value \"{value}\""))),
    }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

#[derive(Debug, Deserialize, Validate)]
pub struct ActivityForm {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1))]
    pub type_id: String,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub busy: bool,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub minutes: String,
    #[serde(default)]
    pub description: String,
    /// Contacts taking part, checked for collisions.
    #[serde(default)]
    pub participants: Vec<i32>,
    /// Calendar of the creator; the default one when missing.
    #[serde(default)]
    pub calendar_id: Option<i32>,
}

pub struct ActivityPayload {
    /// Activity without its schedule, which needs the type's default duration.
    pub activity: Activity,
    pub schedule: ScheduleInput,
    pub description: String,
    pub participants: Vec<EntityId>,
    pub calendar_id: Option<CalendarId>,
}

impl TryFrom<ActivityForm> for ActivityPayload {
    type Error = FormError;

    fn try_from(form: ActivityForm) -> Result<Self, Self::Error> {
        form.validate()?;
        let schedule = ScheduleInput {
            start_date: optional(&form.start_date, "start_date", parse_date)?,
            start_time: optional(&form.start_time, "start_time", parse_time)?,
            end_date: optional(&form.end_date, "end_date", parse_date)?,
            end_time: optional(&form.end_time, "end_time", parse_time)?,
            is_all_day: form.is_all_day,
        };
        let mut activity = Activity::new(form.title, form.type_id.trim());
        activity.sub_type = form.sub_type.filter(|value| !value.trim().is_empty());
        activity.status = form.status.filter(|value| !value.trim().is_empty());
        activity.busy = form.busy;
        activity.place = form.place.trim().to_string();
        activity.minutes = form.minutes;

        let mut participants: Vec<EntityId> = parse_ids(&form.participants)?;
        participants.sort();
        participants.dedup();

        Ok(Self {
            activity,
            schedule,
            description: form.description,
            participants,
            calendar_id: form
                .calendar_id
                .map(CalendarId::new)
                .transpose()
                .map_err(|_| FormError::InvalidId)?,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ParticipantsForm {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub contact_ids: Vec<i32>,
}

impl TryFrom<ParticipantsForm> for Vec<EntityId> {
    type Error = FormError;

    fn try_from(form: ParticipantsForm) -> Result<Self, Self::Error> {
        form.validate()?;
        parse_ids(&form.contact_ids)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CalendarForm {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_default: bool,
    /// Hexadecimal colour without `#`; picked from the palette when empty.
    #[serde(default)]
    #[validate(length(max = 6))]
    pub color: String,
}

/// Calendars an activity is displayed in.
#[derive(Debug, Deserialize)]
pub struct ActivityCalendarsForm {
    #[serde(default)]
    pub calendar_ids: Vec<i32>,
}

/// Query of the calendar feed.
#[derive(Debug, Deserialize)]
pub struct CalendarFeedQuery {
    /// Comma separated calendar ids.
    #[serde(default)]
    pub calendars: String,
    pub start: String,
    pub end: String,
}

pub struct CalendarFeedPayload {
    pub calendar_ids: Vec<CalendarId>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

fn feed_bound(raw: &str) -> Result<NaiveDateTime, FormError> {
    parse_datetime(raw)
        .or_else(|| parse_date(raw).map(|date: NaiveDate| date.and_time(NaiveTime::MIN)))
        .ok_or_else(|| FormError::InvalidDate(raw.to_string()))
}

impl TryFrom<CalendarFeedQuery> for CalendarFeedPayload {
    type Error = FormError;

    fn try_from(query: CalendarFeedQuery) -> Result<Self, Self::Error> {
        let calendar_ids = query
            .calendars
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| id.parse::<CalendarId>().map_err(|_| FormError::InvalidId))
            .collect::<Result<Vec<_>, _>>()?;
        let start = feed_bound(query.start.trim())?;
        let end = feed_bound(query.end.trim())?;
        if end < start {
            return Err(FormError::invalid("end", "the end is before the start"));
        }
        Ok(Self {
            calendar_ids,
            start,
            end,
        })
    }
}

/// Drag & drop of an activity in the calendar.
#[derive(Debug, Deserialize)]
pub struct ActivityDatesForm {
    pub id: i32,
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub all_day: bool,
}

pub struct ActivityDatesPayload {
    pub id: EntityId,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub all_day: bool,
}

impl TryFrom<ActivityDatesForm> for ActivityDatesPayload {
    type Error = FormError;

    fn try_from(form: ActivityDatesForm) -> Result<Self, Self::Error> {
        Ok(Self {
            id: EntityId::new(form.id).map_err(|_| FormError::InvalidId)?,
            start: feed_bound(form.start.trim())?,
            end: optional(&form.end, "end", parse_datetime)?,
            all_day: form.all_day,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> ActivityForm {
        ActivityForm {
            title: " Briefing ".into(),
            type_id: "activities-activitytype_meeting".into(),
            sub_type: Some(" ".into()),
            status: None,
            start_date: Some("2071-05-02".into()),
            start_time: Some("10:30".into()),
            end_date: None,
            end_time: None,
            is_all_day: false,
            busy: true,
            place: "Bebop".into(),
            minutes: String::new(),
            description: String::new(),
            participants: vec![4, 4, 2],
            calendar_id: None,
        }
    }

    #[test]
    fn activity_form_builds_the_schedule_input() {
        let payload = ActivityPayload::try_from(form()).expect("valid form");
        assert_eq!(payload.activity.title, "Briefing");
        assert_eq!(payload.activity.sub_type, None);
        assert!(payload.schedule.start_time.is_some());
        assert_eq!(payload.participants.len(), 2);
    }

    #[test]
    fn invalid_times_are_reported() {
        let mut bad = form();
        bad.start_time = Some("25h".into());
        assert!(ActivityPayload::try_from(bad).is_err());
    }

    #[test]
    fn feed_query_accepts_dates_and_datetimes() {
        let query = CalendarFeedQuery {
            calendars: "1, 2".into(),
            start: "2071-05-01".into(),
            end: "2071-05-08T00:00:00".into(),
        };
        let payload = CalendarFeedPayload::try_from(query).expect("valid query");
        assert_eq!(payload.calendar_ids.len(), 2);
        assert!(payload.start < payload.end);
    }
}
