//! Activities (meetings, phone calls, tasks...) and user calendars.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::fields::{
    EntityFields, FieldDescriptor, FieldType, FieldValue, opt_datetime, opt_text, required_bool,
    required_text, unknown_field,
};
use crate::domain::types::{CalendarId, EntityId, TypeConstraintError, UserId};

pub const TYPE_TASK: &str = "activities-activitytype_task";
pub const TYPE_MEETING: &str = "activities-activitytype_meeting";
pub const TYPE_PHONECALL: &str = "activities-activitytype_phonecall";
pub const TYPE_GATHERING: &str = "activities-activitytype_gathering";
pub const TYPE_SHOW: &str = "activities-activitytype_show";
pub const TYPE_DEMO: &str = "activities-activitytype_demo";
pub const TYPE_INDISPO: &str = "activities-activitytype_indispo";

pub const ACTIVITY_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::new("title", "Title", FieldType::String).required(),
    FieldDescriptor::new("type_id", "Activity type", FieldType::Reference).required(),
    FieldDescriptor::new("sub_type", "Activity sub-type", FieldType::String),
    FieldDescriptor::new("status", "Status", FieldType::String),
    FieldDescriptor::new("start", "Start", FieldType::DateTime),
    FieldDescriptor::new("end", "End", FieldType::DateTime),
    FieldDescriptor::new("is_all_day", "All day", FieldType::Boolean),
    FieldDescriptor::new("busy", "Busy", FieldType::Boolean),
    FieldDescriptor::new("floating_type", "Floating type", FieldType::Integer).read_only(),
    FieldDescriptor::new("place", "Activity place", FieldType::String),
    FieldDescriptor::new("minutes", "Minutes", FieldType::Text),
];

/// Colours assigned to the default calendars.
pub const CALENDAR_PALETTE: &[&str] = &[
    "c1d9ec", "ffcc99", "ccffcc", "ffff99", "e6ccff", "ffb3b3", "b3e6ff", "d9d9d9",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActivityError {
    #[error("the end is before the start")]
    EndBeforeStart,
    #[error("an end date needs a start date")]
    EndWithoutStart,
    #[error("{participant} already participates to \"{title}\" at the same time")]
    Collision { participant: String, title: String },
    #[error("unknown activity type {0}")]
    UnknownType(String),
}

/// How precisely an activity is placed in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatingType {
    #[default]
    Normal,
    /// Dated but without hours.
    FloatingTime,
    /// Not dated at all.
    Floating,
}

impl FloatingType {
    pub fn code(self) -> i32 {
        match self {
            FloatingType::Normal => 1,
            FloatingType::FloatingTime => 2,
            FloatingType::Floating => 3,
        }
    }
}

impl TryFrom<i32> for FloatingType {
    type Error = TypeConstraintError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FloatingType::Normal),
            2 => Ok(FloatingType::FloatingTime),
            3 => Ok(FloatingType::Floating),
            other => Err(TypeConstraintError::InvalidValue(format!(
                "floating type {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActivityType {
    pub id: String,
    pub name: String,
    pub default_duration_minutes: i32,
    pub is_custom: bool,
}

impl ActivityType {
    pub fn default_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.default_duration_minutes.max(0)))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub title: String,
    pub type_id: String,
    pub sub_type: Option<String>,
    pub status: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub is_all_day: bool,
    pub busy: bool,
    pub floating_type: FloatingType,
    pub place: String,
    pub minutes: String,
}

/// Raw schedule input as typed by the user.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScheduleInput {
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<NaiveTime>,
    pub is_all_day: bool,
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
}

impl Activity {
    pub fn new(title: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            title: title.into().trim().to_string(),
            type_id: type_id.into(),
            ..Default::default()
        }
    }

    /// Computes start, end and floating type from the user input.
    pub fn apply_schedule(
        &mut self,
        input: ScheduleInput,
        default_duration: Duration,
    ) -> Result<(), ActivityError> {
        self.is_all_day = input.is_all_day;
        let Some(start_date) = input.start_date else {
            if input.end_date.is_some() {
                return Err(ActivityError::EndWithoutStart);
            }
            self.start = None;
            self.end = None;
            self.floating_type = FloatingType::Floating;
            self.is_all_day = false;
            return Ok(());
        };

        let end_date = input.end_date.unwrap_or(start_date);
        if input.is_all_day || (input.start_time.is_none() && input.end_time.is_none()) {
            self.floating_type = if input.is_all_day {
                FloatingType::Normal
            } else {
                FloatingType::FloatingTime
            };
            self.start = Some(start_date.and_time(NaiveTime::MIN));
            self.end = Some(end_of_day(end_date));
        } else {
            self.floating_type = FloatingType::Normal;
            let start = start_date.and_time(input.start_time.unwrap_or(NaiveTime::MIN));
            let end = match (input.end_date, input.end_time) {
                (_, Some(time)) => end_date.and_time(time),
                (Some(date), None) => end_of_day(date),
                (None, None) => start + default_duration,
            };
            self.start = Some(start);
            self.end = Some(end);
        }
        self.check_dates()
    }

    pub fn check_dates(&self) -> Result<(), ActivityError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if end < start => Err(ActivityError::EndBeforeStart),
            (None, Some(_)) => Err(ActivityError::EndWithoutStart),
            _ => Ok(()),
        }
    }

    /// Only dated busy activities block an agenda; indisponibilities never collide.
    pub fn blocks_agenda(&self) -> bool {
        self.floating_type != FloatingType::Floating && self.busy && self.type_id != TYPE_INDISPO
    }

    /// True when both activities block the agenda over a common period.
    pub fn overlaps(&self, other: &Activity) -> bool {
        if !self.blocks_agenda() || !other.blocks_agenda() {
            return false;
        }
        match (self.start, self.end, other.start, other.end) {
            (Some(s1), Some(e1), Some(s2), Some(e2)) => s1 < e2 && s2 < e1,
            _ => false,
        }
    }

    /// Moves the activity keeping its duration (calendar drag & drop).
    pub fn reschedule(
        &mut self,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
        is_all_day: bool,
    ) -> Result<(), ActivityError> {
        let duration = match (self.start, self.end) {
            (Some(s), Some(e)) => e - s,
            _ => Duration::zero(),
        };
        self.start = Some(start);
        self.end = Some(end.unwrap_or(start + duration));
        self.is_all_day = is_all_day;
        self.floating_type = FloatingType::Normal;
        self.check_dates()
    }
}

/// Checks that `activity` does not overlap any of the busy activities of a participant.
pub fn check_collisions<'a>(
    activity_id: Option<EntityId>,
    activity: &Activity,
    participant: &str,
    others: impl IntoIterator<Item = (EntityId, &'a Activity)>,
) -> Result<(), ActivityError> {
    for (other_id, other) in others {
        if Some(other_id) == activity_id {
            continue;
        }
        if activity.overlaps(other) {
            return Err(ActivityError::Collision {
                participant: participant.to_string(),
                title: other.title.clone(),
            });
        }
    }
    Ok(())
}

impl EntityFields for Activity {
    fn field_values(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("title", FieldValue::text(Some(&self.title))),
            ("type_id", FieldValue::text(Some(&self.type_id))),
            ("sub_type", FieldValue::text(self.sub_type.as_ref())),
            ("status", FieldValue::text(self.status.as_ref())),
            ("start", self.start.map_or(FieldValue::Null, FieldValue::DateTime)),
            ("end", self.end.map_or(FieldValue::Null, FieldValue::DateTime)),
            ("is_all_day", FieldValue::Boolean(self.is_all_day)),
            ("busy", FieldValue::Boolean(self.busy)),
            (
                "floating_type",
                FieldValue::Integer(i64::from(self.floating_type.code())),
            ),
            ("place", FieldValue::text(Some(&self.place))),
            ("minutes", FieldValue::text(Some(&self.minutes))),
        ]
    }

    fn display_label(&self) -> String {
        self.title.clone()
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), TypeConstraintError> {
        match name {
            "title" => self.title = required_text(value)?,
            "type_id" => self.type_id = required_text(value)?,
            "sub_type" => self.sub_type = opt_text(value),
            "status" => self.status = opt_text(value),
            "start" => {
                self.start = opt_datetime(value)?;
                self.floating_type = if self.start.is_some() {
                    FloatingType::Normal
                } else {
                    FloatingType::Floating
                };
            }
            "end" => self.end = opt_datetime(value)?,
            "is_all_day" => self.is_all_day = required_bool(value)?,
            "busy" => self.busy = required_bool(value)?,
            "place" => self.place = opt_text(value).unwrap_or_default(),
            "minutes" => self.minutes = opt_text(value).unwrap_or_default(),
            _ => return Err(unknown_field(name)),
        }
        self.check_dates()
            .map_err(|err| TypeConstraintError::InvalidValue(err.to_string()))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Calendar {
    pub id: CalendarId,
    pub user_id: UserId,
    pub name: String,
    pub is_default: bool,
    pub is_public: bool,
    pub color: String,
}

#[derive(Clone, Debug)]
pub struct NewCalendar {
    pub user_id: UserId,
    pub name: String,
    pub is_default: bool,
    pub is_public: bool,
    pub color: String,
}

impl NewCalendar {
    /// The calendar lazily created for a user without any calendar.
    pub fn default_for(user_id: UserId, user_name: &str) -> Self {
        Self {
            user_id,
            name: format!("{user_name}'s calendar"),
            is_default: true,
            is_public: false,
            color: default_color(user_id).to_string(),
        }
    }
}

pub fn default_color(user_id: UserId) -> &'static str {
    let index = user_id.get().unsigned_abs() as usize % CALENDAR_PALETTE.len();
    CALENDAR_PALETTE[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    fn meeting(start: (u32, u32), end: (u32, u32)) -> Activity {
        let mut activity = Activity::new("Meeting", TYPE_MEETING);
        activity.busy = true;
        activity
            .apply_schedule(
                ScheduleInput {
                    start_date: Some(date(2024, 3, 1)),
                    start_time: Some(time(start.0, start.1)),
                    end_date: None,
                    end_time: Some(time(end.0, end.1)),
                    is_all_day: false,
                },
                Duration::minutes(60),
            )
            .expect("valid schedule");
        activity
    }

    #[test]
    fn undated_activity_is_floating() {
        let mut activity = Activity::new("Call back", TYPE_PHONECALL);
        activity
            .apply_schedule(ScheduleInput::default(), Duration::minutes(15))
            .expect("valid schedule");
        assert_eq!(activity.floating_type, FloatingType::Floating);
        assert!(activity.start.is_none() && activity.end.is_none());
    }

    #[test]
    fn date_without_time_is_floating_time() {
        let mut activity = Activity::new("Task", TYPE_TASK);
        activity
            .apply_schedule(
                ScheduleInput {
                    start_date: Some(date(2024, 3, 1)),
                    ..Default::default()
                },
                Duration::minutes(15),
            )
            .expect("valid schedule");
        assert_eq!(activity.floating_type, FloatingType::FloatingTime);
        assert_eq!(activity.start, Some(date(2024, 3, 1).and_time(NaiveTime::MIN)));
    }

    #[test]
    fn end_defaults_to_type_duration() {
        let mut activity = Activity::new("Call", TYPE_PHONECALL);
        activity
            .apply_schedule(
                ScheduleInput {
                    start_date: Some(date(2024, 3, 1)),
                    start_time: Some(time(10, 0)),
                    ..Default::default()
                },
                Duration::minutes(15),
            )
            .expect("valid schedule");
        assert_eq!(activity.end, Some(date(2024, 3, 1).and_time(time(10, 15))));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let mut activity = Activity::new("Meeting", TYPE_MEETING);
        let result = activity.apply_schedule(
            ScheduleInput {
                start_date: Some(date(2024, 3, 2)),
                start_time: Some(time(10, 0)),
                end_date: Some(date(2024, 3, 1)),
                end_time: Some(time(11, 0)),
                is_all_day: false,
            },
            Duration::minutes(60),
        );
        assert_eq!(result, Err(ActivityError::EndBeforeStart));
    }

    #[test]
    fn busy_activities_collide() {
        let first = meeting((10, 0), (11, 0));
        let second = meeting((10, 30), (12, 0));
        let third = meeting((11, 0), (12, 0));
        assert!(first.overlaps(&second));
        assert!(!first.overlaps(&third));

        let others = [(EntityId::new(2).expect("valid id"), &second)];
        assert!(matches!(
            check_collisions(None, &first, "Spike", others),
            Err(ActivityError::Collision { .. })
        ));

        let mut relaxed = second.clone();
        relaxed.busy = false;
        assert!(!first.overlaps(&relaxed));
    }

    #[test]
    fn indisponibilities_do_not_collide() {
        let busy_meeting = meeting((10, 0), (12, 0));
        let mut indispo = meeting((11, 0), (13, 0));
        indispo.type_id = TYPE_INDISPO.to_string();
        indispo.title = "Dentist".into();
        indispo.busy = false;

        let others = [(EntityId::new(9).expect("valid id"), &busy_meeting)];
        assert!(check_collisions(None, &indispo, "Spike", others).is_ok());

        indispo.busy = true;
        assert!(!indispo.overlaps(&busy_meeting));
        assert!(!busy_meeting.overlaps(&indispo));
    }

    #[test]
    fn reschedule_keeps_duration() {
        let mut activity = meeting((10, 0), (11, 30));
        activity
            .reschedule(date(2024, 3, 5).and_time(time(14, 0)), None, false)
            .expect("valid move");
        assert_eq!(activity.end, Some(date(2024, 3, 5).and_time(time(15, 30))));
    }

    #[test]
    fn palette_colour_is_stable() {
        let user = UserId::new(9).expect("valid id");
        assert_eq!(default_color(user), default_color(user));
    }
}
