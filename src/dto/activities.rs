//! Calendar page data and the JSON feed of activities.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::activity::Calendar;
use crate::domain::types::{CalendarId, EntityId};

/// One activity in the calendar feed.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarEvent {
    pub id: EntityId,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub all_day: bool,
    pub calendar_id: CalendarId,
    pub color: String,
    pub url: String,
    /// Only owners and administrators may drag it around.
    pub editable: bool,
}

#[derive(Debug, Serialize)]
pub struct CalendarPageData {
    pub default_calendar: Calendar,
    pub own: Vec<Calendar>,
    /// Public calendars of the other users.
    pub others: Vec<Calendar>,
}
