//! Diesel models for activities, activity types and calendars.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::activity::{
    Activity as DomainActivity, ActivityType as DomainActivityType, Calendar as DomainCalendar,
    FloatingType, NewCalendar as DomainNewCalendar,
};
use crate::domain::types::{CalendarId, EntityId, TypeConstraintError, UserId};

#[derive(Debug, Clone, Identifiable, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::activities, primary_key(entity_id), treat_none_as_null = true)]
pub struct Activity {
    pub entity_id: i32,
    pub title: String,
    pub type_id: String,
    pub sub_type: Option<String>,
    pub status: Option<String>,
    pub start_at: Option<NaiveDateTime>,
    pub end_at: Option<NaiveDateTime>,
    pub is_all_day: bool,
    pub busy: bool,
    pub floating_type: i32,
    pub place: String,
    pub minutes: String,
}

#[derive(Debug, Clone, Identifiable, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::activity_types)]
pub struct ActivityType {
    pub id: String,
    pub name: String,
    pub default_duration_minutes: i32,
    pub is_custom: bool,
}

#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::calendars)]
pub struct Calendar {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub is_default: bool,
    pub is_public: bool,
    pub color: String,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::calendars)]
pub struct NewCalendar<'a> {
    pub user_id: i32,
    pub name: &'a str,
    pub is_default: bool,
    pub is_public: bool,
    pub color: &'a str,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::activity_calendars)]
pub struct ActivityCalendar {
    pub activity_id: i32,
    pub calendar_id: i32,
}

impl Activity {
    pub fn from_domain(entity_id: EntityId, activity: &DomainActivity) -> Self {
        Self {
            entity_id: entity_id.get(),
            title: activity.title.clone(),
            type_id: activity.type_id.clone(),
            sub_type: activity.sub_type.clone(),
            status: activity.status.clone(),
            start_at: activity.start,
            end_at: activity.end,
            is_all_day: activity.is_all_day,
            busy: activity.busy,
            floating_type: activity.floating_type.code(),
            place: activity.place.clone(),
            minutes: activity.minutes.clone(),
        }
    }
}

impl TryFrom<Activity> for DomainActivity {
    type Error = TypeConstraintError;

    fn try_from(activity: Activity) -> Result<Self, Self::Error> {
        Ok(Self {
            title: activity.title,
            type_id: activity.type_id,
            sub_type: activity.sub_type,
            status: activity.status,
            start: activity.start_at,
            end: activity.end_at,
            is_all_day: activity.is_all_day,
            busy: activity.busy,
            floating_type: FloatingType::try_from(activity.floating_type)?,
            place: activity.place,
            minutes: activity.minutes,
        })
    }
}

impl From<ActivityType> for DomainActivityType {
    fn from(activity_type: ActivityType) -> Self {
        Self {
            id: activity_type.id,
            name: activity_type.name,
            default_duration_minutes: activity_type.default_duration_minutes,
            is_custom: activity_type.is_custom,
        }
    }
}

impl From<&DomainActivityType> for ActivityType {
    fn from(activity_type: &DomainActivityType) -> Self {
        Self {
            id: activity_type.id.clone(),
            name: activity_type.name.clone(),
            default_duration_minutes: activity_type.default_duration_minutes,
            is_custom: activity_type.is_custom,
        }
    }
}

impl TryFrom<Calendar> for DomainCalendar {
    type Error = TypeConstraintError;

    fn try_from(calendar: Calendar) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CalendarId::new(calendar.id)?,
            user_id: UserId::new(calendar.user_id)?,
            name: calendar.name,
            is_default: calendar.is_default,
            is_public: calendar.is_public,
            color: calendar.color,
        })
    }
}

impl<'a> From<&'a DomainNewCalendar> for NewCalendar<'a> {
    fn from(calendar: &'a DomainNewCalendar) -> Self {
        Self {
            user_id: calendar.user_id.get(),
            name: &calendar.name,
            is_default: calendar.is_default,
            is_public: calendar.is_public,
            color: &calendar.color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::TYPE_MEETING;

    #[test]
    fn floating_type_is_stored_as_code() {
        let mut activity = DomainActivity::new("Briefing", TYPE_MEETING);
        activity.floating_type = FloatingType::Floating;
        let db = Activity::from_domain(EntityId::new(4).expect("valid id"), &activity);
        assert_eq!(db.floating_type, 3);
        assert_eq!(DomainActivity::try_from(db), Ok(activity));
    }

    #[test]
    fn unknown_floating_code_is_rejected() {
        let activity = DomainActivity::new("Briefing", TYPE_MEETING);
        let mut db = Activity::from_domain(EntityId::new(4).expect("valid id"), &activity);
        db.floating_type = 9;
        assert!(DomainActivity::try_from(db).is_err());
    }
}
