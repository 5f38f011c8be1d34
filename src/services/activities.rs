//! Activities, their participants and the calendars they appear in.

use std::collections::HashMap;

use crate::domain::activity::{
    Activity, ActivityError, ActivityType, Calendar, NewCalendar, check_collisions, default_color,
};
use crate::domain::entity::{Entity, EntityKind};
use crate::domain::entity_data::{AnyEntity, EntityData};
use crate::domain::relation::ids;
use crate::domain::types::{CalendarId, EntityId, UserId};
use crate::domain::user::User;
use crate::dto::activities::{CalendarEvent, CalendarPageData};
use crate::forms::activities::{
    ActivityDatesPayload, ActivityPayload, CalendarFeedPayload, CalendarForm,
};
use crate::repository::{
    ActivityReader, ActivityWriter, EntityReader, EntityWriter, PropertyReader, RelationReader,
    RelationWriter, UserReader,
};
use crate::services::entities::{get_live_entity, store_entity, store_new_entity};
use crate::services::relations::{get_relation_type, link_entities};
use crate::services::users::{can_edit, ensure_can_edit};
use crate::services::{ServiceError, ServiceResult};

fn activity_type<R>(repo: &R, type_id: &str) -> ServiceResult<ActivityType>
where
    R: ActivityReader + ?Sized,
{
    repo.list_activity_types()?
        .into_iter()
        .find(|activity_type| activity_type.id == type_id)
        .ok_or_else(|| ActivityError::UnknownType(type_id.to_string()).into())
}

fn as_activity(entity: AnyEntity) -> ServiceResult<Entity<Activity>> {
    match entity.data {
        EntityData::Activity(data) => Ok(Entity {
            base: entity.base,
            data,
        }),
        _ => Err(ServiceError::NotFound),
    }
}

fn get_activity<R>(repo: &R, id: EntityId) -> ServiceResult<Entity<Activity>>
where
    R: EntityReader + ?Sized,
{
    as_activity(get_live_entity(repo, id, EntityKind::Activity)?)
}

pub fn list_activity_types<R>(repo: &R) -> ServiceResult<Vec<ActivityType>>
where
    R: ActivityReader + ?Sized,
{
    Ok(repo.list_activity_types()?)
}

/// Default calendar of `user`, created on first use.
pub fn default_calendar<R>(repo: &R, user: &User) -> ServiceResult<Calendar>
where
    R: ActivityWriter + ?Sized,
{
    Ok(repo.default_calendar(&NewCalendar::default_for(user.id, user.name.as_str()))?)
}

fn default_calendar_of<R>(repo: &R, user_id: UserId) -> ServiceResult<Option<Calendar>>
where
    R: UserReader + ActivityWriter + ?Sized,
{
    match repo.get_user_by_id(user_id)? {
        Some(user) => Ok(Some(default_calendar(repo, &user)?)),
        None => Ok(None),
    }
}

/// Own calendars and the public calendars of the other users.
pub fn calendar_page<R>(repo: &R, user: &User) -> ServiceResult<CalendarPageData>
where
    R: ActivityReader + ActivityWriter + ?Sized,
{
    let default_calendar = default_calendar(repo, user)?;
    let (own, others): (Vec<Calendar>, Vec<Calendar>) = repo
        .list_calendars()?
        .into_iter()
        .partition(|calendar| calendar.user_id == user.id);
    Ok(CalendarPageData {
        default_calendar,
        own,
        others: others.into_iter().filter(|calendar| calendar.is_public).collect(),
    })
}

pub fn create_calendar<R>(repo: &R, user: &User, form: CalendarForm) -> ServiceResult<Calendar>
where
    R: ActivityWriter + ?Sized,
{
    let name = form.name.trim();
    if name.is_empty() {
        return Err(ServiceError::Form("a calendar needs a name".to_string()));
    }
    let color = form.color.trim().trim_start_matches('#');
    let calendar = NewCalendar {
        user_id: user.id,
        name: name.to_string(),
        is_default: form.is_default,
        is_public: form.is_public,
        color: if color.is_empty() {
            default_color(user.id).to_string()
        } else {
            color.to_string()
        },
    };
    Ok(repo.create_calendar(&calendar)?)
}

/// The default calendar cannot be deleted.
pub fn delete_calendar<R>(repo: &R, user: &User, id: CalendarId) -> ServiceResult<()>
where
    R: ActivityReader + ActivityWriter + ?Sized,
{
    let calendar = repo.get_calendar(id)?.ok_or(ServiceError::NotFound)?;
    if calendar.user_id != user.id && !user.is_admin {
        return Err(ServiceError::Unauthorized);
    }
    if calendar.is_default {
        return Err(ServiceError::Conflict(
            "the default calendar cannot be deleted".to_string(),
        ));
    }
    repo.delete_calendar(id)?;
    Ok(())
}

/// Fails when `contact` already has a busy activity overlapping `activity`.
fn check_participant<R>(
    repo: &R,
    activity_id: Option<EntityId>,
    activity: &Activity,
    contact: &AnyEntity,
) -> ServiceResult<()>
where
    R: ActivityReader + ?Sized,
{
    if !activity.blocks_agenda() {
        return Ok(());
    }
    let others = repo.list_participant_activities(contact.id())?;
    check_collisions(
        activity_id,
        activity,
        contact.base.label(),
        others.iter().map(|other| (other.id(), &other.data)),
    )?;
    Ok(())
}

fn load_contacts<R>(repo: &R, ids: &[EntityId]) -> ServiceResult<Vec<AnyEntity>>
where
    R: EntityReader + ?Sized,
{
    let contacts = repo.get_entities(ids)?;
    if contacts.len() != ids.len()
        || contacts
            .iter()
            .any(|contact| contact.base.kind != EntityKind::Contact || contact.base.is_deleted)
    {
        return Err(ServiceError::Form(
            "participants must be existing contacts".to_string(),
        ));
    }
    Ok(contacts)
}

/// Calendars to add for participants related to a user.
fn participant_calendars<R>(repo: &R, contacts: &[AnyEntity]) -> ServiceResult<Vec<CalendarId>>
where
    R: UserReader + ActivityWriter + ?Sized,
{
    let mut calendars = Vec::new();
    for user_id in contacts
        .iter()
        .filter_map(|contact| contact.data.as_contact().and_then(|data| data.is_user))
    {
        if let Some(calendar) = default_calendar_of(repo, user_id)? {
            calendars.push(calendar.id);
        }
    }
    Ok(calendars)
}

fn add_activity_calendars<R>(
    repo: &R,
    activity_id: EntityId,
    added: &[CalendarId],
) -> ServiceResult<()>
where
    R: ActivityReader + ActivityWriter + ?Sized,
{
    let mut calendars = repo.list_activity_calendars(activity_id)?;
    calendars.extend_from_slice(added);
    calendars.sort();
    calendars.dedup();
    repo.set_activity_calendars(activity_id, &calendars)?;
    Ok(())
}

/// Creates an activity with its participants, checking their agendas first.
pub fn create_activity<R>(
    repo: &R,
    user: &User,
    payload: ActivityPayload,
) -> ServiceResult<Entity<Activity>>
where
    R: EntityReader
        + EntityWriter
        + ActivityReader
        + ActivityWriter
        + RelationReader
        + RelationWriter
        + PropertyReader
        + UserReader
        + ?Sized,
{
    let ActivityPayload {
        mut activity,
        schedule,
        description,
        participants,
        calendar_id,
    } = payload;
    let activity_type = activity_type(repo, &activity.type_id)?;
    activity.apply_schedule(schedule, activity_type.default_duration())?;

    let contacts = load_contacts(repo, &participants)?;
    for contact in &contacts {
        check_participant(repo, None, &activity, contact)?;
    }

    let own_calendar = match calendar_id {
        Some(id) => {
            let calendar = repo.get_calendar(id)?.ok_or(ServiceError::NotFound)?;
            if calendar.user_id != user.id {
                return Err(ServiceError::Unauthorized);
            }
            calendar
        }
        None => default_calendar(repo, user)?,
    };

    let data = EntityData::Activity(activity);
    let created = as_activity(store_new_entity(
        repo,
        user.id,
        EntityKind::Activity,
        &data,
        &description,
    )?)?;

    if !contacts.is_empty() {
        let rtype = get_relation_type(repo, ids::PARTICIPATES)?;
        for contact in &contacts {
            link_entities(repo, user, &contact.base, &rtype, &created.base)?;
        }
    }
    let mut calendars = participant_calendars(repo, &contacts)?;
    calendars.push(own_calendar.id);
    add_activity_calendars(repo, created.id(), &calendars)?;
    Ok(created)
}

/// Rewrites an activity from the activity form; participants are re-checked.
pub fn update_activity<R>(
    repo: &R,
    user: &User,
    id: EntityId,
    payload: ActivityPayload,
) -> ServiceResult<Entity<Activity>>
where
    R: EntityReader + EntityWriter + ActivityReader + RelationReader + ?Sized,
{
    let current = get_activity(repo, id)?;
    ensure_can_edit(user, &current.base)?;
    let ActivityPayload {
        mut activity,
        schedule,
        description,
        ..
    } = payload;
    let activity_type = activity_type(repo, &activity.type_id)?;
    activity.apply_schedule(schedule, activity_type.default_duration())?;

    let participants = list_participants(repo, id)?;
    for contact in &participants {
        check_participant(repo, Some(id), &activity, contact)?;
    }

    let mut base = current.base;
    base.description = ammonia::clean(description.trim());
    let updated = store_entity(
        repo,
        AnyEntity {
            base,
            data: EntityData::Activity(activity),
        },
    )?;
    as_activity(updated)
}

/// Contacts taking part in the activity.
pub fn list_participants<R>(repo: &R, activity_id: EntityId) -> ServiceResult<Vec<AnyEntity>>
where
    R: EntityReader + RelationReader + ?Sized,
{
    let rtype = get_relation_type(repo, ids::PARTICIPATES)?;
    let contact_ids: Vec<EntityId> = repo
        .list_relations(activity_id)?
        .into_iter()
        .filter(|relation| relation.type_id == rtype.symmetric_type_id)
        .map(|relation| relation.object_id)
        .collect();
    Ok(repo
        .get_entities(&contact_ids)?
        .into_iter()
        .filter(|contact| !contact.base.is_deleted)
        .collect())
}

pub fn add_participants<R>(
    repo: &R,
    user: &User,
    activity_id: EntityId,
    contact_ids: &[EntityId],
) -> ServiceResult<usize>
where
    R: EntityReader
        + ActivityReader
        + ActivityWriter
        + RelationReader
        + RelationWriter
        + PropertyReader
        + UserReader
        + ?Sized,
{
    let activity = get_activity(repo, activity_id)?;
    ensure_can_edit(user, &activity.base)?;
    let contacts = load_contacts(repo, contact_ids)?;
    for contact in &contacts {
        check_participant(repo, Some(activity_id), &activity.data, contact)?;
    }

    let rtype = get_relation_type(repo, ids::PARTICIPATES)?;
    for contact in &contacts {
        link_entities(repo, user, &contact.base, &rtype, &activity.base)?;
    }
    add_activity_calendars(repo, activity_id, &participant_calendars(repo, &contacts)?)?;
    log::info!(
        "{} participant(s) added to activity {activity_id}",
        contacts.len()
    );
    Ok(contacts.len())
}

/// Removes a participant, and their calendar when they are a user.
pub fn remove_participant<R>(
    repo: &R,
    user: &User,
    activity_id: EntityId,
    contact_id: EntityId,
) -> ServiceResult<()>
where
    R: EntityReader
        + ActivityReader
        + ActivityWriter
        + RelationWriter
        + UserReader
        + ?Sized,
{
    let activity = get_activity(repo, activity_id)?;
    ensure_can_edit(user, &activity.base)?;
    let contact = get_live_entity(repo, contact_id, EntityKind::Contact)?;
    repo.delete_relations(
        contact_id,
        &[ids::PARTICIPATES.to_string()],
        Some(activity_id),
    )?;

    if let Some(user_id) = contact.data.as_contact().and_then(|data| data.is_user) {
        let removed: Vec<CalendarId> = repo
            .list_calendars()?
            .into_iter()
            .filter(|calendar| calendar.user_id == user_id)
            .map(|calendar| calendar.id)
            .collect();
        let kept: Vec<CalendarId> = repo
            .list_activity_calendars(activity_id)?
            .into_iter()
            .filter(|id| !removed.contains(id))
            .collect();
        repo.set_activity_calendars(activity_id, &kept)?;
    }
    Ok(())
}

/// Replaces the calendars of the user showing the activity.
pub fn set_calendars<R>(
    repo: &R,
    user: &User,
    activity_id: EntityId,
    calendar_ids: &[CalendarId],
) -> ServiceResult<()>
where
    R: EntityReader + ActivityReader + ActivityWriter + ?Sized,
{
    let activity = get_activity(repo, activity_id)?;
    ensure_can_edit(user, &activity.base)?;
    let calendars: HashMap<CalendarId, Calendar> = repo
        .list_calendars()?
        .into_iter()
        .map(|calendar| (calendar.id, calendar))
        .collect();
    if calendar_ids.iter().any(|id| {
        calendars
            .get(id)
            .is_none_or(|calendar| calendar.user_id != user.id)
    }) {
        return Err(ServiceError::Unauthorized);
    }
    let mut kept: Vec<CalendarId> = repo
        .list_activity_calendars(activity_id)?
        .into_iter()
        .filter(|id| calendars.get(id).is_some_and(|calendar| calendar.user_id != user.id))
        .collect();
    kept.extend_from_slice(calendar_ids);
    kept.sort();
    kept.dedup();
    repo.set_activity_calendars(activity_id, &kept)?;
    Ok(())
}

/// Activities of the requested calendars for the calendar widget.
///
/// Without any requested calendar, the user's default calendar is used.
pub fn calendar_feed<R>(
    repo: &R,
    user: &User,
    payload: CalendarFeedPayload,
) -> ServiceResult<Vec<CalendarEvent>>
where
    R: ActivityReader + ActivityWriter + ?Sized,
{
    let calendars: HashMap<CalendarId, Calendar> = repo
        .list_calendars()?
        .into_iter()
        .filter(|calendar| calendar.user_id == user.id || calendar.is_public)
        .map(|calendar| (calendar.id, calendar))
        .collect();
    let mut requested: Vec<CalendarId> = payload
        .calendar_ids
        .into_iter()
        .filter(|id| calendars.contains_key(id))
        .collect();
    if requested.is_empty() {
        requested.push(default_calendar(repo, user)?.id);
    }

    let activities = repo.list_calendar_activities(&requested, payload.start, payload.end)?;
    let mut events = Vec::with_capacity(activities.len());
    for activity in activities {
        let (Some(start), Some(end)) = (activity.data.start, activity.data.end) else {
            continue;
        };
        let Some(calendar) = repo
            .list_activity_calendars(activity.id())?
            .into_iter()
            .find(|id| requested.contains(id))
            .and_then(|id| calendars.get(&id))
        else {
            continue;
        };
        events.push(CalendarEvent {
            id: activity.id(),
            title: activity.data.title.clone(),
            start,
            end,
            all_day: activity.data.is_all_day,
            calendar_id: calendar.id,
            color: format!("#{}", calendar.color),
            url: format!("/entity/{}", activity.id()),
            editable: can_edit(user, &activity.base),
        });
    }
    Ok(events)
}

/// Drag & drop in the calendar; collisions are checked again.
pub fn move_activity<R>(
    repo: &R,
    user: &User,
    payload: ActivityDatesPayload,
) -> ServiceResult<Entity<Activity>>
where
    R: EntityReader + EntityWriter + ActivityReader + RelationReader + ?Sized,
{
    let mut activity = get_activity(repo, payload.id)?;
    ensure_can_edit(user, &activity.base)?;
    activity
        .data
        .reschedule(payload.start, payload.end, payload.all_day)?;
    for contact in list_participants(repo, payload.id)? {
        check_participant(repo, Some(payload.id), &activity.data, &contact)?;
    }
    let updated = store_entity(
        repo,
        AnyEntity {
            base: activity.base,
            data: EntityData::Activity(activity.data),
        },
    )?;
    as_activity(updated)
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::domain::activity::{FloatingType, ScheduleInput, TYPE_MEETING};
    use crate::domain::persons::Contact;
    use crate::domain::relation::RelationType;
    use crate::repository::mock::MockRepository;
    use crate::services::users::test_support::{base, user_from, viewer_auth};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2071, 5, 2)
            .and_then(|date| date.and_hms_opt(hour, 0, 0))
            .expect("valid datetime")
    }

    fn meeting(start: u32, end: u32) -> Activity {
        Activity {
            start: Some(at(start)),
            end: Some(at(end)),
            busy: true,
            floating_type: FloatingType::Normal,
            ..Activity::new("Briefing", TYPE_MEETING)
        }
    }

    fn meeting_type() -> ActivityType {
        ActivityType {
            id: TYPE_MEETING.into(),
            name: "Meeting".into(),
            default_duration_minutes: 60,
            is_custom: false,
        }
    }

    fn contact(id: i32) -> AnyEntity {
        AnyEntity {
            base: base(id, EntityKind::Contact, 2, "Faye Valentine"),
            data: EntityData::Contact(Contact::new("Faye", "Valentine")),
        }
    }

    fn payload(participants: Vec<EntityId>) -> ActivityPayload {
        ActivityPayload {
            activity: Activity {
                busy: true,
                ..Activity::new("Briefing", TYPE_MEETING)
            },
            schedule: ScheduleInput {
                start_date: NaiveDate::from_ymd_opt(2071, 5, 2),
                start_time: chrono::NaiveTime::from_hms_opt(10, 30, 0),
                ..ScheduleInput::default()
            },
            description: String::new(),
            participants,
            calendar_id: None,
        }
    }

    #[test]
    fn busy_participants_collide() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_list_activity_types()
            .returning(|| Ok(vec![meeting_type()]));
        repo.expect_get_entities()
            .returning(|ids| Ok(ids.iter().map(|id| contact(id.get())).collect()));
        repo.expect_list_participant_activities().returning(|_| {
            Ok(vec![Entity {
                base: base(40, EntityKind::Activity, 2, "Bounty"),
                data: meeting(10, 12),
            }])
        });
        repo.expect_create_entity().never();

        let participants = vec![EntityId::new(5).expect("valid id")];
        assert!(matches!(
            create_activity(&repo, &user, payload(participants)),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn activities_land_in_the_default_calendar() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_list_activity_types()
            .returning(|| Ok(vec![meeting_type()]));
        repo.expect_get_entities().returning(|_| Ok(vec![]));
        repo.expect_default_calendar().returning(|new| {
            Ok(Calendar {
                id: CalendarId::new(3).expect("valid id"),
                user_id: new.user_id,
                name: new.name.clone(),
                is_default: true,
                is_public: false,
                color: new.color.clone(),
            })
        });
        repo.expect_create_entity().times(1).returning(|new, data| {
            Ok(AnyEntity {
                base: base(50, new.kind, new.user_id.get(), &new.header_filter_search_field),
                data: data.clone(),
            })
        });
        repo.expect_list_activity_calendars().returning(|_| Ok(vec![]));
        repo.expect_set_activity_calendars()
            .withf(|_, calendars| calendars == [CalendarId::new(3).expect("valid id")])
            .times(1)
            .returning(|_, _| Ok(()));

        let created = create_activity(&repo, &user, payload(vec![])).expect("activity created");
        assert_eq!(created.data.end, Some(at(10) + chrono::Duration::minutes(90)));
    }

    #[test]
    fn moving_an_activity_checks_the_participants() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_get_entity().returning(|id| {
            Ok(Some(AnyEntity {
                base: base(id.get(), EntityKind::Activity, 2, "Briefing"),
                data: EntityData::Activity(meeting(8, 9)),
            }))
        });
        repo.expect_get_relation_type().returning(|id| {
            Ok(Some(RelationType {
                id: id.to_string(),
                symmetric_type_id: "activities-object_participates_to_activity".into(),
                predicate: "participates to the activity".into(),
                subject_kinds: vec![EntityKind::Contact],
                object_kinds: vec![EntityKind::Activity],
                subject_properties: vec![],
                is_custom: false,
                is_internal: true,
                enabled: true,
                is_copiable: false,
            }))
        });
        repo.expect_list_relations().returning(|_| Ok(vec![]));
        repo.expect_get_entities().returning(|_| Ok(vec![]));
        repo.expect_update_entity()
            .times(1)
            .returning(|entity| Ok(entity.clone()));

        let moved = move_activity(
            &repo,
            &user,
            ActivityDatesPayload {
                id: EntityId::new(7).expect("valid id"),
                start: at(14),
                end: None,
                all_day: false,
            },
        )
        .expect("moved");
        assert_eq!(moved.data.end, Some(at(15)));
    }
}
