//! Repository implementation for activity types, calendars and calendar queries.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::{
    domain::{
        activity::{Activity, ActivityType, Calendar, NewCalendar},
        entity::{CremeEntity, Entity},
        relation::ids,
        types::{CalendarId, EntityId, TypeConstraintError},
    },
    models::{
        activity::{
            Activity as DbActivity, ActivityCalendar as DbActivityCalendar,
            ActivityType as DbActivityType, Calendar as DbCalendar,
            NewCalendar as DbNewCalendar,
        },
        entity::Entity as DbEntity,
    },
    repository::{
        ActivityReader, ActivityWriter, DieselRepository,
        errors::{RepositoryError, RepositoryResult},
    },
};

fn into_activities(
    rows: Vec<(DbEntity, DbActivity)>,
) -> RepositoryResult<Vec<Entity<Activity>>> {
    rows.into_iter()
        .map(|(base, activity)| {
            Ok(Entity {
                base: CremeEntity::try_from(base)?,
                data: Activity::try_from(activity)?,
            })
        })
        .collect::<Result<Vec<_>, TypeConstraintError>>()
        .map_err(RepositoryError::from)
}

fn insert_calendar(
    conn: &mut SqliteConnection,
    calendar: &NewCalendar,
) -> RepositoryResult<Calendar> {
    use crate::schema::calendars;

    if calendar.is_default {
        diesel::update(calendars::table.filter(calendars::user_id.eq(calendar.user_id.get())))
            .set(calendars::is_default.eq(false))
            .execute(conn)?;
    }

    let stored = diesel::insert_into(calendars::table)
        .values(&DbNewCalendar::from(calendar))
        .get_result::<DbCalendar>(conn)?;

    Calendar::try_from(stored).map_err(RepositoryError::from)
}

impl ActivityReader for DieselRepository {
    fn list_activity_types(&self) -> RepositoryResult<Vec<ActivityType>> {
        use crate::schema::activity_types;

        let mut conn = self.conn()?;
        let types = activity_types::table
            .order(activity_types::name.asc())
            .load::<DbActivityType>(&mut conn)?;

        Ok(types.into_iter().map(ActivityType::from).collect())
    }

    fn list_calendars(&self) -> RepositoryResult<Vec<Calendar>> {
        use crate::schema::calendars;

        let mut conn = self.conn()?;
        calendars::table
            .order((calendars::user_id.asc(), calendars::name.asc()))
            .load::<DbCalendar>(&mut conn)?
            .into_iter()
            .map(|calendar| Calendar::try_from(calendar).map_err(RepositoryError::from))
            .collect()
    }

    fn get_calendar(&self, id: CalendarId) -> RepositoryResult<Option<Calendar>> {
        use crate::schema::calendars;

        let mut conn = self.conn()?;
        let calendar = calendars::table
            .find(id.get())
            .first::<DbCalendar>(&mut conn)
            .optional()?;

        calendar
            .map(Calendar::try_from)
            .transpose()
            .map_err(RepositoryError::from)
    }

    fn list_activity_calendars(&self, activity_id: EntityId) -> RepositoryResult<Vec<CalendarId>> {
        use crate::schema::activity_calendars;

        let mut conn = self.conn()?;
        activity_calendars::table
            .filter(activity_calendars::activity_id.eq(activity_id.get()))
            .select(activity_calendars::calendar_id)
            .order(activity_calendars::calendar_id.asc())
            .load::<i32>(&mut conn)?
            .into_iter()
            .map(|id| CalendarId::new(id).map_err(RepositoryError::from))
            .collect()
    }

    fn list_calendar_activities(
        &self,
        calendar_ids: &[CalendarId],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> RepositoryResult<Vec<Entity<Activity>>> {
        use crate::schema::{activities, activity_calendars, entities};

        let mut conn = self.conn()?;
        let raw_ids = calendar_ids.iter().map(|id| id.get()).collect::<Vec<_>>();

        let rows = entities::table
            .inner_join(activities::table)
            .filter(entities::is_deleted.eq(false))
            .filter(
                activities::entity_id.eq_any(
                    activity_calendars::table
                        .filter(activity_calendars::calendar_id.eq_any(&raw_ids))
                        .select(activity_calendars::activity_id),
                ),
            )
            .filter(activities::start_at.lt(end))
            .filter(activities::end_at.gt(start))
            .order(activities::start_at.asc())
            .select((DbEntity::as_select(), activities::all_columns))
            .load::<(DbEntity, DbActivity)>(&mut conn)?;

        into_activities(rows)
    }

    fn list_participant_activities(
        &self,
        participant_id: EntityId,
    ) -> RepositoryResult<Vec<Entity<Activity>>> {
        use crate::schema::{activities, entities, relations};

        let mut conn = self.conn()?;
        let rows = entities::table
            .inner_join(activities::table)
            .filter(entities::is_deleted.eq(false))
            .filter(
                activities::entity_id.eq_any(
                    relations::table
                        .filter(relations::subject_id.eq(participant_id.get()))
                        .filter(relations::type_id.eq(ids::PARTICIPATES))
                        .select(relations::object_id),
                ),
            )
            .order(activities::start_at.asc())
            .select((DbEntity::as_select(), activities::all_columns))
            .load::<(DbEntity, DbActivity)>(&mut conn)?;

        into_activities(rows)
    }
}

impl ActivityWriter for DieselRepository {
    fn save_activity_type(&self, activity_type: &ActivityType) -> RepositoryResult<()> {
        use crate::schema::activity_types;

        let mut conn = self.conn()?;
        let row = DbActivityType::from(activity_type);
        diesel::insert_into(activity_types::table)
            .values(&row)
            .on_conflict(activity_types::id)
            .do_update()
            .set(&row)
            .execute(&mut conn)?;
        Ok(())
    }

    fn create_calendar(&self, calendar: &NewCalendar) -> RepositoryResult<Calendar> {
        let mut conn = self.conn()?;
        conn.transaction::<_, RepositoryError, _>(|conn| insert_calendar(conn, calendar))
    }

    fn default_calendar(&self, fallback: &NewCalendar) -> RepositoryResult<Calendar> {
        use crate::schema::calendars;

        let mut conn = self.conn()?;
        conn.transaction::<_, RepositoryError, _>(|conn| {
            let existing = calendars::table
                .filter(calendars::user_id.eq(fallback.user_id.get()))
                .order((calendars::is_default.desc(), calendars::id.asc()))
                .first::<DbCalendar>(conn)
                .optional()?;

            match existing {
                Some(calendar) if calendar.is_default => Ok(Calendar::try_from(calendar)?),
                Some(calendar) => {
                    // A user keeps exactly one default calendar.
                    let promoted = diesel::update(calendars::table.find(calendar.id))
                        .set(calendars::is_default.eq(true))
                        .get_result::<DbCalendar>(conn)?;
                    Ok(Calendar::try_from(promoted)?)
                }
                None => insert_calendar(conn, fallback),
            }
        })
    }

    fn delete_calendar(&self, id: CalendarId) -> RepositoryResult<()> {
        use crate::schema::calendars;

        let mut conn = self.conn()?;
        let affected = diesel::delete(calendars::table.find(id.get())).execute(&mut conn)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn set_activity_calendars(
        &self,
        activity_id: EntityId,
        calendar_ids: &[CalendarId],
    ) -> RepositoryResult<()> {
        use crate::schema::activity_calendars;

        let mut conn = self.conn()?;
        let rows = calendar_ids
            .iter()
            .map(|calendar_id| DbActivityCalendar {
                activity_id: activity_id.get(),
                calendar_id: calendar_id.get(),
            })
            .collect::<Vec<_>>();

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::delete(
                activity_calendars::table
                    .filter(activity_calendars::activity_id.eq(activity_id.get())),
            )
            .execute(conn)?;
            diesel::insert_into(activity_calendars::table)
                .values(&rows)
                .execute(conn)?;
            Ok(())
        })
        .map_err(RepositoryError::from)
    }
}
