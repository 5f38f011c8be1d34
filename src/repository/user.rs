//! Repository implementation for CRM users.

use diesel::{prelude::*, upsert::excluded};

use crate::{
    domain::{
        types::{Email, UserId},
        user::{UpsertUser, User},
    },
    models::user::{UpsertUser as DbUpsertUser, User as DbUser},
    repository::{
        DieselRepository, UserReader, UserWriter,
        errors::{RepositoryError, RepositoryResult},
    },
};

impl UserReader for DieselRepository {
    fn get_user_by_id(&self, id: UserId) -> RepositoryResult<Option<User>> {
        use crate::schema::users;

        let mut conn = self.conn()?;
        let user = users::table
            .find(id.get())
            .first::<DbUser>(&mut conn)
            .optional()?;

        user.map(User::try_from)
            .transpose()
            .map_err(RepositoryError::from)
    }

    fn get_user_by_email(&self, email: &Email) -> RepositoryResult<Option<User>> {
        use crate::schema::users;

        let mut conn = self.conn()?;
        let user = users::table
            .filter(users::email.eq(email.as_str()))
            .first::<DbUser>(&mut conn)
            .optional()?;

        user.map(User::try_from)
            .transpose()
            .map_err(RepositoryError::from)
    }

    fn list_users(&self) -> RepositoryResult<Vec<User>> {
        use crate::schema::users;

        let mut conn = self.conn()?;
        users::table
            .order(users::name.asc())
            .load::<DbUser>(&mut conn)?
            .into_iter()
            .map(|user| User::try_from(user).map_err(RepositoryError::from))
            .collect()
    }
}

impl UserWriter for DieselRepository {
    fn upsert_user(&self, user: &UpsertUser) -> RepositoryResult<User> {
        use crate::schema::users;

        let mut conn = self.conn()?;
        let db_user: DbUpsertUser = user.into();

        let stored = diesel::insert_into(users::table)
            .values(&db_user)
            .on_conflict(users::email)
            .do_update()
            .set((
                users::name.eq(excluded(users::name)),
                users::is_admin.eq(excluded(users::is_admin)),
            ))
            .get_result::<DbUser>(&mut conn)?;

        User::try_from(stored).map_err(RepositoryError::from)
    }
}
