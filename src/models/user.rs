use diesel::prelude::*;

use crate::domain::types::{Email, TypeConstraintError, UserId, UserName};
use crate::domain::user::{UpsertUser as DomainUpsertUser, User as DomainUser};

#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::users)]
pub struct UpsertUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub is_admin: bool,
}

impl TryFrom<User> for DomainUser {
    type Error = TypeConstraintError;

    fn try_from(user: User) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(user.id)?,
            email: Email::new(user.email)?,
            name: UserName::new(user.name)?,
            is_admin: user.is_admin,
        })
    }
}

impl<'a> From<&'a DomainUpsertUser> for UpsertUser<'a> {
    fn from(user: &'a DomainUpsertUser) -> Self {
        Self {
            email: user.email.as_str(),
            name: user.name.as_str(),
            is_admin: user.is_admin,
        }
    }
}
