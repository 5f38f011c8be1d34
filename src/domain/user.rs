use serde::{Deserialize, Serialize};

use crate::domain::types::{Email, UserId, UserName};

/// A CRM user, mirrored from the authentication service on sign-in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: UserName,
    pub is_admin: bool,
}

/// Data refreshed on every sign-in; the email is the natural key.
#[derive(Clone, Debug)]
pub struct UpsertUser {
    pub email: Email,
    pub name: UserName,
    pub is_admin: bool,
}
