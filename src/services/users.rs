//! Mirrors signed-in users and checks ownership rules.

use crate::domain::auth::AuthenticatedUser;
use crate::domain::entity::CremeEntity;
use crate::domain::types::{Email, UserName};
use crate::domain::user::{UpsertUser, User};
use crate::repository::{UserReader, UserWriter};
use crate::services::{ServiceError, ServiceResult, ensure_role};
use crate::{SERVICE_ACCESS_ROLE, SERVICE_ADMIN_ROLE};

/// Stores (or refreshes) the CRM user matching the identity claims.
pub fn current_user<R>(repo: &R, auth: &AuthenticatedUser) -> ServiceResult<User>
where
    R: UserWriter + ?Sized,
{
    ensure_role(auth, SERVICE_ACCESS_ROLE)?;

    let email = Email::new(auth.email.as_str())?;
    let display_name = if auth.name.trim().is_empty() {
        auth.email.as_str()
    } else {
        auth.name.as_str()
    };
    let user = UpsertUser {
        email,
        name: UserName::new(display_name)?,
        is_admin: auth.has_role(SERVICE_ADMIN_ROLE),
    };
    Ok(repo.upsert_user(&user)?)
}

/// Owners and administrators may modify an entity.
pub fn can_edit(user: &User, entity: &CremeEntity) -> bool {
    user.is_admin || entity.user_id == user.id
}

pub fn ensure_can_edit(user: &User, entity: &CremeEntity) -> ServiceResult<()> {
    if can_edit(user, entity) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized)
    }
}

/// Configuration pages are reserved to administrators.
pub fn ensure_admin(user: &User) -> ServiceResult<()> {
    if user.is_admin {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized)
    }
}

pub fn list_users<R>(repo: &R, auth: &AuthenticatedUser) -> ServiceResult<Vec<User>>
where
    R: UserReader + ?Sized,
{
    ensure_role(auth, SERVICE_ACCESS_ROLE)?;
    Ok(repo.list_users()?)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDateTime;

    use crate::domain::auth::AuthenticatedUser;
    use crate::domain::entity::{CremeEntity, EntityKind};
    use crate::domain::types::{Email, EntityId, PublicId, UserId, UserName};
    use crate::domain::user::User;
    use crate::{SERVICE_ACCESS_ROLE, SERVICE_ADMIN_ROLE};

    pub fn admin_auth() -> AuthenticatedUser {
        AuthenticatedUser {
            sub: "1".to_string(),
            email: "jet@bebop.mars".to_string(),
            name: "Jet Black".to_string(),
            roles: vec![SERVICE_ACCESS_ROLE.to_string(), SERVICE_ADMIN_ROLE.to_string()],
            exp: 0,
        }
    }

    pub fn viewer_auth() -> AuthenticatedUser {
        AuthenticatedUser {
            sub: "2".to_string(),
            email: "spike@bebop.mars".to_string(),
            name: "Spike Spiegel".to_string(),
            roles: vec![SERVICE_ACCESS_ROLE.to_string()],
            exp: 0,
        }
    }

    pub fn stranger_auth() -> AuthenticatedUser {
        AuthenticatedUser {
            sub: "3".to_string(),
            email: "vicious@redragon.mars".to_string(),
            name: "Vicious".to_string(),
            roles: vec![],
            exp: 0,
        }
    }

    pub fn user_from(auth: &AuthenticatedUser, id: i32) -> User {
        User {
            id: UserId::new(id).expect("valid id"),
            email: Email::new(auth.email.as_str()).expect("valid email"),
            name: UserName::new(auth.name.as_str()).expect("valid name"),
            is_admin: auth.has_role(SERVICE_ADMIN_ROLE),
        }
    }

    pub fn base(id: i32, kind: EntityKind, owner: i32, label: &str) -> CremeEntity {
        CremeEntity {
            id: EntityId::new(id).expect("valid id"),
            uuid: PublicId::new(),
            kind,
            user_id: UserId::new(owner).expect("valid id"),
            description: String::new(),
            header_filter_search_field: label.to_string(),
            is_deleted: false,
            created_at: NaiveDateTime::default(),
            modified_at: NaiveDateTime::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::test_support::*;
    use super::*;
    use crate::domain::entity::EntityKind;
    use crate::repository::errors::RepositoryResult;

    #[derive(Default)]
    struct MockRepo {
        upserted: RefCell<Vec<UpsertUser>>,
    }

    impl UserWriter for MockRepo {
        fn upsert_user(&self, user: &UpsertUser) -> RepositoryResult<User> {
            self.upserted.borrow_mut().push(user.clone());
            Ok(User {
                id: crate::domain::types::UserId::new(7).expect("valid id"),
                email: user.email.clone(),
                name: user.name.clone(),
                is_admin: user.is_admin,
            })
        }
    }

    #[test]
    fn current_user_mirrors_the_claims() {
        let repo = MockRepo::default();
        let user = current_user(&repo, &admin_auth()).expect("access granted");

        assert!(user.is_admin);
        assert_eq!(user.email.as_str(), "jet@bebop.mars");
        assert_eq!(repo.upserted.borrow().len(), 1);
    }

    #[test]
    fn current_user_requires_the_access_role() {
        let repo = MockRepo::default();
        assert!(matches!(
            current_user(&repo, &stranger_auth()),
            Err(ServiceError::Unauthorized)
        ));
        assert!(repo.upserted.borrow().is_empty());
    }

    #[test]
    fn blank_names_fall_back_to_the_email() {
        let repo = MockRepo::default();
        let mut auth = viewer_auth();
        auth.name = "  ".into();
        let user = current_user(&repo, &auth).expect("access granted");
        assert_eq!(user.name.as_str(), "spike@bebop.mars");
    }

    #[test]
    fn only_owners_and_admins_edit() {
        let owner = user_from(&viewer_auth(), 2);
        let admin = user_from(&admin_auth(), 1);
        let other = User {
            id: crate::domain::types::UserId::new(9).expect("valid id"),
            ..owner.clone()
        };
        let entity = base(10, EntityKind::Contact, 2, "Faye");

        assert!(can_edit(&owner, &entity));
        assert!(can_edit(&admin, &entity));
        assert!(!can_edit(&other, &entity));
    }
}
