//! Diesel models of the base entity table.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::entity::{CremeEntity, NewEntity as DomainNewEntity};
use crate::domain::types::{EntityId, TypeConstraintError, UserId};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::entities)]
/// Diesel model for [`crate::domain::entity::CremeEntity`].
pub struct Entity {
    pub id: i32,
    pub uuid: String,
    pub kind: String,
    pub user_id: i32,
    pub description: String,
    pub header_filter_search_field: String,
    pub is_deleted: bool,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::entities)]
/// Insertable form of [`Entity`].
pub struct NewEntity<'a> {
    pub uuid: String,
    pub kind: &'a str,
    pub user_id: i32,
    pub description: &'a str,
    pub header_filter_search_field: &'a str,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::entities)]
/// Base columns rewritten on every edition.
pub struct UpdateEntity<'a> {
    pub user_id: i32,
    pub description: &'a str,
    pub header_filter_search_field: &'a str,
    pub modified_at: NaiveDateTime,
}

impl TryFrom<Entity> for CremeEntity {
    type Error = TypeConstraintError;

    fn try_from(entity: Entity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: EntityId::new(entity.id)?,
            uuid: entity.uuid.parse()?,
            kind: entity.kind.parse()?,
            user_id: UserId::new(entity.user_id)?,
            description: entity.description,
            header_filter_search_field: entity.header_filter_search_field,
            is_deleted: entity.is_deleted,
            created_at: entity.created_at,
            modified_at: entity.modified_at,
        })
    }
}

impl<'a> NewEntity<'a> {
    pub fn from_domain(entity: &'a DomainNewEntity, now: NaiveDateTime) -> Self {
        Self {
            uuid: entity.uuid.to_string(),
            kind: entity.kind.as_str(),
            user_id: entity.user_id.get(),
            description: &entity.description,
            header_filter_search_field: &entity.header_filter_search_field,
            created_at: now,
            modified_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::EntityKind;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .expect("valid datetime")
    }

    #[test]
    fn from_entity_into_domain() {
        let db = Entity {
            id: 7,
            uuid: "67e55044-10b1-426f-9247-bb680e5fe0c8".into(),
            kind: "persons.organisation".into(),
            user_id: 1,
            description: String::new(),
            header_filter_search_field: "Bebop".into(),
            is_deleted: false,
            created_at: now(),
            modified_at: now(),
        };
        let domain = CremeEntity::try_from(db).expect("valid entity");
        assert_eq!(domain.kind, EntityKind::Organisation);
        assert_eq!(domain.label(), "Bebop");
    }

    #[test]
    fn rejects_unknown_kinds() {
        let db = Entity {
            id: 7,
            uuid: "67e55044-10b1-426f-9247-bb680e5fe0c8".into(),
            kind: "tickets.ticket".into(),
            user_id: 1,
            description: String::new(),
            header_filter_search_field: String::new(),
            is_deleted: false,
            created_at: now(),
            modified_at: now(),
        };
        assert!(CremeEntity::try_from(db).is_err());
    }

    #[test]
    fn from_domain_new_entity() {
        let user_id = UserId::new(3).expect("valid id");
        let domain = DomainNewEntity::new(EntityKind::Contact, user_id, " <b>hi</b> ")
            .with_label("Spike");
        let new = NewEntity::from_domain(&domain, now());
        assert_eq!(new.kind, "persons.contact");
        assert_eq!(new.user_id, 3);
        assert_eq!(new.header_filter_search_field, "Spike");
        assert_eq!(new.description, "<b>hi</b>");
    }
}
