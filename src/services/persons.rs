//! Customer relationships and managed organisations.

use crate::domain::entity::{CremeEntity, EntityKind};
use crate::domain::entity_data::{AnyEntity, EntityData};
use crate::domain::relation::Relation;
use crate::domain::types::EntityId;
use crate::domain::user::User;
use crate::forms::persons::CustomerPayload;
use crate::repository::{
    EntityListQuery, EntityReader, EntityWriter, PropertyReader, RelationReader, RelationWriter,
};
use crate::services::entities::{ensure_live, get_entity, get_live_entity, store_entity};
use crate::services::relations::{get_relation_type, link_entities};
use crate::services::users::{ensure_admin, ensure_can_edit};
use crate::services::{ServiceError, ServiceResult};

fn is_managed(entity: &AnyEntity) -> bool {
    entity
        .data
        .as_organisation()
        .is_some_and(|organisation| organisation.is_managed)
}

/// Organisations of the CRM owner's company, ordered by name.
pub fn list_managed_organisations<R>(repo: &R) -> ServiceResult<Vec<AnyEntity>>
where
    R: EntityReader + ?Sized,
{
    let (_, organisations) = repo.list_entities(EntityListQuery::new(EntityKind::Organisation))?;
    let ids: Vec<EntityId> = organisations.iter().map(|organisation| organisation.id).collect();
    let mut managed: Vec<AnyEntity> = repo
        .get_entities(&ids)?
        .into_iter()
        .filter(|entity| !entity.base.is_deleted && is_managed(entity))
        .collect();
    managed.sort_by_cached_key(|entity| entity.base.label().to_lowercase());
    Ok(managed)
}

/// Links a contact or organisation to a managed organisation with the
/// relation type of `status`.
pub fn set_customer_status<R>(
    repo: &R,
    user: &User,
    person_id: EntityId,
    payload: CustomerPayload,
) -> ServiceResult<Relation>
where
    R: EntityReader + RelationReader + RelationWriter + PropertyReader + ?Sized,
{
    let person = get_entity(repo, person_id)?;
    if !matches!(
        person.base.kind,
        EntityKind::Contact | EntityKind::Organisation
    ) {
        return Err(ServiceError::NotFound);
    }
    ensure_live(&person.base)?;
    ensure_can_edit(user, &person.base)?;

    let managed = get_live_entity(repo, payload.managed_id, EntityKind::Organisation)?;
    if !is_managed(&managed) {
        return Err(ServiceError::Form(format!(
            "\"{}\" is not a managed organisation",
            managed.base.label()
        )));
    }
    let rtype = get_relation_type(repo, payload.status.relation_type_id())?;
    let relation = link_entities(repo, user, &person.base, &rtype, &managed.base)?;
    log::info!(
        "Entity {person_id} is now linked to {} with {}",
        managed.id(),
        rtype.id
    );
    Ok(relation)
}

/// Flags an organisation as managed or not; one managed organisation at
/// least must remain.
pub fn set_managed<R>(
    repo: &R,
    user: &User,
    organisation_id: EntityId,
    managed: bool,
) -> ServiceResult<CremeEntity>
where
    R: EntityReader + EntityWriter + ?Sized,
{
    ensure_admin(user)?;
    let mut organisation = get_live_entity(repo, organisation_id, EntityKind::Organisation)?;
    if is_managed(&organisation) == managed {
        return Ok(organisation.base);
    }
    if !managed {
        let others = list_managed_organisations(repo)?
            .into_iter()
            .filter(|entity| entity.id() != organisation_id)
            .count();
        if others == 0 {
            return Err(ServiceError::Conflict(
                "at least one organisation must remain managed".to_string(),
            ));
        }
    }
    if let EntityData::Organisation(data) = &mut organisation.data {
        data.is_managed = managed;
    }
    let updated = store_entity(repo, organisation)?;
    log::info!(
        "Organisation {organisation_id} managed flag set to {managed} by {}",
        user.email
    );
    Ok(updated.base)
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use super::*;
    use crate::domain::persons::{Contact, CustomerStatus, Organisation};
    use crate::domain::relation::{RelationType, ids};
    use crate::repository::mock::MockRepository;
    use crate::services::users::test_support::{admin_auth, base, user_from, viewer_auth};

    fn organisation(id: i32, managed: bool) -> AnyEntity {
        let mut data = Organisation::new(format!("Orga {id}"));
        data.is_managed = managed;
        AnyEntity {
            base: base(id, EntityKind::Organisation, 1, &data.name),
            data: EntityData::Organisation(data),
        }
    }

    fn id(value: i32) -> EntityId {
        EntityId::new(value).expect("valid id")
    }

    #[test]
    fn the_last_managed_organisation_stays_managed() {
        let admin = user_from(&admin_auth(), 1);
        let mut repo = MockRepository::new();
        repo.expect_get_entity()
            .returning(|id| Ok(Some(organisation(id.get(), id.get() == 1))));
        repo.expect_list_entities().returning(|_| {
            Ok((
                2,
                vec![
                    base(1, EntityKind::Organisation, 1, "Orga 1"),
                    base(2, EntityKind::Organisation, 1, "Orga 2"),
                ],
            ))
        });
        repo.expect_get_entities()
            .returning(|ids| Ok(ids.iter().map(|id| organisation(id.get(), id.get() == 1)).collect()));
        repo.expect_update_entity().never();

        assert!(matches!(
            set_managed(&repo, &admin, id(1), false),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn managing_an_organisation_updates_it() {
        let admin = user_from(&admin_auth(), 1);
        let mut repo = MockRepository::new();
        repo.expect_get_entity()
            .returning(|id| Ok(Some(organisation(id.get(), false))));
        repo.expect_update_entity()
            .withf(|entity| entity.data.as_organisation().is_some_and(|orga| orga.is_managed))
            .times(1)
            .returning(|entity| Ok(entity.clone()));

        set_managed(&repo, &admin, id(2), true).expect("managed");
    }

    #[test]
    fn customers_need_a_managed_organisation() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_get_entity().returning(|id| {
            Ok(Some(if id.get() == 5 {
                AnyEntity {
                    base: base(5, EntityKind::Contact, 2, "Spike"),
                    data: EntityData::Contact(Contact::new("", "Spike")),
                }
            } else {
                organisation(id.get(), false)
            }))
        });
        repo.expect_get_relation_type().never();

        let payload = CustomerPayload {
            status: CustomerStatus::Customer,
            managed_id: id(3),
        };
        assert!(matches!(
            set_customer_status(&repo, &user, id(5), payload),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn prospects_are_linked_with_the_prospect_type() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_get_entity().returning(|id| {
            Ok(Some(if id.get() == 5 {
                AnyEntity {
                    base: base(5, EntityKind::Contact, 2, "Spike"),
                    data: EntityData::Contact(Contact::new("", "Spike")),
                }
            } else {
                organisation(id.get(), true)
            }))
        });
        repo.expect_get_relation_type().returning(|type_id| {
            Ok(Some(RelationType {
                id: type_id.to_string(),
                symmetric_type_id: "persons-object_prospect".into(),
                predicate: "is a prospect of".into(),
                subject_kinds: vec![EntityKind::Contact, EntityKind::Organisation],
                object_kinds: vec![EntityKind::Organisation],
                subject_properties: vec![],
                is_custom: false,
                is_internal: false,
                enabled: true,
                is_copiable: true,
            }))
        });
        repo.expect_list_entity_properties().returning(|_| Ok(vec![]));
        repo.expect_create_relation()
            .withf(|relation| relation.type_id == ids::PROSPECT_OF)
            .times(1)
            .returning(|new| {
                Ok(Relation {
                    id: crate::domain::types::RelationId::new(1).expect("valid id"),
                    user_id: new.user_id,
                    subject_id: new.subject_id,
                    type_id: new.type_id.clone(),
                    object_id: new.object_id,
                    symmetric_relation_id: None,
                    created_at: chrono::NaiveDateTime::default(),
                })
            });

        let payload = CustomerPayload {
            status: CustomerStatus::Prospect,
            managed_id: id(3),
        };
        set_customer_status(&repo, &user, id(5), payload).expect("linked");
    }
}
