//! Relation types, relations and properties.

use crate::domain::entity::CremeEntity;
use crate::domain::property::{NewPropertyType, PropertyType};
use crate::domain::relation::{
    NewRelation, NewRelationTypePair, Relation, RelationError, RelationType, ids,
};
use crate::domain::types::{EntityId, PropertyTypeId, RelationId};
use crate::domain::user::User;
use crate::forms::relations::{AddRelationsPayload, RelationTypePayload};
use crate::repository::{
    EntityReader, PropertyReader, PropertyWriter, RelationReader, RelationWriter,
};
use crate::services::entities::{ensure_live, get_entity};
use crate::services::users::{ensure_admin, ensure_can_edit};
use crate::services::{ServiceError, ServiceResult};

const CUSTOM_SUBJECT_PREFIX: &str = "subject_userrelationtype_";

/// Sequence number of the next custom pair.
fn next_custom_sequence(types: &[RelationType]) -> u32 {
    types
        .iter()
        .filter_map(|rtype| rtype.id.strip_prefix(ids::CUSTOM_PREFIX))
        .filter_map(|rest| rest.strip_prefix(CUSTOM_SUBJECT_PREFIX))
        .filter_map(|sequence| sequence.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

pub fn list_relation_types<R>(repo: &R) -> ServiceResult<Vec<RelationType>>
where
    R: RelationReader + ?Sized,
{
    let mut types = repo.list_relation_types()?;
    types.sort_by(|a, b| a.predicate.cmp(&b.predicate));
    Ok(types)
}

pub fn get_relation_type<R>(repo: &R, id: &str) -> ServiceResult<RelationType>
where
    R: RelationReader + ?Sized,
{
    repo.get_relation_type(id)?.ok_or(ServiceError::NotFound)
}

/// Creates a custom relation type and its symmetric type.
pub fn create_relation_type_pair<R>(
    repo: &R,
    user: &User,
    payload: RelationTypePayload,
) -> ServiceResult<(RelationType, RelationType)>
where
    R: RelationReader + RelationWriter + ?Sized,
{
    ensure_admin(user)?;
    let sequence = next_custom_sequence(&repo.list_relation_types()?);
    let pair = NewRelationTypePair::custom(sequence, payload.subject, payload.object);
    let created = repo.create_relation_type_pair(&pair)?;
    log::info!(
        "Relation types {} / {} created by {}",
        created.0.id,
        created.1.id,
        user.email
    );
    Ok(created)
}

fn custom_type<R>(repo: &R, id: &str) -> ServiceResult<RelationType>
where
    R: RelationReader + ?Sized,
{
    let rtype = get_relation_type(repo, id)?;
    if !rtype.is_custom {
        return Err(RelationError::NotCustom.into());
    }
    Ok(rtype)
}

/// Deletes a custom pair with every relation using it.
pub fn delete_relation_type<R>(repo: &R, user: &User, id: &str) -> ServiceResult<()>
where
    R: RelationReader + RelationWriter + ?Sized,
{
    ensure_admin(user)?;
    custom_type(repo, id)?;
    repo.delete_relation_type_pair(id)?;
    log::info!("Relation type {id} deleted by {}", user.email);
    Ok(())
}

/// Disabled types cannot be used for new relations.
pub fn set_relation_type_enabled<R>(
    repo: &R,
    user: &User,
    id: &str,
    enabled: bool,
) -> ServiceResult<()>
where
    R: RelationReader + RelationWriter + ?Sized,
{
    ensure_admin(user)?;
    let rtype = get_relation_type(repo, id)?;
    repo.set_relation_type_enabled(&rtype.id, enabled)?;
    repo.set_relation_type_enabled(&rtype.symmetric_type_id, enabled)?;
    Ok(())
}

/// Creates a relation after checking the type constraints.
///
/// Used by the dedicated operations (customers, participants, invitations...)
/// as well as the generic relation form.
pub fn link_entities<R>(
    repo: &R,
    user: &User,
    subject: &CremeEntity,
    rtype: &RelationType,
    object: &CremeEntity,
) -> ServiceResult<Relation>
where
    R: PropertyReader + RelationWriter + ?Sized,
{
    let properties = subject_properties(repo, subject)?;
    let relation = checked_relation(user, subject, &properties, rtype, object)?;
    Ok(repo.create_relation(&relation)?)
}

fn subject_properties<R>(repo: &R, subject: &CremeEntity) -> ServiceResult<Vec<PropertyTypeId>>
where
    R: PropertyReader + ?Sized,
{
    Ok(repo
        .list_entity_properties(subject.id)?
        .into_iter()
        .map(|ptype| ptype.id)
        .collect())
}

fn checked_relation(
    user: &User,
    subject: &CremeEntity,
    properties: &[PropertyTypeId],
    rtype: &RelationType,
    object: &CremeEntity,
) -> ServiceResult<NewRelation> {
    ensure_live(object)?;
    rtype.check_relation(subject.id, subject.kind, properties, object.id, object.kind)?;
    Ok(NewRelation::new(user.id, subject.id, rtype.id.clone(), object.id))
}

/// Links `subject_id` to the objects of the payload.
pub fn add_relations<R>(
    repo: &R,
    user: &User,
    subject_id: EntityId,
    payload: AddRelationsPayload,
) -> ServiceResult<Vec<Relation>>
where
    R: EntityReader + RelationReader + RelationWriter + PropertyReader + ?Sized,
{
    let subject = get_entity(repo, subject_id)?.base;
    ensure_live(&subject)?;
    ensure_can_edit(user, &subject)?;
    let rtype = get_relation_type(repo, &payload.type_id)?;
    if rtype.is_internal {
        return Err(RelationError::Invalid(format!(
            "{} is managed by a dedicated form",
            rtype.predicate
        ))
        .into());
    }

    let objects = repo.get_entities(&payload.object_ids)?;
    if objects.len() != payload.object_ids.len() {
        return Err(ServiceError::NotFound);
    }
    let properties = subject_properties(repo, &subject)?;
    let new_relations = objects
        .iter()
        .map(|object| checked_relation(user, &subject, &properties, &rtype, &object.base))
        .collect::<ServiceResult<Vec<_>>>()?;
    let relations = repo.create_relations(&new_relations)?;
    log::info!(
        "{} relation(s) \"{}\" added to entity {subject_id}",
        relations.len(),
        rtype.predicate
    );
    Ok(relations)
}

/// Deletes a relation and its symmetric one.
pub fn delete_relation<R>(repo: &R, user: &User, id: RelationId) -> ServiceResult<Relation>
where
    R: EntityReader + RelationReader + RelationWriter + ?Sized,
{
    let relation = repo.get_relation(id)?.ok_or(ServiceError::NotFound)?;
    let subject = get_entity(repo, relation.subject_id)?.base;
    ensure_can_edit(user, &subject)?;
    let rtype = get_relation_type(repo, &relation.type_id)?;
    if rtype.is_internal {
        return Err(RelationError::Invalid(format!(
            "{} is managed by a dedicated form",
            rtype.predicate
        ))
        .into());
    }
    repo.delete_relation(id)?;
    Ok(relation)
}

pub fn list_property_types<R>(repo: &R) -> ServiceResult<Vec<PropertyType>>
where
    R: PropertyReader + ?Sized,
{
    let mut types = repo.list_property_types()?;
    types.sort_by(|a, b| a.text.cmp(&b.text));
    Ok(types)
}

pub fn create_property_type<R>(
    repo: &R,
    user: &User,
    property_type: NewPropertyType,
) -> ServiceResult<PropertyType>
where
    R: PropertyWriter + ?Sized,
{
    ensure_admin(user)?;
    let created = repo.create_property_type(&property_type)?;
    log::info!("Property type \"{}\" created by {}", created.text, user.email);
    Ok(created)
}

/// Only custom property types may be deleted; their properties go with them.
pub fn delete_property_type<R>(repo: &R, user: &User, id: PropertyTypeId) -> ServiceResult<()>
where
    R: PropertyReader + PropertyWriter + ?Sized,
{
    ensure_admin(user)?;
    let ptype = repo
        .list_property_types()?
        .into_iter()
        .find(|ptype| ptype.id == id)
        .ok_or(ServiceError::NotFound)?;
    if !ptype.is_custom {
        return Err(ServiceError::Form(
            "built-in property types cannot be deleted".to_string(),
        ));
    }
    repo.delete_property_type(id)?;
    Ok(())
}

/// Adds properties to an entity; returns how many were new.
pub fn add_properties<R>(
    repo: &R,
    user: &User,
    entity_id: EntityId,
    type_ids: &[PropertyTypeId],
) -> ServiceResult<usize>
where
    R: EntityReader + PropertyReader + PropertyWriter + ?Sized,
{
    let entity = get_entity(repo, entity_id)?.base;
    ensure_live(&entity)?;
    ensure_can_edit(user, &entity)?;
    let types = repo.list_property_types()?;

    let mut added = 0;
    for type_id in type_ids {
        let ptype = types
            .iter()
            .find(|ptype| ptype.id == *type_id)
            .ok_or(ServiceError::NotFound)?;
        if !ptype.enabled || !ptype.accepts(entity.kind) {
            return Err(ServiceError::Form(format!(
                "\"{}\" cannot be set on a {}",
                ptype.text,
                entity.kind.verbose_name()
            )));
        }
        if repo.add_property(entity_id, *type_id)? {
            added += 1;
        }
    }
    Ok(added)
}

pub fn remove_property<R>(
    repo: &R,
    user: &User,
    entity_id: EntityId,
    type_id: PropertyTypeId,
) -> ServiceResult<()>
where
    R: EntityReader + PropertyWriter + ?Sized,
{
    let entity = get_entity(repo, entity_id)?.base;
    ensure_can_edit(user, &entity)?;
    repo.remove_property(entity_id, type_id)?;
    Ok(())
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;
    use crate::domain::entity::EntityKind;
    use crate::domain::entity_data::{AnyEntity, EntityData};
    use crate::domain::persons::{Contact, Organisation};
    use crate::domain::types::PublicId;
    use crate::repository::mock::MockRepository;
    use crate::services::users::test_support::{admin_auth, base, user_from, viewer_auth};

    fn employed_by() -> RelationType {
        RelationType {
            id: ids::EMPLOYED_BY.to_string(),
            symmetric_type_id: "persons-object_employed_by".to_string(),
            predicate: "is an employee of".to_string(),
            subject_kinds: vec![EntityKind::Contact],
            object_kinds: vec![EntityKind::Organisation],
            subject_properties: vec![],
            is_custom: false,
            is_internal: false,
            enabled: true,
            is_copiable: true,
        }
    }

    fn entity(id: i32, kind: EntityKind, owner: i32) -> AnyEntity {
        let data = match kind {
            EntityKind::Contact => EntityData::Contact(Contact::new("Spike", "Spiegel")),
            _ => EntityData::Organisation(Organisation::new("Bebop")),
        };
        AnyEntity {
            base: base(id, kind, owner, "entity"),
            data,
        }
    }

    fn id(value: i32) -> EntityId {
        EntityId::new(value).expect("valid id")
    }

    #[test]
    fn custom_sequences_follow_the_highest_one() {
        let mut custom = employed_by();
        custom.id = format!("{}subject_userrelationtype_7", ids::CUSTOM_PREFIX);
        assert_eq!(next_custom_sequence(&[employed_by(), custom]), 8);
        assert_eq!(next_custom_sequence(&[]), 1);
    }

    fn stored(new: &NewRelation) -> Relation {
        Relation {
            id: RelationId::new(1).expect("valid id"),
            user_id: new.user_id,
            subject_id: new.subject_id,
            type_id: new.type_id.clone(),
            object_id: new.object_id,
            symmetric_relation_id: None,
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn one_invalid_object_links_nothing() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_get_entity()
            .returning(|id| Ok(Some(entity(id.get(), EntityKind::Contact, 2))));
        repo.expect_get_relation_type()
            .returning(|_| Ok(Some(employed_by())));
        repo.expect_get_entities().returning(|_| {
            Ok(vec![
                entity(3, EntityKind::Organisation, 1),
                entity(4, EntityKind::Contact, 1),
            ])
        });
        repo.expect_list_entity_properties().returning(|_| Ok(vec![]));
        repo.expect_create_relation().never();
        repo.expect_create_relations().never();

        let payload = AddRelationsPayload {
            type_id: ids::EMPLOYED_BY.to_string(),
            object_ids: vec![id(3), id(4)],
        };
        assert!(matches!(
            add_relations(&repo, &user, id(1), payload),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn relations_respect_the_object_kinds() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_get_entity()
            .returning(|id| Ok(Some(entity(id.get(), EntityKind::Contact, 2))));
        repo.expect_get_relation_type()
            .returning(|_| Ok(Some(employed_by())));
        repo.expect_get_entities()
            .returning(|_| Ok(vec![entity(3, EntityKind::Contact, 2)]));
        repo.expect_list_entity_properties().returning(|_| Ok(vec![]));
        repo.expect_create_relations().never();

        let payload = AddRelationsPayload {
            type_id: ids::EMPLOYED_BY.to_string(),
            object_ids: vec![id(3)],
        };
        assert!(matches!(
            add_relations(&repo, &user, id(1), payload),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn relations_are_created_for_each_object() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_get_entity()
            .returning(|id| Ok(Some(entity(id.get(), EntityKind::Contact, 2))));
        repo.expect_get_relation_type()
            .returning(|_| Ok(Some(employed_by())));
        repo.expect_get_entities().returning(|_| {
            Ok(vec![
                entity(3, EntityKind::Organisation, 1),
                entity(4, EntityKind::Organisation, 1),
            ])
        });
        repo.expect_list_entity_properties().returning(|_| Ok(vec![]));
        repo.expect_create_relations()
            .withf(|relations| relations.len() == 2)
            .times(1)
            .returning(|relations| Ok(relations.iter().map(stored).collect()));

        let payload = AddRelationsPayload {
            type_id: ids::EMPLOYED_BY.to_string(),
            object_ids: vec![id(3), id(4)],
        };
        let relations = add_relations(&repo, &user, id(1), payload).expect("relations created");
        assert_eq!(relations.len(), 2);
    }

    #[test]
    fn built_in_types_cannot_be_deleted() {
        let admin = user_from(&admin_auth(), 1);
        let mut repo = MockRepository::new();
        repo.expect_get_relation_type()
            .returning(|_| Ok(Some(employed_by())));
        repo.expect_delete_relation_type_pair().never();

        assert!(matches!(
            delete_relation_type(&repo, &admin, ids::EMPLOYED_BY),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn properties_check_the_subject_kind() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_get_entity()
            .returning(|id| Ok(Some(entity(id.get(), EntityKind::Contact, 2))));
        repo.expect_list_property_types().returning(|| {
            Ok(vec![PropertyType {
                id: PropertyTypeId::new(1).expect("valid id"),
                uuid: PublicId::new(),
                text: "is a competitor".into(),
                subject_kinds: vec![EntityKind::Organisation],
                is_custom: false,
                enabled: true,
            }])
        });
        repo.expect_add_property().never();

        let types = [PropertyTypeId::new(1).expect("valid id")];
        assert!(add_properties(&repo, &user, id(1), &types).is_err());
    }
}
