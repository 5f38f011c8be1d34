//! Diesel models for relation types, relations and properties.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::entity::EntityKind;
use crate::domain::property::{Property as DomainProperty, PropertyType as DomainPropertyType};
use crate::domain::relation::{Relation as DomainRelation, RelationType as DomainRelationType};
use crate::domain::types::{
    EntityId, PropertyTypeId, RelationId, TypeConstraintError, UserId,
};

#[derive(Debug, Clone, Identifiable, Queryable, Insertable)]
#[diesel(table_name = crate::schema::relation_types)]
/// Diesel model for [`crate::domain::relation::RelationType`].
pub struct RelationType {
    pub id: String,
    pub symmetric_type_id: String,
    pub predicate: String,
    pub subject_kinds: String,
    pub object_kinds: String,
    pub subject_properties: String,
    pub is_custom: bool,
    pub is_internal: bool,
    pub enabled: bool,
    pub is_copiable: bool,
}

#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::relations)]
pub struct Relation {
    pub id: i32,
    pub user_id: i32,
    pub subject_id: i32,
    pub type_id: String,
    pub object_id: i32,
    pub symmetric_relation_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::relations)]
pub struct NewRelation<'a> {
    pub user_id: i32,
    pub subject_id: i32,
    pub type_id: &'a str,
    pub object_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::property_types)]
pub struct PropertyType {
    pub id: i32,
    pub uuid: String,
    pub text: String,
    pub subject_kinds: String,
    pub is_custom: bool,
    pub enabled: bool,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::property_types)]
pub struct NewPropertyType<'a> {
    pub uuid: String,
    pub text: &'a str,
    pub subject_kinds: String,
    pub is_custom: bool,
}

#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::properties)]
pub struct Property {
    pub id: i32,
    pub type_id: i32,
    pub entity_id: i32,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::properties)]
pub struct NewProperty {
    pub type_id: i32,
    pub entity_id: i32,
}

/// Parses the comma-separated property type ids stored on relation types.
fn parse_property_ids(raw: &str) -> Result<Vec<PropertyTypeId>, TypeConstraintError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

pub fn join_property_ids(ids: &[PropertyTypeId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl TryFrom<RelationType> for DomainRelationType {
    type Error = TypeConstraintError;

    fn try_from(rtype: RelationType) -> Result<Self, Self::Error> {
        Ok(Self {
            subject_kinds: EntityKind::parse_list(&rtype.subject_kinds)?,
            object_kinds: EntityKind::parse_list(&rtype.object_kinds)?,
            subject_properties: parse_property_ids(&rtype.subject_properties)?,
            id: rtype.id,
            symmetric_type_id: rtype.symmetric_type_id,
            predicate: rtype.predicate,
            is_custom: rtype.is_custom,
            is_internal: rtype.is_internal,
            enabled: rtype.enabled,
            is_copiable: rtype.is_copiable,
        })
    }
}

impl From<&DomainRelationType> for RelationType {
    fn from(rtype: &DomainRelationType) -> Self {
        Self {
            id: rtype.id.clone(),
            symmetric_type_id: rtype.symmetric_type_id.clone(),
            predicate: rtype.predicate.clone(),
            subject_kinds: EntityKind::join_list(&rtype.subject_kinds),
            object_kinds: EntityKind::join_list(&rtype.object_kinds),
            subject_properties: join_property_ids(&rtype.subject_properties),
            is_custom: rtype.is_custom,
            is_internal: rtype.is_internal,
            enabled: rtype.enabled,
            is_copiable: rtype.is_copiable,
        }
    }
}

impl TryFrom<Relation> for DomainRelation {
    type Error = TypeConstraintError;

    fn try_from(relation: Relation) -> Result<Self, Self::Error> {
        Ok(Self {
            id: RelationId::new(relation.id)?,
            user_id: UserId::new(relation.user_id)?,
            subject_id: EntityId::new(relation.subject_id)?,
            type_id: relation.type_id,
            object_id: EntityId::new(relation.object_id)?,
            symmetric_relation_id: relation.symmetric_relation_id.map(RelationId::new).transpose()?,
            created_at: relation.created_at,
        })
    }
}

impl TryFrom<PropertyType> for DomainPropertyType {
    type Error = TypeConstraintError;

    fn try_from(ptype: PropertyType) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PropertyTypeId::new(ptype.id)?,
            uuid: ptype.uuid.parse()?,
            text: ptype.text,
            subject_kinds: EntityKind::parse_list(&ptype.subject_kinds)?,
            is_custom: ptype.is_custom,
            enabled: ptype.enabled,
        })
    }
}

impl TryFrom<Property> for DomainProperty {
    type Error = TypeConstraintError;

    fn try_from(property: Property) -> Result<Self, Self::Error> {
        Ok(Self {
            type_id: PropertyTypeId::new(property.type_id)?,
            entity_id: EntityId::new(property.entity_id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_type_lists_are_parsed() {
        let db = RelationType {
            id: "persons-subject_employed_by".into(),
            symmetric_type_id: "persons-object_employed_by".into(),
            predicate: "is an employee of".into(),
            subject_kinds: "persons.contact".into(),
            object_kinds: "persons.organisation".into(),
            subject_properties: "3, 4".into(),
            is_custom: false,
            is_internal: false,
            enabled: true,
            is_copiable: true,
        };
        let domain = DomainRelationType::try_from(db).expect("valid relation type");
        assert_eq!(domain.subject_kinds, vec![EntityKind::Contact]);
        assert_eq!(domain.subject_properties.len(), 2);

        let back = RelationType::from(&domain);
        assert_eq!(back.subject_properties, "3,4");
        assert_eq!(back.object_kinds, "persons.organisation");
    }
}
