//! Forms for relations, relation types and properties.

use serde::Deserialize;
use validator::Validate;

use crate::domain::entity::EntityKind;
use crate::domain::property::NewPropertyType;
use crate::domain::relation::RelationTypeSide;
use crate::domain::types::{EntityId, Label, PropertyTypeId};
use crate::forms::{FormError, parse_ids};

fn parse_kinds(raw: &[String]) -> Result<Vec<EntityKind>, FormError> {
    raw.iter()
        .filter(|kind| !kind.trim().is_empty())
        .map(|kind| {
            kind.trim()
                .parse::<EntityKind>()
                .map_err(|_| FormError::InvalidKind(kind.clone()))
        })
        .collect()
}

/// Links an entity to several objects with one relation type.
#[derive(Debug, Deserialize, Validate)]
pub struct AddRelationsForm {
    #[validate(length(min = 1))]
    pub type_id: String,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub object_ids: Vec<i32>,
}

pub struct AddRelationsPayload {
    pub type_id: String,
    pub object_ids: Vec<EntityId>,
}

impl TryFrom<AddRelationsForm> for AddRelationsPayload {
    type Error = FormError;

    fn try_from(form: AddRelationsForm) -> Result<Self, Self::Error> {
        form.validate()?;
        Ok(Self {
            type_id: form.type_id.trim().to_string(),
            object_ids: parse_ids(&form.object_ids)?,
        })
    }
}

/// New custom relation type pair.
#[derive(Debug, Deserialize, Validate)]
pub struct RelationTypeForm {
    #[validate(length(min = 1, max = 100))]
    pub subject_predicate: String,
    #[validate(length(min = 1, max = 100))]
    pub object_predicate: String,
    #[serde(default)]
    pub subject_kinds: Vec<String>,
    #[serde(default)]
    pub object_kinds: Vec<String>,
    #[serde(default)]
    pub subject_properties: Vec<i32>,
    #[serde(default)]
    pub object_properties: Vec<i32>,
}

pub struct RelationTypePayload {
    pub subject: RelationTypeSide,
    pub object: RelationTypeSide,
}

impl TryFrom<RelationTypeForm> for RelationTypePayload {
    type Error = FormError;

    fn try_from(form: RelationTypeForm) -> Result<Self, Self::Error> {
        form.validate()?;
        let side = |predicate: &str, kinds: &[String], properties: &[i32]| {
            Ok::<_, FormError>(RelationTypeSide {
                predicate: Label::new(predicate).map_err(|_| FormError::InvalidName)?,
                kinds: parse_kinds(kinds)?,
                properties: parse_ids::<PropertyTypeId>(properties)?,
            })
        };
        Ok(Self {
            subject: side(
                &form.subject_predicate,
                &form.subject_kinds,
                &form.subject_properties,
            )?,
            object: side(
                &form.object_predicate,
                &form.object_kinds,
                &form.object_properties,
            )?,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PropertyTypeForm {
    #[validate(length(min = 1, max = 200))]
    pub text: String,
    #[serde(default)]
    pub subject_kinds: Vec<String>,
}

impl TryFrom<PropertyTypeForm> for NewPropertyType {
    type Error = FormError;

    fn try_from(form: PropertyTypeForm) -> Result<Self, Self::Error> {
        form.validate()?;
        let text = Label::new(form.text).map_err(|_| FormError::InvalidName)?;
        Ok(NewPropertyType::custom(text, parse_kinds(&form.subject_kinds)?))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddPropertiesForm {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub type_ids: Vec<i32>,
}

impl TryFrom<AddPropertiesForm> for Vec<PropertyTypeId> {
    type Error = FormError;

    fn try_from(form: AddPropertiesForm) -> Result<Self, Self::Error> {
        form.validate()?;
        parse_ids(&form.type_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_type_form_parses_both_sides() {
        let form = RelationTypeForm {
            subject_predicate: "is the pilot of".into(),
            object_predicate: "is piloted by".into(),
            subject_kinds: vec!["persons.contact".into(), "".into()],
            object_kinds: vec![],
            subject_properties: vec![2],
            object_properties: vec![],
        };
        let payload = RelationTypePayload::try_from(form).expect("valid form");
        assert_eq!(payload.subject.kinds, vec![EntityKind::Contact]);
        assert!(payload.object.kinds.is_empty());
        assert_eq!(payload.subject.properties.len(), 1);
    }

    #[test]
    fn unknown_kinds_are_rejected() {
        let form = PropertyTypeForm {
            text: "Is a pilot".into(),
            subject_kinds: vec!["ships.ship".into()],
        };
        assert!(matches!(
            NewPropertyType::try_from(form),
            Err(FormError::InvalidKind(_))
        ));
    }
}
