//! Boolean tags ("properties") attached to entities.

use serde::{Deserialize, Serialize};

use crate::domain::entity::EntityKind;
use crate::domain::types::{EntityId, Label, PropertyTypeId, PublicId};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PropertyType {
    pub id: PropertyTypeId,
    pub uuid: PublicId,
    pub text: String,
    /// Kinds which can carry the property; empty means every kind.
    pub subject_kinds: Vec<EntityKind>,
    pub is_custom: bool,
    pub enabled: bool,
}

impl PropertyType {
    pub fn accepts(&self, kind: EntityKind) -> bool {
        self.subject_kinds.is_empty() || self.subject_kinds.contains(&kind)
    }
}

#[derive(Clone, Debug)]
pub struct NewPropertyType {
    pub uuid: PublicId,
    pub text: Label,
    pub subject_kinds: Vec<EntityKind>,
    pub is_custom: bool,
}

impl NewPropertyType {
    pub fn custom(text: Label, subject_kinds: Vec<EntityKind>) -> Self {
        Self {
            uuid: PublicId::new(),
            text,
            subject_kinds,
            is_custom: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Property {
    pub type_id: PropertyTypeId,
    pub entity_id: EntityId,
}
