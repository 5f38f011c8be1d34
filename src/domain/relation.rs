//! Typed, symmetric directed edges between two entities.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entity::EntityKind;
use crate::domain::types::{EntityId, Label, PropertyTypeId, RelationId, UserId};

/// Relation type ids of the built-in types used by the applications.
pub mod ids {
    pub const EMPLOYED_BY: &str = "persons-subject_employed_by";
    pub const MANAGES: &str = "persons-subject_manages";
    pub const CUSTOMER_OF: &str = "persons-subject_customer_supplier";
    pub const PROSPECT_OF: &str = "persons-subject_prospect";
    pub const SUSPECT_OF: &str = "persons-subject_suspect";
    pub const INACTIVE_OF: &str = "persons-subject_inactive";

    pub const PARTICIPATES: &str = "activities-subject_participates_to_activity";
    pub const ACTIVITY_SUBJECT: &str = "activities-subject_activity_subject";
    pub const LINKED_TO_ACTIVITY: &str = "activities-subject_linked_2_activity";

    pub const BILL_ISSUED: &str = "billing-subject_bill_issued";
    pub const BILL_RECEIVED: &str = "billing-subject_bill_received";
    pub const CONVERTED_INTO: &str = "billing-subject_convert";

    pub const INVITED_TO: &str = "events-subject_invited_to";
    pub const ACCEPTED_INVITATION: &str = "events-subject_accepted_invitation";
    pub const REFUSED_INVITATION: &str = "events-subject_refused_invitation";
    pub const CAME_EVENT: &str = "events-subject_came_event";
    pub const NOT_CAME_EVENT: &str = "events-subject_not_came_event";

    /// Prefix of user-defined relation types.
    pub const CUSTOM_PREFIX: &str = "creme_config-";
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelationError {
    #[error("relation type {0} is disabled")]
    DisabledType(String),
    #[error("an entity cannot be linked to itself")]
    SelfRelation,
    #[error("{kind} is not allowed as subject of {type_id}")]
    ForbiddenSubject { type_id: String, kind: EntityKind },
    #[error("{kind} is not allowed as object of {type_id}")]
    ForbiddenObject { type_id: String, kind: EntityKind },
    #[error("the subject needs the property {0} for this relation type")]
    MissingProperty(PropertyTypeId),
    #[error("built-in relation types cannot be modified")]
    NotCustom,
    #[error("invalid relation type: {0}")]
    Invalid(String),
}

/// One direction of a relation type pair.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RelationType {
    pub id: String,
    pub symmetric_type_id: String,
    pub predicate: String,
    /// Allowed subject kinds; empty means every kind.
    pub subject_kinds: Vec<EntityKind>,
    /// Allowed object kinds; empty means every kind.
    pub object_kinds: Vec<EntityKind>,
    /// Property types the subject must carry.
    pub subject_properties: Vec<PropertyTypeId>,
    pub is_custom: bool,
    pub is_internal: bool,
    pub enabled: bool,
    pub is_copiable: bool,
}

impl RelationType {
    pub fn accepts_subject(&self, kind: EntityKind) -> bool {
        self.subject_kinds.is_empty() || self.subject_kinds.contains(&kind)
    }

    pub fn accepts_object(&self, kind: EntityKind) -> bool {
        self.object_kinds.is_empty() || self.object_kinds.contains(&kind)
    }

    /// Checks every constraint for linking `subject` to `object` with this type.
    pub fn check_relation(
        &self,
        subject_id: EntityId,
        subject_kind: EntityKind,
        subject_properties: &[PropertyTypeId],
        object_id: EntityId,
        object_kind: EntityKind,
    ) -> Result<(), RelationError> {
        if !self.enabled {
            return Err(RelationError::DisabledType(self.id.clone()));
        }
        if subject_id == object_id {
            return Err(RelationError::SelfRelation);
        }
        if !self.accepts_subject(subject_kind) {
            return Err(RelationError::ForbiddenSubject {
                type_id: self.id.clone(),
                kind: subject_kind,
            });
        }
        if !self.accepts_object(object_kind) {
            return Err(RelationError::ForbiddenObject {
                type_id: self.id.clone(),
                kind: object_kind,
            });
        }
        if let Some(missing) = self
            .subject_properties
            .iter()
            .find(|ptype| !subject_properties.contains(ptype))
        {
            return Err(RelationError::MissingProperty(*missing));
        }
        Ok(())
    }
}

/// Data for one side of a new relation type pair.
#[derive(Clone, Debug)]
pub struct RelationTypeSide {
    pub predicate: Label,
    pub kinds: Vec<EntityKind>,
    pub properties: Vec<PropertyTypeId>,
}

/// A symmetric pair of relation types to create.
#[derive(Clone, Debug)]
pub struct NewRelationTypePair {
    pub subject_id: String,
    pub object_id: String,
    pub subject: RelationTypeSide,
    pub object: RelationTypeSide,
    pub is_custom: bool,
    pub is_internal: bool,
    pub is_copiable: (bool, bool),
}

impl NewRelationTypePair {
    /// Builds a custom pair with ids derived from the given sequence number.
    pub fn custom(sequence: u32, subject: RelationTypeSide, object: RelationTypeSide) -> Self {
        Self {
            subject_id: format!("{}subject_userrelationtype_{sequence}", ids::CUSTOM_PREFIX),
            object_id: format!("{}object_userrelationtype_{sequence}", ids::CUSTOM_PREFIX),
            subject,
            object,
            is_custom: true,
            is_internal: false,
            is_copiable: (true, true),
        }
    }

    /// The two resulting relation types (subject side first).
    pub fn into_types(self) -> (RelationType, RelationType) {
        let subject = RelationType {
            id: self.subject_id.clone(),
            symmetric_type_id: self.object_id.clone(),
            predicate: self.subject.predicate.into_inner(),
            subject_kinds: self.subject.kinds.clone(),
            object_kinds: self.object.kinds.clone(),
            subject_properties: self.subject.properties.clone(),
            is_custom: self.is_custom,
            is_internal: self.is_internal,
            enabled: true,
            is_copiable: self.is_copiable.0,
        };
        let object = RelationType {
            id: self.object_id,
            symmetric_type_id: self.subject_id,
            predicate: self.object.predicate.into_inner(),
            subject_kinds: self.object.kinds,
            object_kinds: self.subject.kinds,
            subject_properties: self.object.properties,
            is_custom: self.is_custom,
            is_internal: self.is_internal,
            enabled: true,
            is_copiable: self.is_copiable.1,
        };
        (subject, object)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    pub id: RelationId,
    pub user_id: UserId,
    pub subject_id: EntityId,
    pub type_id: String,
    pub object_id: EntityId,
    pub symmetric_relation_id: Option<RelationId>,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRelation {
    pub user_id: UserId,
    pub subject_id: EntityId,
    pub type_id: String,
    pub object_id: EntityId,
}

impl NewRelation {
    pub fn new(user_id: UserId, subject_id: EntityId, type_id: impl Into<String>, object_id: EntityId) -> Self {
        Self {
            user_id,
            subject_id,
            type_id: type_id.into(),
            object_id,
        }
    }

    /// The counterpart relation going the other way.
    pub fn symmetric(&self, symmetric_type_id: &str) -> NewRelation {
        NewRelation {
            user_id: self.user_id,
            subject_id: self.object_id,
            type_id: symmetric_type_id.to_string(),
            object_id: self.subject_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(predicate: &str, kinds: Vec<EntityKind>) -> RelationTypeSide {
        RelationTypeSide {
            predicate: Label::new(predicate).expect("valid predicate"),
            kinds,
            properties: Vec::new(),
        }
    }

    fn id(value: i32) -> EntityId {
        EntityId::new(value).expect("valid id")
    }

    #[test]
    fn custom_pair_is_symmetric() {
        let pair = NewRelationTypePair::custom(
            3,
            side("likes", vec![EntityKind::Contact]),
            side("is liked by", vec![EntityKind::Organisation]),
        );
        let (subject, object) = pair.into_types();
        assert_eq!(subject.id, "creme_config-subject_userrelationtype_3");
        assert_eq!(subject.symmetric_type_id, object.id);
        assert_eq!(object.symmetric_type_id, subject.id);
        assert_eq!(subject.subject_kinds, object.object_kinds);
        assert_eq!(subject.object_kinds, object.subject_kinds);
        assert!(subject.is_custom && object.is_custom);
    }

    #[test]
    fn check_relation_enforces_constraints() {
        let (subject, _) = NewRelationTypePair::custom(
            1,
            side("employs", vec![EntityKind::Organisation]),
            side("works for", vec![EntityKind::Contact]),
        )
        .into_types();

        assert!(
            subject
                .check_relation(id(1), EntityKind::Organisation, &[], id(2), EntityKind::Contact)
                .is_ok()
        );
        assert_eq!(
            subject.check_relation(id(1), EntityKind::Organisation, &[], id(1), EntityKind::Contact),
            Err(RelationError::SelfRelation)
        );
        assert!(matches!(
            subject.check_relation(id(1), EntityKind::Contact, &[], id(2), EntityKind::Contact),
            Err(RelationError::ForbiddenSubject { .. })
        ));
        assert!(matches!(
            subject.check_relation(id(1), EntityKind::Organisation, &[], id(2), EntityKind::Event),
            Err(RelationError::ForbiddenObject { .. })
        ));
    }

    #[test]
    fn subject_properties_are_mandatory() {
        let ptype = PropertyTypeId::new(4).expect("valid id");
        let (mut subject, _) =
            NewRelationTypePair::custom(2, side("a", vec![]), side("b", vec![])).into_types();
        subject.subject_properties = vec![ptype];

        assert_eq!(
            subject.check_relation(id(1), EntityKind::Event, &[], id(2), EntityKind::Event),
            Err(RelationError::MissingProperty(ptype))
        );
        assert!(
            subject
                .check_relation(id(1), EntityKind::Event, &[ptype], id(2), EntityKind::Event)
                .is_ok()
        );
    }
}
