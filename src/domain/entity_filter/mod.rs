//! Saved, composable queries over entities.
//!
//! A filter is a list of conditions combined with AND (or OR when `use_or`
//! is set). Conditions can reference other filters, which must never form a
//! cycle and must respect the privacy of the referencing filter.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::custom_field::{CustomField, CustomFieldType};
use crate::domain::entity::EntityKind;
use crate::domain::fields::field_descriptor;
use crate::domain::relation::RelationType;
use crate::domain::types::{EntityId, PublicId, TypeConstraintError, UserId};

pub mod date_range;
pub mod engine;
pub mod operator;

pub use date_range::DateRange;
pub use engine::{EntitySnapshot, FilterEngine, RelationEdge};
pub use operator::Operator;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown field \"{0}\"")]
    UnknownField(String),
    #[error("the operator \"{operator}\" cannot be used on \"{field}\"")]
    InvalidOperator { operator: &'static str, field: String },
    #[error("invalid condition value: {0}")]
    InvalidValue(String),
    #[error("\"{0}\" is not a date field")]
    NotADateField(String),
    #[error("invalid date range")]
    InvalidDateRange,
    #[error("unknown relation type \"{0}\"")]
    UnknownRelationType(String),
    #[error("unknown property type \"{0}\"")]
    UnknownPropertyType(PublicId),
    #[error("unknown custom field \"{0}\"")]
    UnknownCustomField(PublicId),
    #[error("unknown filter \"{0}\"")]
    UnknownFilter(String),
    #[error("the sub-filter \"{0}\" does not filter the same kind of entity")]
    SubfilterKind(String),
    #[error("a private filter must belong to a user")]
    PrivateWithoutOwner,
    #[error("a public filter cannot use the private sub-filter \"{0}\"")]
    PrivateSubfilter(String),
    #[error("the private sub-filter \"{0}\" belongs to another user")]
    ForeignPrivateSubfilter(String),
    #[error("the filter \"{0}\" references itself")]
    Cycle(String),
    #[error("the filter is used by the filter \"{0}\"")]
    InUse(String),
    #[error("this filter cannot be edited")]
    NotEditable,
}

impl From<TypeConstraintError> for FilterError {
    fn from(err: TypeConstraintError) -> Self {
        FilterError::InvalidValue(err.to_string())
    }
}

/// Stable kind codes of the stored conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionKind {
    Subfilter,
    Field,
    DateField,
    Relation,
    RelationSubfilter,
    Property,
    CustomField,
    DateCustomField,
}

impl ConditionKind {
    pub const ALL: [ConditionKind; 8] = [
        ConditionKind::Subfilter,
        ConditionKind::Field,
        ConditionKind::DateField,
        ConditionKind::Relation,
        ConditionKind::RelationSubfilter,
        ConditionKind::Property,
        ConditionKind::CustomField,
        ConditionKind::DateCustomField,
    ];

    pub fn code(self) -> i32 {
        match self {
            ConditionKind::Subfilter => 1,
            ConditionKind::Field => 5,
            ConditionKind::DateField => 6,
            ConditionKind::Relation => 10,
            ConditionKind::RelationSubfilter => 11,
            ConditionKind::Property => 15,
            ConditionKind::CustomField => 20,
            ConditionKind::DateCustomField => 21,
        }
    }
}

impl TryFrom<i32> for ConditionKind {
    type Error = FilterError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        ConditionKind::ALL
            .into_iter()
            .find(|kind| kind.code() == value)
            .ok_or_else(|| FilterError::InvalidValue(format!("condition kind {value}")))
    }
}

/// Storage/transfer form of a condition: `(kind, name, JSON value)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionRow {
    pub kind: i32,
    pub name: String,
    pub value: String,
}

#[derive(Serialize, Deserialize)]
struct FieldOperand {
    operator: Operator,
    values: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct RelationOperand {
    has: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    entity_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    entity_kind: Option<EntityKind>,
}

#[derive(Serialize, Deserialize)]
struct RelationSubfilterOperand {
    has: bool,
    filter_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterCondition {
    Subfilter {
        filter_id: String,
    },
    Field {
        field: String,
        operator: Operator,
        values: Vec<String>,
    },
    DateField {
        field: String,
        range: DateRange,
    },
    /// Entities having (or not) a relation of the type, optionally to a given
    /// entity or to any entity of a given kind.
    Relation {
        type_id: String,
        has: bool,
        entity_id: Option<EntityId>,
        entity_kind: Option<EntityKind>,
    },
    RelationSubfilter {
        type_id: String,
        has: bool,
        filter_id: String,
    },
    Property {
        ptype_uuid: PublicId,
        has: bool,
    },
    CustomField {
        cfield_uuid: PublicId,
        operator: Operator,
        values: Vec<String>,
    },
    DateCustomField {
        cfield_uuid: PublicId,
        range: DateRange,
    },
}

fn to_json<T: Serialize>(value: &T) -> Result<String, FilterError> {
    serde_json::to_string(value).map_err(|err| FilterError::InvalidValue(err.to_string()))
}

fn from_json<'a, T: Deserialize<'a>>(raw: &'a str) -> Result<T, FilterError> {
    serde_json::from_str(raw).map_err(|err| FilterError::InvalidValue(err.to_string()))
}

impl FilterCondition {
    pub fn kind(&self) -> ConditionKind {
        match self {
            FilterCondition::Subfilter { .. } => ConditionKind::Subfilter,
            FilterCondition::Field { .. } => ConditionKind::Field,
            FilterCondition::DateField { .. } => ConditionKind::DateField,
            FilterCondition::Relation { .. } => ConditionKind::Relation,
            FilterCondition::RelationSubfilter { .. } => ConditionKind::RelationSubfilter,
            FilterCondition::Property { .. } => ConditionKind::Property,
            FilterCondition::CustomField { .. } => ConditionKind::CustomField,
            FilterCondition::DateCustomField { .. } => ConditionKind::DateCustomField,
        }
    }

    /// Custom field read by this condition, if any.
    pub fn custom_field_uuid(&self) -> Option<&PublicId> {
        match self {
            FilterCondition::CustomField { cfield_uuid, .. }
            | FilterCondition::DateCustomField { cfield_uuid, .. } => Some(cfield_uuid),
            _ => None,
        }
    }

    /// Filter referenced by this condition, if any.
    pub fn subfilter_id(&self) -> Option<&str> {
        match self {
            FilterCondition::Subfilter { filter_id }
            | FilterCondition::RelationSubfilter { filter_id, .. } => Some(filter_id),
            _ => None,
        }
    }

    pub fn to_row(&self) -> Result<ConditionRow, FilterError> {
        let (name, value) = match self {
            FilterCondition::Subfilter { filter_id } => (filter_id.clone(), String::new()),
            FilterCondition::Field {
                field,
                operator,
                values,
            } => (
                field.clone(),
                to_json(&FieldOperand {
                    operator: *operator,
                    values: values.clone(),
                })?,
            ),
            FilterCondition::DateField { field, range } => (field.clone(), to_json(range)?),
            FilterCondition::Relation {
                type_id,
                has,
                entity_id,
                entity_kind,
            } => (
                type_id.clone(),
                to_json(&RelationOperand {
                    has: *has,
                    entity_id: *entity_id,
                    entity_kind: *entity_kind,
                })?,
            ),
            FilterCondition::RelationSubfilter {
                type_id,
                has,
                filter_id,
            } => (
                type_id.clone(),
                to_json(&RelationSubfilterOperand {
                    has: *has,
                    filter_id: filter_id.clone(),
                })?,
            ),
            FilterCondition::Property { ptype_uuid, has } => {
                (ptype_uuid.to_string(), to_json(has)?)
            }
            FilterCondition::CustomField {
                cfield_uuid,
                operator,
                values,
            } => (
                cfield_uuid.to_string(),
                to_json(&FieldOperand {
                    operator: *operator,
                    values: values.clone(),
                })?,
            ),
            FilterCondition::DateCustomField { cfield_uuid, range } => {
                (cfield_uuid.to_string(), to_json(range)?)
            }
        };
        Ok(ConditionRow {
            kind: self.kind().code(),
            name,
            value,
        })
    }
}

impl TryFrom<&ConditionRow> for FilterCondition {
    type Error = FilterError;

    fn try_from(row: &ConditionRow) -> Result<Self, Self::Error> {
        let uuid = || row.name.parse::<PublicId>().map_err(FilterError::from);
        Ok(match ConditionKind::try_from(row.kind)? {
            ConditionKind::Subfilter => FilterCondition::Subfilter {
                filter_id: row.name.clone(),
            },
            ConditionKind::Field => {
                let operand: FieldOperand = from_json(&row.value)?;
                FilterCondition::Field {
                    field: row.name.clone(),
                    operator: operand.operator,
                    values: operand.values,
                }
            }
            ConditionKind::DateField => FilterCondition::DateField {
                field: row.name.clone(),
                range: from_json(&row.value)?,
            },
            ConditionKind::Relation => {
                let operand: RelationOperand = from_json(&row.value)?;
                FilterCondition::Relation {
                    type_id: row.name.clone(),
                    has: operand.has,
                    entity_id: operand.entity_id,
                    entity_kind: operand.entity_kind,
                }
            }
            ConditionKind::RelationSubfilter => {
                let operand: RelationSubfilterOperand = from_json(&row.value)?;
                FilterCondition::RelationSubfilter {
                    type_id: row.name.clone(),
                    has: operand.has,
                    filter_id: operand.filter_id,
                }
            }
            ConditionKind::Property => FilterCondition::Property {
                ptype_uuid: uuid()?,
                has: from_json(&row.value)?,
            },
            ConditionKind::CustomField => {
                let operand: FieldOperand = from_json(&row.value)?;
                FilterCondition::CustomField {
                    cfield_uuid: uuid()?,
                    operator: operand.operator,
                    values: operand.values,
                }
            }
            ConditionKind::DateCustomField => FilterCondition::DateCustomField {
                cfield_uuid: uuid()?,
                range: from_json(&row.value)?,
            },
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityFilter {
    pub id: String,
    pub name: String,
    pub entity_kind: EntityKind,
    pub user_id: Option<UserId>,
    pub is_private: bool,
    /// System filters (seeded) cannot be edited or deleted.
    pub is_custom: bool,
    pub use_or: bool,
    pub conditions: Vec<FilterCondition>,
}

impl EntityFilter {
    /// Builds the id of a new user filter.
    pub fn generate_id(kind: EntityKind) -> String {
        let app = kind.as_str().split('.').next().unwrap_or("creme_core");
        format!("{app}-userfilter_{}", PublicId::new())
    }

    pub fn is_visible_to(&self, user_id: UserId) -> bool {
        !self.is_private || self.user_id == Some(user_id)
    }

    pub fn can_edit(&self, user_id: UserId, is_admin: bool) -> bool {
        if !self.is_custom {
            return false;
        }
        match self.user_id {
            Some(owner) => owner == user_id || (is_admin && !self.is_private),
            None => is_admin,
        }
    }

    pub fn subfilter_ids(&self) -> impl Iterator<Item = &str> {
        self.conditions.iter().filter_map(FilterCondition::subfilter_id)
    }
}

/// What validation and evaluation need to know about a custom field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomFieldRef {
    pub kind: EntityKind,
    pub field_type: CustomFieldType,
    pub is_deleted: bool,
}

impl From<&CustomField> for CustomFieldRef {
    fn from(field: &CustomField) -> Self {
        Self {
            kind: field.kind,
            field_type: field.field_type,
            is_deleted: field.is_deleted,
        }
    }
}

/// Configuration items conditions can reference.
#[derive(Clone, Debug, Default)]
pub struct FilterCatalog {
    pub relation_types: HashMap<String, RelationType>,
    pub property_types: HashSet<PublicId>,
    pub custom_fields: HashMap<PublicId, CustomFieldRef>,
    pub filters: HashMap<String, EntityFilter>,
}

impl FilterCatalog {
    fn filter(&self, id: &str) -> Result<&EntityFilter, FilterError> {
        self.filters
            .get(id)
            .ok_or_else(|| FilterError::UnknownFilter(id.to_string()))
    }

    fn live_custom_field(&self, uuid: &PublicId) -> Result<&CustomFieldRef, FilterError> {
        self.custom_fields
            .get(uuid)
            .filter(|field| !field.is_deleted)
            .ok_or(FilterError::UnknownCustomField(*uuid))
    }

    /// Validates one condition of a filter on `kind`.
    pub fn validate_condition(
        &self,
        kind: EntityKind,
        condition: &FilterCondition,
    ) -> Result<(), FilterError> {
        match condition {
            FilterCondition::Subfilter { filter_id } => {
                if self.filter(filter_id)?.entity_kind != kind {
                    return Err(FilterError::SubfilterKind(filter_id.clone()));
                }
            }
            FilterCondition::Field {
                field,
                operator,
                values,
            } => {
                let descriptor = field_descriptor(kind, field)
                    .ok_or_else(|| FilterError::UnknownField(field.clone()))?;
                if !operator.accepts(descriptor.field_type) {
                    return Err(FilterError::InvalidOperator {
                        operator: operator.verbose_name(),
                        field: field.clone(),
                    });
                }
                operator.parse_values(descriptor.field_type, values)?;
            }
            FilterCondition::DateField { field, range } => {
                let descriptor = field_descriptor(kind, field)
                    .ok_or_else(|| FilterError::UnknownField(field.clone()))?;
                if !descriptor.field_type.is_temporal() {
                    return Err(FilterError::NotADateField(field.clone()));
                }
                if !range.is_valid() {
                    return Err(FilterError::InvalidDateRange);
                }
            }
            FilterCondition::Relation { type_id, .. } => {
                if !self.relation_types.contains_key(type_id) {
                    return Err(FilterError::UnknownRelationType(type_id.clone()));
                }
            }
            FilterCondition::RelationSubfilter {
                type_id, filter_id, ..
            } => {
                if !self.relation_types.contains_key(type_id) {
                    return Err(FilterError::UnknownRelationType(type_id.clone()));
                }
                self.filter(filter_id)?;
            }
            FilterCondition::Property { ptype_uuid, .. } => {
                if !self.property_types.contains(ptype_uuid) {
                    return Err(FilterError::UnknownPropertyType(*ptype_uuid));
                }
            }
            FilterCondition::CustomField {
                cfield_uuid,
                operator,
                values,
            } => {
                let cfield = self.live_custom_field(cfield_uuid)?;
                let field_type = cfield.field_type.as_field_type();
                if cfield.kind != kind || field_type.is_temporal() {
                    return Err(FilterError::UnknownCustomField(*cfield_uuid));
                }
                if !operator.accepts(field_type) {
                    return Err(FilterError::InvalidOperator {
                        operator: operator.verbose_name(),
                        field: cfield_uuid.to_string(),
                    });
                }
                operator.parse_values(field_type, values)?;
            }
            FilterCondition::DateCustomField { cfield_uuid, range } => {
                let cfield = self.live_custom_field(cfield_uuid)?;
                if cfield.kind != kind {
                    return Err(FilterError::UnknownCustomField(*cfield_uuid));
                }
                if !cfield.field_type.as_field_type().is_temporal() {
                    return Err(FilterError::NotADateField(cfield_uuid.to_string()));
                }
                if !range.is_valid() {
                    return Err(FilterError::InvalidDateRange);
                }
            }
        }
        Ok(())
    }

    /// Validates a new or modified filter against the catalog.
    pub fn validate_filter(&self, filter: &EntityFilter) -> Result<(), FilterError> {
        if filter.is_private && filter.user_id.is_none() {
            return Err(FilterError::PrivateWithoutOwner);
        }
        for condition in &filter.conditions {
            self.validate_condition(filter.entity_kind, condition)?;
        }
        for sub_id in filter.subfilter_ids() {
            let sub = self.filter(sub_id)?;
            if sub.is_private {
                if !filter.is_private {
                    return Err(FilterError::PrivateSubfilter(sub_id.to_string()));
                }
                if sub.user_id != filter.user_id {
                    return Err(FilterError::ForeignPrivateSubfilter(sub_id.to_string()));
                }
            }
        }
        self.check_cycles(filter)
    }

    /// Rejects the filter when one of its sub-filters leads back to it.
    pub fn check_cycles(&self, filter: &EntityFilter) -> Result<(), FilterError> {
        let mut stack: Vec<&str> = filter.subfilter_ids().collect();
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == filter.id {
                return Err(FilterError::Cycle(filter.id.clone()));
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(next) = self.filters.get(current) {
                stack.extend(next.subfilter_ids());
            }
        }
        Ok(())
    }

    /// A filter referenced by another one cannot be deleted.
    pub fn check_deletable(&self, filter: &EntityFilter) -> Result<(), FilterError> {
        if !filter.is_custom {
            return Err(FilterError::NotEditable);
        }
        match self
            .filters
            .values()
            .find(|other| other.id != filter.id && other.subfilter_ids().any(|id| id == filter.id))
        {
            Some(user) => Err(FilterError::InUse(user.name.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i32) -> UserId {
        UserId::new(id).expect("valid id")
    }

    fn filter(id: &str, conditions: Vec<FilterCondition>) -> EntityFilter {
        EntityFilter {
            id: id.into(),
            name: id.into(),
            entity_kind: EntityKind::Contact,
            user_id: Some(user(1)),
            is_private: false,
            is_custom: true,
            use_or: false,
            conditions,
        }
    }

    fn sub(id: &str) -> FilterCondition {
        FilterCondition::Subfilter {
            filter_id: id.into(),
        }
    }

    fn catalog(filters: Vec<EntityFilter>) -> FilterCatalog {
        FilterCatalog {
            filters: filters.into_iter().map(|f| (f.id.clone(), f)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn condition_rows_round_trip() {
        let conditions = vec![
            FilterCondition::Field {
                field: "last_name".into(),
                operator: Operator::IStartsWith,
                values: vec!["sp".into()],
            },
            FilterCondition::DateField {
                field: "birthday".into(),
                range: DateRange::CurrentYear,
            },
            FilterCondition::Relation {
                type_id: "persons-subject_employed_by".into(),
                has: true,
                entity_id: None,
                entity_kind: Some(EntityKind::Organisation),
            },
            FilterCondition::Property {
                ptype_uuid: PublicId::new(),
                has: false,
            },
        ];
        for condition in conditions {
            let row = condition.to_row().expect("serializable");
            assert_eq!(FilterCondition::try_from(&row), Ok(condition));
        }
    }

    #[test]
    fn field_operand_format() {
        let row = FilterCondition::Field {
            field: "email".into(),
            operator: Operator::IsEmpty,
            values: vec!["false".into()],
        }
        .to_row()
        .expect("serializable");
        assert_eq!(row.kind, 5);
        assert_eq!(row.value, r#"{"operator":21,"values":["false"]}"#);
    }

    #[test]
    fn validates_field_conditions() {
        let catalog = FilterCatalog::default();
        let ok = FilterCondition::Field {
            field: "last_name".into(),
            operator: Operator::IContains,
            values: vec!["a".into()],
        };
        assert!(catalog.validate_condition(EntityKind::Contact, &ok).is_ok());

        let unknown = FilterCondition::Field {
            field: "nickname".into(),
            operator: Operator::Equals,
            values: vec!["a".into()],
        };
        assert_eq!(
            catalog.validate_condition(EntityKind::Contact, &unknown),
            Err(FilterError::UnknownField("nickname".into()))
        );

        let wrong_operator = FilterCondition::Field {
            field: "birthday".into(),
            operator: Operator::IContains,
            values: vec!["a".into()],
        };
        assert!(matches!(
            catalog.validate_condition(EntityKind::Contact, &wrong_operator),
            Err(FilterError::InvalidOperator { .. })
        ));
    }

    #[test]
    fn rejects_cycles() {
        let a = filter("a", vec![sub("b")]);
        let b = filter("b", vec![]);
        let catalog = catalog(vec![a.clone(), b]);

        let b_with_cycle = filter("b", vec![sub("a")]);
        assert_eq!(
            catalog.validate_filter(&b_with_cycle),
            Err(FilterError::Cycle("b".into()))
        );
        assert_eq!(
            catalog.validate_filter(&filter("c", vec![sub("c")])),
            Err(FilterError::UnknownFilter("c".into()))
        );
        assert!(catalog.validate_filter(&a).is_ok());
    }

    #[test]
    fn enforces_subfilter_privacy() {
        let mut private = filter("private", vec![]);
        private.is_private = true;
        let catalog = catalog(vec![private]);

        let public = filter("public", vec![sub("private")]);
        assert_eq!(
            catalog.validate_filter(&public),
            Err(FilterError::PrivateSubfilter("private".into()))
        );

        let mut foreign = filter("foreign", vec![sub("private")]);
        foreign.is_private = true;
        foreign.user_id = Some(user(2));
        assert_eq!(
            catalog.validate_filter(&foreign),
            Err(FilterError::ForeignPrivateSubfilter("private".into()))
        );

        let mut own = filter("own", vec![sub("private")]);
        own.is_private = true;
        assert!(catalog.validate_filter(&own).is_ok());

        let mut orphan = filter("orphan", vec![]);
        orphan.is_private = true;
        orphan.user_id = None;
        assert_eq!(catalog.validate_filter(&orphan), Err(FilterError::PrivateWithoutOwner));
    }

    #[test]
    fn subfilter_must_filter_the_same_kind() {
        let mut orga = filter("orga", vec![]);
        orga.entity_kind = EntityKind::Organisation;
        let catalog = catalog(vec![orga]);
        assert_eq!(
            catalog.validate_filter(&filter("contact", vec![sub("orga")])),
            Err(FilterError::SubfilterKind("orga".into()))
        );
    }

    #[test]
    fn used_filters_cannot_be_deleted() {
        let a = filter("a", vec![sub("b")]);
        let b = filter("b", vec![]);
        let catalog = catalog(vec![a.clone(), b.clone()]);
        assert_eq!(catalog.check_deletable(&b), Err(FilterError::InUse("a".into())));
        assert!(catalog.check_deletable(&a).is_ok());

        let mut system = a;
        system.is_custom = false;
        assert_eq!(catalog.check_deletable(&system), Err(FilterError::NotEditable));
    }

    #[test]
    fn edition_rights() {
        let mut public = filter("a", vec![]);
        assert!(public.can_edit(user(1), false));
        assert!(!public.can_edit(user(2), false));
        assert!(public.can_edit(user(2), true));
        public.is_private = true;
        assert!(!public.can_edit(user(2), true));
        assert!(public.is_visible_to(user(1)));
        assert!(!public.is_visible_to(user(2)));
    }
}
