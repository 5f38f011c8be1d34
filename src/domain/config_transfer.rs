//! Exchange format of the configuration export/import.

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::custom_field::CustomFieldType;
use crate::domain::custom_form::{CustomFormItem, FormGroup};
use crate::domain::entity::EntityKind;
use crate::domain::entity_filter::{ConditionRow, EntityFilter};
use crate::domain::header_filter::{Cell, HeaderFilter};
use crate::domain::types::PublicId;

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DependenceError {
    #[error("\"{item}\" depends on the unknown item \"{dependency}\"")]
    Unknown { item: String, dependency: String },
    #[error("circular dependency between: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("the file version \"{0}\" is not supported (expected 1.0)")]
    Version(String),
    #[error("the file is not a valid configuration: {0}")]
    Malformed(String),
    #[error(transparent)]
    Dependence(#[from] DependenceError),
    #[error("{data_id}: {message}")]
    Invalid { data_id: &'static str, message: String },
}

impl ImportError {
    pub fn invalid(data_id: &'static str, message: impl Display) -> Self {
        ImportError::Invalid {
            data_id,
            message: message.to_string(),
        }
    }
}

/// Orders `items` so that every item comes after its dependencies.
///
/// Items resolved in the same pass keep their relative order. Dependencies must be
/// keys of other items.
pub fn dependence_sort<T, K>(
    items: Vec<T>,
    key: impl Fn(&T) -> K,
    dependencies: impl Fn(&T) -> Vec<K>,
) -> Result<Vec<T>, DependenceError>
where
    K: Eq + Hash + Display,
{
    let known: HashSet<K> = items.iter().map(&key).collect();
    for item in &items {
        if let Some(unknown) = dependencies(item).into_iter().find(|dep| !known.contains(dep)) {
            return Err(DependenceError::Unknown {
                item: key(item).to_string(),
                dependency: unknown.to_string(),
            });
        }
    }

    let mut ordered = Vec::with_capacity(items.len());
    let mut resolved: HashSet<K> = HashSet::new();
    let mut pending = items;
    while !pending.is_empty() {
        let (ready, blocked): (Vec<T>, Vec<T>) = pending
            .into_iter()
            .partition(|item| dependencies(item).iter().all(|dep| resolved.contains(dep)));
        if ready.is_empty() {
            return Err(DependenceError::Cycle(
                blocked.iter().map(|item| key(item).to_string()).collect(),
            ));
        }
        resolved.extend(ready.iter().map(&key));
        ordered.extend(ready);
        pending = blocked;
    }
    Ok(ordered)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyTypeData {
    pub uuid: PublicId,
    pub text: String,
    #[serde(default)]
    pub subject_kinds: Vec<EntityKind>,
}

/// One side of an exported relation type pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSideData {
    pub predicate: String,
    #[serde(default)]
    pub kinds: Vec<EntityKind>,
    /// Uuids of the mandatory property types.
    #[serde(default)]
    pub properties: Vec<PublicId>,
    #[serde(default)]
    pub is_copiable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTypeData {
    pub id: String,
    pub symmetric_id: String,
    pub subject: RelationSideData,
    pub object: RelationSideData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldData {
    pub uuid: PublicId,
    pub name: String,
    pub entity_kind: EntityKind,
    pub field_type: CustomFieldType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub choices: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFilterData {
    pub id: String,
    pub name: String,
    pub entity_kind: EntityKind,
    pub cells: Vec<Cell>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFilterData {
    pub id: String,
    pub name: String,
    pub entity_kind: EntityKind,
    #[serde(default)]
    pub use_or: bool,
    #[serde(default)]
    pub conditions: Vec<ConditionRow>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFormData {
    pub descriptor_id: String,
    pub groups: Vec<FormGroup>,
}

/// The exported JSON document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub version: String,
    #[serde(default)]
    pub property_types: Vec<PropertyTypeData>,
    #[serde(default)]
    pub relation_types: Vec<RelationTypeData>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldData>,
    #[serde(default)]
    pub header_filters: Vec<HeaderFilterData>,
    #[serde(default)]
    pub entity_filters: Vec<EntityFilterData>,
    #[serde(default)]
    pub custom_forms: Vec<CustomFormData>,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            property_types: Vec::new(),
            relation_types: Vec::new(),
            custom_fields: Vec::new(),
            header_filters: Vec::new(),
            entity_filters: Vec::new(),
            custom_forms: Vec::new(),
        }
    }
}

impl ConfigDocument {
    /// Parses a document, checking its version first.
    pub fn from_json(raw: &str) -> Result<Self, ImportError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|err| ImportError::Malformed(err.to_string()))?;
        match value.get("version").and_then(serde_json::Value::as_str) {
            Some(CONFIG_VERSION) => {}
            Some(other) => return Err(ImportError::Version(other.to_string())),
            None => return Err(ImportError::Version(String::new())),
        }
        serde_json::from_value(value).map_err(|err| ImportError::Malformed(err.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ImportError> {
        serde_json::to_string_pretty(self).map_err(|err| ImportError::Malformed(err.to_string()))
    }
}

/// A validated document, stored as a whole or not at all.
///
/// Entity filters are ordered so that sub-filters come first.
#[derive(Clone, Debug, Default)]
pub struct ConfigImport {
    pub property_types: Vec<PropertyTypeData>,
    pub relation_types: Vec<RelationTypeData>,
    pub custom_fields: Vec<CustomFieldData>,
    pub header_filters: Vec<HeaderFilter>,
    pub entity_filters: Vec<EntityFilter>,
    pub custom_forms: Vec<CustomFormItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Item(&'static str, Vec<&'static str>);

    fn sort(items: Vec<Item>) -> Result<Vec<&'static str>, DependenceError> {
        dependence_sort(items, |item| item.0, |item| item.1.clone())
            .map(|sorted| sorted.into_iter().map(|item| item.0).collect())
    }

    #[test]
    fn sorts_dependencies_first() {
        let sorted = sort(vec![
            Item("entity_filters", vec!["relation_types", "property_types", "custom_fields"]),
            Item("relation_types", vec!["property_types"]),
            Item("custom_fields", vec![]),
            Item("property_types", vec![]),
        ]);
        assert_eq!(
            sorted,
            Ok(vec!["custom_fields", "property_types", "relation_types", "entity_filters"])
        );
    }

    #[test]
    fn items_are_resolved_in_passes() {
        assert_eq!(
            sort(vec![Item("a", vec![]), Item("b", vec!["a"]), Item("c", vec![])]),
            Ok(vec!["a", "c", "b"])
        );
    }

    #[test]
    fn detects_cycles_and_unknown_dependencies() {
        assert_eq!(
            sort(vec![Item("a", vec!["b"]), Item("b", vec!["a"]), Item("c", vec![])]),
            Err(DependenceError::Cycle(vec!["a".into(), "b".into()]))
        );
        assert_eq!(
            sort(vec![Item("a", vec!["z"])]),
            Err(DependenceError::Unknown {
                item: "a".into(),
                dependency: "z".into()
            })
        );
    }

    #[test]
    fn checks_version() {
        assert_eq!(
            ConfigDocument::from_json(r#"{"version": "0.9"}"#),
            Err(ImportError::Version("0.9".into()))
        );
        assert!(matches!(
            ConfigDocument::from_json("not json"),
            Err(ImportError::Malformed(_))
        ));
        let document = ConfigDocument::from_json(r#"{"version": "1.0"}"#).expect("valid document");
        assert_eq!(document, ConfigDocument::default());
    }

    #[test]
    fn round_trips_through_json() {
        let mut document = ConfigDocument::default();
        document.custom_fields.push(CustomFieldData {
            uuid: PublicId::new(),
            name: "Hobby".into(),
            entity_kind: EntityKind::Contact,
            field_type: CustomFieldType::Enum,
            is_required: false,
            choices: vec!["Jazz".into(), "Bonsai".into()],
        });
        let raw = document.to_json().expect("serializable");
        assert_eq!(ConfigDocument::from_json(&raw), Ok(document));
    }
}
