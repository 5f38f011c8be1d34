//! List view column sets.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::custom_field::CustomFieldEnumValue;
use crate::domain::entity::EntityKind;
use crate::domain::entity_filter::EntitySnapshot;
use crate::domain::fields::{field_descriptor, kind_fields};
use crate::domain::types::{PublicId, TypeConstraintError, UserId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderFilterError {
    #[error("unknown field \"{0}\"")]
    UnknownField(String),
    #[error("unknown custom field \"{0}\"")]
    UnknownCustomField(PublicId),
    #[error("unknown relation type \"{0}\"")]
    UnknownRelationType(String),
    #[error("the column \"{0}\" appears twice")]
    Duplicate(String),
    #[error("a header filter needs at least one column")]
    Empty,
    #[error("a private header filter must belong to a user")]
    PrivateWithoutOwner,
    #[error("this header filter cannot be edited")]
    NotEditable,
}

/// A column (or a form entry) referencing a piece of entity data.
///
/// Serialized as `{"type": "regular_field", "value": "last_name"}`; the
/// compact `regular_field:last_name` form is used in HTML forms.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    RegularField(String),
    CustomField(PublicId),
    Relation(String),
}

impl Cell {
    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::RegularField(_) => "regular_field",
            Cell::CustomField(_) => "custom_field",
            Cell::Relation(_) => "relation",
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::RegularField(name) => write!(f, "regular_field:{name}"),
            Cell::CustomField(uuid) => write!(f, "custom_field:{uuid}"),
            Cell::Relation(type_id) => write!(f, "relation:{type_id}"),
        }
    }
}

impl FromStr for Cell {
    type Err = TypeConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeConstraintError::InvalidValue(s.to_string());
        let (cell_type, value) = s.trim().split_once(':').ok_or_else(invalid)?;
        if value.is_empty() {
            return Err(invalid());
        }
        match cell_type {
            "regular_field" => Ok(Cell::RegularField(value.to_string())),
            "custom_field" => value.parse().map(Cell::CustomField),
            "relation" => Ok(Cell::Relation(value.to_string())),
            _ => Err(invalid()),
        }
    }
}

/// Custom field data needed to title and render a column.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomColumn {
    pub name: String,
    pub kind: EntityKind,
    pub is_deleted: bool,
    pub choices: Vec<CustomFieldEnumValue>,
}

/// Configuration the cells of a kind can reference.
#[derive(Clone, Debug, Default)]
pub struct CellCatalog {
    pub custom_fields: HashMap<PublicId, CustomColumn>,
    /// Relation type id to predicate.
    pub relation_types: HashMap<String, String>,
}

impl CellCatalog {
    /// Checks the cell exists for `kind`.
    pub fn check_cell(&self, kind: EntityKind, cell: &Cell) -> Result<(), HeaderFilterError> {
        match cell {
            Cell::RegularField(name) => field_descriptor(kind, name)
                .map(|_| ())
                .ok_or_else(|| HeaderFilterError::UnknownField(name.clone())),
            Cell::CustomField(uuid) => self
                .custom_fields
                .get(uuid)
                .filter(|column| column.kind == kind && !column.is_deleted)
                .map(|_| ())
                .ok_or(HeaderFilterError::UnknownCustomField(*uuid)),
            Cell::Relation(type_id) => {
                if self.relation_types.contains_key(type_id) {
                    Ok(())
                } else {
                    Err(HeaderFilterError::UnknownRelationType(type_id.clone()))
                }
            }
        }
    }

    pub fn check_cells(&self, kind: EntityKind, cells: &[Cell]) -> Result<(), HeaderFilterError> {
        if cells.is_empty() {
            return Err(HeaderFilterError::Empty);
        }
        let mut seen = HashSet::new();
        for cell in cells {
            self.check_cell(kind, cell)?;
            if !seen.insert(cell) {
                return Err(HeaderFilterError::Duplicate(cell.to_string()));
            }
        }
        Ok(())
    }

    /// Column title; stale cells get an empty title.
    pub fn title(&self, kind: EntityKind, cell: &Cell) -> String {
        match cell {
            Cell::RegularField(name) => field_descriptor(kind, name)
                .map(|field| field.verbose_name.to_string())
                .unwrap_or_default(),
            Cell::CustomField(uuid) => self
                .custom_fields
                .get(uuid)
                .map(|column| column.name.clone())
                .unwrap_or_default(),
            Cell::Relation(type_id) => self.relation_types.get(type_id).cloned().unwrap_or_default(),
        }
    }

    /// Text of the cell for one entity.
    pub fn render(&self, cell: &Cell, snapshot: &EntitySnapshot) -> String {
        match cell {
            Cell::RegularField(name) => snapshot.field(name).to_string(),
            Cell::CustomField(uuid) => {
                let choices = self
                    .custom_fields
                    .get(uuid)
                    .map_or(&[][..], |column| column.choices.as_slice());
                snapshot
                    .custom_values
                    .get(uuid)
                    .map(|value| value.display(choices))
                    .unwrap_or_default()
            }
            Cell::Relation(type_id) => snapshot
                .relations
                .iter()
                .filter(|edge| edge.type_id == *type_id)
                .map(|edge| edge.object_label.as_str())
                .collect::<Vec<_>>()
                .join("/"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFilter {
    pub id: String,
    pub name: String,
    pub entity_kind: EntityKind,
    pub user_id: Option<UserId>,
    pub is_private: bool,
    pub is_custom: bool,
    pub cells: Vec<Cell>,
}

/// Number of specific fields shown by the default header filter.
const DEFAULT_COLUMNS: usize = 4;

impl HeaderFilter {
    pub fn default_id(kind: EntityKind) -> String {
        let app = kind.as_str().split('.').next().unwrap_or("creme_core");
        format!("{app}-hf_{}", kind.slug())
    }

    pub fn generate_id(kind: EntityKind) -> String {
        let app = kind.as_str().split('.').next().unwrap_or("creme_core");
        format!("{app}-userhf_{}", PublicId::new())
    }

    /// Seeded column set of a kind: its first fields.
    pub fn default_for(kind: EntityKind) -> Self {
        Self {
            id: Self::default_id(kind),
            name: format!("{} view", kind.verbose_name()),
            entity_kind: kind,
            user_id: None,
            is_private: false,
            is_custom: false,
            cells: kind_fields(kind)
                .iter()
                .take(DEFAULT_COLUMNS)
                .map(|field| Cell::RegularField(field.name.to_string()))
                .collect(),
        }
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

    pub fn validate(&self, catalog: &CellCatalog) -> Result<(), HeaderFilterError> {
        if self.is_private && self.user_id.is_none() {
            return Err(HeaderFilterError::PrivateWithoutOwner);
        }
        catalog.check_cells(self.entity_kind, &self.cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::custom_field::CustomValue;
    use crate::domain::entity::CremeEntity;
    use crate::domain::entity_filter::RelationEdge;
    use crate::domain::fields::FieldValue;
    use crate::domain::types::{CustomFieldId, EntityId, EnumValueId};
    use chrono::NaiveDate;

    #[test]
    fn cells_parse_and_serialize() {
        let cell: Cell = "regular_field:last_name".parse().expect("valid cell");
        assert_eq!(cell, Cell::RegularField("last_name".into()));
        assert_eq!(cell.to_string(), "regular_field:last_name");
        assert!("relation:".parse::<Cell>().is_err());
        assert!("column:x".parse::<Cell>().is_err());
        assert_eq!(
            serde_json::to_string(&Cell::Relation("persons-subject_employed_by".into()))
                .expect("serializable"),
            r#"{"type":"relation","value":"persons-subject_employed_by"}"#
        );
    }

    #[test]
    fn default_header_filters_are_valid() {
        let catalog = CellCatalog::default();
        for kind in EntityKind::ALL {
            let hf = HeaderFilter::default_for(kind);
            assert!(hf.validate(&catalog).is_ok(), "{kind}");
        }
        assert_eq!(HeaderFilter::default_id(EntityKind::Contact), "persons-hf_contact");
    }

    #[test]
    fn rejects_unknown_and_duplicated_cells() {
        let catalog = CellCatalog::default();
        let cells = vec![Cell::RegularField("name".into())];
        assert!(catalog.check_cells(EntityKind::Organisation, &cells).is_ok());
        assert_eq!(
            catalog.check_cells(EntityKind::Contact, &cells),
            Err(HeaderFilterError::UnknownField("name".into()))
        );
        let twice = vec![Cell::RegularField("name".into()), Cell::RegularField("name".into())];
        assert_eq!(
            catalog.check_cells(EntityKind::Organisation, &twice),
            Err(HeaderFilterError::Duplicate("regular_field:name".into()))
        );
        assert_eq!(catalog.check_cells(EntityKind::Organisation, &[]), Err(HeaderFilterError::Empty));
    }

    #[test]
    fn renders_cells() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid datetime");
        let mut snapshot = EntitySnapshot::new(CremeEntity {
            id: EntityId::new(1).expect("valid id"),
            uuid: PublicId::new(),
            kind: EntityKind::Contact,
            user_id: UserId::new(1).expect("valid id"),
            description: String::new(),
            header_filter_search_field: "Spike Spiegel".into(),
            is_deleted: false,
            created_at: now,
            modified_at: now,
        });
        snapshot
            .fields
            .insert("last_name".into(), FieldValue::Text("Spiegel".into()));
        for label in ["Bebop", "Red Dragon"] {
            snapshot.relations.push(RelationEdge {
                type_id: "persons-subject_employed_by".into(),
                object_id: EntityId::new(2).expect("valid id"),
                object_kind: EntityKind::Organisation,
                object_label: label.into(),
            });
        }
        let color = PublicId::new();
        let choice = CustomFieldEnumValue {
            id: EnumValueId::new(3).expect("valid id"),
            uuid: PublicId::new(),
            custom_field_id: CustomFieldId::new(1).expect("valid id"),
            value: "Blue".into(),
        };
        snapshot
            .custom_values
            .insert(color, CustomValue::Enum(choice.id));

        let catalog = CellCatalog {
            custom_fields: HashMap::from([(
                color,
                CustomColumn {
                    name: "Favourite colour".into(),
                    kind: EntityKind::Contact,
                    is_deleted: false,
                    choices: vec![choice],
                },
            )]),
            relation_types: HashMap::from([(
                "persons-subject_employed_by".to_string(),
                "is employed by".to_string(),
            )]),
        };
        assert_eq!(catalog.render(&Cell::RegularField("last_name".into()), &snapshot), "Spiegel");
        assert_eq!(catalog.render(&Cell::CustomField(color), &snapshot), "Blue");
        assert_eq!(
            catalog.render(&Cell::Relation("persons-subject_employed_by".into()), &snapshot),
            "Bebop/Red Dragon"
        );
        assert_eq!(
            catalog.title(EntityKind::Contact, &Cell::CustomField(color)),
            "Favourite colour"
        );
    }
}
