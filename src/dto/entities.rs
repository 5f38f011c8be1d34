//! Data handed to the generic entity templates.

use serde::Serialize;

use crate::domain::custom_form::FormDescriptor;
use crate::domain::entity::{CremeEntity, EntityKind};
use crate::domain::entity_data::AnyEntity;
use crate::domain::header_filter::HeaderFilter;
use crate::domain::persons::Address;
use crate::domain::property::PropertyType;
use crate::domain::types::{EntityId, RelationId};
use crate::domain::user::User;
use crate::pagination::Paginated;

/// One line of a list view, already rendered through the header filter cells.
#[derive(Debug, Clone, Serialize)]
pub struct ListRow {
    pub id: EntityId,
    pub label: String,
    pub values: Vec<String>,
}

/// Rows of a list view before pagination, shared with the CSV export.
#[derive(Debug)]
pub struct ListRows {
    pub header_filter: HeaderFilter,
    pub columns: Vec<String>,
    pub rows: Vec<ListRow>,
}

/// Entity filter offered in the list view selector.
#[derive(Debug, Clone, Serialize)]
pub struct FilterChoice {
    pub id: String,
    pub name: String,
    pub is_private: bool,
}

#[derive(Debug, Serialize)]
pub struct ListPageData {
    pub kind: EntityKind,
    pub columns: Vec<String>,
    pub rows: Paginated<ListRow>,
    pub total: usize,
    pub header_filter: HeaderFilter,
    pub header_filters: Vec<HeaderFilter>,
    pub entity_filters: Vec<FilterChoice>,
    pub selected_filter: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FieldRow {
    pub name: &'static str,
    pub verbose_name: &'static str,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct RelationRow {
    pub id: RelationId,
    pub type_id: String,
    pub predicate: String,
    pub object_id: EntityId,
    pub object_kind: Option<EntityKind>,
    pub object_label: String,
    pub object_deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct CustomValueRow {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct DetailPageData {
    pub entity: AnyEntity,
    pub owner: Option<User>,
    pub fields: Vec<FieldRow>,
    pub relations: Vec<RelationRow>,
    pub properties: Vec<PropertyType>,
    pub custom_values: Vec<CustomValueRow>,
    pub addresses: Vec<Address>,
    pub can_edit: bool,
}

/// One input of a creation or edition form.
#[derive(Debug, Serialize)]
pub struct FormInput {
    /// Input name: the field name or `cf_<uuid>`.
    pub name: String,
    pub label: String,
    /// `string`, `boolean`, `choice`...
    pub input_type: &'static str,
    pub required: bool,
    pub value: Vec<String>,
    pub choices: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
pub struct FormSection {
    pub name: String,
    pub inputs: Vec<FormInput>,
}

#[derive(Debug, Serialize)]
pub struct FormPageData {
    pub kind: EntityKind,
    pub descriptor_id: String,
    /// Edited entity; `None` on creation.
    pub entity_id: Option<EntityId>,
    pub sections: Vec<FormSection>,
}

impl FormPageData {
    pub fn new(descriptor: FormDescriptor, entity_id: Option<EntityId>) -> Self {
        Self {
            kind: descriptor.kind,
            descriptor_id: descriptor.id(),
            entity_id,
            sections: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrashPageData {
    pub entities: Paginated<CremeEntity>,
    pub total: usize,
}

/// Result of a bulk edition: failures are reported per entity.
#[derive(Debug, Default, Serialize)]
pub struct BulkEditOutcome {
    pub updated: usize,
    pub errors: Vec<(String, String)>,
}

/// Result of emptying the trash.
#[derive(Debug, Default, Serialize)]
pub struct TrashOutcome {
    pub deleted: usize,
    pub errors: Vec<(String, String)>,
}

/// Result of a CSV mass import; errors carry the 1-based data line.
#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub errors: Vec<(usize, String)>,
    /// Columns matching neither a field nor a custom field.
    pub ignored_columns: Vec<String>,
}
