//! Outcome of a configuration import.

use serde::Serialize;

use crate::domain::config_transfer::ConfigImport;
use crate::domain::entity_filter::{ConditionRow, EntityFilter, FilterCondition, FilterError};
use crate::domain::user::User;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub property_types: usize,
    pub relation_types: usize,
    pub custom_fields: usize,
    pub header_filters: usize,
    pub entity_filters: usize,
    pub custom_forms: usize,
}

impl From<&ConfigImport> for ImportSummary {
    fn from(import: &ConfigImport) -> Self {
        Self {
            property_types: import.property_types.len(),
            relation_types: import.relation_types.len(),
            custom_fields: import.custom_fields.len(),
            header_filters: import.header_filters.len(),
            entity_filters: import.entity_filters.len(),
            custom_forms: import.custom_forms.len(),
        }
    }
}

/// Entity filter as shown on the settings pages.
#[derive(Debug, Clone, Serialize)]
pub struct EntityFilterRow {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub use_or: bool,
    pub can_edit: bool,
    pub conditions: Vec<ConditionRow>,
}

impl EntityFilterRow {
    pub fn new(filter: &EntityFilter, user: &User) -> Result<Self, FilterError> {
        Ok(Self {
            id: filter.id.clone(),
            name: filter.name.clone(),
            is_private: filter.is_private,
            use_or: filter.use_or,
            can_edit: filter.can_edit(user.id, user.is_admin),
            conditions: filter
                .conditions
                .iter()
                .map(FilterCondition::to_row)
                .collect::<Result<_, _>>()?,
        })
    }
}

/// Custom form descriptor and whether it differs from the default layout.
#[derive(Debug, Clone, Serialize)]
pub struct CustomFormRow {
    pub descriptor_id: String,
    pub kind: &'static str,
    pub form_type: &'static str,
    pub is_configured: bool,
}
