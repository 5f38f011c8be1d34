//! Diesel models for entity filters, header filters and custom forms.

use diesel::prelude::*;

use crate::domain::custom_form::{CustomFormItem, FormGroup};
use crate::domain::entity_filter::{
    ConditionRow, EntityFilter as DomainEntityFilter, FilterCondition,
};
use crate::domain::header_filter::{Cell, HeaderFilter as DomainHeaderFilter};
use crate::domain::types::{TypeConstraintError, UserId};

#[derive(Debug, Clone, Identifiable, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::entity_filters, treat_none_as_null = true)]
pub struct EntityFilter {
    pub id: String,
    pub name: String,
    pub entity_kind: String,
    pub user_id: Option<i32>,
    pub is_private: bool,
    pub is_custom: bool,
    pub use_or: bool,
}

#[derive(Debug, Clone, Identifiable, Queryable, Associations)]
#[diesel(belongs_to(EntityFilter, foreign_key = filter_id))]
#[diesel(table_name = crate::schema::entity_filter_conditions)]
pub struct EntityFilterCondition {
    pub id: i32,
    pub filter_id: String,
    pub kind: i32,
    pub name: String,
    pub value: String,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::entity_filter_conditions)]
pub struct NewEntityFilterCondition<'a> {
    pub filter_id: &'a str,
    pub kind: i32,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Identifiable, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::header_filters, treat_none_as_null = true)]
pub struct HeaderFilter {
    pub id: String,
    pub name: String,
    pub entity_kind: String,
    pub user_id: Option<i32>,
    pub is_private: bool,
    pub is_custom: bool,
    /// JSON list of cells.
    pub cells: String,
}

#[derive(Debug, Clone, Identifiable, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::custom_forms, primary_key(descriptor_id))]
pub struct CustomForm {
    pub descriptor_id: String,
    /// JSON list of groups.
    pub groups: String,
}

fn invalid_json(err: serde_json::Error) -> TypeConstraintError {
    TypeConstraintError::InvalidValue(err.to_string())
}

impl From<&DomainEntityFilter> for EntityFilter {
    fn from(filter: &DomainEntityFilter) -> Self {
        Self {
            id: filter.id.clone(),
            name: filter.name.clone(),
            entity_kind: filter.entity_kind.to_string(),
            user_id: filter.user_id.map(UserId::get),
            is_private: filter.is_private,
            is_custom: filter.is_custom,
            use_or: filter.use_or,
        }
    }
}

impl TryFrom<(EntityFilter, Vec<EntityFilterCondition>)> for DomainEntityFilter {
    type Error = TypeConstraintError;

    fn try_from(
        (filter, conditions): (EntityFilter, Vec<EntityFilterCondition>),
    ) -> Result<Self, Self::Error> {
        let conditions = conditions
            .into_iter()
            .map(|condition| {
                let row = ConditionRow {
                    kind: condition.kind,
                    name: condition.name,
                    value: condition.value,
                };
                FilterCondition::try_from(&row)
                    .map_err(|err| TypeConstraintError::InvalidValue(err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: filter.id,
            name: filter.name,
            entity_kind: filter.entity_kind.parse()?,
            user_id: filter.user_id.map(UserId::new).transpose()?,
            is_private: filter.is_private,
            is_custom: filter.is_custom,
            use_or: filter.use_or,
            conditions,
        })
    }
}

impl TryFrom<&DomainHeaderFilter> for HeaderFilter {
    type Error = TypeConstraintError;

    fn try_from(filter: &DomainHeaderFilter) -> Result<Self, Self::Error> {
        Ok(Self {
            id: filter.id.clone(),
            name: filter.name.clone(),
            entity_kind: filter.entity_kind.to_string(),
            user_id: filter.user_id.map(UserId::get),
            is_private: filter.is_private,
            is_custom: filter.is_custom,
            cells: serde_json::to_string(&filter.cells).map_err(invalid_json)?,
        })
    }
}

impl TryFrom<HeaderFilter> for DomainHeaderFilter {
    type Error = TypeConstraintError;

    fn try_from(filter: HeaderFilter) -> Result<Self, Self::Error> {
        Ok(Self {
            cells: serde_json::from_str::<Vec<Cell>>(&filter.cells).map_err(invalid_json)?,
            id: filter.id,
            name: filter.name,
            entity_kind: filter.entity_kind.parse()?,
            user_id: filter.user_id.map(UserId::new).transpose()?,
            is_private: filter.is_private,
            is_custom: filter.is_custom,
        })
    }
}

impl TryFrom<&CustomFormItem> for CustomForm {
    type Error = TypeConstraintError;

    fn try_from(item: &CustomFormItem) -> Result<Self, Self::Error> {
        Ok(Self {
            descriptor_id: item.descriptor_id.clone(),
            groups: serde_json::to_string(&item.groups).map_err(invalid_json)?,
        })
    }
}

impl TryFrom<CustomForm> for CustomFormItem {
    type Error = TypeConstraintError;

    fn try_from(form: CustomForm) -> Result<Self, Self::Error> {
        Ok(Self {
            groups: serde_json::from_str::<Vec<FormGroup>>(&form.groups).map_err(invalid_json)?,
            descriptor_id: form.descriptor_id,
        })
    }
}
