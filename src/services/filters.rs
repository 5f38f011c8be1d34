//! Entity filters, header filters and custom forms.

use std::collections::{HashMap, HashSet};

use crate::domain::custom_field::CustomField;
use crate::domain::custom_form::{CustomFormItem, FormDescriptor, FormGroup};
use crate::domain::entity::EntityKind;
use crate::domain::entity_filter::{CustomFieldRef, EntityFilter, FilterCatalog, FilterError};
use crate::domain::header_filter::{CellCatalog, CustomColumn, HeaderFilter};
use crate::domain::types::PublicId;
use crate::domain::user::User;
use crate::forms::filters::{EntityFilterPayload, HeaderFilterPayload};
use crate::repository::{
    CustomFieldReader, FilterReader, FilterWriter, PropertyReader, RelationReader,
};
use crate::services::users::ensure_admin;
use crate::services::{ServiceError, ServiceResult};

/// Everything the conditions of a filter may reference.
pub fn filter_catalog<R>(repo: &R) -> ServiceResult<FilterCatalog>
where
    R: RelationReader + PropertyReader + CustomFieldReader + FilterReader + ?Sized,
{
    Ok(FilterCatalog {
        relation_types: repo
            .list_relation_types()?
            .into_iter()
            .map(|rtype| (rtype.id.clone(), rtype))
            .collect(),
        property_types: repo
            .list_property_types()?
            .into_iter()
            .map(|ptype| ptype.uuid)
            .collect(),
        custom_fields: repo
            .list_custom_fields()?
            .iter()
            .map(|field| (field.uuid, CustomFieldRef::from(field)))
            .collect(),
        filters: repo
            .list_entity_filters()?
            .into_iter()
            .map(|filter| (filter.id.clone(), filter))
            .collect(),
    })
}

/// Everything list columns may reference.
pub fn cell_catalog<R>(repo: &R) -> ServiceResult<CellCatalog>
where
    R: RelationReader + CustomFieldReader + ?Sized,
{
    let choices = repo.list_enum_values()?;
    let custom_fields = repo
        .list_custom_fields()?
        .into_iter()
        .map(|field| {
            let column = CustomColumn {
                name: field.name.clone(),
                kind: field.kind,
                is_deleted: field.is_deleted,
                choices: choices
                    .iter()
                    .filter(|choice| choice.custom_field_id == field.id)
                    .cloned()
                    .collect(),
            };
            (field.uuid, column)
        })
        .collect();
    let relation_types = repo
        .list_relation_types()?
        .into_iter()
        .map(|rtype| (rtype.id, rtype.predicate))
        .collect();
    Ok(CellCatalog {
        custom_fields,
        relation_types,
    })
}

/// Live custom fields of `kind`, in creation order.
pub fn live_custom_fields<R>(repo: &R, kind: EntityKind) -> ServiceResult<Vec<CustomField>>
where
    R: CustomFieldReader + ?Sized,
{
    Ok(repo
        .list_custom_fields()?
        .into_iter()
        .filter(|field| field.kind == kind && !field.is_deleted)
        .collect())
}

/// Entity filters of `kind` the user can see.
pub fn list_entity_filters<R>(
    repo: &R,
    user: &User,
    kind: EntityKind,
) -> ServiceResult<Vec<EntityFilter>>
where
    R: FilterReader + ?Sized,
{
    let mut filters: Vec<EntityFilter> = repo
        .list_entity_filters()?
        .into_iter()
        .filter(|filter| filter.entity_kind == kind && filter.is_visible_to(user.id))
        .collect();
    filters.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(filters)
}

pub fn get_entity_filter<R>(repo: &R, user: &User, id: &str) -> ServiceResult<EntityFilter>
where
    R: FilterReader + ?Sized,
{
    repo.get_entity_filter(id)?
        .filter(|filter| filter.is_visible_to(user.id))
        .ok_or(ServiceError::NotFound)
}

pub fn create_entity_filter<R>(
    repo: &R,
    user: &User,
    payload: EntityFilterPayload,
) -> ServiceResult<EntityFilter>
where
    R: RelationReader + PropertyReader + CustomFieldReader + FilterReader + FilterWriter + ?Sized,
{
    let filter = EntityFilter {
        id: EntityFilter::generate_id(payload.entity_kind),
        name: payload.name,
        entity_kind: payload.entity_kind,
        user_id: Some(user.id),
        is_private: payload.is_private,
        is_custom: true,
        use_or: payload.use_or,
        conditions: payload.conditions,
    };
    let catalog = filter_catalog(repo)?;
    catalog.validate_filter(&filter)?;
    repo.save_entity_filter(&filter)?;
    log::info!("Entity filter {} created by {}", filter.id, user.email);
    Ok(filter)
}

pub fn update_entity_filter<R>(
    repo: &R,
    user: &User,
    id: &str,
    payload: EntityFilterPayload,
) -> ServiceResult<EntityFilter>
where
    R: RelationReader + PropertyReader + CustomFieldReader + FilterReader + FilterWriter + ?Sized,
{
    let existing = get_entity_filter(repo, user, id)?;
    if !existing.can_edit(user.id, user.is_admin) {
        return Err(FilterError::NotEditable.into());
    }
    if payload.entity_kind != existing.entity_kind {
        return Err(ServiceError::Form(
            "the kind of entity of a filter cannot change".to_string(),
        ));
    }
    let filter = EntityFilter {
        name: payload.name,
        is_private: payload.is_private,
        use_or: payload.use_or,
        conditions: payload.conditions,
        ..existing
    };

    let mut catalog = filter_catalog(repo)?;
    catalog.filters.insert(filter.id.clone(), filter.clone());
    catalog.validate_filter(&filter)?;
    // A public filter cannot start using a filter that just became private.
    if filter.is_private {
        if let Some(parent) = catalog.filters.values().find(|other| {
            other.id != filter.id
                && !other.is_private
                && other.subfilter_ids().any(|sub| sub == filter.id)
        }) {
            return Err(FilterError::InUse(parent.name.clone()).into());
        }
    }
    repo.save_entity_filter(&filter)?;
    Ok(filter)
}

pub fn delete_entity_filter<R>(repo: &R, user: &User, id: &str) -> ServiceResult<()>
where
    R: RelationReader + PropertyReader + CustomFieldReader + FilterReader + FilterWriter + ?Sized,
{
    let filter = get_entity_filter(repo, user, id)?;
    if !filter.can_edit(user.id, user.is_admin) {
        return Err(FilterError::NotEditable.into());
    }
    filter_catalog(repo)?.check_deletable(&filter)?;
    repo.delete_entity_filter(id)?;
    log::info!("Entity filter {id} deleted by {}", user.email);
    Ok(())
}

/// Header filters of `kind` the user can see; the seeded one when none is stored.
pub fn list_header_filters<R>(
    repo: &R,
    user: &User,
    kind: EntityKind,
) -> ServiceResult<Vec<HeaderFilter>>
where
    R: FilterReader + ?Sized,
{
    let mut filters: Vec<HeaderFilter> = repo
        .list_header_filters()?
        .into_iter()
        .filter(|filter| filter.entity_kind == kind && filter.is_visible_to(user.id))
        .collect();
    if filters.is_empty() {
        filters.push(HeaderFilter::default_for(kind));
    }
    filters.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(filters)
}

/// Header filter used by a list view: the requested one, else the default of the kind.
pub fn select_header_filter<R>(
    repo: &R,
    user: &User,
    kind: EntityKind,
    requested: Option<&str>,
) -> ServiceResult<HeaderFilter>
where
    R: FilterReader + ?Sized,
{
    let visible = list_header_filters(repo, user, kind)?;
    let default_id = HeaderFilter::default_id(kind);
    let chosen = requested
        .and_then(|id| visible.iter().find(|filter| filter.id == id))
        .or_else(|| visible.iter().find(|filter| filter.id == default_id))
        .or_else(|| visible.first())
        .cloned();
    Ok(chosen.unwrap_or_else(|| HeaderFilter::default_for(kind)))
}

pub fn create_header_filter<R>(
    repo: &R,
    user: &User,
    payload: HeaderFilterPayload,
) -> ServiceResult<HeaderFilter>
where
    R: RelationReader + CustomFieldReader + FilterWriter + ?Sized,
{
    let filter = HeaderFilter {
        id: HeaderFilter::generate_id(payload.entity_kind),
        name: payload.name,
        entity_kind: payload.entity_kind,
        user_id: Some(user.id),
        is_private: payload.is_private,
        is_custom: true,
        cells: payload.cells,
    };
    filter.validate(&cell_catalog(repo)?)?;
    repo.save_header_filter(&filter)?;
    Ok(filter)
}

pub fn update_header_filter<R>(
    repo: &R,
    user: &User,
    id: &str,
    payload: HeaderFilterPayload,
) -> ServiceResult<HeaderFilter>
where
    R: RelationReader + CustomFieldReader + FilterReader + FilterWriter + ?Sized,
{
    let existing = repo
        .get_header_filter(id)?
        .filter(|filter| filter.is_visible_to(user.id))
        .ok_or(ServiceError::NotFound)?;
    if !existing.can_edit(user.id, user.is_admin) {
        return Err(ServiceError::Unauthorized);
    }
    let filter = HeaderFilter {
        name: payload.name,
        is_private: payload.is_private,
        cells: payload.cells,
        ..existing
    };
    filter.validate(&cell_catalog(repo)?)?;
    repo.save_header_filter(&filter)?;
    Ok(filter)
}

pub fn delete_header_filter<R>(repo: &R, user: &User, id: &str) -> ServiceResult<()>
where
    R: FilterReader + FilterWriter + ?Sized,
{
    let filter = repo
        .get_header_filter(id)?
        .filter(|filter| filter.is_visible_to(user.id))
        .ok_or(ServiceError::NotFound)?;
    if !filter.can_edit(user.id, user.is_admin) {
        return Err(ServiceError::Unauthorized);
    }
    repo.delete_header_filter(id)?;
    Ok(())
}

/// Layout of a creation or edition form: the configured one or the default.
pub fn load_custom_form<R>(repo: &R, descriptor: FormDescriptor) -> ServiceResult<CustomFormItem>
where
    R: FilterReader + CustomFieldReader + ?Sized,
{
    if let Some(form) = repo.get_custom_form(&descriptor.id())? {
        return Ok(form);
    }
    let uuids: Vec<PublicId> = live_custom_fields(repo, descriptor.kind)?
        .iter()
        .map(|field| field.uuid)
        .collect();
    Ok(CustomFormItem::default_for(descriptor, &uuids))
}

/// Live custom fields usable in forms, by uuid.
fn custom_field_kinds<R>(repo: &R) -> ServiceResult<HashMap<PublicId, EntityKind>>
where
    R: CustomFieldReader + ?Sized,
{
    Ok(repo
        .list_custom_fields()?
        .into_iter()
        .filter(|field| !field.is_deleted)
        .map(|field| (field.uuid, field.kind))
        .collect())
}

pub fn save_custom_form<R>(
    repo: &R,
    user: &User,
    descriptor_id: &str,
    groups: Vec<FormGroup>,
) -> ServiceResult<CustomFormItem>
where
    R: CustomFieldReader + FilterWriter + ?Sized,
{
    ensure_admin(user)?;
    let descriptor = FormDescriptor::parse(descriptor_id)?;
    let form = CustomFormItem {
        descriptor_id: descriptor.id(),
        groups,
    };
    form.validate(&custom_field_kinds(repo)?)?;
    repo.save_custom_form(&form)?;
    log::info!("Custom form {descriptor} configured by {}", user.email);
    Ok(form)
}

/// Drops the configured layout so the default one applies again.
pub fn reset_custom_form<R>(repo: &R, user: &User, descriptor_id: &str) -> ServiceResult<()>
where
    R: FilterWriter + ?Sized,
{
    ensure_admin(user)?;
    let descriptor = FormDescriptor::parse(descriptor_id)?;
    repo.delete_custom_form(&descriptor.id())?;
    Ok(())
}

/// Configured descriptors, to flag them on the configuration page.
pub fn configured_forms<R>(repo: &R, user: &User) -> ServiceResult<HashSet<String>>
where
    R: FilterReader + ?Sized,
{
    ensure_admin(user)?;
    Ok(repo
        .list_custom_forms()?
        .into_iter()
        .map(|form| form.descriptor_id)
        .collect())
}
