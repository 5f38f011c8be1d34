//! Generic use cases shared by every kind of entity: forms, list and detail
//! views, bulk edition, CSV export, trash and addresses.

use std::collections::{HashMap, HashSet};

use chrono::Local;

use crate::domain::custom_field::{CustomField, CustomFieldEnumValue, CustomFieldType, CustomValue};
use crate::domain::custom_form::{FormDescriptor, FormType};
use crate::domain::entity::{CremeEntity, EntityKind, NewEntity};
use crate::domain::entity_data::{AnyEntity, EntityData};
use crate::domain::entity_filter::{EntitySnapshot, FilterEngine};
use crate::domain::fields::{
    EntityFields, FieldDescriptor, FieldType, FieldValue, base_field_value, field_descriptor,
};
use crate::domain::header_filter::Cell;
use crate::domain::persons::Address;
use crate::domain::types::{AddressId, EntityId, PublicId, UserId};
use crate::domain::user::User;
use crate::dto::entities::{
    BulkEditOutcome, CustomValueRow, DetailPageData, FieldRow, FilterChoice, FormInput,
    FormPageData, FormSection, ListPageData, ListRow, ListRows, RelationRow, TrashOutcome,
    TrashPageData,
};
use crate::forms::entities::{AddressForm, BulkEditPayload, CUSTOM_FIELD_PREFIX, EntityForm, ListQuery};
use crate::pagination::{DEFAULT_ITEMS_PER_PAGE, Paginated};
use crate::repository::{
    ActivityReader, BillingReader, CustomFieldReader, CustomFieldWriter, EntityReader,
    EntityWriter, FilterReader, PropertyReader, RelationReader, TrashQuery, UserReader,
};
use crate::services::filters::{
    cell_catalog, filter_catalog, list_entity_filters, list_header_filters, live_custom_fields,
    load_custom_form, select_header_filter,
};
use crate::services::users::{can_edit, ensure_can_edit};
use crate::services::{ServiceError, ServiceResult};

/// Changes of a form that do not live in the kind-specific data.
#[derive(Debug, Default)]
pub struct FormChanges {
    pub description: Option<String>,
    pub owner: Option<UserId>,
    pub custom_values: Vec<(CustomField, Option<CustomValue>)>,
}

fn field_error(field: &FieldDescriptor, reason: impl std::fmt::Display) -> ServiceError {
    ServiceError::Form(format!("{}: {reason}", field.verbose_name))
}

fn parse_owner<R>(repo: &R, value: &FieldValue) -> ServiceResult<Option<UserId>>
where
    R: UserReader + ?Sized,
{
    let Some(raw) = value.as_integer() else {
        return Ok(None);
    };
    let id = i32::try_from(raw)
        .ok()
        .and_then(|id| UserId::new(id).ok())
        .ok_or_else(|| ServiceError::Form(format!("unknown user {raw}")))?;
    repo.get_user_by_id(id)?
        .ok_or_else(|| ServiceError::Form(format!("unknown user {raw}")))?;
    Ok(Some(id))
}

/// Assigns one parsed regular field, base fields included.
pub(crate) fn assign_field<R>(
    repo: &R,
    field: &FieldDescriptor,
    value: FieldValue,
    data: &mut EntityData,
    changes: &mut FormChanges,
) -> ServiceResult<()>
where
    R: UserReader + ?Sized,
{
    if field.required && value.is_empty() {
        return Err(field_error(field, "this field is required"));
    }
    match field.name {
        "description" => changes.description = Some(value.into_text().unwrap_or_default()),
        "user_id" => {
            if let Some(owner) = parse_owner(repo, &value)? {
                changes.owner = Some(owner);
            }
        }
        name => data
            .set_field(name, value)
            .map_err(|err| field_error(field, err))?,
    }
    Ok(())
}

/// Applies the inputs of the configured layout to `data`.
///
/// Fields missing from the layout are left untouched; a layout field missing
/// from the input is treated as emptied (unchecked for booleans).
pub fn apply_entity_form<R>(
    repo: &R,
    descriptor: FormDescriptor,
    data: &mut EntityData,
    form: &EntityForm,
) -> ServiceResult<FormChanges>
where
    R: FilterReader + CustomFieldReader + UserReader + ?Sized,
{
    let kind = descriptor.kind;
    let layout = load_custom_form(repo, descriptor)?;
    let custom_fields = live_custom_fields(repo, kind)?;
    let choices = repo.list_enum_values()?;
    let mut changes = FormChanges::default();

    // The start may move past the stored end; the end is set again below.
    if kind == EntityKind::Activity && layout.regular_fields().contains("end") {
        data.set_field("end", FieldValue::Null)?;
    }

    for cell in layout.cells() {
        match cell {
            Cell::RegularField(name) => {
                let Some(field) = field_descriptor(kind, name).filter(|field| field.editable)
                else {
                    continue;
                };
                let raw = form.get(name).unwrap_or_default();
                let value = field
                    .field_type
                    .parse_value(raw)
                    .map_err(|err| field_error(field, err))?;
                assign_field(repo, field, value, data, &mut changes)?;
            }
            Cell::CustomField(uuid) => {
                let Some(field) = custom_fields.iter().find(|field| field.uuid == *uuid) else {
                    continue;
                };
                let raw = form.custom_value(uuid).unwrap_or(&[]);
                let value = field.parse_form_value(raw, &choices)?;
                changes.custom_values.push((field.clone(), value));
            }
            Cell::Relation(_) => {}
        }
    }
    Ok(changes)
}

/// Completes and checks the kind-specific data against the configuration.
pub fn check_entity_data<R>(repo: &R, kind: EntityKind, data: &mut EntityData) -> ServiceResult<()>
where
    R: ActivityReader + BillingReader + ?Sized,
{
    match data {
        EntityData::Activity(activity) => {
            let activity_type = repo
                .list_activity_types()?
                .into_iter()
                .find(|activity_type| activity_type.id == activity.type_id)
                .ok_or_else(|| {
                    crate::domain::activity::ActivityError::UnknownType(activity.type_id.clone())
                })?;
            if let (Some(start), None) = (activity.start, activity.end) {
                activity.end = Some(start + activity_type.default_duration());
            }
            activity.check_dates()?;
        }
        EntityData::Document(document) => {
            document.validate()?;
            let status = match document.status_id {
                Some(id) => repo
                    .get_status(id)?
                    .filter(|status| status.doc_kind == kind)
                    .ok_or(crate::domain::billing::BillingError::WrongStatus)?,
                None => {
                    let statuses = repo.list_statuses(kind)?;
                    statuses
                        .iter()
                        .find(|status| status.is_default)
                        .or_else(|| statuses.first())
                        .cloned()
                        .ok_or_else(|| {
                            ServiceError::Form(format!(
                                "no status is configured for {}",
                                kind.verbose_name()
                            ))
                        })?
                }
            };
            document.status_id = Some(status.id);
        }
        EntityData::Event(event) => event.validate()?,
        EntityData::EmailTemplate(template) => template.validate()?,
        _ => {}
    }
    Ok(())
}

fn save_custom_values<R>(
    repo: &R,
    entity_id: EntityId,
    values: &[(CustomField, Option<CustomValue>)],
) -> ServiceResult<()>
where
    R: CustomFieldWriter + ?Sized,
{
    for (field, value) in values {
        repo.set_custom_value(field, entity_id, value.clone())?;
    }
    Ok(())
}

/// Entity with its specific data; trashed ones included.
pub fn get_entity<R>(repo: &R, id: EntityId) -> ServiceResult<AnyEntity>
where
    R: EntityReader + ?Sized,
{
    repo.get_entity(id)?.ok_or(ServiceError::NotFound)
}

/// Trashed entities are read-only.
pub fn ensure_live(entity: &CremeEntity) -> ServiceResult<()> {
    if entity.is_deleted {
        return Err(ServiceError::Conflict(format!(
            "\"{}\" is in the trash",
            entity.label()
        )));
    }
    Ok(())
}

/// Entity of the expected kind, not in the trash.
pub fn get_live_entity<R>(repo: &R, id: EntityId, kind: EntityKind) -> ServiceResult<AnyEntity>
where
    R: EntityReader + ?Sized,
{
    let entity = get_entity(repo, id)?;
    if entity.base.kind != kind {
        return Err(ServiceError::NotFound);
    }
    ensure_live(&entity.base)?;
    Ok(entity)
}

/// Stores already checked data as a new entity owned by `owner`.
pub fn store_new_entity<R>(
    repo: &R,
    owner: UserId,
    kind: EntityKind,
    data: &EntityData,
    description: &str,
) -> ServiceResult<AnyEntity>
where
    R: EntityWriter + ?Sized,
{
    let new_entity = NewEntity::new(kind, owner, description).with_label(data.display_label());
    let entity = repo.create_entity(&new_entity, data)?;
    log::info!("{} {} created", kind.verbose_name(), entity.id());
    Ok(entity)
}

/// Creates an entity of `kind` from the creation form.
pub fn create_entity<R>(
    repo: &R,
    user: &User,
    kind: EntityKind,
    form: &EntityForm,
) -> ServiceResult<AnyEntity>
where
    R: FilterReader
        + CustomFieldReader
        + CustomFieldWriter
        + UserReader
        + ActivityReader
        + BillingReader
        + EntityWriter
        + ?Sized,
{
    let mut data = EntityData::blank(kind).ok_or_else(|| {
        ServiceError::Form(format!(
            "a {} cannot be created from this form",
            kind.verbose_name()
        ))
    })?;
    let descriptor = FormDescriptor::new(kind, FormType::Creation);
    let changes = apply_entity_form(repo, descriptor, &mut data, form)?;
    check_entity_data(repo, kind, &mut data)?;

    let owner = changes.owner.unwrap_or(user.id);
    let description = changes.description.unwrap_or_default();
    let entity = store_new_entity(repo, owner, kind, &data, &description)?;
    save_custom_values(repo, entity.id(), &changes.custom_values)?;
    Ok(entity)
}

/// Saves an edited entity, recomputing its label.
pub fn store_entity<R>(repo: &R, mut entity: AnyEntity) -> ServiceResult<AnyEntity>
where
    R: EntityWriter + ?Sized,
{
    entity.base.header_filter_search_field = entity.data.display_label();
    Ok(repo.update_entity(&entity)?)
}

/// Updates an entity from the edition form.
pub fn update_entity<R>(
    repo: &R,
    user: &User,
    id: EntityId,
    form: &EntityForm,
) -> ServiceResult<AnyEntity>
where
    R: EntityReader
        + FilterReader
        + CustomFieldReader
        + CustomFieldWriter
        + UserReader
        + ActivityReader
        + BillingReader
        + EntityWriter
        + ?Sized,
{
    let mut entity = get_entity(repo, id)?;
    let kind = entity.base.kind;
    ensure_live(&entity.base)?;
    ensure_can_edit(user, &entity.base)?;

    let descriptor = FormDescriptor::new(kind, FormType::Edition);
    let changes = apply_entity_form(repo, descriptor, &mut entity.data, form)?;
    check_entity_data(repo, kind, &mut entity.data)?;
    if let Some(description) = changes.description {
        entity.base.description = ammonia::clean(description.trim());
    }
    if let Some(owner) = changes.owner {
        entity.base.user_id = owner;
    }
    let updated = store_entity(repo, entity)?;
    save_custom_values(repo, updated.id(), &changes.custom_values)?;
    Ok(updated)
}

fn input_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String | FieldType::Phone => "text",
        FieldType::Text => "textarea",
        FieldType::Integer | FieldType::Decimal => "number",
        FieldType::Boolean => "checkbox",
        FieldType::Date => "date",
        FieldType::DateTime => "datetime-local",
        FieldType::Email => "email",
        FieldType::Url => "url",
        FieldType::Choice(_) | FieldType::Reference | FieldType::User => "select",
    }
}

/// Value as written back into an HTML input.
fn input_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => String::new(),
        FieldValue::Boolean(flag) => if *flag { "on" } else { "" }.to_string(),
        FieldValue::DateTime(datetime) => datetime.format("%Y-%m-%dT%H:%M").to_string(),
        other => other.to_string(),
    }
}

/// Inputs of the creation form, or of the edition form of `entity`.
pub fn form_page<R>(
    repo: &R,
    kind: EntityKind,
    entity: Option<&AnyEntity>,
) -> ServiceResult<FormPageData>
where
    R: FilterReader
        + CustomFieldReader
        + UserReader
        + ActivityReader
        + BillingReader
        + ?Sized,
{
    let form_type = if entity.is_some() {
        FormType::Edition
    } else {
        FormType::Creation
    };
    let descriptor = FormDescriptor::new(kind, form_type);
    let layout = load_custom_form(repo, descriptor)?;
    let custom_fields = live_custom_fields(repo, kind)?;
    let choices = repo.list_enum_values()?;
    let custom_values = match entity {
        Some(entity) => repo.get_custom_values(entity.id())?,
        None => HashMap::new(),
    };
    let values: HashMap<&str, FieldValue> = entity
        .map(|entity| entity.data.field_values().into_iter().collect())
        .unwrap_or_default();

    let mut page = FormPageData::new(descriptor, entity.map(AnyEntity::id));
    for group in &layout.groups {
        let mut inputs = Vec::new();
        for cell in &group.cells {
            match cell {
                Cell::RegularField(name) => {
                    let Some(field) = field_descriptor(kind, name).filter(|field| field.editable)
                    else {
                        continue;
                    };
                    let value = match entity {
                        Some(entity) => base_field_value(&entity.base, name)
                            .or_else(|| values.get(field.name).cloned())
                            .map(|value| input_value(&value))
                            .unwrap_or_default(),
                        None => String::new(),
                    };
                    inputs.push(FormInput {
                        name: field.name.to_string(),
                        label: field.verbose_name.to_string(),
                        input_type: input_type(field.field_type),
                        required: field.required,
                        value: vec![value],
                        choices: field_choices(repo, kind, field)?,
                    });
                }
                Cell::CustomField(uuid) => {
                    let Some(field) = custom_fields.iter().find(|field| field.uuid == *uuid)
                    else {
                        continue;
                    };
                    let value = custom_values
                        .get(&field.id)
                        .map(|value| match value {
                            CustomValue::Enum(_) | CustomValue::MultiEnum(_) => value
                                .choice_ids()
                                .iter()
                                .map(ToString::to_string)
                                .collect(),
                            other => vec![input_value(&other.to_field_value())],
                        })
                        .unwrap_or_default();
                    inputs.push(FormInput {
                        name: format!("{CUSTOM_FIELD_PREFIX}{uuid}"),
                        label: field.name.clone(),
                        input_type: match field.field_type {
                            CustomFieldType::Enum => "select",
                            CustomFieldType::MultiEnum => "multiselect",
                            other => input_type(other.as_field_type()),
                        },
                        required: field.is_required,
                        value,
                        choices: custom_choices(field, &choices),
                    });
                }
                Cell::Relation(_) => {}
            }
        }
        page.sections.push(FormSection {
            name: group.name.clone(),
            inputs,
        });
    }
    Ok(page)
}

fn custom_choices(field: &CustomField, choices: &[CustomFieldEnumValue]) -> Vec<(String, String)> {
    choices
        .iter()
        .filter(|choice| choice.custom_field_id == field.id)
        .map(|choice| (choice.id.to_string(), choice.value.clone()))
        .collect()
}

fn field_choices<R>(
    repo: &R,
    kind: EntityKind,
    field: &FieldDescriptor,
) -> ServiceResult<Vec<(String, String)>>
where
    R: UserReader + ActivityReader + BillingReader + ?Sized,
{
    let choices = match field.field_type {
        FieldType::Choice(values) => values
            .iter()
            .map(|value| (value.to_string(), value.to_string()))
            .collect(),
        FieldType::User => repo
            .list_users()?
            .into_iter()
            .map(|user| (user.id.to_string(), user.name.into_inner()))
            .collect(),
        FieldType::Reference if kind == EntityKind::Activity => repo
            .list_activity_types()?
            .into_iter()
            .map(|activity_type| (activity_type.id, activity_type.name))
            .collect(),
        FieldType::Reference if kind.is_billing_document() => repo
            .list_statuses(kind)?
            .into_iter()
            .map(|status| (status.id.to_string(), status.name))
            .collect(),
        _ => Vec::new(),
    };
    Ok(choices)
}

fn matches_search(snapshot: &EntitySnapshot, needle: Option<&str>) -> bool {
    needle.is_none_or(|needle| snapshot.entity.label().to_lowercase().contains(needle))
}

/// Filtered, searched and ordered rows of a list view, every page.
pub fn list_rows<R>(
    repo: &R,
    user: &User,
    kind: EntityKind,
    query: &ListQuery,
) -> ServiceResult<ListRows>
where
    R: EntityReader
        + FilterReader
        + RelationReader
        + PropertyReader
        + CustomFieldReader
        + ?Sized,
{
    let header_filter = select_header_filter(repo, user, kind, query.hfilter.as_deref())?;
    let catalog = filter_catalog(repo)?;
    let selected = match query.filter.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => Some(
            catalog
                .filters
                .get(id)
                .filter(|filter| filter.entity_kind == kind && filter.is_visible_to(user.id))
                .cloned()
                .ok_or(ServiceError::NotFound)?,
        ),
        None => None,
    };

    let mut engine = FilterEngine::new(&catalog, Local::now().date_naive());
    let kinds = match &selected {
        Some(filter) => engine.required_kinds(filter)?,
        None => HashSet::from([kind]),
    };
    for required in kinds {
        engine.add_snapshots(required, repo.load_snapshots(required)?);
    }
    let matched = match &selected {
        Some(filter) => Some(engine.evaluate(filter)?),
        None => None,
    };

    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|search| !search.is_empty())
        .map(str::to_lowercase);
    let mut snapshots: Vec<&EntitySnapshot> = engine
        .snapshots(kind)
        .iter()
        .filter(|snapshot| !snapshot.entity.is_deleted)
        .filter(|snapshot| matched.as_ref().is_none_or(|ids| ids.contains(&snapshot.id())))
        .filter(|snapshot| matches_search(snapshot, needle.as_deref()))
        .collect();
    snapshots.sort_by_cached_key(|snapshot| (snapshot.entity.label().to_lowercase(), snapshot.id()));

    let cells = cell_catalog(repo)?;
    let columns = header_filter
        .cells
        .iter()
        .map(|cell| cells.title(kind, cell))
        .collect();
    let rows = snapshots
        .into_iter()
        .map(|snapshot| ListRow {
            id: snapshot.id(),
            label: snapshot.entity.label().to_string(),
            values: header_filter
                .cells
                .iter()
                .map(|cell| cells.render(cell, snapshot))
                .collect(),
        })
        .collect();
    Ok(ListRows {
        header_filter,
        columns,
        rows,
    })
}

/// Paginated list view of one kind.
pub fn list_page<R>(
    repo: &R,
    user: &User,
    kind: EntityKind,
    query: ListQuery,
) -> ServiceResult<ListPageData>
where
    R: EntityReader
        + FilterReader
        + RelationReader
        + PropertyReader
        + CustomFieldReader
        + ?Sized,
{
    let ListRows {
        header_filter,
        columns,
        rows,
    } = list_rows(repo, user, kind, &query)?;

    let total = rows.len();
    let rows = Paginated::slice(rows, query.page.unwrap_or(1), DEFAULT_ITEMS_PER_PAGE);

    let entity_filters = list_entity_filters(repo, user, kind)?
        .into_iter()
        .map(|filter| FilterChoice {
            id: filter.id,
            name: filter.name,
            is_private: filter.is_private,
        })
        .collect();

    Ok(ListPageData {
        kind,
        columns,
        rows,
        total,
        header_filter,
        header_filters: list_header_filters(repo, user, kind)?,
        entity_filters,
        selected_filter: query.filter.filter(|id| !id.trim().is_empty()),
        search: query.search.filter(|search| !search.trim().is_empty()),
    })
}

/// CSV rendering of a list view with the header filter columns.
pub fn export_csv<R>(
    repo: &R,
    user: &User,
    kind: EntityKind,
    query: &ListQuery,
) -> ServiceResult<String>
where
    R: EntityReader
        + FilterReader
        + RelationReader
        + PropertyReader
        + CustomFieldReader
        + ?Sized,
{
    let ListRows { columns, rows, .. } = list_rows(repo, user, kind, query)?;
    let csv_error = |err: csv::Error| {
        log::error!("Failed to write the CSV export: {err}");
        ServiceError::Internal(err.to_string())
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns).map_err(csv_error)?;
    for row in &rows {
        writer.write_record(&row.values).map_err(csv_error)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ServiceError::Internal(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| ServiceError::Internal(err.to_string()))
}

/// Entity with its relations, properties, custom values and addresses.
pub fn detail_page<R>(repo: &R, user: &User, id: EntityId) -> ServiceResult<DetailPageData>
where
    R: EntityReader
        + RelationReader
        + PropertyReader
        + CustomFieldReader
        + UserReader
        + ?Sized,
{
    let entity = get_entity(repo, id)?;
    let kind = entity.base.kind;

    let mut fields: Vec<FieldRow> = entity
        .data
        .field_values()
        .into_iter()
        .filter_map(|(name, value)| {
            field_descriptor(kind, name).map(|field| FieldRow {
                name: field.name,
                verbose_name: field.verbose_name,
                value: value.to_string(),
            })
        })
        .collect();
    for name in ["description", "created_at", "modified_at"] {
        if let (Some(field), Some(value)) = (
            field_descriptor(kind, name),
            base_field_value(&entity.base, name),
        ) {
            fields.push(FieldRow {
                name: field.name,
                verbose_name: field.verbose_name,
                value: value.to_string(),
            });
        }
    }

    let relation_types: HashMap<String, String> = repo
        .list_relation_types()?
        .into_iter()
        .map(|rtype| (rtype.id, rtype.predicate))
        .collect();
    let relations = repo.list_relations(id)?;
    let object_ids: Vec<EntityId> = relations.iter().map(|relation| relation.object_id).collect();
    let objects: HashMap<EntityId, CremeEntity> = repo
        .get_entities(&object_ids)?
        .into_iter()
        .map(|object| (object.id(), object.base))
        .collect();
    let relations = relations
        .into_iter()
        .map(|relation| {
            let object = objects.get(&relation.object_id);
            RelationRow {
                id: relation.id,
                predicate: relation_types
                    .get(&relation.type_id)
                    .cloned()
                    .unwrap_or_else(|| relation.type_id.clone()),
                type_id: relation.type_id,
                object_id: relation.object_id,
                object_kind: object.map(|object| object.kind),
                object_label: object.map(|object| object.label().to_string()).unwrap_or_default(),
                object_deleted: object.is_none_or(|object| object.is_deleted),
            }
        })
        .collect();

    let choices = repo.list_enum_values()?;
    let stored = repo.get_custom_values(id)?;
    let custom_values = repo
        .list_custom_fields()?
        .into_iter()
        .filter(|field| field.kind == kind && !field.is_deleted)
        .filter_map(|field| {
            stored.get(&field.id).map(|value| CustomValueRow {
                value: value.display(&choices),
                name: field.name,
            })
        })
        .collect();

    let addresses = if matches!(kind, EntityKind::Contact | EntityKind::Organisation) {
        repo.list_addresses(id)?
    } else {
        Vec::new()
    };

    Ok(DetailPageData {
        owner: repo.get_user_by_id(entity.base.user_id)?,
        can_edit: can_edit(user, &entity.base),
        properties: repo.list_entity_properties(id)?,
        entity,
        fields,
        relations,
        custom_values,
        addresses,
    })
}

/// Field targeted by a bulk edition, with its parsed value.
enum BulkTarget<'a> {
    Regular(&'static FieldDescriptor, FieldValue),
    Custom(&'a CustomField, Option<CustomValue>),
}

/// Sets one field on several entities; per entity failures are reported.
pub fn bulk_edit<R>(
    repo: &R,
    user: &User,
    kind: EntityKind,
    payload: BulkEditPayload,
) -> ServiceResult<BulkEditOutcome>
where
    R: EntityReader
        + EntityWriter
        + CustomFieldReader
        + CustomFieldWriter
        + UserReader
        + ActivityReader
        + BillingReader
        + ?Sized,
{
    let custom_fields = live_custom_fields(repo, kind)?;
    let choices = repo.list_enum_values()?;
    let target = match payload.field.strip_prefix(CUSTOM_FIELD_PREFIX) {
        Some(raw_uuid) => {
            let uuid: PublicId = raw_uuid.parse()?;
            let field = custom_fields
                .iter()
                .find(|field| field.uuid == uuid)
                .ok_or_else(|| ServiceError::Form(format!("unknown field {}", payload.field)))?;
            BulkTarget::Custom(field, field.parse_form_value(&payload.value, &choices)?)
        }
        None => {
            let field = field_descriptor(kind, &payload.field)
                .filter(|field| field.editable)
                .ok_or_else(|| ServiceError::Form(format!("unknown field {}", payload.field)))?;
            let raw = payload.value.first().map(String::as_str).unwrap_or_default();
            let value = field
                .field_type
                .parse_value(raw)
                .map_err(|err| field_error(field, err))?;
            if field.required && value.is_empty() {
                return Err(field_error(field, "this field is required"));
            }
            BulkTarget::Regular(field, value)
        }
    };

    let mut outcome = BulkEditOutcome::default();
    for id in payload.ids {
        let result = get_live_entity(repo, id, kind).and_then(|mut entity| {
            ensure_can_edit(user, &entity.base)?;
            match &target {
                BulkTarget::Regular(field, value) => {
                    let mut changes = FormChanges::default();
                    assign_field(repo, field, value.clone(), &mut entity.data, &mut changes)?;
                    check_entity_data(repo, kind, &mut entity.data)?;
                    if let Some(description) = changes.description {
                        entity.base.description = ammonia::clean(description.trim());
                    }
                    if let Some(owner) = changes.owner {
                        entity.base.user_id = owner;
                    }
                    store_entity(repo, entity)?;
                }
                BulkTarget::Custom(field, value) => {
                    repo.set_custom_value(field, entity.id(), value.clone())?;
                }
            }
            Ok(())
        });
        match result {
            Ok(()) => outcome.updated += 1,
            Err(err) => outcome.errors.push((id.to_string(), err.to_string())),
        }
    }
    log::info!(
        "Bulk edition of {} on {}: {} updated, {} failed",
        payload.field,
        kind.verbose_name(),
        outcome.updated,
        outcome.errors.len()
    );
    Ok(outcome)
}

/// Moves an entity to the trash.
pub fn trash_entity<R>(repo: &R, user: &User, id: EntityId) -> ServiceResult<CremeEntity>
where
    R: EntityReader + EntityWriter + ?Sized,
{
    let entity = get_entity(repo, id)?;
    ensure_can_edit(user, &entity.base)?;
    if !entity.base.is_deleted {
        repo.set_entity_trashed(id, true)?;
        log::info!("Entity {id} moved to the trash by {}", user.email);
    }
    Ok(entity.base)
}

pub fn restore_entity<R>(repo: &R, user: &User, id: EntityId) -> ServiceResult<CremeEntity>
where
    R: EntityReader + EntityWriter + ?Sized,
{
    let entity = get_entity(repo, id)?;
    ensure_can_edit(user, &entity.base)?;
    if !entity.base.is_deleted {
        return Err(ServiceError::Conflict(format!(
            "\"{}\" is not in the trash",
            entity.base.label()
        )));
    }
    repo.set_entity_trashed(id, false)?;
    Ok(entity.base)
}

/// Removes a trashed entity with its relations, properties and custom values.
pub fn delete_definitively<R>(repo: &R, user: &User, id: EntityId) -> ServiceResult<()>
where
    R: EntityReader + EntityWriter + ?Sized,
{
    let entity = get_entity(repo, id)?;
    ensure_can_edit(user, &entity.base)?;
    if !entity.base.is_deleted {
        return Err(ServiceError::Conflict(format!(
            "\"{}\" must be in the trash before being deleted",
            entity.base.label()
        )));
    }
    repo.delete_entity(id)?;
    log::info!("Entity {id} deleted by {}", user.email);
    Ok(())
}

/// Trash of the user; administrators see every trashed entity.
pub fn trash_page<R>(repo: &R, user: &User, page: Option<usize>) -> ServiceResult<TrashPageData>
where
    R: EntityReader + ?Sized,
{
    let page = page.unwrap_or(1).max(1);
    let mut query = TrashQuery::default().paginate(page, DEFAULT_ITEMS_PER_PAGE);
    if !user.is_admin {
        query = query.owned_by(user.id);
    }
    let (total, entities) = repo.list_trash(query)?;
    Ok(TrashPageData {
        entities: Paginated::new(entities, page, total.div_ceil(DEFAULT_ITEMS_PER_PAGE)),
        total,
    })
}

/// Deletes the trashed entities listed by `query`, reporting failures.
pub fn purge_trash<R>(repo: &R, query: TrashQuery) -> ServiceResult<TrashOutcome>
where
    R: EntityReader + EntityWriter + ?Sized,
{
    let (_, entities) = repo.list_trash(query)?;
    let mut outcome = TrashOutcome::default();
    for entity in entities {
        match repo.delete_entity(entity.id) {
            Ok(()) => outcome.deleted += 1,
            Err(err) => {
                log::error!("Failed to delete entity {}: {err}", entity.id);
                outcome
                    .errors
                    .push((entity.label().to_string(), err.to_string()));
            }
        }
    }
    Ok(outcome)
}

/// Empties the user's trash; administrators empty everyone's.
pub fn empty_trash<R>(repo: &R, user: &User) -> ServiceResult<TrashOutcome>
where
    R: EntityReader + EntityWriter + ?Sized,
{
    let mut query = TrashQuery::default();
    if !user.is_admin {
        query = query.owned_by(user.id);
    }
    let outcome = purge_trash(repo, query)?;
    log::info!(
        "Trash emptied by {}: {} deleted, {} failed",
        user.email,
        outcome.deleted,
        outcome.errors.len()
    );
    Ok(outcome)
}

fn ensure_has_addresses(entity: &AnyEntity) -> ServiceResult<()> {
    if matches!(
        entity.base.kind,
        EntityKind::Contact | EntityKind::Organisation
    ) {
        Ok(())
    } else {
        Err(ServiceError::Form(format!(
            "a {} has no address",
            entity.base.kind.verbose_name()
        )))
    }
}

/// Creates or rewrites an address of a contact or organisation.
pub fn save_address<R>(
    repo: &R,
    user: &User,
    owner_id: EntityId,
    address_id: Option<AddressId>,
    form: AddressForm,
) -> ServiceResult<Address>
where
    R: EntityReader + EntityWriter + ?Sized,
{
    let owner = get_entity(repo, owner_id)?;
    ensure_has_addresses(&owner)?;
    ensure_can_edit(user, &owner.base)?;
    if let Some(id) = address_id {
        let known = repo.list_addresses(owner_id)?;
        if !known.iter().any(|address| address.id == id) {
            return Err(ServiceError::NotFound);
        }
    }
    let address = form.into_new_address(owner_id)?;
    Ok(repo.save_address(address_id, &address)?)
}

pub fn delete_address<R>(
    repo: &R,
    user: &User,
    owner_id: EntityId,
    address_id: AddressId,
) -> ServiceResult<()>
where
    R: EntityReader + EntityWriter + ?Sized,
{
    let owner = get_entity(repo, owner_id)?;
    ensure_has_addresses(&owner)?;
    ensure_can_edit(user, &owner.base)?;
    if !repo
        .list_addresses(owner_id)?
        .iter()
        .any(|address| address.id == address_id)
    {
        return Err(ServiceError::NotFound);
    }
    repo.delete_address(address_id)?;
    Ok(())
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use super::*;
    use crate::domain::billing::{BillingDocument, BillingStatus};
    use crate::domain::persons::{Contact, Organisation};
    use crate::domain::types::StatusId;
    use crate::repository::errors::RepositoryError;
    use crate::repository::mock::MockRepository;
    use crate::services::users::test_support::{admin_auth, base, user_from, viewer_auth};

    fn contact(id: i32, owner: i32, last_name: &str) -> AnyEntity {
        AnyEntity {
            base: base(id, EntityKind::Contact, owner, last_name),
            data: EntityData::Contact(Contact::new("", last_name)),
        }
    }

    fn default_layout(repo: &mut MockRepository) {
        repo.expect_get_custom_form().returning(|_| Ok(None));
        repo.expect_list_custom_fields().returning(|| Ok(vec![]));
        repo.expect_list_enum_values().returning(|| Ok(vec![]));
    }

    #[test]
    fn creates_a_contact_from_the_default_form() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        default_layout(&mut repo);
        repo.expect_create_entity()
            .withf(|new, data| {
                new.header_filter_search_field == "Spike Spiegel"
                    && new.user_id.get() == 2
                    && matches!(data, EntityData::Contact(contact) if contact.last_name == "Spiegel")
            })
            .times(1)
            .returning(|new, data| {
                Ok(AnyEntity {
                    base: base(10, new.kind, new.user_id.get(), &new.header_filter_search_field),
                    data: data.clone(),
                })
            });

        let form = EntityForm::from_pairs([("first_name", "Spike"), ("last_name", "Spiegel")]);
        let entity = create_entity(&repo, &user, EntityKind::Contact, &form).expect("created");
        assert_eq!(entity.base.label(), "Spike Spiegel");
    }

    #[test]
    fn required_fields_must_be_filled() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        default_layout(&mut repo);
        repo.expect_create_entity().never();

        let form = EntityForm::from_pairs([("first_name", "Spike")]);
        assert!(matches!(
            create_entity(&repo, &user, EntityKind::Contact, &form),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn documents_get_the_default_status() {
        let mut repo = MockRepository::new();
        repo.expect_list_statuses().returning(|kind| {
            Ok(vec![
                BillingStatus {
                    id: StatusId::new(1).expect("valid id"),
                    doc_kind: kind,
                    name: "Draft".into(),
                    is_default: false,
                    is_validated: false,
                    position: 1,
                },
                BillingStatus {
                    id: StatusId::new(2).expect("valid id"),
                    doc_kind: kind,
                    name: "Pending".into(),
                    is_default: true,
                    is_validated: false,
                    position: 2,
                },
            ])
        });
        let mut data = EntityData::Document(BillingDocument::new("Fuel"));
        check_entity_data(&repo, EntityKind::Invoice, &mut data).expect("valid document");
        assert_eq!(
            data.as_document().and_then(|document| document.status_id),
            StatusId::new(2).ok()
        );
    }

    #[test]
    fn only_trashed_entities_are_deleted() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_get_entity()
            .returning(|_| Ok(Some(contact(5, 2, "Valentine"))));
        repo.expect_delete_entity().never();

        let id = EntityId::new(5).expect("valid id");
        assert!(matches!(
            delete_definitively(&repo, &user, id),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn strangers_cannot_trash() {
        let stranger = user_from(&viewer_auth(), 9);
        let mut repo = MockRepository::new();
        repo.expect_get_entity()
            .returning(|_| Ok(Some(contact(5, 2, "Valentine"))));
        repo.expect_set_entity_trashed().never();

        let id = EntityId::new(5).expect("valid id");
        assert!(matches!(
            trash_entity(&repo, &stranger, id),
            Err(ServiceError::Unauthorized)
        ));
    }

    #[test]
    fn bulk_edit_reports_failures_per_entity() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_list_custom_fields().returning(|| Ok(vec![]));
        repo.expect_list_enum_values().returning(|| Ok(vec![]));
        repo.expect_get_entity().returning(|id| {
            Ok(match id.get() {
                1 => Some(contact(1, 2, "Spiegel")),
                2 => Some(contact(2, 7, "Black")),
                _ => None,
            })
        });
        repo.expect_update_entity()
            .times(1)
            .returning(|entity| Ok(entity.clone()));

        let payload = BulkEditPayload {
            ids: [1, 2, 3].map(|id| EntityId::new(id).expect("valid id")).to_vec(),
            field: "position".into(),
            value: vec!["Bounty hunter".into()],
        };
        let outcome = bulk_edit(&repo, &user, EntityKind::Contact, payload).expect("bulk edit");
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.errors.len(), 2);
    }

    #[test]
    fn admins_empty_the_whole_trash() {
        let admin = user_from(&admin_auth(), 1);
        let mut repo = MockRepository::new();
        repo.expect_list_trash()
            .withf(|query| query.user_id.is_none())
            .returning(|_| {
                let mut first = base(3, EntityKind::Organisation, 4, "Red Dragon");
                first.is_deleted = true;
                let mut second = base(4, EntityKind::Contact, 5, "Vicious");
                second.is_deleted = true;
                Ok((2, vec![first, second]))
            });
        repo.expect_delete_entity().returning(|id| {
            if id.get() == 4 {
                Err(RepositoryError::ConstraintViolation("in use".into()))
            } else {
                Ok(())
            }
        });

        let outcome = empty_trash(&repo, &admin).expect("trash emptied");
        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn list_view_searches_labels() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_list_header_filters().returning(|| Ok(vec![]));
        repo.expect_list_relation_types().returning(|| Ok(vec![]));
        repo.expect_list_property_types().returning(|| Ok(vec![]));
        repo.expect_list_custom_fields().returning(|| Ok(vec![]));
        repo.expect_list_enum_values().returning(|| Ok(vec![]));
        repo.expect_list_entity_filters().returning(|| Ok(vec![]));
        repo.expect_load_snapshots().returning(|kind| {
            let mut trashed = base(3, kind, 2, "Bebop II");
            trashed.is_deleted = true;
            Ok(vec![
                EntitySnapshot::new(base(1, kind, 2, "Red Dragon")),
                EntitySnapshot::new(base(2, kind, 2, "Bebop")),
                EntitySnapshot::new(trashed),
            ])
        });

        let query = ListQuery {
            search: Some("BEB".into()),
            ..ListQuery::default()
        };
        let page = list_page(&repo, &user, EntityKind::Organisation, query).expect("list page");
        assert_eq!(page.total, 1);
        assert_eq!(page.rows.items[0].label, "Bebop");
        assert_eq!(page.columns.len(), page.header_filter.cells.len());
    }

    #[test]
    fn addresses_belong_to_persons() {
        let user = user_from(&admin_auth(), 1);
        let mut repo = MockRepository::new();
        repo.expect_get_entity().returning(|_| {
            Ok(Some(AnyEntity {
                base: base(8, EntityKind::Event, 1, "Party"),
                data: EntityData::Organisation(Organisation::new("Party")),
            }))
        });
        let form = AddressForm {
            kind: "billing".into(),
            name: String::new(),
            address: "Tharsis".into(),
            po_box: String::new(),
            zipcode: String::new(),
            city: String::new(),
            department: String::new(),
            state: String::new(),
            country: String::new(),
        };
        let id = EntityId::new(8).expect("valid id");
        assert!(matches!(
            save_address(&repo, &user, id, None, form),
            Err(ServiceError::Form(_))
        ));
    }
}
