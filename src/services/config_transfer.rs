//! Export and import of the configuration (property and relation types,
//! custom fields, filters and forms).
//!
//! An import runs every registered [`Importer`] in dependency order. Each one
//! validates its section of the document against the stored configuration and
//! what the previous importers accepted, gathered in [`ValidatedData`].
//! Nothing is stored unless every section is valid; the importers then save
//! their sections in the same order, inside one transaction.

use std::collections::{HashMap, HashSet};

use crate::domain::config_transfer::{
    ConfigDocument, ConfigImport, CustomFieldData, CustomFormData, DependenceError,
    EntityFilterData, HeaderFilterData, ImportError, PropertyTypeData, RelationSideData,
    RelationTypeData, dependence_sort,
};
use crate::domain::custom_field::{CustomField, normalize_name};
use crate::domain::custom_form::CustomFormItem;
use crate::domain::entity::EntityKind;
use crate::domain::entity_filter::{CustomFieldRef, EntityFilter, FilterCatalog, FilterCondition};
use crate::domain::header_filter::{Cell, CellCatalog, CustomColumn, HeaderFilter};
use crate::domain::relation::RelationType;
use crate::domain::types::PublicId;
use crate::domain::user::User;
use crate::dto::config::ImportSummary;
use crate::repository::errors::{RepositoryError, RepositoryResult};
use crate::repository::{
    ConfigStore, ConfigWriter, CustomFieldReader, FilterReader, PropertyReader, RelationReader,
};
use crate::services::ServiceResult;
use crate::services::filters::{cell_catalog, filter_catalog};
use crate::services::users::ensure_admin;

/// Configuration accepted so far during an import, on top of the stored one.
pub struct ValidatedData {
    pub import: ConfigImport,
    filters: FilterCatalog,
    cells: CellCatalog,
    custom_fields: Vec<CustomField>,
    /// Live custom fields, stored or imported, by uuid.
    custom_field_kinds: HashMap<PublicId, EntityKind>,
}

impl ValidatedData {
    pub fn new(filters: FilterCatalog, cells: CellCatalog, custom_fields: Vec<CustomField>) -> Self {
        let custom_field_kinds = custom_fields
            .iter()
            .filter(|field| !field.is_deleted)
            .map(|field| (field.uuid, field.kind))
            .collect();
        Self {
            import: ConfigImport::default(),
            filters,
            cells,
            custom_fields,
            custom_field_kinds,
        }
    }

    fn load<R>(repo: &R) -> ServiceResult<Self>
    where
        R: RelationReader + PropertyReader + CustomFieldReader + FilterReader + ?Sized,
    {
        Ok(Self::new(
            filter_catalog(repo)?,
            cell_catalog(repo)?,
            repo.list_custom_fields()?,
        ))
    }
}

/// Validates, then stores, one section of a configuration document.
pub trait Importer: Send + Sync {
    fn data_id(&self) -> &'static str;

    /// Sections whose validated data this importer reads.
    fn dependencies(&self) -> &'static [&'static str] {
        &[]
    }

    fn validate(
        &self,
        document: &ConfigDocument,
        validated: &mut ValidatedData,
    ) -> Result<(), ImportError>;

    /// Stores what `validate` accepted; called once every section is valid.
    fn save(&self, validated: &ValidatedData, store: &mut dyn ConfigStore) -> RepositoryResult<()>;
}

/// Importers keyed by the section they handle.
#[derive(Default)]
pub struct ImportersRegistry {
    importers: Vec<Box<dyn Importer>>,
}

impl ImportersRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the importers of every exported section.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PropertyTypesImporter);
        registry.register(RelationTypesImporter);
        registry.register(CustomFieldsImporter);
        registry.register(HeaderFiltersImporter);
        registry.register(EntityFiltersImporter);
        registry.register(CustomFormsImporter);
        registry
    }

    /// Adds an importer; one registered with the same data id is replaced.
    pub fn register(&mut self, importer: impl Importer + 'static) {
        self.importers
            .retain(|known| known.data_id() != importer.data_id());
        self.importers.push(Box::new(importer));
    }

    /// Importers ordered so that dependencies run first.
    pub fn sorted(&self) -> Result<Vec<&dyn Importer>, DependenceError> {
        dependence_sort(
            self.importers.iter().map(|importer| importer.as_ref()).collect(),
            |importer| importer.data_id(),
            |importer| importer.dependencies().to_vec(),
        )
    }

    /// Runs the validation phase of every importer.
    pub fn validate(
        &self,
        document: &ConfigDocument,
        validated: &mut ValidatedData,
    ) -> Result<(), ImportError> {
        for importer in self.sorted()? {
            importer.validate(document, validated)?;
        }
        Ok(())
    }

    /// Runs the save phase of every importer, in the validation order.
    pub fn save(&self, validated: &ValidatedData, store: &mut dyn ConfigStore) -> RepositoryResult<()> {
        let importers = self
            .sorted()
            .map_err(|err| RepositoryError::ValidationError(err.to_string()))?;
        for importer in importers {
            importer.save(validated, store)?;
        }
        Ok(())
    }
}

fn check_unique<'a>(
    data_id: &'static str,
    what: &str,
    keys: impl IntoIterator<Item = &'a str>,
) -> Result<(), ImportError> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(ImportError::invalid(data_id, format!("duplicate {what} \"{key}\"")));
        }
    }
    Ok(())
}

pub struct PropertyTypesImporter;

impl Importer for PropertyTypesImporter {
    fn data_id(&self) -> &'static str {
        "property_types"
    }

    fn validate(
        &self,
        document: &ConfigDocument,
        validated: &mut ValidatedData,
    ) -> Result<(), ImportError> {
        let uuids: Vec<String> = document
            .property_types
            .iter()
            .map(|data| data.uuid.to_string())
            .collect();
        check_unique(self.data_id(), "uuid", uuids.iter().map(String::as_str))?;
        for data in &document.property_types {
            if data.text.trim().is_empty() {
                return Err(ImportError::invalid(self.data_id(), "a property type has no text"));
            }
            validated.filters.property_types.insert(data.uuid);
            validated.import.property_types.push(data.clone());
        }
        Ok(())
    }

    fn save(&self, validated: &ValidatedData, store: &mut dyn ConfigStore) -> RepositoryResult<()> {
        for data in &validated.import.property_types {
            store.upsert_property_type(data)?;
        }
        Ok(())
    }
}

pub struct RelationTypesImporter;

impl RelationTypesImporter {
    fn side(id: &str, symmetric: &str, side: &RelationSideData, other: &RelationSideData) -> RelationType {
        RelationType {
            id: id.to_string(),
            symmetric_type_id: symmetric.to_string(),
            predicate: side.predicate.clone(),
            subject_kinds: side.kinds.clone(),
            object_kinds: other.kinds.clone(),
            subject_properties: Vec::new(),
            is_custom: true,
            is_internal: false,
            enabled: true,
            is_copiable: side.is_copiable,
        }
    }
}

impl Importer for RelationTypesImporter {
    fn data_id(&self) -> &'static str {
        "relation_types"
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["property_types"]
    }

    fn validate(
        &self,
        document: &ConfigDocument,
        validated: &mut ValidatedData,
    ) -> Result<(), ImportError> {
        check_unique(
            self.data_id(),
            "relation type",
            document
                .relation_types
                .iter()
                .flat_map(|data| [data.id.as_str(), data.symmetric_id.as_str()]),
        )?;
        for data in &document.relation_types {
            for (id, side) in [(&data.id, &data.subject), (&data.symmetric_id, &data.object)] {
                if id.trim().is_empty() || side.predicate.trim().is_empty() {
                    return Err(ImportError::invalid(
                        self.data_id(),
                        "a relation type needs an id and a predicate",
                    ));
                }
                if validated
                    .filters
                    .relation_types
                    .get(id.as_str())
                    .is_some_and(|existing| !existing.is_custom)
                {
                    return Err(ImportError::invalid(
                        self.data_id(),
                        format!("\"{id}\" is a built-in relation type"),
                    ));
                }
                if let Some(unknown) = side
                    .properties
                    .iter()
                    .find(|uuid| !validated.filters.property_types.contains(uuid))
                {
                    return Err(ImportError::invalid(
                        self.data_id(),
                        format!("unknown property type {unknown}"),
                    ));
                }
            }
            for rtype in [
                Self::side(&data.id, &data.symmetric_id, &data.subject, &data.object),
                Self::side(&data.symmetric_id, &data.id, &data.object, &data.subject),
            ] {
                validated
                    .cells
                    .relation_types
                    .insert(rtype.id.clone(), rtype.predicate.clone());
                validated.filters.relation_types.insert(rtype.id.clone(), rtype);
            }
            validated.import.relation_types.push(data.clone());
        }
        Ok(())
    }

    fn save(&self, validated: &ValidatedData, store: &mut dyn ConfigStore) -> RepositoryResult<()> {
        for data in &validated.import.relation_types {
            store.upsert_relation_type_pair(data)?;
        }
        Ok(())
    }
}

pub struct CustomFieldsImporter;

impl Importer for CustomFieldsImporter {
    fn data_id(&self) -> &'static str {
        "custom_fields"
    }

    fn validate(
        &self,
        document: &ConfigDocument,
        validated: &mut ValidatedData,
    ) -> Result<(), ImportError> {
        let known: HashSet<PublicId> = validated.custom_fields.iter().map(|field| field.uuid).collect();
        let mut names: HashSet<(EntityKind, String)> = validated
            .custom_fields
            .iter()
            .filter(|field| !field.is_deleted)
            .map(|field| (field.kind, normalize_name(&field.name)))
            .collect();

        for data in &document.custom_fields {
            // Fields already there are kept as they are.
            if known.contains(&data.uuid) {
                continue;
            }
            if data.name.trim().is_empty() {
                return Err(ImportError::invalid(self.data_id(), "a custom field has no name"));
            }
            if !names.insert((data.entity_kind, normalize_name(&data.name))) {
                return Err(ImportError::invalid(
                    self.data_id(),
                    format!(
                        "a custom field named \"{}\" already exists on {}",
                        data.name,
                        data.entity_kind.verbose_name()
                    ),
                ));
            }
            if !data.choices.is_empty() && !data.field_type.has_choices() {
                return Err(ImportError::invalid(
                    self.data_id(),
                    format!("\"{}\" cannot have choices", data.name),
                ));
            }
            validated.filters.custom_fields.insert(
                data.uuid,
                CustomFieldRef {
                    kind: data.entity_kind,
                    field_type: data.field_type,
                    is_deleted: false,
                },
            );
            validated.cells.custom_fields.insert(
                data.uuid,
                CustomColumn {
                    name: data.name.clone(),
                    kind: data.entity_kind,
                    is_deleted: false,
                    choices: Vec::new(),
                },
            );
            validated.custom_field_kinds.insert(data.uuid, data.entity_kind);
            validated.import.custom_fields.push(data.clone());
        }
        Ok(())
    }

    fn save(&self, validated: &ValidatedData, store: &mut dyn ConfigStore) -> RepositoryResult<()> {
        for data in &validated.import.custom_fields {
            if !store.insert_custom_field(data)? {
                log::info!("Custom field {} already exists, kept as is", data.uuid);
            }
        }
        Ok(())
    }
}

pub struct HeaderFiltersImporter;

impl Importer for HeaderFiltersImporter {
    fn data_id(&self) -> &'static str {
        "header_filters"
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["relation_types", "custom_fields"]
    }

    fn validate(
        &self,
        document: &ConfigDocument,
        validated: &mut ValidatedData,
    ) -> Result<(), ImportError> {
        check_unique(
            self.data_id(),
            "header filter",
            document.header_filters.iter().map(|data| data.id.as_str()),
        )?;
        for data in &document.header_filters {
            let filter = HeaderFilter {
                id: data.id.clone(),
                name: data.name.clone(),
                entity_kind: data.entity_kind,
                user_id: None,
                is_private: false,
                is_custom: true,
                cells: data.cells.clone(),
            };
            filter
                .validate(&validated.cells)
                .map_err(|err| ImportError::invalid(self.data_id(), format!("{}: {err}", data.id)))?;
            validated.import.header_filters.push(filter);
        }
        Ok(())
    }

    fn save(&self, validated: &ValidatedData, store: &mut dyn ConfigStore) -> RepositoryResult<()> {
        for filter in &validated.import.header_filters {
            store.store_header_filter(filter)?;
        }
        Ok(())
    }
}

pub struct EntityFiltersImporter;

impl Importer for EntityFiltersImporter {
    fn data_id(&self) -> &'static str {
        "entity_filters"
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["relation_types", "property_types", "custom_fields"]
    }

    fn validate(
        &self,
        document: &ConfigDocument,
        validated: &mut ValidatedData,
    ) -> Result<(), ImportError> {
        let data_id = self.data_id();
        let mut filters = Vec::with_capacity(document.entity_filters.len());
        for data in &document.entity_filters {
            let conditions = data
                .conditions
                .iter()
                .map(FilterCondition::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| ImportError::invalid(data_id, format!("{}: {err}", data.id)))?;
            filters.push(EntityFilter {
                id: data.id.clone(),
                name: data.name.clone(),
                entity_kind: data.entity_kind,
                user_id: None,
                is_private: false,
                is_custom: true,
                use_or: data.use_or,
                conditions,
            });
        }
        check_unique(data_id, "entity filter", filters.iter().map(|filter| filter.id.as_str()))?;

        // Sub-filters of the file come first; stored ones are already known.
        let in_file: HashSet<String> = filters.iter().map(|filter| filter.id.clone()).collect();
        let sorted = dependence_sort(
            filters,
            |filter| filter.id.clone(),
            |filter| {
                filter
                    .subfilter_ids()
                    .filter(|id| in_file.contains(*id) && *id != filter.id)
                    .map(str::to_string)
                    .collect()
            },
        )?;

        for filter in sorted {
            if validated
                .filters
                .filters
                .get(&filter.id)
                .is_some_and(|existing| !existing.is_custom)
            {
                return Err(ImportError::invalid(
                    data_id,
                    format!("\"{}\" is a built-in filter", filter.id),
                ));
            }
            validated
                .filters
                .validate_filter(&filter)
                .map_err(|err| ImportError::invalid(data_id, format!("{}: {err}", filter.id)))?;
            validated
                .filters
                .filters
                .insert(filter.id.clone(), filter.clone());
            validated.import.entity_filters.push(filter);
        }
        Ok(())
    }

    fn save(&self, validated: &ValidatedData, store: &mut dyn ConfigStore) -> RepositoryResult<()> {
        for filter in &validated.import.entity_filters {
            store.store_entity_filter(filter)?;
        }
        Ok(())
    }
}

pub struct CustomFormsImporter;

impl Importer for CustomFormsImporter {
    fn data_id(&self) -> &'static str {
        "custom_forms"
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["custom_fields"]
    }

    fn validate(
        &self,
        document: &ConfigDocument,
        validated: &mut ValidatedData,
    ) -> Result<(), ImportError> {
        check_unique(
            self.data_id(),
            "custom form",
            document.custom_forms.iter().map(|data| data.descriptor_id.as_str()),
        )?;
        for data in &document.custom_forms {
            let form = CustomFormItem {
                descriptor_id: data.descriptor_id.clone(),
                groups: data.groups.clone(),
            };
            form.validate(&validated.custom_field_kinds).map_err(|err| {
                ImportError::invalid(self.data_id(), format!("{}: {err}", data.descriptor_id))
            })?;
            validated.import.custom_forms.push(form);
        }
        Ok(())
    }

    fn save(&self, validated: &ValidatedData, store: &mut dyn ConfigStore) -> RepositoryResult<()> {
        for form in &validated.import.custom_forms {
            store.store_custom_form(form)?;
        }
        Ok(())
    }
}

/// Custom types, live custom fields, public custom filters and every custom
/// form, as an exportable document.
pub fn export_document<R>(repo: &R) -> ServiceResult<ConfigDocument>
where
    R: RelationReader + PropertyReader + CustomFieldReader + FilterReader + ?Sized,
{
    let property_types = repo.list_property_types()?;
    let uuid_of: HashMap<_, _> = property_types
        .iter()
        .map(|ptype| (ptype.id, ptype.uuid))
        .collect();

    let relation_types: HashMap<String, RelationType> = repo
        .list_relation_types()?
        .into_iter()
        .map(|rtype| (rtype.id.clone(), rtype))
        .collect();
    let side = |rtype: &RelationType| RelationSideData {
        predicate: rtype.predicate.clone(),
        kinds: rtype.subject_kinds.clone(),
        properties: rtype
            .subject_properties
            .iter()
            .filter_map(|id| uuid_of.get(id).copied())
            .collect(),
        is_copiable: rtype.is_copiable,
    };
    let mut pairs: Vec<RelationTypeData> = Vec::new();
    let mut ids: Vec<&String> = relation_types.keys().collect();
    ids.sort();
    for id in ids {
        let Some(rtype) = relation_types.get(id) else {
            continue;
        };
        let Some(symmetric) = relation_types.get(&rtype.symmetric_type_id) else {
            continue;
        };
        if !rtype.is_custom || pairs.iter().any(|pair| pair.symmetric_id == rtype.id) {
            continue;
        }
        pairs.push(RelationTypeData {
            id: rtype.id.clone(),
            symmetric_id: symmetric.id.clone(),
            subject: side(rtype),
            object: side(symmetric),
        });
    }

    let choices = repo.list_enum_values()?;
    let custom_fields: Vec<CustomFieldData> = repo
        .list_custom_fields()?
        .into_iter()
        .filter(|field| !field.is_deleted)
        .map(|field| CustomFieldData {
            uuid: field.uuid,
            choices: choices
                .iter()
                .filter(|choice| choice.custom_field_id == field.id)
                .map(|choice| choice.value.clone())
                .collect(),
            name: field.name,
            entity_kind: field.kind,
            field_type: field.field_type,
            is_required: field.is_required,
        })
        .collect();

    let live_fields: HashSet<PublicId> = custom_fields.iter().map(|field| field.uuid).collect();
    let live_cell = |cell: &Cell| match cell {
        Cell::CustomField(uuid) => live_fields.contains(uuid),
        _ => true,
    };

    let header_filters = repo
        .list_header_filters()?
        .into_iter()
        .filter(|filter| filter.is_custom && !filter.is_private)
        .map(|filter| HeaderFilterData {
            id: filter.id,
            name: filter.name,
            entity_kind: filter.entity_kind,
            cells: filter.cells.into_iter().filter(|cell| live_cell(cell)).collect(),
        })
        .collect();

    let mut entity_filters = Vec::new();
    for filter in repo
        .list_entity_filters()?
        .into_iter()
        .filter(|filter| filter.is_custom && !filter.is_private)
    {
        // Conditions on deleted custom fields are dropped.
        let conditions = filter
            .conditions
            .iter()
            .filter(|condition| {
                condition
                    .custom_field_uuid()
                    .is_none_or(|uuid| live_fields.contains(uuid))
            })
            .map(FilterCondition::to_row)
            .collect::<Result<Vec<_>, _>>()?;
        entity_filters.push(EntityFilterData {
            id: filter.id,
            name: filter.name,
            entity_kind: filter.entity_kind,
            use_or: filter.use_or,
            conditions,
        });
    }

    let custom_forms = repo
        .list_custom_forms()?
        .into_iter()
        .map(|form| CustomFormData {
            descriptor_id: form.descriptor_id,
            groups: form
                .groups
                .into_iter()
                .map(|mut group| {
                    group.cells.retain(|cell| live_cell(cell));
                    group
                })
                .collect(),
        })
        .collect();

    Ok(ConfigDocument {
        property_types: property_types
            .into_iter()
            .filter(|ptype| ptype.is_custom)
            .map(|ptype| PropertyTypeData {
                uuid: ptype.uuid,
                text: ptype.text,
                subject_kinds: ptype.subject_kinds,
            })
            .collect(),
        relation_types: pairs,
        custom_fields,
        header_filters,
        entity_filters,
        custom_forms,
        ..ConfigDocument::default()
    })
}

/// Validates a JSON document with the registry, then stores it as a whole.
pub fn import_document<R>(
    repo: &R,
    registry: &ImportersRegistry,
    raw: &str,
) -> ServiceResult<ImportSummary>
where
    R: RelationReader + PropertyReader + CustomFieldReader + FilterReader + ConfigWriter + ?Sized,
{
    let document = ConfigDocument::from_json(raw)?;
    let mut validated = ValidatedData::load(repo)?;
    registry.validate(&document, &mut validated)?;
    repo.save_config(&mut |store: &mut dyn ConfigStore| registry.save(&validated, store))?;
    let summary = ImportSummary::from(&validated.import);
    log::info!("Configuration imported: {summary:?}");
    Ok(summary)
}

pub fn export_config<R>(repo: &R, user: &User) -> ServiceResult<String>
where
    R: RelationReader + PropertyReader + CustomFieldReader + FilterReader + ?Sized,
{
    ensure_admin(user)?;
    Ok(export_document(repo)?.to_json()?)
}

pub fn import_config<R>(repo: &R, user: &User, raw: &str) -> ServiceResult<ImportSummary>
where
    R: RelationReader + PropertyReader + CustomFieldReader + FilterReader + ConfigWriter + ?Sized,
{
    ensure_admin(user)?;
    import_document(repo, &ImportersRegistry::with_defaults(), raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::custom_field::CustomFieldType;
    use crate::domain::custom_form::{FormDescriptor, FormGroup, FormType};
    use crate::domain::entity_filter::ConditionRow;

    fn empty() -> ValidatedData {
        ValidatedData::new(FilterCatalog::default(), CellCatalog::default(), Vec::new())
    }

    fn subfilter_row(filter_id: &str) -> ConditionRow {
        FilterCondition::Subfilter {
            filter_id: filter_id.to_string(),
        }
        .to_row()
        .expect("serializable condition")
    }

    fn filter_data(id: &str, conditions: Vec<ConditionRow>) -> EntityFilterData {
        EntityFilterData {
            id: id.into(),
            name: id.into(),
            entity_kind: EntityKind::Contact,
            use_or: false,
            conditions,
        }
    }

    struct Named(&'static str, &'static [&'static str]);

    impl Importer for Named {
        fn data_id(&self) -> &'static str {
            self.0
        }

        fn dependencies(&self) -> &'static [&'static str] {
            self.1
        }

        fn validate(&self, _: &ConfigDocument, _: &mut ValidatedData) -> Result<(), ImportError> {
            Ok(())
        }

        fn save(&self, _: &ValidatedData, store: &mut dyn ConfigStore) -> RepositoryResult<()> {
            store.store_custom_form(&CustomFormItem {
                descriptor_id: format!("{}-form", self.0),
                groups: Vec::new(),
            })
        }
    }

    /// Writes nothing, remembering what it was asked to store.
    #[derive(Default)]
    struct RecordingStore(Vec<String>);

    impl ConfigStore for RecordingStore {
        fn upsert_property_type(&mut self, data: &PropertyTypeData) -> RepositoryResult<()> {
            self.0.push(format!("property_type:{}", data.text));
            Ok(())
        }

        fn upsert_relation_type_pair(&mut self, data: &RelationTypeData) -> RepositoryResult<()> {
            self.0.push(format!("relation_type:{}", data.id));
            Ok(())
        }

        fn insert_custom_field(&mut self, data: &CustomFieldData) -> RepositoryResult<bool> {
            self.0.push(format!("custom_field:{}", data.name));
            Ok(true)
        }

        fn store_header_filter(&mut self, filter: &HeaderFilter) -> RepositoryResult<()> {
            self.0.push(format!("header_filter:{}", filter.id));
            Ok(())
        }

        fn store_entity_filter(&mut self, filter: &EntityFilter) -> RepositoryResult<()> {
            self.0.push(format!("entity_filter:{}", filter.id));
            Ok(())
        }

        fn store_custom_form(&mut self, form: &CustomFormItem) -> RepositoryResult<()> {
            self.0.push(format!("custom_form:{}", form.descriptor_id));
            Ok(())
        }
    }

    #[test]
    fn default_importers_run_after_their_dependencies() {
        let registry = ImportersRegistry::with_defaults();
        let order: Vec<_> = registry
            .sorted()
            .expect("no cycle")
            .into_iter()
            .map(|importer| importer.data_id())
            .collect();
        let position = |id| order.iter().position(|known| *known == id).expect("registered");
        assert!(position("property_types") < position("relation_types"));
        assert!(position("relation_types") < position("entity_filters"));
        assert!(position("custom_fields") < position("custom_forms"));
        assert!(position("custom_fields") < position("header_filters"));
    }

    #[test]
    fn registered_importers_save_after_their_dependencies() {
        let mut document = ConfigDocument::default();
        document.property_types.push(PropertyTypeData {
            uuid: PublicId::new(),
            text: "is a bounty hunter".into(),
            subject_kinds: vec![EntityKind::Contact],
        });
        document.custom_fields.push(CustomFieldData {
            uuid: PublicId::new(),
            name: "Ship".into(),
            entity_kind: EntityKind::Contact,
            field_type: CustomFieldType::String,
            is_required: false,
            choices: vec![],
        });
        let mut registry = ImportersRegistry::new();
        registry.register(Named("reports", &["custom_fields"]));
        registry.register(CustomFieldsImporter);
        registry.register(PropertyTypesImporter);

        let mut validated = empty();
        registry.validate(&document, &mut validated).expect("valid document");
        let mut store = RecordingStore::default();
        registry.save(&validated, &mut store).expect("saved");

        let position = |entry: &str| store.0.iter().position(|known| known == entry);
        assert_eq!(store.0.len(), 3);
        assert!(position("custom_field:Ship") < position("custom_form:reports-form"));
        assert!(position("property_type:is a bounty hunter").is_some());
    }

    #[test]
    fn unknown_dependencies_are_rejected() {
        let mut registry = ImportersRegistry::new();
        registry.register(Named("reports", &["graphs"]));
        assert!(matches!(
            registry.validate(&ConfigDocument::default(), &mut empty()),
            Err(ImportError::Dependence(DependenceError::Unknown { .. }))
        ));
    }

    #[test]
    fn filters_can_use_relation_types_of_the_same_file() {
        let mut document = ConfigDocument::default();
        document.relation_types.push(RelationTypeData {
            id: "creme_config-subject_userrelationtype_1".into(),
            symmetric_id: "creme_config-object_userrelationtype_1".into(),
            subject: RelationSideData {
                predicate: "owes money to".into(),
                kinds: vec![EntityKind::Contact],
                properties: vec![],
                is_copiable: false,
            },
            object: RelationSideData {
                predicate: "is owed money by".into(),
                kinds: vec![],
                properties: vec![],
                is_copiable: false,
            },
        });
        let relation = FilterCondition::Relation {
            type_id: "creme_config-subject_userrelationtype_1".into(),
            has: true,
            entity_id: None,
            entity_kind: None,
        }
        .to_row()
        .expect("serializable condition");
        // The parent comes first in the file.
        document.entity_filters.push(filter_data("debtors-of-debtors", vec![subfilter_row("debtors")]));
        document.entity_filters.push(filter_data("debtors", vec![relation]));

        let mut validated = empty();
        ImportersRegistry::with_defaults()
            .validate(&document, &mut validated)
            .expect("valid document");
        let ids: Vec<_> = validated
            .import
            .entity_filters
            .iter()
            .map(|filter| filter.id.as_str())
            .collect();
        assert_eq!(ids, vec!["debtors", "debtors-of-debtors"]);
        assert_eq!(validated.import.relation_types.len(), 1);
    }

    #[test]
    fn filter_cycles_inside_the_file_fail() {
        let mut document = ConfigDocument::default();
        document.entity_filters.push(filter_data("a", vec![subfilter_row("b")]));
        document.entity_filters.push(filter_data("b", vec![subfilter_row("a")]));
        assert!(matches!(
            ImportersRegistry::with_defaults().validate(&document, &mut empty()),
            Err(ImportError::Dependence(DependenceError::Cycle(_)))
        ));
    }

    #[test]
    fn forms_can_use_imported_custom_fields() {
        let uuid = PublicId::new();
        let mut document = ConfigDocument::default();
        document.custom_fields.push(CustomFieldData {
            uuid,
            name: "Ship".into(),
            entity_kind: EntityKind::Contact,
            field_type: CustomFieldType::String,
            is_required: false,
            choices: vec![],
        });
        document.custom_forms.push(CustomFormData {
            descriptor_id: FormDescriptor::new(EntityKind::Contact, FormType::Edition).id(),
            groups: vec![FormGroup {
                name: "Crew".into(),
                cells: vec![Cell::RegularField("last_name".into()), Cell::CustomField(uuid)],
            }],
        });

        let mut validated = empty();
        ImportersRegistry::with_defaults()
            .validate(&document, &mut validated)
            .expect("valid document");
        assert_eq!(ImportSummary::from(&validated.import).custom_forms, 1);

        let mut document = document.clone();
        document.custom_fields.clear();
        assert!(
            ImportersRegistry::with_defaults()
                .validate(&document, &mut empty())
                .is_err()
        );
    }

    #[test]
    fn choices_need_a_choice_field() {
        let mut document = ConfigDocument::default();
        document.custom_fields.push(CustomFieldData {
            uuid: PublicId::new(),
            name: "Ship".into(),
            entity_kind: EntityKind::Contact,
            field_type: CustomFieldType::String,
            is_required: false,
            choices: vec!["Bebop".into()],
        });
        assert!(matches!(
            ImportersRegistry::with_defaults().validate(&document, &mut empty()),
            Err(ImportError::Invalid {
                data_id: "custom_fields",
                ..
            })
        ));
    }
}
