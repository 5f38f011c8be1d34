//! Transactional store behind configuration imports.

use std::collections::HashMap;

use diesel::{prelude::*, upsert::excluded};
use diesel::sqlite::SqliteConnection;

use crate::{
    domain::{
        config_transfer::{CustomFieldData, PropertyTypeData, RelationSideData, RelationTypeData},
        custom_field::NewCustomField,
        custom_form::CustomFormItem,
        entity::EntityKind,
        entity_filter::EntityFilter,
        header_filter::HeaderFilter,
        relation::RelationType,
        types::{PropertyTypeId, PublicId},
    },
    models::relation::{NewPropertyType as DbNewPropertyType, RelationType as DbRelationType},
    repository::{
        ConfigStore, ConfigWriter, DieselRepository,
        custom_field::insert_custom_field,
        errors::{RepositoryError, RepositoryResult},
        filters::{store_custom_form, store_entity_filter, store_header_filter},
    },
};

fn upsert_property_type(
    conn: &mut SqliteConnection,
    data: &PropertyTypeData,
) -> RepositoryResult<()> {
    use crate::schema::property_types;

    let row = DbNewPropertyType {
        uuid: data.uuid.to_string(),
        text: &data.text,
        subject_kinds: EntityKind::join_list(&data.subject_kinds),
        is_custom: true,
    };
    diesel::insert_into(property_types::table)
        .values(&row)
        .on_conflict(property_types::uuid)
        .do_update()
        .set((
            property_types::text.eq(excluded(property_types::text)),
            property_types::subject_kinds.eq(excluded(property_types::subject_kinds)),
        ))
        .execute(conn)?;
    Ok(())
}

fn property_ids(
    ids_by_uuid: &HashMap<String, i32>,
    uuids: &[PublicId],
) -> RepositoryResult<Vec<PropertyTypeId>> {
    uuids
        .iter()
        .map(|uuid| {
            let id = ids_by_uuid.get(&uuid.to_string()).ok_or_else(|| {
                RepositoryError::ValidationError(format!("unknown property type {uuid}"))
            })?;
            Ok(PropertyTypeId::new(*id)?)
        })
        .collect()
}

fn relation_side(
    id: &str,
    symmetric_id: &str,
    side: &RelationSideData,
    other: &RelationSideData,
    ids_by_uuid: &HashMap<String, i32>,
) -> RepositoryResult<RelationType> {
    Ok(RelationType {
        id: id.to_string(),
        symmetric_type_id: symmetric_id.to_string(),
        predicate: side.predicate.clone(),
        subject_kinds: side.kinds.clone(),
        object_kinds: other.kinds.clone(),
        subject_properties: property_ids(ids_by_uuid, &side.properties)?,
        is_custom: true,
        is_internal: false,
        enabled: true,
        is_copiable: side.is_copiable,
    })
}

fn upsert_relation_pair(conn: &mut SqliteConnection, data: &RelationTypeData) -> RepositoryResult<()> {
    use crate::schema::{property_types, relation_types};

    let ids_by_uuid = property_types::table
        .select((property_types::uuid, property_types::id))
        .load::<(String, i32)>(conn)?
        .into_iter()
        .collect::<HashMap<_, _>>();
    let ids_by_uuid = &ids_by_uuid;
    let rows = [
        relation_side(&data.id, &data.symmetric_id, &data.subject, &data.object, ids_by_uuid)?,
        relation_side(&data.symmetric_id, &data.id, &data.object, &data.subject, ids_by_uuid)?,
    ];
    for rtype in &rows {
        diesel::insert_into(relation_types::table)
            .values(&DbRelationType::from(rtype))
            .on_conflict(relation_types::id)
            .do_update()
            .set((
                relation_types::symmetric_type_id.eq(excluded(relation_types::symmetric_type_id)),
                relation_types::predicate.eq(excluded(relation_types::predicate)),
                relation_types::subject_kinds.eq(excluded(relation_types::subject_kinds)),
                relation_types::object_kinds.eq(excluded(relation_types::object_kinds)),
                relation_types::subject_properties.eq(excluded(relation_types::subject_properties)),
                relation_types::is_copiable.eq(excluded(relation_types::is_copiable)),
            ))
            .execute(conn)?;
    }
    Ok(())
}

struct DieselConfigStore<'a> {
    conn: &'a mut SqliteConnection,
}

impl ConfigStore for DieselConfigStore<'_> {
    fn upsert_property_type(&mut self, data: &PropertyTypeData) -> RepositoryResult<()> {
        upsert_property_type(self.conn, data)
    }

    fn upsert_relation_type_pair(&mut self, data: &RelationTypeData) -> RepositoryResult<()> {
        upsert_relation_pair(self.conn, data)
    }

    fn insert_custom_field(&mut self, data: &CustomFieldData) -> RepositoryResult<bool> {
        use crate::schema::custom_fields;

        let exists = custom_fields::table
            .filter(custom_fields::uuid.eq(data.uuid.to_string()))
            .count()
            .get_result::<i64>(self.conn)?
            > 0;
        if exists {
            return Ok(false);
        }
        insert_custom_field(
            self.conn,
            &NewCustomField {
                uuid: data.uuid,
                name: data.name.clone(),
                kind: data.entity_kind,
                field_type: data.field_type,
                is_required: data.is_required,
                choices: data.choices.clone(),
            },
        )?;
        Ok(true)
    }

    fn store_header_filter(&mut self, filter: &HeaderFilter) -> RepositoryResult<()> {
        store_header_filter(self.conn, filter)
    }

    fn store_entity_filter(&mut self, filter: &EntityFilter) -> RepositoryResult<()> {
        store_entity_filter(self.conn, filter)
    }

    fn store_custom_form(&mut self, form: &CustomFormItem) -> RepositoryResult<()> {
        store_custom_form(self.conn, form)
    }
}

impl ConfigWriter for DieselRepository {
    fn save_config(
        &self,
        save: &mut dyn FnMut(&mut dyn ConfigStore) -> RepositoryResult<()>,
    ) -> RepositoryResult<()> {
        let mut conn = self.conn()?;
        conn.transaction::<_, RepositoryError, _>(|conn| save(&mut DieselConfigStore { conn }))
    }
}
