//! Repository implementation for custom fields and their values.

use std::collections::HashMap;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::{
    domain::{
        custom_field::{
            CustomField, CustomFieldEnumValue, CustomFieldType, CustomValue, NewCustomField,
        },
        types::{CustomFieldId, EntityId, EnumValueId, PublicId},
    },
    models::custom_field::{
        CustomField as DbCustomField, CustomFieldValue as DbCustomFieldValue,
        EnumValue as DbEnumValue, MultiEnumValue as DbMultiEnumValue,
        NewCustomField as DbNewCustomField, NewEnumValue as DbNewEnumValue,
    },
    repository::{
        CustomFieldReader, CustomFieldWriter, DieselRepository,
        errors::{RepositoryError, RepositoryResult},
    },
};

/// Stored custom values of the given entities, as `(entity id, field, value)`.
pub(crate) fn load_custom_values(
    conn: &mut SqliteConnection,
    entity_ids: &[i32],
) -> RepositoryResult<Vec<(i32, CustomField, CustomValue)>> {
    use crate::schema::{custom_field_multi_enum, custom_field_values, custom_fields};

    let fields = custom_fields::table
        .load::<DbCustomField>(conn)?
        .into_iter()
        .map(|field| Ok((field.id, CustomField::try_from(field)?)))
        .collect::<RepositoryResult<HashMap<i32, CustomField>>>()?;

    let mut values = Vec::new();

    let rows = custom_field_values::table
        .filter(custom_field_values::entity_id.eq_any(entity_ids))
        .load::<DbCustomFieldValue>(conn)?;
    for row in rows {
        let Some(field) = fields.get(&row.custom_field_id) else {
            continue;
        };
        if let Some(value) = row.to_domain(field.field_type)? {
            values.push((row.entity_id, field.clone(), value));
        }
    }

    let mut choices: HashMap<(i32, i32), Vec<EnumValueId>> = HashMap::new();
    let rows = custom_field_multi_enum::table
        .filter(custom_field_multi_enum::entity_id.eq_any(entity_ids))
        .order(custom_field_multi_enum::enum_value_id.asc())
        .load::<DbMultiEnumValue>(conn)?;
    for row in rows {
        choices
            .entry((row.entity_id, row.custom_field_id))
            .or_default()
            .push(EnumValueId::new(row.enum_value_id)?);
    }
    for ((entity_id, field_id), ids) in choices {
        if let Some(field) = fields.get(&field_id) {
            values.push((entity_id, field.clone(), CustomValue::MultiEnum(ids)));
        }
    }

    Ok(values)
}

/// Inserts a field with its choices.
pub(crate) fn insert_custom_field(
    conn: &mut SqliteConnection,
    field: &NewCustomField,
) -> RepositoryResult<CustomField> {
    use crate::schema::{custom_field_enum_values, custom_fields};

    let new_field = DbNewCustomField {
        uuid: field.uuid.to_string(),
        name: &field.name,
        kind: field.kind.as_str(),
        field_type: field.field_type.code(),
        is_required: field.is_required,
    };
    let stored = diesel::insert_into(custom_fields::table)
        .values(&new_field)
        .get_result::<DbCustomField>(conn)?;

    if field.field_type.has_choices() {
        let choices = field
            .choices
            .iter()
            .map(|value| DbNewEnumValue {
                uuid: PublicId::new().to_string(),
                custom_field_id: stored.id,
                value: value.as_str(),
            })
            .collect::<Vec<_>>();
        diesel::insert_into(custom_field_enum_values::table)
            .values(&choices)
            .execute(conn)?;
    }

    Ok(CustomField::try_from(stored)?)
}

impl CustomFieldReader for DieselRepository {
    fn list_custom_fields(&self) -> RepositoryResult<Vec<CustomField>> {
        use crate::schema::custom_fields;

        let mut conn = self.conn()?;
        custom_fields::table
            .order(custom_fields::id.asc())
            .load::<DbCustomField>(&mut conn)?
            .into_iter()
            .map(|field| CustomField::try_from(field).map_err(RepositoryError::from))
            .collect()
    }

    fn get_custom_field(&self, id: CustomFieldId) -> RepositoryResult<Option<CustomField>> {
        use crate::schema::custom_fields;

        let mut conn = self.conn()?;
        let field = custom_fields::table
            .find(id.get())
            .first::<DbCustomField>(&mut conn)
            .optional()?;

        field
            .map(CustomField::try_from)
            .transpose()
            .map_err(RepositoryError::from)
    }

    fn list_enum_values(&self) -> RepositoryResult<Vec<CustomFieldEnumValue>> {
        use crate::schema::custom_field_enum_values;

        let mut conn = self.conn()?;
        custom_field_enum_values::table
            .order(custom_field_enum_values::id.asc())
            .load::<DbEnumValue>(&mut conn)?
            .into_iter()
            .map(|value| CustomFieldEnumValue::try_from(value).map_err(RepositoryError::from))
            .collect()
    }

    fn get_custom_values(
        &self,
        entity_id: EntityId,
    ) -> RepositoryResult<HashMap<CustomFieldId, CustomValue>> {
        let mut conn = self.conn()?;
        Ok(load_custom_values(&mut conn, &[entity_id.get()])?
            .into_iter()
            .map(|(_, field, value)| (field.id, value))
            .collect())
    }
}

impl CustomFieldWriter for DieselRepository {
    fn create_custom_field(&self, field: &NewCustomField) -> RepositoryResult<CustomField> {
        let mut conn = self.conn()?;
        conn.transaction::<_, RepositoryError, _>(|conn| insert_custom_field(conn, field))
    }

    fn set_custom_field_deleted(&self, id: CustomFieldId, deleted: bool) -> RepositoryResult<()> {
        use crate::schema::custom_fields;

        let mut conn = self.conn()?;
        let affected = diesel::update(custom_fields::table.find(id.get()))
            .set(custom_fields::is_deleted.eq(deleted))
            .execute(&mut conn)?;

        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn delete_custom_field(&self, id: CustomFieldId) -> RepositoryResult<()> {
        use crate::schema::custom_fields;

        let mut conn = self.conn()?;
        diesel::delete(custom_fields::table.find(id.get())).execute(&mut conn)?;
        Ok(())
    }

    fn add_enum_value(
        &self,
        field_id: CustomFieldId,
        value: &str,
    ) -> RepositoryResult<CustomFieldEnumValue> {
        use crate::schema::custom_field_enum_values;

        let mut conn = self.conn()?;
        let new_value = DbNewEnumValue {
            uuid: PublicId::new().to_string(),
            custom_field_id: field_id.get(),
            value,
        };
        let stored = diesel::insert_into(custom_field_enum_values::table)
            .values(&new_value)
            .get_result::<DbEnumValue>(&mut conn)?;

        CustomFieldEnumValue::try_from(stored).map_err(RepositoryError::from)
    }

    fn set_custom_value(
        &self,
        field: &CustomField,
        entity_id: EntityId,
        value: Option<CustomValue>,
    ) -> RepositoryResult<()> {
        use crate::schema::{custom_field_multi_enum, custom_field_values};

        let mut conn = self.conn()?;
        let field_id = field.id.get();
        let raw_entity_id = entity_id.get();

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::delete(
                custom_field_values::table
                    .filter(custom_field_values::custom_field_id.eq(field_id))
                    .filter(custom_field_values::entity_id.eq(raw_entity_id)),
            )
            .execute(conn)?;
            diesel::delete(
                custom_field_multi_enum::table
                    .filter(custom_field_multi_enum::custom_field_id.eq(field_id))
                    .filter(custom_field_multi_enum::entity_id.eq(raw_entity_id)),
            )
            .execute(conn)?;

            match (&value, field.field_type) {
                (None, _) => {}
                (Some(CustomValue::MultiEnum(ids)), CustomFieldType::MultiEnum) => {
                    let rows = ids
                        .iter()
                        .map(|id| DbMultiEnumValue {
                            custom_field_id: field_id,
                            entity_id: raw_entity_id,
                            enum_value_id: id.get(),
                        })
                        .collect::<Vec<_>>();
                    diesel::insert_into(custom_field_multi_enum::table)
                        .values(&rows)
                        .execute(conn)?;
                }
                (Some(value), _) => {
                    let row = DbCustomFieldValue::from_domain(field_id, raw_entity_id, value);
                    diesel::insert_into(custom_field_values::table)
                        .values(&row)
                        .execute(conn)?;
                }
            }
            Ok(())
        })?;

        Ok(())
    }
}
