//! CSV mass import of contacts and organisations.

use crate::domain::custom_field::{CustomField, CustomValue, normalize_name};
use crate::domain::entity::EntityKind;
use crate::domain::entity_data::EntityData;
use crate::domain::fields::{EntityFields, FieldDescriptor, all_fields, kind_fields};
use crate::domain::user::User;
use crate::dto::entities::ImportReport;
use crate::forms::import::CsvTable;
use crate::repository::{CustomFieldReader, CustomFieldWriter, EntityWriter, UserReader};
use crate::services::entities::{FormChanges, assign_field, store_new_entity};
use crate::services::filters::live_custom_fields;
use crate::services::{ServiceError, ServiceResult};

/// Destination of one CSV column.
enum Column {
    Field(&'static FieldDescriptor),
    Custom(CustomField),
    Ignored,
}

fn resolve_columns(kind: EntityKind, headers: &[String], custom_fields: &[CustomField]) -> Vec<Column> {
    headers
        .iter()
        .map(|header| {
            let key = normalize_name(header);
            if let Some(field) = all_fields(kind).find(|field| {
                field.editable
                    && (field.name == key || normalize_name(field.verbose_name) == key)
            }) {
                return Column::Field(field);
            }
            custom_fields
                .iter()
                .find(|field| normalize_name(&field.name) == key)
                .map_or(Column::Ignored, |field| Column::Custom(field.clone()))
        })
        .collect()
}

fn import_row<R>(
    repo: &R,
    user: &User,
    kind: EntityKind,
    columns: &[Column],
    row: &[String],
) -> ServiceResult<()>
where
    R: UserReader + CustomFieldReader + CustomFieldWriter + EntityWriter + ?Sized,
{
    let mut data = EntityData::blank(kind).ok_or(ServiceError::NotFound)?;
    let mut changes = FormChanges::default();
    let choices = repo.list_enum_values()?;
    let mut custom_values: Vec<(&CustomField, CustomValue)> = Vec::new();

    for (column, raw) in columns.iter().zip(row) {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match column {
            Column::Field(field) => {
                let value = field
                    .field_type
                    .parse_value(raw)
                    .map_err(|err| ServiceError::Form(format!("{}: {err}", field.verbose_name)))?;
                assign_field(repo, field, value, &mut data, &mut changes)?;
            }
            Column::Custom(field) => {
                if let Some(value) = field.parse_value(&[raw.to_string()], &choices)? {
                    custom_values.push((field, value));
                }
            }
            Column::Ignored => {}
        }
    }

    let values = data.field_values();
    for field in kind_fields(kind).iter().filter(|field| field.required) {
        let missing = values
            .iter()
            .find(|(name, _)| *name == field.name)
            .is_none_or(|(_, value)| value.is_empty());
        if missing {
            return Err(ServiceError::Form(format!(
                "{}: this field is required",
                field.verbose_name
            )));
        }
    }

    let owner = changes.owner.unwrap_or(user.id);
    let description = changes.description.unwrap_or_default();
    let entity = store_new_entity(repo, owner, kind, &data, &description)?;
    for (field, value) in custom_values {
        repo.set_custom_value(field, entity.id(), Some(value))?;
    }
    Ok(())
}

/// Creates one contact or organisation per CSV row.
///
/// Columns are matched on field names or labels, then on custom field names.
/// Invalid rows are reported and skipped.
pub fn import_csv<R>(
    repo: &R,
    user: &User,
    kind: EntityKind,
    table: &CsvTable,
) -> ServiceResult<ImportReport>
where
    R: UserReader + CustomFieldReader + CustomFieldWriter + EntityWriter + ?Sized,
{
    if !matches!(kind, EntityKind::Contact | EntityKind::Organisation) {
        return Err(ServiceError::Form(format!(
            "{} cannot be imported",
            kind.verbose_name()
        )));
    }
    let custom_fields = live_custom_fields(repo, kind)?;
    let columns = resolve_columns(kind, &table.headers, &custom_fields);

    let mut report = ImportReport {
        ignored_columns: table
            .headers
            .iter()
            .zip(&columns)
            .filter(|(_, column)| matches!(column, Column::Ignored))
            .map(|(header, _)| header.clone())
            .collect(),
        ..ImportReport::default()
    };
    for (index, row) in table.rows.iter().enumerate() {
        match import_row(repo, user, kind, &columns, row) {
            Ok(()) => report.created += 1,
            Err(err) => report.errors.push((index + 1, err.to_string())),
        }
    }
    log::info!(
        "CSV import of {}: {} created, {} rejected",
        kind.verbose_name(),
        report.created,
        report.errors.len()
    );
    Ok(report)
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use super::*;
    use crate::domain::custom_field::CustomFieldType;
    use crate::domain::entity_data::AnyEntity;
    use crate::domain::types::{CustomFieldId, PublicId};
    use crate::repository::mock::MockRepository;
    use crate::services::users::test_support::{base, user_from, viewer_auth};

    fn ship_field() -> CustomField {
        CustomField {
            id: CustomFieldId::new(1).expect("valid id"),
            uuid: PublicId::new(),
            name: "Ship".into(),
            kind: EntityKind::Contact,
            field_type: CustomFieldType::String,
            is_required: false,
            is_deleted: false,
        }
    }

    #[test]
    fn rows_are_imported_with_custom_columns() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_list_custom_fields()
            .returning(|| Ok(vec![ship_field()]));
        repo.expect_list_enum_values().returning(|| Ok(vec![]));
        repo.expect_create_entity().times(2).returning(|new, data| {
            Ok(AnyEntity {
                base: base(10, new.kind, new.user_id.get(), &new.header_filter_search_field),
                data: data.clone(),
            })
        });
        repo.expect_set_custom_value()
            .withf(|field, _, value| {
                field.name == "Ship" && *value == Some(CustomValue::Text("Bebop".into()))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let table = CsvTable::from_reader(
            "Last name,first_name,ship,Favourite food\nSpiegel,Spike,Bebop,Beef\n,Faye,,\nBlack,Jet,,\n"
                .as_bytes(),
        )
        .expect("valid csv");
        let report = import_csv(&repo, &user, EntityKind::Contact, &table).expect("import");

        assert_eq!(report.created, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].0, 2);
        assert_eq!(report.ignored_columns, vec!["Favourite food"]);
    }

    #[test]
    fn only_persons_can_be_imported() {
        let user = user_from(&viewer_auth(), 2);
        let repo = MockRepository::new();
        let table = CsvTable::from_reader("name\nParty\n".as_bytes()).expect("valid csv");
        assert!(import_csv(&repo, &user, EntityKind::Event, &table).is_err());
    }
}
