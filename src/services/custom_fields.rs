//! Administration of custom fields and their choices.

use crate::domain::custom_field::{
    CustomField, CustomFieldEnumValue, CustomFieldError, NewCustomField, check_unique_name,
};
use crate::domain::entity::EntityKind;
use crate::domain::types::CustomFieldId;
use crate::domain::user::User;
use crate::repository::{CustomFieldReader, CustomFieldWriter};
use crate::services::users::ensure_admin;
use crate::services::{ServiceError, ServiceResult};

/// Custom fields of `kind`, deleted ones included, in creation order.
pub fn list_custom_fields<R>(repo: &R, kind: Option<EntityKind>) -> ServiceResult<Vec<CustomField>>
where
    R: CustomFieldReader + ?Sized,
{
    Ok(repo
        .list_custom_fields()?
        .into_iter()
        .filter(|field| kind.is_none_or(|kind| field.kind == kind))
        .collect())
}

pub fn get_custom_field<R>(repo: &R, id: CustomFieldId) -> ServiceResult<CustomField>
where
    R: CustomFieldReader + ?Sized,
{
    repo.get_custom_field(id)?.ok_or(ServiceError::NotFound)
}

pub fn create_custom_field<R>(
    repo: &R,
    user: &User,
    field: NewCustomField,
) -> ServiceResult<CustomField>
where
    R: CustomFieldReader + CustomFieldWriter + ?Sized,
{
    ensure_admin(user)?;
    check_unique_name(&field.name, field.kind, None, &repo.list_custom_fields()?)?;
    let created = repo.create_custom_field(&field)?;
    log::info!(
        "Custom field \"{}\" created on {}",
        created.name,
        created.kind.verbose_name()
    );
    Ok(created)
}

/// First call hides the field; a second call removes it with its values.
///
/// Returns true when the field was removed for good.
pub fn delete_custom_field<R>(repo: &R, user: &User, id: CustomFieldId) -> ServiceResult<bool>
where
    R: CustomFieldReader + CustomFieldWriter + ?Sized,
{
    ensure_admin(user)?;
    let field = get_custom_field(repo, id)?;
    if field.is_deleted {
        repo.delete_custom_field(id)?;
        log::info!("Custom field \"{}\" removed", field.name);
        Ok(true)
    } else {
        repo.set_custom_field_deleted(id, true)?;
        log::info!("Custom field \"{}\" marked as deleted", field.name);
        Ok(false)
    }
}

/// Brings a deleted field back unless a live field took its name meanwhile.
pub fn restore_custom_field<R>(repo: &R, user: &User, id: CustomFieldId) -> ServiceResult<()>
where
    R: CustomFieldReader + CustomFieldWriter + ?Sized,
{
    ensure_admin(user)?;
    let field = get_custom_field(repo, id)?;
    if !field.is_deleted {
        return Ok(());
    }
    check_unique_name(&field.name, field.kind, Some(id), &repo.list_custom_fields()?)?;
    repo.set_custom_field_deleted(id, false)?;
    Ok(())
}

pub fn list_choices<R>(repo: &R, id: CustomFieldId) -> ServiceResult<Vec<CustomFieldEnumValue>>
where
    R: CustomFieldReader + ?Sized,
{
    Ok(repo
        .list_enum_values()?
        .into_iter()
        .filter(|choice| choice.custom_field_id == id)
        .collect())
}

/// Adds a choice to an `Enum`/`MultiEnum` field.
pub fn add_choice<R>(
    repo: &R,
    user: &User,
    id: CustomFieldId,
    value: &str,
) -> ServiceResult<CustomFieldEnumValue>
where
    R: CustomFieldReader + CustomFieldWriter + ?Sized,
{
    ensure_admin(user)?;
    let field = get_custom_field(repo, id)?;
    if !field.field_type.has_choices() {
        return Err(CustomFieldError::NotAChoiceField.into());
    }
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::Form("a choice cannot be empty".to_string()));
    }
    if list_choices(repo, id)?
        .iter()
        .any(|choice| choice.value.eq_ignore_ascii_case(value))
    {
        return Err(ServiceError::Conflict(format!("\"{value}\" is already a choice")));
    }
    Ok(repo.add_enum_value(id, value)?)
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use super::*;
    use crate::domain::custom_field::CustomFieldType;
    use crate::domain::types::{EnumValueId, PublicId};
    use crate::repository::mock::MockRepository;
    use crate::services::users::test_support::{admin_auth, user_from, viewer_auth};

    fn field(id: i32, name: &str, is_deleted: bool) -> CustomField {
        CustomField {
            id: CustomFieldId::new(id).expect("valid id"),
            uuid: PublicId::new(),
            name: name.to_string(),
            kind: EntityKind::Contact,
            field_type: CustomFieldType::Enum,
            is_required: false,
            is_deleted,
        }
    }

    fn new_field(name: &str) -> NewCustomField {
        NewCustomField {
            uuid: PublicId::new(),
            name: name.to_string(),
            kind: EntityKind::Contact,
            field_type: CustomFieldType::String,
            is_required: false,
            choices: vec![],
        }
    }

    #[test]
    fn names_are_unique_per_kind() {
        let admin = user_from(&admin_auth(), 1);
        let mut repo = MockRepository::new();
        repo.expect_list_custom_fields()
            .returning(|| Ok(vec![field(1, "Ship", false)]));
        repo.expect_create_custom_field().never();

        assert!(matches!(
            create_custom_field(&repo, &admin, new_field(" ship ")),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn viewers_cannot_create_fields() {
        let viewer = user_from(&viewer_auth(), 2);
        let repo = MockRepository::new();
        assert!(matches!(
            create_custom_field(&repo, &viewer, new_field("Ship")),
            Err(ServiceError::Unauthorized)
        ));
    }

    #[test]
    fn deletion_takes_two_steps() {
        let admin = user_from(&admin_auth(), 1);
        let mut repo = MockRepository::new();
        repo.expect_get_custom_field()
            .returning(|id| Ok(Some(field(id.get(), "Ship", id.get() == 2))));
        repo.expect_set_custom_field_deleted()
            .times(1)
            .returning(|_, _| Ok(()));
        repo.expect_delete_custom_field().times(1).returning(|_| Ok(()));

        let live = CustomFieldId::new(1).expect("valid id");
        let deleted = CustomFieldId::new(2).expect("valid id");
        assert!(!delete_custom_field(&repo, &admin, live).expect("hidden"));
        assert!(delete_custom_field(&repo, &admin, deleted).expect("removed"));
    }

    #[test]
    fn restore_fails_when_the_name_was_taken() {
        let admin = user_from(&admin_auth(), 1);
        let mut repo = MockRepository::new();
        repo.expect_get_custom_field()
            .returning(|_| Ok(Some(field(2, "Ship", true))));
        repo.expect_list_custom_fields()
            .returning(|| Ok(vec![field(2, "Ship", true), field(3, "SHIP", false)]));
        repo.expect_set_custom_field_deleted().never();

        let id = CustomFieldId::new(2).expect("valid id");
        assert!(restore_custom_field(&repo, &admin, id).is_err());
    }

    #[test]
    fn duplicate_choices_are_refused() {
        let admin = user_from(&admin_auth(), 1);
        let mut repo = MockRepository::new();
        repo.expect_get_custom_field()
            .returning(|_| Ok(Some(field(1, "Ship", false))));
        repo.expect_list_enum_values().returning(|| {
            Ok(vec![CustomFieldEnumValue {
                id: EnumValueId::new(1).expect("valid id"),
                uuid: PublicId::new(),
                custom_field_id: CustomFieldId::new(1).expect("valid id"),
                value: "Bebop".into(),
            }])
        });
        repo.expect_add_enum_value().never();

        let id = CustomFieldId::new(1).expect("valid id");
        assert!(matches!(
            add_choice(&repo, &admin, id, "bebop"),
            Err(ServiceError::Conflict(_))
        ));
    }
}
