//! User-defined fields added to an entity kind at runtime.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entity::EntityKind;
use crate::domain::fields::{FieldType, FieldValue};
use crate::domain::types::{CustomFieldId, Decimal2, EnumValueId, PublicId, TypeConstraintError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CustomFieldError {
    #[error("a custom field with this name already exists")]
    DuplicateName,
    #[error("the field \"{0}\" is required")]
    Required(String),
    #[error("invalid value for \"{field}\": {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("unknown choice {0}")]
    UnknownChoice(String),
    #[error("only choice fields have choices")]
    NotAChoiceField,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomFieldType {
    Integer,
    Decimal,
    Boolean,
    String,
    Text,
    Url,
    Date,
    DateTime,
    Enum,
    MultiEnum,
}

impl CustomFieldType {
    pub const ALL: [CustomFieldType; 10] = [
        CustomFieldType::Integer,
        CustomFieldType::Decimal,
        CustomFieldType::Boolean,
        CustomFieldType::String,
        CustomFieldType::Text,
        CustomFieldType::Url,
        CustomFieldType::Date,
        CustomFieldType::DateTime,
        CustomFieldType::Enum,
        CustomFieldType::MultiEnum,
    ];

    pub fn code(self) -> i32 {
        match self {
            CustomFieldType::Integer => 1,
            CustomFieldType::Decimal => 2,
            CustomFieldType::Boolean => 3,
            CustomFieldType::String => 10,
            CustomFieldType::Text => 11,
            CustomFieldType::Url => 12,
            CustomFieldType::DateTime => 20,
            CustomFieldType::Date => 21,
            CustomFieldType::Enum => 100,
            CustomFieldType::MultiEnum => 101,
        }
    }

    pub fn verbose_name(self) -> &'static str {
        match self {
            CustomFieldType::Integer => "Whole number",
            CustomFieldType::Decimal => "Decimal number",
            CustomFieldType::Boolean => "Boolean (2 values: Yes/No)",
            CustomFieldType::String => "Short text",
            CustomFieldType::Text => "Long text",
            CustomFieldType::Url => "URL (link)",
            CustomFieldType::Date => "Date",
            CustomFieldType::DateTime => "Date and time",
            CustomFieldType::Enum => "Choice list",
            CustomFieldType::MultiEnum => "Multiple choice list",
        }
    }

    /// Regular field type with the same filtering behaviour.
    pub fn as_field_type(self) -> FieldType {
        match self {
            CustomFieldType::Integer => FieldType::Integer,
            CustomFieldType::Decimal => FieldType::Decimal,
            CustomFieldType::Boolean => FieldType::Boolean,
            CustomFieldType::String => FieldType::String,
            CustomFieldType::Text => FieldType::Text,
            CustomFieldType::Url => FieldType::Url,
            CustomFieldType::Date => FieldType::Date,
            CustomFieldType::DateTime => FieldType::DateTime,
            CustomFieldType::Enum | CustomFieldType::MultiEnum => FieldType::Reference,
        }
    }

    pub fn has_choices(self) -> bool {
        matches!(self, CustomFieldType::Enum | CustomFieldType::MultiEnum)
    }
}

impl TryFrom<i32> for CustomFieldType {
    type Error = TypeConstraintError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        CustomFieldType::ALL
            .into_iter()
            .find(|field_type| field_type.code() == value)
            .ok_or_else(|| TypeConstraintError::InvalidValue(format!("custom field type {value}")))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CustomField {
    pub id: CustomFieldId,
    pub uuid: PublicId,
    pub name: String,
    pub kind: EntityKind,
    pub field_type: CustomFieldType,
    pub is_required: bool,
    /// Deleted fields are hidden but keep their values until removed for good.
    pub is_deleted: bool,
}

#[derive(Clone, Debug)]
pub struct NewCustomField {
    pub uuid: PublicId,
    pub name: String,
    pub kind: EntityKind,
    pub field_type: CustomFieldType,
    pub is_required: bool,
    pub choices: Vec<String>,
}

/// Key used to compare custom field names.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Checks `name` is not used by another live field of the same kind.
pub fn check_unique_name<'a>(
    name: &str,
    kind: EntityKind,
    exclude: Option<CustomFieldId>,
    existing: impl IntoIterator<Item = &'a CustomField>,
) -> Result<(), CustomFieldError> {
    let key = normalize_name(name);
    let clash = existing.into_iter().any(|field| {
        !field.is_deleted
            && field.kind == kind
            && Some(field.id) != exclude
            && normalize_name(&field.name) == key
    });
    if clash {
        Err(CustomFieldError::DuplicateName)
    } else {
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CustomFieldEnumValue {
    pub id: EnumValueId,
    pub uuid: PublicId,
    pub custom_field_id: CustomFieldId,
    pub value: String,
}

/// Value of a custom field for one entity.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CustomValue {
    Integer(i64),
    Decimal(Decimal2),
    Boolean(bool),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Enum(EnumValueId),
    MultiEnum(Vec<EnumValueId>),
}

impl CustomValue {
    /// Value as seen by filters and list columns; choices are rendered through `choices`.
    pub fn to_field_value(&self) -> FieldValue {
        match self {
            CustomValue::Integer(number) => FieldValue::Integer(*number),
            CustomValue::Decimal(number) => FieldValue::Decimal(*number),
            CustomValue::Boolean(flag) => FieldValue::Boolean(*flag),
            CustomValue::Text(text) => FieldValue::Text(text.clone()),
            CustomValue::Date(date) => FieldValue::Date(*date),
            CustomValue::DateTime(datetime) => FieldValue::DateTime(*datetime),
            CustomValue::Enum(id) => FieldValue::Integer(i64::from(id.get())),
            CustomValue::MultiEnum(ids) => ids
                .first()
                .map_or(FieldValue::Null, |id| FieldValue::Integer(i64::from(id.get()))),
        }
    }

    /// Selected choice ids (empty for non choice values).
    pub fn choice_ids(&self) -> Vec<EnumValueId> {
        match self {
            CustomValue::Enum(id) => vec![*id],
            CustomValue::MultiEnum(ids) => ids.clone(),
            _ => Vec::new(),
        }
    }

    pub fn display(&self, choices: &[CustomFieldEnumValue]) -> String {
        match self {
            CustomValue::Enum(_) | CustomValue::MultiEnum(_) => self
                .choice_ids()
                .iter()
                .filter_map(|id| choices.iter().find(|choice| choice.id == *id))
                .map(|choice| choice.value.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_field_value().to_string(),
        }
    }
}

impl CustomField {
    /// Parses raw input into a value; `None` means "no value".
    ///
    /// Choice fields accept either choice ids or choice labels.
    pub fn parse_value(
        &self,
        raw: &[String],
        choices: &[CustomFieldEnumValue],
    ) -> Result<Option<CustomValue>, CustomFieldError> {
        let values: Vec<&str> = raw
            .iter()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .collect();
        let invalid = |err: TypeConstraintError| CustomFieldError::InvalidValue {
            field: self.name.clone(),
            reason: err.to_string(),
        };

        let Some(first) = values.first().copied() else {
            return Ok(None);
        };

        let value = match self.field_type {
            CustomFieldType::Enum => CustomValue::Enum(self.resolve_choice(first, choices)?),
            CustomFieldType::MultiEnum => {
                let mut ids = values
                    .iter()
                    .map(|value| self.resolve_choice(value, choices))
                    .collect::<Result<Vec<_>, _>>()?;
                ids.sort();
                ids.dedup();
                CustomValue::MultiEnum(ids)
            }
            field_type => match field_type.as_field_type().parse_value(first).map_err(invalid)? {
                FieldValue::Null => return Ok(None),
                FieldValue::Integer(number) => CustomValue::Integer(number),
                FieldValue::Decimal(number) => CustomValue::Decimal(number),
                FieldValue::Boolean(flag) => CustomValue::Boolean(flag),
                FieldValue::Text(text) => CustomValue::Text(text),
                FieldValue::Date(date) => CustomValue::Date(date),
                FieldValue::DateTime(datetime) => CustomValue::DateTime(datetime),
            },
        };
        Ok(Some(value))
    }

    /// Like [`CustomField::parse_value`] but rejects emptiness on required fields.
    pub fn parse_form_value(
        &self,
        raw: &[String],
        choices: &[CustomFieldEnumValue],
    ) -> Result<Option<CustomValue>, CustomFieldError> {
        let value = self.parse_value(raw, choices)?;
        if value.is_none() && self.is_required {
            return Err(CustomFieldError::Required(self.name.clone()));
        }
        Ok(value)
    }

    fn resolve_choice(
        &self,
        raw: &str,
        choices: &[CustomFieldEnumValue],
    ) -> Result<EnumValueId, CustomFieldError> {
        choices
            .iter()
            .filter(|choice| choice.custom_field_id == self.id)
            .find(|choice| {
                choice.id.to_string() == raw || choice.value.eq_ignore_ascii_case(raw)
            })
            .map(|choice| choice.id)
            .ok_or_else(|| CustomFieldError::UnknownChoice(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(field_type: CustomFieldType) -> CustomField {
        CustomField {
            id: CustomFieldId::new(1).expect("valid id"),
            uuid: PublicId::new(),
            name: "Size".into(),
            kind: EntityKind::Contact,
            field_type,
            is_required: false,
            is_deleted: false,
        }
    }

    fn choice(id: i32, value: &str) -> CustomFieldEnumValue {
        CustomFieldEnumValue {
            id: EnumValueId::new(id).expect("valid id"),
            uuid: PublicId::new(),
            custom_field_id: CustomFieldId::new(1).expect("valid id"),
            value: value.into(),
        }
    }

    #[test]
    fn names_are_unique_per_kind_ignoring_case() {
        let existing = vec![field(CustomFieldType::Integer)];
        assert_eq!(
            check_unique_name(" size ", EntityKind::Contact, None, &existing),
            Err(CustomFieldError::DuplicateName)
        );
        assert!(check_unique_name("Size", EntityKind::Organisation, None, &existing).is_ok());
        assert!(check_unique_name("Size", EntityKind::Contact, Some(existing[0].id), &existing).is_ok());

        let mut deleted = existing.clone();
        deleted[0].is_deleted = true;
        assert!(check_unique_name("Size", EntityKind::Contact, None, &deleted).is_ok());
    }

    #[test]
    fn parses_typed_values() {
        let integer = field(CustomFieldType::Integer);
        assert_eq!(
            integer.parse_value(&["12".into()], &[]),
            Ok(Some(CustomValue::Integer(12)))
        );
        assert_eq!(integer.parse_value(&["".into()], &[]), Ok(None));
        assert!(integer.parse_value(&["twelve".into()], &[]).is_err());
    }

    #[test]
    fn choices_resolve_by_id_or_label() {
        let choices = vec![choice(1, "Small"), choice(2, "Large")];
        let single = field(CustomFieldType::Enum);
        assert_eq!(
            single.parse_value(&["large".into()], &choices),
            Ok(Some(CustomValue::Enum(EnumValueId::new(2).expect("valid id"))))
        );
        assert_eq!(
            single.parse_value(&["Medium".into()], &choices),
            Err(CustomFieldError::UnknownChoice("Medium".into()))
        );

        let multi = field(CustomFieldType::MultiEnum);
        let value = multi
            .parse_value(&["2".into(), "1".into(), "2".into()], &choices)
            .expect("valid choices")
            .expect("some value");
        assert_eq!(value.display(&choices), "Small, Large");
    }

    #[test]
    fn required_fields_reject_emptiness_in_forms() {
        let mut required = field(CustomFieldType::String);
        required.is_required = true;
        assert_eq!(
            required.parse_form_value(&[], &[]),
            Err(CustomFieldError::Required("Size".into()))
        );
        assert_eq!(required.parse_value(&[], &[]), Ok(None));
    }
}
