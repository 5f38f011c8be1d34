//! Registry of the regular (model) fields of every entity kind.
//!
//! The registry drives filter validation, bulk edition, list view columns,
//! CSV import/export and custom form validation.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use validator::{ValidateEmail, ValidateUrl};

use crate::domain::entity::{CremeEntity, EntityKind};
use crate::domain::types::{Decimal2, TypeConstraintError, normalize_phone_to_e164};
use crate::domain::{activity, billing, emails, event, persons, recurrent};

/// Storage type of a regular field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FieldType {
    String,
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Email,
    Url,
    /// Phone number normalised to E.164.
    Phone,
    /// One value among a fixed set.
    Choice(&'static [&'static str]),
    /// Identifier of a configuration record (activity type, billing status...).
    Reference,
    /// Identifier of a user.
    User,
}

impl FieldType {
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            FieldType::String
                | FieldType::Text
                | FieldType::Email
                | FieldType::Url
                | FieldType::Phone
                | FieldType::Choice(_)
        )
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, FieldType::Date | FieldType::DateTime)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Decimal)
    }

    /// Parses user input (form, CSV, filter value) into a [`FieldValue`].
    ///
    /// An empty (trimmed) input yields [`FieldValue::Null`].
    pub fn parse_value(self, raw: &str) -> Result<FieldValue, TypeConstraintError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(FieldValue::Null);
        }
        let invalid = || TypeConstraintError::InvalidValue(trimmed.to_string());
        match self {
            FieldType::String | FieldType::Text => Ok(FieldValue::Text(trimmed.to_string())),
            FieldType::Email => {
                let lowered = trimmed.to_lowercase();
                if lowered.validate_email() {
                    Ok(FieldValue::Text(lowered))
                } else {
                    Err(TypeConstraintError::InvalidEmail)
                }
            }
            FieldType::Url => {
                if trimmed.validate_url() {
                    Ok(FieldValue::Text(trimmed.to_string()))
                } else {
                    Err(TypeConstraintError::InvalidUrl)
                }
            }
            FieldType::Phone => normalize_phone_to_e164(trimmed).map(FieldValue::Text),
            FieldType::Integer | FieldType::User => trimmed
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| invalid()),
            FieldType::Decimal => trimmed.parse::<Decimal2>().map(FieldValue::Decimal),
            FieldType::Boolean => parse_bool(trimmed).map(FieldValue::Boolean).ok_or_else(invalid),
            FieldType::Date => parse_date(trimmed).map(FieldValue::Date).ok_or_else(invalid),
            FieldType::DateTime => parse_datetime(trimmed)
                .map(FieldValue::DateTime)
                .ok_or_else(invalid),
            FieldType::Choice(choices) => {
                if choices.contains(&trimmed) {
                    Ok(FieldValue::Text(trimmed.to_string()))
                } else {
                    Err(invalid())
                }
            }
            FieldType::Reference => Ok(match trimmed.parse::<i64>() {
                Ok(number) => FieldValue::Integer(number),
                Err(_) => FieldValue::Text(trimmed.to_string()),
            }),
        }
    }
}

/// Parses the boolean spellings accepted by forms and CSV files.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| parse_date(trimmed).and_then(|date| date.and_hms_opt(0, 0, 0)))
}

/// Runtime value of a regular or custom field.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Decimal(Decimal2),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    pub fn text<S: AsRef<str>>(value: Option<S>) -> FieldValue {
        match value {
            Some(text) if !text.as_ref().is_empty() => FieldValue::Text(text.as_ref().to_string()),
            _ => FieldValue::Null,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(text) if text.is_empty() => None,
            FieldValue::Text(text) => Some(text),
            other => Some(other.to_string()),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(number) => Some(*number),
            FieldValue::Text(text) => text.parse().ok(),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal2> {
        match self {
            FieldValue::Decimal(number) => Some(*number),
            FieldValue::Integer(number) => Some(Decimal2::from_units(*number)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Date part of a temporal value.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(*date),
            FieldValue::DateTime(datetime) => Some(datetime.date()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::Date(date) => date.and_hms_opt(0, 0, 0),
            FieldValue::DateTime(datetime) => Some(*datetime),
            _ => None,
        }
    }

    /// Orders two values of compatible variants; `None` for mismatching variants.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            (FieldValue::Integer(a), FieldValue::Integer(b)) => Some(a.cmp(b)),
            (FieldValue::Decimal(a), FieldValue::Decimal(b)) => Some(a.cmp(b)),
            (FieldValue::Integer(a), FieldValue::Decimal(b)) => {
                Some(Decimal2::from_units(*a).cmp(b))
            }
            (FieldValue::Decimal(a), FieldValue::Integer(b)) => {
                Some(a.cmp(&Decimal2::from_units(*b)))
            }
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => Some(a.cmp(b)),
            (FieldValue::Date(a), FieldValue::Date(b)) => Some(a.cmp(b)),
            (FieldValue::DateTime(a), FieldValue::DateTime(b)) => Some(a.cmp(b)),
            (FieldValue::DateTime(a), FieldValue::Date(b)) => Some(a.date().cmp(b)),
            (FieldValue::Date(a), FieldValue::DateTime(b)) => Some(a.cmp(&b.date())),
            _ => None,
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Integer(number) => write!(f, "{number}"),
            FieldValue::Decimal(number) => write!(f, "{number}"),
            FieldValue::Boolean(flag) => f.write_str(if *flag { "Yes" } else { "No" }),
            FieldValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            FieldValue::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M")),
        }
    }
}

/// Static description of a regular field.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub verbose_name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub editable: bool,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, verbose_name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            verbose_name,
            field_type,
            required: false,
            editable: true,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }
}

/// Fields every entity kind carries through [`CremeEntity`].
pub const BASE_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::new("description", "Description", FieldType::Text),
    FieldDescriptor::new("user_id", "Owner user", FieldType::User),
    FieldDescriptor::new("created_at", "Creation date", FieldType::DateTime).read_only(),
    FieldDescriptor::new("modified_at", "Last modification", FieldType::DateTime).read_only(),
];

/// Specific fields declared by the given kind.
pub fn kind_fields(kind: EntityKind) -> &'static [FieldDescriptor] {
    match kind {
        EntityKind::Contact => persons::CONTACT_FIELDS,
        EntityKind::Organisation => persons::ORGANISATION_FIELDS,
        EntityKind::Activity => activity::ACTIVITY_FIELDS,
        EntityKind::Invoice
        | EntityKind::Quote
        | EntityKind::SalesOrder
        | EntityKind::CreditNote
        | EntityKind::TemplateBase => billing::DOCUMENT_FIELDS,
        EntityKind::EmailCampaign => emails::CAMPAIGN_FIELDS,
        EntityKind::MailingList => emails::MAILING_LIST_FIELDS,
        EntityKind::EmailTemplate => emails::TEMPLATE_FIELDS,
        EntityKind::Event => event::EVENT_FIELDS,
        EntityKind::RecurrentGenerator => recurrent::GENERATOR_FIELDS,
    }
}

/// Every field (specific then base) of the given kind.
pub fn all_fields(kind: EntityKind) -> impl Iterator<Item = &'static FieldDescriptor> {
    kind_fields(kind).iter().chain(BASE_FIELDS.iter())
}

pub fn field_descriptor(kind: EntityKind, name: &str) -> Option<&'static FieldDescriptor> {
    all_fields(kind).find(|field| field.name == name)
}

/// Value of a base field.
pub fn base_field_value(entity: &CremeEntity, name: &str) -> Option<FieldValue> {
    match name {
        "description" => Some(FieldValue::text(Some(&entity.description))),
        "user_id" => Some(FieldValue::Integer(i64::from(entity.user_id.get()))),
        "created_at" => Some(FieldValue::DateTime(entity.created_at)),
        "modified_at" => Some(FieldValue::DateTime(entity.modified_at)),
        _ => None,
    }
}

/// Implemented by the specialised part of every entity kind.
pub trait EntityFields {
    /// Values of the kind-specific fields, in registry order.
    fn field_values(&self) -> Vec<(&'static str, FieldValue)>;

    /// String shown in lists and used for quick search.
    fn display_label(&self) -> String;

    /// Assigns an already parsed value to the field `name`.
    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), TypeConstraintError>;
}

/// Error for a field name unknown to [`EntityFields::set_field`].
pub fn unknown_field(name: &str) -> TypeConstraintError {
    TypeConstraintError::InvalidValue(format!("unknown field {name}"))
}

/// Converts a parsed value into an optional string (empty means `None`).
pub fn opt_text(value: FieldValue) -> Option<String> {
    value.into_text()
}

/// Converts a parsed value into a mandatory string.
pub fn required_text(value: FieldValue) -> Result<String, TypeConstraintError> {
    value.into_text().ok_or(TypeConstraintError::EmptyString)
}

pub fn opt_date(value: FieldValue) -> Result<Option<NaiveDate>, TypeConstraintError> {
    match value {
        FieldValue::Null => Ok(None),
        other => other
            .as_date()
            .map(Some)
            .ok_or_else(|| TypeConstraintError::InvalidValue(other.to_string())),
    }
}

pub fn opt_datetime(value: FieldValue) -> Result<Option<NaiveDateTime>, TypeConstraintError> {
    match value {
        FieldValue::Null => Ok(None),
        other => other
            .as_datetime()
            .map(Some)
            .ok_or_else(|| TypeConstraintError::InvalidValue(other.to_string())),
    }
}

pub fn opt_decimal(value: FieldValue) -> Result<Option<Decimal2>, TypeConstraintError> {
    match value {
        FieldValue::Null => Ok(None),
        other => other
            .as_decimal()
            .map(Some)
            .ok_or_else(|| TypeConstraintError::InvalidDecimal(other.to_string())),
    }
}

pub fn required_bool(value: FieldValue) -> Result<bool, TypeConstraintError> {
    match value {
        FieldValue::Null => Ok(false),
        other => other
            .as_bool()
            .ok_or_else(|| TypeConstraintError::InvalidValue(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_values_according_to_field_type() {
        assert_eq!(FieldType::Integer.parse_value(" 42 "), Ok(FieldValue::Integer(42)));
        assert_eq!(FieldType::Boolean.parse_value("on"), Ok(FieldValue::Boolean(true)));
        assert_eq!(FieldType::String.parse_value("   "), Ok(FieldValue::Null));
        assert_eq!(
            FieldType::Date.parse_value("2024-02-29"),
            Ok(FieldValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date")))
        );
        assert!(FieldType::Date.parse_value("2023-02-29").is_err());
        assert!(FieldType::Email.parse_value("nope").is_err());
        assert!(FieldType::Choice(&["a", "b"]).parse_value("c").is_err());
        assert_eq!(
            FieldType::Phone.parse_value("+1 (415) 555-2671"),
            Ok(FieldValue::Text("+14155552671".to_string()))
        );
        assert_eq!(
            FieldType::Reference.parse_value("activities-activitytype_task"),
            Ok(FieldValue::Text("activities-activitytype_task".to_string()))
        );
    }

    #[test]
    fn datetime_accepts_several_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(14, 30, 0))
            .expect("valid datetime");
        assert_eq!(parse_datetime("2024-05-01T14:30"), Some(expected));
        assert_eq!(parse_datetime("2024-05-01 14:30:00"), Some(expected));
        assert!(parse_datetime("2024-05-01").is_some());
    }

    #[test]
    fn mixed_numbers_compare() {
        let integer = FieldValue::Integer(3);
        let decimal = FieldValue::Decimal(Decimal2::from_hundredths(250));
        assert_eq!(integer.compare(&decimal), Some(Ordering::Greater));
        assert_eq!(integer.compare(&FieldValue::Text("3".into())), None);
    }

    #[test]
    fn every_kind_has_a_required_field_or_label() {
        for kind in EntityKind::ALL {
            assert!(kind_fields(kind).iter().any(|field| field.required), "{kind}");
            assert!(field_descriptor(kind, "description").is_some());
        }
    }
}
