//! Form definitions backing the CRM routes.

use thiserror::Error;
use validator::ValidationErrors;

use crate::domain::types::TypeConstraintError;

pub mod activities;
pub mod billing;
pub mod custom_fields;
pub mod emails;
pub mod entities;
pub mod events;
pub mod filters;
pub mod import;
pub mod persons;
pub mod recurrents;
pub mod relations;

#[derive(Debug, Error)]
/// Errors that can occur when processing form data.
pub enum FormError {
    #[error("validation errors: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("the form could not be read: {0}")]
    Malformed(String),

    #[error("invalid identifier")]
    InvalidId,

    #[error("unknown type of entity \"{0}\"")]
    InvalidKind(String),

    #[error("invalid email address")]
    InvalidEmail,

    #[error("invalid name")]
    InvalidName,

    #[error("invalid date \"{0}\"")]
    InvalidDate(String),

    #[error("invalid value for \"{field}\": {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("invalid CSV file: {0}")]
    Csv(String),
}

impl FormError {
    pub fn invalid(field: impl Into<String>, reason: impl ToString) -> Self {
        FormError::InvalidValue {
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<TypeConstraintError> for FormError {
    fn from(err: TypeConstraintError) -> Self {
        match err {
            TypeConstraintError::NonPositiveId => FormError::InvalidId,
            TypeConstraintError::InvalidEmail => FormError::InvalidEmail,
            TypeConstraintError::EmptyString => FormError::InvalidName,
            other => FormError::Malformed(other.to_string()),
        }
    }
}

/// Decodes an url-encoded body, repeated keys included.
pub fn parse_urlencoded<T>(body: &[u8]) -> Result<T, FormError>
where
    T: serde::de::DeserializeOwned,
{
    serde_html_form::from_bytes(body).map_err(|err| FormError::Malformed(err.to_string()))
}

/// Converts raw ids, rejecting non positive ones.
pub fn parse_ids<T>(raw: &[i32]) -> Result<Vec<T>, FormError>
where
    T: TryFrom<i32, Error = TypeConstraintError>,
{
    raw.iter()
        .map(|id| T::try_from(*id).map_err(|_| FormError::InvalidId))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::EntityId;

    #[test]
    fn ids_must_be_positive() {
        let ids: Vec<EntityId> = parse_ids(&[1, 2]).expect("valid ids");
        assert_eq!(ids.len(), 2);
        assert!(matches!(
            parse_ids::<EntityId>(&[3, 0]),
            Err(FormError::InvalidId)
        ));
    }

    #[test]
    fn repeated_keys_are_collected() {
        #[derive(serde::Deserialize)]
        struct Form {
            #[serde(default)]
            ids: Vec<i32>,
        }

        let form: Form = parse_urlencoded(b"ids=4&ids=5").expect("valid body");
        assert_eq!(form.ids, vec![4, 5]);
    }
}
