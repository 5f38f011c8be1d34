use diesel::r2d2::{Error as R2D2Error, PoolError};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Stored data that cannot become a domain value, or a write the
    /// repository refuses before touching the database.
    #[error("Invalid data: {0}")]
    ValidationError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Shown to users as a conflict, so the message must read well on its own.
    #[error("{0}")]
    ConstraintViolation(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

fn constraint_message(kind: &DatabaseErrorKind, detail: &str) -> Option<String> {
    let message = match kind {
        DatabaseErrorKind::UniqueViolation => format!("This record already exists ({detail})."),
        DatabaseErrorKind::ForeignKeyViolation => {
            format!("A referenced record is missing or still in use ({detail}).")
        }
        DatabaseErrorKind::NotNullViolation => format!("A required value is missing ({detail})."),
        DatabaseErrorKind::CheckViolation => format!("A value is out of range ({detail})."),
        _ => return None,
    };
    Some(message)
}

impl From<DieselError> for RepositoryError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => RepositoryError::NotFound,
            DieselError::DatabaseError(kind, info) => {
                let detail = info.message().to_string();
                match constraint_message(&kind, &detail) {
                    Some(message) => RepositoryError::ConstraintViolation(message),
                    None => RepositoryError::DatabaseError(detail),
                }
            }
            DieselError::SerializationError(e) | DieselError::DeserializationError(e) => {
                RepositoryError::ValidationError(e.to_string())
            }
            DieselError::RollbackTransaction
            | DieselError::AlreadyInTransaction
            | DieselError::NotInTransaction
            | DieselError::BrokenTransactionManager => {
                RepositoryError::DatabaseError(format!("transaction failed: {err}"))
            }
            other => RepositoryError::Unexpected(other.to_string()),
        }
    }
}

impl From<R2D2Error> for RepositoryError {
    fn from(err: R2D2Error) -> Self {
        RepositoryError::ConnectionError(err.to_string())
    }
}

impl From<PoolError> for RepositoryError {
    fn from(err: PoolError) -> Self {
        RepositoryError::ConnectionError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rows_become_not_found() {
        assert!(matches!(
            RepositoryError::from(DieselError::NotFound),
            RepositoryError::NotFound
        ));
    }

    #[test]
    fn unique_violations_read_as_duplicates() {
        let message = constraint_message(&DatabaseErrorKind::UniqueViolation, "custom_fields.name")
            .expect("constraint");
        assert!(message.starts_with("This record already exists"));
        assert!(constraint_message(&DatabaseErrorKind::Unknown, "x").is_none());
    }
}
