//! Error conversion glue between layers.
//!
//! The domain layer does not know about repository or service errors; the
//! conversions live here so that `?` works across the boundaries.

use crate::domain::types::TypeConstraintError;
use crate::repository::errors::RepositoryError;

impl From<TypeConstraintError> for RepositoryError {
    fn from(val: TypeConstraintError) -> Self {
        RepositoryError::ValidationError(val.to_string())
    }
}

#[cfg(feature = "server")]
mod service {
    use crate::domain::activity::ActivityError;
    use crate::domain::billing::BillingError;
    use crate::domain::config_transfer::{DependenceError, ImportError};
    use crate::domain::custom_field::CustomFieldError;
    use crate::domain::custom_form::CustomFormError;
    use crate::domain::emails::EmailError;
    use crate::domain::entity_filter::FilterError;
    use crate::domain::event::EventError;
    use crate::domain::header_filter::HeaderFilterError;
    use crate::domain::relation::RelationError;
    use crate::domain::types::TypeConstraintError;
    use crate::forms::FormError;
    use crate::services::ServiceError;

    impl From<TypeConstraintError> for ServiceError {
        fn from(val: TypeConstraintError) -> Self {
            ServiceError::TypeConstraint(val.to_string())
        }
    }

    impl From<FormError> for ServiceError {
        fn from(val: FormError) -> Self {
            ServiceError::Form(val.to_string())
        }
    }

    impl From<ActivityError> for ServiceError {
        fn from(val: ActivityError) -> Self {
            match val {
                ActivityError::Collision { .. } => ServiceError::Conflict(val.to_string()),
                other => ServiceError::Form(other.to_string()),
            }
        }
    }

    impl From<FilterError> for ServiceError {
        fn from(val: FilterError) -> Self {
            match val {
                FilterError::InUse(_) | FilterError::Cycle(_) => {
                    ServiceError::Conflict(val.to_string())
                }
                FilterError::NotEditable => ServiceError::Unauthorized,
                other => ServiceError::Form(other.to_string()),
            }
        }
    }

    impl From<HeaderFilterError> for ServiceError {
        fn from(val: HeaderFilterError) -> Self {
            match val {
                HeaderFilterError::NotEditable => ServiceError::Unauthorized,
                other => ServiceError::Form(other.to_string()),
            }
        }
    }

    macro_rules! form_errors {
        ($($error:ty),+ $(,)?) => {
            $(
                impl From<$error> for ServiceError {
                    fn from(val: $error) -> Self {
                        ServiceError::Form(val.to_string())
                    }
                }
            )+
        };
    }

    form_errors!(
        BillingError,
        CustomFieldError,
        CustomFormError,
        DependenceError,
        EmailError,
        EventError,
        ImportError,
        RelationError,
    );
}
