//! Use cases of the CRM, independent from HTTP.
//!
//! Every service takes the repository through the narrowest set of traits it
//! needs, checks the caller's roles first and maps failures to
//! [`ServiceError`].

pub mod activities;
pub mod billing;
pub mod config_transfer;
pub mod custom_fields;
pub mod emails;
pub mod entities;
pub mod errors;
pub mod events;
pub mod filters;
pub mod import;
pub mod jobs;
pub mod persons;
pub mod recurrents;
pub mod relations;
pub mod users;

pub use errors::{ServiceError, ServiceResult, ensure_role};
