//! DTO modules that bridge services with templates and APIs.

pub mod activities;
pub mod billing;
pub mod config;
pub mod emails;
pub mod entities;
pub mod events;
