//! Database models shared across the CRM repository.

pub mod activity;
pub mod billing;
pub mod config;
pub mod custom_field;
pub mod emails;
pub mod entity;
pub mod event;
pub mod filters;
pub mod job;
pub mod persons;
pub mod recurrent;
pub mod relation;
pub mod user;
