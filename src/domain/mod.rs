//! Domain types and rules exposed by the CRM service layer.

pub mod activity;
pub mod auth;
pub mod billing;
pub mod config_transfer;
pub mod custom_field;
pub mod custom_form;
pub mod emails;
pub mod entity;
pub mod entity_data;
pub mod entity_filter;
pub mod event;
pub mod fields;
pub mod header_filter;
pub mod job;
pub mod period;
pub mod persons;
pub mod property;
pub mod recurrent;
pub mod relation;
pub mod types;
pub mod user;
