//! Storage traits and their Diesel implementation.
//!
//! Every area exposes a `*Reader` and a `*Writer` trait; [`DieselRepository`]
//! implements all of them over one SQLite pool so services can ask for exactly
//! the capabilities they use.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::db::{DbConnection, DbPool, get_connection};
use crate::domain::activity::{Activity, ActivityType, Calendar, NewCalendar};
use crate::domain::billing::{BillingStatus, Line, LineData, Totals};
use crate::domain::config_transfer::{CustomFieldData, PropertyTypeData, RelationTypeData};
use crate::domain::custom_field::{CustomField, CustomFieldEnumValue, CustomValue, NewCustomField};
use crate::domain::custom_form::CustomFormItem;
use crate::domain::emails::{
    EmailSending, LightWeightEmail, ListMemberKind, MailStatus, NewEmailSending,
    NewLightWeightEmail, SendingState,
};
use crate::domain::entity::{CremeEntity, Entity, EntityKind, NewEntity};
use crate::domain::entity_data::{AnyEntity, EntityData};
use crate::domain::entity_filter::EntityFilter;
use crate::domain::entity_filter::engine::EntitySnapshot;
use crate::domain::header_filter::HeaderFilter;
use crate::domain::job::{Job, JobResult};
use crate::domain::persons::{Address, NewAddress};
use crate::domain::property::{NewPropertyType, PropertyType};
use crate::domain::recurrent::RecurrentGenerator;
use crate::domain::relation::{NewRelation, NewRelationTypePair, Relation, RelationType};
use crate::domain::types::{
    AddressId, CalendarId, CustomFieldId, Email, EntityId, JobId, LineId, PropertyTypeId,
    PublicId, RelationId, SendingId, StatusId, UserId,
};
use crate::domain::user::{UpsertUser, User};
use crate::repository::errors::RepositoryResult;

pub mod activity;
pub mod billing;
pub mod config;
pub mod custom_field;
pub mod emails;
pub mod entity;
pub mod errors;
pub mod filters;
pub mod jobs;
#[cfg(feature = "test-mocks")]
pub mod mock;
pub mod relation;
pub mod user;

/// Diesel backed implementation of every repository trait.
#[derive(Clone)]
pub struct DieselRepository {
    pool: DbPool,
}

impl DieselRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> RepositoryResult<DbConnection> {
        Ok(get_connection(&self.pool)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
}

impl Pagination {
    pub fn offset(&self) -> i64 {
        ((self.page.max(1) - 1) * self.per_page) as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Base records of one kind, ordered by label.
#[derive(Debug, Clone)]
pub struct EntityListQuery {
    pub kind: EntityKind,
    pub search: Option<String>,
    pub ids: Option<Vec<EntityId>>,
    pub deleted: bool,
    pub pagination: Option<Pagination>,
}

impl EntityListQuery {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            search: None,
            ids: None,
            deleted: false,
            pagination: None,
        }
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        if !search.trim().is_empty() {
            self.search = Some(search.trim().to_string());
        }
        self
    }

    pub fn ids(mut self, ids: Vec<EntityId>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Lists the trash instead of the live entities.
    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    pub fn paginate(mut self, page: usize, per_page: usize) -> Self {
        self.pagination = Some(Pagination { page, per_page });
        self
    }
}

/// Entities in the trash, any kind.
#[derive(Debug, Clone, Default)]
pub struct TrashQuery {
    pub user_id: Option<UserId>,
    pub pagination: Option<Pagination>,
}

impl TrashQuery {
    pub fn owned_by(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn paginate(mut self, page: usize, per_page: usize) -> Self {
        self.pagination = Some(Pagination { page, per_page });
        self
    }
}

pub trait UserReader {
    fn get_user_by_id(&self, id: UserId) -> RepositoryResult<Option<User>>;
    fn get_user_by_email(&self, email: &Email) -> RepositoryResult<Option<User>>;
    fn list_users(&self) -> RepositoryResult<Vec<User>>;
}

pub trait UserWriter {
    fn upsert_user(&self, user: &UpsertUser) -> RepositoryResult<User>;
}

pub trait EntityReader {
    fn get_entity(&self, id: EntityId) -> RepositoryResult<Option<AnyEntity>>;
    fn get_entity_by_uuid(&self, uuid: &PublicId) -> RepositoryResult<Option<CremeEntity>>;
    fn get_entities(&self, ids: &[EntityId]) -> RepositoryResult<Vec<AnyEntity>>;
    fn list_entities(&self, query: EntityListQuery)
    -> RepositoryResult<(usize, Vec<CremeEntity>)>;
    fn list_trash(&self, query: TrashQuery) -> RepositoryResult<(usize, Vec<CremeEntity>)>;
    /// Every live entity of `kind` with its fields, relations, properties and custom values.
    fn load_snapshots(&self, kind: EntityKind) -> RepositoryResult<Vec<EntitySnapshot>>;
    fn list_addresses(&self, owner_id: EntityId) -> RepositoryResult<Vec<Address>>;
    fn list_working_generators(&self) -> RepositoryResult<Vec<Entity<RecurrentGenerator>>>;
}

pub trait EntityWriter {
    fn create_entity(&self, entity: &NewEntity, data: &EntityData) -> RepositoryResult<AnyEntity>;
    fn update_entity(&self, entity: &AnyEntity) -> RepositoryResult<AnyEntity>;
    fn set_entity_trashed(&self, id: EntityId, trashed: bool) -> RepositoryResult<()>;
    /// Removes the entity with everything hanging from it.
    fn delete_entity(&self, id: EntityId) -> RepositoryResult<()>;
    /// Creates or rewrites an address.
    ///
    /// Without `id`, a billing or shipping address replaces the owner's current one.
    fn save_address(&self, id: Option<AddressId>, address: &NewAddress)
    -> RepositoryResult<Address>;
    fn delete_address(&self, id: AddressId) -> RepositoryResult<()>;
}

pub trait RelationReader {
    fn list_relation_types(&self) -> RepositoryResult<Vec<RelationType>>;
    fn get_relation_type(&self, id: &str) -> RepositoryResult<Option<RelationType>>;
    /// Relations whose subject is `subject_id`.
    fn list_relations(&self, subject_id: EntityId) -> RepositoryResult<Vec<Relation>>;
    fn get_relation(&self, id: RelationId) -> RepositoryResult<Option<Relation>>;
}

pub trait RelationWriter {
    fn create_relation_type_pair(
        &self,
        pair: &NewRelationTypePair,
    ) -> RepositoryResult<(RelationType, RelationType)>;
    /// Deletes both types of the pair and their relations.
    fn delete_relation_type_pair(&self, id: &str) -> RepositoryResult<()>;
    fn set_relation_type_enabled(&self, id: &str, enabled: bool) -> RepositoryResult<()>;
    /// Creates the relation and its symmetric one; existing relations are returned as is.
    fn create_relation(&self, relation: &NewRelation) -> RepositoryResult<Relation>;
    /// Creates every relation with its symmetric one, or none of them.
    fn create_relations(&self, relations: &[NewRelation]) -> RepositoryResult<Vec<Relation>>;
    fn delete_relation(&self, id: RelationId) -> RepositoryResult<()>;
    /// Deletes the relations of the given types from `subject_id`, optionally towards one object.
    fn delete_relations(
        &self,
        subject_id: EntityId,
        type_ids: &[String],
        object_id: Option<EntityId>,
    ) -> RepositoryResult<usize>;
}

pub trait PropertyReader {
    fn list_property_types(&self) -> RepositoryResult<Vec<PropertyType>>;
    fn list_entity_properties(&self, entity_id: EntityId) -> RepositoryResult<Vec<PropertyType>>;
}

pub trait PropertyWriter {
    fn create_property_type(&self, property_type: &NewPropertyType)
    -> RepositoryResult<PropertyType>;
    fn delete_property_type(&self, id: PropertyTypeId) -> RepositoryResult<()>;
    /// Returns false when the entity already had the property.
    fn add_property(&self, entity_id: EntityId, type_id: PropertyTypeId) -> RepositoryResult<bool>;
    fn remove_property(&self, entity_id: EntityId, type_id: PropertyTypeId)
    -> RepositoryResult<()>;
}

pub trait CustomFieldReader {
    /// All custom fields, deleted ones included.
    fn list_custom_fields(&self) -> RepositoryResult<Vec<CustomField>>;
    fn get_custom_field(&self, id: CustomFieldId) -> RepositoryResult<Option<CustomField>>;
    fn list_enum_values(&self) -> RepositoryResult<Vec<CustomFieldEnumValue>>;
    fn get_custom_values(
        &self,
        entity_id: EntityId,
    ) -> RepositoryResult<HashMap<CustomFieldId, CustomValue>>;
}

pub trait CustomFieldWriter {
    fn create_custom_field(&self, field: &NewCustomField) -> RepositoryResult<CustomField>;
    fn set_custom_field_deleted(&self, id: CustomFieldId, deleted: bool) -> RepositoryResult<()>;
    fn delete_custom_field(&self, id: CustomFieldId) -> RepositoryResult<()>;
    fn add_enum_value(
        &self,
        field_id: CustomFieldId,
        value: &str,
    ) -> RepositoryResult<CustomFieldEnumValue>;
    /// `None` clears the stored value.
    fn set_custom_value(
        &self,
        field: &CustomField,
        entity_id: EntityId,
        value: Option<CustomValue>,
    ) -> RepositoryResult<()>;
}

pub trait FilterReader {
    fn list_entity_filters(&self) -> RepositoryResult<Vec<EntityFilter>>;
    fn get_entity_filter(&self, id: &str) -> RepositoryResult<Option<EntityFilter>>;
    fn list_header_filters(&self) -> RepositoryResult<Vec<HeaderFilter>>;
    fn get_header_filter(&self, id: &str) -> RepositoryResult<Option<HeaderFilter>>;
    fn list_custom_forms(&self) -> RepositoryResult<Vec<CustomFormItem>>;
    fn get_custom_form(&self, descriptor_id: &str) -> RepositoryResult<Option<CustomFormItem>>;
}

pub trait FilterWriter {
    /// Inserts or replaces the filter with its conditions.
    fn save_entity_filter(&self, filter: &EntityFilter) -> RepositoryResult<()>;
    fn delete_entity_filter(&self, id: &str) -> RepositoryResult<()>;
    fn save_header_filter(&self, filter: &HeaderFilter) -> RepositoryResult<()>;
    fn delete_header_filter(&self, id: &str) -> RepositoryResult<()>;
    fn save_custom_form(&self, form: &CustomFormItem) -> RepositoryResult<()>;
    fn delete_custom_form(&self, descriptor_id: &str) -> RepositoryResult<()>;
}

pub trait ActivityReader {
    fn list_activity_types(&self) -> RepositoryResult<Vec<ActivityType>>;
    fn list_calendars(&self) -> RepositoryResult<Vec<Calendar>>;
    fn get_calendar(&self, id: CalendarId) -> RepositoryResult<Option<Calendar>>;
    fn list_activity_calendars(&self, activity_id: EntityId) -> RepositoryResult<Vec<CalendarId>>;
    /// Live activities of the calendars intersecting `[start, end)`.
    fn list_calendar_activities(
        &self,
        calendar_ids: &[CalendarId],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> RepositoryResult<Vec<Entity<Activity>>>;
    /// Live activities the participant takes part in.
    fn list_participant_activities(
        &self,
        participant_id: EntityId,
    ) -> RepositoryResult<Vec<Entity<Activity>>>;
}

pub trait ActivityWriter {
    fn save_activity_type(&self, activity_type: &ActivityType) -> RepositoryResult<()>;
    fn create_calendar(&self, calendar: &NewCalendar) -> RepositoryResult<Calendar>;
    /// Returns the user's default calendar, creating `fallback` when the user has none.
    fn default_calendar(&self, fallback: &NewCalendar) -> RepositoryResult<Calendar>;
    fn delete_calendar(&self, id: CalendarId) -> RepositoryResult<()>;
    /// Replaces the calendars an activity is shown in.
    fn set_activity_calendars(
        &self,
        activity_id: EntityId,
        calendar_ids: &[CalendarId],
    ) -> RepositoryResult<()>;
}

pub trait BillingReader {
    fn list_statuses(&self, kind: EntityKind) -> RepositoryResult<Vec<BillingStatus>>;
    fn get_status(&self, id: StatusId) -> RepositoryResult<Option<BillingStatus>>;
    fn list_lines(&self, document_id: EntityId) -> RepositoryResult<Vec<Line>>;
    fn get_line(&self, id: LineId) -> RepositoryResult<Option<Line>>;
}

pub trait BillingWriter {
    fn add_line(&self, document_id: EntityId, line: &LineData) -> RepositoryResult<Line>;
    fn update_line(&self, id: LineId, line: &LineData) -> RepositoryResult<Line>;
    fn delete_line(&self, id: LineId) -> RepositoryResult<()>;
    fn set_totals(&self, document_id: EntityId, totals: &Totals) -> RepositoryResult<()>;
    /// Increments the emitter's counter for `kind` and returns the formatted number.
    fn next_number(&self, organisation_id: EntityId, kind: EntityKind) -> RepositoryResult<String>;
    fn set_number(&self, document_id: EntityId, number: &str) -> RepositoryResult<()>;
}

pub trait EmailReader {
    fn list_members(&self, ml_id: EntityId, kind: ListMemberKind)
    -> RepositoryResult<Vec<EntityId>>;
    /// Child lists of every mailing list, keyed by parent.
    fn list_children_map(&self) -> RepositoryResult<HashMap<EntityId, Vec<EntityId>>>;
    fn list_recipients(&self, ml_id: EntityId) -> RepositoryResult<Vec<String>>;
    fn list_campaign_lists(&self, campaign_id: EntityId) -> RepositoryResult<Vec<EntityId>>;
    fn list_sendings(&self, campaign_id: EntityId) -> RepositoryResult<Vec<EmailSending>>;
    fn get_sending(&self, id: SendingId) -> RepositoryResult<Option<EmailSending>>;
    /// Sendings not done yet whose date has come.
    fn list_due_sendings(&self, now: NaiveDateTime) -> RepositoryResult<Vec<EmailSending>>;
    fn list_mails(&self, sending_id: SendingId) -> RepositoryResult<Vec<LightWeightEmail>>;
}

pub trait EmailWriter {
    fn add_members(
        &self,
        ml_id: EntityId,
        kind: ListMemberKind,
        member_ids: &[EntityId],
    ) -> RepositoryResult<usize>;
    fn remove_member(
        &self,
        ml_id: EntityId,
        kind: ListMemberKind,
        member_id: EntityId,
    ) -> RepositoryResult<()>;
    fn add_recipients(&self, ml_id: EntityId, addresses: &[String]) -> RepositoryResult<usize>;
    fn remove_recipient(&self, ml_id: EntityId, address: &str) -> RepositoryResult<()>;
    fn add_campaign_lists(&self, campaign_id: EntityId, ml_ids: &[EntityId])
    -> RepositoryResult<usize>;
    fn remove_campaign_list(&self, campaign_id: EntityId, ml_id: EntityId)
    -> RepositoryResult<()>;
    /// Stores the sending with its mails in one transaction.
    fn create_sending(
        &self,
        sending: &NewEmailSending,
        mails: &[NewLightWeightEmail],
    ) -> RepositoryResult<EmailSending>;
    fn set_sending_state(&self, id: SendingId, state: SendingState) -> RepositoryResult<()>;
    fn delete_sending(&self, id: SendingId) -> RepositoryResult<()>;
    fn set_mail_status(
        &self,
        id: &PublicId,
        status: MailStatus,
        sent_at: Option<NaiveDateTime>,
    ) -> RepositoryResult<()>;
}

pub trait JobReader {
    fn list_jobs(&self) -> RepositoryResult<Vec<Job>>;
    fn get_job(&self, id: JobId) -> RepositoryResult<Option<Job>>;
}

pub trait JobWriter {
    fn save_job_result(&self, id: JobId, result: &JobResult) -> RepositoryResult<()>;
    fn set_job_enabled(&self, id: JobId, enabled: bool) -> RepositoryResult<()>;
}

/// Writes of a configuration import; every call joins the same transaction.
pub trait ConfigStore {
    fn upsert_property_type(&mut self, data: &PropertyTypeData) -> RepositoryResult<()>;
    /// Both sides of the pair; their property constraints are resolved by uuid.
    fn upsert_relation_type_pair(&mut self, data: &RelationTypeData) -> RepositoryResult<()>;
    /// Returns `false` when a field with this uuid already exists.
    fn insert_custom_field(&mut self, data: &CustomFieldData) -> RepositoryResult<bool>;
    fn store_header_filter(&mut self, filter: &HeaderFilter) -> RepositoryResult<()>;
    fn store_entity_filter(&mut self, filter: &EntityFilter) -> RepositoryResult<()>;
    fn store_custom_form(&mut self, form: &CustomFormItem) -> RepositoryResult<()>;
}

pub trait ConfigWriter {
    /// Runs `save` in one transaction; nothing is stored when it fails.
    fn save_config(
        &self,
        save: &mut dyn FnMut(&mut dyn ConfigStore) -> RepositoryResult<()>,
    ) -> RepositoryResult<()>;
}
