//! Mock repository implementations for isolating services in tests.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use mockall::mock;

use crate::domain::activity::{Activity, ActivityType, Calendar, NewCalendar};
use crate::domain::billing::{BillingStatus, Line, LineData, Totals};
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
use crate::repository::{
    ActivityReader, ActivityWriter, BillingReader, BillingWriter,
    CustomFieldReader, CustomFieldWriter, EmailReader, EmailWriter, EntityListQuery,
    EntityReader, EntityWriter, FilterReader, FilterWriter, JobReader, JobWriter,
    PropertyReader, PropertyWriter, RelationReader, RelationWriter, TrashQuery, UserReader,
    UserWriter,
};

mock! {
    pub Repository {}

    impl UserReader for Repository {
        fn get_user_by_id(&self, id: UserId) -> RepositoryResult<Option<User>>;
        fn get_user_by_email(&self, email: &Email) -> RepositoryResult<Option<User>>;
        fn list_users(&self) -> RepositoryResult<Vec<User>>;
    }

    impl UserWriter for Repository {
        fn upsert_user(&self, user: &UpsertUser) -> RepositoryResult<User>;
    }

    impl EntityReader for Repository {
        fn get_entity(&self, id: EntityId) -> RepositoryResult<Option<AnyEntity>>;
        fn get_entity_by_uuid(&self, uuid: &PublicId) -> RepositoryResult<Option<CremeEntity>>;
        fn get_entities(&self, ids: &[EntityId]) -> RepositoryResult<Vec<AnyEntity>>;
        fn list_entities(
            &self,
            query: EntityListQuery,
        ) -> RepositoryResult<(usize, Vec<CremeEntity>)>;
        fn list_trash(&self, query: TrashQuery) -> RepositoryResult<(usize, Vec<CremeEntity>)>;
        fn load_snapshots(&self, kind: EntityKind) -> RepositoryResult<Vec<EntitySnapshot>>;
        fn list_addresses(&self, owner_id: EntityId) -> RepositoryResult<Vec<Address>>;
        fn list_working_generators(&self) -> RepositoryResult<Vec<Entity<RecurrentGenerator>>>;
    }

    impl EntityWriter for Repository {
        fn create_entity(&self, entity: &NewEntity, data: &EntityData) -> RepositoryResult<AnyEntity>;
        fn update_entity(&self, entity: &AnyEntity) -> RepositoryResult<AnyEntity>;
        fn set_entity_trashed(&self, id: EntityId, trashed: bool) -> RepositoryResult<()>;
        fn delete_entity(&self, id: EntityId) -> RepositoryResult<()>;
        fn save_address(
            &self,
            id: Option<AddressId>,
            address: &NewAddress,
        ) -> RepositoryResult<Address>;
        fn delete_address(&self, id: AddressId) -> RepositoryResult<()>;
    }

    impl RelationReader for Repository {
        fn list_relation_types(&self) -> RepositoryResult<Vec<RelationType>>;
        fn get_relation_type(&self, id: &str) -> RepositoryResult<Option<RelationType>>;
        fn list_relations(&self, subject_id: EntityId) -> RepositoryResult<Vec<Relation>>;
        fn get_relation(&self, id: RelationId) -> RepositoryResult<Option<Relation>>;
    }

    impl RelationWriter for Repository {
        fn create_relation_type_pair(
            &self,
            pair: &NewRelationTypePair,
        ) -> RepositoryResult<(RelationType, RelationType)>;
        fn delete_relation_type_pair(&self, id: &str) -> RepositoryResult<()>;
        fn set_relation_type_enabled(&self, id: &str, enabled: bool) -> RepositoryResult<()>;
        fn create_relation(&self, relation: &NewRelation) -> RepositoryResult<Relation>;
        fn create_relations(&self, relations: &[NewRelation]) -> RepositoryResult<Vec<Relation>>;
        fn delete_relation(&self, id: RelationId) -> RepositoryResult<()>;
        fn delete_relations(
            &self,
            subject_id: EntityId,
            type_ids: &[String],
            object_id: Option<EntityId>,
        ) -> RepositoryResult<usize>;
    }

    impl PropertyReader for Repository {
        fn list_property_types(&self) -> RepositoryResult<Vec<PropertyType>>;
        fn list_entity_properties(&self, entity_id: EntityId) -> RepositoryResult<Vec<PropertyType>>;
    }

    impl PropertyWriter for Repository {
        fn create_property_type(
            &self,
            property_type: &NewPropertyType,
        ) -> RepositoryResult<PropertyType>;
        fn delete_property_type(&self, id: PropertyTypeId) -> RepositoryResult<()>;
        fn add_property(&self, entity_id: EntityId, type_id: PropertyTypeId) -> RepositoryResult<bool>;
        fn remove_property(
            &self,
            entity_id: EntityId,
            type_id: PropertyTypeId,
        ) -> RepositoryResult<()>;
    }

    impl CustomFieldReader for Repository {
        fn list_custom_fields(&self) -> RepositoryResult<Vec<CustomField>>;
        fn get_custom_field(&self, id: CustomFieldId) -> RepositoryResult<Option<CustomField>>;
        fn list_enum_values(&self) -> RepositoryResult<Vec<CustomFieldEnumValue>>;
        fn get_custom_values(
            &self,
            entity_id: EntityId,
        ) -> RepositoryResult<HashMap<CustomFieldId, CustomValue>>;
    }

    impl CustomFieldWriter for Repository {
        fn create_custom_field(&self, field: &NewCustomField) -> RepositoryResult<CustomField>;
        fn set_custom_field_deleted(&self, id: CustomFieldId, deleted: bool) -> RepositoryResult<()>;
        fn delete_custom_field(&self, id: CustomFieldId) -> RepositoryResult<()>;
        fn add_enum_value(
            &self,
            field_id: CustomFieldId,
            value: &str,
        ) -> RepositoryResult<CustomFieldEnumValue>;
        fn set_custom_value(
            &self,
            field: &CustomField,
            entity_id: EntityId,
            value: Option<CustomValue>,
        ) -> RepositoryResult<()>;
    }

    impl FilterReader for Repository {
        fn list_entity_filters(&self) -> RepositoryResult<Vec<EntityFilter>>;
        fn get_entity_filter(&self, id: &str) -> RepositoryResult<Option<EntityFilter>>;
        fn list_header_filters(&self) -> RepositoryResult<Vec<HeaderFilter>>;
        fn get_header_filter(&self, id: &str) -> RepositoryResult<Option<HeaderFilter>>;
        fn list_custom_forms(&self) -> RepositoryResult<Vec<CustomFormItem>>;
        fn get_custom_form(&self, descriptor_id: &str) -> RepositoryResult<Option<CustomFormItem>>;
    }

    impl FilterWriter for Repository {
        fn save_entity_filter(&self, filter: &EntityFilter) -> RepositoryResult<()>;
        fn delete_entity_filter(&self, id: &str) -> RepositoryResult<()>;
        fn save_header_filter(&self, filter: &HeaderFilter) -> RepositoryResult<()>;
        fn delete_header_filter(&self, id: &str) -> RepositoryResult<()>;
        fn save_custom_form(&self, form: &CustomFormItem) -> RepositoryResult<()>;
        fn delete_custom_form(&self, descriptor_id: &str) -> RepositoryResult<()>;
    }

    impl ActivityReader for Repository {
        fn list_activity_types(&self) -> RepositoryResult<Vec<ActivityType>>;
        fn list_calendars(&self) -> RepositoryResult<Vec<Calendar>>;
        fn get_calendar(&self, id: CalendarId) -> RepositoryResult<Option<Calendar>>;
        fn list_activity_calendars(&self, activity_id: EntityId) -> RepositoryResult<Vec<CalendarId>>;
        fn list_calendar_activities(
            &self,
            calendar_ids: &[CalendarId],
            start: NaiveDateTime,
            end: NaiveDateTime,
        ) -> RepositoryResult<Vec<Entity<Activity>>>;
        fn list_participant_activities(
            &self,
            participant_id: EntityId,
        ) -> RepositoryResult<Vec<Entity<Activity>>>;
    }

    impl ActivityWriter for Repository {
        fn save_activity_type(&self, activity_type: &ActivityType) -> RepositoryResult<()>;
        fn create_calendar(&self, calendar: &NewCalendar) -> RepositoryResult<Calendar>;
        fn default_calendar(&self, fallback: &NewCalendar) -> RepositoryResult<Calendar>;
        fn delete_calendar(&self, id: CalendarId) -> RepositoryResult<()>;
        fn set_activity_calendars(
            &self,
            activity_id: EntityId,
            calendar_ids: &[CalendarId],
        ) -> RepositoryResult<()>;
    }

    impl BillingReader for Repository {
        fn list_statuses(&self, kind: EntityKind) -> RepositoryResult<Vec<BillingStatus>>;
        fn get_status(&self, id: StatusId) -> RepositoryResult<Option<BillingStatus>>;
        fn list_lines(&self, document_id: EntityId) -> RepositoryResult<Vec<Line>>;
        fn get_line(&self, id: LineId) -> RepositoryResult<Option<Line>>;
    }

    impl BillingWriter for Repository {
        fn add_line(&self, document_id: EntityId, line: &LineData) -> RepositoryResult<Line>;
        fn update_line(&self, id: LineId, line: &LineData) -> RepositoryResult<Line>;
        fn delete_line(&self, id: LineId) -> RepositoryResult<()>;
        fn set_totals(&self, document_id: EntityId, totals: &Totals) -> RepositoryResult<()>;
        fn next_number(&self, organisation_id: EntityId, kind: EntityKind) -> RepositoryResult<String>;
        fn set_number(&self, document_id: EntityId, number: &str) -> RepositoryResult<()>;
    }

    impl EmailReader for Repository {
        fn list_members(
            &self,
            ml_id: EntityId,
            kind: ListMemberKind,
        ) -> RepositoryResult<Vec<EntityId>>;
        fn list_children_map(&self) -> RepositoryResult<HashMap<EntityId, Vec<EntityId>>>;
        fn list_recipients(&self, ml_id: EntityId) -> RepositoryResult<Vec<String>>;
        fn list_campaign_lists(&self, campaign_id: EntityId) -> RepositoryResult<Vec<EntityId>>;
        fn list_sendings(&self, campaign_id: EntityId) -> RepositoryResult<Vec<EmailSending>>;
        fn get_sending(&self, id: SendingId) -> RepositoryResult<Option<EmailSending>>;
        fn list_due_sendings(&self, now: NaiveDateTime) -> RepositoryResult<Vec<EmailSending>>;
        fn list_mails(&self, sending_id: SendingId) -> RepositoryResult<Vec<LightWeightEmail>>;
    }

    impl EmailWriter for Repository {
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
        fn add_campaign_lists(
            &self,
            campaign_id: EntityId,
            ml_ids: &[EntityId],
        ) -> RepositoryResult<usize>;
        fn remove_campaign_list(
            &self,
            campaign_id: EntityId,
            ml_id: EntityId,
        ) -> RepositoryResult<()>;
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

    impl JobReader for Repository {
        fn list_jobs(&self) -> RepositoryResult<Vec<Job>>;
        fn get_job(&self, id: JobId) -> RepositoryResult<Option<Job>>;
    }

    impl JobWriter for Repository {
        fn save_job_result(&self, id: JobId, result: &JobResult) -> RepositoryResult<()>;
        fn set_job_enabled(&self, id: JobId, enabled: bool) -> RepositoryResult<()>;
    }
}
