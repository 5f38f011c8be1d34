//! Repository implementation for entities, whatever their kind.
//!
//! The base record lives in `entities`; the kind-specific part lives in one
//! table per kind keyed by the same id.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::{
    domain::{
        entity::{CremeEntity, Entity, EntityKind, NewEntity},
        entity_data::{AnyEntity, EntityData},
        entity_filter::engine::{EntitySnapshot, RelationEdge},
        fields::EntityFields,
        persons::{Address, AddressKind, NewAddress},
        recurrent::RecurrentGenerator,
        types::{AddressId, EntityId, PublicId, StatusId, TypeConstraintError},
    },
    models::{
        activity::Activity as DbActivity,
        billing::BillingDocument as DbBillingDocument,
        emails::{
            EmailCampaign as DbEmailCampaign, EmailTemplate as DbEmailTemplate,
            MailingList as DbMailingList,
        },
        entity::{Entity as DbEntity, NewEntity as DbNewEntity, UpdateEntity as DbUpdateEntity},
        event::Event as DbEvent,
        persons::{
            Address as DbAddress, Contact as DbContact, NewAddress as DbNewAddress,
            Organisation as DbOrganisation,
        },
        recurrent::RecurrentGenerator as DbRecurrentGenerator,
    },
    repository::{
        DieselRepository, EntityListQuery, EntityReader, EntityWriter, TrashQuery,
        custom_field::load_custom_values,
        errors::{RepositoryError, RepositoryResult},
    },
};

fn entity_ids(ids: &[EntityId]) -> Vec<i32> {
    ids.iter().map(|id| id.get()).collect()
}

fn into_map<T>(
    rows: Vec<T>,
    convert: impl Fn(T) -> Result<(i32, EntityData), TypeConstraintError>,
) -> RepositoryResult<HashMap<i32, EntityData>> {
    rows.into_iter()
        .map(|row| convert(row).map_err(RepositoryError::from))
        .collect()
}

/// Loads the kind-specific part of the given entities.
fn load_data(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    ids: &[i32],
) -> RepositoryResult<HashMap<i32, EntityData>> {
    use crate::schema::{
        activities, billing_documents, contacts, email_campaigns, email_templates, events,
        mailing_lists, organisations, recurrent_generators,
    };

    match kind {
        EntityKind::Contact => {
            let rows = contacts::table
                .filter(contacts::entity_id.eq_any(ids))
                .load::<DbContact>(conn)?;
            into_map(rows, |row| {
                Ok((row.entity_id, EntityData::Contact(row.try_into()?)))
            })
        }
        EntityKind::Organisation => {
            let rows = organisations::table
                .filter(organisations::entity_id.eq_any(ids))
                .load::<DbOrganisation>(conn)?;
            into_map(rows, |row| {
                Ok((row.entity_id, EntityData::Organisation(row.into())))
            })
        }
        EntityKind::Activity => {
            let rows = activities::table
                .filter(activities::entity_id.eq_any(ids))
                .load::<DbActivity>(conn)?;
            into_map(rows, |row| {
                Ok((row.entity_id, EntityData::Activity(row.try_into()?)))
            })
        }
        EntityKind::Invoice
        | EntityKind::Quote
        | EntityKind::SalesOrder
        | EntityKind::CreditNote
        | EntityKind::TemplateBase => {
            let rows = billing_documents::table
                .filter(billing_documents::entity_id.eq_any(ids))
                .load::<DbBillingDocument>(conn)?;
            into_map(rows, |row| {
                Ok((row.entity_id, EntityData::Document(row.try_into()?)))
            })
        }
        EntityKind::MailingList => {
            let rows = mailing_lists::table
                .filter(mailing_lists::entity_id.eq_any(ids))
                .load::<DbMailingList>(conn)?;
            into_map(rows, |row| {
                Ok((row.entity_id, EntityData::MailingList(row.into())))
            })
        }
        EntityKind::EmailCampaign => {
            let rows = email_campaigns::table
                .filter(email_campaigns::entity_id.eq_any(ids))
                .load::<DbEmailCampaign>(conn)?;
            into_map(rows, |row| {
                Ok((row.entity_id, EntityData::EmailCampaign(row.into())))
            })
        }
        EntityKind::EmailTemplate => {
            let rows = email_templates::table
                .filter(email_templates::entity_id.eq_any(ids))
                .load::<DbEmailTemplate>(conn)?;
            into_map(rows, |row| {
                Ok((row.entity_id, EntityData::EmailTemplate(row.into())))
            })
        }
        EntityKind::Event => {
            let rows = events::table
                .filter(events::entity_id.eq_any(ids))
                .load::<DbEvent>(conn)?;
            into_map(rows, |row| Ok((row.entity_id, EntityData::Event(row.into()))))
        }
        EntityKind::RecurrentGenerator => {
            let rows = recurrent_generators::table
                .filter(recurrent_generators::entity_id.eq_any(ids))
                .load::<DbRecurrentGenerator>(conn)?;
            into_map(rows, |row| {
                Ok((row.entity_id, EntityData::RecurrentGenerator(row.try_into()?)))
            })
        }
    }
}

/// Joins base records with their specialised rows; records without one are skipped.
fn attach_data(
    conn: &mut SqliteConnection,
    rows: Vec<DbEntity>,
) -> RepositoryResult<Vec<AnyEntity>> {
    let bases = rows
        .into_iter()
        .map(CremeEntity::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let mut by_kind: HashMap<EntityKind, Vec<i32>> = HashMap::new();
    for base in &bases {
        by_kind.entry(base.kind).or_default().push(base.id.get());
    }
    let mut data = HashMap::new();
    for (kind, ids) in by_kind {
        data.extend(load_data(conn, kind, &ids)?);
    }

    Ok(bases
        .into_iter()
        .filter_map(|base| match data.remove(&base.id.get()) {
            Some(data) => Some(Entity { base, data }),
            None => {
                log::warn!("Entity {} has no {} row", base.id, base.kind);
                None
            }
        })
        .collect())
}

/// First default status of the kind, else the first one.
fn default_status(conn: &mut SqliteConnection, kind: EntityKind) -> RepositoryResult<StatusId> {
    use crate::schema::billing_statuses;

    let id = billing_statuses::table
        .filter(billing_statuses::doc_kind.eq(kind.as_str()))
        .order((
            billing_statuses::is_default.desc(),
            billing_statuses::position.asc(),
        ))
        .select(billing_statuses::id)
        .first::<i32>(conn)
        .optional()?
        .ok_or_else(|| {
            RepositoryError::ValidationError(format!("no billing status configured for {kind}"))
        })?;
    Ok(StatusId::new(id)?)
}

/// Writes the specialised row; returns the data as stored.
fn write_data(
    conn: &mut SqliteConnection,
    id: EntityId,
    kind: EntityKind,
    data: &EntityData,
    is_new: bool,
) -> RepositoryResult<EntityData> {
    use crate::schema::{
        activities, billing_documents, contacts, email_campaigns, email_templates, events,
        mailing_lists, organisations, recurrent_generators,
    };

    if !data.fits(kind) {
        return Err(RepositoryError::ValidationError(format!(
            "data does not fit an entity of kind {kind}"
        )));
    }

    macro_rules! write_row {
        ($table:ident, $row:expr) => {{
            let row = $row;
            if is_new {
                diesel::insert_into($table::table).values(&row).execute(conn)?;
            } else {
                diesel::update($table::table.find(id.get()))
                    .set(&row)
                    .execute(conn)?;
            }
        }};
    }

    match data {
        EntityData::Contact(contact) => write_row!(contacts, DbContact::from_domain(id, contact)),
        EntityData::Organisation(organisation) => write_row!(
            organisations,
            DbOrganisation::from_domain(id, organisation)
        ),
        EntityData::Activity(activity) => {
            write_row!(activities, DbActivity::from_domain(id, activity))
        }
        EntityData::Document(document) => {
            let status_id = match document.status_id {
                Some(status_id) => status_id,
                None => default_status(conn, kind)?,
            };
            write_row!(
                billing_documents,
                DbBillingDocument::from_domain(id, kind, document, status_id)
            );
            let mut stored = document.clone();
            stored.status_id = Some(status_id);
            return Ok(EntityData::Document(stored));
        }
        EntityData::MailingList(list) => {
            write_row!(mailing_lists, DbMailingList::from_domain(id, list))
        }
        EntityData::EmailCampaign(campaign) => {
            write_row!(email_campaigns, DbEmailCampaign::from_domain(id, campaign))
        }
        EntityData::EmailTemplate(template) => {
            write_row!(email_templates, DbEmailTemplate::from_domain(id, template))
        }
        EntityData::Event(event) => write_row!(events, DbEvent::from_domain(id, event)),
        EntityData::RecurrentGenerator(generator) => write_row!(
            recurrent_generators,
            DbRecurrentGenerator::from_domain(id, generator)
        ),
    }
    Ok(data.clone())
}

impl EntityReader for DieselRepository {
    fn get_entity(&self, id: EntityId) -> RepositoryResult<Option<AnyEntity>> {
        use crate::schema::entities;

        let mut conn = self.conn()?;
        let Some(row) = entities::table
            .find(id.get())
            .first::<DbEntity>(&mut conn)
            .optional()?
        else {
            return Ok(None);
        };

        Ok(attach_data(&mut conn, vec![row])?.pop())
    }

    fn get_entity_by_uuid(&self, uuid: &PublicId) -> RepositoryResult<Option<CremeEntity>> {
        use crate::schema::entities;

        let mut conn = self.conn()?;
        let row = entities::table
            .filter(entities::uuid.eq(uuid.to_string()))
            .first::<DbEntity>(&mut conn)
            .optional()?;

        row.map(CremeEntity::try_from)
            .transpose()
            .map_err(RepositoryError::from)
    }

    fn get_entities(&self, ids: &[EntityId]) -> RepositoryResult<Vec<AnyEntity>> {
        use crate::schema::entities;

        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn()?;
        let rows = entities::table
            .filter(entities::id.eq_any(entity_ids(ids)))
            .order(entities::header_filter_search_field.asc())
            .load::<DbEntity>(&mut conn)?;

        attach_data(&mut conn, rows)
    }

    fn list_entities(
        &self,
        query: EntityListQuery,
    ) -> RepositoryResult<(usize, Vec<CremeEntity>)> {
        use crate::schema::entities;

        let mut conn = self.conn()?;

        let query_builder = || {
            let mut items = entities::table
                .filter(entities::kind.eq(query.kind.as_str()))
                .filter(entities::is_deleted.eq(query.deleted))
                .into_boxed::<diesel::sqlite::Sqlite>();

            if let Some(search) = &query.search {
                items = items.filter(entities::header_filter_search_field.like(format!("%{search}%")));
            }
            if let Some(ids) = &query.ids {
                items = items.filter(entities::id.eq_any(entity_ids(ids)));
            }
            items
        };

        let total = query_builder().count().get_result::<i64>(&mut conn)? as usize;

        let mut items = query_builder();
        if let Some(pagination) = &query.pagination {
            items = items.offset(pagination.offset()).limit(pagination.limit());
        }

        let entities = items
            .order((
                entities::header_filter_search_field.asc(),
                entities::id.asc(),
            ))
            .load::<DbEntity>(&mut conn)?
            .into_iter()
            .map(CremeEntity::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((total, entities))
    }

    fn list_trash(&self, query: TrashQuery) -> RepositoryResult<(usize, Vec<CremeEntity>)> {
        use crate::schema::entities;

        let mut conn = self.conn()?;

        let query_builder = || {
            let mut items = entities::table
                .filter(entities::is_deleted.eq(true))
                .into_boxed::<diesel::sqlite::Sqlite>();
            if let Some(user_id) = query.user_id {
                items = items.filter(entities::user_id.eq(user_id.get()));
            }
            items
        };

        let total = query_builder().count().get_result::<i64>(&mut conn)? as usize;

        let mut items = query_builder();
        if let Some(pagination) = &query.pagination {
            items = items.offset(pagination.offset()).limit(pagination.limit());
        }

        let entities = items
            .order(entities::modified_at.desc())
            .load::<DbEntity>(&mut conn)?
            .into_iter()
            .map(CremeEntity::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((total, entities))
    }

    fn load_snapshots(&self, kind: EntityKind) -> RepositoryResult<Vec<EntitySnapshot>> {
        use crate::schema::{entities, properties, property_types, relations};

        let mut conn = self.conn()?;

        let rows = entities::table
            .filter(entities::kind.eq(kind.as_str()))
            .filter(entities::is_deleted.eq(false))
            .order((
                entities::header_filter_search_field.asc(),
                entities::id.asc(),
            ))
            .load::<DbEntity>(&mut conn)?;
        let entities = attach_data(&mut conn, rows)?;
        let ids: Vec<i32> = entities.iter().map(|entity| entity.id().get()).collect();

        let edges = relations::table
            .inner_join(entities::table.on(entities::id.eq(relations::object_id)))
            .filter(relations::subject_id.eq_any(&ids))
            .select((
                relations::subject_id,
                relations::type_id,
                relations::object_id,
                entities::kind,
                entities::header_filter_search_field,
            ))
            .load::<(i32, String, i32, String, String)>(&mut conn)?;

        let mut relations_by_subject: HashMap<i32, Vec<RelationEdge>> = HashMap::new();
        for (subject_id, type_id, object_id, object_kind, object_label) in edges {
            relations_by_subject
                .entry(subject_id)
                .or_default()
                .push(RelationEdge {
                    type_id,
                    object_id: EntityId::new(object_id)?,
                    object_kind: object_kind.parse()?,
                    object_label,
                });
        }

        let mut properties_by_entity: HashMap<i32, HashSet<PublicId>> = HashMap::new();
        let property_rows = properties::table
            .inner_join(property_types::table)
            .filter(properties::entity_id.eq_any(&ids))
            .select((properties::entity_id, property_types::uuid))
            .load::<(i32, String)>(&mut conn)?;
        for (entity_id, uuid) in property_rows {
            properties_by_entity
                .entry(entity_id)
                .or_default()
                .insert(uuid.parse()?);
        }

        let mut custom_by_entity = HashMap::<i32, HashMap<PublicId, _>>::new();
        for (entity_id, field, value) in load_custom_values(&mut conn, &ids)? {
            custom_by_entity
                .entry(entity_id)
                .or_default()
                .insert(field.uuid, value);
        }

        Ok(entities
            .into_iter()
            .map(|entity| {
                let raw_id = entity.id().get();
                let mut snapshot = EntitySnapshot::new(entity.base);
                snapshot.fields = entity
                    .data
                    .field_values()
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect();
                snapshot.relations = relations_by_subject.remove(&raw_id).unwrap_or_default();
                snapshot.properties = properties_by_entity.remove(&raw_id).unwrap_or_default();
                snapshot.custom_values = custom_by_entity.remove(&raw_id).unwrap_or_default();
                snapshot
            })
            .collect())
    }

    fn list_addresses(&self, owner_id: EntityId) -> RepositoryResult<Vec<Address>> {
        use crate::schema::addresses;

        let mut conn = self.conn()?;
        addresses::table
            .filter(addresses::owner_id.eq(owner_id.get()))
            .order(addresses::id.asc())
            .load::<DbAddress>(&mut conn)?
            .into_iter()
            .map(|address| Address::try_from(address).map_err(RepositoryError::from))
            .collect()
    }

    fn list_working_generators(&self) -> RepositoryResult<Vec<Entity<RecurrentGenerator>>> {
        use crate::schema::{entities, recurrent_generators};

        let mut conn = self.conn()?;
        let rows = entities::table
            .inner_join(
                recurrent_generators::table
                    .on(recurrent_generators::entity_id.eq(entities::id)),
            )
            .filter(entities::is_deleted.eq(false))
            .filter(recurrent_generators::is_working.eq(true))
            .select((DbEntity::as_select(), recurrent_generators::all_columns))
            .load::<(DbEntity, DbRecurrentGenerator)>(&mut conn)?;

        rows.into_iter()
            .map(|(base, generator)| {
                Ok(Entity {
                    base: CremeEntity::try_from(base)?,
                    data: RecurrentGenerator::try_from(generator)?,
                })
            })
            .collect::<Result<Vec<_>, TypeConstraintError>>()
            .map_err(RepositoryError::from)
    }
}

impl EntityWriter for DieselRepository {
    fn create_entity(&self, entity: &NewEntity, data: &EntityData) -> RepositoryResult<AnyEntity> {
        use crate::schema::entities;

        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();
        let label = data.display_label();

        conn.transaction::<_, RepositoryError, _>(|conn| {
            let mut new_entity = DbNewEntity::from_domain(entity, now);
            new_entity.header_filter_search_field = &label;

            let row = diesel::insert_into(entities::table)
                .values(&new_entity)
                .get_result::<DbEntity>(conn)?;
            let base = CremeEntity::try_from(row)?;
            let data = write_data(conn, base.id, base.kind, data, true)?;

            Ok(Entity { base, data })
        })
    }

    fn update_entity(&self, entity: &AnyEntity) -> RepositoryResult<AnyEntity> {
        use crate::schema::entities;

        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();
        let label = entity.data.display_label();

        conn.transaction::<_, RepositoryError, _>(|conn| {
            let changes = DbUpdateEntity {
                user_id: entity.base.user_id.get(),
                description: &entity.base.description,
                header_filter_search_field: &label,
                modified_at: now,
            };
            let row = diesel::update(entities::table.find(entity.id().get()))
                .set(&changes)
                .get_result::<DbEntity>(conn)?;
            let base = CremeEntity::try_from(row)?;
            let data = write_data(conn, base.id, base.kind, &entity.data, false)?;

            Ok(Entity { base, data })
        })
    }

    fn set_entity_trashed(&self, id: EntityId, trashed: bool) -> RepositoryResult<()> {
        use crate::schema::entities;

        let mut conn = self.conn()?;
        let affected = diesel::update(entities::table.find(id.get()))
            .set((
                entities::is_deleted.eq(trashed),
                entities::modified_at.eq(Utc::now().naive_utc()),
            ))
            .execute(&mut conn)?;

        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn delete_entity(&self, id: EntityId) -> RepositoryResult<()> {
        use crate::schema::entities;

        let mut conn = self.conn()?;
        let affected = diesel::delete(entities::table.find(id.get())).execute(&mut conn)?;

        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn save_address(
        &self,
        id: Option<AddressId>,
        address: &NewAddress,
    ) -> RepositoryResult<Address> {
        use crate::schema::addresses;

        let mut conn = self.conn()?;
        let db_address: DbNewAddress = address.into();

        let stored = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let existing = match id {
                Some(id) => Some(id.get()),
                None if address.kind == AddressKind::Other => None,
                None => addresses::table
                    .filter(addresses::owner_id.eq(db_address.owner_id))
                    .filter(addresses::kind.eq(db_address.kind))
                    .select(addresses::id)
                    .first::<i32>(conn)
                    .optional()?,
            };

            match existing {
                Some(existing_id) => diesel::update(addresses::table.find(existing_id))
                    .set(&db_address)
                    .get_result::<DbAddress>(conn),
                None => diesel::insert_into(addresses::table)
                    .values(&db_address)
                    .get_result::<DbAddress>(conn),
            }
        })?;

        Address::try_from(stored).map_err(RepositoryError::from)
    }

    fn delete_address(&self, id: AddressId) -> RepositoryResult<()> {
        use crate::schema::addresses;

        let mut conn = self.conn()?;
        diesel::delete(addresses::table.find(id.get())).execute(&mut conn)?;
        Ok(())
    }
}
