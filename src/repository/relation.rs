//! Repository implementation for relation types, relations and properties.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;

use crate::{
    domain::{
        property::{NewPropertyType, PropertyType},
        relation::{NewRelation, NewRelationTypePair, Relation, RelationType},
        types::{EntityId, PropertyTypeId, RelationId},
    },
    models::relation::{
        NewProperty as DbNewProperty, NewPropertyType as DbNewPropertyType,
        NewRelation as DbNewRelation, PropertyType as DbPropertyType, Relation as DbRelation,
        RelationType as DbRelationType,
    },
    repository::{
        DieselRepository, PropertyReader, PropertyWriter, RelationReader, RelationWriter,
        errors::{RepositoryError, RepositoryResult},
    },
};
use crate::domain::entity::EntityKind;

impl RelationReader for DieselRepository {
    fn list_relation_types(&self) -> RepositoryResult<Vec<RelationType>> {
        use crate::schema::relation_types;

        let mut conn = self.conn()?;
        relation_types::table
            .order(relation_types::id.asc())
            .load::<DbRelationType>(&mut conn)?
            .into_iter()
            .map(|rtype| RelationType::try_from(rtype).map_err(RepositoryError::from))
            .collect()
    }

    fn get_relation_type(&self, id: &str) -> RepositoryResult<Option<RelationType>> {
        use crate::schema::relation_types;

        let mut conn = self.conn()?;
        let rtype = relation_types::table
            .find(id)
            .first::<DbRelationType>(&mut conn)
            .optional()?;

        rtype
            .map(RelationType::try_from)
            .transpose()
            .map_err(RepositoryError::from)
    }

    fn list_relations(&self, subject_id: EntityId) -> RepositoryResult<Vec<Relation>> {
        use crate::schema::relations;

        let mut conn = self.conn()?;
        relations::table
            .filter(relations::subject_id.eq(subject_id.get()))
            .order((relations::type_id.asc(), relations::id.asc()))
            .load::<DbRelation>(&mut conn)?
            .into_iter()
            .map(|relation| Relation::try_from(relation).map_err(RepositoryError::from))
            .collect()
    }

    fn get_relation(&self, id: RelationId) -> RepositoryResult<Option<Relation>> {
        use crate::schema::relations;

        let mut conn = self.conn()?;
        let relation = relations::table
            .find(id.get())
            .first::<DbRelation>(&mut conn)
            .optional()?;

        relation
            .map(Relation::try_from)
            .transpose()
            .map_err(RepositoryError::from)
    }
}

impl RelationWriter for DieselRepository {
    fn create_relation_type_pair(
        &self,
        pair: &NewRelationTypePair,
    ) -> RepositoryResult<(RelationType, RelationType)> {
        use crate::schema::relation_types;

        let mut conn = self.conn()?;
        let (subject, object) = pair.clone().into_types();
        let rows = [DbRelationType::from(&subject), DbRelationType::from(&object)];

        diesel::insert_into(relation_types::table)
            .values(&rows[..])
            .execute(&mut conn)?;

        Ok((subject, object))
    }

    fn delete_relation_type_pair(&self, id: &str) -> RepositoryResult<()> {
        use crate::schema::{relation_types, relations};

        let mut conn = self.conn()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let symmetric_id = relation_types::table
                .find(id)
                .select(relation_types::symmetric_type_id)
                .first::<String>(conn)?;
            let ids = [id.to_string(), symmetric_id];

            diesel::delete(relations::table.filter(relations::type_id.eq_any(&ids)))
                .execute(conn)?;
            diesel::delete(relation_types::table.filter(relation_types::id.eq_any(&ids)))
                .execute(conn)?;
            Ok(())
        })
        .map_err(RepositoryError::from)
    }

    fn set_relation_type_enabled(&self, id: &str, enabled: bool) -> RepositoryResult<()> {
        use crate::schema::relation_types;

        let mut conn = self.conn()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let symmetric_id = relation_types::table
                .find(id)
                .select(relation_types::symmetric_type_id)
                .first::<String>(conn)?;

            diesel::update(
                relation_types::table.filter(relation_types::id.eq_any([id, symmetric_id.as_str()])),
            )
            .set(relation_types::enabled.eq(enabled))
            .execute(conn)?;
            Ok(())
        })
        .map_err(RepositoryError::from)
    }

    fn create_relation(&self, relation: &NewRelation) -> RepositoryResult<Relation> {
        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();
        let stored = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            insert_relation_pair(conn, relation, now)
        })?;
        Relation::try_from(stored).map_err(RepositoryError::from)
    }

    fn create_relations(&self, relations: &[NewRelation]) -> RepositoryResult<Vec<Relation>> {
        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();
        let stored = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            relations
                .iter()
                .map(|relation| insert_relation_pair(conn, relation, now))
                .collect::<QueryResult<Vec<_>>>()
        })?;
        stored
            .into_iter()
            .map(|relation| Relation::try_from(relation).map_err(RepositoryError::from))
            .collect()
    }

    fn delete_relation(&self, id: RelationId) -> RepositoryResult<()> {
        use crate::schema::relations;

        let mut conn = self.conn()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let relation = relations::table
                .find(id.get())
                .first::<DbRelation>(conn)?;

            let mut ids = vec![relation.id];
            ids.extend(relation.symmetric_relation_id);
            diesel::delete(relations::table.filter(relations::id.eq_any(&ids))).execute(conn)?;
            Ok(())
        })
        .map_err(RepositoryError::from)
    }

    fn delete_relations(
        &self,
        subject_id: EntityId,
        type_ids: &[String],
        object_id: Option<EntityId>,
    ) -> RepositoryResult<usize> {
        use crate::schema::relations;

        let mut conn = self.conn()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let mut query = relations::table
                .filter(relations::subject_id.eq(subject_id.get()))
                .filter(relations::type_id.eq_any(type_ids))
                .into_boxed::<diesel::sqlite::Sqlite>();
            if let Some(object_id) = object_id {
                query = query.filter(relations::object_id.eq(object_id.get()));
            }
            let found = query.load::<DbRelation>(conn)?;

            let ids = found
                .iter()
                .flat_map(|relation| {
                    std::iter::once(relation.id).chain(relation.symmetric_relation_id)
                })
                .collect::<Vec<_>>();
            diesel::delete(relations::table.filter(relations::id.eq_any(&ids))).execute(conn)?;
            Ok(found.len())
        })
        .map_err(RepositoryError::from)
    }
}

impl PropertyReader for DieselRepository {
    fn list_property_types(&self) -> RepositoryResult<Vec<PropertyType>> {
        use crate::schema::property_types;

        let mut conn = self.conn()?;
        property_types::table
            .order(property_types::text.asc())
            .load::<DbPropertyType>(&mut conn)?
            .into_iter()
            .map(|ptype| PropertyType::try_from(ptype).map_err(RepositoryError::from))
            .collect()
    }

    fn list_entity_properties(&self, entity_id: EntityId) -> RepositoryResult<Vec<PropertyType>> {
        use crate::schema::{properties, property_types};

        let mut conn = self.conn()?;
        properties::table
            .inner_join(property_types::table)
            .filter(properties::entity_id.eq(entity_id.get()))
            .order(property_types::text.asc())
            .select(property_types::all_columns)
            .load::<DbPropertyType>(&mut conn)?
            .into_iter()
            .map(|ptype| PropertyType::try_from(ptype).map_err(RepositoryError::from))
            .collect()
    }
}

impl PropertyWriter for DieselRepository {
    fn create_property_type(
        &self,
        property_type: &NewPropertyType,
    ) -> RepositoryResult<PropertyType> {
        use crate::schema::property_types;

        let mut conn = self.conn()?;
        let new_type = DbNewPropertyType {
            uuid: property_type.uuid.to_string(),
            text: property_type.text.as_str(),
            subject_kinds: EntityKind::join_list(&property_type.subject_kinds),
            is_custom: property_type.is_custom,
        };
        let stored = diesel::insert_into(property_types::table)
            .values(&new_type)
            .get_result::<DbPropertyType>(&mut conn)?;

        PropertyType::try_from(stored).map_err(RepositoryError::from)
    }

    fn delete_property_type(&self, id: PropertyTypeId) -> RepositoryResult<()> {
        use crate::schema::property_types;

        let mut conn = self.conn()?;
        diesel::delete(property_types::table.find(id.get())).execute(&mut conn)?;
        Ok(())
    }

    fn add_property(&self, entity_id: EntityId, type_id: PropertyTypeId) -> RepositoryResult<bool> {
        use crate::schema::properties;

        let mut conn = self.conn()?;
        let affected = diesel::insert_into(properties::table)
            .values(&DbNewProperty {
                type_id: type_id.get(),
                entity_id: entity_id.get(),
            })
            .on_conflict_do_nothing()
            .execute(&mut conn)?;

        Ok(affected > 0)
    }

    fn remove_property(
        &self,
        entity_id: EntityId,
        type_id: PropertyTypeId,
    ) -> RepositoryResult<()> {
        use crate::schema::properties;

        let mut conn = self.conn()?;
        diesel::delete(
            properties::table
                .filter(properties::entity_id.eq(entity_id.get()))
                .filter(properties::type_id.eq(type_id.get())),
        )
        .execute(&mut conn)?;
        Ok(())
    }
}

fn find_relation(conn: &mut SqliteConnection, relation: &NewRelation) -> QueryResult<Option<DbRelation>> {
    use crate::schema::relations;

    relations::table
        .filter(relations::subject_id.eq(relation.subject_id.get()))
        .filter(relations::type_id.eq(&relation.type_id))
        .filter(relations::object_id.eq(relation.object_id.get()))
        .first::<DbRelation>(conn)
        .optional()
}

fn insert_relation(
    conn: &mut SqliteConnection,
    relation: &NewRelation,
    now: NaiveDateTime,
) -> QueryResult<DbRelation> {
    use crate::schema::relations;

    diesel::insert_into(relations::table)
        .values(&DbNewRelation {
            user_id: relation.user_id.get(),
            subject_id: relation.subject_id.get(),
            type_id: &relation.type_id,
            object_id: relation.object_id.get(),
            created_at: now,
        })
        .get_result::<DbRelation>(conn)
}

/// Stores `relation` and its symmetric one, linking them; must run inside a transaction.
/// An existing relation is returned unchanged.
fn insert_relation_pair(
    conn: &mut SqliteConnection,
    relation: &NewRelation,
    now: NaiveDateTime,
) -> QueryResult<DbRelation> {
    use crate::schema::{relation_types, relations};

    if let Some(existing) = find_relation(conn, relation)? {
        return Ok(existing);
    }

    let symmetric_type_id = relation_types::table
        .find(&relation.type_id)
        .select(relation_types::symmetric_type_id)
        .first::<String>(conn)?;
    let symmetric = relation.symmetric(&symmetric_type_id);

    let forward = insert_relation(conn, relation, now)?;
    let backward = if symmetric == *relation {
        forward.clone()
    } else {
        match find_relation(conn, &symmetric)? {
            Some(existing) => existing,
            None => insert_relation(conn, &symmetric, now)?,
        }
    };

    diesel::update(relations::table.find(backward.id))
        .set(relations::symmetric_relation_id.eq(forward.id))
        .execute(conn)?;
    diesel::update(relations::table.find(forward.id))
        .set(relations::symmetric_relation_id.eq(backward.id))
        .get_result::<DbRelation>(conn)
}
