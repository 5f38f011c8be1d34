//! Repository implementation for entity filters, header filters and custom forms.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::{
    domain::{
        custom_form::CustomFormItem, entity_filter::EntityFilter, header_filter::HeaderFilter,
    },
    models::filters::{
        CustomForm as DbCustomForm, EntityFilter as DbEntityFilter,
        EntityFilterCondition as DbCondition, HeaderFilter as DbHeaderFilter,
        NewEntityFilterCondition,
    },
    repository::{
        DieselRepository, FilterReader, FilterWriter,
        errors::{RepositoryError, RepositoryResult},
    },
};

fn load_entity_filters(
    conn: &mut SqliteConnection,
    filters: Vec<DbEntityFilter>,
) -> RepositoryResult<Vec<EntityFilter>> {
    use crate::schema::entity_filter_conditions;

    let conditions = DbCondition::belonging_to(&filters)
        .order(entity_filter_conditions::id.asc())
        .load::<DbCondition>(conn)?
        .grouped_by(&filters);

    filters
        .into_iter()
        .zip(conditions)
        .map(|pair| EntityFilter::try_from(pair).map_err(RepositoryError::from))
        .collect()
}

/// Inserts or replaces a filter and its conditions.
pub(crate) fn store_entity_filter(
    conn: &mut SqliteConnection,
    filter: &EntityFilter,
) -> RepositoryResult<()> {
    use crate::schema::{entity_filter_conditions, entity_filters};

    let rows = filter
        .conditions
        .iter()
        .map(|condition| condition.to_row())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| RepositoryError::ValidationError(err.to_string()))?;

    let db_filter = DbEntityFilter::from(filter);
    diesel::insert_into(entity_filters::table)
        .values(&db_filter)
        .on_conflict(entity_filters::id)
        .do_update()
        .set(&db_filter)
        .execute(conn)?;

    diesel::delete(
        entity_filter_conditions::table.filter(entity_filter_conditions::filter_id.eq(&filter.id)),
    )
    .execute(conn)?;

    let conditions = rows
        .into_iter()
        .map(|row| NewEntityFilterCondition {
            filter_id: &filter.id,
            kind: row.kind,
            name: row.name,
            value: row.value,
        })
        .collect::<Vec<_>>();
    diesel::insert_into(entity_filter_conditions::table)
        .values(&conditions)
        .execute(conn)?;

    Ok(())
}

pub(crate) fn store_header_filter(
    conn: &mut SqliteConnection,
    filter: &HeaderFilter,
) -> RepositoryResult<()> {
    use crate::schema::header_filters;

    let db_filter = DbHeaderFilter::try_from(filter)?;
    diesel::insert_into(header_filters::table)
        .values(&db_filter)
        .on_conflict(header_filters::id)
        .do_update()
        .set(&db_filter)
        .execute(conn)?;
    Ok(())
}

pub(crate) fn store_custom_form(
    conn: &mut SqliteConnection,
    form: &CustomFormItem,
) -> RepositoryResult<()> {
    use crate::schema::custom_forms;

    let db_form = DbCustomForm::try_from(form)?;
    diesel::insert_into(custom_forms::table)
        .values(&db_form)
        .on_conflict(custom_forms::descriptor_id)
        .do_update()
        .set(custom_forms::groups.eq(&db_form.groups))
        .execute(conn)?;
    Ok(())
}

impl FilterReader for DieselRepository {
    fn list_entity_filters(&self) -> RepositoryResult<Vec<EntityFilter>> {
        use crate::schema::entity_filters;

        let mut conn = self.conn()?;
        let filters = entity_filters::table
            .order((entity_filters::entity_kind.asc(), entity_filters::name.asc()))
            .load::<DbEntityFilter>(&mut conn)?;
        load_entity_filters(&mut conn, filters)
    }

    fn get_entity_filter(&self, id: &str) -> RepositoryResult<Option<EntityFilter>> {
        use crate::schema::entity_filters;

        let mut conn = self.conn()?;
        let filters = entity_filters::table
            .filter(entity_filters::id.eq(id))
            .load::<DbEntityFilter>(&mut conn)?;
        Ok(load_entity_filters(&mut conn, filters)?.into_iter().next())
    }

    fn list_header_filters(&self) -> RepositoryResult<Vec<HeaderFilter>> {
        use crate::schema::header_filters;

        let mut conn = self.conn()?;
        header_filters::table
            .order((header_filters::entity_kind.asc(), header_filters::name.asc()))
            .load::<DbHeaderFilter>(&mut conn)?
            .into_iter()
            .map(|filter| HeaderFilter::try_from(filter).map_err(RepositoryError::from))
            .collect()
    }

    fn get_header_filter(&self, id: &str) -> RepositoryResult<Option<HeaderFilter>> {
        use crate::schema::header_filters;

        let mut conn = self.conn()?;
        let filter = header_filters::table
            .find(id)
            .first::<DbHeaderFilter>(&mut conn)
            .optional()?;

        filter
            .map(HeaderFilter::try_from)
            .transpose()
            .map_err(RepositoryError::from)
    }

    fn list_custom_forms(&self) -> RepositoryResult<Vec<CustomFormItem>> {
        use crate::schema::custom_forms;

        let mut conn = self.conn()?;
        custom_forms::table
            .order(custom_forms::descriptor_id.asc())
            .load::<DbCustomForm>(&mut conn)?
            .into_iter()
            .map(|form| CustomFormItem::try_from(form).map_err(RepositoryError::from))
            .collect()
    }

    fn get_custom_form(&self, descriptor_id: &str) -> RepositoryResult<Option<CustomFormItem>> {
        use crate::schema::custom_forms;

        let mut conn = self.conn()?;
        let form = custom_forms::table
            .find(descriptor_id)
            .first::<DbCustomForm>(&mut conn)
            .optional()?;

        form.map(CustomFormItem::try_from)
            .transpose()
            .map_err(RepositoryError::from)
    }
}

impl FilterWriter for DieselRepository {
    fn save_entity_filter(&self, filter: &EntityFilter) -> RepositoryResult<()> {
        let mut conn = self.conn()?;
        conn.transaction::<_, RepositoryError, _>(|conn| store_entity_filter(conn, filter))
    }

    fn delete_entity_filter(&self, id: &str) -> RepositoryResult<()> {
        use crate::schema::entity_filters;

        let mut conn = self.conn()?;
        let affected = diesel::delete(entity_filters::table.find(id)).execute(&mut conn)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn save_header_filter(&self, filter: &HeaderFilter) -> RepositoryResult<()> {
        let mut conn = self.conn()?;
        store_header_filter(&mut conn, filter)
    }

    fn delete_header_filter(&self, id: &str) -> RepositoryResult<()> {
        use crate::schema::header_filters;

        let mut conn = self.conn()?;
        let affected = diesel::delete(header_filters::table.find(id)).execute(&mut conn)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn save_custom_form(&self, form: &CustomFormItem) -> RepositoryResult<()> {
        let mut conn = self.conn()?;
        store_custom_form(&mut conn, form)
    }

    fn delete_custom_form(&self, descriptor_id: &str) -> RepositoryResult<()> {
        use crate::schema::custom_forms;

        let mut conn = self.conn()?;
        diesel::delete(custom_forms::table.find(descriptor_id)).execute(&mut conn)?;
        Ok(())
    }
}
