//! Repository implementation for billing statuses, lines, totals and numbering.

use diesel::dsl::max;
use diesel::prelude::*;

use crate::{
    domain::{
        billing::{BillingStatus, Line, LineData, NumberingConfig, Totals},
        entity::EntityKind,
        types::{EntityId, LineId, StatusId},
    },
    models::billing::{
        BillingLine as DbLine, BillingStatus as DbStatus, NewBillingLine,
        NewNumberingConfig, NumberingConfig as DbNumberingConfig,
    },
    repository::{
        BillingReader, BillingWriter, DieselRepository,
        errors::{RepositoryError, RepositoryResult},
    },
};

impl BillingReader for DieselRepository {
    fn list_statuses(&self, kind: EntityKind) -> RepositoryResult<Vec<BillingStatus>> {
        use crate::schema::billing_statuses;

        let mut conn = self.conn()?;
        billing_statuses::table
            .filter(billing_statuses::doc_kind.eq(kind.as_str()))
            .order((billing_statuses::position.asc(), billing_statuses::id.asc()))
            .load::<DbStatus>(&mut conn)?
            .into_iter()
            .map(|status| BillingStatus::try_from(status).map_err(RepositoryError::from))
            .collect()
    }

    fn get_status(&self, id: StatusId) -> RepositoryResult<Option<BillingStatus>> {
        use crate::schema::billing_statuses;

        let mut conn = self.conn()?;
        let status = billing_statuses::table
            .find(id.get())
            .first::<DbStatus>(&mut conn)
            .optional()?;

        status
            .map(BillingStatus::try_from)
            .transpose()
            .map_err(RepositoryError::from)
    }

    fn list_lines(&self, document_id: EntityId) -> RepositoryResult<Vec<Line>> {
        use crate::schema::billing_lines;

        let mut conn = self.conn()?;
        billing_lines::table
            .filter(billing_lines::document_id.eq(document_id.get()))
            .order((billing_lines::position.asc(), billing_lines::id.asc()))
            .load::<DbLine>(&mut conn)?
            .into_iter()
            .map(|line| Line::try_from(line).map_err(RepositoryError::from))
            .collect()
    }

    fn get_line(&self, id: LineId) -> RepositoryResult<Option<Line>> {
        use crate::schema::billing_lines;

        let mut conn = self.conn()?;
        let line = billing_lines::table
            .find(id.get())
            .first::<DbLine>(&mut conn)
            .optional()?;

        line.map(Line::try_from)
            .transpose()
            .map_err(RepositoryError::from)
    }
}

impl BillingWriter for DieselRepository {
    fn add_line(&self, document_id: EntityId, line: &LineData) -> RepositoryResult<Line> {
        use crate::schema::billing_lines;

        let mut conn = self.conn()?;
        let stored = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let last_position = billing_lines::table
                .filter(billing_lines::document_id.eq(document_id.get()))
                .select(max(billing_lines::position))
                .first::<Option<i32>>(conn)?;
            let position = last_position.map_or(0, |position| position + 1);

            diesel::insert_into(billing_lines::table)
                .values(&NewBillingLine::from_domain(document_id, position, line))
                .get_result::<DbLine>(conn)
        })?;

        Line::try_from(stored).map_err(RepositoryError::from)
    }

    fn update_line(&self, id: LineId, line: &LineData) -> RepositoryResult<Line> {
        use crate::schema::billing_lines;

        let mut conn = self.conn()?;
        let stored = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let current = billing_lines::table
                .find(id.get())
                .first::<DbLine>(conn)?;
            let document_id = EntityId::new(current.document_id)
                .map_err(|err| diesel::result::Error::DeserializationError(Box::new(err)))?;

            diesel::update(billing_lines::table.find(id.get()))
                .set(&NewBillingLine::from_domain(document_id, current.position, line))
                .get_result::<DbLine>(conn)
        })?;

        Line::try_from(stored).map_err(RepositoryError::from)
    }

    fn delete_line(&self, id: LineId) -> RepositoryResult<()> {
        use crate::schema::billing_lines;

        let mut conn = self.conn()?;
        let affected = diesel::delete(billing_lines::table.find(id.get())).execute(&mut conn)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn set_totals(&self, document_id: EntityId, totals: &Totals) -> RepositoryResult<()> {
        use crate::schema::billing_documents;

        let mut conn = self.conn()?;
        diesel::update(billing_documents::table.find(document_id.get()))
            .set((
                billing_documents::total_no_vat.eq(totals.total_no_vat.hundredths()),
                billing_documents::total_vat.eq(totals.total_vat.hundredths()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    fn next_number(&self, organisation_id: EntityId, kind: EntityKind) -> RepositoryResult<String> {
        use crate::schema::numbering_configs;

        let mut conn = self.conn()?;
        conn.transaction::<_, RepositoryError, _>(|conn| {
            let stored = numbering_configs::table
                .filter(numbering_configs::organisation_id.eq(organisation_id.get()))
                .filter(numbering_configs::doc_kind.eq(kind.as_str()))
                .first::<DbNumberingConfig>(conn)
                .optional()?;

            let (row_id, mut config) = match stored {
                Some(row) => (row.id, NumberingConfig::try_from(row)?),
                None => {
                    let config = NumberingConfig::new(organisation_id, kind);
                    let row = diesel::insert_into(numbering_configs::table)
                        .values(&NewNumberingConfig::from(&config))
                        .get_result::<DbNumberingConfig>(conn)?;
                    (row.id, config)
                }
            };

            let number = config.next_number();
            diesel::update(numbering_configs::table.find(row_id))
                .set(numbering_configs::last_number.eq(config.last_number))
                .execute(conn)?;
            Ok(number)
        })
    }

    fn set_number(&self, document_id: EntityId, number: &str) -> RepositoryResult<()> {
        use crate::schema::billing_documents;

        let mut conn = self.conn()?;
        let affected = diesel::update(billing_documents::table.find(document_id.get()))
            .set(billing_documents::number.eq(number))
            .execute(&mut conn)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
