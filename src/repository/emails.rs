//! Repository implementation for mailing list membership, campaigns and sendings.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::{
    domain::{
        emails::{
            EmailSending, LightWeightEmail, ListMemberKind, MailStatus, NewEmailSending,
            NewLightWeightEmail, SendingState,
        },
        types::{EntityId, PublicId, SendingId},
    },
    models::emails::{
        CampaignMailingList, EmailSending as DbSending, LightWeightEmail as DbLightWeightEmail,
        MailingListChild, MailingListContact, MailingListOrganisation, NewEmailRecipient,
        NewEmailSending as DbNewSending,
    },
    repository::{
        DieselRepository, EmailReader, EmailWriter,
        errors::{RepositoryError, RepositoryResult},
    },
};

fn into_entity_ids(ids: Vec<i32>) -> RepositoryResult<Vec<EntityId>> {
    ids.into_iter()
        .map(|id| EntityId::new(id).map_err(RepositoryError::from))
        .collect()
}

fn into_sendings(rows: Vec<DbSending>) -> RepositoryResult<Vec<EmailSending>> {
    rows.into_iter()
        .map(|sending| EmailSending::try_from(sending).map_err(RepositoryError::from))
        .collect()
}

impl EmailReader for DieselRepository {
    fn list_members(
        &self,
        ml_id: EntityId,
        kind: ListMemberKind,
    ) -> RepositoryResult<Vec<EntityId>> {
        use crate::schema::{mailing_list_children, mailing_list_contacts, mailing_list_organisations};

        let mut conn = self.conn()?;
        let ids = match kind {
            ListMemberKind::Contact => mailing_list_contacts::table
                .filter(mailing_list_contacts::ml_id.eq(ml_id.get()))
                .select(mailing_list_contacts::contact_id)
                .order(mailing_list_contacts::contact_id.asc())
                .load::<i32>(&mut conn)?,
            ListMemberKind::Organisation => mailing_list_organisations::table
                .filter(mailing_list_organisations::ml_id.eq(ml_id.get()))
                .select(mailing_list_organisations::organisation_id)
                .order(mailing_list_organisations::organisation_id.asc())
                .load::<i32>(&mut conn)?,
            ListMemberKind::ChildList => mailing_list_children::table
                .filter(mailing_list_children::parent_id.eq(ml_id.get()))
                .select(mailing_list_children::child_id)
                .order(mailing_list_children::child_id.asc())
                .load::<i32>(&mut conn)?,
        };

        into_entity_ids(ids)
    }

    fn list_children_map(&self) -> RepositoryResult<HashMap<EntityId, Vec<EntityId>>> {
        use crate::schema::mailing_list_children;

        let mut conn = self.conn()?;
        let rows = mailing_list_children::table.load::<MailingListChild>(&mut conn)?;

        let mut children: HashMap<EntityId, Vec<EntityId>> = HashMap::new();
        for row in rows {
            children
                .entry(EntityId::new(row.parent_id)?)
                .or_default()
                .push(EntityId::new(row.child_id)?);
        }
        Ok(children)
    }

    fn list_recipients(&self, ml_id: EntityId) -> RepositoryResult<Vec<String>> {
        use crate::schema::email_recipients;

        let mut conn = self.conn()?;
        let addresses = email_recipients::table
            .filter(email_recipients::ml_id.eq(ml_id.get()))
            .select(email_recipients::address)
            .order(email_recipients::address.asc())
            .load::<String>(&mut conn)?;
        Ok(addresses)
    }

    fn list_campaign_lists(&self, campaign_id: EntityId) -> RepositoryResult<Vec<EntityId>> {
        use crate::schema::campaign_mailing_lists;

        let mut conn = self.conn()?;
        let ids = campaign_mailing_lists::table
            .filter(campaign_mailing_lists::campaign_id.eq(campaign_id.get()))
            .select(campaign_mailing_lists::ml_id)
            .order(campaign_mailing_lists::ml_id.asc())
            .load::<i32>(&mut conn)?;
        into_entity_ids(ids)
    }

    fn list_sendings(&self, campaign_id: EntityId) -> RepositoryResult<Vec<EmailSending>> {
        use crate::schema::email_sendings;

        let mut conn = self.conn()?;
        let rows = email_sendings::table
            .filter(email_sendings::campaign_id.eq(campaign_id.get()))
            .order(email_sendings::sending_date.desc())
            .load::<DbSending>(&mut conn)?;
        into_sendings(rows)
    }

    fn get_sending(&self, id: SendingId) -> RepositoryResult<Option<EmailSending>> {
        use crate::schema::email_sendings;

        let mut conn = self.conn()?;
        let sending = email_sendings::table
            .find(id.get())
            .first::<DbSending>(&mut conn)
            .optional()?;

        sending
            .map(EmailSending::try_from)
            .transpose()
            .map_err(RepositoryError::from)
    }

    fn list_due_sendings(&self, now: NaiveDateTime) -> RepositoryResult<Vec<EmailSending>> {
        use crate::schema::email_sendings;

        let mut conn = self.conn()?;
        let rows = email_sendings::table
            .filter(email_sendings::state.eq(SendingState::Planned.code()))
            .filter(email_sendings::sending_date.le(now))
            .order(email_sendings::sending_date.asc())
            .load::<DbSending>(&mut conn)?;
        into_sendings(rows)
    }

    fn list_mails(&self, sending_id: SendingId) -> RepositoryResult<Vec<LightWeightEmail>> {
        use crate::schema::lightweight_emails;

        let mut conn = self.conn()?;
        lightweight_emails::table
            .filter(lightweight_emails::sending_id.eq(sending_id.get()))
            .order(lightweight_emails::recipient.asc())
            .load::<DbLightWeightEmail>(&mut conn)?
            .into_iter()
            .map(|mail| LightWeightEmail::try_from(mail).map_err(RepositoryError::from))
            .collect()
    }
}

impl EmailWriter for DieselRepository {
    fn add_members(
        &self,
        ml_id: EntityId,
        kind: ListMemberKind,
        member_ids: &[EntityId],
    ) -> RepositoryResult<usize> {
        use crate::schema::{mailing_list_children, mailing_list_contacts, mailing_list_organisations};

        let mut conn = self.conn()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let mut added = 0;
            for member_id in member_ids {
                added += match kind {
                    ListMemberKind::Contact => diesel::insert_into(mailing_list_contacts::table)
                        .values(&MailingListContact {
                            ml_id: ml_id.get(),
                            contact_id: member_id.get(),
                        })
                        .on_conflict_do_nothing()
                        .execute(conn)?,
                    ListMemberKind::Organisation => {
                        diesel::insert_into(mailing_list_organisations::table)
                            .values(&MailingListOrganisation {
                                ml_id: ml_id.get(),
                                organisation_id: member_id.get(),
                            })
                            .on_conflict_do_nothing()
                            .execute(conn)?
                    }
                    ListMemberKind::ChildList => diesel::insert_into(mailing_list_children::table)
                        .values(&MailingListChild {
                            parent_id: ml_id.get(),
                            child_id: member_id.get(),
                        })
                        .on_conflict_do_nothing()
                        .execute(conn)?,
                };
            }
            Ok(added)
        })
        .map_err(RepositoryError::from)
    }

    fn remove_member(
        &self,
        ml_id: EntityId,
        kind: ListMemberKind,
        member_id: EntityId,
    ) -> RepositoryResult<()> {
        use crate::schema::{mailing_list_children, mailing_list_contacts, mailing_list_organisations};

        let mut conn = self.conn()?;
        match kind {
            ListMemberKind::Contact => diesel::delete(
                mailing_list_contacts::table
                    .filter(mailing_list_contacts::ml_id.eq(ml_id.get()))
                    .filter(mailing_list_contacts::contact_id.eq(member_id.get())),
            )
            .execute(&mut conn)?,
            ListMemberKind::Organisation => diesel::delete(
                mailing_list_organisations::table
                    .filter(mailing_list_organisations::ml_id.eq(ml_id.get()))
                    .filter(mailing_list_organisations::organisation_id.eq(member_id.get())),
            )
            .execute(&mut conn)?,
            ListMemberKind::ChildList => diesel::delete(
                mailing_list_children::table
                    .filter(mailing_list_children::parent_id.eq(ml_id.get()))
                    .filter(mailing_list_children::child_id.eq(member_id.get())),
            )
            .execute(&mut conn)?,
        };
        Ok(())
    }

    fn add_recipients(&self, ml_id: EntityId, addresses: &[String]) -> RepositoryResult<usize> {
        use crate::schema::email_recipients;

        let mut conn = self.conn()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let mut added = 0;
            for address in addresses {
                added += diesel::insert_into(email_recipients::table)
                    .values(&NewEmailRecipient {
                        ml_id: ml_id.get(),
                        address,
                    })
                    .on_conflict_do_nothing()
                    .execute(conn)?;
            }
            Ok(added)
        })
        .map_err(RepositoryError::from)
    }

    fn remove_recipient(&self, ml_id: EntityId, address: &str) -> RepositoryResult<()> {
        use crate::schema::email_recipients;

        let mut conn = self.conn()?;
        diesel::delete(
            email_recipients::table
                .filter(email_recipients::ml_id.eq(ml_id.get()))
                .filter(email_recipients::address.eq(address)),
        )
        .execute(&mut conn)?;
        Ok(())
    }

    fn add_campaign_lists(
        &self,
        campaign_id: EntityId,
        ml_ids: &[EntityId],
    ) -> RepositoryResult<usize> {
        use crate::schema::campaign_mailing_lists;

        let mut conn = self.conn()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let mut added = 0;
            for ml_id in ml_ids {
                added += diesel::insert_into(campaign_mailing_lists::table)
                    .values(&CampaignMailingList {
                        campaign_id: campaign_id.get(),
                        ml_id: ml_id.get(),
                    })
                    .on_conflict_do_nothing()
                    .execute(conn)?;
            }
            Ok(added)
        })
        .map_err(RepositoryError::from)
    }

    fn remove_campaign_list(&self, campaign_id: EntityId, ml_id: EntityId) -> RepositoryResult<()> {
        use crate::schema::campaign_mailing_lists;

        let mut conn = self.conn()?;
        diesel::delete(
            campaign_mailing_lists::table
                .filter(campaign_mailing_lists::campaign_id.eq(campaign_id.get()))
                .filter(campaign_mailing_lists::ml_id.eq(ml_id.get())),
        )
        .execute(&mut conn)?;
        Ok(())
    }

    fn create_sending(
        &self,
        sending: &NewEmailSending,
        mails: &[NewLightWeightEmail],
    ) -> RepositoryResult<EmailSending> {
        use crate::schema::{email_sendings, lightweight_emails};

        let mut conn = self.conn()?;
        let stored = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let stored = diesel::insert_into(email_sendings::table)
                .values(&DbNewSending::from(sending))
                .get_result::<DbSending>(conn)?;

            let rows = mails
                .iter()
                .map(|mail| DbLightWeightEmail::pending(stored.id, mail))
                .collect::<Vec<_>>();
            diesel::insert_into(lightweight_emails::table)
                .values(&rows)
                .execute(conn)?;

            Ok(stored)
        })?;

        EmailSending::try_from(stored).map_err(RepositoryError::from)
    }

    fn set_sending_state(&self, id: SendingId, state: SendingState) -> RepositoryResult<()> {
        use crate::schema::email_sendings;

        let mut conn = self.conn()?;
        let affected = diesel::update(email_sendings::table.find(id.get()))
            .set(email_sendings::state.eq(state.code()))
            .execute(&mut conn)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn delete_sending(&self, id: SendingId) -> RepositoryResult<()> {
        use crate::schema::{email_sendings, lightweight_emails};

        let mut conn = self.conn()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::delete(lightweight_emails::table.filter(lightweight_emails::sending_id.eq(id.get())))
                .execute(conn)?;
            let affected = diesel::delete(email_sendings::table.find(id.get())).execute(conn)?;
            if affected == 0 {
                return Err(diesel::result::Error::NotFound);
            }
            Ok(())
        })
        .map_err(RepositoryError::from)
    }

    fn set_mail_status(
        &self,
        id: &PublicId,
        status: MailStatus,
        sent_at: Option<NaiveDateTime>,
    ) -> RepositoryResult<()> {
        use crate::schema::lightweight_emails;

        let mut conn = self.conn()?;
        diesel::update(lightweight_emails::table.find(id.to_string()))
            .set((
                lightweight_emails::status.eq(status.code()),
                lightweight_emails::sending_date.eq(sent_at),
            ))
            .execute(&mut conn)?;
        Ok(())
    }
}

