//! Mailing lists, campaigns and sendings.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::emails::{
    EmailError, EmailSending, ListMemberKind, MailStatus, NewEmailSending, NewLightWeightEmail,
    OutgoingMail, Recipient, RecipientVars, SendingKind, SendingState, creates_cycle,
    dedup_recipients, descendants,
};
use crate::domain::entity::{CremeEntity, EntityKind};
use crate::domain::entity_data::{AnyEntity, EntityData};
use crate::domain::types::{EntityId, SendingId};
use crate::domain::user::User;
use crate::dto::emails::{CampaignPageData, MailingListPageData, SendingPageData};
use crate::forms::emails::SendingPayload;
use crate::repository::{EmailReader, EmailWriter, EntityReader};
use crate::services::entities::{ensure_live, get_live_entity};
use crate::services::users::ensure_can_edit;
use crate::services::{ServiceError, ServiceResult};

#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Delivers rendered mails.
pub trait MailTransport {
    fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError>;
}

/// Transport that only logs the mails; used when no SMTP relay is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl MailTransport for LogTransport {
    fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        log::info!(
            "Mail from {} to {}: {}",
            mail.sender,
            mail.recipient,
            mail.subject
        );
        Ok(())
    }
}

/// Outcome of one pass over the due sendings.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub sendings: usize,
    pub sent: usize,
    pub failed: usize,
}

fn editable_list<R>(repo: &R, user: &User, id: EntityId, kind: EntityKind) -> ServiceResult<AnyEntity>
where
    R: EntityReader + ?Sized,
{
    let entity = get_live_entity(repo, id, kind)?;
    ensure_can_edit(user, &entity.base)?;
    Ok(entity)
}

/// Adds contacts, organisations or child lists to a mailing list.
///
/// Returns how many members were new.
pub fn add_members<R>(
    repo: &R,
    user: &User,
    ml_id: EntityId,
    kind: ListMemberKind,
    member_ids: &[EntityId],
) -> ServiceResult<usize>
where
    R: EntityReader + EmailReader + EmailWriter + ?Sized,
{
    editable_list(repo, user, ml_id, EntityKind::MailingList)?;
    let members = repo.get_entities(member_ids)?;
    if members.len() != member_ids.len() {
        return Err(ServiceError::NotFound);
    }
    for member in &members {
        ensure_live(&member.base)?;
        if member.base.kind != kind.entity_kind() {
            return Err(ServiceError::Form(format!(
                "\"{}\" is not a {}",
                member.base.label(),
                kind.entity_kind().verbose_name()
            )));
        }
    }
    if kind == ListMemberKind::ChildList {
        let mut children = repo.list_children_map()?;
        for child in member_ids {
            if creates_cycle(&children, ml_id, *child) {
                return Err(EmailError::MailingListCycle.into());
            }
            children.entry(ml_id).or_default().push(*child);
        }
    }
    let added = repo.add_members(ml_id, kind, member_ids)?;
    log::info!("{added} members added to mailing list {ml_id}");
    Ok(added)
}

pub fn remove_member<R>(
    repo: &R,
    user: &User,
    ml_id: EntityId,
    kind: ListMemberKind,
    member_id: EntityId,
) -> ServiceResult<()>
where
    R: EntityReader + EmailWriter + ?Sized,
{
    editable_list(repo, user, ml_id, EntityKind::MailingList)?;
    repo.remove_member(ml_id, kind, member_id)?;
    Ok(())
}

/// Attaches free addresses to a mailing list.
pub fn add_recipients<R>(
    repo: &R,
    user: &User,
    ml_id: EntityId,
    addresses: &[String],
) -> ServiceResult<usize>
where
    R: EntityReader + EmailWriter + ?Sized,
{
    editable_list(repo, user, ml_id, EntityKind::MailingList)?;
    Ok(repo.add_recipients(ml_id, addresses)?)
}

pub fn remove_recipient<R>(repo: &R, user: &User, ml_id: EntityId, address: &str) -> ServiceResult<()>
where
    R: EntityReader + EmailWriter + ?Sized,
{
    editable_list(repo, user, ml_id, EntityKind::MailingList)?;
    repo.remove_recipient(ml_id, address)?;
    Ok(())
}

pub fn add_campaign_lists<R>(
    repo: &R,
    user: &User,
    campaign_id: EntityId,
    ml_ids: &[EntityId],
) -> ServiceResult<usize>
where
    R: EntityReader + EmailWriter + ?Sized,
{
    editable_list(repo, user, campaign_id, EntityKind::EmailCampaign)?;
    for ml_id in ml_ids {
        get_live_entity(repo, *ml_id, EntityKind::MailingList)?;
    }
    Ok(repo.add_campaign_lists(campaign_id, ml_ids)?)
}

pub fn remove_campaign_list<R>(
    repo: &R,
    user: &User,
    campaign_id: EntityId,
    ml_id: EntityId,
) -> ServiceResult<()>
where
    R: EntityReader + EmailWriter + ?Sized,
{
    editable_list(repo, user, campaign_id, EntityKind::EmailCampaign)?;
    repo.remove_campaign_list(campaign_id, ml_id)?;
    Ok(())
}

fn entity_recipient(entity: &AnyEntity) -> Option<Recipient> {
    if entity.base.is_deleted {
        return None;
    }
    let (email, vars) = match &entity.data {
        EntityData::Contact(contact) => (
            contact.email.as_deref(),
            RecipientVars {
                first_name: contact.first_name.clone(),
                last_name: contact.last_name.clone(),
                civility: contact.civility.clone().unwrap_or_default(),
                name: String::new(),
            },
        ),
        EntityData::Organisation(organisation) => (
            organisation.email.as_deref(),
            RecipientVars {
                name: organisation.name.clone(),
                ..RecipientVars::default()
            },
        ),
        _ => return None,
    };
    Some(Recipient {
        address: email?.to_string(),
        entity_id: Some(entity.id()),
        vars,
    })
}

/// Every address reached by the campaign's lists and their children,
/// deduplicated. Trashed entities and entities without email are skipped,
/// and so are trashed lists together with the children reached through them.
pub fn campaign_recipients<R>(repo: &R, campaign_id: EntityId) -> ServiceResult<Vec<Recipient>>
where
    R: EntityReader + EmailReader + ?Sized,
{
    let mut children = repo.list_children_map()?;
    let roots = repo.list_campaign_lists(campaign_id)?;
    let known: Vec<EntityId> = roots
        .iter()
        .chain(children.values().flatten())
        .copied()
        .collect();
    let trashed: HashSet<EntityId> = repo
        .get_entities(&known)?
        .iter()
        .filter(|entity| entity.base.is_deleted)
        .map(|entity| entity.id())
        .collect();
    for next in children.values_mut() {
        next.retain(|ml_id| !trashed.contains(ml_id));
    }

    let mut lists = Vec::new();
    for root in roots.into_iter().filter(|ml_id| !trashed.contains(ml_id)) {
        for ml_id in descendants(&children, root) {
            if !lists.contains(&ml_id) {
                lists.push(ml_id);
            }
        }
    }

    let mut candidates = Vec::new();
    for ml_id in lists {
        candidates.extend(repo.list_recipients(ml_id)?.into_iter().map(|address| Recipient {
            address,
            entity_id: None,
            vars: RecipientVars::default(),
        }));
        for kind in [ListMemberKind::Contact, ListMemberKind::Organisation] {
            let members = repo.get_entities(&repo.list_members(ml_id, kind)?)?;
            candidates.extend(members.iter().filter_map(entity_recipient));
        }
    }
    Ok(dedup_recipients(candidates))
}

/// Creates a sending of the campaign from a template, with one light weight
/// mail per recipient.
pub fn create_sending<R>(
    repo: &R,
    user: &User,
    campaign_id: EntityId,
    payload: SendingPayload,
    now: NaiveDateTime,
) -> ServiceResult<EmailSending>
where
    R: EntityReader + EmailReader + EmailWriter + ?Sized,
{
    let campaign = editable_list(repo, user, campaign_id, EntityKind::EmailCampaign)?;
    let template = get_live_entity(repo, payload.template_id, EntityKind::EmailTemplate)?;
    let template = template
        .data
        .as_template()
        .ok_or(ServiceError::NotFound)?
        .clone();
    template.validate()?;
    if repo.list_campaign_lists(campaign_id)?.is_empty() {
        return Err(EmailError::NoMailingList.into());
    }

    let sending_date = match payload.kind {
        SendingKind::Immediate => now,
        SendingKind::Deferred => payload.sending_date.unwrap_or(now),
    };
    let new = NewEmailSending {
        campaign_id,
        sender: payload.sender.as_str().to_string(),
        kind: payload.kind,
        sending_date,
        subject: template.subject,
        body: template.body,
        body_html: template.body_html,
    };
    let mails = campaign_recipients(repo, campaign_id)?
        .iter()
        .map(NewLightWeightEmail::new)
        .collect::<Result<Vec<_>, _>>()?;
    let sending = repo.create_sending(&new, &mails)?;
    log::info!(
        "Sending {} of campaign \"{}\" planned for {} with {} mails",
        sending.id,
        campaign.base.label(),
        sending.sending_date,
        mails.len()
    );
    Ok(sending)
}

pub fn delete_sending<R>(repo: &R, user: &User, id: SendingId) -> ServiceResult<()>
where
    R: EntityReader + EmailReader + EmailWriter + ?Sized,
{
    let sending = repo.get_sending(id)?.ok_or(ServiceError::NotFound)?;
    editable_list(repo, user, sending.campaign_id, EntityKind::EmailCampaign)?;
    repo.delete_sending(id)?;
    Ok(())
}

/// A sending with its mails.
pub fn sending_detail<R>(repo: &R, id: SendingId) -> ServiceResult<SendingPageData>
where
    R: EntityReader + EmailReader + ?Sized,
{
    let sending = repo.get_sending(id)?.ok_or(ServiceError::NotFound)?;
    let campaign = get_live_entity(repo, sending.campaign_id, EntityKind::EmailCampaign)?;
    let mails = repo.list_mails(id)?;
    Ok(SendingPageData {
        sending,
        campaign: campaign.base,
        mails,
    })
}

fn live_bases<R>(repo: &R, ids: &[EntityId]) -> ServiceResult<Vec<CremeEntity>>
where
    R: EntityReader + ?Sized,
{
    let mut entities: Vec<CremeEntity> = repo
        .get_entities(ids)?
        .into_iter()
        .filter(|entity| !entity.base.is_deleted)
        .map(|entity| entity.base)
        .collect();
    entities.sort_by_cached_key(|entity| entity.label().to_lowercase());
    Ok(entities)
}

/// Members of a mailing list, for its detail page.
pub fn mailing_list_page<R>(repo: &R, ml_id: EntityId) -> ServiceResult<MailingListPageData>
where
    R: EntityReader + EmailReader + ?Sized,
{
    get_live_entity(repo, ml_id, EntityKind::MailingList)?;
    Ok(MailingListPageData {
        contacts: live_bases(repo, &repo.list_members(ml_id, ListMemberKind::Contact)?)?,
        organisations: live_bases(repo, &repo.list_members(ml_id, ListMemberKind::Organisation)?)?,
        children: live_bases(repo, &repo.list_members(ml_id, ListMemberKind::ChildList)?)?,
        recipients: repo.list_recipients(ml_id)?,
    })
}

/// Lists and sendings of a campaign, for its detail page.
pub fn campaign_page<R>(repo: &R, campaign_id: EntityId) -> ServiceResult<CampaignPageData>
where
    R: EntityReader + EmailReader + ?Sized,
{
    get_live_entity(repo, campaign_id, EntityKind::EmailCampaign)?;
    Ok(CampaignPageData {
        mailing_lists: live_bases(repo, &repo.list_campaign_lists(campaign_id)?)?,
        sendings: repo.list_sendings(campaign_id)?,
        recipients_count: campaign_recipients(repo, campaign_id)?.len(),
    })
}

fn send_sending<R, T>(
    repo: &R,
    transport: &T,
    sending: &EmailSending,
    now: NaiveDateTime,
    report: &mut SendReport,
) -> ServiceResult<()>
where
    R: EmailReader + EmailWriter + ?Sized,
    T: MailTransport + ?Sized,
{
    repo.set_sending_state(sending.id, SendingState::InProgress)?;
    let mut failed = false;
    for mail in repo.list_mails(sending.id)? {
        if mail.status == MailStatus::Sent {
            continue;
        }
        let delivered = OutgoingMail::render(sending, &mail)
            .map_err(|err| TransportError(err.to_string()))
            .and_then(|outgoing| transport.send(&outgoing));
        match delivered {
            Ok(()) => {
                repo.set_mail_status(&mail.id, MailStatus::Sent, Some(now))?;
                report.sent += 1;
            }
            Err(err) => {
                log::error!("Failed to send mail to {}: {err}", mail.recipient);
                repo.set_mail_status(&mail.id, MailStatus::SendingError, None)?;
                report.failed += 1;
                failed = true;
            }
        }
    }
    let state = if failed {
        SendingState::Error
    } else {
        SendingState::Done
    };
    repo.set_sending_state(sending.id, state)?;
    Ok(())
}

/// Sends every planned sending whose date has come.
///
/// A failing mail marks itself and its sending in error without stopping
/// the batch.
pub fn send_due_sendings<R, T>(repo: &R, transport: &T, now: NaiveDateTime) -> ServiceResult<SendReport>
where
    R: EmailReader + EmailWriter + ?Sized,
    T: MailTransport + ?Sized,
{
    let mut report = SendReport::default();
    for sending in repo.list_due_sendings(now)? {
        if !sending.is_due(now) {
            continue;
        }
        send_sending(repo, transport, &sending, now, &mut report)?;
        report.sendings += 1;
    }
    Ok(report)
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::domain::emails::{EmailTemplate, LightWeightEmail, MailingList};
    use crate::domain::persons::{Contact, Organisation};
    use crate::domain::types::{Email, PublicId};
    use crate::repository::mock::MockRepository;
    use crate::services::users::test_support::{base, user_from, viewer_auth};

    fn id(value: i32) -> EntityId {
        EntityId::new(value).expect("valid id")
    }

    fn list(list_id: i32) -> AnyEntity {
        AnyEntity {
            base: base(list_id, EntityKind::MailingList, 2, "Bounty hunters"),
            data: EntityData::MailingList(MailingList {
                name: "Bounty hunters".into(),
            }),
        }
    }

    fn contact(contact_id: i32, email: Option<&str>, deleted: bool) -> AnyEntity {
        let mut data = Contact::new("Spike", "Spiegel");
        data.email = email.map(str::to_string);
        let mut entity = AnyEntity {
            base: base(contact_id, EntityKind::Contact, 2, "Spike Spiegel"),
            data: EntityData::Contact(data),
        };
        entity.base.is_deleted = deleted;
        entity
    }

    fn sending(sending_id: i32) -> EmailSending {
        EmailSending {
            id: SendingId::new(sending_id).expect("valid id"),
            campaign_id: id(1),
            sender: "jet@bebop.mars".into(),
            kind: SendingKind::Immediate,
            sending_date: NaiveDateTime::default(),
            state: SendingState::Planned,
            subject: "Hello {{ first_name }}".into(),
            body: "Bounty".into(),
            body_html: String::new(),
        }
    }

    fn mail(recipient: &str) -> LightWeightEmail {
        LightWeightEmail {
            id: PublicId::new(),
            sending_id: SendingId::new(1).expect("valid id"),
            recipient: recipient.into(),
            recipient_entity_id: None,
            status: MailStatus::NotSent,
            sending_date: None,
            body: "{\"first_name\":\"Faye\"}".into(),
        }
    }

    #[derive(Default)]
    struct FlakyTransport {
        sent: Mutex<Vec<String>>,
    }

    impl MailTransport for FlakyTransport {
        fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
            if mail.recipient.starts_with("broken") {
                return Err(TransportError("mailbox unavailable".into()));
            }
            self.sent
                .lock()
                .expect("lock")
                .push(format!("{}: {}", mail.recipient, mail.subject));
            Ok(())
        }
    }

    #[test]
    fn child_lists_cannot_create_cycles() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_get_entity().returning(|id| Ok(Some(list(id.get()))));
        repo.expect_get_entities()
            .returning(|ids| Ok(ids.iter().map(|id| list(id.get())).collect()));
        repo.expect_list_children_map().returning(|| {
            let mut children = HashMap::new();
            children.insert(id(2), vec![id(1)]);
            Ok(children)
        });
        repo.expect_add_members().never();

        assert!(matches!(
            add_members(&repo, &user, id(1), ListMemberKind::ChildList, &[id(2)]),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn recipients_follow_child_lists_and_skip_unreachable_entities() {
        let mut repo = MockRepository::new();
        repo.expect_list_children_map().returning(|| {
            let mut children = HashMap::new();
            children.insert(id(10), vec![id(11)]);
            Ok(children)
        });
        repo.expect_list_campaign_lists().returning(|_| Ok(vec![id(10)]));
        repo.expect_list_recipients().returning(|ml_id| {
            Ok(if ml_id.get() == 11 {
                vec!["SPIKE@bebop.mars".to_string(), "ed@bebop.mars".to_string()]
            } else {
                vec![]
            })
        });
        repo.expect_list_members().returning(|ml_id, kind| {
            Ok(match (ml_id.get(), kind) {
                (10, ListMemberKind::Contact) => vec![id(3), id(4), id(5)],
                (10, ListMemberKind::Organisation) => vec![id(6)],
                _ => vec![],
            })
        });
        repo.expect_get_entities().returning(|ids| {
            Ok(ids
                .iter()
                .map(|entity_id| match entity_id.get() {
                    3 => contact(3, Some("spike@bebop.mars"), false),
                    4 => contact(4, None, false),
                    5 => contact(5, Some("vicious@red.dragon"), true),
                    other => {
                        let mut data = Organisation::new("Red Dragon");
                        data.email = Some("boss@red.dragon".into());
                        AnyEntity {
                            base: base(other, EntityKind::Organisation, 1, "Red Dragon"),
                            data: EntityData::Organisation(data),
                        }
                    }
                })
                .collect())
        });

        let recipients = campaign_recipients(&repo, id(1)).expect("recipients");
        let addresses: Vec<_> = recipients.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(
            addresses,
            vec!["spike@bebop.mars", "boss@red.dragon", "ed@bebop.mars"]
        );
        assert_eq!(recipients[0].vars.first_name, "Spike");
        assert_eq!(recipients[1].vars.name, "Red Dragon");
    }

    #[test]
    fn trashed_child_lists_are_not_expanded() {
        let mut repo = MockRepository::new();
        repo.expect_list_children_map().returning(|| {
            let mut children = HashMap::new();
            children.insert(id(10), vec![id(11)]);
            children.insert(id(11), vec![id(12)]);
            Ok(children)
        });
        repo.expect_list_campaign_lists().returning(|_| Ok(vec![id(10)]));
        repo.expect_get_entities().returning(|ids| {
            Ok(ids
                .iter()
                .map(|ml_id| {
                    let mut entity = list(ml_id.get());
                    entity.base.is_deleted = ml_id.get() == 11;
                    entity
                })
                .collect())
        });
        repo.expect_list_recipients().returning(|ml_id| {
            Ok(vec![format!("list{}@bebop.mars", ml_id.get())])
        });
        repo.expect_list_members().returning(|_, _| Ok(vec![]));

        let recipients = campaign_recipients(&repo, id(1)).expect("recipients");
        let addresses: Vec<_> = recipients.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(addresses, vec!["list10@bebop.mars"]);
    }

    #[test]
    fn sendings_carry_one_pending_mail_per_recipient() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_get_entity().returning(|entity_id| {
            Ok(Some(if entity_id.get() == 1 {
                AnyEntity {
                    base: base(1, EntityKind::EmailCampaign, 2, "Bounties"),
                    data: EntityData::EmailCampaign(Default::default()),
                }
            } else {
                AnyEntity {
                    base: base(entity_id.get(), EntityKind::EmailTemplate, 2, "Hello"),
                    data: EntityData::EmailTemplate(EmailTemplate {
                        name: "Hello".into(),
                        subject: "Hello".into(),
                        ..Default::default()
                    }),
                }
            }))
        });
        repo.expect_list_campaign_lists().returning(|_| Ok(vec![id(10)]));
        repo.expect_list_children_map().returning(|| Ok(HashMap::new()));
        repo.expect_get_entities().returning(|ids| {
            Ok(ids
                .iter()
                .map(|entity_id| match entity_id.get() {
                    3 => contact(3, Some("spike@bebop.mars"), false),
                    other => list(other),
                })
                .collect())
        });
        repo.expect_list_recipients()
            .returning(|_| Ok(vec!["ed@bebop.mars".to_string()]));
        repo.expect_list_members().returning(|_, kind| {
            Ok(match kind {
                ListMemberKind::Contact => vec![id(3)],
                _ => vec![],
            })
        });
        repo.expect_create_sending()
            .withf(|new, mails| {
                let recipients: Vec<_> = mails.iter().map(|m| m.recipient.as_str()).collect();
                new.campaign_id == id(1)
                    && recipients == vec!["ed@bebop.mars", "spike@bebop.mars"]
                    && mails[0].recipient_entity_id.is_none()
                    && mails[1].recipient_entity_id == Some(id(3))
            })
            .times(1)
            .returning(|_, _| Ok(sending(5)));

        let payload = SendingPayload {
            sender: Email::new("jet@bebop.mars").expect("valid email"),
            kind: SendingKind::Immediate,
            sending_date: None,
            template_id: id(7),
        };
        let created = create_sending(&repo, &user, id(1), payload, NaiveDateTime::default())
            .expect("sending created");
        assert_eq!(created.id, SendingId::new(5).expect("valid id"));
    }

    #[test]
    fn campaigns_without_lists_cannot_send() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_get_entity().returning(|entity_id| {
            Ok(Some(if entity_id.get() == 1 {
                AnyEntity {
                    base: base(1, EntityKind::EmailCampaign, 2, "Bounties"),
                    data: EntityData::EmailCampaign(Default::default()),
                }
            } else {
                AnyEntity {
                    base: base(entity_id.get(), EntityKind::EmailTemplate, 2, "Hello"),
                    data: EntityData::EmailTemplate(EmailTemplate {
                        name: "Hello".into(),
                        subject: "Hello".into(),
                        ..Default::default()
                    }),
                }
            }))
        });
        repo.expect_list_campaign_lists().returning(|_| Ok(vec![]));
        repo.expect_create_sending().never();

        let payload = SendingPayload {
            sender: Email::new("jet@bebop.mars").expect("valid email"),
            kind: SendingKind::Immediate,
            sending_date: None,
            template_id: id(7),
        };
        assert!(
            create_sending(&repo, &user, id(1), payload, NaiveDateTime::default()).is_err()
        );
    }

    #[test]
    fn one_failing_mail_does_not_stop_the_batch() {
        let mut repo = MockRepository::new();
        repo.expect_list_due_sendings()
            .returning(|_| Ok(vec![sending(1)]));
        repo.expect_list_mails().returning(|_| {
            let mut done = mail("jet@bebop.mars");
            done.status = MailStatus::Sent;
            Ok(vec![mail("broken@bebop.mars"), mail("faye@bebop.mars"), done])
        });
        repo.expect_set_mail_status()
            .times(2)
            .returning(|_, _, _| Ok(()));
        repo.expect_set_sending_state()
            .withf(|_, state| *state == SendingState::InProgress)
            .times(1)
            .returning(|_, _| Ok(()));
        repo.expect_set_sending_state()
            .withf(|_, state| *state == SendingState::Error)
            .times(1)
            .returning(|_, _| Ok(()));

        let transport = FlakyTransport::default();
        let report =
            send_due_sendings(&repo, &transport, NaiveDateTime::default()).expect("batch ran");

        assert_eq!(
            report,
            SendReport {
                sendings: 1,
                sent: 1,
                failed: 1
            }
        );
        assert_eq!(
            *transport.sent.lock().expect("lock"),
            vec!["faye@bebop.mars: Hello Faye".to_string()]
        );
    }
}
