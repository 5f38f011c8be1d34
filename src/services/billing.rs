//! Billing documents: parties, lines, totals, numbering and conversions.

use chrono::NaiveDate;

use crate::domain::billing::{
    BillingDocument, BillingError, Line, LineData, Totals, check_conversion, compute_totals,
    needs_number, numbered_at_creation,
};
use crate::domain::entity::{Entity, EntityKind};
use crate::domain::entity_data::{AnyEntity, EntityData};
use crate::domain::relation::ids;
use crate::domain::types::{Decimal2, EntityId, LineId, StatusId};
use crate::domain::user::User;
use crate::dto::billing::DocumentExtras;
use crate::forms::billing::DocumentParties;
use crate::forms::entities::EntityForm;
use crate::repository::{
    ActivityReader, BillingReader, BillingWriter, CustomFieldReader, CustomFieldWriter,
    EntityReader, EntityWriter, FilterReader, PropertyReader, RelationReader, RelationWriter,
    UserReader,
};
use crate::services::entities::{
    check_entity_data, create_entity, ensure_live, get_entity, store_entity, store_new_entity,
    update_entity,
};
use crate::services::relations::{get_relation_type, link_entities};
use crate::services::users::ensure_can_edit;
use crate::services::{ServiceError, ServiceResult};

fn as_document(entity: AnyEntity) -> ServiceResult<Entity<BillingDocument>> {
    if !entity.base.kind.is_billing_document() {
        return Err(ServiceError::NotFound);
    }
    match entity.data {
        EntityData::Document(data) => Ok(Entity {
            base: entity.base,
            data,
        }),
        _ => Err(ServiceError::NotFound),
    }
}

fn into_any(document: Entity<BillingDocument>) -> AnyEntity {
    AnyEntity {
        base: document.base,
        data: EntityData::Document(document.data),
    }
}

/// Live billing document.
pub fn get_document<R>(repo: &R, id: EntityId) -> ServiceResult<Entity<BillingDocument>>
where
    R: EntityReader + ?Sized,
{
    let document = as_document(get_entity(repo, id)?)?;
    ensure_live(&document.base)?;
    Ok(document)
}

/// Emitter and receiver read from the document relations.
pub fn document_parties<R>(repo: &R, id: EntityId) -> ServiceResult<DocumentParties>
where
    R: RelationReader + ?Sized,
{
    let mut parties = DocumentParties::default();
    for relation in repo.list_relations(id)? {
        match relation.type_id.as_str() {
            ids::BILL_ISSUED => parties.source_id = Some(relation.object_id),
            ids::BILL_RECEIVED => parties.target_id = Some(relation.object_id),
            _ => {}
        }
    }
    Ok(parties)
}

/// The emitter must be a managed organisation.
fn check_emitter<R>(repo: &R, id: Option<EntityId>) -> ServiceResult<AnyEntity>
where
    R: EntityReader + ?Sized,
{
    let id = id.ok_or(BillingError::MissingEmitter)?;
    let emitter = get_entity(repo, id)?;
    ensure_live(&emitter.base)?;
    let managed = emitter
        .data
        .as_organisation()
        .is_some_and(|organisation| organisation.is_managed);
    if !managed {
        return Err(BillingError::UnmanagedEmitter.into());
    }
    Ok(emitter)
}

fn check_receiver<R>(repo: &R, id: Option<EntityId>) -> ServiceResult<AnyEntity>
where
    R: EntityReader + ?Sized,
{
    let id = id.ok_or_else(|| ServiceError::Form("the document needs a receiver".to_string()))?;
    let receiver = get_entity(repo, id)?;
    ensure_live(&receiver.base)?;
    if !matches!(
        receiver.base.kind,
        EntityKind::Contact | EntityKind::Organisation
    ) {
        return Err(ServiceError::Form(
            "the receiver must be a contact or an organisation".to_string(),
        ));
    }
    Ok(receiver)
}

fn link_parties<R>(
    repo: &R,
    user: &User,
    document: &AnyEntity,
    emitter: &AnyEntity,
    receiver: &AnyEntity,
) -> ServiceResult<()>
where
    R: RelationReader + RelationWriter + PropertyReader + ?Sized,
{
    let issued = get_relation_type(repo, ids::BILL_ISSUED)?;
    link_entities(repo, user, &document.base, &issued, &emitter.base)?;
    let received = get_relation_type(repo, ids::BILL_RECEIVED)?;
    link_entities(repo, user, &document.base, &received, &receiver.base)?;
    Ok(())
}

fn assign_number<R>(
    repo: &R,
    document_id: EntityId,
    kind: EntityKind,
    emitter_id: EntityId,
) -> ServiceResult<String>
where
    R: BillingWriter + ?Sized,
{
    let number = repo.next_number(emitter_id, kind)?;
    repo.set_number(document_id, &number)?;
    log::info!("Document {document_id} numbered {number}");
    Ok(number)
}

/// Recomputes and caches the totals from the lines.
fn refresh_totals<R>(repo: &R, document_id: EntityId, discount: Decimal2) -> ServiceResult<Totals>
where
    R: BillingReader + BillingWriter + ?Sized,
{
    let lines = repo.list_lines(document_id)?;
    let totals = compute_totals(discount, lines.iter().map(|line| &line.data));
    repo.set_totals(document_id, &totals)?;
    Ok(totals)
}

/// Numbers the document when its kind and status require it.
fn number_if_needed<R>(repo: &R, document: &Entity<BillingDocument>) -> ServiceResult<()>
where
    R: BillingReader + BillingWriter + RelationReader + ?Sized,
{
    let Some(status_id) = document.data.status_id else {
        return Ok(());
    };
    let Some(status) = repo.get_status(status_id)? else {
        return Ok(());
    };
    if !needs_number(document.base.kind, &document.data, &status) {
        return Ok(());
    }
    let Some(emitter_id) = document_parties(repo, document.id())?.source_id else {
        return Err(BillingError::MissingEmitter.into());
    };
    assign_number(repo, document.id(), document.base.kind, emitter_id)?;
    Ok(())
}

/// Creates a document from the entity form with its emitter and receiver.
pub fn create_document<R>(
    repo: &R,
    user: &User,
    kind: EntityKind,
    form: &EntityForm,
    parties: DocumentParties,
) -> ServiceResult<AnyEntity>
where
    R: EntityReader
        + EntityWriter
        + FilterReader
        + CustomFieldReader
        + CustomFieldWriter
        + UserReader
        + ActivityReader
        + BillingReader
        + BillingWriter
        + RelationReader
        + RelationWriter
        + PropertyReader
        + ?Sized,
{
    if !kind.is_billing_document() {
        return Err(BillingError::NotADocument(kind).into());
    }
    let emitter = check_emitter(repo, parties.source_id)?;
    let receiver = check_receiver(repo, parties.target_id)?;

    let document = create_entity(repo, user, kind, form)?;
    link_parties(repo, user, &document, &emitter, &receiver)?;
    if numbered_at_creation(kind) {
        assign_number(repo, document.id(), kind, emitter.id())?;
    }
    get_entity(repo, document.id())
}

/// Updates a document from the entity form.
///
/// Totals follow the global discount and a number is generated when the new
/// status requires one.
pub fn update_document<R>(
    repo: &R,
    user: &User,
    id: EntityId,
    form: &EntityForm,
) -> ServiceResult<AnyEntity>
where
    R: EntityReader
        + EntityWriter
        + FilterReader
        + CustomFieldReader
        + CustomFieldWriter
        + UserReader
        + ActivityReader
        + BillingReader
        + BillingWriter
        + RelationReader
        + ?Sized,
{
    get_document(repo, id)?;
    let document = as_document(update_entity(repo, user, id, form)?)?;
    refresh_totals(repo, id, document.data.discount)?;
    number_if_needed(repo, &document)?;
    get_entity(repo, id)
}

pub fn set_status<R>(
    repo: &R,
    user: &User,
    id: EntityId,
    status_id: StatusId,
) -> ServiceResult<AnyEntity>
where
    R: EntityReader + EntityWriter + BillingReader + BillingWriter + RelationReader + ?Sized,
{
    let mut document = get_document(repo, id)?;
    ensure_can_edit(user, &document.base)?;
    repo.get_status(status_id)?
        .filter(|status| status.doc_kind == document.base.kind)
        .ok_or(BillingError::WrongStatus)?;
    document.data.status_id = Some(status_id);
    let document = as_document(store_entity(repo, into_any(document))?)?;
    number_if_needed(repo, &document)?;
    get_entity(repo, id)
}

/// Explicit number generation; a document keeps its first number.
pub fn generate_number<R>(repo: &R, user: &User, id: EntityId) -> ServiceResult<String>
where
    R: EntityReader + BillingWriter + RelationReader + ?Sized,
{
    let document = get_document(repo, id)?;
    ensure_can_edit(user, &document.base)?;
    if document.data.has_number() {
        return Err(ServiceError::Conflict(format!(
            "the document is already numbered {}",
            document.data.number
        )));
    }
    let emitter_id = document_parties(repo, id)?
        .source_id
        .ok_or(BillingError::MissingEmitter)?;
    assign_number(repo, id, document.base.kind, emitter_id)
}

pub fn add_line<R>(
    repo: &R,
    user: &User,
    document_id: EntityId,
    line: LineData,
) -> ServiceResult<Line>
where
    R: EntityReader + BillingReader + BillingWriter + ?Sized,
{
    let document = get_document(repo, document_id)?;
    ensure_can_edit(user, &document.base)?;
    line.validate()?;
    let created = repo.add_line(document_id, &line)?;
    refresh_totals(repo, document_id, document.data.discount)?;
    Ok(created)
}

fn editable_line<R>(
    repo: &R,
    user: &User,
    line_id: LineId,
) -> ServiceResult<(Line, Entity<BillingDocument>)>
where
    R: EntityReader + BillingReader + ?Sized,
{
    let line = repo.get_line(line_id)?.ok_or(ServiceError::NotFound)?;
    let document = get_document(repo, line.document_id)?;
    ensure_can_edit(user, &document.base)?;
    Ok((line, document))
}

pub fn update_line<R>(repo: &R, user: &User, line_id: LineId, data: LineData) -> ServiceResult<Line>
where
    R: EntityReader + BillingReader + BillingWriter + ?Sized,
{
    let (_, document) = editable_line(repo, user, line_id)?;
    data.validate()?;
    let line = repo.update_line(line_id, &data)?;
    refresh_totals(repo, document.id(), document.data.discount)?;
    Ok(line)
}

pub fn delete_line<R>(repo: &R, user: &User, line_id: LineId) -> ServiceResult<EntityId>
where
    R: EntityReader + BillingReader + BillingWriter + ?Sized,
{
    let (_, document) = editable_line(repo, user, line_id)?;
    repo.delete_line(line_id)?;
    refresh_totals(repo, document.id(), document.data.discount)?;
    Ok(document.id())
}

/// Copies a document into a new one of `target_kind`: fields, lines and
/// parties. Number and status start over.
pub fn copy_document<R>(
    repo: &R,
    owner: &User,
    source: &Entity<BillingDocument>,
    target_kind: EntityKind,
    issuing_date: Option<NaiveDate>,
) -> ServiceResult<AnyEntity>
where
    R: EntityReader
        + EntityWriter
        + ActivityReader
        + BillingReader
        + BillingWriter
        + RelationReader
        + RelationWriter
        + PropertyReader
        + ?Sized,
{
    let parties = document_parties(repo, source.id())?;
    let emitter = check_emitter(repo, parties.source_id)?;
    let receiver = check_receiver(repo, parties.target_id)?;

    let mut copy = source.data.duplicate();
    if let Some(date) = issuing_date {
        if let (Some(issuing), Some(expiration)) = (copy.issuing_date, copy.expiration_date) {
            copy.expiration_date = Some(date + (expiration - issuing));
        }
        copy.issuing_date = Some(date);
    }
    let mut data = EntityData::Document(copy);
    check_entity_data(repo, target_kind, &mut data)?;
    let discount = data
        .as_document()
        .map(|document| document.discount)
        .unwrap_or_default();

    let created = store_new_entity(repo, owner.id, target_kind, &data, &source.base.description)?;
    for line in repo.list_lines(source.id())? {
        repo.add_line(created.id(), &line.data)?;
    }
    refresh_totals(repo, created.id(), discount)?;
    link_parties(repo, owner, &created, &emitter, &receiver)?;
    if numbered_at_creation(target_kind) {
        assign_number(repo, created.id(), target_kind, emitter.id())?;
    }
    Ok(created)
}

/// Converts a quote into an invoice or a sales order, a sales order into an
/// invoice, or an invoice back into a quote or sales order.
pub fn convert<R>(
    repo: &R,
    user: &User,
    id: EntityId,
    target_kind: EntityKind,
) -> ServiceResult<AnyEntity>
where
    R: EntityReader
        + EntityWriter
        + ActivityReader
        + BillingReader
        + BillingWriter
        + RelationReader
        + RelationWriter
        + PropertyReader
        + ?Sized,
{
    let source = get_document(repo, id)?;
    check_conversion(source.base.kind, target_kind)?;
    let created = copy_document(repo, user, &source, target_kind, None)?;
    let rtype = get_relation_type(repo, ids::CONVERTED_INTO)?;
    link_entities(repo, user, &source.base, &rtype, &created.base)?;
    log::info!(
        "{} {id} converted into {} {}",
        source.base.kind.verbose_name(),
        target_kind.verbose_name(),
        created.id()
    );
    get_entity(repo, created.id())
}

/// Lines, statuses, parties and conversions shown on a document page.
pub fn document_extras<R>(repo: &R, id: EntityId) -> ServiceResult<DocumentExtras>
where
    R: EntityReader + BillingReader + RelationReader + ?Sized,
{
    let document = as_document(get_entity(repo, id)?)?;
    let kind = document.base.kind;
    let parties = document_parties(repo, id)?;
    let party = |id: Option<EntityId>| -> ServiceResult<_> {
        Ok(match id {
            Some(id) => repo.get_entity(id)?.map(|entity| entity.base),
            None => None,
        })
    };
    Ok(DocumentExtras {
        lines: repo.list_lines(id)?,
        statuses: repo.list_statuses(kind)?,
        emitter: party(parties.source_id)?,
        receiver: party(parties.target_id)?,
        conversions: EntityKind::ALL
            .into_iter()
            .filter(|target| check_conversion(kind, *target).is_ok())
            .collect(),
    })
}
