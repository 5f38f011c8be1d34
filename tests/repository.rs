use creme_crm::domain::custom_field::{CustomFieldType, CustomValue, NewCustomField};
use creme_crm::domain::emails::{ListMemberKind, MailingList};
use creme_crm::domain::entity::{EntityKind, NewEntity};
use creme_crm::domain::entity_data::EntityData;
use creme_crm::domain::persons::{Contact, Organisation};
use creme_crm::domain::property::NewPropertyType;
use creme_crm::domain::relation::{NewRelation, ids};
use creme_crm::domain::types::{Email, Label, PublicId, UserId, UserName};
use creme_crm::domain::user::UpsertUser;
use creme_crm::repository::{
    BillingWriter, CustomFieldReader, CustomFieldWriter, DieselRepository, EmailReader,
    EmailWriter, EntityListQuery, EntityReader, EntityWriter, JobReader, PropertyReader,
    PropertyWriter, RelationReader, RelationWriter, TrashQuery, UserReader, UserWriter,
};

mod common;

fn root() -> UserId {
    UserId::new(1).expect("seeded root user")
}

fn contact(repo: &DieselRepository, first: &str, last: &str) -> creme_crm::domain::entity_data::AnyEntity {
    repo.create_entity(
        &NewEntity::new(EntityKind::Contact, root(), ""),
        &EntityData::Contact(Contact::new(first, last)),
    )
    .expect("contact created")
}

fn organisation(repo: &DieselRepository, name: &str) -> creme_crm::domain::entity_data::AnyEntity {
    repo.create_entity(
        &NewEntity::new(EntityKind::Organisation, root(), ""),
        &EntityData::Organisation(Organisation::new(name)),
    )
    .expect("organisation created")
}

#[test]
fn test_user_upsert_keeps_one_row_per_email() {
    let test_db = common::TestDb::new("test_user_upsert.db");
    let repo = DieselRepository::new(test_db.pool());
    let email = Email::new("faye@bebop.test").expect("valid email");

    let first = repo
        .upsert_user(&UpsertUser {
            email: email.clone(),
            name: UserName::new("Faye").expect("valid name"),
            is_admin: false,
        })
        .expect("inserted");
    let second = repo
        .upsert_user(&UpsertUser {
            email: email.clone(),
            name: UserName::new("Faye Valentine").expect("valid name"),
            is_admin: true,
        })
        .expect("updated");

    assert_eq!(first.id, second.id);
    assert!(second.is_admin);
    let stored = repo.get_user_by_email(&email).expect("query").expect("user");
    assert_eq!(stored.name.as_str(), "Faye Valentine");
}

#[test]
fn test_entity_lifecycle_and_trash() {
    let test_db = common::TestDb::new("test_entity_lifecycle.db");
    let repo = DieselRepository::new(test_db.pool());
    let spike = contact(&repo, "Spike", "Spiegel");
    contact(&repo, "Jet", "Black");

    assert_eq!(spike.base.label(), "Spike Spiegel");

    let (total, found) = repo
        .list_entities(EntityListQuery::new(EntityKind::Contact).search("Spieg"))
        .expect("search");
    assert_eq!(total, 1);
    assert_eq!(found[0].id, spike.id());

    repo.set_entity_trashed(spike.id(), true).expect("trashed");
    let (live, _) = repo
        .list_entities(EntityListQuery::new(EntityKind::Contact))
        .expect("list");
    assert_eq!(live, 1);
    let (trashed, items) = repo.list_trash(TrashQuery::default()).expect("trash");
    assert_eq!(trashed, 1);
    assert_eq!(items[0].id, spike.id());

    repo.set_entity_trashed(spike.id(), false).expect("restored");
    let mut restored = repo.get_entity(spike.id()).expect("query").expect("entity");
    assert!(!restored.base.is_deleted);

    if let EntityData::Contact(data) = &mut restored.data {
        data.last_name = "Spiegel-Valentine".into();
    }
    let updated = repo.update_entity(&restored).expect("updated");
    assert_eq!(updated.base.label(), "Spike Spiegel-Valentine");

    repo.delete_entity(spike.id()).expect("deleted");
    assert!(repo.get_entity(spike.id()).expect("query").is_none());
}

#[test]
fn test_relations_are_created_with_their_symmetric() {
    let test_db = common::TestDb::new("test_relations.db");
    let repo = DieselRepository::new(test_db.pool());
    let spike = contact(&repo, "Spike", "Spiegel");
    let bebop = organisation(&repo, "Bebop");

    let relation = repo
        .create_relation(&NewRelation::new(
            root(),
            spike.id(),
            ids::EMPLOYED_BY,
            bebop.id(),
        ))
        .expect("relation created");
    let again = repo
        .create_relation(&NewRelation::new(
            root(),
            spike.id(),
            ids::EMPLOYED_BY,
            bebop.id(),
        ))
        .expect("existing relation returned");
    assert_eq!(relation.id, again.id);

    let employs = repo.list_relations(bebop.id()).expect("object relations");
    assert_eq!(employs.len(), 1);
    assert_eq!(employs[0].object_id, spike.id());
    assert_eq!(employs[0].symmetric_relation_id, Some(relation.id));

    let removed = repo
        .delete_relations(spike.id(), &[ids::EMPLOYED_BY.to_string()], None)
        .expect("relations removed");
    assert_eq!(removed, 1);
    assert!(repo.list_relations(bebop.id()).expect("list").is_empty());
}

#[test]
fn test_relation_batches_are_all_or_nothing() {
    let test_db = common::TestDb::new("test_relation_batches.db");
    let repo = DieselRepository::new(test_db.pool());
    let spike = contact(&repo, "Spike", "Spiegel");
    let bebop = organisation(&repo, "Bebop");
    let red_dragon = organisation(&repo, "Red Dragon");

    let batch = [
        NewRelation::new(root(), spike.id(), ids::EMPLOYED_BY, bebop.id()),
        NewRelation::new(root(), spike.id(), "persons-subject_unknown", red_dragon.id()),
    ];
    assert!(repo.create_relations(&batch).is_err());
    assert!(repo.list_relations(spike.id()).expect("list").is_empty());
    assert!(repo.list_relations(bebop.id()).expect("list").is_empty());

    let created = repo.create_relations(&batch[..1]).expect("relations created");
    assert_eq!(created.len(), 1);
    assert_eq!(repo.list_relations(bebop.id()).expect("list").len(), 1);
}

#[test]
fn test_properties_are_added_once() {
    let test_db = common::TestDb::new("test_properties.db");
    let repo = DieselRepository::new(test_db.pool());
    let spike = contact(&repo, "Spike", "Spiegel");
    let ptype = repo
        .create_property_type(&NewPropertyType {
            uuid: PublicId::new(),
            text: Label::new("Bounty hunter").expect("valid label"),
            subject_kinds: vec![EntityKind::Contact],
            is_custom: true,
        })
        .expect("property type created");

    assert!(repo.add_property(spike.id(), ptype.id).expect("added"));
    assert!(!repo.add_property(spike.id(), ptype.id).expect("already there"));
    let properties = repo.list_entity_properties(spike.id()).expect("list");
    assert_eq!(properties.len(), 1);
    assert_eq!(properties[0].text, "Bounty hunter");

    repo.remove_property(spike.id(), ptype.id).expect("removed");
    assert!(repo.list_entity_properties(spike.id()).expect("list").is_empty());
}

#[test]
fn test_custom_fields_store_values_and_choices() {
    let test_db = common::TestDb::new("test_custom_fields.db");
    let repo = DieselRepository::new(test_db.pool());
    let spike = contact(&repo, "Spike", "Spiegel");

    let bounty = repo
        .create_custom_field(&NewCustomField {
            uuid: PublicId::new(),
            name: "Bounty".into(),
            kind: EntityKind::Contact,
            field_type: CustomFieldType::Integer,
            is_required: false,
            choices: Vec::new(),
        })
        .expect("field created");
    let style = repo
        .create_custom_field(&NewCustomField {
            uuid: PublicId::new(),
            name: "Fighting style".into(),
            kind: EntityKind::Contact,
            field_type: CustomFieldType::Enum,
            is_required: false,
            choices: vec!["Jeet Kune Do".into()],
        })
        .expect("choice field created");
    let extra = repo
        .add_enum_value(style.id, "Capoeira")
        .expect("choice added");

    let choices: Vec<_> = repo
        .list_enum_values()
        .expect("choices")
        .into_iter()
        .filter(|choice| choice.custom_field_id == style.id)
        .collect();
    assert_eq!(choices.len(), 2);

    repo.set_custom_value(&bounty, spike.id(), Some(CustomValue::Integer(6_000_000)))
        .expect("value stored");
    repo.set_custom_value(&style, spike.id(), Some(CustomValue::Enum(extra.id)))
        .expect("choice stored");
    let values = repo.get_custom_values(spike.id()).expect("values");
    assert_eq!(values.get(&bounty.id), Some(&CustomValue::Integer(6_000_000)));
    assert_eq!(values.get(&style.id), Some(&CustomValue::Enum(extra.id)));

    repo.set_custom_value(&bounty, spike.id(), None).expect("value cleared");
    assert!(!repo.get_custom_values(spike.id()).expect("values").contains_key(&bounty.id));

    repo.set_custom_field_deleted(bounty.id, true).expect("marked deleted");
    let stored = repo.get_custom_field(bounty.id).expect("query").expect("field");
    assert!(stored.is_deleted);
}

#[test]
fn test_numbers_follow_the_emitter_counter() {
    let test_db = common::TestDb::new("test_numbering.db");
    let repo = DieselRepository::new(test_db.pool());
    let bebop = organisation(&repo, "Bebop");
    let red_tail = organisation(&repo, "Red Tail");

    let first = repo.next_number(bebop.id(), EntityKind::Invoice).expect("number");
    let second = repo.next_number(bebop.id(), EntityKind::Invoice).expect("number");
    let other = repo.next_number(red_tail.id(), EntityKind::Invoice).expect("number");

    assert_eq!(first, "FA1");
    assert_eq!(second, "FA2");
    assert_eq!(other, "FA1");
}

#[test]
fn test_mailing_list_members_are_inserted_once() {
    let test_db = common::TestDb::new("test_mailing_lists.db");
    let repo = DieselRepository::new(test_db.pool());
    let spike = contact(&repo, "Spike", "Spiegel");
    let list = repo
        .create_entity(
            &NewEntity::new(EntityKind::MailingList, root(), ""),
            &EntityData::MailingList(MailingList {
                name: "Crew".into(),
            }),
        )
        .expect("list created");

    let added = repo
        .add_members(list.id(), ListMemberKind::Contact, &[spike.id()])
        .expect("members added");
    let again = repo
        .add_members(list.id(), ListMemberKind::Contact, &[spike.id()])
        .expect("members added twice");
    assert_eq!((added, again), (1, 0));

    repo.add_recipients(list.id(), &["ein@bebop.test".to_string()])
        .expect("recipient added");
    assert_eq!(
        repo.list_recipients(list.id()).expect("recipients"),
        vec!["ein@bebop.test".to_string()]
    );

    repo.remove_member(list.id(), ListMemberKind::Contact, spike.id())
        .expect("member removed");
    assert!(
        repo.list_members(list.id(), ListMemberKind::Contact)
            .expect("members")
            .is_empty()
    );
}

#[test]
fn test_jobs_are_seeded() {
    let test_db = common::TestDb::new("test_jobs.db");
    let repo = DieselRepository::new(test_db.pool());
    let jobs = repo.list_jobs().expect("jobs");
    assert_eq!(jobs.len(), 3);
    assert!(jobs.iter().all(|job| job.enabled && job.last_run.is_none()));
}
