use creme_crm::domain::auth::AuthenticatedUser;
use creme_crm::domain::custom_field::{CustomFieldType, NewCustomField};
use creme_crm::domain::entity::{EntityKind, NewEntity};
use creme_crm::domain::entity_filter::{EntityFilter, FilterCondition, Operator};
use creme_crm::domain::entity_data::EntityData;
use creme_crm::domain::persons::{Contact, Organisation};
use creme_crm::domain::relation::ids;
use creme_crm::domain::property::NewPropertyType;
use creme_crm::domain::types::{Label, PublicId};
use creme_crm::forms::relations::{AddRelationsPayload, RelationTypeForm, RelationTypePayload};
use creme_crm::repository::{
    CustomFieldReader, DieselRepository, EntityWriter, FilterReader, FilterWriter, PropertyReader,
    RelationReader,
};
use creme_crm::services::users::current_user;
use creme_crm::services::{ServiceError, config_transfer, custom_fields, relations};

mod common;

fn auth(roles: &[&str]) -> AuthenticatedUser {
    AuthenticatedUser {
        sub: "1".into(),
        email: "jet@bebop.test".into(),
        name: "Jet Black".into(),
        roles: roles.iter().map(|role| role.to_string()).collect(),
        exp: 4_102_444_800,
    }
}

fn configure_source(repo: &DieselRepository) {
    let admin = current_user(repo, &auth(&["crm", "crm_admin"])).expect("admin");
    let ptype = relations::create_property_type(
        repo,
        &admin,
        NewPropertyType {
            uuid: PublicId::new(),
            text: Label::new("Has a bounty").expect("valid label"),
            subject_kinds: vec![EntityKind::Contact],
            is_custom: true,
        },
    )
    .expect("property type created");
    let payload = RelationTypePayload::try_from(RelationTypeForm {
        subject_predicate: "hunts".into(),
        object_predicate: "is hunted by".into(),
        subject_kinds: vec![EntityKind::Contact.as_str().to_string()],
        object_kinds: vec![EntityKind::Contact.as_str().to_string()],
        subject_properties: Vec::new(),
        object_properties: vec![ptype.id.get()],
    })
    .expect("valid relation type");
    relations::create_relation_type_pair(repo, &admin, payload).expect("relation types created");
    custom_fields::create_custom_field(
        repo,
        &admin,
        NewCustomField {
            uuid: PublicId::new(),
            name: "Ship".into(),
            kind: EntityKind::Contact,
            field_type: CustomFieldType::Enum,
            is_required: false,
            choices: vec!["Swordfish II".into(), "Red Tail".into()],
        },
    )
    .expect("custom field created");
}

fn custom_counts(repo: &DieselRepository) -> (usize, usize, usize, usize) {
    let property_types = repo
        .list_property_types()
        .expect("property types")
        .into_iter()
        .filter(|ptype| ptype.is_custom)
        .count();
    let relation_types = repo
        .list_relation_types()
        .expect("relation types")
        .into_iter()
        .filter(|rtype| rtype.is_custom)
        .count();
    let fields = repo.list_custom_fields().expect("custom fields");
    let choices = repo.list_enum_values().expect("choices").len();
    (property_types, relation_types, fields.len(), choices)
}

#[test]
fn test_configuration_moves_between_instances() {
    let source_db = common::TestDb::new("test_transfer_source.db");
    let target_db = common::TestDb::new("test_transfer_target.db");
    let source = DieselRepository::new(source_db.pool());
    let target = DieselRepository::new(target_db.pool());
    configure_source(&source);

    let source_admin = current_user(&source, &auth(&["crm", "crm_admin"])).expect("admin");
    let document = config_transfer::export_config(&source, &source_admin).expect("exported");

    let target_admin = current_user(&target, &auth(&["crm", "crm_admin"])).expect("admin");
    config_transfer::import_config(&target, &target_admin, &document).expect("imported");
    assert_eq!(custom_counts(&target), (1, 2, 1, 2));

    // A second import updates in place.
    config_transfer::import_config(&target, &target_admin, &document).expect("imported again");
    assert_eq!(custom_counts(&target), custom_counts(&source));
}

#[test]
fn test_configuration_transfer_is_reserved_to_admins() {
    let test_db = common::TestDb::new("test_transfer_admins.db");
    let repo = DieselRepository::new(test_db.pool());
    let user = current_user(&repo, &auth(&["crm"])).expect("user");

    assert!(matches!(
        config_transfer::export_config(&repo, &user),
        Err(ServiceError::Unauthorized)
    ));
    assert!(matches!(
        config_transfer::import_config(&repo, &user, "{}"),
        Err(ServiceError::Unauthorized)
    ));
}

#[test]
fn test_broken_documents_change_nothing() {
    let test_db = common::TestDb::new("test_transfer_broken.db");
    let repo = DieselRepository::new(test_db.pool());
    let admin = current_user(&repo, &auth(&["crm", "crm_admin"])).expect("admin");
    let before = custom_counts(&repo);

    assert!(config_transfer::import_config(&repo, &admin, "not json").is_err());
    assert_eq!(custom_counts(&repo), before);
}

#[test]
fn test_users_need_the_crm_role() {
    let test_db = common::TestDb::new("test_users_role.db");
    let repo = DieselRepository::new(test_db.pool());

    assert!(matches!(
        current_user(&repo, &auth(&["todo"])),
        Err(ServiceError::Unauthorized)
    ));
    let admin = current_user(&repo, &auth(&["crm", "crm_admin"])).expect("admin");
    assert!(admin.is_admin);
}

#[test]
fn test_rejected_relation_batch_stores_nothing() {
    let test_db = common::TestDb::new("test_relation_batch.db");
    let repo = DieselRepository::new(test_db.pool());
    let admin = current_user(&repo, &auth(&["crm", "crm_admin"])).expect("admin");
    let spike = repo
        .create_entity(
            &NewEntity::new(EntityKind::Contact, admin.id, ""),
            &EntityData::Contact(Contact::new("Spike", "Spiegel")),
        )
        .expect("contact created");
    let bebop = repo
        .create_entity(
            &NewEntity::new(EntityKind::Organisation, admin.id, ""),
            &EntityData::Organisation(Organisation::new("Bebop")),
        )
        .expect("organisation created");
    let faye = repo
        .create_entity(
            &NewEntity::new(EntityKind::Contact, admin.id, ""),
            &EntityData::Contact(Contact::new("Faye", "Valentine")),
        )
        .expect("contact created");

    let result = relations::add_relations(
        &repo,
        &admin,
        spike.id(),
        AddRelationsPayload {
            type_id: ids::EMPLOYED_BY.to_string(),
            object_ids: vec![bebop.id(), faye.id()],
        },
    );

    assert!(matches!(result, Err(ServiceError::Form(_))));
    assert!(repo.list_relations(spike.id()).expect("relations").is_empty());
    assert!(repo.list_relations(bebop.id()).expect("relations").is_empty());
}

#[test]
fn test_filters_on_deleted_fields_still_transfer() {
    let source_db = common::TestDb::new("test_transfer_stale_source.db");
    let target_db = common::TestDb::new("test_transfer_stale_target.db");
    let source = DieselRepository::new(source_db.pool());
    let target = DieselRepository::new(target_db.pool());
    let admin = current_user(&source, &auth(&["crm", "crm_admin"])).expect("admin");

    let field = |name: &str| NewCustomField {
        uuid: PublicId::new(),
        name: name.into(),
        kind: EntityKind::Contact,
        field_type: CustomFieldType::String,
        is_required: false,
        choices: vec![],
    };
    let bounty = custom_fields::create_custom_field(&source, &admin, field("Bounty"))
        .expect("custom field created");
    let ship = custom_fields::create_custom_field(&source, &admin, field("Ship"))
        .expect("custom field created");
    source
        .save_entity_filter(&EntityFilter {
            id: "wanted".into(),
            name: "Wanted".into(),
            entity_kind: EntityKind::Contact,
            user_id: None,
            is_private: false,
            is_custom: true,
            use_or: false,
            conditions: vec![
                FilterCondition::CustomField {
                    cfield_uuid: bounty.uuid,
                    operator: Operator::Equals,
                    values: vec!["6000000".into()],
                },
                FilterCondition::CustomField {
                    cfield_uuid: ship.uuid,
                    operator: Operator::Equals,
                    values: vec!["Swordfish II".into()],
                },
            ],
        })
        .expect("filter saved");
    assert!(!custom_fields::delete_custom_field(&source, &admin, bounty.id).expect("field hidden"));

    let document = config_transfer::export_config(&source, &admin).expect("exported");
    let target_admin = current_user(&target, &auth(&["crm", "crm_admin"])).expect("admin");
    config_transfer::import_config(&target, &target_admin, &document).expect("imported");

    let wanted = target
        .get_entity_filter("wanted")
        .expect("query")
        .expect("filter imported");
    assert_eq!(wanted.conditions.len(), 1);
    assert_eq!(
        wanted.conditions[0].custom_field_uuid(),
        Some(&ship.uuid)
    );
}
