//! Invitations and presence of contacts at events.

use std::collections::{BTreeMap, HashMap};

use crate::domain::entity::EntityKind;
use crate::domain::event::{EventStats, InvitationStatus, PresenceStatus};
use crate::domain::relation::ids;
use crate::domain::types::EntityId;
use crate::domain::user::User;
use crate::dto::events::{EventContact, EventPageData};
use crate::repository::{EntityReader, PropertyReader, RelationReader, RelationWriter};
use crate::services::ServiceResult;
use crate::services::entities::get_live_entity;
use crate::services::relations::{get_relation_type, link_entities};
use crate::services::users::ensure_can_edit;

fn replace_status<R>(
    repo: &R,
    user: &User,
    event_id: EntityId,
    contact_id: EntityId,
    family: &[&str],
    wanted: &[&str],
) -> ServiceResult<()>
where
    R: EntityReader + RelationReader + RelationWriter + PropertyReader + ?Sized,
{
    let event = get_live_entity(repo, event_id, EntityKind::Event)?;
    ensure_can_edit(user, &event.base)?;
    let contact = get_live_entity(repo, contact_id, EntityKind::Contact)?;

    let family: Vec<String> = family.iter().map(|type_id| type_id.to_string()).collect();
    repo.delete_relations(contact_id, &family, Some(event_id))?;
    for type_id in wanted {
        let rtype = get_relation_type(repo, type_id)?;
        link_entities(repo, user, &contact.base, &rtype, &event.base)?;
    }
    Ok(())
}

/// Replaces the invitation relations between the contact and the event.
pub fn set_invitation_status<R>(
    repo: &R,
    user: &User,
    event_id: EntityId,
    contact_id: EntityId,
    status: InvitationStatus,
) -> ServiceResult<()>
where
    R: EntityReader + RelationReader + RelationWriter + PropertyReader + ?Sized,
{
    replace_status(
        repo,
        user,
        event_id,
        contact_id,
        &InvitationStatus::RELATION_TYPES,
        status.relation_types(),
    )?;
    log::info!("Contact {contact_id} invitation to event {event_id} set to {status:?}");
    Ok(())
}

pub fn set_presence<R>(
    repo: &R,
    user: &User,
    event_id: EntityId,
    contact_id: EntityId,
    status: PresenceStatus,
) -> ServiceResult<()>
where
    R: EntityReader + RelationReader + RelationWriter + PropertyReader + ?Sized,
{
    let wanted: Vec<&str> = status.relation_type().into_iter().collect();
    replace_status(
        repo,
        user,
        event_id,
        contact_id,
        &PresenceStatus::RELATION_TYPES,
        &wanted,
    )
}

fn presence_from(types: &[String]) -> PresenceStatus {
    if types.iter().any(|type_id| type_id == ids::CAME_EVENT) {
        PresenceStatus::Came
    } else if types.iter().any(|type_id| type_id == ids::NOT_CAME_EVENT) {
        PresenceStatus::NotCame
    } else {
        PresenceStatus::Unknown
    }
}

/// Contacts of the event with their statuses, and the event counters.
pub fn event_page<R>(repo: &R, event_id: EntityId) -> ServiceResult<EventPageData>
where
    R: EntityReader + RelationReader + ?Sized,
{
    get_live_entity(repo, event_id, EntityKind::Event)?;

    // Event side relations carry the symmetric types; count on the contact side.
    let contact_side: HashMap<String, String> = repo
        .list_relation_types()?
        .into_iter()
        .filter(|rtype| {
            InvitationStatus::RELATION_TYPES.contains(&rtype.symmetric_type_id.as_str())
                || PresenceStatus::RELATION_TYPES.contains(&rtype.symmetric_type_id.as_str())
        })
        .map(|rtype| (rtype.id, rtype.symmetric_type_id))
        .collect();

    let mut by_contact: BTreeMap<EntityId, Vec<String>> = BTreeMap::new();
    for relation in repo.list_relations(event_id)? {
        if let Some(type_id) = contact_side.get(&relation.type_id) {
            by_contact
                .entry(relation.object_id)
                .or_default()
                .push(type_id.clone());
        }
    }

    let ids: Vec<EntityId> = by_contact.keys().copied().collect();
    let mut contacts: Vec<EventContact> = repo
        .get_entities(&ids)?
        .into_iter()
        .filter(|entity| !entity.base.is_deleted && entity.base.kind == EntityKind::Contact)
        .filter_map(|entity| {
            let types = by_contact.get(&entity.id())?;
            Some(EventContact {
                invitation: InvitationStatus::from_relation_types(types.iter().map(String::as_str)),
                presence: presence_from(types),
                contact: entity.base,
            })
        })
        .collect();
    contacts.sort_by_cached_key(|contact| contact.contact.label().to_lowercase());

    let stats = EventStats::from_relation_types(
        contacts
            .iter()
            .filter_map(|contact| by_contact.get(&contact.contact.id))
            .flatten()
            .map(String::as_str),
    );
    Ok(EventPageData { stats, contacts })
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;
    use crate::domain::entity_data::{AnyEntity, EntityData};
    use crate::domain::event::Event;
    use crate::domain::persons::Contact;
    use crate::domain::relation::{Relation, RelationType};
    use crate::domain::types::{RelationId, UserId};
    use crate::repository::mock::MockRepository;
    use crate::services::users::test_support::{base, user_from, viewer_auth};

    fn id(value: i32) -> EntityId {
        EntityId::new(value).expect("valid id")
    }

    fn entity(entity_id: i32) -> AnyEntity {
        if entity_id == 1 {
            AnyEntity {
                base: base(1, EntityKind::Event, 2, "Expo"),
                data: EntityData::Event(Event {
                    name: "Expo".into(),
                    ..Default::default()
                }),
            }
        } else {
            AnyEntity {
                base: base(entity_id, EntityKind::Contact, 2, &format!("Contact {entity_id}")),
                data: EntityData::Contact(Contact::new("", format!("Contact {entity_id}"))),
            }
        }
    }

    fn rtype(id: &str, symmetric: &str) -> RelationType {
        RelationType {
            id: id.into(),
            symmetric_type_id: symmetric.into(),
            predicate: id.into(),
            subject_kinds: vec![],
            object_kinds: vec![],
            subject_properties: vec![],
            is_custom: false,
            is_internal: true,
            enabled: true,
            is_copiable: false,
        }
    }

    fn object_side(type_id: &str) -> String {
        type_id.replace("-subject_", "-object_")
    }

    fn relation(type_id: &str, object: i32) -> Relation {
        Relation {
            id: RelationId::new(1).expect("valid id"),
            user_id: UserId::new(2).expect("valid id"),
            subject_id: id(1),
            type_id: type_id.into(),
            object_id: id(object),
            symmetric_relation_id: None,
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn accepting_replaces_the_invitation_family() {
        let user = user_from(&viewer_auth(), 2);
        let mut repo = MockRepository::new();
        repo.expect_get_entity().returning(|id| Ok(Some(entity(id.get()))));
        repo.expect_delete_relations()
            .withf(|contact, types, event| {
                contact.get() == 5 && types.len() == 3 && *event == Some(EntityId::new(1).expect("valid id"))
            })
            .times(1)
            .returning(|_, _, _| Ok(1));
        repo.expect_get_relation_type()
            .returning(|type_id| Ok(Some(rtype(type_id, &object_side(type_id)))));
        repo.expect_list_entity_properties().returning(|_| Ok(vec![]));
        repo.expect_create_relation()
            .times(2)
            .returning(|new| {
                Ok(Relation {
                    id: RelationId::new(3).expect("valid id"),
                    user_id: new.user_id,
                    subject_id: new.subject_id,
                    type_id: new.type_id.clone(),
                    object_id: new.object_id,
                    symmetric_relation_id: None,
                    created_at: NaiveDateTime::default(),
                })
            });

        set_invitation_status(&repo, &user, id(1), id(5), InvitationStatus::Accepted)
            .expect("status set");
    }

    #[test]
    fn event_page_counts_statuses() {
        let mut repo = MockRepository::new();
        repo.expect_get_entity().returning(|id| Ok(Some(entity(id.get()))));
        repo.expect_list_relation_types().returning(|| {
            Ok([
                ids::INVITED_TO,
                ids::ACCEPTED_INVITATION,
                ids::REFUSED_INVITATION,
                ids::CAME_EVENT,
                ids::NOT_CAME_EVENT,
            ]
            .into_iter()
            .map(|type_id| rtype(&object_side(type_id), type_id))
            .collect())
        });
        repo.expect_list_relations().returning(|_| {
            Ok(vec![
                relation(&object_side(ids::INVITED_TO), 5),
                relation(&object_side(ids::ACCEPTED_INVITATION), 5),
                relation(&object_side(ids::CAME_EVENT), 5),
                relation(&object_side(ids::INVITED_TO), 6),
                relation(&object_side(ids::REFUSED_INVITATION), 6),
                relation("activities-object_linked_2_activity", 7),
            ])
        });
        repo.expect_get_entities()
            .returning(|ids| Ok(ids.iter().map(|id| entity(id.get())).collect()));

        let page = event_page(&repo, id(1)).expect("page");
        assert_eq!(page.contacts.len(), 2);
        assert_eq!(page.contacts[0].invitation, InvitationStatus::Accepted);
        assert_eq!(page.contacts[0].presence, PresenceStatus::Came);
        assert_eq!(page.contacts[1].invitation, InvitationStatus::Refused);
        assert_eq!(
            page.stats,
            EventStats {
                invitations_count: 2,
                accepted_count: 1,
                refused_count: 1,
                visitors_count: 1,
            }
        );
    }
}
