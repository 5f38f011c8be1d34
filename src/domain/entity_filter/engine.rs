//! In-memory evaluation of entity filters.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::domain::custom_field::CustomValue;
use crate::domain::entity::{CremeEntity, EntityKind};
use crate::domain::entity_filter::{EntityFilter, FilterCatalog, FilterCondition, FilterError};
use crate::domain::fields::{FieldValue, base_field_value, field_descriptor};
use crate::domain::types::{EntityId, PublicId};

/// Outgoing relation of an entity.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationEdge {
    pub type_id: String,
    pub object_id: EntityId,
    pub object_kind: EntityKind,
    /// Display string of the object, used by list view columns.
    pub object_label: String,
}

/// Everything a filter can look at for one entity.
#[derive(Clone, Debug)]
pub struct EntitySnapshot {
    pub entity: CremeEntity,
    pub fields: HashMap<String, FieldValue>,
    pub relations: Vec<RelationEdge>,
    pub properties: HashSet<PublicId>,
    pub custom_values: HashMap<PublicId, CustomValue>,
}

impl EntitySnapshot {
    pub fn new(entity: CremeEntity) -> Self {
        Self {
            entity,
            fields: HashMap::new(),
            relations: Vec::new(),
            properties: HashSet::new(),
            custom_values: HashMap::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.entity.id
    }

    /// Value of a regular field, base fields included.
    pub fn field(&self, name: &str) -> FieldValue {
        self.fields
            .get(name)
            .cloned()
            .or_else(|| base_field_value(&self.entity, name))
            .unwrap_or(FieldValue::Null)
    }
}

type IdSet = HashSet<EntityId>;

/// Evaluates filters over snapshots loaded per kind.
///
/// Results are memoised by filter id, so a sub-filter shared by several
/// conditions is evaluated once.
pub struct FilterEngine<'a> {
    catalog: &'a FilterCatalog,
    snapshots: HashMap<EntityKind, Vec<EntitySnapshot>>,
    today: NaiveDate,
    memo: HashMap<String, IdSet>,
}

impl<'a> FilterEngine<'a> {
    pub fn new(catalog: &'a FilterCatalog, today: NaiveDate) -> Self {
        Self {
            catalog,
            snapshots: HashMap::new(),
            today,
            memo: HashMap::new(),
        }
    }

    /// Kinds whose snapshots are needed to evaluate `filter`.
    pub fn required_kinds(&self, filter: &EntityFilter) -> Result<HashSet<EntityKind>, FilterError> {
        let mut kinds = HashSet::from([filter.entity_kind]);
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = filter.subfilter_ids().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let sub = self
                .catalog
                .filters
                .get(id)
                .ok_or_else(|| FilterError::UnknownFilter(id.to_string()))?;
            kinds.insert(sub.entity_kind);
            stack.extend(sub.subfilter_ids());
        }
        Ok(kinds)
    }

    pub fn add_snapshots(&mut self, kind: EntityKind, snapshots: Vec<EntitySnapshot>) {
        self.snapshots.entry(kind).or_default().extend(snapshots);
        self.memo.clear();
    }

    pub fn snapshots(&self, kind: EntityKind) -> &[EntitySnapshot] {
        self.snapshots.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Ids of the non-deleted entities matched by the stored filter `filter_id`.
    pub fn matching_ids(&mut self, filter_id: &str) -> Result<IdSet, FilterError> {
        let mut stack = Vec::new();
        self.evaluate_stored(filter_id, &mut stack)
    }

    /// Evaluates a filter which may not be stored yet.
    pub fn evaluate(&mut self, filter: &EntityFilter) -> Result<IdSet, FilterError> {
        let mut stack = vec![filter.id.clone()];
        self.evaluate_filter(filter, &mut stack)
    }

    fn evaluate_stored(&mut self, filter_id: &str, stack: &mut Vec<String>) -> Result<IdSet, FilterError> {
        if let Some(ids) = self.memo.get(filter_id) {
            return Ok(ids.clone());
        }
        if stack.iter().any(|id| id == filter_id) {
            return Err(FilterError::Cycle(filter_id.to_string()));
        }
        let catalog = self.catalog;
        let filter = catalog
            .filters
            .get(filter_id)
            .ok_or_else(|| FilterError::UnknownFilter(filter_id.to_string()))?;
        stack.push(filter_id.to_string());
        let ids = self.evaluate_filter(filter, stack)?;
        stack.pop();
        self.memo.insert(filter_id.to_string(), ids.clone());
        Ok(ids)
    }

    fn evaluate_filter(&mut self, filter: &EntityFilter, stack: &mut Vec<String>) -> Result<IdSet, FilterError> {
        let mut subresults = HashMap::new();
        for sub_id in filter.subfilter_ids() {
            if !subresults.contains_key(sub_id) {
                let ids = self.evaluate_stored(sub_id, stack)?;
                subresults.insert(sub_id.to_string(), ids);
            }
        }

        let context = Context {
            catalog: self.catalog,
            today: self.today,
            subresults: &subresults,
        };
        Ok(self
            .snapshots(filter.entity_kind)
            .iter()
            .filter(|snapshot| !snapshot.entity.is_deleted)
            .filter(|snapshot| context.accepts(filter, snapshot))
            .map(EntitySnapshot::id)
            .collect())
    }
}

struct Context<'c> {
    catalog: &'c FilterCatalog,
    today: NaiveDate,
    subresults: &'c HashMap<String, IdSet>,
}

impl Context<'_> {
    fn accepts(&self, filter: &EntityFilter, snapshot: &EntitySnapshot) -> bool {
        let mut outcomes = filter
            .conditions
            .iter()
            .filter_map(|condition| self.condition(filter.entity_kind, condition, snapshot))
            .peekable();
        if outcomes.peek().is_none() {
            return true;
        }
        if filter.use_or {
            outcomes.any(|matched| matched)
        } else {
            outcomes.all(|matched| matched)
        }
    }

    fn in_subfilter(&self, filter_id: &str, id: EntityId) -> bool {
        self.subresults
            .get(filter_id)
            .is_some_and(|ids| ids.contains(&id))
    }

    /// `None` when the condition has to be ignored (stale reference, bad operands).
    fn condition(&self, kind: EntityKind, condition: &FilterCondition, snapshot: &EntitySnapshot) -> Option<bool> {
        match condition {
            FilterCondition::Subfilter { filter_id } => {
                Some(self.in_subfilter(filter_id, snapshot.id()))
            }
            FilterCondition::Field {
                field,
                operator,
                values,
            } => {
                let descriptor = field_descriptor(kind, field)?;
                let operands = operator.parse_values(descriptor.field_type, values).ok()?;
                Some(operator.matches(&snapshot.field(field), &operands))
            }
            FilterCondition::DateField { field, range } => {
                field_descriptor(kind, field)?;
                Some(range.matches(&snapshot.field(field), self.today))
            }
            FilterCondition::Relation {
                type_id,
                has,
                entity_id,
                entity_kind,
            } => {
                self.catalog.relation_types.get(type_id)?;
                let hit = snapshot.relations.iter().any(|edge| {
                    edge.type_id == *type_id
                        && entity_id.is_none_or(|id| edge.object_id == id)
                        && entity_kind.is_none_or(|kind| edge.object_kind == kind)
                });
                Some(hit == *has)
            }
            FilterCondition::RelationSubfilter {
                type_id,
                has,
                filter_id,
            } => {
                self.catalog.relation_types.get(type_id)?;
                let hit = snapshot.relations.iter().any(|edge| {
                    edge.type_id == *type_id && self.in_subfilter(filter_id, edge.object_id)
                });
                Some(hit == *has)
            }
            FilterCondition::Property { ptype_uuid, has } => {
                if !self.catalog.property_types.contains(ptype_uuid) {
                    return None;
                }
                Some(snapshot.properties.contains(ptype_uuid) == *has)
            }
            FilterCondition::CustomField {
                cfield_uuid,
                operator,
                values,
            } => {
                let cfield = self
                    .catalog
                    .custom_fields
                    .get(cfield_uuid)
                    .filter(|cfield| !cfield.is_deleted)?;
                let operands = operator
                    .parse_values(cfield.field_type.as_field_type(), values)
                    .ok()?;
                let value = snapshot.custom_values.get(cfield_uuid);
                Some(match value {
                    Some(CustomValue::MultiEnum(ids)) if !ids.is_empty() => {
                        let mut choices = ids
                            .iter()
                            .map(|id| FieldValue::Integer(i64::from(id.get())));
                        if operator.is_exclude() {
                            choices.all(|choice| operator.matches(&choice, &operands))
                        } else {
                            choices.any(|choice| operator.matches(&choice, &operands))
                        }
                    }
                    Some(CustomValue::MultiEnum(_)) | None => {
                        operator.matches(&FieldValue::Null, &operands)
                    }
                    Some(value) => operator.matches(&value.to_field_value(), &operands),
                })
            }
            FilterCondition::DateCustomField { cfield_uuid, range } => {
                self.catalog
                    .custom_fields
                    .get(cfield_uuid)
                    .filter(|cfield| !cfield.is_deleted)?;
                let value = snapshot
                    .custom_values
                    .get(cfield_uuid)
                    .map_or(FieldValue::Null, CustomValue::to_field_value);
                Some(range.matches(&value, self.today))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::custom_field::CustomFieldType;
    use crate::domain::entity_filter::{CustomFieldRef, DateRange, Operator};
    use crate::domain::relation::{RelationType, ids};
    use crate::domain::types::{EnumValueId, UserId};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 17).expect("valid date")
    }

    fn entity_id(id: i32) -> EntityId {
        EntityId::new(id).expect("valid id")
    }

    fn snapshot(id: i32, kind: EntityKind, fields: &[(&str, FieldValue)]) -> EntitySnapshot {
        let now = today().and_hms_opt(12, 0, 0).expect("valid time");
        let mut snapshot = EntitySnapshot::new(CremeEntity {
            id: entity_id(id),
            uuid: PublicId::new(),
            kind,
            user_id: UserId::new(1).expect("valid id"),
            description: String::new(),
            header_filter_search_field: String::new(),
            is_deleted: false,
            created_at: now,
            modified_at: now,
        });
        snapshot.fields = fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        snapshot
    }

    fn text(value: &str) -> FieldValue {
        FieldValue::Text(value.to_string())
    }

    fn filter(id: &str, kind: EntityKind, conditions: Vec<FilterCondition>) -> EntityFilter {
        EntityFilter {
            id: id.into(),
            name: id.into(),
            entity_kind: kind,
            user_id: None,
            is_private: false,
            is_custom: true,
            use_or: false,
            conditions,
        }
    }

    fn last_name_starts(prefix: &str) -> FilterCondition {
        FilterCondition::Field {
            field: "last_name".into(),
            operator: Operator::IStartsWith,
            values: vec![prefix.into()],
        }
    }

    fn relation_type(id: &str) -> RelationType {
        RelationType {
            id: id.into(),
            symmetric_type_id: format!("{id}_sym"),
            predicate: "is related to".into(),
            subject_kinds: Vec::new(),
            object_kinds: Vec::new(),
            subject_properties: Vec::new(),
            is_custom: false,
            is_internal: false,
            enabled: true,
            is_copiable: true,
        }
    }

    fn contacts() -> Vec<EntitySnapshot> {
        vec![
            snapshot(1, EntityKind::Contact, &[("last_name", text("Spiegel")), ("first_name", text("Spike"))]),
            snapshot(2, EntityKind::Contact, &[("last_name", text("Black")), ("first_name", text("Jet"))]),
            snapshot(3, EntityKind::Contact, &[("last_name", text("Valentine")), ("first_name", text("Faye"))]),
        ]
    }

    fn id_set(values: &[i32]) -> IdSet {
        values.iter().map(|id| entity_id(*id)).collect()
    }

    #[test]
    fn and_or_combination() {
        let catalog = FilterCatalog::default();
        let mut engine = FilterEngine::new(&catalog, today());
        engine.add_snapshots(EntityKind::Contact, contacts());

        let and = filter("and", EntityKind::Contact, vec![last_name_starts("s"), last_name_starts("b")]);
        assert!(engine.evaluate(&and).expect("evaluates").is_empty());

        let mut or = and.clone();
        or.use_or = true;
        assert_eq!(engine.evaluate(&or).expect("evaluates"), id_set(&[1, 2]));

        let empty = filter("empty", EntityKind::Contact, Vec::new());
        assert_eq!(engine.evaluate(&empty).expect("evaluates"), id_set(&[1, 2, 3]));
    }

    #[test]
    fn deleted_entities_are_never_matched() {
        let catalog = FilterCatalog::default();
        let mut engine = FilterEngine::new(&catalog, today());
        let mut snapshots = contacts();
        snapshots[0].entity.is_deleted = true;
        engine.add_snapshots(EntityKind::Contact, snapshots);
        let all = filter("all", EntityKind::Contact, Vec::new());
        assert_eq!(engine.evaluate(&all).expect("evaluates"), id_set(&[2, 3]));
    }

    #[test]
    fn subfilters_and_relation_subfilters() {
        let big = filter(
            "big",
            EntityKind::Organisation,
            vec![FilterCondition::Field {
                field: "capital".into(),
                operator: Operator::Gte,
                values: vec!["1000".into()],
            }],
        );
        let spiegel = filter("spiegel", EntityKind::Contact, vec![last_name_starts("spi")]);
        let catalog = FilterCatalog {
            relation_types: HashMap::from([(ids::EMPLOYED_BY.to_string(), relation_type(ids::EMPLOYED_BY))]),
            filters: HashMap::from([("big".to_string(), big), ("spiegel".to_string(), spiegel)]),
            ..Default::default()
        };

        let mut snapshots = contacts();
        for (contact, orga) in [(0, 10), (1, 11)] {
            snapshots[contact].relations.push(RelationEdge {
                type_id: ids::EMPLOYED_BY.into(),
                object_id: entity_id(orga),
                object_kind: EntityKind::Organisation,
                object_label: format!("Orga #{orga}"),
            });
        }

        let employed_by_big = filter(
            "employed",
            EntityKind::Contact,
            vec![
                FilterCondition::RelationSubfilter {
                    type_id: ids::EMPLOYED_BY.into(),
                    has: true,
                    filter_id: "big".into(),
                },
                FilterCondition::Subfilter {
                    filter_id: "spiegel".into(),
                },
            ],
        );
        let mut engine = FilterEngine::new(&catalog, today());
        assert_eq!(
            engine.required_kinds(&employed_by_big).expect("known filters"),
            HashSet::from([EntityKind::Contact, EntityKind::Organisation])
        );
        engine.add_snapshots(EntityKind::Contact, snapshots);
        engine.add_snapshots(
            EntityKind::Organisation,
            vec![
                snapshot(10, EntityKind::Organisation, &[("capital", FieldValue::Integer(5000))]),
                snapshot(11, EntityKind::Organisation, &[("capital", FieldValue::Integer(10))]),
            ],
        );
        assert_eq!(engine.evaluate(&employed_by_big).expect("evaluates"), id_set(&[1]));
    }

    #[test]
    fn relation_conditions() {
        let catalog = FilterCatalog {
            relation_types: HashMap::from([(ids::CUSTOMER_OF.to_string(), relation_type(ids::CUSTOMER_OF))]),
            ..Default::default()
        };
        let mut snapshots = contacts();
        snapshots[2].relations.push(RelationEdge {
            type_id: ids::CUSTOMER_OF.into(),
            object_id: entity_id(42),
            object_kind: EntityKind::Organisation,
            object_label: "Red Dragon".into(),
        });
        let mut engine = FilterEngine::new(&catalog, today());
        engine.add_snapshots(EntityKind::Contact, snapshots);

        let condition = |has, entity_id| FilterCondition::Relation {
            type_id: ids::CUSTOMER_OF.into(),
            has,
            entity_id,
            entity_kind: None,
        };
        let customers = filter("c", EntityKind::Contact, vec![condition(true, None)]);
        assert_eq!(engine.evaluate(&customers).expect("evaluates"), id_set(&[3]));
        let not_customers = filter("n", EntityKind::Contact, vec![condition(false, None)]);
        assert_eq!(engine.evaluate(&not_customers).expect("evaluates"), id_set(&[1, 2]));
        let other_target = filter("o", EntityKind::Contact, vec![condition(true, Some(entity_id(7)))]);
        assert!(engine.evaluate(&other_target).expect("evaluates").is_empty());
    }

    #[test]
    fn runtime_cycles_are_reported() {
        let a = filter("a", EntityKind::Contact, vec![FilterCondition::Subfilter { filter_id: "b".into() }]);
        let b = filter("b", EntityKind::Contact, vec![FilterCondition::Subfilter { filter_id: "a".into() }]);
        let catalog = FilterCatalog {
            filters: HashMap::from([("a".to_string(), a), ("b".to_string(), b)]),
            ..Default::default()
        };
        let mut engine = FilterEngine::new(&catalog, today());
        assert!(matches!(engine.matching_ids("a"), Err(FilterError::Cycle(_))));
        assert_eq!(engine.matching_ids("zz"), Err(FilterError::UnknownFilter("zz".into())));
    }

    #[test]
    fn custom_field_conditions() {
        let color = PublicId::new();
        let met = PublicId::new();
        let deleted = PublicId::new();
        let catalog = FilterCatalog {
            custom_fields: HashMap::from([
                (
                    color,
                    CustomFieldRef {
                        kind: EntityKind::Contact,
                        field_type: CustomFieldType::MultiEnum,
                        is_deleted: false,
                    },
                ),
                (
                    met,
                    CustomFieldRef {
                        kind: EntityKind::Contact,
                        field_type: CustomFieldType::Date,
                        is_deleted: false,
                    },
                ),
                (
                    deleted,
                    CustomFieldRef {
                        kind: EntityKind::Contact,
                        field_type: CustomFieldType::Integer,
                        is_deleted: true,
                    },
                ),
            ]),
            ..Default::default()
        };
        let choice = |id| EnumValueId::new(id).expect("valid id");
        let mut snapshots = contacts();
        snapshots[0]
            .custom_values
            .insert(color, CustomValue::MultiEnum(vec![choice(1), choice(2)]));
        snapshots[1].custom_values.insert(color, CustomValue::MultiEnum(vec![choice(3)]));
        snapshots[1].custom_values.insert(met, CustomValue::Date(today()));

        let mut engine = FilterEngine::new(&catalog, today());
        engine.add_snapshots(EntityKind::Contact, snapshots);

        let has_two = filter(
            "two",
            EntityKind::Contact,
            vec![FilterCondition::CustomField {
                cfield_uuid: color,
                operator: Operator::Equals,
                values: vec!["2".into()],
            }],
        );
        assert_eq!(engine.evaluate(&has_two).expect("evaluates"), id_set(&[1]));

        let not_two = filter(
            "not_two",
            EntityKind::Contact,
            vec![FilterCondition::CustomField {
                cfield_uuid: color,
                operator: Operator::EqualsNot,
                values: vec!["2".into()],
            }],
        );
        assert_eq!(engine.evaluate(&not_two).expect("evaluates"), id_set(&[2, 3]));

        let met_today = filter(
            "met",
            EntityKind::Contact,
            vec![FilterCondition::DateCustomField {
                cfield_uuid: met,
                range: DateRange::Today,
            }],
        );
        assert_eq!(engine.evaluate(&met_today).expect("evaluates"), id_set(&[2]));

        let ignored = filter(
            "ignored",
            EntityKind::Contact,
            vec![FilterCondition::CustomField {
                cfield_uuid: deleted,
                operator: Operator::Equals,
                values: vec!["1".into()],
            }],
        );
        assert_eq!(engine.evaluate(&ignored).expect("evaluates"), id_set(&[1, 2, 3]));
    }
}
