//! Diesel model for events.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::event::Event as DomainEvent;
use crate::domain::types::{Decimal2, EntityId};

#[derive(Debug, Clone, Identifiable, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::events, primary_key(entity_id), treat_none_as_null = true)]
pub struct Event {
    pub entity_id: i32,
    pub name: String,
    pub event_type: String,
    pub place: String,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub budget: Option<i64>,
    pub final_cost: Option<i64>,
}

impl Event {
    pub fn from_domain(entity_id: EntityId, event: &DomainEvent) -> Self {
        Self {
            entity_id: entity_id.get(),
            name: event.name.clone(),
            event_type: event.event_type.clone(),
            place: event.place.clone(),
            start_date: event.start_date,
            end_date: event.end_date,
            budget: event.budget.map(Decimal2::hundredths),
            final_cost: event.final_cost.map(Decimal2::hundredths),
        }
    }
}

impl From<Event> for DomainEvent {
    fn from(event: Event) -> Self {
        Self {
            name: event.name,
            event_type: event.event_type,
            place: event.place,
            start_date: event.start_date,
            end_date: event.end_date,
            budget: event.budget.map(Decimal2::from_hundredths),
            final_cost: event.final_cost.map(Decimal2::from_hundredths),
        }
    }
}
