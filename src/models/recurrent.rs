//! Diesel model for recurrent generators.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::period::DatePeriod;
use crate::domain::recurrent::RecurrentGenerator as DomainGenerator;
use crate::domain::types::{EntityId, TypeConstraintError};

#[derive(Debug, Clone, Identifiable, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::recurrent_generators, primary_key(entity_id), treat_none_as_null = true)]
pub struct RecurrentGenerator {
    pub entity_id: i32,
    pub name: String,
    pub first_generation: NaiveDateTime,
    pub last_generation: Option<NaiveDateTime>,
    /// JSON encoded [`DatePeriod`].
    pub periodicity: String,
    pub template_id: i32,
    pub target_kind: String,
    pub is_working: bool,
}

impl RecurrentGenerator {
    pub fn from_domain(entity_id: EntityId, generator: &DomainGenerator) -> Self {
        Self {
            entity_id: entity_id.get(),
            name: generator.name.clone(),
            first_generation: generator.first_generation,
            last_generation: generator.last_generation,
            periodicity: generator.periodicity.to_json(),
            template_id: generator.template_id.get(),
            target_kind: generator.target_kind.as_str().to_string(),
            is_working: generator.is_working,
        }
    }
}

impl TryFrom<RecurrentGenerator> for DomainGenerator {
    type Error = TypeConstraintError;

    fn try_from(generator: RecurrentGenerator) -> Result<Self, Self::Error> {
        Ok(Self {
            periodicity: DatePeriod::from_json(&generator.periodicity)?,
            template_id: EntityId::new(generator.template_id)?,
            target_kind: generator.target_kind.parse()?,
            name: generator.name,
            first_generation: generator.first_generation,
            last_generation: generator.last_generation,
            is_working: generator.is_working,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::EntityKind;
    use crate::domain::period::PeriodUnit;

    #[test]
    fn periodicity_is_stored_as_json() {
        let generator = DomainGenerator {
            name: "Monthly invoice".into(),
            first_generation: NaiveDateTime::default(),
            last_generation: None,
            periodicity: DatePeriod::new(PeriodUnit::Months, 1).expect("valid period"),
            template_id: EntityId::new(5).expect("valid id"),
            target_kind: EntityKind::Invoice,
            is_working: true,
        };
        let db = RecurrentGenerator::from_domain(EntityId::new(6).expect("valid id"), &generator);
        assert_eq!(db.periodicity, r#"{"unit":"months","value":1}"#);
        assert_eq!(DomainGenerator::try_from(db), Ok(generator));
    }
}
