//! Generators producing documents periodically from a template.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::entity::EntityKind;
use crate::domain::fields::{
    EntityFields, FieldDescriptor, FieldType, FieldValue, opt_datetime, required_bool,
    required_text, unknown_field,
};
use crate::domain::period::{DatePeriod, PeriodUnit};
use crate::domain::types::{EntityId, TypeConstraintError};

/// Upper bound of generations done for one generator in a single run.
pub const MAX_GENERATIONS_PER_RUN: usize = 366;

pub const GENERATOR_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::new("name", "Name of the generator", FieldType::String).required(),
    FieldDescriptor::new("first_generation", "Date of the first generation", FieldType::DateTime)
        .required(),
    FieldDescriptor::new("last_generation", "Date of the last generation", FieldType::DateTime)
        .read_only(),
    FieldDescriptor::new("periodicity", "Periodicity of the generation", FieldType::String)
        .read_only(),
    FieldDescriptor::new("target_kind", "Type of the recurrent resource", FieldType::String)
        .read_only(),
    FieldDescriptor::new("is_working", "Active?", FieldType::Boolean),
];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecurrentGenerator {
    pub name: String,
    pub first_generation: NaiveDateTime,
    pub last_generation: Option<NaiveDateTime>,
    pub periodicity: DatePeriod,
    /// Billing template instantiated at every generation.
    pub template_id: EntityId,
    pub target_kind: EntityKind,
    pub is_working: bool,
}

impl RecurrentGenerator {
    pub fn next_generation(&self) -> Option<NaiveDateTime> {
        match self.last_generation {
            None => Some(self.first_generation),
            Some(last) => self.periodicity.add_to(last),
        }
    }

    /// Generation dates which are due at `now`, oldest first.
    pub fn due_generations(&self, now: NaiveDateTime) -> Vec<NaiveDateTime> {
        let mut dates = Vec::new();
        if !self.is_working {
            return dates;
        }
        let mut next = self.next_generation();
        while let Some(date) = next {
            if date > now || dates.len() >= MAX_GENERATIONS_PER_RUN {
                break;
            }
            dates.push(date);
            next = self.periodicity.add_to(date);
        }
        dates
    }
}

impl EntityFields for RecurrentGenerator {
    fn field_values(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("name", FieldValue::text(Some(&self.name))),
            ("first_generation", FieldValue::DateTime(self.first_generation)),
            (
                "last_generation",
                self.last_generation.map_or(FieldValue::Null, FieldValue::DateTime),
            ),
            ("periodicity", FieldValue::Text(self.periodicity.to_string())),
            ("target_kind", FieldValue::Text(self.target_kind.to_string())),
            ("is_working", FieldValue::Boolean(self.is_working)),
        ]
    }

    fn display_label(&self) -> String {
        self.name.clone()
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), TypeConstraintError> {
        match name {
            "name" => self.name = required_text(value)?,
            "first_generation" => {
                self.first_generation =
                    opt_datetime(value)?.ok_or(TypeConstraintError::EmptyString)?
            }
            "is_working" => self.is_working = required_bool(value)?,
            _ => return Err(unknown_field(name)),
        }
        Ok(())
    }
}

/// Default periodicity proposed in the creation form.
pub fn default_periodicity() -> Result<DatePeriod, TypeConstraintError> {
    DatePeriod::new(PeriodUnit::Months, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .expect("valid datetime")
    }

    fn generator(last: Option<NaiveDateTime>) -> RecurrentGenerator {
        RecurrentGenerator {
            name: "Monthly invoice".into(),
            first_generation: at(2024, 1, 31),
            last_generation: last,
            periodicity: default_periodicity().expect("valid period"),
            template_id: EntityId::new(1).expect("valid id"),
            target_kind: EntityKind::Invoice,
            is_working: true,
        }
    }

    #[test]
    fn first_generation_when_never_generated() {
        assert_eq!(generator(None).next_generation(), Some(at(2024, 1, 31)));
        assert_eq!(
            generator(Some(at(2024, 1, 31))).next_generation(),
            Some(at(2024, 2, 29))
        );
    }

    #[test]
    fn catches_up_every_missed_generation() {
        let dates = generator(None).due_generations(at(2024, 4, 15));
        assert_eq!(dates, vec![at(2024, 1, 31), at(2024, 2, 29), at(2024, 3, 29)]);
    }

    #[test]
    fn stopped_generator_generates_nothing() {
        let mut stopped = generator(None);
        stopped.is_working = false;
        assert!(stopped.due_generations(at(2030, 1, 1)).is_empty());
        assert!(generator(None).due_generations(at(2023, 1, 1)).is_empty());
    }
}
