//! Creation form of recurrent generators.

use chrono::NaiveDateTime;
use serde::Deserialize;
use validator::Validate;

use crate::domain::entity::EntityKind;
use crate::domain::fields::parse_datetime;
use crate::domain::period::{DatePeriod, PeriodUnit};
use crate::domain::types::EntityId;
use crate::forms::FormError;

#[derive(Debug, Deserialize, Validate)]
pub struct GeneratorForm {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub first_generation: String,
    pub periodicity_unit: String,
    #[validate(range(min = 1))]
    pub periodicity_value: u32,
    /// Billing kind produced at every generation.
    pub target_kind: String,
    /// Document whose fields and lines seed the template.
    #[serde(default)]
    pub source_id: Option<i32>,
    #[serde(default)]
    pub is_working: bool,
}

pub struct GeneratorPayload {
    pub name: String,
    pub description: String,
    pub first_generation: NaiveDateTime,
    pub periodicity: DatePeriod,
    pub target_kind: EntityKind,
    pub source_id: Option<EntityId>,
    pub is_working: bool,
}

impl TryFrom<GeneratorForm> for GeneratorPayload {
    type Error = FormError;

    fn try_from(form: GeneratorForm) -> Result<Self, Self::Error> {
        form.validate()?;
        let first_generation = parse_datetime(&form.first_generation)
            .ok_or_else(|| FormError::InvalidDate(form.first_generation.clone()))?;
        let unit = PeriodUnit::try_from(form.periodicity_unit.trim())
            .map_err(|err| FormError::invalid("periodicity_unit", err))?;
        let periodicity = DatePeriod::new(unit, form.periodicity_value)
            .map_err(|err| FormError::invalid("periodicity_value", err))?;
        let target_kind = form
            .target_kind
            .trim()
            .parse::<EntityKind>()
            .map_err(|_| FormError::InvalidKind(form.target_kind.clone()))?;
        if !target_kind.is_billing_document() || target_kind == EntityKind::TemplateBase {
            return Err(FormError::InvalidKind(form.target_kind));
        }
        Ok(Self {
            name: form.name.trim().to_string(),
            description: form.description,
            first_generation,
            periodicity,
            target_kind,
            source_id: form
                .source_id
                .map(EntityId::new)
                .transpose()
                .map_err(|_| FormError::InvalidId)?,
            is_working: form.is_working,
        })
    }
}
