//! Forms of billing documents: lines, statuses and conversion.

use serde::Deserialize;
use validator::Validate;

use crate::domain::billing::{DiscountUnit, LineData, LineKind};
use crate::domain::entity::EntityKind;
use crate::domain::types::{Decimal2, EntityId};
use crate::forms::FormError;

fn decimal(raw: &str, field: &str, default: Decimal2) -> Result<Decimal2, FormError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }
    raw.replace(',', ".")
        .parse::<Decimal2>()
        .map_err(|err| FormError::invalid(field, err))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LineForm {
    #[serde(default)]
    pub kind: String,
    #[validate(length(min = 1, max = 100))]
    pub on_the_fly_item: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub unit_price: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub unit: String,
    #[serde(default)]
    pub discount: String,
    #[serde(default)]
    pub discount_unit: Option<i32>,
    #[serde(default)]
    pub vat: String,
    #[serde(default)]
    pub comment: String,
}

impl TryFrom<LineForm> for LineData {
    type Error = FormError;

    fn try_from(form: LineForm) -> Result<Self, Self::Error> {
        form.validate()?;
        let defaults = LineData::default();
        let kind = match form.kind.trim() {
            "" => LineKind::default(),
            raw => LineKind::try_from(raw).map_err(|err| FormError::invalid("kind", err))?,
        };
        let discount_unit = form
            .discount_unit
            .map(DiscountUnit::try_from)
            .transpose()
            .map_err(|err| FormError::invalid("discount_unit", err))?
            .unwrap_or_default();
        let line = LineData {
            kind,
            on_the_fly_item: form.on_the_fly_item.trim().to_string(),
            quantity: decimal(&form.quantity, "quantity", defaults.quantity)?,
            unit_price: decimal(&form.unit_price, "unit_price", defaults.unit_price)?,
            unit: form.unit.trim().to_string(),
            discount: decimal(&form.discount, "discount", defaults.discount)?,
            discount_unit,
            vat: decimal(&form.vat, "vat", defaults.vat)?,
            comment: form.comment,
        };
        line.validate()
            .map_err(|err| FormError::invalid("line", err))?;
        Ok(line)
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status_id: i32,
}

/// Conversion of a document into another kind.
#[derive(Debug, Deserialize)]
pub struct ConvertForm {
    pub target_kind: String,
}

impl TryFrom<ConvertForm> for EntityKind {
    type Error = FormError;

    fn try_from(form: ConvertForm) -> Result<Self, Self::Error> {
        form.target_kind
            .trim()
            .parse::<EntityKind>()
            .map_err(|_| FormError::InvalidKind(form.target_kind.clone()))
    }
}

/// Emitter and receiver of a new document.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentParties {
    pub source_id: Option<EntityId>,
    pub target_id: Option<EntityId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> LineForm {
        LineForm {
            kind: "service".into(),
            on_the_fly_item: " Refuelling ".into(),
            quantity: "2".into(),
            unit_price: "10,50".into(),
            unit: String::new(),
            discount: String::new(),
            discount_unit: None,
            vat: String::new(),
            comment: String::new(),
        }
    }

    #[test]
    fn line_form_uses_defaults_and_decimal_commas() {
        let line = LineData::try_from(form()).expect("valid line");
        assert_eq!(line.kind, LineKind::Service);
        assert_eq!(line.on_the_fly_item, "Refuelling");
        assert_eq!(line.unit_price, Decimal2::from_hundredths(1050));
        assert_eq!(line.vat, Decimal2::from_units(20));
    }

    #[test]
    fn line_form_rejects_excessive_discounts() {
        let mut bad = form();
        bad.discount = "150".into();
        assert!(LineData::try_from(bad).is_err());
    }

    #[test]
    fn conversion_target_must_be_a_kind() {
        let form = ConvertForm {
            target_kind: "billing.invoice".into(),
        };
        assert_eq!(EntityKind::try_from(form).ok(), Some(EntityKind::Invoice));
    }
}
