//! Billing documents, their lines, totals and numbering.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entity::EntityKind;
use crate::domain::fields::{
    EntityFields, FieldDescriptor, FieldType, FieldValue, opt_date, opt_decimal, opt_text,
    required_text, unknown_field,
};
use crate::domain::types::{Decimal2, EntityId, LineId, StatusId, TypeConstraintError};

pub const CURRENCIES: &[&str] = &["EUR", "USD", "GBP", "CHF"];

pub const DOCUMENT_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::new("name", "Name", FieldType::String).required(),
    FieldDescriptor::new("number", "Number", FieldType::String).read_only(),
    FieldDescriptor::new("issuing_date", "Issuing date", FieldType::Date),
    FieldDescriptor::new("expiration_date", "Expiration date", FieldType::Date),
    FieldDescriptor::new("status_id", "Status", FieldType::Reference).required(),
    FieldDescriptor::new("currency", "Currency", FieldType::Choice(CURRENCIES)),
    FieldDescriptor::new("discount", "Overall discount", FieldType::Decimal),
    FieldDescriptor::new("comment", "Comment", FieldType::Text),
    FieldDescriptor::new("payment_info", "Payment information", FieldType::Text),
    FieldDescriptor::new("total_vat", "Total with VAT", FieldType::Decimal).read_only(),
    FieldDescriptor::new("total_no_vat", "Total without VAT", FieldType::Decimal).read_only(),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BillingError {
    #[error("{0} is not a billing document kind")]
    NotADocument(EntityKind),
    #[error("a {from} cannot be converted into a {to}")]
    ForbiddenConversion { from: EntityKind, to: EntityKind },
    #[error("the discount must be between 0 and 100")]
    InvalidPercent,
    #[error("the discount is greater than the amount")]
    DiscountTooBig,
    #[error("the quantity cannot be negative")]
    NegativeQuantity,
    #[error("the expiration date is before the issuing date")]
    ExpirationBeforeIssuing,
    #[error("the document needs an emitter organisation")]
    MissingEmitter,
    #[error("the emitter organisation must be managed")]
    UnmanagedEmitter,
    #[error("the status does not belong to this kind of document")]
    WrongStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BillingDocument {
    pub name: String,
    /// Empty until a number has been generated.
    pub number: String,
    pub issuing_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub status_id: Option<StatusId>,
    pub currency: String,
    /// Global discount in percent.
    pub discount: Decimal2,
    pub comment: String,
    pub payment_info: String,
    pub total_vat: Decimal2,
    pub total_no_vat: Decimal2,
    /// Kind generated from this document when it is a recurrent template.
    pub template_target: Option<EntityKind>,
}

impl Default for BillingDocument {
    fn default() -> Self {
        Self {
            name: String::new(),
            number: String::new(),
            issuing_date: None,
            expiration_date: None,
            status_id: None,
            currency: CURRENCIES[0].to_string(),
            discount: Decimal2::ZERO,
            comment: String::new(),
            payment_info: String::new(),
            total_vat: Decimal2::ZERO,
            total_no_vat: Decimal2::ZERO,
            template_target: None,
        }
    }
}

impl BillingDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            ..Default::default()
        }
    }

    pub fn has_number(&self) -> bool {
        !self.number.is_empty()
    }

    pub fn validate(&self) -> Result<(), BillingError> {
        check_percent(self.discount)?;
        if let (Some(issuing), Some(expiration)) = (self.issuing_date, self.expiration_date)
            && expiration < issuing
        {
            return Err(BillingError::ExpirationBeforeIssuing);
        }
        Ok(())
    }

    /// Copy used by conversions and recurrent generation; number and status are reset.
    pub fn duplicate(&self) -> BillingDocument {
        BillingDocument {
            number: String::new(),
            status_id: None,
            template_target: None,
            ..self.clone()
        }
    }
}

impl EntityFields for BillingDocument {
    fn field_values(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("name", FieldValue::text(Some(&self.name))),
            ("number", FieldValue::text(Some(&self.number))),
            (
                "issuing_date",
                self.issuing_date.map_or(FieldValue::Null, FieldValue::Date),
            ),
            (
                "expiration_date",
                self.expiration_date.map_or(FieldValue::Null, FieldValue::Date),
            ),
            (
                "status_id",
                self.status_id
                    .map_or(FieldValue::Null, |id| FieldValue::Integer(i64::from(id.get()))),
            ),
            ("currency", FieldValue::text(Some(&self.currency))),
            ("discount", FieldValue::Decimal(self.discount)),
            ("comment", FieldValue::text(Some(&self.comment))),
            ("payment_info", FieldValue::text(Some(&self.payment_info))),
            ("total_vat", FieldValue::Decimal(self.total_vat)),
            ("total_no_vat", FieldValue::Decimal(self.total_no_vat)),
        ]
    }

    fn display_label(&self) -> String {
        self.name.clone()
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), TypeConstraintError> {
        match name {
            "name" => self.name = required_text(value)?,
            "issuing_date" => self.issuing_date = opt_date(value)?,
            "expiration_date" => self.expiration_date = opt_date(value)?,
            "status_id" => {
                let raw = value
                    .as_integer()
                    .ok_or(TypeConstraintError::EmptyString)?;
                let raw = i32::try_from(raw)
                    .map_err(|_| TypeConstraintError::InvalidValue(raw.to_string()))?;
                self.status_id = Some(StatusId::new(raw)?);
            }
            "currency" => self.currency = required_text(value)?,
            "discount" => {
                let discount = opt_decimal(value)?.unwrap_or(Decimal2::ZERO);
                check_percent(discount)
                    .map_err(|err| TypeConstraintError::InvalidValue(err.to_string()))?;
                self.discount = discount;
            }
            "comment" => self.comment = opt_text(value).unwrap_or_default(),
            "payment_info" => self.payment_info = opt_text(value).unwrap_or_default(),
            _ => return Err(unknown_field(name)),
        }
        Ok(())
    }
}

fn check_percent(value: Decimal2) -> Result<(), BillingError> {
    if value.is_negative() || value > Decimal2::HUNDRED {
        Err(BillingError::InvalidPercent)
    } else {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    #[default]
    Product,
    Service,
}

impl LineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LineKind::Product => "product",
            LineKind::Service => "service",
        }
    }
}

impl TryFrom<&str> for LineKind {
    type Error = TypeConstraintError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "product" => Ok(LineKind::Product),
            "service" => Ok(LineKind::Service),
            other => Err(TypeConstraintError::InvalidValue(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountUnit {
    #[default]
    Percent,
    /// Amount removed from the whole line.
    LineAmount,
    /// Amount removed from every unit.
    ItemAmount,
}

impl DiscountUnit {
    pub fn code(self) -> i32 {
        match self {
            DiscountUnit::Percent => 1,
            DiscountUnit::LineAmount => 2,
            DiscountUnit::ItemAmount => 3,
        }
    }
}

impl TryFrom<i32> for DiscountUnit {
    type Error = TypeConstraintError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DiscountUnit::Percent),
            2 => Ok(DiscountUnit::LineAmount),
            3 => Ok(DiscountUnit::ItemAmount),
            other => Err(TypeConstraintError::InvalidValue(format!(
                "discount unit {other}"
            ))),
        }
    }
}

/// Content of a billing line (an on-the-fly item).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LineData {
    pub kind: LineKind,
    pub on_the_fly_item: String,
    pub quantity: Decimal2,
    pub unit_price: Decimal2,
    pub unit: String,
    pub discount: Decimal2,
    pub discount_unit: DiscountUnit,
    /// VAT rate in percent.
    pub vat: Decimal2,
    pub comment: String,
}

impl Default for LineData {
    fn default() -> Self {
        Self {
            kind: LineKind::Product,
            on_the_fly_item: String::new(),
            quantity: Decimal2::ONE,
            unit_price: Decimal2::ZERO,
            unit: String::new(),
            discount: Decimal2::ZERO,
            discount_unit: DiscountUnit::Percent,
            vat: Decimal2::from_units(20),
            comment: String::new(),
        }
    }
}

impl LineData {
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.quantity.is_negative() {
            return Err(BillingError::NegativeQuantity);
        }
        check_percent(self.vat)?;
        match self.discount_unit {
            DiscountUnit::Percent => check_percent(self.discount),
            DiscountUnit::LineAmount => {
                if self.discount.is_negative() || self.discount > self.gross_amount() {
                    Err(BillingError::DiscountTooBig)
                } else {
                    Ok(())
                }
            }
            DiscountUnit::ItemAmount => {
                if self.discount.is_negative() || self.discount > self.unit_price {
                    Err(BillingError::DiscountTooBig)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// `quantity * unit_price` before any discount.
    pub fn gross_amount(&self) -> Decimal2 {
        self.quantity.mul(self.unit_price)
    }

    /// Amount of the line after its own discount, without VAT.
    pub fn exclusive_amount(&self) -> Decimal2 {
        let gross = self.gross_amount();
        match self.discount_unit {
            DiscountUnit::Percent => gross - gross.percent(self.discount),
            DiscountUnit::LineAmount => gross - self.discount,
            DiscountUnit::ItemAmount => gross - self.quantity.mul(self.discount),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Line {
    pub id: LineId,
    pub document_id: EntityId,
    pub position: i32,
    pub data: LineData,
}

/// Cached totals of a document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub total_no_vat: Decimal2,
    pub total_vat: Decimal2,
}

/// Sums the lines, applying the global discount before VAT.
pub fn compute_totals<'a>(
    document_discount: Decimal2,
    lines: impl IntoIterator<Item = &'a LineData>,
) -> Totals {
    lines.into_iter().fold(Totals::default(), |totals, line| {
        let exclusive = line.exclusive_amount();
        let exclusive = exclusive - exclusive.percent(document_discount);
        let inclusive = exclusive + exclusive.percent(line.vat);
        Totals {
            total_no_vat: totals.total_no_vat + exclusive,
            total_vat: totals.total_vat + inclusive,
        }
    })
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BillingStatus {
    pub id: StatusId,
    pub doc_kind: EntityKind,
    pub name: String,
    pub is_default: bool,
    /// Leaving a non validated status triggers number generation for invoices.
    pub is_validated: bool,
    pub position: i32,
}

/// Per emitter and document kind numbering sequence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NumberingConfig {
    pub organisation_id: EntityId,
    pub doc_kind: EntityKind,
    pub prefix: String,
    pub last_number: i32,
}

impl NumberingConfig {
    pub fn new(organisation_id: EntityId, doc_kind: EntityKind) -> Self {
        Self {
            organisation_id,
            doc_kind,
            prefix: default_prefix(doc_kind).to_string(),
            last_number: 0,
        }
    }

    /// Advances the sequence and returns the formatted number.
    pub fn next_number(&mut self) -> String {
        self.last_number += 1;
        format!("{}{}", self.prefix, self.last_number)
    }
}

pub fn default_prefix(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Invoice => "FA",
        EntityKind::Quote => "DE",
        EntityKind::SalesOrder => "BC",
        EntityKind::CreditNote => "AV",
        _ => "",
    }
}

/// Kinds numbered as soon as they are created.
pub fn numbered_at_creation(kind: EntityKind) -> bool {
    matches!(kind, EntityKind::Quote | EntityKind::SalesOrder)
}

/// Whether a document must get a number after switching to `status`.
pub fn needs_number(kind: EntityKind, document: &BillingDocument, status: &BillingStatus) -> bool {
    if document.has_number() {
        return false;
    }
    match kind {
        EntityKind::Quote | EntityKind::SalesOrder => true,
        EntityKind::Invoice | EntityKind::CreditNote => status.is_validated,
        _ => false,
    }
}

pub fn check_conversion(from: EntityKind, to: EntityKind) -> Result<(), BillingError> {
    if !from.is_billing_document() {
        return Err(BillingError::NotADocument(from));
    }
    if !to.is_billing_document() {
        return Err(BillingError::NotADocument(to));
    }
    let allowed = matches!(
        (from, to),
        (EntityKind::Quote, EntityKind::Invoice)
            | (EntityKind::Quote, EntityKind::SalesOrder)
            | (EntityKind::SalesOrder, EntityKind::Invoice)
            | (EntityKind::Invoice, EntityKind::Quote)
            | (EntityKind::Invoice, EntityKind::SalesOrder)
    );
    if allowed {
        Ok(())
    } else {
        Err(BillingError::ForbiddenConversion { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i64, price: i64, discount: i64, unit: DiscountUnit) -> LineData {
        LineData {
            quantity: Decimal2::from_units(quantity),
            unit_price: Decimal2::from_units(price),
            discount: Decimal2::from_units(discount),
            discount_unit: unit,
            ..Default::default()
        }
    }

    #[test]
    fn line_discounts() {
        assert_eq!(
            line(2, 50, 10, DiscountUnit::Percent).exclusive_amount(),
            Decimal2::from_units(90)
        );
        assert_eq!(
            line(2, 50, 10, DiscountUnit::LineAmount).exclusive_amount(),
            Decimal2::from_units(90)
        );
        assert_eq!(
            line(2, 50, 10, DiscountUnit::ItemAmount).exclusive_amount(),
            Decimal2::from_units(80)
        );
    }

    #[test]
    fn line_validation() {
        assert_eq!(
            line(1, 10, 11, DiscountUnit::ItemAmount).validate(),
            Err(BillingError::DiscountTooBig)
        );
        assert_eq!(
            line(1, 10, 101, DiscountUnit::Percent).validate(),
            Err(BillingError::InvalidPercent)
        );
        assert_eq!(
            line(-1, 10, 0, DiscountUnit::Percent).validate(),
            Err(BillingError::NegativeQuantity)
        );
        assert!(line(3, 10, 30, DiscountUnit::LineAmount).validate().is_ok());
    }

    #[test]
    fn totals_apply_global_discount_then_vat() {
        let lines = [line(1, 100, 0, DiscountUnit::Percent), line(2, 50, 0, DiscountUnit::Percent)];
        let totals = compute_totals(Decimal2::from_units(10), lines.iter());
        assert_eq!(totals.total_no_vat, Decimal2::from_units(180));
        assert_eq!(totals.total_vat, Decimal2::from_units(216));
        assert_eq!(compute_totals(Decimal2::ZERO, []), Totals::default());
    }

    #[test]
    fn numbering_sequence() {
        let orga = EntityId::new(1).expect("valid id");
        let mut config = NumberingConfig::new(orga, EntityKind::Invoice);
        assert_eq!(config.next_number(), "FA1");
        assert_eq!(config.next_number(), "FA2");
    }

    #[test]
    fn invoices_are_numbered_when_validated() {
        let status = |validated| BillingStatus {
            id: StatusId::new(1).expect("valid id"),
            doc_kind: EntityKind::Invoice,
            name: "Draft".into(),
            is_default: true,
            is_validated: validated,
            position: 1,
        };
        let mut document = BillingDocument::new("Invoice");
        assert!(!needs_number(EntityKind::Invoice, &document, &status(false)));
        assert!(needs_number(EntityKind::Invoice, &document, &status(true)));
        document.number = "FA1".into();
        assert!(!needs_number(EntityKind::Invoice, &document, &status(true)));
    }

    #[test]
    fn conversions() {
        assert!(check_conversion(EntityKind::Quote, EntityKind::Invoice).is_ok());
        assert!(check_conversion(EntityKind::SalesOrder, EntityKind::Invoice).is_ok());
        assert_eq!(
            check_conversion(EntityKind::CreditNote, EntityKind::Invoice),
            Err(BillingError::ForbiddenConversion {
                from: EntityKind::CreditNote,
                to: EntityKind::Invoice
            })
        );
        assert!(check_conversion(EntityKind::Contact, EntityKind::Invoice).is_err());
    }

    #[test]
    fn document_dates_are_ordered() {
        let mut document = BillingDocument::new("Quote");
        document.issuing_date = NaiveDate::from_ymd_opt(2024, 5, 2);
        document.expiration_date = NaiveDate::from_ymd_opt(2024, 5, 1);
        assert_eq!(document.validate(), Err(BillingError::ExpirationBeforeIssuing));
    }
}
