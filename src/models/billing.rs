//! Diesel models for billing documents, their lines, statuses and numbering.

use chrono::NaiveDate;
use diesel::prelude::*;

use crate::domain::billing::{
    BillingDocument as DomainDocument, BillingStatus as DomainStatus, DiscountUnit,
    Line as DomainLine, LineData, LineKind, NumberingConfig as DomainNumberingConfig,
};
use crate::domain::entity::EntityKind;
use crate::domain::types::{Decimal2, EntityId, LineId, StatusId, TypeConstraintError};

/// Amounts are stored as hundredths.
#[derive(Debug, Clone, Identifiable, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::billing_documents, primary_key(entity_id), treat_none_as_null = true)]
pub struct BillingDocument {
    pub entity_id: i32,
    pub doc_kind: String,
    pub name: String,
    pub number: String,
    pub issuing_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub status_id: i32,
    pub currency: String,
    pub discount: i64,
    pub comment: String,
    pub payment_info: String,
    pub total_vat: i64,
    pub total_no_vat: i64,
    pub template_target: Option<String>,
}

#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::billing_lines)]
pub struct BillingLine {
    pub id: i32,
    pub document_id: i32,
    pub kind: String,
    pub on_the_fly_item: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub unit: String,
    pub discount: i64,
    pub discount_unit: i32,
    pub vat: i64,
    pub position: i32,
    pub comment: String,
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::billing_lines)]
pub struct NewBillingLine<'a> {
    pub document_id: i32,
    pub kind: &'a str,
    pub on_the_fly_item: &'a str,
    pub quantity: i64,
    pub unit_price: i64,
    pub unit: &'a str,
    pub discount: i64,
    pub discount_unit: i32,
    pub vat: i64,
    pub position: i32,
    pub comment: &'a str,
}

#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::billing_statuses)]
pub struct BillingStatus {
    pub id: i32,
    pub doc_kind: String,
    pub name: String,
    pub is_default: bool,
    pub is_validated: bool,
    pub position: i32,
}

#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::numbering_configs)]
pub struct NumberingConfig {
    pub id: i32,
    pub organisation_id: i32,
    pub doc_kind: String,
    pub prefix: String,
    pub last_number: i32,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::numbering_configs)]
pub struct NewNumberingConfig<'a> {
    pub organisation_id: i32,
    pub doc_kind: &'a str,
    pub prefix: &'a str,
    pub last_number: i32,
}

impl BillingDocument {
    /// `status_id` is the resolved status; documents always carry one in storage.
    pub fn from_domain(
        entity_id: EntityId,
        kind: EntityKind,
        document: &DomainDocument,
        status_id: StatusId,
    ) -> Self {
        Self {
            entity_id: entity_id.get(),
            doc_kind: kind.as_str().to_string(),
            name: document.name.clone(),
            number: document.number.clone(),
            issuing_date: document.issuing_date,
            expiration_date: document.expiration_date,
            status_id: status_id.get(),
            currency: document.currency.clone(),
            discount: document.discount.hundredths(),
            comment: document.comment.clone(),
            payment_info: document.payment_info.clone(),
            total_vat: document.total_vat.hundredths(),
            total_no_vat: document.total_no_vat.hundredths(),
            template_target: document.template_target.map(|kind| kind.as_str().to_string()),
        }
    }
}

impl TryFrom<BillingDocument> for DomainDocument {
    type Error = TypeConstraintError;

    fn try_from(document: BillingDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            name: document.name,
            number: document.number,
            issuing_date: document.issuing_date,
            expiration_date: document.expiration_date,
            status_id: Some(StatusId::new(document.status_id)?),
            currency: document.currency,
            discount: Decimal2::from_hundredths(document.discount),
            comment: document.comment,
            payment_info: document.payment_info,
            total_vat: Decimal2::from_hundredths(document.total_vat),
            total_no_vat: Decimal2::from_hundredths(document.total_no_vat),
            template_target: document
                .template_target
                .as_deref()
                .map(str::parse::<EntityKind>)
                .transpose()?,
        })
    }
}

impl<'a> NewBillingLine<'a> {
    pub fn from_domain(document_id: EntityId, position: i32, line: &'a LineData) -> Self {
        Self {
            document_id: document_id.get(),
            kind: line.kind.as_str(),
            on_the_fly_item: &line.on_the_fly_item,
            quantity: line.quantity.hundredths(),
            unit_price: line.unit_price.hundredths(),
            unit: &line.unit,
            discount: line.discount.hundredths(),
            discount_unit: line.discount_unit.code(),
            vat: line.vat.hundredths(),
            position,
            comment: &line.comment,
        }
    }
}

impl TryFrom<BillingLine> for DomainLine {
    type Error = TypeConstraintError;

    fn try_from(line: BillingLine) -> Result<Self, Self::Error> {
        Ok(Self {
            id: LineId::new(line.id)?,
            document_id: EntityId::new(line.document_id)?,
            position: line.position,
            data: LineData {
                kind: LineKind::try_from(line.kind.as_str())?,
                on_the_fly_item: line.on_the_fly_item,
                quantity: Decimal2::from_hundredths(line.quantity),
                unit_price: Decimal2::from_hundredths(line.unit_price),
                unit: line.unit,
                discount: Decimal2::from_hundredths(line.discount),
                discount_unit: DiscountUnit::try_from(line.discount_unit)?,
                vat: Decimal2::from_hundredths(line.vat),
                comment: line.comment,
            },
        })
    }
}

impl TryFrom<BillingStatus> for DomainStatus {
    type Error = TypeConstraintError;

    fn try_from(status: BillingStatus) -> Result<Self, Self::Error> {
        Ok(Self {
            id: StatusId::new(status.id)?,
            doc_kind: status.doc_kind.parse()?,
            name: status.name,
            is_default: status.is_default,
            is_validated: status.is_validated,
            position: status.position,
        })
    }
}

impl TryFrom<NumberingConfig> for DomainNumberingConfig {
    type Error = TypeConstraintError;

    fn try_from(config: NumberingConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            organisation_id: EntityId::new(config.organisation_id)?,
            doc_kind: config.doc_kind.parse()?,
            prefix: config.prefix,
            last_number: config.last_number,
        })
    }
}

impl<'a> From<&'a DomainNumberingConfig> for NewNumberingConfig<'a> {
    fn from(config: &'a DomainNumberingConfig) -> Self {
        Self {
            organisation_id: config.organisation_id.get(),
            doc_kind: config.doc_kind.as_str(),
            prefix: &config.prefix,
            last_number: config.last_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_are_stored_in_hundredths() {
        let mut document = DomainDocument::new("Invoice #1");
        document.discount = Decimal2::from_hundredths(550);
        document.total_no_vat = Decimal2::from_units(100);
        document.template_target = Some(EntityKind::Invoice);
        let db = BillingDocument::from_domain(
            EntityId::new(3).expect("valid id"),
            EntityKind::Invoice,
            &document,
            StatusId::new(1).expect("valid id"),
        );
        assert_eq!(db.discount, 550);
        assert_eq!(db.total_no_vat, 10_000);
        assert_eq!(db.template_target.as_deref(), Some("billing.invoice"));

        let back = DomainDocument::try_from(db).expect("valid document");
        assert_eq!(back.status_id, StatusId::new(1).ok());
        assert_eq!(back.discount, document.discount);
    }

    #[test]
    fn line_codes_are_checked() {
        let line = BillingLine {
            id: 1,
            document_id: 2,
            kind: "service".into(),
            on_the_fly_item: "Consulting".into(),
            quantity: 200,
            unit_price: 5_000,
            unit: "day".into(),
            discount: 0,
            discount_unit: 7,
            vat: 2_000,
            position: 0,
            comment: String::new(),
        };
        assert!(DomainLine::try_from(line).is_err());
    }
}
