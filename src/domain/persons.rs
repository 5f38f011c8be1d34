//! Contacts, organisations and their postal addresses.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::fields::{
    EntityFields, FieldDescriptor, FieldType, FieldValue, opt_date, opt_text, required_bool,
    required_text, unknown_field,
};
use crate::domain::relation::ids;
use crate::domain::types::{AddressId, EntityId, TypeConstraintError, UserId};

pub const CIVILITIES: &[&str] = &["Mr.", "Mrs.", "Miss", "Dr."];

pub const CONTACT_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::new("civility", "Civility", FieldType::Choice(CIVILITIES)),
    FieldDescriptor::new("first_name", "First name", FieldType::String),
    FieldDescriptor::new("last_name", "Last name", FieldType::String).required(),
    FieldDescriptor::new("position", "Position", FieldType::String),
    FieldDescriptor::new("email", "Email address", FieldType::Email),
    FieldDescriptor::new("phone", "Phone", FieldType::Phone),
    FieldDescriptor::new("mobile", "Mobile", FieldType::Phone),
    FieldDescriptor::new("url_site", "Web site", FieldType::Url),
    FieldDescriptor::new("birthday", "Birthday", FieldType::Date),
    FieldDescriptor::new("is_user", "Related user", FieldType::User).read_only(),
];

pub const ORGANISATION_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::new("name", "Name", FieldType::String).required(),
    FieldDescriptor::new("phone", "Phone", FieldType::Phone),
    FieldDescriptor::new("email", "Email address", FieldType::Email),
    FieldDescriptor::new("url_site", "Web site", FieldType::Url),
    FieldDescriptor::new("sector", "Sector", FieldType::String),
    FieldDescriptor::new("legal_form", "Legal form", FieldType::String),
    FieldDescriptor::new("siret", "SIRET", FieldType::String),
    FieldDescriptor::new("capital", "Share capital", FieldType::Integer),
    FieldDescriptor::new("annual_revenue", "Annual revenue", FieldType::String),
    FieldDescriptor::new("creation_date", "Date of creation", FieldType::Date),
    FieldDescriptor::new("is_managed", "Managed by Creme", FieldType::Boolean).read_only(),
];

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub civility: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub position: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub url_site: Option<String>,
    pub birthday: Option<NaiveDate>,
    /// Set when the contact represents a user of the CRM.
    pub is_user: Option<UserId>,
}

impl Contact {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into().trim().to_string(),
            last_name: last_name.into().trim().to_string(),
            ..Default::default()
        }
    }
}

impl EntityFields for Contact {
    fn field_values(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("civility", FieldValue::text(self.civility.as_ref())),
            ("first_name", FieldValue::text(Some(&self.first_name))),
            ("last_name", FieldValue::text(Some(&self.last_name))),
            ("position", FieldValue::text(self.position.as_ref())),
            ("email", FieldValue::text(self.email.as_ref())),
            ("phone", FieldValue::text(self.phone.as_ref())),
            ("mobile", FieldValue::text(self.mobile.as_ref())),
            ("url_site", FieldValue::text(self.url_site.as_ref())),
            ("birthday", self.birthday.map_or(FieldValue::Null, FieldValue::Date)),
            (
                "is_user",
                self.is_user
                    .map_or(FieldValue::Null, |id| FieldValue::Integer(i64::from(id.get()))),
            ),
        ]
    }

    fn display_label(&self) -> String {
        [
            self.civility.as_deref().unwrap_or_default(),
            self.first_name.as_str(),
            self.last_name.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), TypeConstraintError> {
        match name {
            "civility" => self.civility = opt_text(value),
            "first_name" => self.first_name = opt_text(value).unwrap_or_default(),
            "last_name" => self.last_name = required_text(value)?,
            "position" => self.position = opt_text(value),
            "email" => self.email = opt_text(value),
            "phone" => self.phone = opt_text(value),
            "mobile" => self.mobile = opt_text(value),
            "url_site" => self.url_site = opt_text(value),
            "birthday" => self.birthday = opt_date(value)?,
            _ => return Err(unknown_field(name)),
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Organisation {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub url_site: Option<String>,
    pub sector: Option<String>,
    pub legal_form: Option<String>,
    pub siret: Option<String>,
    pub capital: Option<i64>,
    pub annual_revenue: Option<String>,
    pub creation_date: Option<NaiveDate>,
    /// Organisations of the CRM owner; they emit billing documents.
    pub is_managed: bool,
}

impl Organisation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            ..Default::default()
        }
    }
}

impl EntityFields for Organisation {
    fn field_values(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("name", FieldValue::text(Some(&self.name))),
            ("phone", FieldValue::text(self.phone.as_ref())),
            ("email", FieldValue::text(self.email.as_ref())),
            ("url_site", FieldValue::text(self.url_site.as_ref())),
            ("sector", FieldValue::text(self.sector.as_ref())),
            ("legal_form", FieldValue::text(self.legal_form.as_ref())),
            ("siret", FieldValue::text(self.siret.as_ref())),
            ("capital", self.capital.map_or(FieldValue::Null, FieldValue::Integer)),
            ("annual_revenue", FieldValue::text(self.annual_revenue.as_ref())),
            (
                "creation_date",
                self.creation_date.map_or(FieldValue::Null, FieldValue::Date),
            ),
            ("is_managed", FieldValue::Boolean(self.is_managed)),
        ]
    }

    fn display_label(&self) -> String {
        self.name.clone()
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), TypeConstraintError> {
        match name {
            "name" => self.name = required_text(value)?,
            "phone" => self.phone = opt_text(value),
            "email" => self.email = opt_text(value),
            "url_site" => self.url_site = opt_text(value),
            "sector" => self.sector = opt_text(value),
            "legal_form" => self.legal_form = opt_text(value),
            "siret" => self.siret = opt_text(value),
            "capital" => self.capital = value.as_integer(),
            "annual_revenue" => self.annual_revenue = opt_text(value),
            "creation_date" => self.creation_date = opt_date(value)?,
            "is_managed" => self.is_managed = required_bool(value)?,
            _ => return Err(unknown_field(name)),
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    Billing,
    Shipping,
    Other,
}

impl AddressKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AddressKind::Billing => "billing",
            AddressKind::Shipping => "shipping",
            AddressKind::Other => "other",
        }
    }
}

impl TryFrom<&str> for AddressKind {
    type Error = TypeConstraintError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "billing" => Ok(AddressKind::Billing),
            "shipping" => Ok(AddressKind::Shipping),
            "other" => Ok(AddressKind::Other),
            other => Err(TypeConstraintError::InvalidValue(format!(
                "unknown address kind {other}"
            ))),
        }
    }
}

/// Postal address of a contact or organisation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub id: AddressId,
    pub owner_id: EntityId,
    pub kind: AddressKind,
    pub fields: AddressFields,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AddressFields {
    pub name: String,
    pub address: String,
    pub po_box: String,
    pub zipcode: String,
    pub city: String,
    pub department: String,
    pub state: String,
    pub country: String,
}

impl AddressFields {
    pub fn is_empty(&self) -> bool {
        [
            &self.address,
            &self.po_box,
            &self.zipcode,
            &self.city,
            &self.department,
            &self.state,
            &self.country,
        ]
        .iter()
        .all(|part| part.trim().is_empty())
    }

    /// One-line rendering used in lists and exports.
    pub fn one_line(&self) -> String {
        [
            self.address.trim(),
            self.po_box.trim(),
            self.zipcode.trim(),
            self.city.trim(),
            self.department.trim(),
            self.state.trim(),
            self.country.trim(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[derive(Clone, Debug)]
pub struct NewAddress {
    pub owner_id: EntityId,
    pub kind: AddressKind,
    pub fields: AddressFields,
}

/// Commercial relationship between a person and a managed organisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Customer,
    Prospect,
    Suspect,
    Inactive,
}

impl CustomerStatus {
    pub const ALL: [CustomerStatus; 4] = [
        CustomerStatus::Customer,
        CustomerStatus::Prospect,
        CustomerStatus::Suspect,
        CustomerStatus::Inactive,
    ];

    pub fn relation_type_id(self) -> &'static str {
        match self {
            CustomerStatus::Customer => ids::CUSTOMER_OF,
            CustomerStatus::Prospect => ids::PROSPECT_OF,
            CustomerStatus::Suspect => ids::SUSPECT_OF,
            CustomerStatus::Inactive => ids::INACTIVE_OF,
        }
    }
}

impl TryFrom<&str> for CustomerStatus {
    type Error = TypeConstraintError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "customer" => Ok(CustomerStatus::Customer),
            "prospect" => Ok(CustomerStatus::Prospect),
            "suspect" => Ok(CustomerStatus::Suspect),
            "inactive" => Ok(CustomerStatus::Inactive),
            other => Err(TypeConstraintError::InvalidValue(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_label_skips_empty_parts() {
        let mut contact = Contact::new("", "Spiegel");
        assert_eq!(contact.display_label(), "Spiegel");
        contact.civility = Some("Mr.".into());
        contact.first_name = "Spike".into();
        assert_eq!(contact.display_label(), "Mr. Spike Spiegel");
    }

    #[test]
    fn contact_rejects_empty_last_name() {
        let mut contact = Contact::new("Faye", "Valentine");
        assert_eq!(
            contact.set_field("last_name", FieldValue::Null),
            Err(TypeConstraintError::EmptyString)
        );
        contact
            .set_field("email", FieldValue::Text("faye@bebop.org".into()))
            .expect("email is settable");
        assert_eq!(contact.email.as_deref(), Some("faye@bebop.org"));
        assert!(contact.set_field("unknown", FieldValue::Null).is_err());
    }

    #[test]
    fn field_values_follow_registry_order() {
        let organisation = Organisation::new("Bebop");
        let names: Vec<_> = organisation.field_values().into_iter().map(|(n, _)| n).collect();
        let registry: Vec<_> = ORGANISATION_FIELDS.iter().map(|f| f.name).collect();
        assert_eq!(names, registry);

        let contact = Contact::new("Ed", "Wong");
        let names: Vec<_> = contact.field_values().into_iter().map(|(n, _)| n).collect();
        let registry: Vec<_> = CONTACT_FIELDS.iter().map(|f| f.name).collect();
        assert_eq!(names, registry);
    }

    #[test]
    fn address_one_line() {
        let fields = AddressFields {
            address: "1 Main street".into(),
            zipcode: "75001".into(),
            city: "Paris".into(),
            ..Default::default()
        };
        assert_eq!(fields.one_line(), "1 Main street 75001 Paris");
        assert!(AddressFields::default().is_empty());
    }
}
