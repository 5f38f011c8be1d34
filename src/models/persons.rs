//! Diesel models for contacts, organisations and addresses.

use chrono::NaiveDate;
use diesel::prelude::*;

use crate::domain::persons::{
    Address as DomainAddress, AddressFields, AddressKind, Contact as DomainContact,
    NewAddress as DomainNewAddress, Organisation as DomainOrganisation,
};
use crate::domain::types::{AddressId, EntityId, TypeConstraintError, UserId};

#[derive(Debug, Clone, Identifiable, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::contacts, primary_key(entity_id), treat_none_as_null = true)]
/// Diesel model for [`crate::domain::persons::Contact`].
pub struct Contact {
    pub entity_id: i32,
    pub civility: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub position: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub url_site: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub is_user: Option<i32>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::organisations, primary_key(entity_id), treat_none_as_null = true)]
/// Diesel model for [`crate::domain::persons::Organisation`].
pub struct Organisation {
    pub entity_id: i32,
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
    pub is_managed: bool,
}

#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::addresses)]
pub struct Address {
    pub id: i32,
    pub owner_id: i32,
    pub kind: String,
    pub name: String,
    pub address: String,
    pub po_box: String,
    pub zipcode: String,
    pub city: String,
    pub department: String,
    pub state: String,
    pub country: String,
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::addresses)]
/// Insertable form of [`Address`]; also used to rewrite one.
pub struct NewAddress<'a> {
    pub owner_id: i32,
    pub kind: &'a str,
    pub name: &'a str,
    pub address: &'a str,
    pub po_box: &'a str,
    pub zipcode: &'a str,
    pub city: &'a str,
    pub department: &'a str,
    pub state: &'a str,
    pub country: &'a str,
}

impl Contact {
    pub fn from_domain(entity_id: EntityId, contact: &DomainContact) -> Self {
        Self {
            entity_id: entity_id.get(),
            civility: contact.civility.clone(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            position: contact.position.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            mobile: contact.mobile.clone(),
            url_site: contact.url_site.clone(),
            birthday: contact.birthday,
            is_user: contact.is_user.map(UserId::get),
        }
    }
}

impl TryFrom<Contact> for DomainContact {
    type Error = TypeConstraintError;

    fn try_from(contact: Contact) -> Result<Self, Self::Error> {
        Ok(Self {
            civility: contact.civility,
            first_name: contact.first_name,
            last_name: contact.last_name,
            position: contact.position,
            email: contact.email,
            phone: contact.phone,
            mobile: contact.mobile,
            url_site: contact.url_site,
            birthday: contact.birthday,
            is_user: contact.is_user.map(UserId::new).transpose()?,
        })
    }
}

impl Organisation {
    pub fn from_domain(entity_id: EntityId, organisation: &DomainOrganisation) -> Self {
        Self {
            entity_id: entity_id.get(),
            name: organisation.name.clone(),
            phone: organisation.phone.clone(),
            email: organisation.email.clone(),
            url_site: organisation.url_site.clone(),
            sector: organisation.sector.clone(),
            legal_form: organisation.legal_form.clone(),
            siret: organisation.siret.clone(),
            capital: organisation.capital,
            annual_revenue: organisation.annual_revenue.clone(),
            creation_date: organisation.creation_date,
            is_managed: organisation.is_managed,
        }
    }
}

impl From<Organisation> for DomainOrganisation {
    fn from(organisation: Organisation) -> Self {
        Self {
            name: organisation.name,
            phone: organisation.phone,
            email: organisation.email,
            url_site: organisation.url_site,
            sector: organisation.sector,
            legal_form: organisation.legal_form,
            siret: organisation.siret,
            capital: organisation.capital,
            annual_revenue: organisation.annual_revenue,
            creation_date: organisation.creation_date,
            is_managed: organisation.is_managed,
        }
    }
}

impl TryFrom<Address> for DomainAddress {
    type Error = TypeConstraintError;

    fn try_from(address: Address) -> Result<Self, Self::Error> {
        Ok(Self {
            id: AddressId::new(address.id)?,
            owner_id: EntityId::new(address.owner_id)?,
            kind: AddressKind::try_from(address.kind.as_str())?,
            fields: AddressFields {
                name: address.name,
                address: address.address,
                po_box: address.po_box,
                zipcode: address.zipcode,
                city: address.city,
                department: address.department,
                state: address.state,
                country: address.country,
            },
        })
    }
}

impl<'a> From<&'a DomainNewAddress> for NewAddress<'a> {
    fn from(address: &'a DomainNewAddress) -> Self {
        let fields = &address.fields;
        Self {
            owner_id: address.owner_id.get(),
            kind: address.kind.as_str(),
            name: &fields.name,
            address: &fields.address,
            po_box: &fields.po_box,
            zipcode: &fields.zipcode,
            city: &fields.city,
            department: &fields.department,
            state: &fields.state,
            country: &fields.country,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_round_trip() {
        let mut contact = DomainContact::new("Jet", "Black");
        contact.is_user = Some(UserId::new(2).expect("valid id"));
        let entity_id = EntityId::new(10).expect("valid id");
        let db = Contact::from_domain(entity_id, &contact);
        assert_eq!(db.entity_id, 10);
        assert_eq!(db.is_user, Some(2));
        assert_eq!(DomainContact::try_from(db), Ok(contact));
    }

    #[test]
    fn address_kind_is_checked() {
        let db = Address {
            id: 1,
            owner_id: 2,
            kind: "holiday".into(),
            name: String::new(),
            address: String::new(),
            po_box: String::new(),
            zipcode: String::new(),
            city: String::new(),
            department: String::new(),
            state: String::new(),
            country: String::new(),
        };
        assert!(DomainAddress::try_from(db).is_err());
    }
}
