//! Generic forms shared by every kind of entity.

use std::collections::HashMap;

use serde::Deserialize;
use validator::Validate;

use crate::domain::persons::{AddressFields, AddressKind, NewAddress};
use crate::domain::types::{EntityId, PublicId};
use crate::forms::{FormError, parse_ids, parse_urlencoded};

/// Prefix of the inputs holding custom field values.
pub const CUSTOM_FIELD_PREFIX: &str = "cf_";

/// Creation or edition form of an entity: raw values keyed by input name.
///
/// Regular fields use their name, custom fields `cf_<uuid>`.
#[derive(Debug, Default, Clone)]
pub struct EntityForm {
    values: HashMap<String, Vec<String>>,
}

impl EntityForm {
    pub fn from_bytes(body: &[u8]) -> Result<Self, FormError> {
        let pairs: Vec<(String, String)> = parse_urlencoded(body)?;
        Ok(Self::from_pairs(pairs))
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in pairs {
            values.entry(key.into()).or_default().push(value.into());
        }
        Self { values }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// First value of the input, trimmed.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|values| values.first())
            .map(|value| value.trim())
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.values.get(name).map_or(&[], Vec::as_slice)
    }

    /// Positive id from the input, if present and not blank.
    pub fn get_id(&self, name: &str) -> Result<Option<EntityId>, FormError> {
        match self.get(name).filter(|value| !value.is_empty()) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<EntityId>()
                .map(Some)
                .map_err(|_| FormError::InvalidId),
        }
    }

    pub fn custom_value(&self, uuid: &PublicId) -> Option<&[String]> {
        self.values
            .get(&format!("{CUSTOM_FIELD_PREFIX}{uuid}"))
            .map(Vec::as_slice)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), vec![value.into()]);
    }
}

/// Query string of the list views.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListQuery {
    /// Entity filter id.
    #[serde(default)]
    pub filter: Option<String>,
    /// Header filter id.
    #[serde(default)]
    pub hfilter: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
}

/// Sets the same value on several entities.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkEditForm {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub ids: Vec<i32>,
    /// Regular field name or `cf_<uuid>`.
    #[validate(length(min = 1))]
    pub field: String,
    #[serde(default)]
    pub value: Vec<String>,
}

pub struct BulkEditPayload {
    pub ids: Vec<EntityId>,
    pub field: String,
    pub value: Vec<String>,
}

impl TryFrom<BulkEditForm> for BulkEditPayload {
    type Error = FormError;

    fn try_from(form: BulkEditForm) -> Result<Self, Self::Error> {
        form.validate()?;
        let mut ids: Vec<EntityId> = parse_ids(&form.ids)?;
        ids.sort();
        ids.dedup();
        Ok(Self {
            ids,
            field: form.field.trim().to_string(),
            value: form.value,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddressForm {
    pub kind: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub po_box: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub zipcode: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
}

impl AddressForm {
    pub fn into_new_address(self, owner_id: EntityId) -> Result<NewAddress, FormError> {
        self.validate()?;
        let kind = AddressKind::try_from(self.kind.as_str())
            .map_err(|err| FormError::invalid("kind", err))?;
        let fields = AddressFields {
            name: self.name.trim().to_string(),
            address: self.address.trim().to_string(),
            po_box: self.po_box.trim().to_string(),
            zipcode: self.zipcode.trim().to_string(),
            city: self.city.trim().to_string(),
            department: self.department.trim().to_string(),
            state: self.state.trim().to_string(),
            country: self.country.trim().to_string(),
        };
        if fields.is_empty() {
            return Err(FormError::invalid("address", "the address is empty"));
        }
        Ok(NewAddress {
            owner_id,
            kind,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_repeated_inputs() {
        let uuid = PublicId::new();
        let body = format!("last_name=+Spiegel+&cf_{uuid}=1&cf_{uuid}=2&owner=3");
        let form = EntityForm::from_bytes(body.as_bytes()).expect("valid body");

        assert_eq!(form.get("last_name"), Some("Spiegel"));
        assert_eq!(form.custom_value(&uuid).map(<[String]>::len), Some(2));
        assert_eq!(form.get_id("owner").expect("valid id").map(|id| id.get()), Some(3));
        assert!(!form.contains("first_name"));
    }

    #[test]
    fn bulk_edit_requires_ids() {
        let form = BulkEditForm {
            ids: vec![],
            field: "sector".into(),
            value: vec!["Space".into()],
        };
        assert!(BulkEditPayload::try_from(form).is_err());

        let form = BulkEditForm {
            ids: vec![3, 2, 3],
            field: " sector ".into(),
            value: vec![],
        };
        let payload = BulkEditPayload::try_from(form).expect("valid form");
        assert_eq!(payload.ids.len(), 2);
        assert_eq!(payload.field, "sector");
    }

    #[test]
    fn empty_addresses_are_rejected() {
        let form = AddressForm {
            kind: "billing".into(),
            name: String::new(),
            address: " ".into(),
            po_box: String::new(),
            zipcode: String::new(),
            city: String::new(),
            department: String::new(),
            state: String::new(),
            country: String::new(),
        };
        let owner = EntityId::new(1).expect("valid id");
        assert!(form.into_new_address(owner).is_err());
    }
}
