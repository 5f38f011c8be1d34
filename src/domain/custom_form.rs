//! Configurable creation and edition forms.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entity::EntityKind;
use crate::domain::fields::{all_fields, field_descriptor, kind_fields};
use crate::domain::header_filter::Cell;
use crate::domain::types::PublicId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CustomFormError {
    #[error("unknown form \"{0}\"")]
    UnknownDescriptor(String),
    #[error("unknown field \"{0}\"")]
    UnknownField(String),
    #[error("the field \"{0}\" cannot be edited")]
    ReadOnlyField(String),
    #[error("unknown custom field \"{0}\"")]
    UnknownCustomField(PublicId),
    #[error("relation columns cannot be used in forms")]
    RelationCell,
    #[error("the field \"{0}\" appears twice")]
    Duplicate(String),
    #[error("the required field \"{0}\" is missing")]
    MissingRequired(&'static str),
    #[error("a group needs a name")]
    UnnamedGroup,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    Creation,
    Edition,
}

impl FormType {
    pub fn as_str(self) -> &'static str {
        match self {
            FormType::Creation => "creation",
            FormType::Edition => "edition",
        }
    }
}

/// Identifies a form: `contact_creation`, `invoice_edition`...
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FormDescriptor {
    pub kind: EntityKind,
    pub form_type: FormType,
}

impl FormDescriptor {
    pub fn new(kind: EntityKind, form_type: FormType) -> Self {
        Self { kind, form_type }
    }

    pub fn id(&self) -> String {
        format!("{}_{}", self.kind.slug(), self.form_type.as_str())
    }

    pub fn parse(id: &str) -> Result<Self, CustomFormError> {
        let unknown = || CustomFormError::UnknownDescriptor(id.to_string());
        let (slug, form_type) = id.rsplit_once('_').ok_or_else(unknown)?;
        let form_type = match form_type {
            "creation" => FormType::Creation,
            "edition" => FormType::Edition,
            _ => return Err(unknown()),
        };
        let kind = EntityKind::from_slug(slug).ok_or_else(unknown)?;
        Ok(Self { kind, form_type })
    }

    /// Every descriptor of every kind.
    pub fn all() -> impl Iterator<Item = FormDescriptor> {
        EntityKind::ALL.into_iter().flat_map(|kind| {
            [FormType::Creation, FormType::Edition]
                .into_iter()
                .map(move |form_type| FormDescriptor::new(kind, form_type))
        })
    }
}

impl Display for FormDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormGroup {
    pub name: String,
    pub cells: Vec<Cell>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFormItem {
    pub descriptor_id: String,
    pub groups: Vec<FormGroup>,
}

impl CustomFormItem {
    /// Form used when nothing is configured: every editable field, then the
    /// live custom fields.
    pub fn default_for(descriptor: FormDescriptor, custom_fields: &[PublicId]) -> Self {
        let mut groups = vec![FormGroup {
            name: "General information".to_string(),
            cells: all_fields(descriptor.kind)
                .filter(|field| field.editable)
                .map(|field| Cell::RegularField(field.name.to_string()))
                .collect(),
        }];
        if !custom_fields.is_empty() {
            groups.push(FormGroup {
                name: "Custom fields".to_string(),
                cells: custom_fields.iter().copied().map(Cell::CustomField).collect(),
            });
        }
        Self {
            descriptor_id: descriptor.id(),
            groups,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.groups.iter().flat_map(|group| group.cells.iter())
    }

    /// Regular field names accepted by the form.
    pub fn regular_fields(&self) -> HashSet<&str> {
        self.cells()
            .filter_map(|cell| match cell {
                Cell::RegularField(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn custom_fields(&self) -> HashSet<PublicId> {
        self.cells()
            .filter_map(|cell| match cell {
                Cell::CustomField(uuid) => Some(*uuid),
                _ => None,
            })
            .collect()
    }

    /// Checks the groups against the kind of the descriptor.
    ///
    /// `custom_fields` maps the uuids of live custom fields to their kind.
    pub fn validate(&self, custom_fields: &HashMap<PublicId, EntityKind>) -> Result<(), CustomFormError> {
        let descriptor = FormDescriptor::parse(&self.descriptor_id)?;
        let kind = descriptor.kind;
        let mut seen = HashSet::new();
        for group in &self.groups {
            if group.name.trim().is_empty() {
                return Err(CustomFormError::UnnamedGroup);
            }
            for cell in &group.cells {
                match cell {
                    Cell::RegularField(name) => {
                        let field = field_descriptor(kind, name)
                            .ok_or_else(|| CustomFormError::UnknownField(name.clone()))?;
                        if !field.editable {
                            return Err(CustomFormError::ReadOnlyField(name.clone()));
                        }
                    }
                    Cell::CustomField(uuid) => {
                        if custom_fields.get(uuid) != Some(&kind) {
                            return Err(CustomFormError::UnknownCustomField(*uuid));
                        }
                    }
                    Cell::Relation(_) => return Err(CustomFormError::RelationCell),
                }
                if !seen.insert(cell) {
                    return Err(CustomFormError::Duplicate(cell.to_string()));
                }
            }
        }
        if descriptor.form_type == FormType::Creation {
            let present = self.regular_fields();
            if let Some(missing) = kind_fields(kind)
                .iter()
                .find(|field| field.required && field.editable && !present.contains(field.name))
            {
                return Err(CustomFormError::MissingRequired(missing.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular(name: &str) -> Cell {
        Cell::RegularField(name.to_string())
    }

    fn form(id: &str, cells: Vec<Cell>) -> CustomFormItem {
        CustomFormItem {
            descriptor_id: id.to_string(),
            groups: vec![FormGroup {
                name: "Main".into(),
                cells,
            }],
        }
    }

    #[test]
    fn descriptor_ids() {
        let descriptor = FormDescriptor::new(EntityKind::SalesOrder, FormType::Edition);
        assert_eq!(descriptor.id(), "salesorder_edition");
        assert_eq!(FormDescriptor::parse("salesorder_edition"), Ok(descriptor));
        assert!(FormDescriptor::parse("spaceship_creation").is_err());
        assert_eq!(FormDescriptor::all().count(), EntityKind::ALL.len() * 2);
    }

    #[test]
    fn default_forms_are_valid() {
        let empty = HashMap::new();
        for descriptor in FormDescriptor::all() {
            let item = CustomFormItem::default_for(descriptor, &[]);
            assert_eq!(item.validate(&empty), Ok(()), "{descriptor}");
        }
    }

    #[test]
    fn creation_forms_need_required_fields() {
        let item = form("contact_creation", vec![regular("first_name")]);
        assert_eq!(
            item.validate(&HashMap::new()),
            Err(CustomFormError::MissingRequired("last_name"))
        );
        let edition = form("contact_edition", vec![regular("first_name")]);
        assert_eq!(edition.validate(&HashMap::new()), Ok(()));
    }

    #[test]
    fn rejects_bad_cells() {
        let fields = HashMap::new();
        assert_eq!(
            form("contact_edition", vec![regular("is_user")]).validate(&fields),
            Err(CustomFormError::ReadOnlyField("is_user".into()))
        );
        assert_eq!(
            form("contact_edition", vec![regular("email"), regular("email")]).validate(&fields),
            Err(CustomFormError::Duplicate("regular_field:email".into()))
        );
        assert_eq!(
            form("contact_edition", vec![Cell::Relation("x".into())]).validate(&fields),
            Err(CustomFormError::RelationCell)
        );

        let uuid = PublicId::new();
        let orga_field = HashMap::from([(uuid, EntityKind::Organisation)]);
        assert_eq!(
            form("contact_edition", vec![Cell::CustomField(uuid)]).validate(&orga_field),
            Err(CustomFormError::UnknownCustomField(uuid))
        );
        assert_eq!(
            form("organisation_edition", vec![Cell::CustomField(uuid)]).validate(&orga_field),
            Ok(())
        );
    }
}
