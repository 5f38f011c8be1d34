//! Forms for entity filters, header filters and custom forms.

use serde::Deserialize;
use validator::Validate;

use crate::domain::custom_form::FormGroup;
use crate::domain::entity::EntityKind;
use crate::domain::entity_filter::{ConditionRow, FilterCondition};
use crate::domain::header_filter::Cell;
use crate::forms::FormError;

fn parse_kind(raw: &str) -> Result<EntityKind, FormError> {
    raw.trim()
        .parse::<EntityKind>()
        .map_err(|_| FormError::InvalidKind(raw.to_string()))
}

fn parse_cells<'a>(raw: impl IntoIterator<Item = &'a str>) -> Result<Vec<Cell>, FormError> {
    raw.into_iter()
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(|cell| cell.parse::<Cell>().map_err(|err| FormError::invalid("cells", err)))
        .collect()
}

/// Entity filter with its conditions given as parallel lists.
#[derive(Debug, Deserialize, Validate)]
pub struct EntityFilterForm {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub entity_kind: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub use_or: bool,
    #[serde(default)]
    pub cond_kind: Vec<i32>,
    #[serde(default)]
    pub cond_name: Vec<String>,
    /// JSON operand of each condition.
    #[serde(default)]
    pub cond_value: Vec<String>,
}

pub struct EntityFilterPayload {
    pub name: String,
    pub entity_kind: EntityKind,
    pub is_private: bool,
    pub use_or: bool,
    pub conditions: Vec<FilterCondition>,
}

impl TryFrom<EntityFilterForm> for EntityFilterPayload {
    type Error = FormError;

    fn try_from(form: EntityFilterForm) -> Result<Self, Self::Error> {
        form.validate()?;
        if form.cond_kind.len() != form.cond_name.len()
            || form.cond_kind.len() != form.cond_value.len()
        {
            return Err(FormError::Malformed("incomplete condition".to_string()));
        }
        let conditions = form
            .cond_kind
            .iter()
            .zip(&form.cond_name)
            .zip(&form.cond_value)
            .map(|((kind, name), value)| {
                let row = ConditionRow {
                    kind: *kind,
                    name: name.trim().to_string(),
                    value: value.trim().to_string(),
                };
                FilterCondition::try_from(&row).map_err(|err| FormError::invalid("conditions", err))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: form.name.trim().to_string(),
            entity_kind: parse_kind(&form.entity_kind)?,
            is_private: form.is_private,
            use_or: form.use_or,
            conditions,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct HeaderFilterForm {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub entity_kind: String,
    #[serde(default)]
    pub is_private: bool,
    /// Cells in their compact form (`regular_field:name`).
    #[serde(default)]
    pub cells: Vec<String>,
}

pub struct HeaderFilterPayload {
    pub name: String,
    pub entity_kind: EntityKind,
    pub is_private: bool,
    pub cells: Vec<Cell>,
}

impl TryFrom<HeaderFilterForm> for HeaderFilterPayload {
    type Error = FormError;

    fn try_from(form: HeaderFilterForm) -> Result<Self, Self::Error> {
        form.validate()?;
        Ok(Self {
            name: form.name.trim().to_string(),
            entity_kind: parse_kind(&form.entity_kind)?,
            is_private: form.is_private,
            cells: parse_cells(form.cells.iter().map(String::as_str))?,
        })
    }
}

/// Groups of a custom form; `group_cells[i]` lists the cells of `group_name[i]`
/// separated by commas.
#[derive(Debug, Deserialize)]
pub struct CustomFormForm {
    #[serde(default)]
    pub group_name: Vec<String>,
    #[serde(default)]
    pub group_cells: Vec<String>,
}

impl TryFrom<CustomFormForm> for Vec<FormGroup> {
    type Error = FormError;

    fn try_from(form: CustomFormForm) -> Result<Self, Self::Error> {
        if form.group_name.len() != form.group_cells.len() {
            return Err(FormError::Malformed("incomplete group".to_string()));
        }
        form.group_name
            .iter()
            .zip(&form.group_cells)
            .map(|(name, cells)| {
                Ok(FormGroup {
                    name: name.trim().to_string(),
                    cells: parse_cells(cells.split(','))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_are_decoded_from_rows() {
        let form = EntityFilterForm {
            name: "Pilots".into(),
            entity_kind: "persons.contact".into(),
            is_private: false,
            use_or: true,
            cond_kind: vec![5, 10],
            cond_name: vec!["position".into(), "persons-subject_employed_by".into()],
            cond_value: vec![
                r#"{"operator":6,"values":["pilot"]}"#.into(),
                r#"{"has":true}"#.into(),
            ],
        };
        let payload = EntityFilterPayload::try_from(form).expect("valid form");
        assert_eq!(payload.conditions.len(), 2);
        assert!(payload.use_or);
    }

    #[test]
    fn incomplete_conditions_are_rejected() {
        let form = EntityFilterForm {
            name: "Pilots".into(),
            entity_kind: "persons.contact".into(),
            is_private: false,
            use_or: false,
            cond_kind: vec![5],
            cond_name: vec![],
            cond_value: vec![],
        };
        assert!(EntityFilterPayload::try_from(form).is_err());
    }

    #[test]
    fn form_groups_split_their_cells() {
        let form = CustomFormForm {
            group_name: vec!["General".into()],
            group_cells: vec!["regular_field:last_name, regular_field:email,".into()],
        };
        let groups = Vec::<FormGroup>::try_from(form).expect("valid groups");
        assert_eq!(groups[0].cells.len(), 2);
    }
}
