//! Forms for custom field administration.

use serde::Deserialize;
use validator::Validate;

use crate::domain::custom_field::{CustomFieldType, NewCustomField};
use crate::domain::entity::EntityKind;
use crate::domain::types::{Label, PublicId};
use crate::forms::FormError;

#[derive(Debug, Deserialize, Validate)]
pub struct CustomFieldForm {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub entity_kind: String,
    /// Code of the [`CustomFieldType`].
    pub field_type: i32,
    #[serde(default)]
    pub is_required: bool,
    /// One choice per line, for choice lists.
    #[serde(default)]
    pub choices: String,
}

impl TryFrom<CustomFieldForm> for NewCustomField {
    type Error = FormError;

    fn try_from(form: CustomFieldForm) -> Result<Self, Self::Error> {
        form.validate()?;
        let name = Label::new(form.name).map_err(|_| FormError::InvalidName)?;
        let kind = form
            .entity_kind
            .parse::<EntityKind>()
            .map_err(|_| FormError::InvalidKind(form.entity_kind.clone()))?;
        let field_type = CustomFieldType::try_from(form.field_type)
            .map_err(|err| FormError::invalid("field_type", err))?;

        let mut choices: Vec<String> = Vec::new();
        for line in form.choices.lines().map(str::trim).filter(|line| !line.is_empty()) {
            if !choices.iter().any(|choice| choice.eq_ignore_ascii_case(line)) {
                choices.push(line.to_string());
            }
        }
        if !field_type.has_choices() && !choices.is_empty() {
            return Err(FormError::invalid("choices", "only choice lists have choices"));
        }

        Ok(NewCustomField {
            uuid: PublicId::new(),
            name: name.into_inner(),
            kind,
            field_type,
            is_required: form.is_required,
            choices,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddChoiceForm {
    #[validate(length(min = 1, max = 100))]
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(field_type: i32, choices: &str) -> CustomFieldForm {
        CustomFieldForm {
            name: " Ship ".into(),
            entity_kind: "persons.contact".into(),
            field_type,
            is_required: false,
            choices: choices.into(),
        }
    }

    #[test]
    fn choices_are_trimmed_and_deduplicated() {
        let field = NewCustomField::try_from(form(100, "Bebop\n\n bebop \nSwordfish"))
            .expect("valid form");
        assert_eq!(field.name, "Ship");
        assert_eq!(field.field_type, CustomFieldType::Enum);
        assert_eq!(field.choices, vec!["Bebop", "Swordfish"]);
    }

    #[test]
    fn plain_fields_have_no_choices() {
        assert!(NewCustomField::try_from(form(10, "Bebop")).is_err());
        assert!(NewCustomField::try_from(form(999, "")).is_err());
    }
}
