//! Diesel models for custom fields, their choices and their values.

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;

use crate::domain::custom_field::{
    CustomField as DomainCustomField, CustomFieldEnumValue, CustomFieldType, CustomValue,
};
use crate::domain::types::{CustomFieldId, Decimal2, EnumValueId, TypeConstraintError};

#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::custom_fields)]
pub struct CustomField {
    pub id: i32,
    pub uuid: String,
    pub name: String,
    pub kind: String,
    pub field_type: i32,
    pub is_required: bool,
    pub is_deleted: bool,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::custom_fields)]
pub struct NewCustomField<'a> {
    pub uuid: String,
    pub name: &'a str,
    pub kind: &'a str,
    pub field_type: i32,
    pub is_required: bool,
}

#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::custom_field_enum_values)]
pub struct EnumValue {
    pub id: i32,
    pub uuid: String,
    pub custom_field_id: i32,
    pub value: String,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::custom_field_enum_values)]
pub struct NewEnumValue<'a> {
    pub uuid: String,
    pub custom_field_id: i32,
    pub value: &'a str,
}

/// One typed value; only the column matching the field type is set.
#[derive(Debug, Clone, Default, PartialEq, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::custom_field_values, treat_none_as_null = true)]
pub struct CustomFieldValue {
    pub custom_field_id: i32,
    pub entity_id: i32,
    pub int_value: Option<i64>,
    pub decimal_value: Option<i64>,
    pub bool_value: Option<bool>,
    pub text_value: Option<String>,
    pub date_value: Option<NaiveDate>,
    pub datetime_value: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::custom_field_multi_enum)]
pub struct MultiEnumValue {
    pub custom_field_id: i32,
    pub entity_id: i32,
    pub enum_value_id: i32,
}

impl TryFrom<CustomField> for DomainCustomField {
    type Error = TypeConstraintError;

    fn try_from(field: CustomField) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CustomFieldId::new(field.id)?,
            uuid: field.uuid.parse()?,
            name: field.name,
            kind: field.kind.parse()?,
            field_type: CustomFieldType::try_from(field.field_type)?,
            is_required: field.is_required,
            is_deleted: field.is_deleted,
        })
    }
}

impl TryFrom<EnumValue> for CustomFieldEnumValue {
    type Error = TypeConstraintError;

    fn try_from(value: EnumValue) -> Result<Self, Self::Error> {
        Ok(Self {
            id: EnumValueId::new(value.id)?,
            uuid: value.uuid.parse()?,
            custom_field_id: CustomFieldId::new(value.custom_field_id)?,
            value: value.value,
        })
    }
}

impl CustomFieldValue {
    /// Row storing a single (non multi-choice) value.
    pub fn from_domain(custom_field_id: i32, entity_id: i32, value: &CustomValue) -> Self {
        let mut row = Self {
            custom_field_id,
            entity_id,
            ..Default::default()
        };
        match value {
            CustomValue::Integer(number) => row.int_value = Some(*number),
            CustomValue::Decimal(number) => row.decimal_value = Some(number.hundredths()),
            CustomValue::Boolean(flag) => row.bool_value = Some(*flag),
            CustomValue::Text(text) => row.text_value = Some(text.clone()),
            CustomValue::Date(date) => row.date_value = Some(*date),
            CustomValue::DateTime(datetime) => row.datetime_value = Some(*datetime),
            CustomValue::Enum(id) => row.int_value = Some(i64::from(id.get())),
            CustomValue::MultiEnum(_) => {}
        }
        row
    }

    /// Reads the value back according to the field type.
    pub fn to_domain(&self, field_type: CustomFieldType) -> Result<Option<CustomValue>, TypeConstraintError> {
        let value = match field_type {
            CustomFieldType::Integer => self.int_value.map(CustomValue::Integer),
            CustomFieldType::Decimal => self
                .decimal_value
                .map(|raw| CustomValue::Decimal(Decimal2::from_hundredths(raw))),
            CustomFieldType::Boolean => self.bool_value.map(CustomValue::Boolean),
            CustomFieldType::String | CustomFieldType::Text | CustomFieldType::Url => {
                self.text_value.clone().map(CustomValue::Text)
            }
            CustomFieldType::Date => self.date_value.map(CustomValue::Date),
            CustomFieldType::DateTime => self.datetime_value.map(CustomValue::DateTime),
            CustomFieldType::Enum => match self.int_value {
                Some(raw) => {
                    let raw = i32::try_from(raw)
                        .map_err(|_| TypeConstraintError::InvalidValue(raw.to_string()))?;
                    Some(CustomValue::Enum(EnumValueId::new(raw)?))
                }
                None => None,
            },
            CustomFieldType::MultiEnum => None,
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_use_the_column_of_their_type() {
        let value = CustomValue::Decimal(Decimal2::from_hundredths(1250));
        let row = CustomFieldValue::from_domain(1, 2, &value);
        assert_eq!(row.decimal_value, Some(1250));
        assert_eq!(row.int_value, None);
        assert_eq!(row.to_domain(CustomFieldType::Decimal), Ok(Some(value)));
        assert_eq!(row.to_domain(CustomFieldType::Integer), Ok(None));

        let choice = CustomValue::Enum(EnumValueId::new(4).expect("valid id"));
        let row = CustomFieldValue::from_domain(1, 2, &choice);
        assert_eq!(row.to_domain(CustomFieldType::Enum), Ok(Some(choice)));
    }
}
