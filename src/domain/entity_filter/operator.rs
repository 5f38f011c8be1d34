//! Comparison operators of field conditions.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::fields::{FieldType, FieldValue, parse_bool};
use crate::domain::types::TypeConstraintError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Operator {
    Equals,
    IEquals,
    EqualsNot,
    IEqualsNot,
    Contains,
    IContains,
    ContainsNot,
    IContainsNot,
    Gt,
    Gte,
    Lt,
    Lte,
    StartsWith,
    IStartsWith,
    StartsWithNot,
    IStartsWithNot,
    EndsWith,
    IEndsWith,
    EndsWithNot,
    IEndsWithNot,
    IsEmpty,
    Range,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TextOp {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
}

impl Operator {
    pub const ALL: [Operator; 22] = [
        Operator::Equals,
        Operator::IEquals,
        Operator::EqualsNot,
        Operator::IEqualsNot,
        Operator::Contains,
        Operator::IContains,
        Operator::ContainsNot,
        Operator::IContainsNot,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::StartsWith,
        Operator::IStartsWith,
        Operator::StartsWithNot,
        Operator::IStartsWithNot,
        Operator::EndsWith,
        Operator::IEndsWith,
        Operator::EndsWithNot,
        Operator::IEndsWithNot,
        Operator::IsEmpty,
        Operator::Range,
    ];

    /// Stable identifier stored in condition values.
    pub fn id(self) -> i32 {
        Operator::ALL
            .iter()
            .position(|operator| *operator == self)
            .map_or(0, |index| index as i32 + 1)
    }

    pub fn verbose_name(self) -> &'static str {
        match self {
            Operator::Equals => "Equals",
            Operator::IEquals => "Equals (case insensitive)",
            Operator::EqualsNot => "Does not equal",
            Operator::IEqualsNot => "Does not equal (case insensitive)",
            Operator::Contains => "Contains",
            Operator::IContains => "Contains (case insensitive)",
            Operator::ContainsNot => "Does not contain",
            Operator::IContainsNot => "Does not contain (case insensitive)",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::StartsWith => "Starts with",
            Operator::IStartsWith => "Starts with (case insensitive)",
            Operator::StartsWithNot => "Does not start with",
            Operator::IStartsWithNot => "Does not start with (case insensitive)",
            Operator::EndsWith => "Ends with",
            Operator::IEndsWith => "Ends with (case insensitive)",
            Operator::EndsWithNot => "Does not end with",
            Operator::IEndsWithNot => "Does not end with (case insensitive)",
            Operator::IsEmpty => "Is empty",
            Operator::Range => "Range",
        }
    }

    /// Negative operators require every value to mismatch.
    pub fn is_exclude(self) -> bool {
        matches!(
            self,
            Operator::EqualsNot
                | Operator::IEqualsNot
                | Operator::ContainsNot
                | Operator::IContainsNot
                | Operator::StartsWithNot
                | Operator::IStartsWithNot
                | Operator::EndsWithNot
                | Operator::IEndsWithNot
        )
    }

    fn is_case_insensitive(self) -> bool {
        matches!(
            self,
            Operator::IEquals
                | Operator::IEqualsNot
                | Operator::IContains
                | Operator::IContainsNot
                | Operator::IStartsWith
                | Operator::IStartsWithNot
                | Operator::IEndsWith
                | Operator::IEndsWithNot
        )
    }

    fn text_op(self) -> Option<TextOp> {
        match self {
            Operator::IEquals | Operator::IEqualsNot => Some(TextOp::Equals),
            Operator::Contains | Operator::IContains | Operator::ContainsNot | Operator::IContainsNot => {
                Some(TextOp::Contains)
            }
            Operator::StartsWith
            | Operator::IStartsWith
            | Operator::StartsWithNot
            | Operator::IStartsWithNot => Some(TextOp::StartsWith),
            Operator::EndsWith | Operator::IEndsWith | Operator::EndsWithNot | Operator::IEndsWithNot => {
                Some(TextOp::EndsWith)
            }
            _ => None,
        }
    }

    /// Field types on which the operator can be used.
    pub fn accepts(self, field_type: FieldType) -> bool {
        match self {
            Operator::Equals | Operator::EqualsNot => true,
            Operator::IsEmpty => field_type != FieldType::Boolean,
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte | Operator::Range => {
                field_type.is_numeric() || field_type.is_temporal()
            }
            _ => field_type.is_textual(),
        }
    }

    /// Checks the number of operands and parses them with the field type.
    pub fn parse_values(
        self,
        field_type: FieldType,
        raw: &[String],
    ) -> Result<Vec<FieldValue>, TypeConstraintError> {
        match self {
            Operator::IsEmpty => {
                let [value] = raw else {
                    return Err(TypeConstraintError::InvalidValue(
                        "\"is empty\" takes exactly one boolean".to_string(),
                    ));
                };
                parse_bool(value)
                    .map(|flag| vec![FieldValue::Boolean(flag)])
                    .ok_or_else(|| TypeConstraintError::InvalidValue(value.clone()))
            }
            Operator::Range => {
                if raw.len() != 2 {
                    return Err(TypeConstraintError::InvalidValue(
                        "a range takes exactly two values".to_string(),
                    ));
                }
                raw.iter().map(|value| parse_operand(field_type, value)).collect()
            }
            _ => {
                if raw.is_empty() {
                    return Err(TypeConstraintError::InvalidValue(
                        "at least one value is needed".to_string(),
                    ));
                }
                if self.text_op().is_some() {
                    return Ok(raw.iter().map(|value| FieldValue::Text(value.clone())).collect());
                }
                raw.iter().map(|value| parse_operand(field_type, value)).collect()
            }
        }
    }

    /// Applies the operator to `value` with already parsed operands.
    pub fn matches(self, value: &FieldValue, operands: &[FieldValue]) -> bool {
        match self {
            Operator::IsEmpty => {
                let expected = operands
                    .first()
                    .and_then(FieldValue::as_bool)
                    .unwrap_or(true);
                value.is_empty() == expected
            }
            Operator::Range => match operands {
                [low, high] => {
                    matches!(
                        value.compare(low),
                        Some(Ordering::Greater | Ordering::Equal)
                    ) && matches!(value.compare(high), Some(Ordering::Less | Ordering::Equal))
                }
                _ => false,
            },
            Operator::Equals => operands.iter().any(|operand| equals(value, operand)),
            Operator::EqualsNot => !operands.iter().any(|operand| equals(value, operand)),
            Operator::Gt => compare_any(value, operands, |o| o == Ordering::Greater),
            Operator::Gte => compare_any(value, operands, |o| o != Ordering::Less),
            Operator::Lt => compare_any(value, operands, |o| o == Ordering::Less),
            Operator::Lte => compare_any(value, operands, |o| o != Ordering::Greater),
            _ => {
                let Some(op) = self.text_op() else {
                    return false;
                };
                let insensitive = self.is_case_insensitive();
                let hit = !value.is_empty()
                    && operands
                        .iter()
                        .any(|operand| text_matches(op, insensitive, value, operand));
                if self.is_exclude() { !hit } else { hit }
            }
        }
    }
}

fn parse_operand(field_type: FieldType, raw: &str) -> Result<FieldValue, TypeConstraintError> {
    match field_type.parse_value(raw)? {
        FieldValue::Null => Err(TypeConstraintError::EmptyString),
        value => Ok(value),
    }
}

fn equals(value: &FieldValue, operand: &FieldValue) -> bool {
    match (value, operand) {
        (FieldValue::Text(a), FieldValue::Integer(b)) | (FieldValue::Integer(b), FieldValue::Text(a)) => {
            a.parse::<i64>().is_ok_and(|a| a == *b)
        }
        _ => value.compare(operand) == Some(Ordering::Equal),
    }
}

fn compare_any(value: &FieldValue, operands: &[FieldValue], test: impl Fn(Ordering) -> bool) -> bool {
    operands
        .iter()
        .any(|operand| value.compare(operand).is_some_and(&test))
}

fn text_matches(op: TextOp, insensitive: bool, value: &FieldValue, operand: &FieldValue) -> bool {
    let (mut haystack, mut needle) = (value.to_string(), operand.to_string());
    if insensitive {
        haystack = haystack.to_lowercase();
        needle = needle.to_lowercase();
    }
    match op {
        TextOp::Equals => haystack == needle,
        TextOp::Contains => haystack.contains(&needle),
        TextOp::StartsWith => haystack.starts_with(&needle),
        TextOp::EndsWith => haystack.ends_with(&needle),
    }
}

impl From<Operator> for i32 {
    fn from(value: Operator) -> Self {
        value.id()
    }
}

impl TryFrom<i32> for Operator {
    type Error = TypeConstraintError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value - 1)
            .ok()
            .and_then(|index| Operator::ALL.get(index).copied())
            .ok_or_else(|| TypeConstraintError::InvalidValue(format!("operator {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> FieldValue {
        FieldValue::Text(value.to_string())
    }

    #[test]
    fn ids_are_stable() {
        assert_eq!(Operator::Equals.id(), 1);
        assert_eq!(Operator::IContains.id(), 6);
        assert_eq!(Operator::IsEmpty.id(), 21);
        assert_eq!(Operator::Range.id(), 22);
        assert_eq!(Operator::try_from(9), Ok(Operator::Gt));
        assert!(Operator::try_from(23).is_err());
        assert!(Operator::try_from(0).is_err());
    }

    #[test]
    fn positive_operators_or_their_values() {
        let value = text("Spiegel");
        assert!(Operator::Equals.matches(&value, &[text("Black"), text("Spiegel")]));
        assert!(Operator::IStartsWith.matches(&value, &[text("spi")]));
        assert!(!Operator::StartsWith.matches(&value, &[text("spi")]));
        assert!(Operator::IContains.matches(&value, &[text("IEG")]));
    }

    #[test]
    fn negative_operators_and_their_values() {
        let value = text("Spiegel");
        assert!(!Operator::IContainsNot.matches(&value, &[text("x"), text("GEL")]));
        assert!(Operator::IContainsNot.matches(&value, &[text("x"), text("y")]));
        assert!(Operator::ContainsNot.matches(&FieldValue::Null, &[text("a")]));
        assert!(Operator::EqualsNot.matches(&FieldValue::Null, &[text("a")]));
    }

    #[test]
    fn numeric_comparisons_and_ranges() {
        let value = FieldValue::Integer(10);
        assert!(Operator::Gt.matches(&value, &[FieldValue::Integer(5)]));
        assert!(!Operator::Lt.matches(&value, &[FieldValue::Integer(5)]));
        assert!(Operator::Range.matches(&value, &[FieldValue::Integer(10), FieldValue::Integer(20)]));
        assert!(!Operator::Gt.matches(&FieldValue::Null, &[FieldValue::Integer(5)]));
    }

    #[test]
    fn is_empty_takes_a_boolean() {
        assert!(Operator::IsEmpty.matches(&FieldValue::Null, &[FieldValue::Boolean(true)]));
        assert!(Operator::IsEmpty.matches(&text("a"), &[FieldValue::Boolean(false)]));
        assert!(Operator::IsEmpty.parse_values(FieldType::String, &["maybe".into()]).is_err());
        assert!(Operator::IsEmpty.parse_values(FieldType::String, &[]).is_err());
    }

    #[test]
    fn operand_counts_and_types_are_checked() {
        assert!(Operator::Range.parse_values(FieldType::Integer, &["1".into()]).is_err());
        assert!(Operator::Gt.parse_values(FieldType::Integer, &["a".into()]).is_err());
        assert!(Operator::Equals.parse_values(FieldType::String, &[]).is_err());
        assert!(!Operator::Gt.accepts(FieldType::String));
        assert!(!Operator::IContains.accepts(FieldType::Integer));
        assert!(Operator::Range.accepts(FieldType::Date));
    }
}
