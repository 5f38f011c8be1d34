//! Calendar-aware periods used by jobs and recurrent generators.

use std::fmt::{Display, Formatter};

use chrono::{Duration, Months, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::TypeConstraintError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl PeriodUnit {
    pub const ALL: [PeriodUnit; 6] = [
        PeriodUnit::Minutes,
        PeriodUnit::Hours,
        PeriodUnit::Days,
        PeriodUnit::Weeks,
        PeriodUnit::Months,
        PeriodUnit::Years,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PeriodUnit::Minutes => "minutes",
            PeriodUnit::Hours => "hours",
            PeriodUnit::Days => "days",
            PeriodUnit::Weeks => "weeks",
            PeriodUnit::Months => "months",
            PeriodUnit::Years => "years",
        }
    }
}

impl TryFrom<&str> for PeriodUnit {
    type Error = TypeConstraintError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        PeriodUnit::ALL
            .into_iter()
            .find(|unit| unit.as_str() == value)
            .ok_or_else(|| TypeConstraintError::InvalidValue(format!("period unit {value}")))
    }
}

/// A strictly positive number of units, stored as `{"unit": "days", "value": 2}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct DatePeriod {
    unit: PeriodUnit,
    value: u32,
}

#[derive(Deserialize)]
struct RawPeriod {
    unit: PeriodUnit,
    value: u32,
}

impl TryFrom<RawPeriod> for DatePeriod {
    type Error = TypeConstraintError;

    fn try_from(raw: RawPeriod) -> Result<Self, Self::Error> {
        DatePeriod::new(raw.unit, raw.value)
    }
}

impl DatePeriod {
    pub fn new(unit: PeriodUnit, value: u32) -> Result<Self, TypeConstraintError> {
        if value == 0 {
            return Err(TypeConstraintError::InvalidValue(
                "a period needs at least one unit".to_string(),
            ));
        }
        Ok(Self { unit, value })
    }

    pub fn unit(&self) -> PeriodUnit {
        self.unit
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Adds the period; month based units clamp to the end of the month.
    pub fn add_to(&self, date: NaiveDateTime) -> Option<NaiveDateTime> {
        let value = i64::from(self.value);
        match self.unit {
            PeriodUnit::Minutes => date.checked_add_signed(Duration::minutes(value)),
            PeriodUnit::Hours => date.checked_add_signed(Duration::hours(value)),
            PeriodUnit::Days => date.checked_add_signed(Duration::days(value)),
            PeriodUnit::Weeks => date.checked_add_signed(Duration::weeks(value)),
            PeriodUnit::Months => date.checked_add_months(Months::new(self.value)),
            PeriodUnit::Years => self
                .value
                .checked_mul(12)
                .and_then(|months| date.checked_add_months(Months::new(months))),
        }
    }

    pub fn to_json(&self) -> String {
        format!(
            "{{\"unit\":\"{}\",\"value\":{}}}",
            self.unit.as_str(),
            self.value
        )
    }

    pub fn from_json(raw: &str) -> Result<Self, TypeConstraintError> {
        serde_json::from_str(raw).map_err(|err| TypeConstraintError::InvalidValue(err.to_string()))
    }
}

impl Display for DatePeriod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.unit.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(8, 0, 0))
            .expect("valid datetime")
    }

    #[test]
    fn months_clamp_to_month_end() {
        let period = DatePeriod::new(PeriodUnit::Months, 1).expect("valid period");
        assert_eq!(period.add_to(at(2024, 1, 31)), Some(at(2024, 2, 29)));
        let yearly = DatePeriod::new(PeriodUnit::Years, 1).expect("valid period");
        assert_eq!(yearly.add_to(at(2024, 2, 29)), Some(at(2025, 2, 28)));
    }

    #[test]
    fn fixed_units() {
        let period = DatePeriod::new(PeriodUnit::Weeks, 2).expect("valid period");
        assert_eq!(period.add_to(at(2024, 1, 1)), Some(at(2024, 1, 15)));
    }

    #[test]
    fn zero_is_rejected() {
        assert!(DatePeriod::new(PeriodUnit::Days, 0).is_err());
        assert!(DatePeriod::from_json(r#"{"unit":"days","value":0}"#).is_err());
    }

    #[test]
    fn json_form() {
        let period = DatePeriod::new(PeriodUnit::Hours, 1).expect("valid period");
        assert_eq!(period.to_json(), r#"{"unit":"hours","value":1}"#);
        assert_eq!(DatePeriod::from_json(&period.to_json()), Ok(period));
    }
}
