//! Named date ranges of date conditions.

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::fields::FieldValue;

/// Stored as `{"name": "current_year"}` or `{"name": "custom", "start": ..., "end": ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum DateRange {
    PreviousYear,
    CurrentYear,
    NextYear,
    PreviousQuarter,
    CurrentQuarter,
    NextQuarter,
    PreviousMonth,
    CurrentMonth,
    NextMonth,
    Yesterday,
    Today,
    Tomorrow,
    InPast,
    InFuture,
    Empty,
    NotEmpty,
    Custom {
        #[serde(default)]
        start: Option<NaiveDate>,
        #[serde(default)]
        end: Option<NaiveDate>,
    },
}

/// Inclusive bounds; `None` means unbounded.
type Bounds = (Option<NaiveDate>, Option<NaiveDate>);

fn year_bounds(year: i32) -> Bounds {
    (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    )
}

fn month_start(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)
}

/// Bounds of the `months`-long period starting at `start`.
fn period_bounds(start: Option<NaiveDate>, months: u32) -> Bounds {
    let end = start
        .and_then(|date| date.checked_add_months(Months::new(months)))
        .map(|date| date - Duration::days(1));
    (start, end)
}

fn quarter_start(date: NaiveDate) -> Option<NaiveDate> {
    let month = (date.month0() / 3) * 3 + 1;
    NaiveDate::from_ymd_opt(date.year(), month, 1)
}

impl DateRange {
    /// Whether the range is valid (a custom range needs at least one bound).
    pub fn is_valid(&self) -> bool {
        match self {
            DateRange::Custom { start, end } => match (start, end) {
                (None, None) => false,
                (Some(start), Some(end)) => start <= end,
                _ => true,
            },
            _ => true,
        }
    }

    /// Inclusive bounds relative to `today`; `None` for the emptiness ranges.
    pub fn bounds(&self, today: NaiveDate) -> Option<Bounds> {
        let bounds = match self {
            DateRange::PreviousYear => year_bounds(today.year() - 1),
            DateRange::CurrentYear => year_bounds(today.year()),
            DateRange::NextYear => year_bounds(today.year() + 1),
            DateRange::PreviousQuarter => period_bounds(
                quarter_start(today).and_then(|d| d.checked_sub_months(Months::new(3))),
                3,
            ),
            DateRange::CurrentQuarter => period_bounds(quarter_start(today), 3),
            DateRange::NextQuarter => period_bounds(
                quarter_start(today).and_then(|d| d.checked_add_months(Months::new(3))),
                3,
            ),
            DateRange::PreviousMonth => period_bounds(
                month_start(today).and_then(|d| d.checked_sub_months(Months::new(1))),
                1,
            ),
            DateRange::CurrentMonth => period_bounds(month_start(today), 1),
            DateRange::NextMonth => period_bounds(
                month_start(today).and_then(|d| d.checked_add_months(Months::new(1))),
                1,
            ),
            DateRange::Yesterday => {
                let day = today.pred_opt();
                (day, day)
            }
            DateRange::Today => (Some(today), Some(today)),
            DateRange::Tomorrow => {
                let day = today.succ_opt();
                (day, day)
            }
            DateRange::InPast => (None, today.pred_opt()),
            DateRange::InFuture => (today.succ_opt(), None),
            DateRange::Custom { start, end } => (*start, *end),
            DateRange::Empty | DateRange::NotEmpty => return None,
        };
        Some(bounds)
    }

    pub fn matches(&self, value: &FieldValue, today: NaiveDate) -> bool {
        match self {
            DateRange::Empty => return value.is_empty(),
            DateRange::NotEmpty => return !value.is_empty(),
            _ => {}
        }
        let (Some(date), Some((start, end))) = (value.as_date(), self.bounds(today)) else {
            return false;
        };
        start.is_none_or(|start| date >= start) && end.is_none_or(|end| date <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn quarter_bounds() {
        let today = date(2024, 5, 17);
        assert_eq!(
            DateRange::CurrentQuarter.bounds(today),
            Some((Some(date(2024, 4, 1)), Some(date(2024, 6, 30))))
        );
        assert_eq!(
            DateRange::PreviousQuarter.bounds(today),
            Some((Some(date(2024, 1, 1)), Some(date(2024, 3, 31))))
        );
        assert_eq!(
            DateRange::NextQuarter.bounds(date(2024, 11, 2)),
            Some((Some(date(2025, 1, 1)), Some(date(2025, 3, 31))))
        );
    }

    #[test]
    fn month_bounds_handle_year_change() {
        assert_eq!(
            DateRange::PreviousMonth.bounds(date(2024, 1, 10)),
            Some((Some(date(2023, 12, 1)), Some(date(2023, 12, 31))))
        );
        assert_eq!(
            DateRange::CurrentMonth.bounds(date(2024, 2, 10)),
            Some((Some(date(2024, 2, 1)), Some(date(2024, 2, 29))))
        );
    }

    #[test]
    fn matches_values() {
        let today = date(2024, 5, 17);
        assert!(DateRange::Today.matches(&FieldValue::Date(today), today));
        assert!(DateRange::InPast.matches(&FieldValue::Date(date(2020, 1, 1)), today));
        assert!(!DateRange::InFuture.matches(&FieldValue::Date(today), today));
        assert!(DateRange::Empty.matches(&FieldValue::Null, today));
        assert!(!DateRange::CurrentYear.matches(&FieldValue::Null, today));
        let custom = DateRange::Custom {
            start: Some(date(2024, 5, 1)),
            end: None,
        };
        assert!(custom.matches(&FieldValue::Date(date(2030, 1, 1)), today));
    }

    #[test]
    fn custom_range_needs_a_bound() {
        assert!(!DateRange::Custom { start: None, end: None }.is_valid());
        assert!(
            !DateRange::Custom {
                start: Some(date(2024, 2, 1)),
                end: Some(date(2024, 1, 1))
            }
            .is_valid()
        );
    }

    #[test]
    fn serialized_form() {
        let range: DateRange =
            serde_json::from_str(r#"{"name":"custom","start":"2024-01-01"}"#).expect("valid json");
        assert_eq!(
            range,
            DateRange::Custom {
                start: Some(date(2024, 1, 1)),
                end: None
            }
        );
        assert_eq!(
            serde_json::to_string(&DateRange::CurrentYear).expect("serializable"),
            r#"{"name":"current_year"}"#
        );
    }
}
