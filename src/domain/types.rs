//! Strongly-typed value objects used by domain entities.
//!
//! These wrappers enforce basic invariants (e.g., positive identifiers,
//! normalized/validated email) so that once a value reaches the domain layer it
//! can be treated as trusted.
use std::{ops::Deref, str::FromStr};

use phonenumber::{Mode, parse};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use uuid::Uuid;
use validator::{ValidateEmail, ValidateUrl};

/// Errors produced when attempting to construct a constrained value object.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeConstraintError {
    /// Provided identifier is zero or negative.
    #[error("id must be greater than zero")]
    NonPositiveId,
    /// Provided email failed format validation.
    #[error("invalid email address")]
    InvalidEmail,
    /// Provided string contained no non-whitespace characters.
    #[error("value cannot be empty")]
    EmptyString,
    /// Provided value failed custom validation.
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// Phone number did not meet expected format.
    #[error("invalid phone number")]
    InvalidPhone,
    /// Provided url failed format validation.
    #[error("invalid url address")]
    InvalidUrl,
    /// Provided uuid failed format validation.
    #[error("invalid uuid value")]
    InvalidUuid,
    /// Provided decimal could not be parsed.
    #[error("invalid decimal number: {0}")]
    InvalidDecimal(String),
}

/// Normalizes and validates an email string.
fn normalize_email<S: Into<String>>(email: S) -> Result<String, TypeConstraintError> {
    let normalized = email.into().trim().to_lowercase();
    if normalized.validate_email() {
        Ok(normalized)
    } else {
        Err(TypeConstraintError::InvalidEmail)
    }
}

/// Macro to generate lightweight newtypes for positive identifiers.
macro_rules! id_newtype {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(i32);

        impl $name {
            /// Creates a new identifier ensuring it is greater than zero.
            pub fn new(value: i32) -> Result<Self, TypeConstraintError> {
                if value > 0 {
                    Ok(Self(value))
                } else {
                    Err(TypeConstraintError::NonPositiveId)
                }
            }

            /// Returns the raw `i32` backing this identifier.
            pub const fn get(self) -> i32 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<i32> for $name {
            type Error = TypeConstraintError;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = TypeConstraintError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| TypeConstraintError::InvalidValue(s.to_string()))?;
                Self::new(raw)
            }
        }
    };
}

id_newtype!(EntityId, "Unique identifier of a CRM entity (shared by every entity kind).");
id_newtype!(UserId, "Unique identifier for a user.");
id_newtype!(RelationId, "Unique identifier for a relation.");
id_newtype!(PropertyTypeId, "Unique identifier for a property type.");
id_newtype!(CustomFieldId, "Unique identifier for a custom field.");
id_newtype!(EnumValueId, "Unique identifier for a custom field choice.");
id_newtype!(AddressId, "Unique identifier for a postal address.");
id_newtype!(CalendarId, "Unique identifier for a calendar.");
id_newtype!(LineId, "Unique identifier for a billing line.");
id_newtype!(StatusId, "Unique identifier for a billing status.");
id_newtype!(SendingId, "Unique identifier for an email sending.");
id_newtype!(JobId, "Unique identifier for a job.");

/// Lower-cased and validated email address.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Email(String);

impl Email {
    /// Validates and normalizes an email string.
    pub fn new<S: Into<String>>(email: S) -> Result<Self, TypeConstraintError> {
        let normalized = normalize_email(email)?;
        Ok(Self(normalized))
    }

    /// Borrow the email as a `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert into the owned inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = TypeConstraintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Email {
    type Error = TypeConstraintError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

/// Wrapper for non-empty, trimmed strings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Trims whitespace and rejects empty inputs.
    pub fn new<S: Into<String>>(value: S) -> Result<Self, TypeConstraintError> {
        let trimmed = value.into().trim().to_string();
        if trimmed.is_empty() {
            return Err(TypeConstraintError::EmptyString);
        }
        Ok(Self(trimmed))
    }

    /// Borrow the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper returning the owned string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! non_empty_string_newtype {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Constructs a trimmed, non-empty value.
            pub fn new<S: Into<String>>(value: S) -> Result<Self, TypeConstraintError> {
                let inner = NonEmptyString::new(value)?;
                Ok(Self(inner.into_inner()))
            }

            /// Borrow the value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the owned string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypeConstraintError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = TypeConstraintError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

non_empty_string_newtype!(UserName, "Display name of a user enforcing non-empty values.");
non_empty_string_newtype!(Label, "Generic trimmed, non-empty label (names, titles, predicates).");
non_empty_string_newtype!(FilterKey, "String identifier of an entity/header filter or relation type.");

/// Free text sanitized from any active HTML content.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
pub struct SafeText(String);

impl SafeText {
    /// Sanitizes and trims the provided text. Empty text is allowed.
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(ammonia::clean(value.into().trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for SafeText {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalizes a phone number string to E.164 format.
pub fn normalize_phone_to_e164(value: &str) -> Result<String, TypeConstraintError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TypeConstraintError::EmptyString);
    }
    let parsed = parse(None, trimmed).map_err(|_| TypeConstraintError::InvalidPhone)?;
    Ok(parsed.format().mode(Mode::E164).to_string())
}

/// Normalized phone number wrapper (expected E.164).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Constructs a phone number ensuring it is valid and normalizes to E.164 format.
    pub fn new<S: Into<String>>(value: S) -> Result<Self, TypeConstraintError> {
        let normalized = normalize_phone_to_e164(&value.into())?;
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for PhoneNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for PhoneNumber {
    type Error = TypeConstraintError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Validated absolute URL.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WebUrl(String);

impl WebUrl {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, TypeConstraintError> {
        let url = NonEmptyString::new(value)?;

        if !url.as_str().validate_url() {
            Err(TypeConstraintError::InvalidUrl)
        } else {
            Ok(Self(url.into_inner()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for WebUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable public identifier of an entity or configuration item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicId(Uuid);

impl PublicId {
    /// Generate a new random public ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Display for PublicId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PublicId {
    type Err = TypeConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(
            Uuid::parse_str(s.trim()).map_err(|_| TypeConstraintError::InvalidUuid)?,
        ))
    }
}

impl Default for PublicId {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-point decimal number with two fractional digits, stored as hundredths.
///
/// Used for money amounts, quantities and percentages (`20.00` VAT is `2000`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Decimal2(i64);

impl Decimal2 {
    pub const ZERO: Decimal2 = Decimal2(0);
    pub const ONE: Decimal2 = Decimal2(100);
    pub const HUNDRED: Decimal2 = Decimal2(10_000);

    pub const fn from_hundredths(value: i64) -> Self {
        Self(value)
    }

    pub const fn from_units(value: i64) -> Self {
        Self(value * 100)
    }

    pub const fn hundredths(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Product of two decimals, rounded half away from zero.
    pub fn mul(self, other: Decimal2) -> Decimal2 {
        let raw = i128::from(self.0) * i128::from(other.0);
        Decimal2(round_div(raw, 100))
    }

    /// Applies a percentage (`Decimal2` percent, e.g. `20.00`) to the value.
    pub fn percent(self, rate: Decimal2) -> Decimal2 {
        let raw = i128::from(self.0) * i128::from(rate.0);
        Decimal2(round_div(raw, 10_000))
    }

    pub fn checked_add(self, other: Decimal2) -> Option<Decimal2> {
        self.0.checked_add(other.0).map(Decimal2)
    }

    pub fn checked_sub(self, other: Decimal2) -> Option<Decimal2> {
        self.0.checked_sub(other.0).map(Decimal2)
    }
}

fn round_div(value: i128, divisor: i128) -> i64 {
    let half = divisor / 2;
    let rounded = if value >= 0 {
        (value + half) / divisor
    } else {
        (value - half) / divisor
    };
    rounded.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

impl std::ops::Add for Decimal2 {
    type Output = Decimal2;

    fn add(self, rhs: Decimal2) -> Decimal2 {
        Decimal2(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Decimal2 {
    type Output = Decimal2;

    fn sub(self, rhs: Decimal2) -> Decimal2 {
        Decimal2(self.0.saturating_sub(rhs.0))
    }
}

impl std::iter::Sum for Decimal2 {
    fn sum<I: Iterator<Item = Decimal2>>(iter: I) -> Self {
        iter.fold(Decimal2::ZERO, |acc, value| acc + value)
    }
}

impl Display for Decimal2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Decimal2 {
    type Err = TypeConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeConstraintError::InvalidDecimal(s.to_string());
        let trimmed = s.trim().replace(',', ".");
        if trimmed.is_empty() {
            return Err(invalid());
        }
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.as_str()),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if frac_part.len() > 2
            || (int_part.is_empty() && frac_part.is_empty())
            || !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        let int_value: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };
        let frac_value: i64 = match frac_part.len() {
            0 => 0,
            1 => frac_part.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac_part.parse().map_err(|_| invalid())?,
        };
        let value = int_value
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac_value))
            .ok_or_else(invalid)?;
        Ok(Decimal2(if negative { -value } else { value }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        let email = Email::new("  John.Doe@Example.COM ").expect("valid email");
        assert_eq!(email.as_str(), "john.doe@example.com");
        assert!(Email::new("not-an-email").is_err());
    }

    #[test]
    fn ids_must_be_positive() {
        assert!(EntityId::new(0).is_err());
        assert_eq!(EntityId::new(3).map(EntityId::get), Ok(3));
        assert_eq!("12".parse::<UserId>().map(UserId::get), Ok(12));
    }

    #[test]
    fn decimal_parses_and_formats() {
        assert_eq!("12.5".parse::<Decimal2>(), Ok(Decimal2::from_hundredths(1250)));
        assert_eq!("-0,05".parse::<Decimal2>(), Ok(Decimal2::from_hundredths(-5)));
        assert_eq!("3".parse::<Decimal2>(), Ok(Decimal2::from_units(3)));
        assert!("1.234".parse::<Decimal2>().is_err());
        assert!("abc".parse::<Decimal2>().is_err());
        assert_eq!(Decimal2::from_hundredths(-1205).to_string(), "-12.05");
    }

    #[test]
    fn decimal_arithmetic_rounds_half_away_from_zero() {
        let price = Decimal2::from_hundredths(1999);
        let quantity = Decimal2::from_hundredths(150);
        assert_eq!(price.mul(quantity), Decimal2::from_hundredths(2999));
        let vat = Decimal2::from_units(20);
        assert_eq!(Decimal2::from_units(100).percent(vat), Decimal2::from_units(20));
        assert_eq!(Decimal2::from_hundredths(5).percent(Decimal2::from_units(50)), Decimal2::from_hundredths(3));
    }

    #[test]
    fn safe_text_strips_scripts() {
        let text = SafeText::new(" hello <script>alert(1)</script> ");
        assert_eq!(text.as_str(), "hello ");
    }
}
