//! Common data types for the conference relay crates.

use crate::error::PhoneNumberError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum digit count accepted after the leading `+`.
const MIN_DIGITS: usize = 10;

/// Maximum digit count allowed by E.164.
const MAX_DIGITS: usize = 15;

/// A validated phone number in E.164 form (`+` followed by 10-15 digits).
///
/// Surrounding whitespace is trimmed during parsing; nothing else is
/// normalized, so two numbers compare equal only if the provider and the
/// organizer spell them identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parse an E.164 phone number.
    ///
    /// # Errors
    ///
    /// Returns a [`PhoneNumberError`] describing the first rule the input violates.
    pub fn parse(input: &str) -> Result<Self, PhoneNumberError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PhoneNumberError::Empty);
        }

        let digits = trimmed
            .strip_prefix('+')
            .ok_or_else(|| PhoneNumberError::MissingPlus(trimmed.to_string()))?;

        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(PhoneNumberError::NonDigit(trimmed.to_string()));
        }

        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
            return Err(PhoneNumberError::InvalidLength {
                number: trimmed.to_string(),
                digits: digits.len(),
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Parse a number that must be in North American `+1XXXYYYZZZZ` form.
    ///
    /// # Errors
    ///
    /// Returns [`PhoneNumberError::NotNorthAmerican`] for valid E.164 numbers
    /// outside the `+1` plan, or the underlying parse error.
    pub fn parse_north_american(input: &str) -> Result<Self, PhoneNumberError> {
        let number = Self::parse(input)?;
        if number.is_north_american() {
            Ok(number)
        } else {
            Err(PhoneNumberError::NotNorthAmerican(number.0))
        }
    }

    /// Whether this number has the `+1XXXYYYZZZZ` shape.
    #[must_use]
    pub fn is_north_american(&self) -> bool {
        self.0.len() == 12 && self.0.starts_with("+1")
    }

    /// The number as it is sent to the provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PhoneNumber {
    type Err = PhoneNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(number: PhoneNumber) -> Self {
        number.0
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Direction of a call leg relative to the system's own number.
///
/// The provider reports `"in"` / `"out"`; the long forms are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallDirection {
    /// Someone dialed the system number.
    #[serde(rename = "in", alias = "inbound")]
    Inbound,
    /// The system dialed someone.
    #[serde(rename = "out", alias = "outbound")]
    Outbound,
}
