//! Common error types for the conference relay crates.

use thiserror::Error;

/// A string could not be interpreted as a phone number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneNumberError {
    /// Input was empty or whitespace only.
    #[error("Phone number is empty")]
    Empty,

    /// Input did not start with `+`.
    #[error("Phone number must start with '+': {0}")]
    MissingPlus(String),

    /// Input contained something other than digits after the `+`.
    #[error("Phone number contains non-digit characters: {0}")]
    NonDigit(String),

    /// Digit count outside the E.164 range.
    #[error("Phone number has {digits} digits, expected 10 to 15: {number}")]
    InvalidLength { number: String, digits: usize },

    /// Valid E.164 number that is not in `+1XXXYYYZZZZ` form.
    #[error("Phone number is not a +1XXXYYYZZZZ number: {0}")]
    NotNorthAmerican(String),
}
