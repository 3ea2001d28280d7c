//! Phone number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Phone`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum PhoneError {
    /// The input string is empty (or whitespace only).
    #[error("phone number cannot be empty")]
    Empty,
    /// The input contains a character outside the allowed set.
    #[error("phone number contains invalid character '{0}'")]
    InvalidCharacter(char),
    /// The input has too few digits to be a dialable number.
    #[error("phone number must contain at least {min} digits")]
    TooShort {
        /// Minimum number of digits required.
        min: usize,
    },
    /// The input has more digits than any international number.
    #[error("phone number must contain at most {max} digits")]
    TooLong {
        /// Maximum number of digits allowed.
        max: usize,
    },
}

/// A phone number as submitted by an applicant.
///
/// Stored verbatim (after trimming) so the admin sees what was typed;
/// validation only checks that the value is plausibly dialable. Accepts
/// digits plus the common formatting characters `+`, `-`, spaces, and
/// parentheses.
///
/// ## Examples
///
/// ```
/// use crestway_core::Phone;
///
/// assert!(Phone::parse("+94 77 123 4567").is_ok());
/// assert!(Phone::parse("0771234567").is_ok());
///
/// assert!(Phone::parse("").is_err());
/// assert!(Phone::parse("call me").is_err());
/// assert!(Phone::parse("12345").is_err()); // too short
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Minimum digits for a dialable number.
    pub const MIN_DIGITS: usize = 7;
    /// Maximum digits (ITU-T E.164).
    pub const MAX_DIGITS: usize = 15;

    /// Parse a `Phone` from a string, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, contains a character
    /// outside digits/`+`/`-`/spaces/parentheses, or has fewer than 7 or
    /// more than 15 digits.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();

        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')')))
        {
            return Err(PhoneError::InvalidCharacter(bad));
        }

        let digits = s.chars().filter(char::is_ascii_digit).count();
        if digits < Self::MIN_DIGITS {
            return Err(PhoneError::TooShort {
                min: Self::MIN_DIGITS,
            });
        }
        if digits > Self::MAX_DIGITS {
            return Err(PhoneError::TooLong {
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the phone number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Phone` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Phone {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Phone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Phone {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Phone {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed valid
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Phone {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
