//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for record identifiers and
//! monetary amounts. Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// RecordId
// ============================================================================

/// Identifier of a locally-created record that may need to reach the remote
///
/// New records get a random UUID v4, but any non-empty identifier without
/// surrounding whitespace is accepted so records created elsewhere keep
/// their ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Create a RecordId from an existing identifier
    ///
    /// # Errors
    /// Returns error if the identifier is empty or padded with whitespace
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::InvalidId(
                "Record ID cannot be empty".to_string(),
            ));
        }
        if id.trim() != id {
            return Err(DomainError::InvalidId(format!(
                "Record ID has surrounding whitespace: {id:?}"
            )));
        }
        Ok(Self(id))
    }

    /// Generate a fresh random identifier
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Amount
// ============================================================================

/// Largest accepted amount in minor units (999,999,999.00)
pub const MAX_AMOUNT_CENTS: u64 = 99_999_999_900;

/// A strictly positive monetary amount stored in minor units (cents)
///
/// The textual form accepts whole numbers with up to two decimals
/// (`"12"`, `"12.5"`, `"12.34"`). Serialized as an integer number of cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Amount(u64);

impl Amount {
    /// Create an amount from minor units
    ///
    /// # Errors
    /// Returns error if the amount is zero or above [`MAX_AMOUNT_CENTS`]
    pub fn from_cents(cents: u64) -> Result<Self, DomainError> {
        if cents == 0 {
            return Err(DomainError::InvalidAmount(
                "amount must be greater than 0".to_string(),
            ));
        }
        if cents > MAX_AMOUNT_CENTS {
            return Err(DomainError::InvalidAmount(format!(
                "amount must not exceed {}",
                Self(MAX_AMOUNT_CENTS)
            )));
        }
        Ok(Self(cents))
    }

    /// Amount in minor units
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Amount {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            DomainError::InvalidAmount(format!(
                "'{s}' is not a number with at most two decimals"
            ))
        };

        let (whole, fraction) = match s.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (s, None),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let fraction_cents = match fraction {
            None => 0,
            Some(f) if (1..=2).contains(&f.len()) && f.bytes().all(|b| b.is_ascii_digit()) => {
                let value: u64 = f.parse().map_err(|_| invalid())?;
                if f.len() == 1 {
                    value * 10
                } else {
                    value
                }
            }
            Some(_) => return Err(invalid()),
        };

        // Leading zeros are accepted, oversized inputs are rejected as out of range
        let whole_units: u64 = whole.parse().map_err(|_| {
            DomainError::InvalidAmount(format!("amount must not exceed {}", Self(MAX_AMOUNT_CENTS)))
        })?;

        let cents = whole_units
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction_cents))
            .ok_or_else(|| {
                DomainError::InvalidAmount(format!(
                    "amount must not exceed {}",
                    Self(MAX_AMOUNT_CENTS)
                ))
            })?;

        Self::from_cents(cents)
    }
}

impl TryFrom<u64> for Amount {
    type Error = DomainError;

    fn try_from(cents: u64) -> Result<Self, Self::Error> {
        Self::from_cents(cents)
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}
