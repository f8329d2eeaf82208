//! Monetary types: currency codes, currency records and money.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identifiers::{CurrencyId, ScopeId};

/// Currency code (ISO 4217 style), always stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Create a new currency code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the code is non-empty and alphanumeric.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.len() <= 10 && self.0.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CurrencyCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// A currency configured for a site or for the global scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// Record id.
    pub id: CurrencyId,
    /// Currency code, unique within the scope.
    pub code: CurrencyCode,
    /// Human readable name.
    #[serde(default)]
    pub display_name: String,
    /// Whether this is the main currency of its scope.
    pub is_main: bool,
    /// Owning scope.
    #[serde(default)]
    pub scope: ScopeId,
    /// Decimal places converted amounts are rounded to.
    #[serde(default = "default_round_to")]
    pub round_to: u32,
}

fn default_round_to() -> u32 {
    2
}

impl Currency {
    /// Create a new currency record.
    pub fn new(id: impl Into<CurrencyId>, code: impl Into<CurrencyCode>, scope: ScopeId) -> Self {
        let code = code.into();
        Self {
            id: id.into(),
            display_name: code.to_string(),
            code,
            is_main: false,
            scope,
            round_to: default_round_to(),
        }
    }

    /// Mark this currency as the main currency of its scope.
    pub fn main(mut self) -> Self {
        self.is_main = true;
        self
    }

    /// Set the rounding precision.
    pub fn with_round_to(mut self, places: u32) -> Self {
        self.round_to = places;
        self
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Check if the currency belongs to the global scope.
    pub fn is_global(&self) -> bool {
        self.scope.is_global()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.scope)
    }
}

/// A monetary amount with currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount value.
    pub value: Decimal,
    /// Currency code.
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(value: Decimal, currency: impl Into<CurrencyCode>) -> Self {
        Self {
            value,
            currency: currency.into(),
        }
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: impl Into<CurrencyCode>) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Round to the given number of decimal places, midpoint away from zero.
    pub fn round_to(&self, places: u32) -> Self {
        Self {
            value: self
                .value
                .round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero),
            currency: self.currency.clone(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}
