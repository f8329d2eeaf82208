//! Validation errors for StoreFX records.

use crate::{CurrencyCode, CurrencyId, ExchangeTableId, ScopeId};
use thiserror::Error;

/// Error raised when a record violates a model invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Currency code is empty or malformed.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrencyCode(String),

    /// A second main currency was configured for a scope.
    #[error("Scope {scope} already has main currency {existing}")]
    DuplicateMainCurrency {
        scope: ScopeId,
        existing: CurrencyCode,
    },

    /// The same code was configured twice in one scope.
    #[error("Currency {code} already exists in {scope}")]
    DuplicateCurrencyCode { scope: ScopeId, code: CurrencyCode },

    /// Validity window ends before it starts.
    #[error("Exchange table {0} has valid_to before valid_from")]
    InvalidValidity(ExchangeTableId),

    /// Stored rate value is zero or negative.
    #[error("Exchange table {table} has a non-positive rate for currency {currency}")]
    NonPositiveRate {
        table: ExchangeTableId,
        currency: CurrencyId,
    },

    /// Rate from the global main currency is zero or negative.
    #[error("Exchange table {0} has a non-positive rate from the global main currency")]
    NonPositiveGlobalRate(ExchangeTableId),

    /// A rate row references a table that does not exist.
    #[error("Exchange table not found: {0}")]
    UnknownTable(ExchangeTableId),

    /// A rate row references a currency that does not exist.
    #[error("Currency not found: {0}")]
    UnknownCurrency(CurrencyId),

    /// The table already has a rate for this currency.
    #[error("Exchange table {table} already has a rate for currency {currency}")]
    DuplicateRate {
        table: ExchangeTableId,
        currency: CurrencyId,
    },

    /// A record with this id already exists.
    #[error("Duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: i32 },
}

impl ModelError {
    /// Get error code for event logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            ModelError::InvalidCurrencyCode(_) => "INVALID_CURRENCY_CODE",
            ModelError::DuplicateMainCurrency { .. } => "DUPLICATE_MAIN_CURRENCY",
            ModelError::DuplicateCurrencyCode { .. } => "DUPLICATE_CURRENCY_CODE",
            ModelError::InvalidValidity(_) => "INVALID_VALIDITY",
            ModelError::NonPositiveRate { .. } => "NON_POSITIVE_RATE",
            ModelError::NonPositiveGlobalRate(_) => "NON_POSITIVE_GLOBAL_RATE",
            ModelError::UnknownTable(_) => "UNKNOWN_TABLE",
            ModelError::UnknownCurrency(_) => "UNKNOWN_CURRENCY",
            ModelError::DuplicateRate { .. } => "DUPLICATE_RATE",
            ModelError::DuplicateId { .. } => "DUPLICATE_ID",
        }
    }
}

/// Result type alias for model validation.
pub type ModelResult<T> = std::result::Result<T, ModelError>;
