//! FX error types.

use std::time::Duration;

use storefx_common::{CurrencyId, ExchangeTableId, ModelError, ScopeId};
use thiserror::Error;

/// Errors that can occur while resolving rates or converting amounts.
#[derive(Debug, Error)]
pub enum FxError {
    /// No currency with this code exists for the site or globally.
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// A referenced currency id does not exist.
    #[error("Currency not found: {0}")]
    UnknownCurrencyId(CurrencyId),

    /// Conversion between two different sites.
    #[error("Cannot convert between currencies of {from} and {to}")]
    CrossSiteConversion { from: ScopeId, to: ScopeId },

    /// No exchange table exists for the scope.
    #[error("No exchange table found for {0}")]
    NoExchangeTable(ScopeId),

    /// The resolved table has no rate for the currency.
    #[error("Exchange rate for currency {currency} not found in table {table}")]
    RateNotAvailable {
        currency: CurrencyId,
        table: ExchangeTableId,
    },

    /// The resolved rate is zero or negative.
    #[error("Exchange rate for currency {currency} in table {table} is not positive")]
    NonPositiveRate {
        currency: CurrencyId,
        table: ExchangeTableId,
    },

    /// The rate from the global main currency is missing or not positive.
    #[error("Rate from the global main currency is not available for {0}")]
    MissingGlobalRate(ScopeId),

    /// Decimal arithmetic overflowed or divided by zero.
    #[error("Arithmetic overflow while computing {0}")]
    Overflow(&'static str),

    /// A store lookup did not finish in time.
    #[error("Rate lookup timed out after {0:?}")]
    LookupTimeout(Duration),

    /// The backing store failed.
    #[error("Store error: {0}")]
    Store(String),

    /// A record failed validation.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The process-wide converter was used before installation.
    #[error("Currency converter has not been installed")]
    NotInstalled,
}

impl FxError {
    /// Check if this error means the requested conversion cannot be performed.
    pub fn is_invalid_conversion(&self) -> bool {
        matches!(
            self,
            FxError::UnknownCurrencyId(_)
                | FxError::CrossSiteConversion { .. }
                | FxError::NoExchangeTable(_)
                | FxError::RateNotAvailable { .. }
                | FxError::NonPositiveRate { .. }
                | FxError::MissingGlobalRate(_)
        )
    }

    /// Check if this error was caused by the caller's arguments.
    pub fn is_argument_error(&self) -> bool {
        matches!(self, FxError::UnknownCurrency(_))
    }

    /// Get error code for event logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::UnknownCurrency(_) => "UNKNOWN_CURRENCY",
            FxError::UnknownCurrencyId(_) => "UNKNOWN_CURRENCY_ID",
            FxError::CrossSiteConversion { .. } => "CROSS_SITE_CONVERSION",
            FxError::NoExchangeTable(_) => "NO_EXCHANGE_TABLE",
            FxError::RateNotAvailable { .. } => "RATE_NOT_AVAILABLE",
            FxError::NonPositiveRate { .. } => "NON_POSITIVE_RATE",
            FxError::MissingGlobalRate(_) => "MISSING_GLOBAL_RATE",
            FxError::Overflow(_) => "OVERFLOW",
            FxError::LookupTimeout(_) => "LOOKUP_TIMEOUT",
            FxError::Store(_) => "STORE_ERROR",
            FxError::Model(e) => e.error_code(),
            FxError::NotInstalled => "NOT_INSTALLED",
        }
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
