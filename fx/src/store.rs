//! Lookup traits the host application implements to feed the rate engine.

use async_trait::async_trait;
use storefx_common::{
    Currency, CurrencyCode, CurrencyId, ExchangeRate, ExchangeTable, ExchangeTableId, ScopeId,
    Timestamp,
};

use crate::error::FxResult;

/// Currency records.
#[async_trait]
pub trait CurrencyLookup: Send + Sync {
    /// Get the currency with `code` defined in exactly `scope`.
    async fn by_code(&self, code: &CurrencyCode, scope: ScopeId) -> FxResult<Option<Currency>>;

    /// Get a currency by id.
    async fn by_id(&self, id: CurrencyId) -> FxResult<Option<Currency>>;
}

/// Exchange table records.
#[async_trait]
pub trait ExchangeTableLookup: Send + Sync {
    /// Get the table operative in `scope` at `now`, or else the last expired one.
    async fn last_valid_or_expired(
        &self,
        scope: ScopeId,
        now: Timestamp,
    ) -> FxResult<Option<ExchangeTable>>;
}

/// Exchange rate records.
#[async_trait]
pub trait ExchangeRateLookup: Send + Sync {
    /// Get the rate for `currency` inside `table`.
    async fn by_table_and_target(
        &self,
        table: ExchangeTableId,
        currency: CurrencyId,
    ) -> FxResult<Option<ExchangeRate>>;
}

/// Per-site currency settings.
#[async_trait]
pub trait SiteCurrencySettings: Send + Sync {
    /// Code of the main currency of `scope`, if one is configured.
    async fn main_currency_code(&self, scope: ScopeId) -> FxResult<Option<CurrencyCode>>;

    /// Whether `site` uses the global currencies instead of its own.
    async fn use_global_currencies(&self, site: ScopeId) -> FxResult<bool>;
}
