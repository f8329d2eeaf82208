//! In-memory store implementing every lookup trait.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use storefx_common::{
    select_operative_table, Currency, CurrencyCode, CurrencyId, ExchangeRate, ExchangeRateId,
    ExchangeTable, ExchangeTableId, ModelError, ModelResult, ScopeId, Timestamp,
};
use tracing::debug;

use crate::error::FxResult;
use crate::store::{CurrencyLookup, ExchangeRateLookup, ExchangeTableLookup, SiteCurrencySettings};

#[derive(Debug, Default)]
struct StoreState {
    currencies: HashMap<CurrencyId, Currency>,
    tables: HashMap<ExchangeTableId, ExchangeTable>,
    rates: HashMap<ExchangeRateId, ExchangeRate>,
    global_currency_sites: HashSet<ScopeId>,
}

impl StoreState {
    fn rate_for(&self, table: ExchangeTableId, currency: CurrencyId) -> Option<&ExchangeRate> {
        self.rates
            .values()
            .find(|r| r.table_id == table && r.to_currency_id == currency)
    }

    fn main_currency(&self, scope: ScopeId) -> Option<&Currency> {
        self.currencies
            .values()
            .find(|c| c.scope == scope && c.is_main)
    }
}

/// Thread-safe in-memory currency, table and rate store.
///
/// Mutations check the model invariants: unique ids, one main currency per
/// scope, unique codes per scope and at most one rate per table and currency.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from complete record sets.
    pub fn from_records(
        currencies: impl IntoIterator<Item = Currency>,
        tables: impl IntoIterator<Item = ExchangeTable>,
        rates: impl IntoIterator<Item = ExchangeRate>,
    ) -> ModelResult<Self> {
        let store = Self::new();
        for currency in currencies {
            store.add_currency(currency)?;
        }
        for table in tables {
            store.add_table(table)?;
        }
        for rate in rates {
            store.add_rate(rate)?;
        }
        Ok(store)
    }

    /// Add a currency.
    pub fn add_currency(&self, currency: Currency) -> ModelResult<()> {
        if !currency.code.is_valid() {
            return Err(ModelError::InvalidCurrencyCode(currency.code.to_string()));
        }

        let mut state = self.state.write();

        if state.currencies.contains_key(&currency.id) {
            return Err(ModelError::DuplicateId {
                kind: "currency",
                id: currency.id.as_i32(),
            });
        }

        if state
            .currencies
            .values()
            .any(|c| c.scope == currency.scope && c.code == currency.code)
        {
            return Err(ModelError::DuplicateCurrencyCode {
                scope: currency.scope,
                code: currency.code,
            });
        }

        if currency.is_main {
            if let Some(existing) = state.main_currency(currency.scope) {
                return Err(ModelError::DuplicateMainCurrency {
                    scope: currency.scope,
                    existing: existing.code.clone(),
                });
            }
        }

        debug!(currency = %currency, "Currency added");
        state.currencies.insert(currency.id, currency);
        Ok(())
    }

    /// Remove a currency together with every rate targeting it.
    pub fn remove_currency(&self, id: CurrencyId) -> Option<Currency> {
        let mut state = self.state.write();
        let removed = state.currencies.remove(&id)?;
        state.rates.retain(|_, r| r.to_currency_id != id);
        Some(removed)
    }

    /// Add an exchange table.
    pub fn add_table(&self, table: ExchangeTable) -> ModelResult<()> {
        table.validate()?;

        let mut state = self.state.write();
        if state.tables.contains_key(&table.id) {
            return Err(ModelError::DuplicateId {
                kind: "exchange table",
                id: table.id.as_i32(),
            });
        }

        debug!(table_id = %table.id, scope = %table.scope, "Exchange table added");
        state.tables.insert(table.id, table);
        Ok(())
    }

    /// Replace an existing table's header (validity, global rate).
    pub fn update_table(&self, table: ExchangeTable) -> ModelResult<()> {
        table.validate()?;

        let mut state = self.state.write();
        match state.tables.get_mut(&table.id) {
            Some(existing) => {
                *existing = table;
                Ok(())
            }
            None => Err(ModelError::UnknownTable(table.id)),
        }
    }

    /// Remove a table and its rates.
    pub fn remove_table(&self, id: ExchangeTableId) -> Option<ExchangeTable> {
        let mut state = self.state.write();
        let removed = state.tables.remove(&id)?;
        state.rates.retain(|_, r| r.table_id != id);
        Some(removed)
    }

    /// Add a rate row.
    pub fn add_rate(&self, rate: ExchangeRate) -> ModelResult<()> {
        rate.validate()?;

        let mut state = self.state.write();
        if !state.tables.contains_key(&rate.table_id) {
            return Err(ModelError::UnknownTable(rate.table_id));
        }
        if !state.currencies.contains_key(&rate.to_currency_id) {
            return Err(ModelError::UnknownCurrency(rate.to_currency_id));
        }
        if state.rates.contains_key(&rate.id) {
            return Err(ModelError::DuplicateId {
                kind: "exchange rate",
                id: rate.id.as_i32(),
            });
        }
        if state.rate_for(rate.table_id, rate.to_currency_id).is_some() {
            return Err(ModelError::DuplicateRate {
                table: rate.table_id,
                currency: rate.to_currency_id,
            });
        }

        state.rates.insert(rate.id, rate);
        Ok(())
    }

    /// Insert or update the rate of `currency` in `table`.
    pub fn set_rate(
        &self,
        table: ExchangeTableId,
        currency: CurrencyId,
        value: Decimal,
    ) -> ModelResult<ExchangeRateId> {
        let mut state = self.state.write();

        let existing = state.rate_for(table, currency).map(|r| r.id);
        let id = existing.unwrap_or_else(|| {
            let next = state.rates.keys().map(|id| id.as_i32()).max().unwrap_or(0) + 1;
            ExchangeRateId::new(next)
        });

        let rate = ExchangeRate::new(id, table, currency, value);
        rate.validate()?;
        if !state.tables.contains_key(&table) {
            return Err(ModelError::UnknownTable(table));
        }
        if !state.currencies.contains_key(&currency) {
            return Err(ModelError::UnknownCurrency(currency));
        }

        state.rates.insert(id, rate);
        Ok(id)
    }

    /// Remove a rate row.
    pub fn remove_rate(&self, id: ExchangeRateId) -> Option<ExchangeRate> {
        self.state.write().rates.remove(&id)
    }

    /// Configure whether a site uses the global currencies.
    pub fn set_use_global_currencies(&self, site: ScopeId, enabled: bool) {
        let mut state = self.state.write();
        if enabled {
            state.global_currency_sites.insert(site);
        } else {
            state.global_currency_sites.remove(&site);
        }
    }
}

#[async_trait]
impl CurrencyLookup for MemoryStore {
    async fn by_code(&self, code: &CurrencyCode, scope: ScopeId) -> FxResult<Option<Currency>> {
        Ok(self
            .state
            .read()
            .currencies
            .values()
            .find(|c| c.scope == scope && &c.code == code)
            .cloned())
    }

    async fn by_id(&self, id: CurrencyId) -> FxResult<Option<Currency>> {
        Ok(self.state.read().currencies.get(&id).cloned())
    }
}

#[async_trait]
impl ExchangeTableLookup for MemoryStore {
    async fn last_valid_or_expired(
        &self,
        scope: ScopeId,
        now: Timestamp,
    ) -> FxResult<Option<ExchangeTable>> {
        let state = self.state.read();
        let tables = state.tables.values().filter(|t| t.scope == scope);
        Ok(select_operative_table(tables, now).cloned())
    }
}

#[async_trait]
impl ExchangeRateLookup for MemoryStore {
    async fn by_table_and_target(
        &self,
        table: ExchangeTableId,
        currency: CurrencyId,
    ) -> FxResult<Option<ExchangeRate>> {
        Ok(self.state.read().rate_for(table, currency).cloned())
    }
}

#[async_trait]
impl SiteCurrencySettings for MemoryStore {
    async fn main_currency_code(&self, scope: ScopeId) -> FxResult<Option<CurrencyCode>> {
        Ok(self.state.read().main_currency(scope).map(|c| c.code.clone()))
    }

    async fn use_global_currencies(&self, site: ScopeId) -> FxResult<bool> {
        Ok(!site.is_global() && self.state.read().global_currency_sites.contains(&site))
    }
}
