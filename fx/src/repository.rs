//! Rate repository: resolves currencies, operative exchange tables and cached rates.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use rust_decimal::Decimal;
use storefx_common::{
    whole_minutes_until, Clock, Currency, CurrencyCode, CurrencyId, ExchangeTable, ScopeId,
    SystemClock,
};
use tracing::{debug, instrument, warn};

use crate::cache::{get_or_compute, Cache, CacheKey, Computed, DependencyTag, MemoryCache};
use crate::error::{FxError, FxResult};
use crate::store::{CurrencyLookup, ExchangeRateLookup, ExchangeTableLookup, SiteCurrencySettings};

/// Configuration for the rate repository.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// TTL of cached rates when the table's validity does not end sooner.
    pub default_cache_ttl: Duration,
    /// Upper bound for every single store call.
    pub lookup_timeout: Option<StdDuration>,
    /// Whether to cache resolved rates.
    pub use_cache: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            default_cache_ttl: Duration::minutes(10),
            lookup_timeout: None,
            use_cache: true,
        }
    }
}

/// The lookups the repository reads from.
#[derive(Clone)]
pub struct RateStores {
    pub currencies: Arc<dyn CurrencyLookup>,
    pub tables: Arc<dyn ExchangeTableLookup>,
    pub rates: Arc<dyn ExchangeRateLookup>,
    pub settings: Arc<dyn SiteCurrencySettings>,
}

impl RateStores {
    /// Use one store for every lookup.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: CurrencyLookup + ExchangeTableLookup + ExchangeRateLookup + SiteCurrencySettings + 'static,
    {
        Self {
            currencies: store.clone(),
            tables: store.clone(),
            rates: store.clone(),
            settings: store,
        }
    }
}

/// Read-only access to currencies and rates, with a cache in front of rate lookups.
pub struct RateRepository {
    stores: RateStores,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    config: RepositoryConfig,
}

impl RateRepository {
    /// Create a repository.
    pub fn new(
        stores: RateStores,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn Clock>,
        config: RepositoryConfig,
    ) -> Self {
        Self {
            stores,
            cache,
            clock,
            config,
        }
    }

    /// Create a repository with an in-memory cache and the system clock.
    pub fn with_defaults(stores: RateStores) -> Self {
        Self::new(
            stores,
            Arc::new(MemoryCache::new()),
            Arc::new(SystemClock),
            RepositoryConfig::default(),
        )
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Drop cached rates depending on `tag`. Call after records change.
    pub fn invalidate(&self, tag: &DependencyTag) -> usize {
        self.cache.touch(tag)
    }

    /// Find a currency by code: the site's own currency first, then the global one.
    #[instrument(skip(self))]
    pub async fn currency_by_code(&self, code: &str, site: ScopeId) -> FxResult<Option<Currency>> {
        let code = CurrencyCode::new(code);

        if !site.is_global() {
            if let Some(currency) = self.bounded(self.stores.currencies.by_code(&code, site)).await? {
                return Ok(Some(currency));
            }
        }

        self.bounded(self.stores.currencies.by_code(&code, ScopeId::GLOBAL))
            .await
    }

    /// Find a currency by id.
    pub async fn currency_by_id(&self, id: CurrencyId) -> FxResult<Option<Currency>> {
        self.bounded(self.stores.currencies.by_id(id)).await
    }

    /// The table operative for `site` now, or else its most recently expired table.
    #[instrument(skip(self))]
    pub async fn last_valid_exchange_table(&self, site: ScopeId) -> FxResult<Option<ExchangeTable>> {
        let now = self.clock.now();
        let table = self
            .bounded(self.stores.tables.last_valid_or_expired(site, now))
            .await?;

        match &table {
            Some(t) if t.is_valid_at(now) => {
                debug!(table_id = %t.id, "Operative exchange table resolved")
            }
            Some(t) => warn!(
                table_id = %t.id,
                valid_to = ?t.valid_to,
                "No valid exchange table, using last expired one"
            ),
            None => debug!("No exchange table for scope"),
        }

        Ok(table)
    }

    /// Rate from the site's main currency to `currency`, from the operative table.
    #[instrument(skip(self))]
    pub async fn last_exchange_rate_for_site(
        &self,
        currency: CurrencyId,
        site: ScopeId,
    ) -> FxResult<Decimal> {
        if !self.config.use_cache {
            return Ok(self.resolve_site_rate(currency, site).await?.value);
        }

        get_or_compute(
            self.cache.as_ref(),
            CacheKey::site_rate(currency, site),
            &DependencyTag::for_scope(site),
            || self.resolve_site_rate(currency, site),
        )
        .await
    }

    /// Rate from the global main currency to the site's main currency.
    #[instrument(skip(self))]
    pub async fn last_exchange_rate_from_global_main_currency(
        &self,
        site: ScopeId,
    ) -> FxResult<Decimal> {
        if site.is_global() {
            return Ok(Decimal::ONE);
        }

        let site_main = self
            .bounded(self.stores.settings.main_currency_code(site))
            .await?;
        let global_main = self
            .bounded(self.stores.settings.main_currency_code(ScopeId::GLOBAL))
            .await?;
        if site_main.is_some() && site_main == global_main {
            debug!("Site and global main currencies match");
            return Ok(Decimal::ONE);
        }

        if self
            .bounded(self.stores.settings.use_global_currencies(site))
            .await?
        {
            debug!("Site uses global currencies");
            return Ok(Decimal::ONE);
        }

        if !self.config.use_cache {
            return Ok(self.resolve_global_rate(site).await?.value);
        }

        get_or_compute(
            self.cache.as_ref(),
            CacheKey::global_rate(site),
            &DependencyTag::for_scope(site),
            || self.resolve_global_rate(site),
        )
        .await
    }

    async fn resolve_site_rate(&self, currency: CurrencyId, site: ScopeId) -> FxResult<Computed> {
        let table = self
            .last_valid_exchange_table(site)
            .await?
            .ok_or(FxError::NoExchangeTable(site))?;

        let rate = self
            .bounded(self.stores.rates.by_table_and_target(table.id, currency))
            .await?
            .ok_or(FxError::RateNotAvailable {
                currency,
                table: table.id,
            })?;

        if rate.value <= Decimal::ZERO {
            return Err(FxError::NonPositiveRate {
                currency,
                table: table.id,
            });
        }

        Ok(Computed {
            value: rate.value,
            ttl: self.ttl_for(&table),
        })
    }

    async fn resolve_global_rate(&self, site: ScopeId) -> FxResult<Computed> {
        let table = self
            .last_valid_exchange_table(site)
            .await?
            .ok_or(FxError::NoExchangeTable(site))?;

        match table.rate_from_global_currency {
            Some(rate) if rate > Decimal::ZERO => Ok(Computed {
                value: rate,
                ttl: self.ttl_for(&table),
            }),
            _ => Err(FxError::MissingGlobalRate(site)),
        }
    }

    /// Cache no longer than until the table stops being valid.
    fn ttl_for(&self, table: &ExchangeTable) -> Duration {
        let default = self.config.default_cache_ttl;
        match table
            .valid_to
            .and_then(|to| whole_minutes_until(self.clock.now(), to))
        {
            Some(minutes) => default.min(Duration::minutes(minutes)),
            None => default,
        }
    }

    async fn bounded<T, F>(&self, lookup: F) -> FxResult<T>
    where
        F: Future<Output = FxResult<T>>,
    {
        match self.config.lookup_timeout {
            Some(limit) => tokio::time::timeout(limit, lookup)
                .await
                .map_err(|_| FxError::LookupTimeout(limit))?,
            None => lookup.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use storefx_common::{ExchangeRate, ExchangeTableId, FixedClock, Timestamp};

    fn start() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap()
    }

    fn site() -> ScopeId {
        ScopeId::site(1)
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
        cache: Arc<MemoryCache>,
        repository: RateRepository,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(
            MemoryStore::from_records(
                vec![
                    Currency::new(1, "USD", ScopeId::GLOBAL).main(),
                    Currency::new(2, "GBP", ScopeId::GLOBAL),
                    Currency::new(10, "EUR", site()).main(),
                    Currency::new(11, "CZK", site()),
                    Currency::new(12, "GBP", site()),
                ],
                vec![
                    ExchangeTable::new(100, site()).with_rate_from_global(dec!(0.9)),
                    ExchangeTable::new(200, ScopeId::GLOBAL),
                ],
                vec![
                    ExchangeRate::new(1, 100, 11, dec!(25)),
                    ExchangeRate::new(2, 200, 2, dec!(0.8)),
                ],
            )
            .unwrap(),
        );
        let clock = Arc::new(FixedClock::new(start()));
        let cache = Arc::new(MemoryCache::with_clock(Default::default(), clock.clone()));
        let repository = RateRepository::new(
            RateStores::from_store(store.clone()),
            cache.clone(),
            clock.clone(),
            RepositoryConfig::default(),
        );

        Fixture {
            store,
            clock,
            cache,
            repository,
        }
    }

    #[tokio::test]
    async fn test_currency_by_code_prefers_site() {
        let f = fixture();

        let gbp = f.repository.currency_by_code("gbp", site()).await.unwrap().unwrap();
        assert_eq!(gbp.id, CurrencyId::new(12));

        let usd = f.repository.currency_by_code("USD", site()).await.unwrap().unwrap();
        assert_eq!(usd.id, CurrencyId::new(1));

        let global_gbp = f
            .repository
            .currency_by_code("GBP", ScopeId::GLOBAL)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(global_gbp.id, CurrencyId::new(2));

        assert!(f
            .repository
            .currency_by_code("CZK", ScopeId::GLOBAL)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_site_rate_resolved_and_cached() {
        let f = fixture();

        let rate = f
            .repository
            .last_exchange_rate_for_site(CurrencyId::new(11), site())
            .await
            .unwrap();
        assert_eq!(rate, dec!(25));
        assert_eq!(f.cache.len(), 1);

        // store change is invisible until the cache is invalidated
        f.store
            .set_rate(ExchangeTableId::new(100), CurrencyId::new(11), dec!(24))
            .unwrap();
        let cached = f
            .repository
            .last_exchange_rate_for_site(CurrencyId::new(11), site())
            .await
            .unwrap();
        assert_eq!(cached, dec!(25));

        let dropped = f
            .repository
            .invalidate(&DependencyTag::All(crate::cache::RecordKind::ExchangeRate));
        assert_eq!(dropped, 1);

        let fresh = f
            .repository
            .last_exchange_rate_for_site(CurrencyId::new(11), site())
            .await
            .unwrap();
        assert_eq!(fresh, dec!(24));
    }

    #[tokio::test]
    async fn test_no_table_for_site() {
        let f = fixture();

        let err = f
            .repository
            .last_exchange_rate_for_site(CurrencyId::new(11), ScopeId::site(5))
            .await
            .unwrap_err();

        assert!(matches!(err, FxError::NoExchangeTable(s) if s == ScopeId::site(5)));
        assert!(err.is_invalid_conversion());
        assert!(f.cache.is_empty());
    }

    #[tokio::test]
    async fn test_missing_rate_row() {
        let f = fixture();

        let err = f
            .repository
            .last_exchange_rate_for_site(CurrencyId::new(12), site())
            .await
            .unwrap_err();

        assert!(matches!(err, FxError::RateNotAvailable { .. }));
    }

    #[tokio::test]
    async fn test_cache_ttl_capped_by_valid_to() {
        let f = fixture();
        f.store.remove_table(ExchangeTableId::new(100));
        f.store
            .add_table(
                ExchangeTable::new(101, site())
                    .valid_between(Some(start()), Some(start() + Duration::minutes(3))),
            )
            .unwrap();
        f.store
            .set_rate(ExchangeTableId::new(101), CurrencyId::new(11), dec!(26))
            .unwrap();
        f.repository.invalidate(&DependencyTag::All(crate::cache::RecordKind::ExchangeTable));

        let rate = f
            .repository
            .last_exchange_rate_for_site(CurrencyId::new(11), site())
            .await
            .unwrap();
        assert_eq!(rate, dec!(26));

        f.clock.advance(Duration::minutes(2));
        assert_eq!(f.cache.stats().valid_entries, 1);

        f.clock.advance(Duration::minutes(1));
        assert_eq!(f.cache.stats().valid_entries, 0);

        // expired table still serves as fallback
        let rate = f
            .repository
            .last_exchange_rate_for_site(CurrencyId::new(11), site())
            .await
            .unwrap();
        assert_eq!(rate, dec!(26));
    }

    #[tokio::test]
    async fn test_table_ending_within_a_minute_not_cached() {
        let f = fixture();
        f.store.remove_table(ExchangeTableId::new(100));
        f.store
            .add_table(
                ExchangeTable::new(101, site())
                    .valid_between(None, Some(start() + Duration::seconds(40))),
            )
            .unwrap();
        f.store
            .set_rate(ExchangeTableId::new(101), CurrencyId::new(11), dec!(26))
            .unwrap();

        f.repository
            .last_exchange_rate_for_site(CurrencyId::new(11), site())
            .await
            .unwrap();
        assert!(f.cache.is_empty());
    }

    #[tokio::test]
    async fn test_rate_from_global_main_currency() {
        let f = fixture();

        let rate = f
            .repository
            .last_exchange_rate_from_global_main_currency(site())
            .await
            .unwrap();
        assert_eq!(rate, dec!(0.9));

        let global = f
            .repository
            .last_exchange_rate_from_global_main_currency(ScopeId::GLOBAL)
            .await
            .unwrap();
        assert_eq!(global, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_rate_from_global_short_circuits() {
        let f = fixture();
        f.store.set_use_global_currencies(site(), true);
        assert_eq!(
            f.repository
                .last_exchange_rate_from_global_main_currency(site())
                .await
                .unwrap(),
            Decimal::ONE
        );

        // same main currency code as global, no table needed
        let other = ScopeId::site(2);
        f.store.add_currency(Currency::new(20, "USD", other).main()).unwrap();
        assert_eq!(
            f.repository
                .last_exchange_rate_from_global_main_currency(other)
                .await
                .unwrap(),
            Decimal::ONE
        );
    }

    #[tokio::test]
    async fn test_rate_from_global_missing() {
        let f = fixture();
        let other = ScopeId::site(3);
        f.store.add_currency(Currency::new(30, "JPY", other).main()).unwrap();

        let err = f
            .repository
            .last_exchange_rate_from_global_main_currency(other)
            .await
            .unwrap_err();
        assert!(matches!(err, FxError::NoExchangeTable(_)));

        f.store.add_table(ExchangeTable::new(300, other)).unwrap();
        let err = f
            .repository
            .last_exchange_rate_from_global_main_currency(other)
            .await
            .unwrap_err();
        assert!(matches!(err, FxError::MissingGlobalRate(_)));
    }

    struct SlowTables;

    #[async_trait]
    impl ExchangeTableLookup for SlowTables {
        async fn last_valid_or_expired(
            &self,
            _scope: ScopeId,
            _now: Timestamp,
        ) -> FxResult<Option<ExchangeTable>> {
            tokio::time::sleep(StdDuration::from_millis(500)).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_lookup_timeout() {
        let f = fixture();
        let mut stores = RateStores::from_store(f.store.clone());
        stores.tables = Arc::new(SlowTables);

        let repository = RateRepository::new(
            stores,
            Arc::new(MemoryCache::new()),
            f.clock.clone(),
            RepositoryConfig {
                lookup_timeout: Some(StdDuration::from_millis(20)),
                ..Default::default()
            },
        );

        let err = repository
            .last_exchange_rate_for_site(CurrencyId::new(11), site())
            .await
            .unwrap_err();
        assert!(matches!(err, FxError::LookupTimeout(_)));
    }

    #[tokio::test]
    async fn test_currency_by_id() {
        let f = fixture();

        let czk = f.repository.currency_by_id(CurrencyId::new(11)).await.unwrap().unwrap();
        assert_eq!(czk.code.as_str(), "CZK");
        assert_eq!(czk.scope, site());

        assert!(f
            .repository
            .currency_by_id(CurrencyId::new(99))
            .await
            .unwrap()
            .is_none());
    }

    /// Serves a fixed rate value, bypassing store validation.
    struct FixedRates(Decimal);

    #[async_trait]
    impl ExchangeRateLookup for FixedRates {
        async fn by_table_and_target(
            &self,
            table: ExchangeTableId,
            currency: CurrencyId,
        ) -> FxResult<Option<ExchangeRate>> {
            Ok(Some(ExchangeRate::new(1, table, currency, self.0)))
        }
    }

    #[tokio::test]
    async fn test_non_positive_stored_rate() {
        let f = fixture();

        for value in [dec!(0), dec!(-1)] {
            let mut stores = RateStores::from_store(f.store.clone());
            stores.rates = Arc::new(FixedRates(value));
            let cache = Arc::new(MemoryCache::new());
            let repository = RateRepository::new(
                stores,
                cache.clone(),
                f.clock.clone(),
                RepositoryConfig::default(),
            );

            let err = repository
                .last_exchange_rate_for_site(CurrencyId::new(11), site())
                .await
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    FxError::NonPositiveRate { currency, table }
                        if currency == CurrencyId::new(11) && table == ExchangeTableId::new(100)
                ),
                "{value}: {err:?}"
            );
            assert!(err.is_invalid_conversion());
            assert!(cache.is_empty());
        }
    }

    /// Serves one table per scope with a fixed global rate.
    struct GlobalRateTables(Decimal);

    #[async_trait]
    impl ExchangeTableLookup for GlobalRateTables {
        async fn last_valid_or_expired(
            &self,
            scope: ScopeId,
            _now: Timestamp,
        ) -> FxResult<Option<ExchangeTable>> {
            let mut table = ExchangeTable::new(300, scope);
            table.rate_from_global_currency = Some(self.0);
            Ok(Some(table))
        }
    }

    #[tokio::test]
    async fn test_non_positive_global_rate() {
        let f = fixture();

        for value in [dec!(0), dec!(-0.5)] {
            let mut stores = RateStores::from_store(f.store.clone());
            stores.tables = Arc::new(GlobalRateTables(value));
            let repository = RateRepository::new(
                stores,
                Arc::new(MemoryCache::new()),
                f.clock.clone(),
                RepositoryConfig::default(),
            );

            let err = repository
                .last_exchange_rate_from_global_main_currency(site())
                .await
                .unwrap_err();
            assert!(
                matches!(err, FxError::MissingGlobalRate(s) if s == site()),
                "{value}: {err:?}"
            );
            assert!(err.is_invalid_conversion());
        }
    }

    #[tokio::test]
    async fn test_cache_disabled() {
        let f = fixture();
        let repository = RateRepository::new(
            RateStores::from_store(f.store.clone()),
            f.cache.clone(),
            f.clock.clone(),
            RepositoryConfig {
                use_cache: false,
                ..Default::default()
            },
        );

        repository
            .last_exchange_rate_for_site(CurrencyId::new(11), site())
            .await
            .unwrap();
        assert!(f.cache.is_empty());
    }
}
