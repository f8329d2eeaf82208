//! Rate caching with TTL and dependency-tag invalidation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use rust_decimal::Decimal;
use storefx_common::{Clock, CurrencyId, ScopeId, SystemClock, Timestamp};
use tracing::debug;

use crate::error::FxResult;

/// Key of a cached rate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key of the "site main currency -> currency" rate.
    pub fn site_rate(currency: CurrencyId, site: ScopeId) -> Self {
        Self(format!("exchangerate|{}|{}", currency, site.as_i32()))
    }

    /// Key of the "global main currency -> site main currency" rate.
    pub fn global_rate(site: ScopeId) -> Self {
        Self(format!("globalexchangerate|{}", site.as_i32()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Record kinds whose changes invalidate cached rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    ExchangeTable,
    ExchangeRate,
    Currency,
}

impl RecordKind {
    fn name(&self) -> &'static str {
        match self {
            RecordKind::ExchangeTable => "ExchangeTable",
            RecordKind::ExchangeRate => "ExchangeRate",
            RecordKind::Currency => "Currency",
        }
    }
}

/// Cache dependency: every record of a kind, or the records of one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyTag {
    All(RecordKind),
    Scope(RecordKind, ScopeId),
}

impl DependencyTag {
    /// Tags a rate resolved for `scope` depends on.
    pub fn for_scope(scope: ScopeId) -> Vec<DependencyTag> {
        [RecordKind::ExchangeTable, RecordKind::ExchangeRate, RecordKind::Currency]
            .into_iter()
            .flat_map(|kind| [DependencyTag::All(kind), DependencyTag::Scope(kind, scope)])
            .collect()
    }

    /// Parse the textual form (`ExchangeTable|all`, `Currency|scope|3`).
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('|');
        let kind = match parts.next()? {
            "ExchangeTable" => RecordKind::ExchangeTable,
            "ExchangeRate" => RecordKind::ExchangeRate,
            "Currency" => RecordKind::Currency,
            _ => return None,
        };
        let tag = match (parts.next()?, parts.next()) {
            ("all", None) => DependencyTag::All(kind),
            ("scope", Some(id)) => DependencyTag::Scope(kind, ScopeId::from_raw(id.parse().ok()?)),
            _ => return None,
        };
        match parts.next() {
            Some(_) => None,
            None => Some(tag),
        }
    }
}

impl fmt::Display for DependencyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyTag::All(kind) => write!(f, "{}|all", kind.name()),
            DependencyTag::Scope(kind, scope) => {
                write!(f, "{}|scope|{}", kind.name(), scope.as_i32())
            }
        }
    }
}

/// Cache capability injected into the rate repository.
pub trait Cache: Send + Sync {
    /// Get a live value.
    fn get(&self, key: &CacheKey) -> Option<Decimal>;

    /// Store a value for `ttl`, tagged with its dependencies.
    fn insert(&self, key: CacheKey, value: Decimal, ttl: Duration, dependencies: &[DependencyTag]);

    /// Drop every entry carrying `tag`. Returns the number of entries dropped.
    fn touch(&self, tag: &DependencyTag) -> usize;

    /// Drop everything.
    fn clear(&self);
}

/// A freshly computed value and how long it may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Computed {
    pub value: Decimal,
    pub ttl: Duration,
}

/// Return the cached value for `key`, or compute and cache it.
///
/// Errors are not cached; neither are values computed with a non-positive TTL.
pub async fn get_or_compute<F, Fut>(
    cache: &dyn Cache,
    key: CacheKey,
    dependencies: &[DependencyTag],
    compute: F,
) -> FxResult<Decimal>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = FxResult<Computed>>,
{
    if let Some(value) = cache.get(&key) {
        return Ok(value);
    }

    let computed = compute().await?;
    if computed.ttl > Duration::zero() {
        cache.insert(key, computed.value, computed.ttl, dependencies);
    } else {
        debug!(key = %key, "Value not cached, zero TTL");
    }

    Ok(computed.value)
}

/// Cached rate entry.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Decimal,
    cached_at: Timestamp,
    ttl: Duration,
    dependencies: Vec<DependencyTag>,
}

impl CacheEntry {
    fn is_valid(&self, now: Timestamp) -> bool {
        now.signed_duration_since(self.cached_at) < self.ttl
    }
}

/// Configuration for the in-memory cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 10000 }
    }
}

/// Thread-safe in-memory cache.
pub struct MemoryCache {
    cache: DashMap<CacheKey, CacheEntry>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    /// Create a new cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a new cache with custom configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a new cache reading time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: DashMap::new(),
            config,
            clock,
        }
    }

    /// Get the number of entries in cache.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Evict expired entries.
    pub fn evict_expired(&self) {
        let now = self.clock.now();
        self.cache.retain(|_, entry| entry.is_valid(now));
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let total = self.cache.len();
        let valid = self.cache.iter().filter(|e| e.is_valid(now)).count();

        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total - valid,
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<Decimal> {
        let now = self.clock.now();

        if let Some(entry) = self.cache.get(key) {
            if entry.is_valid(now) {
                debug!(key = %key, "Cache hit");
                return Some(entry.value);
            }
            debug!(key = %key, "Cache entry expired");
            drop(entry);
            self.cache.remove(key);
        }

        debug!(key = %key, "Cache miss");
        None
    }

    fn insert(&self, key: CacheKey, value: Decimal, ttl: Duration, dependencies: &[DependencyTag]) {
        if self.cache.len() >= self.config.max_entries {
            self.evict_expired();
            if self.cache.len() >= self.config.max_entries {
                debug!(key = %key, "Cache full, entry not stored");
                return;
            }
        }

        let entry = CacheEntry {
            value,
            cached_at: self.clock.now(),
            ttl,
            dependencies: dependencies.to_vec(),
        };
        self.cache.insert(key, entry);
    }

    fn touch(&self, tag: &DependencyTag) -> usize {
        let before = self.cache.len();
        self.cache.retain(|_, entry| !entry.dependencies.contains(tag));
        let dropped = before.saturating_sub(self.cache.len());
        debug!(tag = %tag, dropped, "Cache dependency touched");
        dropped
    }

    fn clear(&self) {
        self.cache.clear();
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}
