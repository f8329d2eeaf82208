//! StoreFX conversion engine
//!
//! Exchange-rate lookup and currency conversion across a global scope and
//! per-site scopes.
//!
//! # Features
//!
//! - Operative exchange table resolution with expired-table fallback
//! - Rate caching with TTL and dependency-tag invalidation
//! - Global to site bridging through the global main currency
//! - Pluggable stores (in-memory, Postgres behind the `postgres` feature)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storefx_common::ScopeId;
//! use storefx_fx::{CurrencyConverter, MemoryStore, RateRepository, RateStores};
//!
//! let store = Arc::new(MemoryStore::new());
//! let repository = Arc::new(RateRepository::with_defaults(RateStores::from_store(store)));
//! let converter = CurrencyConverter::new(repository);
//!
//! let czk = converter.convert(dec!(100), "EUR", "CZK", ScopeId::site(1)).await?;
//! ```

pub mod cache;
pub mod config;
pub mod conversion;
pub mod converter;
pub mod error;
pub mod event_log;
pub mod facade;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod pg;
pub mod repository;
pub mod store;

pub use cache::{
    get_or_compute, Cache, CacheConfig, CacheKey, CacheStats, Computed, DependencyTag,
    MemoryCache, RecordKind,
};
pub use config::FxConfig;
pub use conversion::Conversion;
pub use converter::CurrencyConverter;
pub use error::{FxError, FxResult};
pub use event_log::{EventLog, LoggedEvent, MemoryEventLog, TracingEventLog};
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use pg::PgStore;
pub use repository::{RateRepository, RateStores, RepositoryConfig};
pub use store::{CurrencyLookup, ExchangeRateLookup, ExchangeTableLookup, SiteCurrencySettings};
