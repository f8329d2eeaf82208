//! Rate engine configuration.

use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::cache::CacheConfig;
use crate::repository::RepositoryConfig;

/// Main rate engine configuration.
#[derive(Debug, Clone, Default)]
pub struct FxConfig {
    /// Repository configuration.
    pub repository: RepositoryConfig,
    /// Cache configuration.
    pub cache: CacheConfig,
}

impl FxConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(minutes) = std::env::var("STOREFX_CACHE_MINUTES") {
            if let Ok(minutes) = minutes.parse::<i64>() {
                config.repository.default_cache_ttl = Duration::minutes(minutes);
            }
        }

        if let Ok(millis) = std::env::var("STOREFX_LOOKUP_TIMEOUT_MS") {
            if let Ok(millis) = millis.parse::<u64>() {
                config.repository.lookup_timeout = Some(StdDuration::from_millis(millis));
            }
        }

        if let Ok(entries) = std::env::var("STOREFX_CACHE_MAX_ENTRIES") {
            if let Ok(entries) = entries.parse() {
                config.cache.max_entries = entries;
            }
        }

        if let Ok(use_cache) = std::env::var("STOREFX_USE_CACHE") {
            if let Ok(use_cache) = use_cache.parse() {
                config.repository.use_cache = use_cache;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.max_entries == 0 {
            return Err("Cache max entries cannot be 0".to_string());
        }

        if self.repository.default_cache_ttl < Duration::zero() {
            return Err("Default cache TTL cannot be negative".to_string());
        }

        if self.repository.lookup_timeout == Some(StdDuration::ZERO) {
            return Err("Lookup timeout cannot be 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FxConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.repository.default_cache_ttl, Duration::minutes(10));
        assert!(config.repository.lookup_timeout.is_none());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = FxConfig::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());

        let mut config = FxConfig::default();
        config.repository.lookup_timeout = Some(StdDuration::ZERO);
        assert!(config.validate().is_err());

        let mut config = FxConfig::default();
        config.repository.default_cache_ttl = Duration::minutes(-1);
        assert!(config.validate().is_err());
    }
}
