//! Identifier types for StoreFX records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope a currency or an exchange table belongs to.
///
/// `0` is the global scope, any positive value is a site id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct ScopeId(i32);

impl ScopeId {
    /// The global scope.
    pub const GLOBAL: ScopeId = ScopeId(0);

    /// Scope of a single site.
    pub fn site(site_id: i32) -> Self {
        Self::from_raw(site_id)
    }

    /// Create from a raw value, where `0` (or anything below) means global.
    pub fn from_raw(raw: i32) -> Self {
        Self(raw.max(0))
    }

    /// Get the raw value.
    pub fn as_i32(&self) -> i32 {
        self.0
    }

    /// Check if this is the global scope.
    pub fn is_global(&self) -> bool {
        self.0 == 0
    }

    /// The site id, or `None` for the global scope.
    pub fn site_id(&self) -> Option<i32> {
        if self.is_global() {
            None
        } else {
            Some(self.0)
        }
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::GLOBAL
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_global() {
            write!(f, "global")
        } else {
            write!(f, "site:{}", self.0)
        }
    }
}

impl From<i32> for ScopeId {
    fn from(raw: i32) -> Self {
        Self::from_raw(raw)
    }
}

impl From<ScopeId> for i32 {
    fn from(scope: ScopeId) -> Self {
        scope.0
    }
}

/// Unique identifier for a currency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyId(i32);

impl CurrencyId {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for CurrencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for CurrencyId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

/// Unique identifier for an exchange table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeTableId(i32);

impl ExchangeTableId {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for ExchangeTableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ExchangeTableId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

/// Unique identifier for a single exchange rate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRateId(i32);

impl ExchangeRateId {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for ExchangeRateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ExchangeRateId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_global() {
        assert!(ScopeId::GLOBAL.is_global());
        assert!(ScopeId::from_raw(0).is_global());
        assert!(ScopeId::from_raw(-3).is_global());
        assert_eq!(ScopeId::GLOBAL.site_id(), None);
    }

    #[test]
    fn test_scope_site() {
        let scope = ScopeId::site(7);
        assert!(!scope.is_global());
        assert_eq!(scope.site_id(), Some(7));
        assert_eq!(scope.to_string(), "site:7");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&CurrencyId::new(12)).unwrap();
        assert_eq!(json, "12");

        let scope: ScopeId = serde_json::from_str("4").unwrap();
        assert_eq!(scope, ScopeId::site(4));
    }
}
