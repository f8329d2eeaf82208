//! Process-wide converter for callers at the application edge.
//!
//! Library code should hold a [`CurrencyConverter`] directly. This slot
//! exists for host code that cannot thread one through.

use std::sync::Arc;

use parking_lot::{const_rwlock, RwLock};
use rust_decimal::Decimal;
use storefx_common::ScopeId;

use crate::converter::CurrencyConverter;
use crate::error::{FxError, FxResult};

static CONVERTER: RwLock<Option<Arc<CurrencyConverter>>> = const_rwlock(None);

/// Install the process-wide converter, returning the previous one.
pub fn install(converter: Arc<CurrencyConverter>) -> Option<Arc<CurrencyConverter>> {
    CONVERTER.write().replace(converter)
}

/// Remove the process-wide converter.
pub fn uninstall() -> Option<Arc<CurrencyConverter>> {
    CONVERTER.write().take()
}

/// The installed converter.
pub fn installed() -> FxResult<Arc<CurrencyConverter>> {
    CONVERTER.read().clone().ok_or(FxError::NotInstalled)
}

/// Convert with the installed converter.
pub async fn convert(amount: Decimal, from: &str, to: &str, site: ScopeId) -> FxResult<Decimal> {
    installed()?.convert(amount, from, to, site).await
}

/// Exchange rate from the installed converter.
pub async fn exchange_rate(from: &str, to: &str, site: ScopeId) -> FxResult<Decimal> {
    installed()?.exchange_rate(from, to, site).await
}

/// Non-failing exchange rate; `None` when nothing is installed or the lookup fails.
pub async fn try_exchange_rate(from: &str, to: &str, site: ScopeId) -> Option<Decimal> {
    let converter = installed().ok()?;
    converter.try_exchange_rate(from, to, site).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::repository::{RateRepository, RateStores};
    use rust_decimal_macros::dec;
    use storefx_common::{Currency, ExchangeRate, ExchangeTable};

    // Single test: the slot is process-global.
    #[tokio::test]
    async fn test_install_lifecycle() {
        uninstall();
        assert!(matches!(installed(), Err(FxError::NotInstalled)));
        assert!(matches!(
            exchange_rate("EUR", "CZK", ScopeId::site(1)).await,
            Err(FxError::NotInstalled)
        ));
        assert_eq!(try_exchange_rate("EUR", "CZK", ScopeId::site(1)).await, None);

        let site = ScopeId::site(1);
        let store = Arc::new(
            MemoryStore::from_records(
                vec![Currency::new(1, "EUR", site).main(), Currency::new(2, "CZK", site)],
                vec![ExchangeTable::new(1, site)],
                vec![ExchangeRate::new(1, 1, 2, dec!(25))],
            )
            .unwrap(),
        );
        let repository = Arc::new(RateRepository::with_defaults(RateStores::from_store(store)));
        assert!(install(Arc::new(CurrencyConverter::new(repository))).is_none());

        assert_eq!(exchange_rate("EUR", "CZK", site).await.unwrap(), dec!(25));
        assert_eq!(convert(dec!(50), "EUR", "CZK", site).await.unwrap(), dec!(2));
        assert_eq!(try_exchange_rate("EUR", "XXX", site).await, None);

        assert!(uninstall().is_some());
    }
}
