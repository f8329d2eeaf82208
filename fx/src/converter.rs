//! Currency converter.

use std::sync::Arc;

use rust_decimal::Decimal;
use storefx_common::{Currency, CurrencyId, Money, ScopeId};
use tracing::{debug, info, instrument};

use crate::conversion::Conversion;
use crate::error::{FxError, FxResult};
use crate::event_log::{EventLog, TracingEventLog};
use crate::repository::RateRepository;

const EVENT_CATEGORY: &str = "CurrencyConverter";

/// Computes exchange rates between currencies of a site and the global scope.
///
/// Converting divides the amount by the rate between the two currencies.
/// Each scope stores rates relative to its main currency; global and site
/// currencies are bridged through the site table's rate from the global
/// main currency. Conversions between two different sites are rejected.
pub struct CurrencyConverter {
    repository: Arc<RateRepository>,
    event_log: Arc<dyn EventLog>,
}

impl CurrencyConverter {
    /// Create a converter logging swallowed errors through `tracing`.
    pub fn new(repository: Arc<RateRepository>) -> Self {
        Self::with_event_log(repository, Arc::new(TracingEventLog))
    }

    /// Create a converter with a custom event log.
    pub fn with_event_log(repository: Arc<RateRepository>, event_log: Arc<dyn EventLog>) -> Self {
        Self {
            repository,
            event_log,
        }
    }

    pub fn repository(&self) -> &Arc<RateRepository> {
        &self.repository
    }

    /// Divide `amount` by `rate`; non-positive rates leave the amount unchanged.
    pub fn apply_exchange_rate(amount: Decimal, rate: Decimal) -> FxResult<Decimal> {
        if rate <= Decimal::ZERO {
            return Ok(amount);
        }
        amount
            .checked_div(rate)
            .ok_or(FxError::Overflow("converted amount"))
    }

    /// Convert `amount` from one currency code to another.
    #[instrument(skip(self))]
    pub async fn convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        site: ScopeId,
    ) -> FxResult<Decimal> {
        let rate = self.exchange_rate(from, to, site).await?;
        let converted = Self::apply_exchange_rate(amount, rate)?;

        info!(rate = %rate, converted = %converted, "Conversion completed");
        Ok(converted)
    }

    /// Convert and round to the target currency's precision.
    #[instrument(skip(self))]
    pub async fn convert_rounded(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        site: ScopeId,
    ) -> FxResult<Money> {
        let (conversion, target) = self.convert_resolved(amount, from, to, site).await?;
        Ok(conversion.rounded_output(target.round_to))
    }

    /// Convert and return the full conversion record.
    #[instrument(skip(self))]
    pub async fn convert_detailed(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        site: ScopeId,
    ) -> FxResult<Conversion> {
        let (conversion, _) = self.convert_resolved(amount, from, to, site).await?;
        Ok(conversion)
    }

    /// Exchange rate between two currencies referenced by id.
    #[instrument(skip(self))]
    pub async fn exchange_rate_for_ids(
        &self,
        from: CurrencyId,
        to: CurrencyId,
    ) -> FxResult<Decimal> {
        let from_currency = self.resolve_id(from).await?;
        let to_currency = self.resolve_id(to).await?;

        self.exchange_rate_between(&from_currency, &to_currency)
            .await
    }

    /// Exchange rate between two currency codes as seen from `site`.
    #[instrument(skip(self))]
    pub async fn exchange_rate(&self, from: &str, to: &str, site: ScopeId) -> FxResult<Decimal> {
        let from_currency = self.resolve(from, site).await?;
        let to_currency = self.resolve(to, site).await?;

        self.exchange_rate_between(&from_currency, &to_currency)
            .await
    }

    /// Exchange rate between two resolved currencies.
    pub async fn exchange_rate_between(&self, from: &Currency, to: &Currency) -> FxResult<Decimal> {
        if from.id == to.id {
            return Ok(Decimal::ONE);
        }

        if from.scope == to.scope {
            if from.is_main {
                return self.rate_from_main(to).await;
            }
            if to.is_main {
                return self.rate_to_main(from).await;
            }

            let to_main = self.rate_to_main(from).await?;
            let from_main = self.rate_from_main(to).await?;
            return multiply(to_main, from_main);
        }

        match (from.is_global(), to.is_global()) {
            (true, _) => self.global_to_site_rate(from, to).await,
            (false, true) => {
                debug!("Target is global, inverting the global to site rate");
                let rate = self.global_to_site_rate(to, from).await?;
                invert(rate)
            }
            (false, false) => Err(FxError::CrossSiteConversion {
                from: from.scope,
                to: to.scope,
            }),
        }
    }

    /// Like [`exchange_rate`](Self::exchange_rate), but logs failures and returns `None`.
    pub async fn try_exchange_rate(&self, from: &str, to: &str, site: ScopeId) -> Option<Decimal> {
        match self.exchange_rate(from, to, site).await {
            Ok(rate) => Some(rate),
            Err(err) => {
                self.event_log
                    .log_exception(EVENT_CATEGORY, "TryGetExchangeRate", &err);
                None
            }
        }
    }

    /// Like [`convert`](Self::convert), but logs failures and returns `None`.
    pub async fn try_convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        site: ScopeId,
    ) -> Option<Decimal> {
        match self.convert(amount, from, to, site).await {
            Ok(converted) => Some(converted),
            Err(err) => {
                self.event_log.log_exception(EVENT_CATEGORY, "TryConvert", &err);
                None
            }
        }
    }

    /// Conversion record plus the resolved target currency.
    async fn convert_resolved(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        site: ScopeId,
    ) -> FxResult<(Conversion, Currency)> {
        let from_currency = self.resolve(from, site).await?;
        let to_currency = self.resolve(to, site).await?;

        let rate = self.exchange_rate_between(&from_currency, &to_currency).await?;
        let converted = Self::apply_exchange_rate(amount, rate)?;

        let conversion = Conversion::new(
            Money::new(amount, from_currency.code),
            Money::new(converted, to_currency.code.clone()),
            rate,
            site,
        );

        info!(
            conversion_id = %conversion.id,
            rate = %rate,
            "Conversion completed"
        );

        Ok((conversion, to_currency))
    }

    async fn resolve_id(&self, id: CurrencyId) -> FxResult<Currency> {
        self.repository
            .currency_by_id(id)
            .await?
            .ok_or(FxError::UnknownCurrencyId(id))
    }

    async fn resolve(&self, code: &str, site: ScopeId) -> FxResult<Currency> {
        self.repository
            .currency_by_code(code, site)
            .await?
            .ok_or_else(|| FxError::UnknownCurrency(code.to_string()))
    }

    /// Global currency to site currency, through the global and site main currencies.
    async fn global_to_site_rate(&self, global: &Currency, site: &Currency) -> FxResult<Decimal> {
        let mut rate = if global.is_main {
            Decimal::ONE
        } else {
            self.rate_to_main(global).await?
        };

        let main_rate = self
            .repository
            .last_exchange_rate_from_global_main_currency(site.scope)
            .await?;
        rate = multiply(rate, main_rate)?;

        let from_main = self.rate_from_main(site).await?;
        multiply(rate, from_main)
    }

    async fn rate_to_main(&self, currency: &Currency) -> FxResult<Decimal> {
        if currency.is_main {
            return Ok(Decimal::ONE);
        }
        let rate = self
            .repository
            .last_exchange_rate_for_site(currency.id, currency.scope)
            .await?;
        invert(rate)
    }

    async fn rate_from_main(&self, currency: &Currency) -> FxResult<Decimal> {
        if currency.is_main {
            return Ok(Decimal::ONE);
        }
        self.repository
            .last_exchange_rate_for_site(currency.id, currency.scope)
            .await
    }
}

fn multiply(a: Decimal, b: Decimal) -> FxResult<Decimal> {
    a.checked_mul(b).ok_or(FxError::Overflow("exchange rate"))
}

fn invert(rate: Decimal) -> FxResult<Decimal> {
    Decimal::ONE
        .checked_div(rate)
        .ok_or(FxError::Overflow("inverse exchange rate"))
}
