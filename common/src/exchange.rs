//! Exchange tables and exchange rates.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::identifiers::{CurrencyId, ExchangeRateId, ExchangeTableId, ScopeId};
use crate::time::Timestamp;

/// A time-windowed set of exchange rates for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeTable {
    /// Record id.
    pub id: ExchangeTableId,
    /// Human readable name.
    #[serde(default)]
    pub display_name: String,
    /// Owning scope.
    #[serde(default)]
    pub scope: ScopeId,
    /// Start of validity, `None` means open-ended.
    #[serde(default)]
    pub valid_from: Option<Timestamp>,
    /// End of validity, `None` means open-ended.
    #[serde(default)]
    pub valid_to: Option<Timestamp>,
    /// Rate from the global main currency to this scope's main currency.
    #[serde(default)]
    pub rate_from_global_currency: Option<Decimal>,
}

impl ExchangeTable {
    /// Create an open-ended table.
    pub fn new(id: impl Into<ExchangeTableId>, scope: ScopeId) -> Self {
        let id = id.into();
        Self {
            id,
            display_name: format!("Exchange table {}", id),
            scope,
            valid_from: None,
            valid_to: None,
            rate_from_global_currency: None,
        }
    }

    /// Set the validity window.
    pub fn valid_between(mut self, from: Option<Timestamp>, to: Option<Timestamp>) -> Self {
        self.valid_from = from;
        self.valid_to = to;
        self
    }

    /// Set the rate from the global main currency.
    pub fn with_rate_from_global(mut self, rate: Decimal) -> Self {
        self.rate_from_global_currency = Some(rate);
        self
    }

    /// Check whether `now` lies inside `[valid_from, valid_to)`.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.valid_from.map_or(true, |from| from <= now) && self.valid_to.map_or(true, |to| to > now)
    }

    /// Check whether the table ended at or before `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.valid_to.map_or(false, |to| to <= now)
    }

    /// Check the table's own invariants.
    pub fn validate(&self) -> ModelResult<()> {
        if let (Some(from), Some(to)) = (self.valid_from, self.valid_to) {
            if to < from {
                return Err(ModelError::InvalidValidity(self.id));
            }
        }

        if let Some(rate) = self.rate_from_global_currency {
            if rate <= Decimal::ZERO {
                return Err(ModelError::NonPositiveGlobalRate(self.id));
            }
        }

        Ok(())
    }
}

/// One directed edge: units of `to_currency` per one unit of the table's main currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Record id.
    pub id: ExchangeRateId,
    /// Owning table.
    pub table_id: ExchangeTableId,
    /// Target currency.
    pub to_currency_id: CurrencyId,
    /// Rate value.
    pub value: Decimal,
}

impl ExchangeRate {
    /// Create a new rate row.
    pub fn new(
        id: impl Into<ExchangeRateId>,
        table_id: impl Into<ExchangeTableId>,
        to_currency_id: impl Into<CurrencyId>,
        value: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            table_id: table_id.into(),
            to_currency_id: to_currency_id.into(),
            value,
        }
    }

    /// Check the rate is usable.
    pub fn validate(&self) -> ModelResult<()> {
        if self.value <= Decimal::ZERO {
            return Err(ModelError::NonPositiveRate {
                table: self.table_id,
                currency: self.to_currency_id,
            });
        }
        Ok(())
    }
}

/// Pick the operative table among `tables` at `now`.
///
/// Tables valid at `now` win, latest `valid_from` first, then latest
/// `valid_to` (open-ended counts as latest), then highest id. Otherwise the
/// most recently expired table is returned. Tables that only start in the
/// future are never picked.
pub fn select_operative_table<'a, I>(tables: I, now: Timestamp) -> Option<&'a ExchangeTable>
where
    I: IntoIterator<Item = &'a ExchangeTable>,
{
    let mut operative: Option<&ExchangeTable> = None;
    let mut expired: Option<&ExchangeTable> = None;

    for table in tables {
        if table.is_valid_at(now) {
            let better = match operative {
                None => true,
                Some(current) => operative_key(table) > operative_key(current),
            };
            if better {
                operative = Some(table);
            }
        } else if table.is_expired_at(now) {
            let better = match expired {
                None => true,
                Some(current) => (table.valid_to, table.id) > (current.valid_to, current.id),
            };
            if better {
                expired = Some(table);
            }
        }
    }

    operative.or(expired)
}

fn operative_key(table: &ExchangeTable) -> (Option<Timestamp>, bool, Option<Timestamp>, ExchangeTableId) {
    (table.valid_from, table.valid_to.is_none(), table.valid_to, table.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()
    }

    fn table(id: i32, from_days: Option<i64>, to_days: Option<i64>) -> ExchangeTable {
        ExchangeTable::new(id, ScopeId::site(1)).valid_between(
            from_days.map(|d| now() + Duration::days(d)),
            to_days.map(|d| now() + Duration::days(d)),
        )
    }

    #[test]
    fn test_validity_window() {
        let t = table(1, Some(-1), Some(1));
        assert!(t.is_valid_at(now()));
        assert!(!t.is_expired_at(now()));

        let open = table(2, None, None);
        assert!(open.is_valid_at(now()));

        let ended = table(3, Some(-10), Some(-1));
        assert!(!ended.is_valid_at(now()));
        assert!(ended.is_expired_at(now()));

        let future = table(4, Some(2), None);
        assert!(!future.is_valid_at(now()));
        assert!(!future.is_expired_at(now()));
    }

    #[test]
    fn test_table_ending_now_counts_as_expired() {
        let t = table(1, Some(-3), Some(0));
        assert!(!t.is_valid_at(now()));
        assert!(t.is_expired_at(now()));
        assert_eq!(select_operative_table([&t], now()).map(|t| t.id), Some(t.id));
    }

    #[test]
    fn test_select_prefers_latest_valid_from() {
        let tables = vec![
            table(1, Some(-30), None),
            table(2, Some(-5), Some(10)),
            table(3, Some(-10), None),
        ];

        let picked = select_operative_table(&tables, now()).unwrap();
        assert_eq!(picked.id, ExchangeTableId::new(2));
    }

    #[test]
    fn test_select_breaks_ties_on_valid_to() {
        let tables = vec![
            table(1, Some(-5), Some(3)),
            table(2, Some(-5), None),
            table(3, Some(-5), Some(7)),
        ];

        let picked = select_operative_table(&tables, now()).unwrap();
        assert_eq!(picked.id, ExchangeTableId::new(2));
    }

    #[test]
    fn test_select_falls_back_to_last_expired() {
        let tables = vec![
            table(1, Some(-30), Some(-20)),
            table(2, Some(-19), Some(-2)),
            table(3, Some(5), None),
        ];

        let picked = select_operative_table(&tables, now()).unwrap();
        assert_eq!(picked.id, ExchangeTableId::new(2));
    }

    #[test]
    fn test_select_valid_beats_expired() {
        let tables = vec![table(1, Some(-3), Some(-1)), table(2, None, None)];

        let picked = select_operative_table(&tables, now()).unwrap();
        assert_eq!(picked.id, ExchangeTableId::new(2));
    }

    #[test]
    fn test_select_nothing() {
        let empty: Vec<ExchangeTable> = Vec::new();
        assert!(select_operative_table(&empty, now()).is_none());

        let future_only = vec![table(1, Some(1), None)];
        assert!(select_operative_table(&future_only, now()).is_none());
    }

    #[test]
    fn test_table_validation() {
        assert!(table(1, Some(-1), Some(1)).validate().is_ok());
        assert_eq!(
            table(1, Some(1), Some(-1)).validate(),
            Err(ModelError::InvalidValidity(ExchangeTableId::new(1)))
        );

        let bad_global = table(2, None, None).with_rate_from_global(dec!(0));
        assert!(matches!(
            bad_global.validate(),
            Err(ModelError::NonPositiveGlobalRate(_))
        ));
    }

    #[test]
    fn test_rate_validation() {
        assert!(ExchangeRate::new(1, 1, 2, dec!(0.9)).validate().is_ok());
        assert!(ExchangeRate::new(1, 1, 2, dec!(0)).validate().is_err());
        assert!(ExchangeRate::new(1, 1, 2, dec!(-1.5)).validate().is_err());
    }
}
