//! Conversion records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefx_common::{Money, ScopeId};
use uuid::Uuid;

/// Represents a completed currency conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversion {
    /// Unique conversion ID.
    pub id: Uuid,
    /// Input amount.
    pub input: Money,
    /// Output amount.
    pub output: Money,
    /// Exchange rate the input was divided by.
    pub rate: Decimal,
    /// Site the conversion ran for.
    pub site: ScopeId,
    /// When the conversion was executed.
    pub executed_at: DateTime<Utc>,
}

impl Conversion {
    /// Create a new conversion record.
    pub fn new(input: Money, output: Money, rate: Decimal, site: ScopeId) -> Self {
        Self {
            id: Uuid::now_v7(),
            input,
            output,
            rate,
            site,
            executed_at: Utc::now(),
        }
    }

    /// Output per unit of input, zero for a zero input.
    pub fn effective_rate(&self) -> Decimal {
        self.output
            .value
            .checked_div(self.input.value)
            .unwrap_or(Decimal::ZERO)
    }

    /// The output rounded to `places` decimal places.
    pub fn rounded_output(&self, places: u32) -> Money {
        self.output.round_to(places)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_conversion_effective_rate() {
        let conversion = Conversion::new(
            Money::new(dec!(100), "USD"),
            Money::new(dec!(25), "EUR"),
            dec!(4),
            ScopeId::site(1),
        );

        assert_eq!(conversion.effective_rate(), dec!(0.25));
        assert_eq!(conversion.id.get_version_num(), 7);
    }

    #[test]
    fn test_zero_input() {
        let conversion = Conversion::new(
            Money::zero("USD"),
            Money::zero("EUR"),
            dec!(4),
            ScopeId::GLOBAL,
        );

        assert_eq!(conversion.effective_rate(), Decimal::ZERO);
    }

    #[test]
    fn test_rounded_output() {
        let conversion = Conversion::new(
            Money::new(dec!(100), "USD"),
            Money::new(dec!(111.1111111), "EUR"),
            dec!(0.9),
            ScopeId::site(1),
        );

        assert_eq!(conversion.rounded_output(2).value, dec!(111.11));
    }
}
