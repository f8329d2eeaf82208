//! Rate scenarios.

use std::path::Path;

use anyhow::Context;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use storefx_common::{Currency, ExchangeRate, ExchangeTable, ScopeId};

/// A rate scenario: the records to load and the steps to run against them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Currencies of every scope.
    pub currencies: Vec<Currency>,
    /// Exchange tables.
    #[serde(default)]
    pub tables: Vec<ExchangeTable>,
    /// Exchange rates.
    #[serde(default)]
    pub rates: Vec<ExchangeRate>,
    /// Sites that use the global currencies directly.
    #[serde(default)]
    pub global_currency_sites: Vec<i32>,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// What a step is expected to produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// The step succeeds with this value.
    Value(Decimal),
    /// The step fails with this error code.
    Error(String),
}

/// A step in a scenario. Site `0` is the global scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Convert an amount.
    Convert {
        amount: Decimal,
        from: String,
        to: String,
        site: i32,
        #[serde(default)]
        expect: Option<Expectation>,
    },
    /// Look up an exchange rate.
    Rate {
        from: String,
        to: String,
        site: i32,
        #[serde(default)]
        expect: Option<Expectation>,
    },
    /// Move the simulated clock forward.
    AdvanceMinutes { minutes: i64 },
    /// Insert or update a rate in the store. The cache is not touched.
    SetRate {
        table: i32,
        currency: i32,
        value: Decimal,
    },
    /// Invalidate cached entries carrying a dependency tag, e.g. `ExchangeRate|all`.
    Invalidate { tag: String },
}

impl Scenario {
    /// Load a built-in scenario by name, or a JSON scenario file by path.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "single-site" => Ok(Self::single_site()),
            "global-bridge" => Ok(Self::global_bridge()),
            path if path.ends_with(".json") => Self::from_file(path),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Read a scenario from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing scenario {}", path.display()))
    }

    /// Conversions inside one site, with a cached rate outliving a store update.
    fn single_site() -> Self {
        let site = ScopeId::site(1);
        Self {
            name: "single-site".to_string(),
            description: "Conversions between the currencies of one site".to_string(),
            currencies: vec![
                Currency::new(10, "EUR", site).main(),
                Currency::new(11, "CZK", site).with_round_to(0),
                Currency::new(12, "PLN", site),
            ],
            tables: vec![ExchangeTable::new(100, site)],
            rates: vec![
                ExchangeRate::new(1, 100, 11, dec!(25)),
                ExchangeRate::new(2, 100, 12, dec!(4)),
            ],
            global_currency_sites: Vec::new(),
            steps: vec![
                ScenarioStep::Rate {
                    from: "EUR".to_string(),
                    to: "CZK".to_string(),
                    site: 1,
                    expect: Some(Expectation::Value(dec!(25))),
                },
                ScenarioStep::Convert {
                    amount: dec!(100),
                    from: "EUR".to_string(),
                    to: "CZK".to_string(),
                    site: 1,
                    expect: Some(Expectation::Value(dec!(4))),
                },
                ScenarioStep::Rate {
                    from: "CZK".to_string(),
                    to: "PLN".to_string(),
                    site: 1,
                    expect: Some(Expectation::Value(dec!(0.16))),
                },
                ScenarioStep::SetRate {
                    table: 100,
                    currency: 11,
                    value: dec!(20),
                },
                // Still served from the cache.
                ScenarioStep::Rate {
                    from: "EUR".to_string(),
                    to: "CZK".to_string(),
                    site: 1,
                    expect: Some(Expectation::Value(dec!(25))),
                },
                ScenarioStep::Invalidate {
                    tag: "ExchangeRate|all".to_string(),
                },
                ScenarioStep::Rate {
                    from: "EUR".to_string(),
                    to: "CZK".to_string(),
                    site: 1,
                    expect: Some(Expectation::Value(dec!(20))),
                },
                ScenarioStep::Rate {
                    from: "EUR".to_string(),
                    to: "XXX".to_string(),
                    site: 1,
                    expect: Some(Expectation::Error("UNKNOWN_CURRENCY".to_string())),
                },
            ],
        }
    }

    /// Conversions between global and site currencies through the global main currency.
    fn global_bridge() -> Self {
        let site = ScopeId::site(1);
        Self {
            name: "global-bridge".to_string(),
            description: "Global to site conversions bridged by the global main currency"
                .to_string(),
            currencies: vec![
                Currency::new(1, "USD", ScopeId::GLOBAL).main(),
                Currency::new(2, "GBP", ScopeId::GLOBAL),
                Currency::new(10, "EUR", site).main(),
                Currency::new(11, "CZK", site),
                Currency::new(20, "JPY", ScopeId::site(2)).main(),
            ],
            tables: vec![
                ExchangeTable::new(100, site).with_rate_from_global(dec!(0.9)),
                ExchangeTable::new(200, ScopeId::GLOBAL),
            ],
            rates: vec![
                ExchangeRate::new(1, 100, 11, dec!(25)),
                ExchangeRate::new(2, 200, 2, dec!(0.8)),
            ],
            global_currency_sites: Vec::new(),
            steps: vec![
                ScenarioStep::Rate {
                    from: "USD".to_string(),
                    to: "EUR".to_string(),
                    site: 1,
                    expect: Some(Expectation::Value(dec!(0.9))),
                },
                ScenarioStep::Convert {
                    amount: dec!(100),
                    from: "USD".to_string(),
                    to: "EUR".to_string(),
                    site: 1,
                    expect: None,
                },
                ScenarioStep::Rate {
                    from: "GBP".to_string(),
                    to: "EUR".to_string(),
                    site: 1,
                    expect: Some(Expectation::Value(dec!(1.125))),
                },
                ScenarioStep::Rate {
                    from: "USD".to_string(),
                    to: "CZK".to_string(),
                    site: 1,
                    expect: Some(Expectation::Value(dec!(22.5))),
                },
                ScenarioStep::AdvanceMinutes { minutes: 30 },
                ScenarioStep::Rate {
                    from: "USD".to_string(),
                    to: "JPY".to_string(),
                    site: 2,
                    expect: Some(Expectation::Error("NO_EXCHANGE_TABLE".to_string())),
                },
            ],
        }
    }
}
