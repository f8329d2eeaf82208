//! Scenario runner.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::Duration;
use rust_decimal::Decimal;
use tracing::{info, warn};

use storefx_common::{CurrencyId, ExchangeTableId, FixedClock, ScopeId, Timestamp};
use storefx_fx::{
    CurrencyConverter, DependencyTag, FxConfig, FxResult, MemoryCache, MemoryStore,
    RateRepository, RateStores,
};

use crate::metrics::RunSummary;
use crate::scenario::{Expectation, Scenario, ScenarioStep};

/// Runs a scenario against an in-memory store and a simulated clock.
pub struct ScenarioRunner {
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    repository: Arc<RateRepository>,
    converter: CurrencyConverter,
    summary: RunSummary,
}

impl ScenarioRunner {
    /// Load the scenario records and build the converter.
    pub fn new(scenario: &Scenario, start: Timestamp, config: FxConfig) -> anyhow::Result<Self> {
        config.validate().map_err(anyhow::Error::msg)?;

        let store = Arc::new(
            MemoryStore::from_records(
                scenario.currencies.iter().cloned(),
                scenario.tables.iter().cloned(),
                scenario.rates.iter().cloned(),
            )
            .with_context(|| format!("loading records of scenario {}", scenario.name))?,
        );
        for site in &scenario.global_currency_sites {
            store.set_use_global_currencies(ScopeId::site(*site), true);
        }

        let clock = Arc::new(FixedClock::new(start));
        let cache = Arc::new(MemoryCache::with_clock(config.cache.clone(), clock.clone()));
        let repository = Arc::new(RateRepository::new(
            RateStores::from_store(store.clone()),
            cache,
            clock.clone(),
            config.repository,
        ));
        let converter = CurrencyConverter::new(repository.clone());

        info!(
            "Loaded {} currencies, {} tables, {} rates",
            scenario.currencies.len(),
            scenario.tables.len(),
            scenario.rates.len()
        );

        Ok(Self {
            store,
            clock,
            repository,
            converter,
            summary: RunSummary::new(),
        })
    }

    /// Run every step of the scenario.
    pub async fn run(&mut self, scenario: &Scenario) -> anyhow::Result<()> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);

        for (index, step) in scenario.steps.iter().enumerate() {
            self.execute_step(index, step).await?;
        }

        Ok(())
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Execute a single scenario step.
    async fn execute_step(&mut self, index: usize, step: &ScenarioStep) -> anyhow::Result<()> {
        match step {
            ScenarioStep::Convert {
                amount,
                from,
                to,
                site,
                expect,
            } => {
                let started = Instant::now();
                let result = self
                    .converter
                    .convert(*amount, from, to, ScopeId::site(*site))
                    .await;
                self.summary.record_lookup(started.elapsed());

                if let Ok(converted) = &result {
                    info!("Step {}: {} {} = {} {}", index, amount, from, converted, to);
                }
                self.check(index, result, expect.as_ref());
            }
            ScenarioStep::Rate {
                from,
                to,
                site,
                expect,
            } => {
                let started = Instant::now();
                let result = self
                    .converter
                    .exchange_rate(from, to, ScopeId::site(*site))
                    .await;
                self.summary.record_lookup(started.elapsed());

                if let Ok(rate) = &result {
                    info!("Step {}: rate {} -> {} = {}", index, from, to, rate);
                }
                self.check(index, result, expect.as_ref());
            }
            ScenarioStep::AdvanceMinutes { minutes } => {
                self.clock.advance(Duration::minutes(*minutes));
                info!("Step {}: clock advanced {} minutes", index, minutes);
            }
            ScenarioStep::SetRate {
                table,
                currency,
                value,
            } => {
                let id = self
                    .store
                    .set_rate(ExchangeTableId::new(*table), CurrencyId::new(*currency), *value)
                    .with_context(|| format!("step {}: setting rate", index))?;
                info!("Step {}: rate {} set to {}", index, id, value);
            }
            ScenarioStep::Invalidate { tag } => {
                let parsed = DependencyTag::parse(tag)
                    .with_context(|| format!("step {}: unknown dependency tag {}", index, tag))?;
                let removed = self.repository.invalidate(&parsed);
                info!("Step {}: invalidated {} cache entries for {}", index, removed, parsed);
            }
        }

        Ok(())
    }

    fn check(&mut self, index: usize, result: FxResult<Decimal>, expect: Option<&Expectation>) {
        let passed = match (expect, &result) {
            (None, _) => result.is_ok(),
            (Some(Expectation::Value(expected)), Ok(actual)) => actual == expected,
            (Some(Expectation::Error(code)), Err(err)) => err.error_code() == code.as_str(),
            _ => false,
        };

        if passed {
            self.summary.record_pass();
            return;
        }

        match (&result, expect) {
            (Ok(actual), Some(expected)) => {
                warn!("Step {}: got {}, expected {:?}", index, actual, expected)
            }
            (Err(err), expected) => warn!(
                "Step {}: failed with {} ({}), expected {:?}",
                index,
                err,
                err.error_code(),
                expected
            ),
            (Ok(_), None) => {}
        }
        self.summary.record_failure(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run_builtin(name: &str) -> RunSummary {
        let scenario = Scenario::load(name).unwrap();
        let mut runner =
            ScenarioRunner::new(&scenario, storefx_common::now(), FxConfig::default()).unwrap();
        runner.run(&scenario).await.unwrap();
        runner.summary().clone()
    }

    #[tokio::test]
    async fn test_single_site_scenario_passes() {
        let summary = run_builtin("single-site").await;
        assert!(summary.all_passed(), "failed steps: {:?}", summary.failed_steps);
        assert_eq!(summary.passed, 6);
    }

    #[tokio::test]
    async fn test_global_bridge_scenario_passes() {
        let summary = run_builtin("global-bridge").await;
        assert!(summary.all_passed(), "failed steps: {:?}", summary.failed_steps);
        assert_eq!(summary.passed, 5);
    }

    #[tokio::test]
    async fn test_failed_expectation_is_recorded() {
        let mut scenario = Scenario::load("single-site").unwrap();
        scenario.steps = vec![ScenarioStep::Rate {
            from: "EUR".to_string(),
            to: "CZK".to_string(),
            site: 1,
            expect: Some(Expectation::Value(Decimal::ONE)),
        }];

        let mut runner =
            ScenarioRunner::new(&scenario, storefx_common::now(), FxConfig::default()).unwrap();
        runner.run(&scenario).await.unwrap();

        assert!(!runner.summary().all_passed());
        assert_eq!(runner.summary().failed_steps, vec![0]);
    }

    #[tokio::test]
    async fn test_unknown_tag_aborts_run() {
        let mut scenario = Scenario::load("single-site").unwrap();
        scenario.steps = vec![ScenarioStep::Invalidate {
            tag: "Nothing|all".to_string(),
        }];

        let mut runner =
            ScenarioRunner::new(&scenario, storefx_common::now(), FxConfig::default()).unwrap();
        assert!(runner.run(&scenario).await.is_err());
    }
}
