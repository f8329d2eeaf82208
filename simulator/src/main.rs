//! StoreFX rate simulator
//!
//! Runs exchange-rate scenarios against an in-memory store and a simulated clock.

use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod metrics;
mod runner;
mod scenario;

use runner::ScenarioRunner;
use scenario::Scenario;
use storefx_fx::FxConfig;

/// StoreFX rate simulator CLI
#[derive(Parser, Debug)]
#[command(name = "rate-sim")]
#[command(about = "Run exchange-rate scenarios against the StoreFX converter")]
struct Args {
    /// Built-in scenario name (single-site, global-bridge) or path to a JSON scenario
    #[arg(short, long)]
    scenario: String,

    /// Simulated start instant (RFC 3339), defaults to now
    #[arg(long)]
    at: Option<DateTime<Utc>>,

    /// Emit JSON logs
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    if args.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting StoreFX rate simulator");

    let config = FxConfig::from_env();
    let scenario = Scenario::load(&args.scenario)?;
    let start = args.at.unwrap_or_else(Utc::now);

    let mut runner = ScenarioRunner::new(&scenario, start, config)?;
    runner.run(&scenario).await?;

    let summary = runner.summary();
    info!("Scenario complete");
    info!("Checked steps: {}", summary.checked());
    info!("Passed: {}", summary.passed);
    info!("Failed: {}", summary.failed_steps.len());
    info!("Average lookup latency: {}us", summary.average_latency_us());
    info!("Slowest lookup: {}us", summary.max_latency_us());

    if !summary.all_passed() {
        anyhow::bail!(
            "scenario {} failed at steps {:?}",
            scenario.name,
            summary.failed_steps
        );
    }

    Ok(())
}
