//! Scenario-runner binary: load a JSON scenario document and run it.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use ebb_oracle::{Scenario, ScenarioConfig};

#[derive(Parser)]
#[command(
    name = "ebb-oracle",
    about = "Run a wallet-ledger reconciliation scenario",
    version
)]
struct Cli {
    /// Path to the scenario JSON document.
    scenario: PathBuf,
}

fn main() -> anyhow::Result<()> {
    ebb_oracle::logging::init_tracing();
    let cli = Cli::parse();

    let config = ScenarioConfig::from_path(&cli.scenario)
        .with_context(|| format!("loading scenario {}", cli.scenario.display()))?;
    Scenario::new(config)
        .run()
        .context("scenario run failed")?;

    println!("scenario completed: wallet and ledger reconciled");
    Ok(())
}
