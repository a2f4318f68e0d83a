use anyhow::Context;
use clap::Parser;
use matrix_simulator::{scenario, Simulator};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML scenario script.
    #[arg(short, long)]
    scenario: PathBuf,

    /// Override the scenario's seed.
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();

    // Create logger
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut script = scenario::load(&args.scenario)?;
    if let Some(seed) = args.seed {
        script.seed = seed;
    }
    info!(seed = script.seed, steps = script.steps.len(), "running scenario");

    let simulator = Simulator::new(script.seed);
    let report = scenario::run(&simulator, &script).await?;

    let rendered =
        serde_json::to_string_pretty(&report).context("failed to render scenario report")?;
    println!("{rendered}");

    Ok(())
}
