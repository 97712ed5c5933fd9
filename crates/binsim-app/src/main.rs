//! binsim command-line entry point

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use binsim_core::Config;
use binsim_engine::BinSim;

/// Real-time dynamic binaural synthesis
#[derive(Parser)]
#[command(name = "binsim", version, about)]
struct Args {
    /// Path to the configuration file
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::from_file(&args.config)
        .with_context(|| format!("loading configuration {}", args.config.display()))?;

    log::info!(
        "binsim starting: block {} samples, {} Hz, {} channel(s) max",
        config.block_size,
        config.sampling_rate,
        config.max_channels
    );

    let engine = BinSim::new(config).context("initializing engine")?;
    engine.run().context("running audio stream")
}
