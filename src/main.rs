mod calculator;
mod config;
mod engine;
mod error;
mod manager;
mod model;
mod render;
mod stats;
mod sweep;
mod utils;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// Directory holding `config.toml` and receiving all outputs.
    #[arg(long)]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Simulate the contaminated-tray count.
    Simulate {
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, default_value_t = 1)]
        replicates: usize,
    },

    /// Sweep behavioural parameters.
    Sweep {
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Repeat the grid sweep for each configured prevalence.
    Prevalence {
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Summarize the simulated trajectories.
    Analyze,

    /// Remove all outputs.
    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.out_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Simulate { seed, replicates } => mgr.simulate(seed, replicates)?,
        Command::Sweep { seed } => mgr.sweep(seed)?,
        Command::Prevalence { seed } => mgr.prevalence(seed)?,
        Command::Analyze => mgr.analyze()?,
        Command::Clean => mgr.clean()?,
    }

    Ok(())
}
