//! Command line driver for compiling and exercising neural genotypes.

mod bench;
mod run;
mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use neural_core::RunnerConfig;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "neural-runner", version, about = "Compile genotypes into evaluators and run them")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile one genotype and execute it against the reference network
    Run(run::RunArgs),
    /// Compile a random population in parallel and time repeated ticks
    Bench(bench::BenchArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_telemetry(cli.log_json)?;

    info!("Starting neural-runner");

    match cli.command {
        Command::Run(args) => run::cmd_run(args),
        Command::Bench(args) => bench::cmd_bench(args),
    }
}

/// Load the runner configuration, falling back to defaults when no file is given
fn load_config(path: Option<&Path>) -> Result<RunnerConfig> {
    match path {
        Some(path) => {
            let config = RunnerConfig::from_file(path)
                .with_context(|| format!("cannot load config '{}'", path.display()))?;
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        }
        None => Ok(RunnerConfig::default()),
    }
}

/// Shared config flags of every subcommand
#[derive(clap::Args, Debug, Clone)]
pub struct CommonArgs {
    /// JSON runner configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Disable constant folding
    #[arg(long)]
    pub no_opt: bool,
}

impl CommonArgs {
    pub fn resolve(&self) -> Result<RunnerConfig> {
        let mut config = load_config(self.config.as_deref())?;
        if self.no_opt {
            config.jit.optimize = false;
        }
        Ok(config)
    }
}
