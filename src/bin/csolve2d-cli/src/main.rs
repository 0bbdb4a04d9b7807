//! Command-line driver for the csolve2d solver core: parses a config file,
//! bootstraps a [`Solver`], and runs it to convergence or `max_iters`.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use csolve2d::config::Config;
use csolve2d::error::SolverError;
use csolve2d::solver::Solver;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "csolve2d", version, about = "2-D curvilinear compressible-flow solver")]
struct Cli {
    /// Path to the solver config file (§6 directive format).
    config: PathBuf,

    /// Directory for resnorms/mass_residue/pressure output files.
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,
}

fn init_tracing(debug_level: u8) {
    let default_directive = match debug_level {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config_file = std::fs::File::open(&cli.config)
        .with_context(|| format!("failed to open config file {}", cli.config.display()))?;
    let config = Config::parse(std::io::BufReader::new(config_file))
        .map_err(|e| color_eyre::eyre::eyre!(e))
        .with_context(|| format!("failed to parse config file {}", cli.config.display()))?;

    init_tracing(config.debug_level);
    info!(config = ?cli.config, out_dir = ?cli.out_dir, "starting csolve2d");

    let mut solver = Solver::bootstrap(config, &cli.out_dir).map_err(|e| color_eyre::eyre::eyre!(e))?;

    match solver.run() {
        Ok(iters) => {
            info!(iters, "reached max_iters without converging");
            Ok(())
        }
        Err(SolverError::ConvergenceReached { iter }) => {
            info!(iter, "converged");
            Ok(())
        }
        Err(e) => Err(color_eyre::eyre::eyre!(e)).context("solver run failed"),
    }
}
