//! Application entry point for the fractal tree viewer.
//!
//! This binary parses the command line, sets up tracing and eframe, and
//! delegates all interactive logic and rendering to [`Viewer`].

mod viewer;

use std::path::PathBuf;

use clap::Parser;
use fractal_core::{ExecutionStrategy, FractalConfig};
use rand::Rng;
use tracing_subscriber::EnvFilter;
use viewer::{Viewer, ViewerOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Animated fractal tree viewer", long_about = None)]
struct Cli {
    /// JSON configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Seed for the construction-time random draws.
    #[arg(short, long)]
    seed: Option<u64>,
    /// Size of a dedicated worker pool for level updates.
    #[arg(short, long, conflicts_with = "sequential")]
    threads: Option<usize>,
    /// Update every level on the UI thread.
    #[arg(long)]
    sequential: bool,
}

impl Cli {
    fn strategy(&self) -> ExecutionStrategy {
        match (self.sequential, self.threads) {
            (true, _) => ExecutionStrategy::Sequential,
            (false, Some(threads)) => ExecutionStrategy::Pool { threads },
            (false, None) => ExecutionStrategy::Parallel,
        }
    }
}

/// Starts the native eframe application.
///
/// ### Returns
/// - `Ok(())` if the application runs to completion without errors.
/// - `Err` if the configuration cannot be loaded, the fractal cannot be
///   activated, or eframe fails to create the window or event loop.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => FractalConfig::load(path)?,
        None => FractalConfig::default(),
    };
    let seed = cli.seed.unwrap_or_else(|| rand::rng().random());
    tracing::info!(depth = config.depth, seed, strategy = ?cli.strategy(), "starting viewer");

    let options = ViewerOptions {
        config,
        seed,
        strategy: cli.strategy(),
    };
    let viewer = Viewer::new(options)?;

    eframe::run_native(
        "Fractal Tree",
        eframe::NativeOptions::default(),
        Box::new(|_cc| Ok(Box::new(viewer))),
    )?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
