use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use certmail::{batch, Cli, Config, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging(&cli.log_file, cli.verbose)?;

    let config = Config::load(&cli);
    let report = batch::run(&config);

    info!(
        "Batch finished: {} processed, {} generated, {} sent, {} simulated, {} failed",
        report.processed,
        report.generated,
        report.sent,
        report.simulated,
        report.failures.len()
    );
    if !report.failures.is_empty() {
        warn!("See {} for per-recipient failures", cli.log_file.display());
    }

    Ok(())
}

/// Console output mirrored into a persistent log file. `RUST_LOG` overrides
/// the default level.
fn init_logging(log_file: &Path, verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .init();
    Ok(())
}
