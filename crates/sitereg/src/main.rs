mod cli;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sitereg_core::ledger;
use sitereg_core::{CoreError, ErrorTree, Registrar, Summary};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        match err {
            CliError::Run(core) => eprint!("{}", ErrorTree::from_error(&core).render()),
            other => eprintln!("{:?}", miette::Report::new(other)),
        }
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, quiet: bool) {
    let filter = if quiet {
        "error"
    } else {
        match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let filter = cli.filter.as_deref().unwrap_or("");
    let mut registrar =
        Registrar::setup(&cli.credentials, &cli.site_dir, &cli.schema_dir, filter)?;

    let outcome = registrar.process_devices().await;
    if outcome.is_ok() {
        eprintln!("Processed {} devices", registrar.device_count());
    }

    // Per-category device counts reach stderr on every path.
    let summary = registrar.summary();
    for line in ledger::count_lines(&summary, registrar.device_count()) {
        eprintln!("{line}");
    }

    let result = match outcome {
        Ok(()) => flush_ledger(&registrar, &summary),
        Err(err) => Err(err),
    };

    // The publisher is released exactly once, success or failure. A
    // shutdown failure never masks an earlier one.
    match registrar.shutdown() {
        Ok(()) => {}
        Err(err) if result.is_ok() => return Err(err.into()),
        Err(err) => tracing::warn!("publisher shutdown failed: {err}"),
    }

    result.map_err(CliError::from)
}

/// Write the per-device error artifacts and the run summary.
fn flush_ledger(registrar: &Registrar, summary: &Summary) -> Result<(), CoreError> {
    registrar.write_device_errors()?;
    registrar.write_summary(summary)
}
