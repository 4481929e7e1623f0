//! Clap derive structures for the `sitereg` CLI.

use std::path::PathBuf;

use clap::Parser;

/// sitereg -- reconcile a site's device declarations with its registry
#[derive(Debug, Parser)]
#[command(
    name = "sitereg",
    version,
    about = "Register a site's devices against its device registry",
    long_about = "Loads device declarations from a site directory, validates them\n\
        against the site's JSON schemas, then converges the remote registry:\n\
        declared devices are created or updated and their metadata published,\n\
        remote-only devices are blocked. Per-device validation and registration\n\
        problems are recorded in the site tree; only structural failures abort\n\
        the run."
)]
pub struct Cli {
    /// Credentials file holding the registry bearer token
    pub credentials: PathBuf,

    /// Site directory (registry_config.json plus devices/)
    pub site_dir: PathBuf,

    /// Directory holding the metadata, envelope, and properties schemas
    pub schema_dir: PathBuf,

    /// Regex restricting which device names take part in the run
    pub filter: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress output, keeping errors and device counts
    #[arg(long, short = 'q')]
    pub quiet: bool,
}
