//! Command-line surface and top-level error boundary
//!
//! `run` is the only place a check result meets the process: it maps every
//! outcome — verdict or failure — onto the scheduler contract (one stdout
//! line, exit code 0/1/2/3). Nothing below this layer prints or exits.

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::check::{CheckError, ReplicationCheck, ReplicationVerdict};
use crate::client::MysqlConnector;
use crate::config::{self, ConfigError};
use crate::status::Status;

/// Checks that MySQL master/slave replication is actually running
#[derive(Parser, Debug)]
#[command(name = "check_mysql_replication")]
pub struct Cli {
    /// Path to the TOML server registry (default: config/replcheck.toml,
    /// then replcheck.toml)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Master name to check, as configured in the registry
    pub master: String,
}

/// Anything that prevents a verdict; always surfaces as UNKNOWN
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Check(#[from] CheckError),
}

/// Parse arguments, run the check, and return the process exit code
pub async fn run() -> i32 {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage text and usage errors both exit 3 (scheduler contract),
            // not clap's defaults
            let _ = e.print();
            return Status::Unknown.exit_code();
        }
    };

    match execute(&cli).await {
        Ok(verdict) => {
            println!("{}", verdict.render());
            verdict.status.exit_code()
        }
        Err(e) => {
            println!("UNKNOWN: {e}");
            Status::Unknown.exit_code()
        }
    }
}

/// Load the registry and run the check against the named master
pub async fn execute(cli: &Cli) -> Result<ReplicationVerdict, ProbeError> {
    let registry = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::load_default_config()?,
    };

    // Unknown master fails here, before any connection is opened
    let master = registry.master(&cli.master)?;

    let check = ReplicationCheck::new(MysqlConnector, registry.max_bytes_diff);
    Ok(check.run(master).await?)
}

/// Diagnostics go to stderr so stdout carries exactly the contract line
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::ERROR.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}
