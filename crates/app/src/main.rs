//! tally: import bank statements, drop reversal pairs, merge into history and
//! print income/expense pivots as JSON.
//!
//! Usage:
//!   tally tinkoff.csv sber.pdf operations.ofx
//!   tally --dry-run --currency RSD izvod.pdf

mod config;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tally_import::Importer;
use tally_ledger::ReversalPolicy;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use pipeline::Options;

/// Normalize bank statements into one deduplicated transaction history
#[derive(Parser)]
#[command(name = "tally", version, long_about = None)]
struct Cli {
    /// Statement files (.csv, .pdf, .ofx)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Config file (default: platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// History file, overrides the config
    #[arg(long)]
    history: Option<PathBuf>,

    /// Reporting currency, overrides the config
    #[arg(long)]
    currency: Option<String>,

    /// Also require equal categories when pairing reversals
    #[arg(long)]
    strict_reversals: bool,

    /// Do not save the merged history
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self, config: Config) -> Result<Options> {
        let history_path = match &self.history {
            Some(p) => p.clone(),
            None => config.history_path()?,
        };
        Ok(Options {
            history_path,
            output_currency: self.currency.clone().unwrap_or(config.output_currency),
            policy: ReversalPolicy {
                match_category: self.strict_reversals || config.reversal_match_category,
            },
            dry_run: self.dry_run,
        })
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose; stdout is reserved for the report.
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let options = cli.options(config)?;

    let report = pipeline::run(Importer::default(), &cli.files, &options).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.failures.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!("{} of {} files failed", report.failures.len(), cli.files.len());
        Ok(ExitCode::FAILURE)
    }
}
