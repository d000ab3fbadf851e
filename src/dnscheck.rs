//! dnscheck - DNS server health checker
//!
//! Probes every configured nameserver for every configured domain, writes an
//! HTML status table, and keeps each probe result in a local SQLite log.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;

use geocache::check_log::CheckLog;
use geocache::dns_report::run_checks;
use geocache::{logging, DnsCheckConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Check that DNS servers answer for a list of domains")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Write the HTML report here instead of stdout
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Append logs to this file as well as the console
    #[arg(long)]
    log: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

async fn run(cli: &Cli) -> Result<()> {
    let config = DnsCheckConfig::load(&cli.config).context("Failed to read configuration")?;
    let mut check_log = CheckLog::open(&config.database).context("Failed to open check log")?;

    log::info!(
        "Checking {} domains against {} nameservers",
        config.domains.len(),
        config.nameservers.len()
    );
    let report = run_checks(&config).await?;
    let written = check_log.record(&report).context("Failed to store check results")?;
    log::debug!("Stored {} probe results in {}", written, config.database.display());

    let html = report.to_html();
    match &cli.report {
        Some(path) => {
            std::fs::write(path, &html)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            log::info!("Report written to {}", path.display());
        }
        None => println!("{}", html),
    }

    let subject = report.subject();
    if report.failed() {
        eprintln!("{}", subject.red().bold());
    } else {
        eprintln!("{}", subject.green().bold());
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log.as_deref(), cli.verbose, false);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
