//! geocache - IP geolocation with a local cache
//!
//! This tool geolocates one IP address (or the caller's own address) through
//! the MaxMind GeoIP2 web service and keeps the answer in a SQLite cache, so
//! repeated lookups within the TTL cost no queries.
//!
//! The record is printed as a table, CSV, or JSON.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use prettytable::{row, Cell, Row, Table};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use geocache::models::Source;
use geocache::{logging, Config, GeoRecord, GeoStore, Geolocator, LookupClient, Target};

/// CLI arguments for geocache.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Geolocate IP addresses using MaxMind, with a local cache",
    long_about = "geocache looks up an IP address with the MaxMind GeoIP2 web service and \
                  stores the result in a local SQLite database. Cached answers are reused \
                  until they are older than the configured TTL.\n\n\
                  USAGE:\n  geocache [--ip <ADDRESS|me>] [--force] [--output <table|csv|json>]",
    override_usage = "geocache [OPTIONS]"
)]
struct Cli {
    /// IP address to geolocate, or "me" for this machine's public address
    #[arg(long, default_value = "me")]
    ip: String,

    /// Force refresh the IP info from MaxMind
    #[arg(long)]
    force: bool,

    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Output format: table, csv, json
    #[arg(short, long, default_value = "table")]
    output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Only write logs to the log file
    #[arg(short, long)]
    quiet: bool,
}

/// Supported output formats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

/// Builds the Field/Value table for one record.
fn record_table(record: &GeoRecord) -> Table {
    let mut table = Table::new();
    table.add_row(row!["Field", "Value"]);
    for (name, value) in record.fields() {
        table.add_row(Row::new(vec![Cell::new(name), Cell::new(&value)]));
    }
    table
}

/// Writes a header row and one data row.
fn write_csv<W: std::io::Write>(writer: W, record: &GeoRecord) -> Result<()> {
    let fields = record.fields();
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(fields.iter().map(|(name, _)| *name))?;
    wtr.write_record(fields.iter().map(|(_, value)| value.as_str()))?;
    wtr.flush()?;
    Ok(())
}

fn print_record(record: &GeoRecord, source: Source, output: &OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(record)?);
        }
        OutputFormat::Csv => {
            write_csv(std::io::stdout(), record)?;
        }
        OutputFormat::Table => {
            println!(
                "{} {}",
                format!("Geolocation for {}", record.ip_address).bold().blue(),
                format!("({})", source).dimmed()
            );
            record_table(record).printstd();
        }
    }
    Ok(())
}

async fn run(cli: &Cli, config: geocache::error::Result<Config>) -> Result<()> {
    let config = config.context("Failed to read configuration")?;
    log::debug!("General config: {:?}", config.general);
    log::debug!("MaxMind config: {:?}", config.maxmind);

    let client = LookupClient::new(&config.maxmind).context("Invalid MaxMind configuration")?;
    let store = GeoStore::open(&config.general.database).context("Database failed to initialize")?;
    let target: Target = cli.ip.parse()?;

    let geolocator = Geolocator::new(store, client, config.general.ttl);
    let resolution = geolocator
        .resolve(&target, cli.force)
        .await
        .with_context(|| format!("Failed to geolocate IP address: {}", target))?;
    log::info!(
        "Resolved {} from {} ({} cached addresses)",
        target,
        resolution.source,
        geolocator.store().count()?
    );

    print_record(&resolution.record, resolution.source, &cli.output)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::load(&cli.config);

    // The log file location comes from the config; fall back to the default
    // so a broken config is still logged somewhere.
    let log_path = config
        .as_ref()
        .map(|c| c.general.log.clone())
        .unwrap_or_else(|_| PathBuf::from("geo.log"));
    logging::init(Some(&log_path), cli.verbose, cli.quiet);

    match run(&cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
