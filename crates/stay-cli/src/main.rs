//! `stay` CLI: availability quotes, bookings and calendar feed sync from the
//! command line.
//!
//! Property data is read from a JSON store snapshot (`--data`), with
//! `properties`, `reservations`, `blocked_ranges` and `price_overrides`
//! arrays. Commands that change the store only write it back with `--save`.
//!
//! ## Usage
//!
//! ```sh
//! # Is the condo free, and what would three nights cost?
//! stay quote --data store.json --property condo-1 --check-in 2026-02-10 --check-out 2026-02-13 --guests 3
//!
//! # Availability only
//! stay check --data store.json --property condo-1 --check-in 2026-02-10 --check-out 2026-02-13
//!
//! # Create a pending reservation and persist it
//! stay book --data store.json --property condo-1 --check-in 2026-02-10 --check-out 2026-02-13 --save
//!
//! # Parse a feed (file, stdin or URL) and print the events as JSON
//! stay import -i airbnb.ics
//! stay import --url webcal://www.airbnb.com/calendar/ical/123.ics
//!
//! # Replace a property's imported ranges from a feed
//! stay sync --data store.json --property condo-1 --url https://... --save
//!
//! # Export the property's blocked ranges as iCalendar
//! stay export --data store.json --property condo-1 -o condo-1.ics
//! ```
//!
//! Logs go to stderr (`RUST_LOG` or `-v`); stdout carries only command output.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use stay_engine::dates::parse_date;
use stay_engine::feed::{import_feed_with, FeedFetcher, HttpFeedFetcher};
use stay_engine::{
    AvailabilityRequest, EngineConfig, MemoryStore, NewReservation, StayService, StoreSnapshot,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stay",
    version,
    about = "Short-term rental availability, pricing and calendar sync"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct StayArgs {
    /// Store snapshot (JSON)
    #[arg(long)]
    data: PathBuf,
    #[arg(long)]
    property: String,
    /// First night, YYYY-MM-DD
    #[arg(long)]
    check_in: String,
    /// Departure day, YYYY-MM-DD (not a night of the stay)
    #[arg(long)]
    check_out: String,
    #[arg(long, default_value_t = 1)]
    guests: u32,
    #[arg(long)]
    parking_days: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether every night of a stay is free
    Check {
        #[command(flatten)]
        stay: StayArgs,
    },
    /// Availability, price breakdown and listing rules for a stay
    Quote {
        #[command(flatten)]
        stay: StayArgs,
    },
    /// Create a pending reservation
    Book {
        #[command(flatten)]
        stay: StayArgs,
        /// Reference date for the past-check-in rule (defaults to today, UTC)
        #[arg(long)]
        today: Option<String>,
        /// Write the updated store back to --data
        #[arg(long)]
        save: bool,
    },
    /// Parse a calendar feed and print its events as JSON
    Import {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long, conflicts_with = "url")]
        input: Option<String>,
        /// Feed URL (http, https or webcal)
        #[arg(long)]
        url: Option<String>,
    },
    /// Replace a property's imported ranges from a calendar feed
    Sync {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        property: String,
        /// Input file (reads from stdin if neither this nor --url is given)
        #[arg(short, long, conflicts_with = "url")]
        input: Option<String>,
        #[arg(long)]
        url: Option<String>,
        /// Write the updated store back to --data
        #[arg(long)]
        save: bool,
    },
    /// Export a property's blocked ranges as an iCalendar feed
    Export {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        property: String,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Check { stay } => {
            let service = open_service(&stay.data, config)?;
            let availability = service
                .check_availability(&stay.property, &stay.check_in, &stay.check_out)
                .context("Availability check failed")?;
            print_json(&availability)?;
        }
        Commands::Quote { stay } => {
            let service = open_service(&stay.data, config)?;
            let quote = service
                .availability_query(&AvailabilityRequest {
                    property_id: stay.property.clone(),
                    check_in: stay.check_in.clone(),
                    check_out: stay.check_out.clone(),
                    guests: Some(stay.guests),
                    parking_days: stay.parking_days,
                })
                .context("Quote failed")?;
            print_json(&quote)?;
        }
        Commands::Book { stay, today, save } => {
            let service = open_service(&stay.data, config)?;
            let today = match today.as_deref() {
                Some(raw) => parse_date(raw)?,
                None => Utc::now().date_naive(),
            };
            let booking = service
                .request_booking(new_reservation(&stay)?, today)
                .context("Booking rejected")?;
            if save {
                save_store(&stay.data, service.store())?;
            }
            print_json(&booking)?;
        }
        Commands::Import { input, url } => {
            let body = match url.as_deref() {
                Some(url) => fetch(&config, url)?,
                None => read_input(input.as_deref())?,
            };
            let options = config.import_options()?;
            let import = import_feed_with(&body, &options).context("Failed to parse feed")?;
            debug!(events = import.events.len(), dropped = import.dropped, "feed parsed");
            print_json(&import)?;
        }
        Commands::Sync {
            data,
            property,
            input,
            url,
            save,
        } => {
            let body = match url.as_deref() {
                Some(url) => fetch(&config, url)?,
                None => read_input(input.as_deref())?,
            };
            let service = open_service(&data, config)?;
            let outcome = service
                .sync_feed_text(&property, &body)
                .context("Feed sync failed")?;
            if save {
                save_store(&data, service.store())?;
            }
            print_json(&outcome)?;
        }
        Commands::Export {
            data,
            property,
            output,
        } => {
            let service = open_service(&data, config)?;
            let feed = service
                .export_feed(&property, Utc::now())
                .context("Export failed")?;
            debug!(
                events = feed.event_count,
                filename = %feed.filename,
                "feed exported"
            );
            write_output(output.as_deref(), &feed.body)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_service(data: &Path, config: EngineConfig) -> Result<StayService<MemoryStore>> {
    let raw = std::fs::read_to_string(data)
        .with_context(|| format!("Failed to read file: {}", data.display()))?;
    let snapshot: StoreSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid store snapshot: {}", data.display()))?;
    let store = MemoryStore::from_snapshot(snapshot)
        .with_context(|| format!("Invalid store snapshot: {}", data.display()))?;
    Ok(StayService::with_config(store, config))
}

fn save_store(data: &Path, store: &MemoryStore) -> Result<()> {
    let json = serde_json::to_string_pretty(&store.snapshot())?;
    std::fs::write(data, json).with_context(|| format!("Failed to write file: {}", data.display()))
}

fn new_reservation(stay: &StayArgs) -> Result<NewReservation> {
    let check_in: NaiveDate = parse_date(&stay.check_in)?;
    let check_out: NaiveDate = parse_date(&stay.check_out)?;
    Ok(NewReservation {
        property_id: stay.property.clone(),
        check_in,
        check_out,
        guests: stay.guests,
        parking_days: stay.parking_days,
    })
}

fn fetch(config: &EngineConfig, url: &str) -> Result<String> {
    let fetcher = HttpFeedFetcher::from_config(config)?;
    fetcher
        .fetch(url)
        .with_context(|| format!("Failed to fetch feed: {}", url))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
