//! `calendar` CLI — load a calendar CSV and query it from the command line.
//!
//! Every invocation reads one CSV file into a fresh in-memory store, runs a
//! single subcommand, and exits. Nothing is written back unless `export` is used.
//!
//! ## Usage
//!
//! ```sh
//! # List every event in start order
//! calendar -i events.csv list
//!
//! # What is happening at 12:30 local time?
//! calendar -i events.csv -z America/New_York at 2025-01-01T12:30
//!
//! # Events overlapping a window, as JSON
//! calendar -i events.csv --format json overlapping 2025-01-06 2025-01-07T10:00
//!
//! # Look up by subject, or by exact identity
//! calendar -i events.csv find "Team Sync"
//! calendar -i events.csv get "Team Sync" 2025-01-06T09:00 2025-01-06T09:30
//!
//! # Normalise a CSV (validated, sorted by start)
//! cat events.csv | calendar export -o sorted.csv
//! ```

use anyhow::{Context, Result};
use calendar_index::{csv, time, Event, EventStore, ImportReport};
use chrono_tz::Tz;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Read};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "calendar",
    version,
    about = "Query calendar events loaded from a CSV file"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// CSV file to load (reads from stdin if omitted)
    #[arg(short, long, global = true, env = "CALENDAR_INPUT")]
    input: Option<String>,

    /// IANA timezone for CSV wall-clock times, query instants, and output
    #[arg(
        short = 'z',
        long,
        global = true,
        env = "CALENDAR_TZ",
        default_value = "UTC"
    )]
    timezone: String,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the CSV and report how many rows were imported
    Import,
    /// List all events in start order
    List,
    /// List events with the given subject
    Find {
        subject: String,
    },
    /// Show the event matching subject, start, and end exactly
    Get {
        subject: String,
        start: String,
        end: String,
    },
    /// List events in progress at an instant (boundaries included)
    At {
        instant: String,
    },
    /// List events overlapping the half-open window [START, END)
    Overlapping {
        start: String,
        end: String,
    },
    /// Write all events back out as CSV
    Export {
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Show index statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let tz = time::parse_timezone(&cli.timezone)?;
    let text = read_input(cli.input.as_deref())?;
    let mut store = EventStore::new();
    let report = csv::import(&text, tz, &mut store).context("Failed to import CSV")?;
    debug!(imported = report.imported, total = report.total, "loaded events");

    match cli.command {
        Commands::Import => print_report(&report, cli.format)?,
        Commands::List => print_events(&store.get_all(), tz, cli.format)?,
        Commands::Find { subject } => print_events(&store.get_by_name(&subject), tz, cli.format)?,
        Commands::Get {
            subject,
            start,
            end,
        } => {
            let start = time::parse_instant(&start, tz)?;
            let end = time::parse_instant(&end, tz)?;
            match store.get(&subject, start, end) {
                Some(event) => print_events(&[event], tz, cli.format)?,
                None => {
                    eprintln!("No matching event.");
                    process::exit(1);
                }
            }
        }
        Commands::At { instant } => {
            let instant = time::parse_instant(&instant, tz)?;
            print_events(&store.get_at(instant), tz, cli.format)?;
        }
        Commands::Overlapping { start, end } => {
            let start = time::parse_instant(&start, tz)?;
            let end = time::parse_instant(&end, tz)?;
            print_events(&store.get_overlapping(start, end), tz, cli.format)?;
        }
        Commands::Export { output } => {
            let content = csv::export(store.get_all(), tz);
            write_output(output.as_deref(), &content)?;
        }
        Commands::Stats => {
            let index = store.index();
            if cli.format == Format::Json {
                let stats = serde_json::json!({
                    "events": index.len(),
                    "nodes": index.node_count(),
                    "depth": index.depth(),
                });
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Events: {}", index.len());
                println!("Nodes:  {}", index.node_count());
                println!("Depth:  {}", index.depth());
            }
        }
    }

    Ok(())
}

/// Install a stderr subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn print_report(report: &ImportReport, format: Format) -> Result<()> {
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("Imported {}/{} events", report.imported, report.total);
    for skipped in &report.skipped {
        eprintln!("  line {}: {}", skipped.line, skipped.reason);
    }
    Ok(())
}

fn print_events(events: &[&Event], tz: Tz, format: Format) -> Result<()> {
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(events)?);
        return Ok(());
    }
    if events.is_empty() {
        println!("No events found.");
        return Ok(());
    }
    for event in events {
        println!("{}", render(event, tz));
    }
    Ok(())
}

/// One-line summary: `START → END  SUBJECT [@ LOCATION]` in the given zone.
fn render(event: &Event, tz: Tz) -> String {
    let start = event.start().with_timezone(&tz);
    let end = event.end().with_timezone(&tz);

    let span = if event.is_all_day() {
        // Show the inclusive last day, matching the CSV export.
        let last_day = if end > start && end.time() == chrono::NaiveTime::MIN {
            end.date_naive().pred_opt().unwrap_or(end.date_naive())
        } else {
            end.date_naive()
        };
        format!(
            "{} → {} (all day)",
            start.format("%Y-%m-%d"),
            last_day.format("%Y-%m-%d")
        )
    } else {
        format!(
            "{} → {}",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M")
        )
    };

    match event.location() {
        Some(location) => format!("{}  {} @ {}", span, event.subject(), location),
        None => format!("{}  {}", span, event.subject()),
    }
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
