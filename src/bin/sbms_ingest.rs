//! SBMS Ingest Runner
//!
//! Reads the controller's serial output from a device node, a capture file
//! or stdin, keeps the variable store up to date and prints decoded
//! telemetry as it arrives.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use sbms_gateway::app::Config;
use sbms_gateway::{change_channel, Link, Readout, VariableStore};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments
#[derive(Default)]
struct Args {
    /// Serial device or capture file (stdin if not specified)
    input: Option<PathBuf>,
    /// Configuration file
    config: Option<PathBuf>,
    /// Print decoded telemetry records as JSON lines
    json: bool,
    /// Print the variable dump at the end of input
    dump: bool,
    /// Show help
    help: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let mut i = 0;
    while i < argv.len() {
        match argv[i].as_str() {
            "-h" | "--help" => {
                args.help = true;
            },
            "-i" | "--input" => {
                i += 1;
                if i < argv.len() {
                    args.input = Some(PathBuf::from(&argv[i]));
                }
            },
            "-c" | "--config" => {
                i += 1;
                if i < argv.len() {
                    args.config = Some(PathBuf::from(&argv[i]));
                }
            },
            "-j" | "--json" => {
                args.json = true;
            },
            "-d" | "--dump" => {
                args.dump = true;
            },
            other => {
                // Treat as input path if no flag
                if args.input.is_none() && !other.starts_with('-') {
                    args.input = Some(PathBuf::from(other));
                }
            },
        }
        i += 1;
    }

    args
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = parse_args();
    if args.help {
        print_help();
        return ExitCode::SUCCESS;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Fatal error: {}", e);
            ExitCode::FAILURE
        },
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };

    let reader: Box<dyn Read + Send> = match &args.input {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin()),
    };

    let store = Arc::new(VariableStore::with_policy(
        config.store.lock_policy(),
        config.store.staleness_ms,
    ));
    let (notifier, changes) = change_channel(config.notify.capacity);
    let mut link = Link::from_config(&config, store).with_notifier(notifier);
    let readout = link.readout(config.telemetry.variable.clone());

    // The link, and with it the notifier, is dropped when input ends,
    // which ends the change feed below.
    let producer = thread::spawn(move || {
        let result = link.pump_with(reader, |name, transient| {
            if let Some(line) = transient {
                tracing::debug!(name, len = line.content.len(), "excluded variable received");
            }
        });
        (result, link.stats())
    });

    let records = consume_changes(changes, &readout, args.json, &mut io::stdout());
    tracing::debug!(records, "change feed closed");

    let (result, stats) = producer
        .join()
        .map_err(|_| "serial reader thread panicked")?;
    let bytes = result?;
    tracing::info!(
        bytes,
        commits = stats.commits,
        resets = stats.resets,
        "input finished"
    );

    if args.dump {
        let mut stdout = io::stdout().lock();
        stdout.write_all(&readout.dump_vars())?;
        stdout.flush()?;
    }

    Ok(())
}

/// Decode the telemetry variable on every change until the feed closes
///
/// Encoding or output failures are logged and skipped so the caller always
/// gets to join the producer. Returns the number of records decoded.
fn consume_changes<I, W>(changes: I, readout: &Readout, json: bool, out: &mut W) -> u64
where
    I: IntoIterator<Item = String>,
    W: Write,
{
    let mut records = 0;

    for name in changes {
        if name != readout.telemetry_variable() {
            tracing::debug!(name = %name, "variable updated");
            continue;
        }
        let record = match readout.telemetry() {
            Some(Ok(record)) => record,
            Some(Err(e)) => {
                tracing::warn!("Skipping {}: {}", name, e);
                continue;
            },
            None => continue,
        };
        records += 1;

        if json {
            let written = serde_json::to_string(&record)
                .map_err(io::Error::from)
                .and_then(|line| writeln!(out, "{}", line));
            if let Err(e) = written {
                tracing::warn!("Cannot write {}: {}", name, e);
            }
        }
    }

    records
}

fn print_help() {
    println!("SBMS Ingest Runner");
    println!();
    println!("Usage: sbms-ingest [OPTIONS] [INPUT]");
    println!();
    println!("Options:");
    println!("  -i, --input <PATH>   Serial device or capture file");
    println!("  -c, --config <PATH>  Configuration file (JSON)");
    println!("  -j, --json           Print decoded telemetry as JSON lines");
    println!("  -d, --dump           Print all live variables when input ends");
    println!("  -h, --help           Show this help message");
    println!();
    println!("If no input is specified, reads from stdin.");
    println!();
    println!("Examples:");
    println!("  sbms-ingest --json /dev/ttyUSB0");
    println!("  sbms-ingest --dump < capture.txt");
}
