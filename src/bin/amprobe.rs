//! amprobe - test campaign CLI.
//!
//! Subcommands:
//! - `run` — run a sampling campaign against one emulated device and
//!   persist the analyzed result
//! - `compare` — flat statistical summary for explicit test ids
//! - `report` — text summary and reliability ranking over all results

use std::collections::BTreeMap;

use clap::{Parser, Subcommand};
use tracing::{Level, error};
use tracing_subscriber::EnvFilter;

use amprobe::collector::{ErrorPolicy, SamplingConfig};
use amprobe::compare::Comparator;
use amprobe::device::DeviceKind;
use amprobe::fault::FaultConfig;
use amprobe::runner::{EndpointConfig, RunnerConfig, TestRunner};
use amprobe::storage::ResultStore;

/// Ammeter test campaign runner and result comparator.
#[derive(Parser)]
#[command(name = "amprobe", about = "Ammeter test campaigns", version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run a sampling campaign against one device.
    Run {
        /// Device kind: greenlee, entes or circutor.
        device: DeviceKind,

        /// Endpoint host.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Endpoint port. Default: the device's fixed port.
        #[arg(long)]
        port: Option<u16>,

        /// Sampling frequency in Hz.
        #[arg(long, default_value_t = 10.0)]
        hz: f64,

        /// Number of measurements to collect.
        #[arg(long, default_value_t = 50)]
        count: usize,

        /// Fault injection rate in [0, 1]. Zero disables injection.
        #[arg(long, default_value_t = 0.0)]
        error_rate: f64,

        /// Fault kind weight, as `kind=weight` (repeatable).
        /// Default weights are used when none are given.
        #[arg(long = "fault", value_parser = parse_weight)]
        faults: Vec<(String, f64)>,

        /// Keep sampling after a fault instead of aborting.
        #[arg(long)]
        continue_on_error: bool,

        /// Directory to store results in.
        #[arg(long, default_value = "results")]
        results: String,
    },

    /// Summarize an explicit list of test ids.
    Compare {
        /// Test ids to compare.
        #[arg(required = true)]
        test_ids: Vec<String>,

        /// Directory results are stored in.
        #[arg(long, default_value = "results")]
        results: String,
    },

    /// Print a summary report and reliability ranking over all results.
    Report {
        /// Directory results are stored in.
        #[arg(long, default_value = "results")]
        results: String,
    },
}

/// Parses a `kind=weight` fault specification.
fn parse_weight(s: &str) -> Result<(String, f64), String> {
    let (kind, weight) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid fault spec '{}', expected kind=weight", s))?;
    let weight: f64 = weight
        .trim()
        .parse()
        .map_err(|e| format!("invalid weight in '{}': {}", s, e))?;
    Ok((kind.trim().to_string(), weight))
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("amprobe={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let outcome = match args.command {
        Command::Run {
            device,
            host,
            port,
            hz,
            count,
            error_rate,
            faults,
            continue_on_error,
            results,
        } => run_campaign(
            device,
            host,
            port,
            hz,
            count,
            error_rate,
            faults,
            continue_on_error,
            results,
        ),
        Command::Compare { test_ids, results } => compare_tests(&test_ids, &results),
        Command::Report { results } => print_report(&results),
    };

    if let Err(e) = outcome {
        error!("{}", e);
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn run_campaign(
    device: DeviceKind,
    host: String,
    port: Option<u16>,
    hz: f64,
    count: usize,
    error_rate: f64,
    faults: Vec<(String, f64)>,
    continue_on_error: bool,
    results: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut endpoints = BTreeMap::new();
    endpoints.insert(
        device,
        EndpointConfig {
            host,
            port: port.unwrap_or_else(|| device.default_port()),
        },
    );

    let fault = FaultConfig {
        enabled: error_rate > 0.0,
        error_rate,
        error_types: if faults.is_empty() {
            FaultConfig::default().error_types
        } else {
            faults.into_iter().collect()
        },
    };

    let config = RunnerConfig {
        endpoints,
        sampling: SamplingConfig {
            sampling_frequency_hz: hz,
            measurements_count: count,
            total_duration_seconds: count as f64 / hz,
        },
        fault,
        error_policy: if continue_on_error {
            ErrorPolicy::Continue
        } else {
            ErrorPolicy::Abort
        },
        save_path: results,
        ..RunnerConfig::default()
    };

    let runner = TestRunner::new(config)?;
    let result = runner.run(device)?;

    println!("Test {} completed.", result.metadata.test_id);
    println!("{}", serde_json::to_string_pretty(&result.analysis)?);
    Ok(())
}

fn compare_tests(test_ids: &[String], results: &str) -> Result<(), Box<dyn std::error::Error>> {
    let comparator = Comparator::new(ResultStore::new(results));
    let summaries = comparator.compare(test_ids)?;
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

fn print_report(results: &str) -> Result<(), Box<dyn std::error::Error>> {
    let comparator = Comparator::new(ResultStore::new(results));
    println!("{}", comparator.summary_report()?);
    Ok(())
}
