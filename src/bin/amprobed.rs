//! amprobed - ammeter emulator daemon.
//!
//! Runs the three emulated device endpoints (Greenlee, Entes, Circutor),
//! each on its own port, until interrupted. One connection is served at a
//! time per endpoint; this is a test fixture, not a production server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use amprobe::device::{DeviceKind, DeviceServer, ammeter_for, ammeter_with_seed};

/// Ammeter emulator daemon.
#[derive(Parser)]
#[command(name = "amprobed", about = "Ammeter emulator daemon", version)]
struct Args {
    /// Address to bind the endpoints on.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port for the Greenlee endpoint.
    #[arg(long, default_value_t = DeviceKind::Greenlee.default_port())]
    greenlee_port: u16,

    /// Port for the ENTES endpoint.
    #[arg(long, default_value_t = DeviceKind::Entes.default_port())]
    entes_port: u16,

    /// Port for the CIRCUTOR endpoint.
    #[arg(long, default_value_t = DeviceKind::Circutor.default_port())]
    circutor_port: u16,

    /// Seed the device random sources for reproducible readings.
    #[arg(long)]
    seed: Option<u64>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
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
        .add_directive(format!("amprobed={}", level).parse().unwrap())
        .add_directive(format!("amprobe={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!("amprobed {} starting", env!("CARGO_PKG_VERSION"));

    let endpoints = [
        (DeviceKind::Greenlee, args.greenlee_port),
        (DeviceKind::Entes, args.entes_port),
        (DeviceKind::Circutor, args.circutor_port),
    ];

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let mut handles = Vec::new();
    for (kind, port) in endpoints {
        let addr: SocketAddr = match format!("{}:{}", args.host, port).parse() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Invalid address {}:{}: {}", args.host, port, e);
                std::process::exit(1);
            }
        };

        let device = match args.seed {
            // Offset per kind so seeded devices do not move in lockstep.
            Some(seed) => ammeter_with_seed(kind, seed.wrapping_add(port as u64)),
            None => ammeter_for(kind),
        };

        let server = match DeviceServer::bind(device, addr) {
            Ok(server) => server,
            Err(e) => {
                error!("Failed to bind {} endpoint on {}: {}", kind, addr, e);
                std::process::exit(1);
            }
        };

        info!("Config: {} endpoint on {}", kind, addr);

        let flag = running.clone();
        handles.push(thread::spawn(move || {
            if let Err(e) = server.run(flag) {
                error!("{} endpoint failed: {}", kind, e);
            }
        }));
    }

    info!("All endpoints running. Press Ctrl+C to stop.");

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    for handle in handles {
        let _ = handle.join();
    }

    info!("amprobed stopped");
}
