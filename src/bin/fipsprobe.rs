//! fipsprobe binary
//!
//! Probes one destination through the local shared instance and reports
//! whether, and how fast, it answered.

use clap::{CommandFactory, Parser};
use fips_probe::{
    Config, Probe, ProbeError, ProbeOptions, ProbeOutcome, ProbeRequest, SharedInstanceTransport,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use tracing::{Level, debug, error, info};
use tracing_subscriber::{EnvFilter, fmt};

/// FIPS probe utility
#[derive(Parser, Debug)]
#[command(name = "fipsprobe", version, about)]
struct Args {
    /// Path to alternative config directory
    #[arg(long, value_name = "DIR")]
    config: Option<PathBuf>,

    /// Size of probe packet payload in bytes
    #[arg(short, long, value_name = "BYTES")]
    size: Option<usize>,

    /// Increase verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Full destination name in dotted notation
    full_name: Option<String>,

    /// Hexadecimal hash of the destination
    destination_hash: Option<String>,
}

fn log_level(verbosity: u8) -> Level {
    match verbosity {
        0 | 1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// How a probe run ended.
#[derive(Debug)]
enum Finish {
    Completed(Result<ProbeOutcome, ProbeError>),
    Interrupted,
}

/// Print the closing line for `ended` and return the process exit code.
///
/// Outcomes, address errors and interrupts exit 0. Every other error exits 1.
fn finish(out: &mut impl Write, ended: Finish) -> io::Result<i32> {
    let code = match ended {
        Finish::Completed(Ok(ProbeOutcome::Delivered(report))) => {
            info!(rtt_ms = report.rtt.as_millis() as u64, hops = ?report.hops, "Probe delivered");
            0
        }
        Finish::Completed(Ok(ProbeOutcome::TimedOut)) => {
            info!("Probe timed out");
            0
        }
        Finish::Completed(Err(ProbeError::Address(e))) => {
            writeln!(out, "{}", e)?;
            0
        }
        Finish::Completed(Err(e)) => {
            writeln!(out, "Error: {}", e)?;
            e.exit_code()
        }
        Finish::Interrupted => {
            writeln!(out)?;
            0
        }
    };
    out.flush()?;
    Ok(code)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    // Logging goes to stderr; stdout carries the probe output
    let filter = EnvFilter::builder()
        .with_default_directive(log_level(args.verbose).into())
        .from_env_lossy();

    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let Some(destination_hash) = args.destination_hash.as_deref() else {
        println!();
        let _ = Args::command().print_help();
        println!();
        return;
    };

    let Some(full_name) = args.full_name.as_deref() else {
        println!(
            "The full destination name including application name aspects must be specified for the destination"
        );
        return;
    };

    let mut request = match ProbeRequest::with_default_size(full_name, destination_hash) {
        Ok(request) => request,
        Err(e) => {
            println!("{}", e);
            return;
        }
    };

    let (config, loaded_paths) = match &args.config {
        Some(dir) => Config::load_from_dir(dir),
        None => Config::load(),
    }
    .unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        process::exit(1);
    });

    if loaded_paths.is_empty() {
        debug!("No config files found, using defaults");
    } else {
        for path in &loaded_paths {
            debug!(path = %path.display(), "Loaded config file");
        }
    }

    request.size = args.size.unwrap_or_else(|| config.probe.size());
    let options = ProbeOptions {
        poll_interval: config.probe.poll_interval(),
        verbose: args.verbose > 0,
    };

    let transport = match SharedInstanceTransport::connect(config.shared_instance.clone()).await {
        Ok(transport) => transport,
        Err(e) => {
            error!(addr = %config.shared_instance.addr(), "Could not reach shared instance: {}", e);
            process::exit(1);
        }
    };

    let mut probe = Probe::new(&transport, io::stdout(), options);

    let ended = tokio::select! {
        result = probe.run(&request) => Finish::Completed(result),
        _ = tokio::signal::ctrl_c() => Finish::Interrupted,
    };

    match finish(&mut io::stdout(), ended) {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Failed to write probe output: {}", e);
            process::exit(1);
        }
    }
}
