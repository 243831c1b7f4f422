//! Probe Lifecycle
//!
//! One probe, start to finish:
//!
//! 1. wait for a path to the destination ([`PathWaiter`])
//! 2. recall the identity and frame a random payload ([`ProbeBuilder`])
//! 3. send it and wait for the transport to resolve the receipt
//!    ([`ReceiptWaiter`])
//! 4. report round-trip time, hops and link metrics
//!    ([`OutcomeReporter`](crate::report::OutcomeReporter))
//!
//! Progress goes to the console writer; diagnostics go through `tracing`.
//! Nothing here applies a deadline. A caller that wants one wraps
//! [`Probe::run`] in its own `select!`.

mod builder;
mod delivery;
mod path;
mod spinner;


use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::address::{AddressError, DestinationHash, DestinationSignature};
use crate::config::DEFAULT_PROBE_SIZE;
use crate::report::{OutcomeReporter, ProbeOutcome, SignalMetricsSource};
use crate::transport::{Transport, TransportError};

pub use builder::ProbeBuilder;
pub use delivery::ReceiptWaiter;
pub use path::PathWaiter;
pub use spinner::{GLYPHS, Spinner};

/// Default interval between path and receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors that end a probe before it has an outcome.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("Probe packet size of {required} bytes exceed MTU of {limit} bytes")]
    SizeExceeded { required: usize, limit: usize },

    #[error("No identity is known for {0}")]
    UnknownIdentity(DestinationHash),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("console write failed: {0}")]
    Console(#[from] std::io::Error),
}

impl ProbeError {
    /// Process exit status for this error.
    ///
    /// Bad input is reported and exits cleanly; everything else is a failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProbeError::Address(_) => 0,
            _ => 1,
        }
    }
}

/// A validated probe target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeRequest {
    pub signature: DestinationSignature,
    pub destination: DestinationHash,
    /// Payload size in bytes.
    pub size: usize,
}

impl ProbeRequest {
    /// Parse the full name, then the hash. Nothing touches the network.
    pub fn parse(full_name: &str, destination_hex: &str, size: usize) -> Result<Self, AddressError> {
        let signature = DestinationSignature::parse(full_name)?;
        let destination = DestinationHash::parse(destination_hex)?;
        Ok(Self {
            signature,
            destination,
            size,
        })
    }

    /// Same as [`ProbeRequest::parse`] with the default payload size.
    pub fn with_default_size(full_name: &str, destination_hex: &str) -> Result<Self, AddressError> {
        Self::parse(full_name, destination_hex, DEFAULT_PROBE_SIZE)
    }
}

/// Knobs for a probe run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeOptions {
    pub poll_interval: Duration,
    /// Report next hop and interface after sending.
    pub verbose: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            verbose: false,
        }
    }
}

/// Runs probes over a transport, writing progress to `console`.
pub struct Probe<'a, T, W> {
    transport: &'a T,
    console: W,
    options: ProbeOptions,
}

impl<'a, T: Transport, W: Write> Probe<'a, T, W> {
    pub fn new(transport: &'a T, console: W, options: ProbeOptions) -> Self {
        Self {
            transport,
            console,
            options,
        }
    }

    /// Give back the console writer.
    pub fn into_console(self) -> W {
        self.console
    }

    /// Probe `request.destination` once.
    pub async fn run(&mut self, request: &ProbeRequest) -> Result<ProbeOutcome, ProbeError> {
        let transport = self.transport;
        let poll_interval = self.options.poll_interval;

        PathWaiter::new(transport, poll_interval)
            .await_path(&request.destination, &mut self.console)
            .await?;

        let packet = ProbeBuilder::new(transport).build(request).await?;
        let receipt = transport.send(&packet).await?;
        info!(
            destination = %request.destination,
            packet_hash = %packet.hash(),
            bytes = request.size,
            "Probe sent"
        );

        let details = if self.options.verbose {
            self.route_details(&request.destination).await?
        } else {
            String::new()
        };
        write!(
            self.console,
            "\rSent {} byte probe to {}{}   ",
            request.size, request.destination, details
        )?;
        self.console.flush()?;

        ReceiptWaiter::new(poll_interval)
            .await_terminal(&receipt, &mut self.console)
            .await?;
        Spinner::clear(&mut self.console)?;

        let reporter = OutcomeReporter::new(SignalMetricsSource::for_transport(transport));
        let outcome = reporter
            .report(transport, &request.destination, &receipt)
            .await?;

        writeln!(self.console, "{}", outcome)?;
        self.console.flush()?;
        Ok(outcome)
    }

    /// " via <next hop> on <interface>", each part only when known.
    async fn route_details(&self, destination: &DestinationHash) -> Result<String, ProbeError> {
        let mut details = String::new();
        if let Some(next_hop) = self.transport.next_hop(destination).await? {
            details.push_str(&format!(" via {}", next_hop));
        }
        if let Some(interface) = self.transport.next_hop_interface_name(destination).await? {
            details.push_str(&format!(" on {}", interface));
        }
        Ok(details)
    }
}
