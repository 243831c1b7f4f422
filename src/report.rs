//! Probe Outcome Reporting
//!
//! Turns a terminal receipt into the user-facing result: round-trip time,
//! hop count and whatever link metrics the transport knows for the proof.

use std::fmt;
use std::time::Duration;

use crate::address::DestinationHash;
use crate::receipt::{PacketReceipt, ProofPacket, ReceiptStatus};
use crate::transport::{Transport, TransportError};

/// Format a round-trip time the way it is shown to the user.
///
/// At or above one second the value is seconds rounded to three decimals,
/// otherwise milliseconds rounded to three decimals. Floats print in their
/// shortest round-trip form, so whole values keep a trailing `.0`.
pub fn format_rtt(rtt: Duration) -> String {
    let secs = rtt.as_secs_f64();
    if secs >= 1.0 {
        let rounded = (secs * 1000.0).round() / 1000.0;
        format!("{:?} seconds", rounded)
    } else {
        let rounded = (secs * 1_000_000.0).round() / 1000.0;
        format!("{:?} milliseconds", rounded)
    }
}

/// "1 hop", "3 hops", or a phrase for an unknown count.
pub fn hop_label(hops: Option<u8>) -> String {
    match hops {
        Some(1) => "1 hop".to_string(),
        Some(n) => format!("{} hops", n),
        None => "an unknown number of hops".to_string(),
    }
}

/// Link metrics for the proof packet.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SignalMetrics {
    /// Received signal strength in dBm.
    pub rssi: Option<f64>,
    /// Signal-to-noise ratio in dB.
    pub snr: Option<f64>,
}

impl fmt::Display for SignalMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(rssi) = self.rssi {
            write!(f, " [RSSI {:?} dBm]", rssi)?;
        }
        if let Some(snr) = self.snr {
            write!(f, " [SNR {:?} dB]", snr)?;
        }
        Ok(())
    }
}

/// Where link metrics for a proof come from.
///
/// A shared-instance client never sees the proof's radio frame, so it asks
/// the instance's packet log; a directly attached process reads the
/// proof packet itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalMetricsSource {
    SharedInstance,
    DirectPacket,
}

impl SignalMetricsSource {
    /// Select the source matching the transport's connection mode.
    pub fn for_transport<T: Transport>(transport: &T) -> Self {
        if transport.is_connected_to_shared_instance() {
            SignalMetricsSource::SharedInstance
        } else {
            SignalMetricsSource::DirectPacket
        }
    }

    /// Read the metrics for a proof. No proof means no metrics.
    pub async fn read<T: Transport>(
        &self,
        transport: &T,
        proof: Option<&ProofPacket>,
    ) -> Result<SignalMetrics, TransportError> {
        let Some(proof) = proof else {
            return Ok(SignalMetrics::default());
        };

        match self {
            SignalMetricsSource::SharedInstance => Ok(SignalMetrics {
                rssi: transport.packet_rssi(&proof.packet_hash).await?,
                snr: transport.packet_snr(&proof.packet_hash).await?,
            }),
            SignalMetricsSource::DirectPacket => Ok(SignalMetrics {
                rssi: proof.rssi,
                snr: proof.snr,
            }),
        }
    }
}

/// Details of a proven delivery.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliveryReport {
    /// Destination that proved the probe.
    pub destination: DestinationHash,
    pub rtt: Duration,
    pub hops: Option<u8>,
    pub metrics: SignalMetrics,
}

impl fmt::Display for DeliveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Valid reply received from {}\nRound-trip time is {} over {}{}",
            self.destination,
            format_rtt(self.rtt),
            hop_label(self.hops),
            self.metrics
        )
    }
}

/// Final result of one probe. A timeout is an outcome, not an error.
#[derive(Clone, Debug, PartialEq)]
pub enum ProbeOutcome {
    Delivered(DeliveryReport),
    TimedOut,
}

impl ProbeOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ProbeOutcome::Delivered(_))
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Delivered(report) => write!(f, "{}", report),
            ProbeOutcome::TimedOut => write!(f, "Probe timed out"),
        }
    }
}

/// Builds the outcome for a receipt that reached a terminal state.
pub struct OutcomeReporter {
    source: SignalMetricsSource,
}

impl OutcomeReporter {
    pub fn new(source: SignalMetricsSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> SignalMetricsSource {
        self.source
    }

    /// Hops are looked up for the requested destination, since that is the
    /// path the probe waited for.
    pub async fn report<T: Transport>(
        &self,
        transport: &T,
        requested: &DestinationHash,
        receipt: &PacketReceipt,
    ) -> Result<ProbeOutcome, TransportError> {
        let state = receipt.snapshot();
        if state.status != ReceiptStatus::Delivered {
            return Ok(ProbeOutcome::TimedOut);
        }

        let hops = transport.hops_to(requested).await?;
        let metrics = self.source.read(transport, state.proof.as_ref()).await?;
        let rtt = state
            .delivered_at
            .map(|at| at.saturating_duration_since(receipt.sent_at()))
            .unwrap_or_default();

        Ok(ProbeOutcome::Delivered(DeliveryReport {
            destination: *receipt.destination(),
            rtt,
            hops,
            metrics,
        }))
    }
}
