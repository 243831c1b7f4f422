//! Delivery Receipts
//!
//! A receipt tracks the outcome of one sent packet. The transport owns the
//! writing half ([`ReceiptUpdater`]) and resolves it from its own task when
//! a proof arrives or its retransmission policy gives up; the probe holds
//! the reading half ([`PacketReceipt`]) and only observes it.
//!
//! Both halves share a `watch` channel, so every read sees a complete
//! [`ReceiptState`] snapshot.

use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::address::DestinationHash;
use crate::packet::PacketHash;

/// Delivery status of a sent packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Sent, no proof yet.
    InFlight,
    /// Proof of delivery received.
    Delivered,
    /// The transport gave up waiting for a proof.
    Failed,
}

impl ReceiptStatus {
    /// Check if the status can no longer change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReceiptStatus::InFlight)
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReceiptStatus::InFlight => "in-flight",
            ReceiptStatus::Delivered => "delivered",
            ReceiptStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// The proof packet that confirmed delivery, as seen by the receiving
/// interface.
#[derive(Clone, Debug, PartialEq)]
pub struct ProofPacket {
    /// Hash of the proof packet itself (key into the packet log).
    pub packet_hash: PacketHash,
    /// Received signal strength in dBm, if the interface reports it.
    pub rssi: Option<f64>,
    /// Signal-to-noise ratio in dB, if the interface reports it.
    pub snr: Option<f64>,
}

/// Snapshot of a receipt's mutable fields.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceiptState {
    pub status: ReceiptStatus,
    pub delivered_at: Option<Instant>,
    pub proof: Option<ProofPacket>,
}

impl ReceiptState {
    fn in_flight() -> Self {
        Self {
            status: ReceiptStatus::InFlight,
            delivered_at: None,
            proof: None,
        }
    }
}

/// Read-only handle on a sent packet's delivery outcome.
#[derive(Clone)]
pub struct PacketReceipt {
    packet_hash: PacketHash,
    destination: DestinationHash,
    sent_at: Instant,
    state: watch::Receiver<ReceiptState>,
}

/// Writing half of a receipt, held by the transport.
///
/// The status leaves `InFlight` at most once. Dropping an updater that never
/// resolved marks the receipt `Failed`.
#[derive(Debug)]
pub struct ReceiptUpdater {
    packet_hash: PacketHash,
    state: watch::Sender<ReceiptState>,
}

/// Create a new in-flight receipt stamped with the current time.
pub fn receipt_pair(
    packet_hash: PacketHash,
    destination: DestinationHash,
) -> (PacketReceipt, ReceiptUpdater) {
    let (tx, rx) = watch::channel(ReceiptState::in_flight());
    let receipt = PacketReceipt {
        packet_hash,
        destination,
        sent_at: Instant::now(),
        state: rx,
    };
    let updater = ReceiptUpdater {
        packet_hash,
        state: tx,
    };
    (receipt, updater)
}

impl PacketReceipt {
    pub fn packet_hash(&self) -> &PacketHash {
        &self.packet_hash
    }

    pub fn destination(&self) -> &DestinationHash {
        &self.destination
    }

    pub fn sent_at(&self) -> Instant {
        self.sent_at
    }

    /// Current status.
    pub fn status(&self) -> ReceiptStatus {
        self.state.borrow().status
    }

    /// Consistent copy of all mutable fields.
    pub fn snapshot(&self) -> ReceiptState {
        self.state.borrow().clone()
    }

    /// Proof packet, if delivery was proven with one.
    pub fn proof(&self) -> Option<ProofPacket> {
        self.state.borrow().proof.clone()
    }

    /// Round-trip time, once delivered.
    pub fn rtt(&self) -> Option<Duration> {
        self.state
            .borrow()
            .delivered_at
            .map(|at| at.saturating_duration_since(self.sent_at))
    }
}

impl fmt::Debug for PacketReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketReceipt")
            .field("packet_hash", &self.packet_hash)
            .field("destination", &self.destination)
            .field("status", &self.status())
            .finish()
    }
}

impl ReceiptUpdater {
    pub fn packet_hash(&self) -> &PacketHash {
        &self.packet_hash
    }

    /// Mark delivered now. Returns false if already terminal.
    pub fn deliver(&self, proof: Option<ProofPacket>) -> bool {
        self.deliver_at(Instant::now(), proof)
    }

    /// Mark delivered at an explicit time. Returns false if already terminal.
    pub fn deliver_at(&self, at: Instant, proof: Option<ProofPacket>) -> bool {
        self.transition(|state| {
            state.status = ReceiptStatus::Delivered;
            state.delivered_at = Some(at);
            state.proof = proof;
        })
    }

    /// Mark failed. Returns false if already terminal.
    pub fn fail(&self) -> bool {
        self.transition(|state| state.status = ReceiptStatus::Failed)
    }

    /// Check if the receipt is still in flight.
    pub fn is_pending(&self) -> bool {
        !self.state.borrow().status.is_terminal()
    }

    fn transition(&self, apply: impl FnOnce(&mut ReceiptState)) -> bool {
        self.state.send_if_modified(|state| {
            if state.status.is_terminal() {
                return false;
            }
            apply(state);
            true
        })
    }
}

impl Drop for ReceiptUpdater {
    fn drop(&mut self) {
        self.fail();
    }
}
