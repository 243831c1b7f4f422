//! Transport Collaborator
//!
//! The probe never routes, forwards or proves anything itself. Everything
//! it knows about the mesh comes through the [`Transport`] trait: path
//! state, cached identities, packet framing, sending, and the packet log
//! kept by a shared instance.
//!
//! [`shared::SharedInstanceTransport`] is the client of a local shared
//! instance over UDP. Tests drive the probe through an in-process simulated
//! mesh instead (`memory::MemoryTransport`).

#[cfg(test)]
pub(crate) mod memory;
pub mod shared;
pub mod wire;

use thiserror::Error;

use crate::address::DestinationHash;
use crate::identity::{NodeAddr, OutboundDestination, PeerIdentity};
use crate::packet::{Packet, PacketHash};
use crate::receipt::PacketReceipt;

pub use wire::WireError;

// ============================================================================
// Errors
// ============================================================================

/// Errors related to transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport failed to start: {0}")]
    StartFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("invalid transport address: {0}")]
    InvalidAddress(String),

    #[error("shared instance did not answer within {0} ms")]
    Timeout(u64),

    #[error("shared instance rejected request: {0}")]
    Rejected(String),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("transport closed")]
    Closed,

    #[error("wire format error: {0}")]
    Wire(#[from] WireError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Path Information
// ============================================================================

/// Routing table entry for a destination, as reported by the transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathInfo {
    /// Whether a forwarding path is currently known.
    pub known: bool,
    /// Hops to the destination, if known.
    pub hops: Option<u8>,
    /// Identity hash of the next-hop node, if known.
    pub next_hop: Option<NodeAddr>,
    /// Name of the local interface the path leaves through, if known.
    pub interface: Option<String>,
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Mesh transport surface consumed by the probe.
///
/// Query methods are async because a shared-instance client has to ask the
/// daemon; an in-process transport answers immediately.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Largest frame the network will forward.
    fn mtu(&self) -> usize;

    /// Whether this handle is a client of a shared upstream instance.
    fn is_connected_to_shared_instance(&self) -> bool;

    /// Check if a forwarding path to `destination` is known.
    async fn has_path(&self, destination: &DestinationHash) -> Result<bool, TransportError>;

    /// Broadcast a path request for `destination`.
    async fn request_path(&self, destination: &DestinationHash) -> Result<(), TransportError>;

    /// Number of hops to `destination`, if a path is known.
    async fn hops_to(&self, destination: &DestinationHash) -> Result<Option<u8>, TransportError>;

    /// Identity hash of the next hop toward `destination`.
    async fn next_hop(
        &self,
        destination: &DestinationHash,
    ) -> Result<Option<NodeAddr>, TransportError>;

    /// Name of the interface used to reach `destination`.
    async fn next_hop_interface_name(
        &self,
        destination: &DestinationHash,
    ) -> Result<Option<String>, TransportError>;

    /// Look up the cached identity announced for `destination`.
    async fn recall_identity(
        &self,
        destination: &DestinationHash,
    ) -> Result<Option<PeerIdentity>, TransportError>;

    /// Frame a payload for `destination`.
    ///
    /// Framing never fails; enforcing the MTU is the caller's job.
    fn pack(&self, destination: &OutboundDestination, payload: &[u8]) -> Packet {
        Packet::data(destination.hash(), payload)
    }

    /// Transmit a packet. Returns at once with an in-flight receipt.
    async fn send(&self, packet: &Packet) -> Result<PacketReceipt, TransportError>;

    /// RSSI logged for a received packet, in dBm.
    async fn packet_rssi(&self, packet_hash: &PacketHash) -> Result<Option<f64>, TransportError>;

    /// SNR logged for a received packet, in dB.
    async fn packet_snr(&self, packet_hash: &PacketHash) -> Result<Option<f64>, TransportError>;
}
