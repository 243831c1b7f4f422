//! fips-probe: reachability and round-trip probing for FIPS destinations
//!
//! Sends one small packet to a named destination, waits for the transport to
//! prove (or give up on) delivery, and reports round-trip time, hop count and
//! link metrics.

pub mod address;
pub mod config;
pub mod identity;
pub mod packet;
pub mod probe;
pub mod receipt;
pub mod report;
pub mod transport;

// Re-export address types
pub use address::{AddressError, DestinationHash, DestinationSignature};

// Re-export identity types
pub use identity::{DestinationKind, IdentityError, NodeAddr, OutboundDestination, PeerIdentity};

// Re-export config types
pub use config::{Config, ConfigError, ProbeConfig, SharedInstanceConfig};

// Re-export packet and receipt types
pub use packet::{Packet, PacketError, PacketHash, PacketHeader};
pub use receipt::{PacketReceipt, ProofPacket, ReceiptStatus, ReceiptUpdater, receipt_pair};

// Re-export transport types
pub use transport::shared::SharedInstanceTransport;
pub use transport::{PathInfo, Transport, TransportError};

// Re-export probe types
pub use probe::{Probe, ProbeError, ProbeOptions, ProbeRequest};
pub use report::{
    DeliveryReport, OutcomeReporter, ProbeOutcome, SignalMetrics, SignalMetricsSource,
    format_rtt, hop_label,
};
