//! Probe Packet Framing
//!
//! Data packets addressed to a single destination. Every frame carries a
//! fixed 19-byte header followed by the opaque payload.
//!
//! ## Header (19 bytes)
//!
//! ```text
//! [flags:1][hops:1][destination:16][context:1]
//! ```
//!
//! ## Flags byte
//!
//! | Bits | Field            |
//! |------|------------------|
//! | 7    | reserved (0)     |
//! | 6    | header type      |
//! | 5    | context flag     |
//! | 4    | propagation      |
//! | 3-2  | destination kind |
//! | 1-0  | packet type      |
//!
//! The hops byte is rewritten by every forwarding node, so it is excluded
//! from the packet hash together with the transport-owned upper nibble of
//! the flags.

use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

use crate::address::{DestinationHash, TRUNCATED_HASH_LEN};
use crate::identity::DestinationKind;

// ============================================================================
// Constants
// ============================================================================

/// Default network MTU in bytes.
pub const DEFAULT_MTU: usize = 500;

/// Fixed header size: flags + hops + destination + context.
pub const HEADER_SIZE: usize = 2 + TRUNCATED_HASH_LEN + 1; // 19 bytes

/// Largest payload that fits a single frame at the default MTU.
pub const MAX_PAYLOAD_AT_DEFAULT_MTU: usize = DEFAULT_MTU - HEADER_SIZE; // 481 bytes

/// Packet type: application data.
pub const PACKET_DATA: u8 = 0x00;

/// Packet type: delivery proof.
pub const PACKET_PROOF: u8 = 0x03;

/// Context byte for plain data packets.
pub const CONTEXT_NONE: u8 = 0x00;

/// Size of a full packet hash.
pub const PACKET_HASH_LEN: usize = 32;

/// Errors from frame parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet too short: expected at least {expected}, got {got}")]
    TooShort { expected: usize, got: usize },

    #[error("unknown destination kind: {0}")]
    UnknownDestinationKind(u8),
}

// ============================================================================
// Packet Hash
// ============================================================================

/// SHA-256 identifier of a packet's hashable part.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketHash([u8; PACKET_HASH_LEN]);

impl PacketHash {
    pub fn from_bytes(bytes: [u8; PACKET_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Hash the invariant part of a raw frame: low flag nibble + raw[2..].
    pub fn of_frame(raw: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        if let Some(flags) = raw.first() {
            hasher.update([flags & 0x0F]);
        }
        if raw.len() > 2 {
            hasher.update(&raw[2..]);
        }
        let mut bytes = [0u8; PACKET_HASH_LEN];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PACKET_HASH_LEN] {
        &self.0
    }
}

impl fmt::Debug for PacketHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PacketHash({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for PacketHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", hex::encode(self.0))
    }
}

// ============================================================================
// Packet
// ============================================================================

/// A framed packet ready to hand to a transport.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    raw: Vec<u8>,
    hash: PacketHash,
}

impl Packet {
    /// Frame `payload` as a data packet for a single destination.
    pub fn data(destination: &DestinationHash, payload: &[u8]) -> Self {
        let flags = flags_byte(DestinationKind::Single, PACKET_DATA);
        let mut raw = Vec::with_capacity(HEADER_SIZE + payload.len());
        raw.push(flags);
        raw.push(0); // hops
        raw.extend_from_slice(destination.as_bytes());
        raw.push(CONTEXT_NONE);
        raw.extend_from_slice(payload);
        Self::from_raw(raw)
    }

    /// Wrap an already-framed buffer.
    pub fn from_raw(raw: Vec<u8>) -> Self {
        let hash = PacketHash::of_frame(&raw);
        Self { raw, hash }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Total framed length in bytes.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn hash(&self) -> &PacketHash {
        &self.hash
    }

    /// Parse the header fields out of the frame.
    pub fn header(&self) -> Result<PacketHeader, PacketError> {
        PacketHeader::parse(&self.raw)
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("len", &self.raw.len())
            .field("hash", &self.hash)
            .finish()
    }
}

/// Parsed packet header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_type: u8,
    pub destination_kind: DestinationKind,
    pub hops: u8,
    pub destination: DestinationHash,
    pub context: u8,
}

impl PacketHeader {
    /// Parse the fixed header from raw frame bytes.
    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < HEADER_SIZE {
            return Err(PacketError::TooShort {
                expected: HEADER_SIZE,
                got: data.len(),
            });
        }

        let flags = data[0];
        let packet_type = flags & 0x03;
        let destination_kind = match (flags >> 2) & 0x03 {
            0x00 => DestinationKind::Single,
            0x01 => DestinationKind::Group,
            0x02 => DestinationKind::Plain,
            other => return Err(PacketError::UnknownDestinationKind(other)),
        };

        let mut destination = [0u8; TRUNCATED_HASH_LEN];
        destination.copy_from_slice(&data[2..2 + TRUNCATED_HASH_LEN]);

        Ok(Self {
            packet_type,
            destination_kind,
            hops: data[1],
            destination: DestinationHash::from_bytes(destination),
            context: data[HEADER_SIZE - 1],
        })
    }
}

fn flags_byte(kind: DestinationKind, packet_type: u8) -> u8 {
    ((kind as u8) << 2) | (packet_type & 0x03)
}
