//! Outbound destination handles.

use std::fmt;

use crate::address::{DestinationHash, DestinationSignature, TRUNCATED_HASH_LEN};

use super::{PeerIdentity, sha256};

/// Length of the application-name hash folded into destination hashes.
pub const NAME_HASH_LEN: usize = 10;

/// Addressing mode of a destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DestinationKind {
    /// One recipient, bound to a single identity.
    Single = 0x00,
    /// Shared-key group destination.
    Group = 0x01,
    /// Unencrypted broadcast destination.
    Plain = 0x02,
}

/// An addressable, single-recipient handle for sending to a remote peer.
/// Only outbound destinations exist here; nothing is ever received on one.
///
/// The hash is `SHA-256(name_hash || identity_hash)[..16]` where
/// `name_hash = SHA-256(full_name)[..10]`.
#[derive(Clone, Debug)]
pub struct OutboundDestination {
    identity: PeerIdentity,
    signature: DestinationSignature,
    hash: DestinationHash,
}

impl OutboundDestination {
    /// Build the outbound handle for `identity` under `signature`.
    pub fn new(identity: PeerIdentity, signature: DestinationSignature) -> Self {
        let hash = Self::compute_hash(&identity, &signature);
        Self {
            identity,
            signature,
            hash,
        }
    }

    /// Hash of the dotted full name, truncated to [`NAME_HASH_LEN`].
    pub fn name_hash(signature: &DestinationSignature) -> [u8; NAME_HASH_LEN] {
        let digest = sha256(signature.full_name().as_bytes());
        let mut name_hash = [0u8; NAME_HASH_LEN];
        name_hash.copy_from_slice(&digest[..NAME_HASH_LEN]);
        name_hash
    }

    /// Derive the destination hash for an identity and signature.
    pub fn compute_hash(
        identity: &PeerIdentity,
        signature: &DestinationSignature,
    ) -> DestinationHash {
        let mut material = Vec::with_capacity(NAME_HASH_LEN + TRUNCATED_HASH_LEN);
        material.extend_from_slice(&Self::name_hash(signature));
        material.extend_from_slice(identity.node_addr().as_bytes());

        let digest = sha256(&material);
        let mut bytes = [0u8; TRUNCATED_HASH_LEN];
        bytes.copy_from_slice(&digest[..TRUNCATED_HASH_LEN]);
        DestinationHash::from_bytes(bytes)
    }

    pub fn kind(&self) -> DestinationKind {
        DestinationKind::Single
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    pub fn signature(&self) -> &DestinationSignature {
        &self.signature
    }

    pub fn hash(&self) -> &DestinationHash {
        &self.hash
    }
}

impl fmt::Display for OutboundDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.signature, self.hash)
    }
}
