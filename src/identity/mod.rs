//! Peer Identity and Destinations
//!
//! Remote peers are identified by secp256k1 x-only public keys. The
//! identity hash (NodeAddr) is the truncated SHA-256 of the key, and an
//! outbound destination hash binds that identity to an application
//! signature.

mod destination;
mod node_addr;
mod peer;

use sha2::{Digest, Sha256};
use thiserror::Error;

pub use destination::{DestinationKind, NAME_HASH_LEN, OutboundDestination};
pub use node_addr::NodeAddr;
pub use peer::PeerIdentity;

/// Errors that can occur in identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(#[from] secp256k1::Error),

    #[error("invalid node_addr length: expected 16, got {0}")]
    InvalidNodeAddrLength(usize),
}

/// Compute SHA-256 hash of data.
fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

#[cfg(test)]
mod tests;
