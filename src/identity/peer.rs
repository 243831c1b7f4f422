//! Remote peer identity (public key only, no signing capability).

use secp256k1::XOnlyPublicKey;
use std::fmt;

use super::{IdentityError, NodeAddr};

/// A known peer's identity, as recalled from the transport's identity cache.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PeerIdentity {
    pubkey: XOnlyPublicKey,
    node_addr: NodeAddr,
}

impl PeerIdentity {
    /// Create a PeerIdentity from an x-only public key.
    pub fn from_pubkey(pubkey: XOnlyPublicKey) -> Self {
        let node_addr = NodeAddr::from_pubkey(&pubkey);
        Self { pubkey, node_addr }
    }

    /// Create a PeerIdentity from 32 serialized x-only key bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentityError> {
        let pubkey = XOnlyPublicKey::from_slice(bytes)?;
        Ok(Self::from_pubkey(pubkey))
    }

    /// Return the x-only public key.
    pub fn pubkey(&self) -> XOnlyPublicKey {
        self.pubkey
    }

    /// Return the identity hash.
    pub fn node_addr(&self) -> &NodeAddr {
        &self.node_addr
    }
}

impl fmt::Debug for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerIdentity")
            .field("node_addr", &self.node_addr)
            .finish()
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node_addr)
    }
}
