//! Probe packet construction.

use rand::RngCore;
use tracing::{debug, warn};

use super::{ProbeError, ProbeRequest};
use crate::address::{DestinationHash, DestinationSignature};
use crate::identity::{OutboundDestination, PeerIdentity};
use crate::packet::{HEADER_SIZE, Packet};
use crate::transport::Transport;

/// Builds the single probe packet for a request.
pub struct ProbeBuilder<'a, T> {
    transport: &'a T,
}

impl<'a, T: Transport> ProbeBuilder<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Recall the identity announced for `destination`.
    pub async fn resolve_identity(
        &self,
        destination: &DestinationHash,
    ) -> Result<PeerIdentity, ProbeError> {
        let identity = self
            .transport
            .recall_identity(destination)
            .await?
            .ok_or(ProbeError::UnknownIdentity(*destination))?;
        debug!(destination = %destination, identity = %identity, "Identity recalled");
        Ok(identity)
    }

    /// Outbound single destination for `identity` under `signature`.
    ///
    /// A hash that differs from the one requested means the name does not
    /// belong to that identity. The probe still goes out, addressed to the
    /// derived hash, and will not be proven.
    pub fn build_destination(
        &self,
        identity: PeerIdentity,
        signature: DestinationSignature,
        requested: &DestinationHash,
    ) -> OutboundDestination {
        let destination = OutboundDestination::new(identity, signature);
        if destination.hash() != requested {
            warn!(
                requested = %requested,
                derived = %destination.hash(),
                name = %destination.signature(),
                "Destination name does not match the requested hash"
            );
        }
        destination
    }

    /// `size` random bytes.
    pub fn build_payload(size: usize) -> Vec<u8> {
        let mut payload = vec![0u8; size];
        rand::thread_rng().fill_bytes(&mut payload);
        payload
    }

    /// Reject a payload size whose frame cannot fit the MTU, before any
    /// buffer is allocated for it.
    pub fn check_size(&self, size: usize) -> Result<(), ProbeError> {
        let required = HEADER_SIZE.saturating_add(size);
        let limit = self.transport.mtu();
        if required > limit {
            return Err(ProbeError::SizeExceeded { required, limit });
        }
        Ok(())
    }

    /// Frame the probe, refusing anything the network would not forward.
    pub fn pack(
        &self,
        destination: &OutboundDestination,
        payload: &[u8],
    ) -> Result<Packet, ProbeError> {
        let packet = self.transport.pack(destination, payload);
        let limit = self.transport.mtu();
        if packet.len() > limit {
            return Err(ProbeError::SizeExceeded {
                required: packet.len(),
                limit,
            });
        }
        Ok(packet)
    }

    /// Resolve, address, fill and frame the probe for `request`.
    pub async fn build(&self, request: &ProbeRequest) -> Result<Packet, ProbeError> {
        let identity = self.resolve_identity(&request.destination).await?;
        let destination =
            self.build_destination(identity, request.signature.clone(), &request.destination);
        self.check_size(request.size)?;
        let payload = Self::build_payload(request.size);
        let packet = self.pack(&destination, &payload)?;

        debug!(
            destination = %destination,
            packet_hash = %packet.hash(),
            bytes = packet.len(),
            "Probe packed"
        );
        Ok(packet)
    }
}
