//! In-Process Simulated Mesh
//!
//! A transport with no network behind it. Routes, identities and remote
//! behaviour are scripted up front; path requests and receipts resolve on
//! tokio timers, so tests running on a paused clock see the same polling
//! behaviour as a live mesh without waiting for it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use super::{PathInfo, Transport, TransportError};
use crate::address::DestinationHash;
use crate::identity::{NodeAddr, PeerIdentity};
use crate::packet::{DEFAULT_MTU, PACKET_PROOF, Packet, PacketHash};
use crate::receipt::{PacketReceipt, ProofPacket, ReceiptUpdater, receipt_pair};

/// How a simulated destination reacts to a probe.
#[derive(Clone, Debug, PartialEq)]
pub enum Responder {
    /// Prove delivery after `rtt`, reporting the given link metrics.
    Deliver {
        rtt: Duration,
        rssi: Option<f64>,
        snr: Option<f64>,
    },
    /// Give up on the receipt after `after`.
    Fail { after: Duration },
    /// Never answer; the receipt stays in flight.
    Silent,
}

#[derive(Default)]
struct MemoryState {
    routes: HashMap<DestinationHash, PathInfo>,
    discoverable: HashMap<DestinationHash, (PathInfo, Duration)>,
    identities: HashMap<DestinationHash, PeerIdentity>,
    responders: HashMap<DestinationHash, Responder>,
    packet_log: HashMap<PacketHash, (Option<f64>, Option<f64>)>,
    path_requests: Vec<DestinationHash>,
    path_queries: usize,
    sent: Vec<Packet>,
    /// Updaters for silent destinations, held so they never resolve.
    unanswered: Vec<ReceiptUpdater>,
}

/// Simulated mesh transport.
#[derive(Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
    mtu: usize,
    shared_instance: bool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Create an empty mesh with the default MTU, in direct (non-shared) mode.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            mtu: DEFAULT_MTU,
            shared_instance: false,
        }
    }

    /// Override the MTU.
    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Behave like a shared-instance client: link metrics go to the packet
    /// log instead of onto the proof packet.
    pub fn as_shared_instance(mut self) -> Self {
        self.shared_instance = true;
        self
    }

    /// Install a known route.
    pub fn add_route(&self, destination: DestinationHash, route: PathInfo) {
        self.state().routes.insert(destination, route);
    }

    /// Make `route` appear `delay` after the first path request.
    pub fn add_discoverable(&self, destination: DestinationHash, route: PathInfo, delay: Duration) {
        self.state().discoverable.insert(destination, (route, delay));
    }

    /// Cache an announced identity for a destination.
    pub fn add_identity(&self, destination: DestinationHash, identity: PeerIdentity) {
        self.state().identities.insert(destination, identity);
    }

    /// Script how `destination` answers probes. Unscripted destinations stay
    /// silent.
    pub fn set_responder(&self, destination: DestinationHash, responder: Responder) {
        self.state().responders.insert(destination, responder);
    }

    /// Record link metrics for a received packet.
    pub fn log_packet(&self, packet_hash: PacketHash, rssi: Option<f64>, snr: Option<f64>) {
        self.state().packet_log.insert(packet_hash, (rssi, snr));
    }

    /// Destinations for which a path request was issued, in order.
    pub fn path_requests(&self) -> Vec<DestinationHash> {
        self.state().path_requests.clone()
    }

    /// Number of `has_path` queries answered.
    pub fn path_queries(&self) -> usize {
        self.state().path_queries
    }

    /// Packets handed to `send`, in order.
    pub fn sent_packets(&self) -> Vec<Packet> {
        self.state().sent.clone()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn route(&self, destination: &DestinationHash) -> Option<PathInfo> {
        self.state().routes.get(destination).cloned()
    }

    fn respond(&self, responder: Responder, updater: ReceiptUpdater) {
        match responder {
            Responder::Deliver { rtt, rssi, snr } => {
                let state = self.state.clone();
                let shared_instance = self.shared_instance;
                tokio::spawn(async move {
                    tokio::time::sleep(rtt).await;
                    let proof_hash = proof_hash_for(updater.packet_hash());
                    let proof = if shared_instance {
                        // The daemon received the proof, not this client
                        state
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .packet_log
                            .insert(proof_hash, (rssi, snr));
                        ProofPacket {
                            packet_hash: proof_hash,
                            rssi: None,
                            snr: None,
                        }
                    } else {
                        ProofPacket {
                            packet_hash: proof_hash,
                            rssi,
                            snr,
                        }
                    };
                    updater.deliver(Some(proof));
                });
            }
            Responder::Fail { after } => {
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    updater.fail();
                });
            }
            Responder::Silent => self.state().unanswered.push(updater),
        }
    }
}

/// Hash of the proof frame a destination returns for `packet_hash`.
fn proof_hash_for(packet_hash: &PacketHash) -> PacketHash {
    let mut frame = vec![PACKET_PROOF, 0];
    frame.extend_from_slice(packet_hash.as_bytes());
    PacketHash::of_frame(&frame)
}

impl Transport for MemoryTransport {
    fn mtu(&self) -> usize {
        self.mtu
    }

    fn is_connected_to_shared_instance(&self) -> bool {
        self.shared_instance
    }

    async fn has_path(&self, destination: &DestinationHash) -> Result<bool, TransportError> {
        let mut state = self.state();
        state.path_queries += 1;
        Ok(state.routes.get(destination).is_some_and(|r| r.known))
    }

    async fn request_path(&self, destination: &DestinationHash) -> Result<(), TransportError> {
        let pending = {
            let mut state = self.state();
            state.path_requests.push(*destination);
            state.discoverable.remove(destination)
        };

        if let Some((route, delay)) = pending {
            debug!(destination = %destination, delay_ms = delay.as_millis() as u64, "Scheduling simulated path response");
            let state = self.state.clone();
            let destination = *destination;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .routes
                    .insert(destination, route);
            });
        }
        Ok(())
    }

    async fn hops_to(&self, destination: &DestinationHash) -> Result<Option<u8>, TransportError> {
        Ok(self.route(destination).and_then(|r| r.hops))
    }

    async fn next_hop(
        &self,
        destination: &DestinationHash,
    ) -> Result<Option<NodeAddr>, TransportError> {
        Ok(self.route(destination).and_then(|r| r.next_hop))
    }

    async fn next_hop_interface_name(
        &self,
        destination: &DestinationHash,
    ) -> Result<Option<String>, TransportError> {
        Ok(self.route(destination).and_then(|r| r.interface))
    }

    async fn recall_identity(
        &self,
        destination: &DestinationHash,
    ) -> Result<Option<PeerIdentity>, TransportError> {
        Ok(self.state().identities.get(destination).copied())
    }

    async fn send(&self, packet: &Packet) -> Result<PacketReceipt, TransportError> {
        let header = packet
            .header()
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        if packet.len() > self.mtu {
            return Err(TransportError::SendFailed(format!(
                "packet {} > mtu {}",
                packet.len(),
                self.mtu
            )));
        }

        let (receipt, updater) = receipt_pair(*packet.hash(), header.destination);
        let responder = {
            let mut state = self.state();
            state.sent.push(packet.clone());
            state
                .responders
                .get(&header.destination)
                .cloned()
                .unwrap_or(Responder::Silent)
        };

        debug!(destination = %header.destination, bytes = packet.len(), "Simulated send");
        self.respond(responder, updater);
        Ok(receipt)
    }

    async fn packet_rssi(&self, packet_hash: &PacketHash) -> Result<Option<f64>, TransportError> {
        Ok(self.state().packet_log.get(packet_hash).and_then(|m| m.0))
    }

    async fn packet_snr(&self, packet_hash: &PacketHash) -> Result<Option<f64>, TransportError> {
        Ok(self.state().packet_log.get(packet_hash).and_then(|m| m.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::ReceiptStatus;

    fn dest(byte: u8) -> DestinationHash {
        DestinationHash::from_bytes([byte; 16])
    }

    fn known(hops: u8) -> PathInfo {
        PathInfo {
            known: true,
            hops: Some(hops),
            next_hop: None,
            interface: None,
        }
    }

    #[tokio::test]
    async fn test_static_route() {
        let transport = MemoryTransport::new();
        assert!(!transport.has_path(&dest(1)).await.unwrap());

        transport.add_route(dest(1), known(3));
        assert!(transport.has_path(&dest(1)).await.unwrap());
        assert_eq!(transport.hops_to(&dest(1)).await.unwrap(), Some(3));
        assert_eq!(transport.path_queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discoverable_route_appears_after_delay() {
        let transport = MemoryTransport::new();
        transport.add_discoverable(dest(1), known(2), Duration::from_millis(300));

        transport.request_path(&dest(1)).await.unwrap();
        assert!(!transport.has_path(&dest(1)).await.unwrap());

        tokio::time::sleep(Duration::from_millis(301)).await;
        assert!(transport.has_path(&dest(1)).await.unwrap());
        assert_eq!(transport.path_requests(), vec![dest(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_responder_direct_metrics() {
        let transport = MemoryTransport::new();
        transport.set_responder(
            dest(1),
            Responder::Deliver {
                rtt: Duration::from_millis(40),
                rssi: Some(-60.0),
                snr: Some(7.5),
            },
        );

        let receipt = transport.send(&Packet::data(&dest(1), b"x")).await.unwrap();
        assert_eq!(receipt.status(), ReceiptStatus::InFlight);

        tokio::time::sleep(Duration::from_millis(41)).await;
        assert_eq!(receipt.status(), ReceiptStatus::Delivered);
        assert_eq!(receipt.rtt(), Some(Duration::from_millis(40)));

        let proof = receipt.proof().unwrap();
        assert_eq!(proof.rssi, Some(-60.0));
        assert_eq!(proof.snr, Some(7.5));
        assert_eq!(transport.packet_rssi(&proof.packet_hash).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_responder_shared_metrics_in_log() {
        let transport = MemoryTransport::new().as_shared_instance();
        transport.set_responder(
            dest(1),
            Responder::Deliver {
                rtt: Duration::from_millis(10),
                rssi: Some(-80.0),
                snr: None,
            },
        );

        let receipt = transport.send(&Packet::data(&dest(1), b"x")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(11)).await;

        let proof = receipt.proof().unwrap();
        assert_eq!(proof.rssi, None);
        assert_eq!(transport.packet_rssi(&proof.packet_hash).await.unwrap(), Some(-80.0));
        assert_eq!(transport.packet_snr(&proof.packet_hash).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_and_silent_responders() {
        let transport = MemoryTransport::new();
        transport.set_responder(dest(1), Responder::Fail { after: Duration::from_secs(5) });

        let failing = transport.send(&Packet::data(&dest(1), b"x")).await.unwrap();
        let silent = transport.send(&Packet::data(&dest(2), b"x")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(failing.status(), ReceiptStatus::Failed);
        assert_eq!(silent.status(), ReceiptStatus::InFlight);
        assert_eq!(transport.sent_packets().len(), 2);
    }

    #[tokio::test]
    async fn test_send_rejects_oversized() {
        let transport = MemoryTransport::new().with_mtu(30);
        let result = transport.send(&Packet::data(&dest(1), &[0u8; 20])).await;
        assert!(matches!(result, Err(TransportError::SendFailed(_))));
        assert!(transport.sent_packets().is_empty());
    }
}
