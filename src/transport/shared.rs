//! Shared Instance Client
//!
//! Talks to a local shared instance over UDP using the control protocol in
//! [`super::wire`]. Requests are correlated with replies by request id; a
//! background receive loop routes replies to their callers and resolves
//! receipts from the daemon's unsolicited receipt updates.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::wire::{ControlMessage, ReceiptUpdate, Reply, Request};
use super::{PathInfo, Transport, TransportError};
use crate::address::DestinationHash;
use crate::config::SharedInstanceConfig;
use crate::identity::{NodeAddr, PeerIdentity};
use crate::packet::{Packet, PacketHash};
use crate::receipt::{PacketReceipt, ReceiptStatus, ReceiptUpdater, receipt_pair};

type PendingReplies = Arc<Mutex<HashMap<u32, oneshot::Sender<Reply>>>>;
type PendingReceipts = Arc<Mutex<HashMap<PacketHash, ReceiptUpdater>>>;

/// UDP client of a shared instance.
pub struct SharedInstanceTransport {
    config: SharedInstanceConfig,
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    next_request_id: AtomicU32,
    pending: PendingReplies,
    receipts: PendingReceipts,
    recv_task: JoinHandle<()>,
}

impl SharedInstanceTransport {
    /// Bind a local socket, connect it to the shared instance and start the
    /// receive loop.
    pub async fn connect(config: SharedInstanceConfig) -> Result<Self, TransportError> {
        let remote_addr: SocketAddr = config
            .addr()
            .parse()
            .map_err(|e| TransportError::InvalidAddress(format!("{}: {}", config.addr(), e)))?;
        let bind_addr: SocketAddr = config
            .bind_addr()
            .parse()
            .map_err(|e| TransportError::StartFailed(format!("invalid bind address: {}", e)))?;

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| TransportError::StartFailed(format!("bind failed: {}", e)))?;
        socket
            .connect(remote_addr)
            .await
            .map_err(|e| TransportError::StartFailed(format!("connect failed: {}", e)))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| TransportError::StartFailed(format!("get local addr: {}", e)))?;

        let socket = Arc::new(socket);
        let pending: PendingReplies = Arc::default();
        let receipts: PendingReceipts = Arc::default();

        let recv_task = tokio::spawn(control_receive_loop(
            socket.clone(),
            pending.clone(),
            receipts.clone(),
            config.mtu(),
        ));

        info!(
            local_addr = %local_addr,
            shared_instance = %remote_addr,
            "Connected to shared instance"
        );

        Ok(Self {
            config,
            socket,
            local_addr,
            remote_addr,
            next_request_id: AtomicU32::new(1),
            pending,
            receipts,
            recv_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Request id 0 is reserved for unsolicited messages.
    fn request_id(&self) -> u32 {
        loop {
            let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    /// Send a request and wait for the matching reply.
    async fn call(&self, request: Request) -> Result<Reply, TransportError> {
        let request_id = self.request_id();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(request_id, tx);

        let datagram = ControlMessage::Request {
            request_id,
            request,
        }
        .encode();

        if let Err(e) = self.socket.send(&datagram).await {
            lock(&self.pending).remove(&request_id);
            return Err(TransportError::SendFailed(format!("{}", e)));
        }
        trace!(request_id, bytes = datagram.len(), "Control request sent");

        let timeout = self.config.request_timeout();
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Reply::Error(reason))) => Err(TransportError::Rejected(reason)),
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                lock(&self.pending).remove(&request_id);
                Err(TransportError::Timeout(timeout.as_millis() as u64))
            }
        }
    }

    async fn path_info(&self, destination: &DestinationHash) -> Result<PathInfo, TransportError> {
        match self.call(Request::PathQuery(*destination)).await? {
            Reply::PathInfo(info) => Ok(info),
            other => Err(unexpected("path info", &other)),
        }
    }

    async fn packet_metrics(
        &self,
        packet_hash: &PacketHash,
    ) -> Result<(Option<f64>, Option<f64>), TransportError> {
        match self.call(Request::PacketLog(*packet_hash)).await? {
            Reply::PacketMetrics { rssi, snr } => Ok((rssi, snr)),
            other => Err(unexpected("packet metrics", &other)),
        }
    }
}

impl Drop for SharedInstanceTransport {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

impl Transport for SharedInstanceTransport {
    fn mtu(&self) -> usize {
        self.config.mtu()
    }

    fn is_connected_to_shared_instance(&self) -> bool {
        true
    }

    async fn has_path(&self, destination: &DestinationHash) -> Result<bool, TransportError> {
        Ok(self.path_info(destination).await?.known)
    }

    async fn request_path(&self, destination: &DestinationHash) -> Result<(), TransportError> {
        match self.call(Request::PathRequest(*destination)).await? {
            Reply::PathRequestAck => {
                debug!(destination = %destination, "Path request accepted");
                Ok(())
            }
            other => Err(unexpected("path request ack", &other)),
        }
    }

    async fn hops_to(&self, destination: &DestinationHash) -> Result<Option<u8>, TransportError> {
        Ok(self.path_info(destination).await?.hops)
    }

    async fn next_hop(
        &self,
        destination: &DestinationHash,
    ) -> Result<Option<NodeAddr>, TransportError> {
        Ok(self.path_info(destination).await?.next_hop)
    }

    async fn next_hop_interface_name(
        &self,
        destination: &DestinationHash,
    ) -> Result<Option<String>, TransportError> {
        Ok(self.path_info(destination).await?.interface)
    }

    async fn recall_identity(
        &self,
        destination: &DestinationHash,
    ) -> Result<Option<PeerIdentity>, TransportError> {
        match self.call(Request::IdentityRecall(*destination)).await? {
            Reply::Identity(identity) => Ok(identity),
            other => Err(unexpected("identity", &other)),
        }
    }

    async fn send(&self, packet: &Packet) -> Result<PacketReceipt, TransportError> {
        let header = packet
            .header()
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        let packet_hash = *packet.hash();
        let (receipt, updater) = receipt_pair(packet_hash, header.destination);

        // Registered before sending: the update may beat the ack
        lock(&self.receipts).insert(packet_hash, updater);

        let acked = match self.call(Request::Send(packet.raw().to_vec())).await {
            Ok(Reply::SendAck(hash)) if hash == packet_hash => Ok(()),
            Ok(Reply::SendAck(hash)) => Err(TransportError::UnexpectedReply(format!(
                "send ack for {} while sending {}",
                hash, packet_hash
            ))),
            Ok(other) => Err(unexpected("send ack", &other)),
            Err(e) => Err(e),
        };

        if let Err(e) = acked {
            lock(&self.receipts).remove(&packet_hash);
            return Err(e);
        }

        debug!(
            packet_hash = %packet_hash,
            destination = %header.destination,
            bytes = packet.len(),
            "Packet handed to shared instance"
        );
        Ok(receipt)
    }

    async fn packet_rssi(&self, packet_hash: &PacketHash) -> Result<Option<f64>, TransportError> {
        Ok(self.packet_metrics(packet_hash).await?.0)
    }

    async fn packet_snr(&self, packet_hash: &PacketHash) -> Result<Option<f64>, TransportError> {
        Ok(self.packet_metrics(packet_hash).await?.1)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unexpected(expected: &str, got: &Reply) -> TransportError {
    TransportError::UnexpectedReply(format!("expected {}, got {:?}", expected, got))
}

/// Apply a receipt update to the registered updater, if any.
fn apply_receipt_update(receipts: &PendingReceipts, update: ReceiptUpdate) {
    let Some(updater) = lock(receipts).remove(&update.packet_hash) else {
        debug!(packet_hash = %update.packet_hash, "Receipt update for unknown packet");
        return;
    };

    match update.status {
        ReceiptStatus::Delivered => {
            updater.deliver(update.proof);
        }
        ReceiptStatus::Failed | ReceiptStatus::InFlight => {
            updater.fail();
        }
    }
    debug!(packet_hash = %update.packet_hash, status = %update.status, "Receipt resolved");
}

/// Control receive loop - runs as a spawned task.
async fn control_receive_loop(
    socket: Arc<UdpSocket>,
    pending: PendingReplies,
    receipts: PendingReceipts,
    mtu: usize,
) {
    // Buffer with headroom for the control prefix
    let mut buf = vec![0u8; mtu + 100];

    debug!("Control receive loop starting");

    loop {
        let len = match socket.recv(&mut buf).await {
            Ok(len) => len,
            Err(e) => {
                // Log error but continue - transient errors are expected
                warn!(error = %e, "Control receive error");
                continue;
            }
        };

        match ControlMessage::decode(&buf[..len]) {
            Ok(ControlMessage::Reply { request_id, reply }) => {
                match lock(&pending).remove(&request_id) {
                    Some(tx) => {
                        let _ = tx.send(reply);
                    }
                    None => debug!(request_id, "Reply for unknown or expired request"),
                }
            }
            Ok(ControlMessage::Receipt(update)) => apply_receipt_update(&receipts, update),
            Ok(ControlMessage::Request { request_id, .. }) => {
                debug!(request_id, "Ignoring request from shared instance");
            }
            Err(e) => warn!(error = %e, bytes = len, "Malformed control message"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
