//! Shared-Instance Control Protocol
//!
//! Datagrams exchanged between a probe and the local shared instance that
//! owns the mesh interfaces. Every message starts with a 5-byte prefix:
//!
//! ```text
//! [msg_type:1][request_id:4 LE][body...]
//! ```
//!
//! Replies echo the request_id of the request they answer. Receipt updates
//! are unsolicited and carry request_id 0.
//!
//! | Type | Direction | Message          | Body                                   |
//! |------|-----------|------------------|----------------------------------------|
//! | 0x01 | req       | PathQuery        | `[dest:16]`                            |
//! | 0x02 | req       | PathRequest      | `[dest:16]`                            |
//! | 0x03 | req       | IdentityRecall   | `[dest:16]`                            |
//! | 0x04 | req       | Send             | `[frame...]`                           |
//! | 0x05 | req       | PacketLog        | `[packet_hash:32]`                     |
//! | 0x81 | reply     | PathInfo         | see [`encode_path_info`]               |
//! | 0x82 | reply     | PathRequestAck   | empty                                  |
//! | 0x83 | reply     | Identity         | `[present:1][pubkey:32]?`              |
//! | 0x84 | reply     | SendAck          | `[packet_hash:32]`                     |
//! | 0x85 | reply     | PacketMetrics    | `[metrics:17]`                         |
//! | 0x90 | push      | ReceiptUpdate    | `[packet_hash:32][status:1][proof...]` |
//! | 0xFF | reply     | Error            | `[reason utf8...]`                     |

use thiserror::Error;

use super::PathInfo;
use crate::address::{DestinationHash, TRUNCATED_HASH_LEN};
use crate::identity::{NodeAddr, PeerIdentity};
use crate::packet::{PACKET_HASH_LEN, PacketHash};
use crate::receipt::{ProofPacket, ReceiptStatus};

// ============================================================================
// Constants
// ============================================================================

/// Size of the common message prefix.
pub const PREFIX_SIZE: usize = 5;

pub const MSG_PATH_QUERY: u8 = 0x01;
pub const MSG_PATH_REQUEST: u8 = 0x02;
pub const MSG_IDENTITY_RECALL: u8 = 0x03;
pub const MSG_SEND: u8 = 0x04;
pub const MSG_PACKET_LOG: u8 = 0x05;
pub const MSG_PATH_INFO: u8 = 0x81;
pub const MSG_PATH_REQUEST_ACK: u8 = 0x82;
pub const MSG_IDENTITY: u8 = 0x83;
pub const MSG_SEND_ACK: u8 = 0x84;
pub const MSG_PACKET_METRICS: u8 = 0x85;
pub const MSG_RECEIPT_UPDATE: u8 = 0x90;
pub const MSG_ERROR: u8 = 0xFF;

/// Hops value meaning "unknown".
const HOPS_UNKNOWN: u8 = 0xFF;

/// Metrics flag: RSSI field is valid.
const METRIC_RSSI: u8 = 0x01;
/// Metrics flag: SNR field is valid.
const METRIC_SNR: u8 = 0x02;

/// Encoded metrics block: flags + two f64 LE.
const METRICS_SIZE: usize = 1 + 8 + 8;

const STATUS_DELIVERED: u8 = 0x01;
const STATUS_FAILED: u8 = 0x02;

/// Errors decoding control messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("invalid message type: 0x{0:02x}")]
    InvalidMessageType(u8),

    #[error("message too short: expected at least {expected}, got {got}")]
    MessageTooShort { expected: usize, got: usize },

    #[error("malformed message: {0}")]
    Malformed(String),
}

// ============================================================================
// Message Types
// ============================================================================

/// Requests sent by the probe.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    PathQuery(DestinationHash),
    PathRequest(DestinationHash),
    IdentityRecall(DestinationHash),
    Send(Vec<u8>),
    PacketLog(PacketHash),
}

/// Replies from the shared instance.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    PathInfo(PathInfo),
    PathRequestAck,
    Identity(Option<PeerIdentity>),
    SendAck(PacketHash),
    PacketMetrics { rssi: Option<f64>, snr: Option<f64> },
    Error(String),
}

/// Unsolicited notice that a sent packet's receipt reached a terminal state.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceiptUpdate {
    pub packet_hash: PacketHash,
    pub status: ReceiptStatus,
    pub proof: Option<ProofPacket>,
}

/// Any control-protocol datagram.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlMessage {
    Request { request_id: u32, request: Request },
    Reply { request_id: u32, reply: Reply },
    Receipt(ReceiptUpdate),
}

impl ControlMessage {
    fn msg_type(&self) -> u8 {
        match self {
            ControlMessage::Request { request, .. } => match request {
                Request::PathQuery(_) => MSG_PATH_QUERY,
                Request::PathRequest(_) => MSG_PATH_REQUEST,
                Request::IdentityRecall(_) => MSG_IDENTITY_RECALL,
                Request::Send(_) => MSG_SEND,
                Request::PacketLog(_) => MSG_PACKET_LOG,
            },
            ControlMessage::Reply { reply, .. } => match reply {
                Reply::PathInfo(_) => MSG_PATH_INFO,
                Reply::PathRequestAck => MSG_PATH_REQUEST_ACK,
                Reply::Identity(_) => MSG_IDENTITY,
                Reply::SendAck(_) => MSG_SEND_ACK,
                Reply::PacketMetrics { .. } => MSG_PACKET_METRICS,
                Reply::Error(_) => MSG_ERROR,
            },
            ControlMessage::Receipt(_) => MSG_RECEIPT_UPDATE,
        }
    }

    fn request_id(&self) -> u32 {
        match self {
            ControlMessage::Request { request_id, .. } | ControlMessage::Reply { request_id, .. } => {
                *request_id
            }
            ControlMessage::Receipt(_) => 0,
        }
    }

    /// Encode as a datagram.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.push(self.msg_type());
        buf.extend_from_slice(&self.request_id().to_le_bytes());

        match self {
            ControlMessage::Request { request, .. } => match request {
                Request::PathQuery(dest)
                | Request::PathRequest(dest)
                | Request::IdentityRecall(dest) => buf.extend_from_slice(dest.as_bytes()),
                Request::Send(frame) => buf.extend_from_slice(frame),
                Request::PacketLog(hash) => buf.extend_from_slice(hash.as_bytes()),
            },
            ControlMessage::Reply { reply, .. } => match reply {
                Reply::PathInfo(info) => encode_path_info(info, &mut buf),
                Reply::PathRequestAck => {}
                Reply::Identity(identity) => match identity {
                    Some(identity) => {
                        buf.push(1);
                        buf.extend_from_slice(&identity.pubkey().serialize());
                    }
                    None => buf.push(0),
                },
                Reply::SendAck(hash) => buf.extend_from_slice(hash.as_bytes()),
                Reply::PacketMetrics { rssi, snr } => encode_metrics(*rssi, *snr, &mut buf),
                Reply::Error(reason) => buf.extend_from_slice(reason.as_bytes()),
            },
            ControlMessage::Receipt(update) => {
                buf.extend_from_slice(update.packet_hash.as_bytes());
                buf.push(match update.status {
                    ReceiptStatus::Delivered => STATUS_DELIVERED,
                    // An in-flight update is never sent; treat as failed
                    ReceiptStatus::Failed | ReceiptStatus::InFlight => STATUS_FAILED,
                });
                match &update.proof {
                    Some(proof) => {
                        buf.push(1);
                        buf.extend_from_slice(proof.packet_hash.as_bytes());
                        encode_metrics(proof.rssi, proof.snr, &mut buf);
                    }
                    None => buf.push(0),
                }
            }
        }

        buf
    }

    /// Decode a datagram.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < PREFIX_SIZE {
            return Err(WireError::MessageTooShort {
                expected: PREFIX_SIZE,
                got: data.len(),
            });
        }

        let msg_type = data[0];
        let request_id = u32::from_le_bytes([data[1], data[2], data[3], data[4]]);
        let mut body = Reader::new(&data[PREFIX_SIZE..], PREFIX_SIZE);

        let message = match msg_type {
            MSG_PATH_QUERY => request(request_id, Request::PathQuery(body.destination()?)),
            MSG_PATH_REQUEST => request(request_id, Request::PathRequest(body.destination()?)),
            MSG_IDENTITY_RECALL => {
                request(request_id, Request::IdentityRecall(body.destination()?))
            }
            MSG_SEND => request(request_id, Request::Send(body.rest().to_vec())),
            MSG_PACKET_LOG => request(request_id, Request::PacketLog(body.packet_hash()?)),
            MSG_PATH_INFO => reply(request_id, Reply::PathInfo(decode_path_info(&mut body)?)),
            MSG_PATH_REQUEST_ACK => reply(request_id, Reply::PathRequestAck),
            MSG_IDENTITY => {
                let identity = match body.u8()? {
                    0 => None,
                    _ => Some(
                        PeerIdentity::from_slice(body.take(32)?)
                            .map_err(|e| WireError::Malformed(e.to_string()))?,
                    ),
                };
                reply(request_id, Reply::Identity(identity))
            }
            MSG_SEND_ACK => reply(request_id, Reply::SendAck(body.packet_hash()?)),
            MSG_PACKET_METRICS => {
                let (rssi, snr) = body.metrics()?;
                reply(request_id, Reply::PacketMetrics { rssi, snr })
            }
            MSG_RECEIPT_UPDATE => {
                let packet_hash = body.packet_hash()?;
                let status = match body.u8()? {
                    STATUS_DELIVERED => ReceiptStatus::Delivered,
                    STATUS_FAILED => ReceiptStatus::Failed,
                    other => {
                        return Err(WireError::Malformed(format!(
                            "unknown receipt status {}",
                            other
                        )));
                    }
                };
                let proof = match body.u8()? {
                    0 => None,
                    _ => {
                        let packet_hash = body.packet_hash()?;
                        let (rssi, snr) = body.metrics()?;
                        Some(ProofPacket {
                            packet_hash,
                            rssi,
                            snr,
                        })
                    }
                };
                ControlMessage::Receipt(ReceiptUpdate {
                    packet_hash,
                    status,
                    proof,
                })
            }
            MSG_ERROR => {
                let reason = String::from_utf8_lossy(body.rest()).into_owned();
                reply(request_id, Reply::Error(reason))
            }
            other => return Err(WireError::InvalidMessageType(other)),
        };

        Ok(message)
    }
}

fn request(request_id: u32, request: Request) -> ControlMessage {
    ControlMessage::Request {
        request_id,
        request,
    }
}

fn reply(request_id: u32, reply: Reply) -> ControlMessage {
    ControlMessage::Reply { request_id, reply }
}

/// Encode a PathInfo body.
///
/// Format: `[known:1][hops:1][has_next:1][next_hop:16]?[if_len:1][if_name]`
/// with hops 0xFF for unknown.
pub fn encode_path_info(info: &PathInfo, buf: &mut Vec<u8>) {
    buf.push(info.known as u8);
    buf.push(info.hops.unwrap_or(HOPS_UNKNOWN));
    match &info.next_hop {
        Some(next_hop) => {
            buf.push(1);
            buf.extend_from_slice(next_hop.as_bytes());
        }
        None => buf.push(0),
    }
    let name = info.interface.as_deref().unwrap_or("");
    // Names over 255 bytes are cut back to a whole character
    let mut len = name.len().min(u8::MAX as usize);
    while !name.is_char_boundary(len) {
        len -= 1;
    }
    buf.push(len as u8);
    buf.extend_from_slice(&name.as_bytes()[..len]);
}

fn decode_path_info(body: &mut Reader<'_>) -> Result<PathInfo, WireError> {
    let known = body.u8()? != 0;
    let hops = match body.u8()? {
        HOPS_UNKNOWN => None,
        hops => Some(hops),
    };
    let next_hop = match body.u8()? {
        0 => None,
        _ => Some(
            NodeAddr::from_slice(body.take(TRUNCATED_HASH_LEN)?)
                .map_err(|e| WireError::Malformed(e.to_string()))?,
        ),
    };
    let name_len = body.u8()? as usize;
    let name = body.take(name_len)?;
    let interface = if name.is_empty() {
        None
    } else {
        Some(
            std::str::from_utf8(name)
                .map_err(|_| WireError::Malformed("interface name is not UTF-8".into()))?
                .to_owned(),
        )
    };

    Ok(PathInfo {
        known,
        hops,
        next_hop,
        interface,
    })
}

fn encode_metrics(rssi: Option<f64>, snr: Option<f64>, buf: &mut Vec<u8>) {
    let mut flags = 0u8;
    if rssi.is_some() {
        flags |= METRIC_RSSI;
    }
    if snr.is_some() {
        flags |= METRIC_SNR;
    }
    buf.push(flags);
    buf.extend_from_slice(&rssi.unwrap_or(0.0).to_le_bytes());
    buf.extend_from_slice(&snr.unwrap_or(0.0).to_le_bytes());
}

// ============================================================================
// Body Reader
// ============================================================================

/// Bounds-checked cursor over a message body.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Bytes preceding `data` in the datagram, for error reporting.
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], offset: usize) -> Self {
        Self {
            data,
            pos: 0,
            offset,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if self.data.len() - self.pos < len {
            return Err(WireError::MessageTooShort {
                expected: self.offset + self.pos + len,
                got: self.offset + self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    fn f64(&mut self) -> Result<f64, WireError> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(f64::from_le_bytes(bytes))
    }

    fn destination(&mut self) -> Result<DestinationHash, WireError> {
        let mut bytes = [0u8; TRUNCATED_HASH_LEN];
        bytes.copy_from_slice(self.take(TRUNCATED_HASH_LEN)?);
        Ok(DestinationHash::from_bytes(bytes))
    }

    fn packet_hash(&mut self) -> Result<PacketHash, WireError> {
        let mut bytes = [0u8; PACKET_HASH_LEN];
        bytes.copy_from_slice(self.take(PACKET_HASH_LEN)?);
        Ok(PacketHash::from_bytes(bytes))
    }

    fn metrics(&mut self) -> Result<(Option<f64>, Option<f64>), WireError> {
        if self.data.len() - self.pos < METRICS_SIZE {
            return Err(WireError::MessageTooShort {
                expected: self.offset + self.pos + METRICS_SIZE,
                got: self.offset + self.data.len(),
            });
        }
        let flags = self.u8()?;
        let rssi = self.f64()?;
        let snr = self.f64()?;
        Ok((
            (flags & METRIC_RSSI != 0).then_some(rssi),
            (flags & METRIC_SNR != 0).then_some(snr),
        ))
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }
}
