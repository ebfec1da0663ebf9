use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::BytesMut;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::convert::PrecheckedCast;
use crate::error::ProtocolError;
use crate::frame::{FrameCodec, FrameFlags};
use crate::socket::DatagramSocket;

/// Reassembly buffer for one session. Growth is an explicit contract: the buffer starts
///  at 1024 bytes of capacity, and the capacity is doubled (repeatedly, if necessary)
///  whenever an append would overflow it.
pub(crate) struct ReceiveBuffer {
    data: Vec<u8>,
}

impl ReceiveBuffer {
    const INITIAL_CAPACITY: usize = 1024;

    pub fn new() -> ReceiveBuffer {
        ReceiveBuffer {
            data: Vec::with_capacity(Self::INITIAL_CAPACITY),
        }
    }

    pub fn append(&mut self, bytes: &[u8]) {
        let mut capacity = self.data.capacity();
        while capacity - self.data.len() < bytes.len() {
            capacity *= 2;
        }
        if capacity > self.data.capacity() {
            self.data.reserve_exact(capacity - self.data.len());
        }
        self.data.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

/// What a completed session produced: who sent, how much, and where the reassembled
///  payload was persisted.
#[derive(Debug)]
pub struct SessionReport {
    pub peer: SocketAddr,
    pub bytes_received: usize,
    pub artifact: PathBuf,
}

enum SessionKind {
    /// a single BLK frame is the whole transfer
    Bulk,
    /// SYN handshake, sequential DAT fragments, FIN termination
    Stream,
}

/// Single-connection receiver: locks onto the address of the first datagram it sees,
///  validates and reassembles the payload, drives cumulative acknowledgements, and
///  persists the result when the session reaches FIN (stream) or its one BLK frame
///  (bulk).
pub struct ReceiveStream {
    socket: Arc<dyn DatagramSocket>,
    codec: FrameCodec,
    output_dir: PathBuf,
}

impl ReceiveStream {
    pub fn new(socket: Arc<dyn DatagramSocket>, codec: FrameCodec, output_dir: PathBuf) -> ReceiveStream {
        ReceiveStream {
            socket,
            codec,
            output_dir,
        }
    }

    /// Processes one peer session to completion. Intended to be called in a loop by the
    ///  surrounding process; an error aborts the current session, not the process.
    pub async fn receive_once(&self) -> Result<SessionReport, ProtocolError> {
        let mut peer: Option<SocketAddr> = None;
        let mut buffer = ReceiveBuffer::new();
        let mut amount_received: u32 = 0;
        let mut kind: Option<SessionKind> = None;

        info!("waiting for a connection");
        loop {
            let (raw, from) = self.socket.recv_packet().await?;

            // lock onto the first origin seen; everything else is discarded unanswered
            let bound_peer = match peer {
                None => {
                    info!("accepted session from {:?}", from);
                    peer = Some(from);
                    from
                }
                Some(bound) if bound == from => bound,
                Some(bound) => {
                    trace!("discarding packet from {:?} while bound to {:?}", from, bound);
                    continue;
                }
            };

            let message = match self.codec.decode(&raw) {
                Ok(message) => message,
                Err(ProtocolError::ChecksumMismatch) => {
                    debug!("corrupted packet from {:?} - repeating ack {}", bound_peer, amount_received);
                    self.send_ack(bound_peer, amount_received).await?;
                    continue;
                }
                Err(e) => {
                    warn!("unusable packet from {:?} - aborting session: {}", bound_peer, e);
                    return Err(e);
                }
            };

            if let Some(seq_num) = message.seq_num {
                if seq_num != amount_received {
                    debug!(
                        "fragment from {:?} has sequence number {} but {} bytes are confirmed - repeating ack",
                        bound_peer, seq_num, amount_received,
                    );
                    self.send_ack(bound_peer, amount_received).await?;
                    continue;
                }
            }

            let mut session_ends = message.flags.contains(FrameFlags::FIN);
            if kind.is_none() {
                if message.flags.contains(FrameFlags::BLK) {
                    kind = Some(SessionKind::Bulk);
                    session_ends = true;
                }
                else if message.flags.contains(FrameFlags::SYN) {
                    kind = Some(SessionKind::Stream);
                }
                else {
                    warn!("first packet from {:?} is neither SYN nor BLK: {:?}", bound_peer, message.flags);
                    return Err(ProtocolError::WrongFlag(message.flags));
                }
            }

            buffer.append(&message.payload);
            amount_received = amount_received
                .checked_add(message.payload.len().prechecked_cast())
                .ok_or_else(|| ProtocolError::Unclassified("sequence number space exhausted".to_string()))?;
            self.send_ack(bound_peer, amount_received).await?;

            if session_ends {
                let artifact = self.persist(buffer.as_slice()).await?;
                info!("received {} bytes from {:?} into {:?}", buffer.len(), bound_peer, artifact);
                return Ok(SessionReport {
                    peer: bound_peer,
                    bytes_received: buffer.len(),
                    artifact,
                });
            }
        }
    }

    async fn send_ack(&self, peer: SocketAddr, amount_received: u32) -> Result<(), ProtocolError> {
        let mut frame = BytesMut::with_capacity(self.codec.max_frame_len());
        self.codec.encode(FrameFlags::ACK, 0, amount_received, &[], &mut frame)?;
        self.socket.send_packet(peer, &frame).await
    }

    async fn persist(&self, data: &[u8]) -> Result<PathBuf, ProtocolError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(persist_error)?;
        let path = self.output_dir.join(format!("recvd.{}", Uuid::new_v4()));
        tokio::fs::write(&path, data).await.map_err(persist_error)?;
        Ok(path)
    }
}

fn persist_error(e: std::io::Error) -> ProtocolError {
    ProtocolError::Unclassified(format!("could not persist received data: {}", e))
}
