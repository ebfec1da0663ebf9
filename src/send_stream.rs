use std::net::SocketAddr;

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::convert::SafeCast;
use crate::error::ProtocolError;
use crate::frame::{FrameCodec, FrameFlags, Message};
use crate::socket::{receive_from_peer, DatagramSocket};

/// The peer must make progress within this many unchanged acknowledgements; the
///  duplicate that reaches the cap fails the transfer.
const MAX_DUPLICATE_ACKS: u8 = 10;

/// Sender-side progress of a stream transfer: cumulative bytes confirmed by the peer
///  (monotonically non-decreasing), the duplicate-acknowledgement counter, and the total
///  payload length.
struct TransferState {
    acked: u32,
    dup_acks: u8,
    total: u32,
}

enum AckOutcome {
    /// the peer confirmed more bytes - continue with the next fragment
    Advanced,
    /// the peer repeated its last acknowledgement - resend the identical fragment
    Duplicate,
    /// the peer confirmed the whole payload
    Complete,
}

impl TransferState {
    fn new(total: u32) -> TransferState {
        TransferState {
            acked: 0,
            dup_acks: 0,
            total,
        }
    }

    /// Applies one acknowledgement number from the peer to the transfer state.
    fn on_ack(&mut self, ack_num: u32) -> Result<AckOutcome, ProtocolError> {
        if ack_num < self.acked {
            // a correct peer never takes back an acknowledgement
            return Err(ProtocolError::AckNumberDecreased);
        }
        if ack_num == self.acked {
            self.dup_acks += 1;
            if self.dup_acks == MAX_DUPLICATE_ACKS {
                return Err(ProtocolError::TooManyRetransmissions);
            }
            return Ok(AckOutcome::Duplicate);
        }
        if ack_num == self.total {
            return Ok(AckOutcome::Complete);
        }
        if ack_num > self.total {
            // acknowledging bytes that were never sent
            return Err(ProtocolError::WrongAckNumber(ack_num));
        }
        self.dup_acks = 0;
        self.acked = ack_num;
        Ok(AckOutcome::Advanced)
    }
}

/// Stop-and-wait stream transfer with a window of one fragment in flight: SYN handshake,
///  sequential DAT fragments with cumulative acknowledgements, FIN on the last fragment.
///
/// Retransmission is driven purely by the receiver repeating an unchanged
///  acknowledgement; there is no timer, so a silent peer blocks the transfer forever.
pub(crate) async fn send_stream(
    socket: &dyn DatagramSocket,
    codec: &FrameCodec,
    peer: SocketAddr,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    let total: u32 = payload.len()
        .try_into()
        .map_err(|_| ProtocolError::Unclassified(
            format!("payload of {} bytes exceeds the sequence number space", payload.len()),
        ))?;

    debug!("starting stream transfer of {} bytes to {:?}", total, peer);
    handshake(socket, codec, peer).await?;

    let mut state = TransferState::new(total);
    let mut frame = BytesMut::with_capacity(codec.max_frame_len());
    loop {
        let fragment_len = codec.encode(
            FrameFlags::DAT,
            state.acked,
            0,
            &payload[state.acked.safe_cast()..],
            &mut frame,
        )?;
        if state.acked.safe_cast() + fragment_len == payload.len() {
            FrameCodec::append_fin(&mut frame);
        }
        trace!("fragment at offset {} carries {} bytes", state.acked, fragment_len);

        // resend the identical frame on duplicate acknowledgements, do not re-encode
        loop {
            socket.send_packet(peer, &frame).await?;

            let reply = codec.decode(&receive_from_peer(socket, peer).await?)?;
            let ack_num = require_ack(&reply)?;

            match state.on_ack(ack_num)? {
                AckOutcome::Advanced => break,
                AckOutcome::Duplicate => {
                    debug!("duplicate ack {} from {:?} ({} of {})", ack_num, peer, state.dup_acks, MAX_DUPLICATE_ACKS);
                }
                AckOutcome::Complete => {
                    debug!("stream transfer of {} bytes to {:?} complete", total, peer);
                    return Ok(());
                }
            }
        }
    }
}

/// SYN exchange establishing the session. The reply must acknowledge zero bytes.
async fn handshake(
    socket: &dyn DatagramSocket,
    codec: &FrameCodec,
    peer: SocketAddr,
) -> Result<(), ProtocolError> {
    let mut frame = BytesMut::with_capacity(codec.max_frame_len());
    codec.encode(FrameFlags::SYN, 0, 0, &[], &mut frame)?;
    socket.send_packet(peer, &frame).await?;

    let reply = codec.decode(&receive_from_peer(socket, peer).await?)?;
    if !reply.flags.contains(FrameFlags::ACK) {
        debug!("peer {:?} answered the handshake without an ack: {:?}", peer, reply);
        return Err(ProtocolError::NoAckReceived);
    }
    match reply.ack_num {
        Some(0) => Ok(()),
        Some(ack_num) => Err(ProtocolError::WrongAckNumber(ack_num)),
        None => Err(ProtocolError::NoAckReceived),
    }
}

fn require_ack(reply: &Message) -> Result<u32, ProtocolError> {
    if !reply.flags.contains(FrameFlags::ACK) {
        return Err(ProtocolError::WrongFlag(reply.flags));
    }
    reply.ack_num
        .ok_or(ProtocolError::WrongFlag(reply.flags))
}
