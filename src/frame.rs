use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use bytes_varint::try_get_fixed::TryGetFixedSupport;
use tracing::trace;

use crate::checksum::Checksum;
use crate::error::ProtocolError;

/// The single supported protocol version. A frame carrying any other version byte is
///  rejected on decode, before any of its fields are interpreted.
pub const PROTOCOL_VERSION: u8 = 1;

pub const OFFSET_CHECKSUM: usize = 0;
pub const OFFSET_VERSION: usize = 4;
pub const OFFSET_FLAGS: usize = 5;
/// Start of the variable region: optional sequence number, optional acknowledgment
///  number, optional payload - in that order.
pub const OFFSET_DYN_DATA: usize = 6;

const SEQ_NUM_LEN: usize = size_of::<u32>();
const ACK_NUM_LEN: usize = size_of::<u32>();

bitflags! {
    /// The frame's 8-bit flag set. RST and the two reserved bits are part of the wire
    ///  layout but not interpreted by any of the current logic; the codec round-trips
    ///  them untouched.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct FrameFlags: u8 {
        const SYN = 1;
        const ACK = 2;
        const FIN = 4;
        const RST = 8;
        const DAT = 16;
        const BLK = 32;
        const RESERVED_7 = 64;
        const RESERVED_8 = 128;
    }
}

impl FrameFlags {
    /// A sequence number is on the wire iff the frame is a stream data fragment - DAT
    ///  set and BLK unset. Bulk frames are sequence-free by design.
    pub fn has_seq_num(&self) -> bool {
        self.contains(FrameFlags::DAT) && !self.contains(FrameFlags::BLK)
    }

    pub fn has_payload(&self) -> bool {
        self.intersects(FrameFlags::DAT | FrameFlags::BLK)
    }
}

/// The decoded logical form of a frame. `seq_num` and `ack_num` are `Some` exactly when
///  the corresponding field was present on the wire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub flags: FrameFlags,
    pub seq_num: Option<u32>,
    pub ack_num: Option<u32>,
    pub payload: Vec<u8>,
}

/// Encodes logical messages into wire frames of at most `max_frame_len` bytes, and
///  decodes / validates received frames back into their logical form.
///
/// The checksum is always written last, over everything after the checksum field, so a
///  frame is internally consistent the moment `encode` returns.
#[derive(Clone, Debug)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl FrameCodec {
    pub fn new(max_frame_len: usize) -> FrameCodec {
        FrameCodec { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Capacity for the payload of a single-frame bulk (BLK) message.
    pub fn max_block_payload(&self) -> usize {
        self.max_frame_len - OFFSET_DYN_DATA
    }

    /// Capacity for the payload of a stream data fragment (DAT, which carries a
    ///  sequence number).
    pub fn max_fragment_payload(&self) -> usize {
        self.max_frame_len - OFFSET_DYN_DATA - SEQ_NUM_LEN
    }

    /// Encodes a frame into `out` (which is cleared first), returning the number of
    ///  payload bytes that were actually encoded.
    ///
    /// A BLK payload must fit into a single frame: if it does not, this fails with
    ///  `BlockPayloadTooLarge` without touching `out`. A DAT payload is instead silently
    ///  truncated to the remaining frame capacity - callers are expected to loop,
    ///  continuing from the returned length, until all bytes are sent.
    pub fn encode(
        &self,
        flags: FrameFlags,
        seq_num: u32,
        ack_num: u32,
        payload: &[u8],
        out: &mut BytesMut,
    ) -> Result<usize, ProtocolError> {
        let mut header_len = OFFSET_DYN_DATA;
        if flags.has_seq_num() {
            header_len += SEQ_NUM_LEN;
        }
        if flags.contains(FrameFlags::ACK) {
            header_len += ACK_NUM_LEN;
        }

        let capacity = self.max_frame_len - header_len;
        let payload_len = if flags.has_payload() {
            if payload.len() <= capacity {
                payload.len()
            }
            else if flags.contains(FrameFlags::BLK) {
                return Err(ProtocolError::BlockPayloadTooLarge {
                    payload_len: payload.len(),
                    capacity,
                });
            }
            else {
                trace!("truncating fragment payload from {} to {} bytes", payload.len(), capacity);
                capacity
            }
        }
        else {
            0
        };

        out.clear();
        out.put_u32(0); // checksum placeholder, overwritten below
        out.put_u8(PROTOCOL_VERSION);
        out.put_u8(flags.bits());
        if flags.has_seq_num() {
            out.put_u32(seq_num);
        }
        if flags.contains(FrameFlags::ACK) {
            out.put_u32(ack_num);
        }
        if flags.has_payload() {
            out.put_slice(&payload[..payload_len]);
        }
        Self::write_checksum(out);

        Ok(payload_len)
    }

    /// Sets the FIN bit in an already-encoded frame and re-derives the checksum in
    ///  place - used to mark the final fragment of a stream without re-encoding it.
    pub fn append_fin(frame: &mut [u8]) {
        frame[OFFSET_FLAGS] |= FrameFlags::FIN.bits();
        Self::write_checksum(frame);
    }

    fn write_checksum(frame: &mut [u8]) {
        let checksum = Checksum::of(&frame[OFFSET_VERSION..]);
        frame[OFFSET_CHECKSUM..OFFSET_VERSION].copy_from_slice(&checksum.0.to_be_bytes());
    }

    /// Decodes and validates a received frame. Validation order: minimum length, then
    ///  checksum over the received region, then protocol version, then the conditional
    ///  fields in the exact order `encode` wrote them.
    pub fn decode(&self, raw: &[u8]) -> Result<Message, ProtocolError> {
        if raw.len() < OFFSET_DYN_DATA {
            return Err(ProtocolError::PacketTooShort);
        }

        let mut buf: &[u8] = raw;
        let declared = Checksum(buf.try_get_u32().map_err(|_| ProtocolError::PacketTooShort)?);
        let actual = Checksum::of(&raw[OFFSET_VERSION..]);
        if declared != actual {
            trace!("checksum mismatch: declared {:?}, actual {:?}", declared, actual);
            return Err(ProtocolError::ChecksumMismatch);
        }

        let version = buf.try_get_u8().map_err(|_| ProtocolError::PacketTooShort)?;
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionIncompatible(version));
        }

        let flags = FrameFlags::from_bits_retain(
            buf.try_get_u8().map_err(|_| ProtocolError::PacketTooShort)?,
        );

        let seq_num = if flags.has_seq_num() {
            Some(buf.try_get_u32().map_err(|_| ProtocolError::PacketTooShort)?)
        }
        else {
            None
        };
        let ack_num = if flags.contains(FrameFlags::ACK) {
            Some(buf.try_get_u32().map_err(|_| ProtocolError::PacketTooShort)?)
        }
        else {
            None
        };
        let payload = if flags.has_payload() {
            buf.to_vec()
        }
        else {
            // trailing bytes after the declared fields are ignored
            Vec::new()
        };

        Ok(Message {
            flags,
            seq_num,
            ack_num,
            payload,
        })
    }
}
