use std::net::AddrParseError;

use thiserror::Error;

use crate::frame::FrameFlags;

/// The protocol's error taxonomy. Local recoverable conditions (a corrupted or
///  mis-sequenced incoming packet during an active transfer) never surface here - they are
///  absorbed by repeated acknowledgements and the duplicate-ack counter. Everything below
///  is terminal for the current operation and reported to the caller.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("incompatible protocol version {0}")]
    VersionIncompatible(u8),

    #[error("received packet is too short")]
    PacketTooShort,

    #[error("packet checksum mismatch")]
    ChecksumMismatch,

    #[error("block payload of {payload_len} bytes exceeds the frame capacity of {capacity} bytes")]
    BlockPayloadTooLarge { payload_len: usize, capacity: usize },

    #[error("cannot send packet: {0}")]
    CannotSend(#[source] std::io::Error),

    #[error("cannot receive packet: {0}")]
    CannotReceive(#[source] std::io::Error),

    #[error("peer replied with wrong flags {0:?}")]
    WrongFlag(FrameFlags),

    #[error("peer's acknowledgment number decreased")]
    AckNumberDecreased,

    #[error("no acknowledgment received")]
    NoAckReceived,

    #[error("wrong acknowledgment number {0}")]
    WrongAckNumber(u32),

    #[error("too many retransmissions")]
    TooManyRetransmissions,

    #[error("cannot parse peer address: {0}")]
    AddressParse(#[from] AddrParseError),

    #[error("unclassified failure: {0}")]
    Unclassified(String),
}
