//! RDTP is a minimal reliable-delivery transport layered over unreliable UDP datagrams -
//!  comparable in spirit to a very small TCP, trading throughput and robustness for
//!  simplicity of the state machines.
//!
//! ## Design goals
//!
//! * The abstraction is transferring one *payload* (a defined-length chunk of bytes)
//!   from a sender to a receiver, which persists it as a file
//! * Two transfer modes with different cost profiles:
//!   * *bulk*: payloads that fit a single frame go out as one packet and are confirmed
//!     by one acknowledgement - no handshake, no retransmission
//!   * *stream*: larger payloads are cut into sequential fragments sent stop-and-wait,
//!     one fragment in flight, after a SYN handshake and terminated by a FIN flag
//! * Acknowledgements are *cumulative*: an acknowledgement number is the total number of
//!   bytes the receiver has confirmed so far, never a per-packet identifier
//! * Strictly sequential delivery - a fragment is accepted only if its sequence number
//!   equals the receiver's running byte total; anything else (duplicated, reordered or
//!   corrupted packets) is answered by repeating the current acknowledgement, which is
//!   this protocol's negative-acknowledgement mechanism and its only retransmission
//!   trigger (there are no timers)
//! * The receiver serves one session at a time and *locks on* to the origin address of
//!   the first datagram it sees, silently discarding traffic from anyone else until the
//!   session completes
//! * There is a reliable checksum per frame
//!
//! ## Header
//!
//! Frame layout (inside a UDP packet) - all numbers in network byte order (BE):
//! ```ascii
//! 0:  CRC-32 checksum over the rest of the frame, starting after the checksum: u32
//! 4:  protocol version (u8), currently always 1
//! 5:  flags (8 bits):
//!     * 0x01 SYN: connection start (stream mode)
//!     * 0x02 ACK: the frame carries an acknowledgment number
//!     * 0x04 FIN: final data fragment of a stream
//!     * 0x08 RST: reserved, not interpreted
//!     * 0x10 DAT: data fragment (stream mode) - the frame carries a sequence number
//!     * 0x20 BLK: single-frame bulk payload - no sequence number
//!     * 0x40, 0x80: reserved, should be 0
//! 6:  sequence number (u32): present iff DAT is set and BLK is not
//! *:  acknowledgment number (u32): present iff ACK is set
//! *:  payload: present iff DAT or BLK is set, up to the configured frame capacity
//! ```
//!
//! ## Known limitations
//!
//! * No timeouts: every receive blocks until a matching datagram arrives, so a lost
//!   packet with a silent peer stalls the operation forever. Callers who need an upper
//!   bound can wrap the operations in `tokio::time::timeout` - the
//!   acknowledgement/sequencing semantics do not depend on timing.
//! * No congestion control, no encryption, no concurrent peer sessions.

mod checksum;
pub mod config;
mod convert;
pub mod end_point;
pub mod error;
pub mod frame;
pub mod receive_stream;
mod send_block;
mod send_stream;
pub mod socket;
