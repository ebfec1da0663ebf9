use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::bail;

use crate::frame::OFFSET_DYN_DATA;

/// Theoretical maximum UDP payload over IPv4.
const UDP_PAYLOAD_MAX: usize = 65507;

/// A frame must at least hold the full header (checksum, version, flags, sequence
///  number, acknowledgment number) plus one payload byte.
const FRAME_LEN_MIN: usize = OFFSET_DYN_DATA + 2 * size_of::<u32>() + 1;

pub struct Config {
    pub bind_addr: SocketAddr,

    /// The fixed frame capacity (the `BUFLEN` of the wire format). Since a bulk transfer
    ///  must fit its whole payload into one frame and stream fragments are cut to this
    ///  size, this is the protocol's MTU - it must be supported by all network hops
    ///  between the peers, and both sides should agree on it.
    ///
    /// With full Ethernet frames and no optional IP headers, the usable UDP payload is
    ///  `1500 - 20 - 8 = 1472` bytes for IPv4. Choosing this value too big causes
    ///  packets to be dropped; choosing it too small wastes bandwidth.
    pub max_frame_len: usize,

    /// Where the receiver persists completed transfers, one uniquely named file per
    ///  session.
    pub output_dir: PathBuf,
}

impl Config {
    pub fn default_ipv4(bind_addr: SocketAddr) -> Config {
        Config {
            bind_addr,
            max_frame_len: 1472,
            output_dir: PathBuf::from("received"),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_frame_len < FRAME_LEN_MIN {
            bail!("frame length {} is too small to hold a full header and any payload", self.max_frame_len);
        }
        if self.max_frame_len > UDP_PAYLOAD_MAX {
            bail!("frame length {} exceeds the maximum UDP payload", self.max_frame_len);
        }
        Ok(())
    }
}
