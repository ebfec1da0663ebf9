use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::info;

use crate::config::Config;
use crate::error::ProtocolError;
use crate::frame::FrameCodec;
use crate::receive_stream::{ReceiveStream, SessionReport};
use crate::send_block;
use crate::send_stream;
use crate::socket::{BoundSocket, DatagramSocket};

/// EndPoint is the place where the parts of the protocol come together: it owns the
///  process' single bound UDP socket (there is exactly one transport resource, shared by
///  all logic, created at startup and released on drop) and offers the two send modes
///  plus the receiver loop on top of it.
pub struct EndPoint {
    socket: Arc<dyn DatagramSocket>,
    codec: FrameCodec,
    config: Config,
}

impl EndPoint {
    /// Acquires the transport resource. Failure here is fatal to the caller in a way
    ///  protocol errors are not - there is no protocol without a socket.
    pub async fn bind(config: Config) -> anyhow::Result<EndPoint> {
        config.validate()?;

        let socket = UdpSocket::bind(config.bind_addr).await?;
        info!("bound socket to {:?}", socket.local_addr()?);

        let codec = FrameCodec::new(config.max_frame_len);
        Ok(EndPoint {
            socket: Arc::new(BoundSocket::new(socket, config.max_frame_len)),
            codec,
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    /// Sends a payload that fits into a single frame as one bulk packet and waits for
    ///  its acknowledgement.
    pub async fn send_block(&self, peer_addr: &str, peer_port: u16, data: &[u8]) -> Result<(), ProtocolError> {
        let peer = parse_peer(peer_addr, peer_port)?;
        send_block::send_block(self.socket.as_ref(), &self.codec, peer, data).await
    }

    /// Sends a payload of arbitrary length as a stream of sequential fragments.
    pub async fn send_stream(&self, peer_addr: &str, peer_port: u16, data: &[u8]) -> Result<(), ProtocolError> {
        let peer = parse_peer(peer_addr, peer_port)?;
        send_stream::send_stream(self.socket.as_ref(), &self.codec, peer, data).await
    }

    /// Receives one peer session to completion and persists its payload. The
    ///  surrounding process is expected to call this in a loop; a returned error ends
    ///  the session, not the listener.
    pub async fn receive_once(&self) -> Result<SessionReport, ProtocolError> {
        ReceiveStream::new(
            self.socket.clone(),
            self.codec.clone(),
            self.config.output_dir.clone(),
        ).receive_once().await
    }
}

fn parse_peer(addr: &str, port: u16) -> Result<SocketAddr, ProtocolError> {
    let ip: IpAddr = addr.parse()?;
    Ok(SocketAddr::new(ip, port))
}
