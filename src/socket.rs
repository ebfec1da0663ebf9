use std::net::SocketAddr;

use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use tokio::net::UdpSocket;
use tracing::trace;

use crate::error::ProtocolError;

/// This is an abstraction for the single datagram socket shared by all protocol logic,
///  introduced to facilitate mocking the I/O part away for testing
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DatagramSocket: Send + Sync + 'static {
    async fn send_packet(&self, to: SocketAddr, packet: &[u8]) -> Result<(), ProtocolError>;

    async fn recv_packet(&self) -> Result<(Vec<u8>, SocketAddr), ProtocolError>;

    fn local_addr(&self) -> SocketAddr;
}

/// The process' one bound UDP socket.
pub struct BoundSocket {
    socket: UdpSocket,
    max_packet_len: usize,
}

impl BoundSocket {
    pub fn new(socket: UdpSocket, max_packet_len: usize) -> BoundSocket {
        BoundSocket {
            socket,
            max_packet_len,
        }
    }
}

#[async_trait]
impl DatagramSocket for BoundSocket {
    async fn send_packet(&self, to: SocketAddr, packet: &[u8]) -> Result<(), ProtocolError> {
        trace!("sending packet of {} bytes to {:?}", packet.len(), to);
        self.socket
            .send_to(packet, to)
            .await
            .map_err(ProtocolError::CannotSend)?;
        Ok(())
    }

    async fn recv_packet(&self) -> Result<(Vec<u8>, SocketAddr), ProtocolError> {
        let mut buf = vec![0u8; self.max_packet_len];
        let (num_read, from) = self.socket
            .recv_from(&mut buf)
            .await
            .map_err(ProtocolError::CannotReceive)?;
        buf.truncate(num_read);
        trace!("received packet of {} bytes from {:?}", num_read, from);
        Ok((buf, from))
    }

    fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
            .expect("UdpSocket should have an initialized local addr")
    }
}

/// Blocks until a datagram from `expected` arrives, silently skipping datagrams from any
///  other origin, or until the transport itself fails.
///
/// NB: There is no timeout here - a lost datagram with a silent peer blocks forever.
pub async fn receive_from_peer(
    socket: &dyn DatagramSocket,
    expected: SocketAddr,
) -> Result<Vec<u8>, ProtocolError> {
    loop {
        let (packet, from) = socket.recv_packet().await?;
        if from == expected {
            return Ok(packet);
        }
        trace!("skipping packet from {:?} while waiting for {:?}", from, expected);
    }
}
