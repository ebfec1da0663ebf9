use std::net::SocketAddr;

use bytes::BytesMut;
use tracing::debug;

use crate::convert::PrecheckedCast;
use crate::error::ProtocolError;
use crate::frame::{FrameCodec, FrameFlags};
use crate::socket::{receive_from_peer, DatagramSocket};

/// Single-round-trip bulk transfer: one BLK frame carrying the whole payload, one ACK
///  back. There is no retransmission in this mode - a lost datagram in either direction
///  makes the exchange fail or block.
pub(crate) async fn send_block(
    socket: &dyn DatagramSocket,
    codec: &FrameCodec,
    peer: SocketAddr,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    debug!("sending {} bytes to {:?} as a single block", payload.len(), peer);

    let mut frame = BytesMut::with_capacity(codec.max_frame_len());
    codec.encode(FrameFlags::BLK, 0, 0, payload, &mut frame)?;
    socket.send_packet(peer, &frame).await?;

    let reply = codec.decode(&receive_from_peer(socket, peer).await?)?;

    // the payload fits one frame, so its length trivially fits the sequence space
    let total: u32 = payload.len().prechecked_cast();
    if !reply.flags.contains(FrameFlags::ACK) || reply.ack_num != Some(total) {
        debug!("peer {:?} did not acknowledge the block: {:?}", peer, reply);
        return Err(ProtocolError::NoAckReceived);
    }

    debug!("block of {} bytes acknowledged by {:?}", payload.len(), peer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::MockDatagramSocket;
    use mockall::predicate::eq;
    use rstest::rstest;

    const PEER: ([u8; 4], u16) = ([127, 0, 0, 1], 9999);

    fn codec() -> FrameCodec {
        FrameCodec::new(512)
    }

    fn ack_frame(ack_num: u32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        codec().encode(FrameFlags::ACK, 0, ack_num, &[], &mut buf).unwrap();
        buf.to_vec()
    }

    #[tokio::test]
    async fn test_block_acknowledged() {
        let codec = codec();
        let mut expected_frame = BytesMut::new();
        codec.encode(FrameFlags::BLK, 0, 0, b"Test123", &mut expected_frame).unwrap();

        let mut socket = MockDatagramSocket::new();
        socket.expect_send_packet()
            .with(eq(SocketAddr::from(PEER)), eq(expected_frame.to_vec()))
            .times(1)
            .returning(|_, _| Ok(()));
        socket.expect_recv_packet()
            .times(1)
            .returning(|| Ok((ack_frame(7), SocketAddr::from(PEER))));

        send_block(&socket, &codec, SocketAddr::from(PEER), b"Test123").await.unwrap();
    }

    #[tokio::test]
    async fn test_packets_from_other_hosts_are_skipped() {
        let mut socket = MockDatagramSocket::new();
        socket.expect_send_packet().returning(|_, _| Ok(()));
        let mut replies = vec![
            (ack_frame(3), SocketAddr::from(([10, 0, 0, 1], 1234))),
            (ack_frame(3), SocketAddr::from(PEER)),
        ].into_iter();
        socket.expect_recv_packet()
            .times(2)
            .returning(move || Ok(replies.next().unwrap()));

        send_block(&socket, &codec(), SocketAddr::from(PEER), b"abc").await.unwrap();
    }

    #[rstest]
    #[case::wrong_ack_num(ack_frame(6))]
    #[case::missing_ack_flag({
        let mut buf = BytesMut::new();
        codec().encode(FrameFlags::SYN, 0, 0, &[], &mut buf).unwrap();
        buf.to_vec()
    })]
    #[tokio::test]
    async fn test_no_ack_received(#[case] reply: Vec<u8>) {
        let mut socket = MockDatagramSocket::new();
        socket.expect_send_packet().returning(|_, _| Ok(()));
        socket.expect_recv_packet()
            .returning(move || Ok((reply.clone(), SocketAddr::from(PEER))));

        let result = send_block(&socket, &codec(), SocketAddr::from(PEER), b"Test123").await;
        assert!(matches!(result, Err(ProtocolError::NoAckReceived)));
    }

    #[tokio::test]
    async fn test_oversized_payload_is_never_sent() {
        let codec = codec();
        let payload = vec![0u8; codec.max_block_payload() + 1];

        let socket = MockDatagramSocket::new();
        // no expectations: any send or receive would panic the mock

        let result = send_block(&socket, &codec, SocketAddr::from(PEER), &payload).await;
        assert!(matches!(result, Err(ProtocolError::BlockPayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_send_failure() {
        let mut socket = MockDatagramSocket::new();
        socket.expect_send_packet()
            .returning(|_, _| Err(ProtocolError::CannotSend(std::io::Error::other("unreachable"))));

        let result = send_block(&socket, &codec(), SocketAddr::from(PEER), b"x").await;
        assert!(matches!(result, Err(ProtocolError::CannotSend(_))));
    }

    #[tokio::test]
    async fn test_corrupt_reply_is_terminal() {
        let mut socket = MockDatagramSocket::new();
        socket.expect_send_packet().returning(|_, _| Ok(()));
        socket.expect_recv_packet()
            .returning(|| {
                let mut reply = ack_frame(1);
                reply[5] ^= 0x01;
                Ok((reply, SocketAddr::from(PEER)))
            });

        let result = send_block(&socket, &codec(), SocketAddr::from(PEER), b"x").await;
        assert!(matches!(result, Err(ProtocolError::ChecksumMismatch)));
    }
}
