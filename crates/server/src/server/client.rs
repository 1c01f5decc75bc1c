//! Client session state.

use bytes::{Bytes, BytesMut};
use protocol::packets::{ClientPacket, LoginRequest};
use protocol::{GamePacket, IsaacRandom, PacketEncoder, ProtocolError};
use std::net::SocketAddr;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Identifies one accepted connection for its whole lifetime.
pub type ConnectionId = u32;

/// Messages from connection tasks to the game loop.
#[derive(Debug)]
pub enum Inbound {
    /// Handshake complete; place a player for this connection.
    Login {
        connection: ConnectionId,
        addr: SocketAddr,
        request: LoginRequest,
        outbound: mpsc::Sender<Bytes>,
    },
    /// A parsed packet from a logged in connection.
    Packet {
        connection: ConnectionId,
        packet: ClientPacket,
    },
    /// The socket closed or failed.
    Disconnected { connection: ConnectionId },
}

/// Why a tick's output could not be handed to a connection.
#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error("Outbound buffer full")]
    Full,
    #[error("Connection closed")]
    Closed,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// The game loop's side of a logged in connection.
#[derive(Debug)]
pub struct Session {
    pub connection: ConnectionId,
    pub addr: SocketAddr,
    /// Player index in the world.
    pub player: u16,
    encoder: PacketEncoder,
    tx: mpsc::Sender<Bytes>,
}

impl Session {
    pub fn new(
        connection: ConnectionId,
        addr: SocketAddr,
        player: u16,
        request: &LoginRequest,
        tx: mpsc::Sender<Bytes>,
    ) -> Self {
        Self {
            connection,
            addr,
            player,
            encoder: PacketEncoder::new(IsaacRandom::new(&request.encoder_seeds())),
            tx,
        }
    }

    /// Frame `packets` and hand them to the connection as one message.
    ///
    /// Never waits: a connection that cannot keep up is reported as full.
    pub fn flush(&mut self, packets: &[GamePacket]) -> Result<usize, FlushError> {
        if packets.is_empty() {
            return Ok(0);
        }
        let mut buf = BytesMut::new();
        for packet in packets {
            self.encoder.encode(packet, &mut buf)?;
        }
        let len = buf.len();
        match self.tx.try_send(buf.freeze()) {
            Ok(()) => Ok(len),
            Err(TrySendError::Full(_)) => Err(FlushError::Full),
            Err(TrySendError::Closed(_)) => Err(FlushError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::packets::build_set_map_flag;
    use protocol::PacketDecoder;

    fn session(buffer: usize) -> (Session, mpsc::Receiver<Bytes>, LoginRequest) {
        let request = LoginRequest {
            seeds: [1, 2, 3, 4],
            username: "alice".into(),
        };
        let (tx, rx) = mpsc::channel(buffer);
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        (Session::new(1, addr, 1, &request, tx), rx, request)
    }

    #[test]
    fn test_flush_frames_whole_tick_as_one_message() {
        let (mut session, mut rx, request) = session(4);
        let packets = [build_set_map_flag(1, 2), build_set_map_flag(3, 4)];
        assert_eq!(session.flush(&packets).unwrap(), 6);
        let message = rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());

        // The client's view of the server keystream.
        let mut decoder = PacketDecoder::new(IsaacRandom::new(&request.encoder_seeds()));
        let (opcode, payload) = decoder.decode(&message[..3]).unwrap();
        assert_eq!(opcode, packets[0].opcode);
        assert_eq!(&payload[..], &[1, 2]);
    }

    #[test]
    fn test_empty_tick_sends_nothing() {
        let (mut session, mut rx, _) = session(1);
        assert_eq!(session.flush(&[]).unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_slow_connection_reports_full() {
        let (mut session, _rx, _) = session(1);
        session.flush(&[build_set_map_flag(0, 0)]).unwrap();
        assert!(matches!(
            session.flush(&[build_set_map_flag(0, 0)]),
            Err(FlushError::Full)
        ));
    }

    #[test]
    fn test_closed_connection() {
        let (mut session, rx, _) = session(1);
        drop(rx);
        assert!(matches!(
            session.flush(&[build_set_map_flag(0, 0)]),
            Err(FlushError::Closed)
        ));
    }
}
