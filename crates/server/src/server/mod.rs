//! Game server implementation.

use crate::config::Config;
use crate::template::{RegionKeys, StaticTemplates};
use futures_util::{SinkExt, StreamExt};
use protocol::packets::{ClientPacket, LoginRequest};
use protocol::{IsaacRandom, PacketDecoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};

pub mod client;
pub mod game;

pub use client::{ConnectionId, FlushError, Inbound, Session};
pub use game::{run_game_loop, GameState};

/// Connection tracking state (shared across connection handlers).
struct ConnectionState {
    /// Total number of connections.
    total_connections: usize,
    next_id: ConnectionId,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            total_connections: 0,
            next_id: 1,
        }
    }

    /// Try to add a connection, returns its id if allowed.
    fn try_add_connection(&mut self, max_total: usize) -> Option<ConnectionId> {
        if self.total_connections >= max_total {
            return None;
        }
        self.total_connections += 1;
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        Some(id)
    }

    /// Remove a connection.
    fn remove_connection(&mut self) {
        self.total_connections = self.total_connections.saturating_sub(1);
    }
}

/// Run the game server.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let templates = StaticTemplates::load(config.world.templates.as_deref())?;
    let regions = RegionKeys::load(config.world.region_keys.as_deref(), config.world.allow_missing_keys)?;

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("{} listening on ws://{}", config.server.name, addr);

    // Connection tracking state
    let conn_state = Arc::new(RwLock::new(ConnectionState::new()));

    // Packets from every connection, drained at the start of each tick
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Inbound>();

    // Shared game state
    let tick_interval = config.server.tick_interval_ms;
    let max_connections = config.server.max_connections;
    let outbound_buffer = config.server.outbound_buffer;
    let game_state = Arc::new(RwLock::new(GameState::new(
        config,
        Box::new(templates),
        regions,
        inbound_rx,
    )));

    // Start the game loop
    let game_loop_state = Arc::clone(&game_state);
    tokio::spawn(async move {
        game::run_game_loop(game_loop_state, tick_interval).await;
    });

    loop {
        let (stream, addr) = listener.accept().await?;

        let connection = {
            let mut state = conn_state.write().await;
            state.try_add_connection(max_connections)
        };
        let Some(connection) = connection else {
            warn!("Connection rejected (limit reached): {}", addr);
            continue;
        };

        let conn_state = Arc::clone(&conn_state);
        let inbound_tx = inbound_tx.clone();

        tokio::spawn(async move {
            let result = handle_connection(stream, addr, connection, inbound_tx, outbound_buffer).await;

            // Always remove from connection tracking when done
            {
                let mut state = conn_state.write().await;
                state.remove_connection();
            }

            if let Err(e) = result {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
///
/// The first binary message is the login. Every later one is a single
/// client packet with a scrambled opcode.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection: ConnectionId,
    inbound: mpsc::UnboundedSender<Inbound>,
    outbound_buffer: usize,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New connection from {}", addr);

    let (mut write, mut read) = ws_stream.split();

    let request = loop {
        match read.next().await {
            Some(Ok(Message::Binary(data))) => break LoginRequest::parse(data)?,
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
        }
    };
    info!("{} logging in as {}", addr, request.username);

    let mut decoder = PacketDecoder::new(IsaacRandom::new(&request.decoder_seeds()));
    let (outbound_tx, mut outbound_rx) = mpsc::channel(outbound_buffer.max(1));
    inbound
        .send(Inbound::Login {
            connection,
            addr,
            request,
            outbound: outbound_tx,
        })
        .map_err(|_| anyhow::anyhow!("Game loop stopped"))?;

    // Message loop - inbound packets and the game's per-tick output
    let result = loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        let parsed = decoder
                            .decode(&data)
                            .and_then(|(opcode, payload)| ClientPacket::parse(opcode, payload));
                        match parsed {
                            Ok(packet) => {
                                if inbound.send(Inbound::Packet { connection, packet }).is_err() {
                                    break Ok(());
                                }
                            }
                            Err(e) => warn!("Packet error from {}: {}", addr, e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Client {} disconnected", addr);
                        break Ok(());
                    }
                    Some(Err(e)) => break Err(e.into()),
                    _ => {}
                }
            }
            out = outbound_rx.recv() => {
                match out {
                    Some(bytes) => {
                        if let Err(e) = write.send(Message::Binary(bytes)).await {
                            warn!("Failed to send update to {}: {}", addr, e);
                            break Err(e.into());
                        }
                    }
                    // The game dropped the session: logout finished or login refused.
                    None => {
                        let _ = write.send(Message::Close(None)).await;
                        break Ok(());
                    }
                }
            }
        }
    };

    let _ = inbound.send(Inbound::Disconnected { connection });
    result
}
