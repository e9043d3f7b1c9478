//! One worker per client connection.
//!
//! The worker owns the socket, decodes packets with a [`FrameReader`], tracks
//! the client's phase and keep-alive deadline, and turns session events into
//! outgoing packets through its [`ViewportSync`]. It is generic over the stream
//! so tests can drive it with in-memory I/O.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::game::BoardView;
use crate::network::FrontMessage;
use crate::nicks::random_nick;
use crate::session::{SessionEvent, SessionHandle};
use crate::viewport::ViewportSync;
use log::{debug, info, warn};
use shared::{FrameReader, GameEnd, GameJoin, Packet, PacketRegistry, PlayerId};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant};

/// Where a client is in its lifecycle.
#[derive(Debug, Clone)]
pub enum Phase {
    /// Connected, not waiting for a game.
    Limbo,
    /// Asked to join, waiting for a free slot.
    Queueing,
    InGame {
        player_id: PlayerId,
        session: SessionHandle,
    },
}

pub struct Connection<S> {
    id: u32,
    stream: S,
    reader: FrameReader,
    config: Arc<ServerConfig>,
    front: mpsc::UnboundedSender<FrontMessage>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    phase: Phase,
    name: Option<String>,
    sync: ViewportSync,
    sent_players: u32,
    sent_leaderboard: u32,
    last_keepalive: Instant,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(
        id: u32,
        stream: S,
        config: Arc<ServerConfig>,
        front: mpsc::UnboundedSender<FrontMessage>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> Self {
        Self {
            id,
            stream,
            reader: FrameReader::new(PacketRegistry::standard()),
            config,
            front,
            events,
            phase: Phase::Limbo,
            name: None,
            sync: ViewportSync::new(),
            sent_players: 0,
            sent_leaderboard: 0,
            last_keepalive: Instant::now(),
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Serves the client until it disconnects, times out or breaks the protocol.
    /// The player, if any, is handed back to its session either way.
    pub async fn run(mut self) -> Result<(), ServerError> {
        let result = self.serve().await;

        if let Phase::InGame { player_id, session } = &self.phase {
            session.leave(*player_id);
        }
        if self
            .front
            .send(FrontMessage::Disconnected { client_id: self.id })
            .is_err()
        {
            debug!("Front gone while closing client {}", self.id);
        }
        result
    }

    async fn serve(&mut self) -> Result<(), ServerError> {
        let mut buffer = vec![0u8; 4096];
        let period = self.config.keepalive_interval;
        let mut keepalive = interval_at(Instant::now() + period, period);

        loop {
            let deadline = self.last_keepalive + self.config.keepalive_timeout;
            tokio::select! {
                read = self.stream.read(&mut buffer) => {
                    let n = read?;
                    if n == 0 {
                        info!("Client {} closed the connection", self.id);
                        return Ok(());
                    }
                    self.reader.extend(&buffer[..n])?;
                    self.drain_packets().await?;
                }
                Some(event) = self.events.recv() => {
                    self.handle_event(event).await?;
                }
                _ = keepalive.tick() => {
                    self.send(&Packet::KeepAlive).await?;
                }
                _ = sleep_until(deadline) => {
                    warn!("Client {} timed out", self.id);
                    return Err(ServerError::KeepAliveTimeout(self.config.keepalive_timeout));
                }
            }
        }
    }

    async fn drain_packets(&mut self) -> Result<(), ServerError> {
        loop {
            match self.reader.next_packet() {
                Ok(Some(packet)) => self.handle_packet(packet).await?,
                Ok(None) => return Ok(()),
                Err(e) => warn!("Client {}: dropped packet: {}", self.id, e),
            }
        }
    }

    async fn send(&mut self, packet: &Packet) -> Result<(), ServerError> {
        let bytes = packet.encode()?;
        self.stream.write_all(&bytes).await?;
        Ok(())
    }

    fn in_game(&self) -> Option<(PlayerId, SessionHandle)> {
        match &self.phase {
            Phase::InGame { player_id, session } => Some((*player_id, session.clone())),
            _ => None,
        }
    }

    /// Trimmed and truncated name; an empty request keeps the previous name
    /// or falls back to a random nickname.
    fn resolve_name(&mut self, requested: &str) -> String {
        let trimmed = requested.trim();
        let name = if trimmed.is_empty() {
            self.name
                .clone()
                .unwrap_or_else(|| random_nick(&mut rand::thread_rng()))
        } else {
            trimmed.chars().take(self.config.max_name_len).collect()
        };
        self.name = Some(name.clone());
        name
    }

    async fn handle_packet(&mut self, packet: Packet) -> Result<(), ServerError> {
        match packet {
            Packet::KeepAlive => {
                self.last_keepalive = Instant::now();
            }
            Packet::RequestJoin(join) => {
                if !matches!(self.phase, Phase::Limbo) {
                    debug!("Client {} asked to join while {:?}", self.id, self.phase);
                    return Ok(());
                }
                let name = self.resolve_name(&join.name);
                self.phase = Phase::Queueing;
                if self
                    .front
                    .send(FrontMessage::Enqueue {
                        client_id: self.id,
                        name,
                    })
                    .is_err()
                {
                    warn!("Front gone, client {} cannot queue", self.id);
                }
                self.send(&Packet::Queued).await?;
            }
            Packet::UpdateDir(update) => match self.in_game() {
                Some((player_id, session)) => {
                    session.set_direction(player_id, update.direction).await;
                }
                None => debug!("Client {} steered outside a game", self.id),
            },
            Packet::RequestResend => {
                if self.in_game().is_some() {
                    self.sync.request_resync();
                }
            }
            Packet::ChecksumReport(report) => {
                if self.in_game().is_some() && self.sync.report_checksum(report.tick, report.checksum)
                {
                    info!(
                        "Client {} desynced at tick {}, resending board",
                        self.id, report.tick
                    );
                }
            }
            other => {
                warn!("Client {} sent unexpected packet {}", self.id, other.id());
            }
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: SessionEvent) -> Result<(), ServerError> {
        match event {
            SessionEvent::Joined { player_id, session } => {
                if !matches!(self.phase, Phase::Queueing) {
                    session.leave(player_id);
                    return Ok(());
                }
                self.sync = ViewportSync::new();
                let join = {
                    let state = session.state().read().await;
                    self.sync.full_window(&*state, player_id).map(|board| {
                        self.sent_players = state.players_changed();
                        self.sent_leaderboard = state.leaderboard_changed();
                        GameJoin {
                            player_id,
                            score: state.player(player_id).map_or(0, |p| p.score),
                            total_cells: state.total_cells(),
                            tick_rate: state.config.tick_rate_ms(),
                            players: state.players_update(),
                            leaderboard: state.leaderboard_update(),
                            board,
                        }
                    })
                };
                let Some(join) = join else {
                    // The player died before the board could be read.
                    self.phase = Phase::Limbo;
                    return self.send(&Packet::GameEnd(GameEnd { score: 0 })).await;
                };
                info!(
                    "Client {} joined session {} as player {}",
                    self.id, session.id, player_id
                );
                self.phase = Phase::InGame { player_id, session };
                self.send(&Packet::GameJoin(join)).await?;
            }
            SessionEvent::Ticked { .. } => {
                let Some((player_id, session)) = self.in_game() else {
                    return Ok(());
                };
                let mut packets = Vec::new();
                {
                    let state = session.state().read().await;
                    if state.players_changed() > self.sent_players {
                        self.sent_players = state.players_changed();
                        packets.push(Packet::PlayersUpdate(state.players_update()));
                    }
                    if state.leaderboard_changed() > self.sent_leaderboard {
                        self.sent_leaderboard = state.leaderboard_changed();
                        packets.push(Packet::LeaderboardUpdate(state.leaderboard_update()));
                    }
                    packets.extend(self.sync.next_packet(&*state, player_id));
                }
                for packet in &packets {
                    self.send(packet).await?;
                }
            }
            SessionEvent::GameOver { score } => {
                if self.in_game().is_none() {
                    return Ok(());
                }
                info!("Client {} game over with score {}", self.id, score);
                self.phase = Phase::Limbo;
                self.send(&Packet::GameEnd(GameEnd { score })).await?;
            }
        }
        Ok(())
    }
}
