//! TCP connection to the game server.
//!
//! [`Client`] drives one connection: it joins on start, applies every server
//! packet to the shared [`ClientGameState`], answers desyncs, forwards steering
//! intents and keeps the link alive.

use crate::error::ClientError;
use crate::game::{ClientGameState, ClientPhase};
use crate::input::Intent;
use log::{debug, info, warn};
use shared::{FrameReader, Packet, PacketRegistry, RequestJoin, UpdateDir};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval_at, Instant};

pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub name: String,
    /// Queue for another game as soon as one ends.
    pub rejoin: bool,
    pub keepalive_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            rejoin: false,
            keepalive_interval: KEEPALIVE_INTERVAL,
        }
    }
}

pub struct Client<S> {
    stream: S,
    reader: FrameReader,
    config: ClientConfig,
    state: Arc<RwLock<ClientGameState>>,
}

impl Client<TcpStream> {
    pub async fn connect(addr: &str, config: ClientConfig) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", addr);
        Ok(Self::new(stream, config))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    pub fn new(stream: S, config: ClientConfig) -> Self {
        Self {
            stream,
            reader: FrameReader::new(PacketRegistry::standard()),
            config,
            state: Arc::new(RwLock::new(ClientGameState::new())),
        }
    }

    /// Shared game state, for a presentation layer to read snapshots from.
    pub fn state(&self) -> Arc<RwLock<ClientGameState>> {
        Arc::clone(&self.state)
    }

    /// Joins, then serves the connection until the server closes it or a
    /// [`Intent::Quit`] arrives.
    pub async fn run(
        mut self,
        mut intents: mpsc::UnboundedReceiver<Intent>,
    ) -> Result<(), ClientError> {
        let mut buffer = vec![0u8; 8192];
        let period = self.config.keepalive_interval;
        let mut keepalive = interval_at(Instant::now() + period, period);
        let name = self.config.name.clone();
        self.join(name).await?;

        loop {
            tokio::select! {
                read = self.stream.read(&mut buffer) => {
                    let n = read?;
                    if n == 0 {
                        info!("Server closed the connection");
                        return Ok(());
                    }
                    self.reader.extend(&buffer[..n])?;
                    self.drain_packets().await?;
                }
                Some(intent) = intents.recv() => {
                    if !self.handle_intent(intent).await? {
                        return Ok(());
                    }
                }
                _ = keepalive.tick() => {
                    self.send(&Packet::KeepAlive).await?;
                }
            }
        }
    }

    async fn send(&mut self, packet: &Packet) -> Result<(), ClientError> {
        let bytes = packet.encode()?;
        self.stream.write_all(&bytes).await?;
        Ok(())
    }

    async fn join(&mut self, name: String) -> Result<(), ClientError> {
        debug!("Requesting to join as {:?}", name);
        self.send(&Packet::RequestJoin(RequestJoin { name })).await
    }

    async fn drain_packets(&mut self) -> Result<(), ClientError> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => return Ok(()),
                Err(e) => {
                    warn!("Dropped packet from server: {}", e);
                    continue;
                }
            };

            let ended = matches!(packet, Packet::GameEnd(_));
            let reply = self.state.write().await.apply(packet);
            if let Some(reply) = reply {
                self.send(&reply).await?;
            }
            if ended && self.config.rejoin {
                self.join(String::new()).await?;
            }
        }
    }

    /// Returns `false` when the client should stop.
    async fn handle_intent(&mut self, intent: Intent) -> Result<bool, ClientError> {
        match intent {
            Intent::Steer(direction) => {
                if self.state.read().await.phase() == ClientPhase::Playing {
                    self.send(&Packet::UpdateDir(UpdateDir { direction })).await?;
                }
            }
            Intent::Join(name) => {
                let phase = self.state.read().await.phase();
                match phase {
                    ClientPhase::Idle | ClientPhase::Ended { .. } => self.join(name).await?,
                    _ => debug!("Ignoring join while {:?}", phase),
                }
            }
            Intent::Quit => {
                info!("Leaving");
                return Ok(false);
            }
        }
        Ok(true)
    }
}
