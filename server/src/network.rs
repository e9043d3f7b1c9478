//! Server network layer: TCP acceptor and matchmaking front.

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::ServerError;
use crate::session::{GameSession, SessionHandle};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};

/// Messages sent from connection and session tasks to the front
#[derive(Debug)]
pub enum FrontMessage {
    Enqueue { client_id: u32, name: String },
    Disconnected { client_id: u32 },
    SessionEnded { session_id: u32 },
}

/// Accepts connections, keeps the matchmaking queue and starts game sessions
pub struct Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    clients: Arc<RwLock<ClientManager>>,
    sessions: HashMap<u32, SessionHandle>,
    next_session_id: u32,

    // Communication channels
    front_tx: mpsc::UnboundedSender<FrontMessage>,
    front_rx: mpsc::UnboundedReceiver<FrontMessage>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        let (front_tx, front_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            config: Arc::new(config),
            sessions: HashMap::new(),
            next_session_id: 1,
            front_tx,
            front_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Main loop: accept sockets and react to front messages
    pub async fn run(mut self) -> Result<(), ServerError> {
        info!("Server listening on {}", self.local_addr()?);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.accept(stream, addr).await,
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                message = self.front_rx.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => return Ok(()),
                },
            }
        }
    }

    async fn accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let Some(client_id) = self.clients.write().await.add_client(addr, events_tx) else {
            warn!("Server full, rejecting {}", addr);
            return;
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", addr, e);
        }

        let connection = Connection::new(
            client_id,
            stream,
            Arc::clone(&self.config),
            self.front_tx.clone(),
            events_rx,
        );
        tokio::spawn(async move {
            if let Err(e) = connection.run().await {
                warn!("Client {} dropped: {}", client_id, e);
            }
        });
    }

    async fn handle_message(&mut self, message: FrontMessage) {
        match message {
            FrontMessage::Enqueue { client_id, name } => {
                if self.clients.write().await.enqueue(client_id, name) {
                    self.launch_if_needed().await;
                }
            }
            FrontMessage::Disconnected { client_id } => {
                self.clients.write().await.remove_client(client_id);
            }
            FrontMessage::SessionEnded { session_id } => {
                self.sessions.remove(&session_id);
                info!(
                    "Session {} ended, {} still running",
                    session_id,
                    self.sessions.len()
                );
                self.launch_if_needed().await;
            }
        }
    }

    /// Starts a session when clients wait and none is running, or when the
    /// queue alone could fill one.
    async fn launch_if_needed(&mut self) {
        let waiting = self.clients.read().await.queue_len();
        if waiting == 0 {
            return;
        }
        if self.sessions.is_empty() || waiting >= self.config.game.max_players {
            self.launch_session();
        }
    }

    fn launch_session(&mut self) {
        let session_id = self.next_session_id;
        self.next_session_id = self.next_session_id.wrapping_add(1);

        let session = GameSession::new(
            session_id,
            self.config.game.clone(),
            Arc::clone(&self.clients),
            self.front_tx.clone(),
        );
        self.sessions.insert(session_id, session.handle());
        tokio::spawn(session.run());
        info!("Launched session {}", session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bind_to_ephemeral_port() {
        let server = Server::bind(test_config()).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_failure_names_address() {
        let first = Server::bind(test_config()).await.unwrap();
        let taken = first.local_addr().unwrap().to_string();

        let err = Server::bind(ServerConfig {
            bind_addr: taken.clone(),
            ..ServerConfig::default()
        })
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
        assert!(err.to_string().contains(&taken));
    }

    #[tokio::test]
    async fn test_queue_launches_single_session() {
        let mut server = Server::bind(test_config()).await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let client_id = server
            .clients
            .write()
            .await
            .add_client("127.0.0.1:5000".parse().unwrap(), tx)
            .unwrap();

        server
            .handle_message(FrontMessage::Enqueue {
                client_id,
                name: "ada".into(),
            })
            .await;
        assert_eq!(server.sessions.len(), 1);

        server
            .handle_message(FrontMessage::Disconnected { client_id })
            .await;
        assert_eq!(server.clients.read().await.client_count(), 0);
    }
}
