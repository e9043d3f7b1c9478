//! Connected clients and the matchmaking queue.
//!
//! This module tracks every live connection and the FIFO queue of clients
//! waiting for a player slot:
//! - Client registration with server-assigned ids and a capacity limit
//! - Queue entry when a client asks to join, removal when it disconnects
//! - Dequeueing in arrival order when a game session has free slots
//!
//! The manager is shared between the acceptor and the game sessions behind a
//! `tokio::sync::RwLock`. It never touches game state itself.

use crate::session::SessionEvent;
use log::{debug, info};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// A connected client.
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Remote address, for logging
    pub addr: SocketAddr,
    pub connected_at: Instant,
    /// Where game sessions deliver events for this client
    pub events: mpsc::UnboundedSender<SessionEvent>,
}

/// A client taken off the queue by a game session.
#[derive(Debug)]
pub struct QueuedClient {
    pub client_id: u32,
    pub name: String,
    pub events: mpsc::UnboundedSender<SessionEvent>,
}

pub struct ClientManager {
    clients: HashMap<u32, Client>,
    queue: VecDeque<(u32, String)>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            queue: VecDeque::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection. Returns `None` when the server is full.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Option<u32> {
        if self.is_full() {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id = self.next_client_id.wrapping_add(1).max(1);

        self.clients.insert(
            client_id,
            Client {
                id: client_id,
                addr,
                connected_at: Instant::now(),
                events,
            },
        );
        info!("Client {} connected from {}", client_id, addr);
        Some(client_id)
    }

    /// Forgets a client and drops it from the queue.
    pub fn remove_client(&mut self, client_id: u32) -> Option<Client> {
        self.queue.retain(|(id, _)| *id != client_id);
        let removed = self.clients.remove(&client_id);
        if let Some(client) = &removed {
            info!(
                "Client {} disconnected after {:?}",
                client_id,
                client.connected_at.elapsed()
            );
        }
        removed
    }

    /// Appends a client to the queue. Fails for unknown or already queued clients.
    pub fn enqueue(&mut self, client_id: u32, name: String) -> bool {
        if !self.clients.contains_key(&client_id) || self.is_queued(client_id) {
            return false;
        }
        debug!("Client {} queued as {}", client_id, name);
        self.queue.push_back((client_id, name));
        true
    }

    pub fn is_queued(&self, client_id: u32) -> bool {
        self.queue.iter().any(|(id, _)| *id == client_id)
    }

    /// Takes up to `count` clients off the front of the queue.
    pub fn dequeue(&mut self, count: usize) -> Vec<QueuedClient> {
        let mut taken = Vec::new();
        while taken.len() < count {
            let Some((client_id, name)) = self.queue.pop_front() else {
                break;
            };
            if let Some(client) = self.clients.get(&client_id) {
                taken.push(QueuedClient {
                    client_id,
                    name,
                    events: client.events.clone(),
                });
            }
        }
        taken
    }

    /// Puts clients a session could not place back at the head of the queue, in order.
    pub fn requeue_front(&mut self, clients: Vec<QueuedClient>) {
        for client in clients.into_iter().rev() {
            if self.clients.contains_key(&client.client_id) {
                self.queue.push_front((client.client_id, client.name));
            }
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }
}
