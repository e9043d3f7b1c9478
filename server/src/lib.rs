//! # Territory Game Server Library
//!
//! This library provides the authoritative server for a grid-based territory
//! capture game. Players steer across a rectangular board, leave a trail
//! behind them outside their own land, and capture every cell the trail
//! encloses once they return home. The server owns the board, runs the tick
//! simulation, drives AI opponents and streams each client a 31×31 view
//! centred on its player.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every board change happens on the server inside a single tick. Movement,
//! trail laying, collisions, deaths and flood-fill captures are resolved in
//! ascending player id order so the outcome of a tick never depends on
//! network timing.
//!
//! ### Matchmaking
//! Clients that ask to join wait in a FIFO queue. A game session takes
//! queued clients as slots free up and tops the board up with AI players.
//!
//! ### Viewport Synchronization
//! Clients never see the whole board. Each tick they receive the cells that
//! scrolled into view plus a run-length encoded XOR diff of their window,
//! checked by a SHA-256 based checksum. Any doubt about the client's copy
//! triggers a full window resend.
//!
//! ## Architecture Design
//!
//! ### Task Per Concern
//! - **Acceptor/front** (`network`): accepts TCP connections, owns the
//!   matchmaking queue and launches game sessions
//! - **Connection workers** (`connection`): one per socket; frame decoding,
//!   keep-alives and per-client viewport encoding
//! - **Game sessions** (`session`): one per board; a fixed-interval tick loop
//!
//! ### Shared State
//! A session's [`game::GameState`] sits behind a `tokio::sync::RwLock`. The
//! tick holds the write lock; connection workers and the AI read afterwards.
//! Direction requests are atomic, so they only need the read lock.
//!
//! ## Module Organization
//!
//! - `board`: packed cell storage with a per-tick XOR diff
//! - `player`: player records and id allocation
//! - `game`: game state and the read/write board traits
//! - `simulation`: tick logic and flood-fill capture
//! - `spawn`: spawn point search and starting territory
//! - `ai`: search-based steering for computer players
//! - `viewport`: GAME_TICK/RESEND_BOARD encoding per client
//! - `client_manager`: connected clients and the join queue
//! - `config`, `error`, `nicks`: ambient pieces
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 80x80 board, 250ms ticks, listening on 127.0.0.1:8080
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     println!("Listening on {}", server.local_addr()?);
//!
//!     // Runs until the process is stopped
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod board;
pub mod client_manager;
pub mod config;
pub mod connection;
pub mod error;
pub mod game;
pub mod network;
pub mod nicks;
pub mod player;
pub mod session;
pub mod simulation;
pub mod spawn;
pub mod viewport;
