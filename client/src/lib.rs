//! # Territory Game Client Library
//!
//! A headless reference client for the territory game server. It keeps the
//! client's copy of its 31×31 viewport in step with the server and exposes it
//! read-only, so any presentation layer can sit on top without touching the
//! protocol.
//!
//! ## Synchronization
//!
//! The server sends one full window when a player joins and then an
//! incremental update per tick: the row or column that scrolled into view plus
//! a run-length encoded XOR diff. After every update the client recomputes the
//! window checksum. A mismatch is reported back with CHECKSUM_REPORT; a gap in
//! tick numbers or an undecodable update asks for REQUEST_RESEND. Until the
//! next full window arrives no snapshot is exposed, and REQUEST_RESEND is
//! repeated every [`game::RESEND_RETRY_TICKS`] ticks.
//!
//! ## Module Organization
//!
//! - `game`: [`game::ClientGameState`] applies server packets and hands out
//!   [`game::ViewSnapshot`]s
//! - `input`: steering intents and the line-based text front end
//! - `autopilot`: steers from the window with the look-ahead the server's AI
//!   players use
//! - `network`: the TCP loop with join, keep-alive and desync replies
//! - `error`: [`error::ClientError`]
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::DirectionSink;
//! use client::network::{Client, ClientConfig};
//! use shared::Direction;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig {
//!         name: "ferris".into(),
//!         ..ClientConfig::default()
//!     };
//!     let client = Client::connect("127.0.0.1:8080", config).await?;
//!     let state = client.state();
//!
//!     let (sink, intents) = DirectionSink::channel();
//!     sink.steer(Direction::Up);
//!
//!     tokio::spawn(async move {
//!         if let Some(view) = state.read().await.snapshot() {
//!             println!("{}", view.render_ascii());
//!         }
//!     });
//!     client.run(intents).await?;
//!     Ok(())
//! }
//! ```

pub mod autopilot;
pub mod error;
pub mod game;
pub mod input;
pub mod network;
