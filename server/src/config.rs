//! Command line arguments and the plain configuration structs built from them.

use crate::board::MAX_BOARD_SIDE;
use clap::Parser;
use shared::MAX_PLAYER_ID;
use std::time::Duration;

/// Territory game server
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct ServerArgs {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    pub port: u16,
    /// Board width in cells
    #[clap(long, default_value = "80")]
    pub width: usize,
    /// Board height in cells
    #[clap(long, default_value = "80")]
    pub height: usize,
    /// Milliseconds between simulation ticks
    #[clap(short, long, default_value = "250")]
    pub tick_ms: u16,
    /// Player slots per game, humans and AI combined
    #[clap(long, default_value = "10")]
    pub max_players: usize,
    /// AI players kept alive in every game while slots allow
    #[clap(long, default_value = "4")]
    pub ai_players: usize,
    /// Maximum simultaneous connections
    #[clap(long, default_value = "64")]
    pub max_clients: usize,
    /// Seconds without a keep-alive before a connection is dropped
    #[clap(long, default_value = "10")]
    pub keepalive_timeout: u64,
    /// Seconds between outgoing keep-alives
    #[clap(long, default_value = "5")]
    pub keepalive_interval: u64,
    /// Ticks a freshly spawned player is held still
    #[clap(long, default_value = "3")]
    pub spawn_grace: u32,
    /// Longest accepted player name, in characters
    #[clap(long, default_value = "24")]
    pub max_name_len: usize,
}

/// Settings for one game session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    pub tick_interval: Duration,
    pub max_players: usize,
    pub ai_players: usize,
    pub spawn_grace: u32,
}

impl GameConfig {
    pub fn total_cells(&self) -> usize {
        self.width * self.height
    }

    /// Tick interval as sent to clients in GAME_JOIN.
    pub fn tick_rate_ms(&self) -> u16 {
        u16::try_from(self.tick_interval.as_millis()).unwrap_or(u16::MAX)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 80,
            height: 80,
            tick_interval: Duration::from_millis(250),
            max_players: 10,
            ai_players: 4,
            spawn_grace: 3,
        }
    }
}

/// Settings for the acceptor and connection workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_clients: usize,
    pub keepalive_timeout: Duration,
    pub keepalive_interval: Duration,
    pub max_name_len: usize,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            max_clients: 64,
            keepalive_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(5),
            max_name_len: 24,
            game: GameConfig::default(),
        }
    }
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        // Ids 0 and 255 are reserved, so a game never holds more than 254 players.
        let max_players = args.max_players.clamp(1, MAX_PLAYER_ID as usize);
        Self {
            bind_addr: format!("{}:{}", args.host, args.port),
            max_clients: args.max_clients.max(1),
            keepalive_timeout: Duration::from_secs(args.keepalive_timeout),
            keepalive_interval: Duration::from_secs(args.keepalive_interval.max(1)),
            max_name_len: args.max_name_len.max(1),
            game: GameConfig {
                width: args.width.clamp(1, MAX_BOARD_SIDE),
                height: args.height.clamp(1, MAX_BOARD_SIDE),
                tick_interval: Duration::from_millis(u64::from(args.tick_ms.max(1))),
                max_players,
                ai_players: args.ai_players.min(max_players),
                spawn_grace: args.spawn_grace,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let args = ServerArgs::parse_from(["server"]);
        let config = ServerConfig::from(args);
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.game.tick_rate_ms(), 250);
        assert_eq!(config.game.total_cells(), 6400);
    }

    #[test]
    fn test_player_slots_are_clamped() {
        let args = ServerArgs::parse_from([
            "server",
            "--max-players",
            "1000",
            "--ai-players",
            "2000",
            "--port",
            "0",
        ]);
        let config = ServerConfig::from(args);
        assert_eq!(config.game.max_players, 254);
        assert_eq!(config.game.ai_players, 254);
        assert_eq!(config.bind_addr, "127.0.0.1:0");
    }

    #[test]
    fn test_board_size_is_clamped() {
        let args = ServerArgs::parse_from(["server", "--width", "100000", "--height", "0"]);
        let config = ServerConfig::from(args);
        assert_eq!(config.game.width, MAX_BOARD_SIDE);
        assert_eq!(config.game.height, 1);
        assert_eq!(config.game.total_cells(), MAX_BOARD_SIDE);
    }
}
