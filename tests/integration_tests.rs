//! Integration tests for the territory server and client
//!
//! These tests run a real server on an ephemeral port and talk to it over TCP,
//! either byte by byte or through the client library.

use client::game::ClientPhase;
use client::input::DirectionSink;
use client::network::{Client, ClientConfig};
use server::config::{GameConfig, ServerConfig};
use server::network::Server;
use shared::{
    ChecksumReport, Direction, FrameReader, Packet, PacketRegistry, RequestJoin, UpdateDir,
    Window,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

fn game_config(ai_players: usize) -> GameConfig {
    GameConfig {
        width: 30,
        height: 30,
        tick_interval: Duration::from_millis(20),
        max_players: 4,
        ai_players,
        spawn_grace: 0,
    }
}

async fn start_server(ai_players: usize) -> SocketAddr {
    let server = Server::bind(ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        game: game_config(ai_players),
        ..ServerConfig::default()
    })
    .await
    .expect("Failed to bind server");
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

/// Minimal raw protocol client
struct RawClient {
    stream: TcpStream,
    reader: FrameReader,
}

impl RawClient {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.expect("Failed to connect"),
            reader: FrameReader::new(PacketRegistry::standard()),
        }
    }

    async fn send(&mut self, packet: Packet) {
        let bytes = packet.encode().unwrap();
        self.stream.write_all(&bytes).await.unwrap();
    }

    async fn recv(&mut self) -> Packet {
        let mut buffer = [0u8; 8192];
        loop {
            if let Some(packet) = self.reader.next_packet().unwrap() {
                return packet;
            }
            let n = timeout(Duration::from_secs(2), self.stream.read(&mut buffer))
                .await
                .expect("Timed out waiting for the server")
                .unwrap();
            assert!(n > 0, "server closed the connection");
            self.reader.extend(&buffer[..n]).unwrap();
        }
    }

    /// Next GAME_TICK or RESEND_BOARD, skipping side tables.
    async fn recv_board(&mut self) -> Packet {
        loop {
            match self.recv().await {
                Packet::PlayersUpdate(_) | Packet::LeaderboardUpdate(_) | Packet::KeepAlive => {}
                packet => return packet,
            }
        }
    }
}

/// Window replica kept the way a client keeps it
struct Replica {
    window: Window,
    tick: u32,
}

impl Replica {
    /// Applies a board packet, checking the checksum. Returns `true` for a full resend.
    fn apply(&mut self, packet: Packet) -> bool {
        match packet {
            Packet::ResendBoard(board) => {
                self.window = Window::from_cells(board.cells).unwrap();
                self.tick = board.tick;
                assert_eq!(self.window.checksum(), board.checksum);
                true
            }
            Packet::GameTick(update) => {
                assert_eq!(update.tick, self.tick + 1, "incremental tick out of order");
                self.window
                    .apply_tick(update.direction, &update.edge, &update.diff)
                    .unwrap();
                self.tick = update.tick;
                assert_eq!(self.window.checksum(), update.checksum);
                false
            }
            other => panic!("Expected board packet, got {:?}", other),
        }
    }
}

async fn join(addr: SocketAddr, name: &str) -> (RawClient, Replica) {
    let mut client = RawClient::connect(addr).await;
    client
        .send(Packet::RequestJoin(RequestJoin {
            name: name.to_string(),
        }))
        .await;
    assert_eq!(client.recv().await, Packet::Queued);

    let replica = match client.recv().await {
        Packet::GameJoin(join) => {
            assert!(join.player_id >= 1);
            assert_eq!(join.score, 9);
            assert_eq!(join.total_cells, 900);
            assert_eq!(join.tick_rate, 20);
            assert_eq!(join.players.names.get(&join.player_id).map(String::as_str), Some(name));
            Replica {
                window: Window::from_cells(join.board.cells).unwrap(),
                tick: join.board.tick,
            }
        }
        other => panic!("Expected GAME_JOIN, got {:?}", other),
    };
    (client, replica)
}

/// FRAMING TESTS
mod framing_tests {
    use super::*;

    /// Tests that packets split across TCP writes are reassembled
    #[tokio::test]
    async fn byte_by_byte_delivery() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let packets = vec![
            Packet::RequestJoin(RequestJoin {
                name: "ferris".into(),
            }),
            Packet::UpdateDir(UpdateDir {
                direction: Direction::Left,
            }),
            Packet::ChecksumReport(ChecksumReport {
                tick: 7,
                checksum: 0xDEAD_BEEF,
            }),
        ];
        let sent = packets.clone();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.set_nodelay(true).unwrap();
            for packet in sent {
                for byte in packet.encode().unwrap() {
                    stream.write_all(&[byte]).await.unwrap();
                }
            }
        });

        let mut client = RawClient::connect(addr).await;
        for expected in packets {
            assert_eq!(client.recv().await, expected);
        }
    }
}

/// END TO END TESTS
mod end_to_end_tests {
    use super::*;

    /// Tests join, incremental ticks with matching checksums and both resync paths
    #[tokio::test]
    async fn join_sync_and_resend() {
        let addr = start_server(0).await;
        let (mut client, mut replica) = join(addr, "ada").await;

        for _ in 0..5 {
            let packet = client.recv_board().await;
            replica.apply(packet);
        }

        // Explicit resend request
        client.send(Packet::RequestResend).await;
        let mut resent = false;
        for _ in 0..10 {
            let packet = client.recv_board().await;
            if replica.apply(packet) {
                resent = true;
                break;
            }
        }
        assert!(resent, "no RESEND_BOARD after REQUEST_RESEND");

        // Wrong checksum report for a tick the server remembers
        client
            .send(Packet::ChecksumReport(ChecksumReport {
                tick: replica.tick,
                checksum: replica.window.checksum() ^ 1,
            }))
            .await;
        let mut resent = false;
        for _ in 0..10 {
            let packet = client.recv_board().await;
            if replica.apply(packet) {
                resent = true;
                break;
            }
        }
        assert!(resent, "no RESEND_BOARD after a bad CHECKSUM_REPORT");
    }

    /// Tests that a report for a tick the server no longer remembers still resyncs
    #[tokio::test]
    async fn stale_checksum_report_resyncs() {
        let addr = start_server(0).await;
        let (mut client, mut replica) = join(addr, "ada").await;
        for _ in 0..3 {
            let packet = client.recv_board().await;
            replica.apply(packet);
        }

        client
            .send(Packet::ChecksumReport(ChecksumReport {
                tick: u32::MAX,
                checksum: 0,
            }))
            .await;
        let mut resent = false;
        for _ in 0..10 {
            let packet = client.recv_board().await;
            if replica.apply(packet) {
                resent = true;
                break;
            }
        }
        assert!(resent, "no RESEND_BOARD after a stale CHECKSUM_REPORT");
    }

    /// Tests that two queued clients end up in the same game
    #[tokio::test]
    async fn two_clients_share_a_board() {
        let addr = start_server(0).await;
        let (mut first, _) = join(addr, "ada").await;
        let (_second, _) = join(addr, "bob").await;

        // The first client learns about the second through PLAYERS_UPDATE
        let mut seen = false;
        for _ in 0..20 {
            if let Packet::PlayersUpdate(update) = first.recv().await {
                if update.names.values().any(|name| name == "bob") {
                    seen = true;
                    break;
                }
            }
        }
        assert!(seen, "first client never saw the second player");
    }

    /// Tests the client library staying in sync against a live game with AI players
    #[tokio::test]
    async fn client_library_stays_synced() {
        let addr = start_server(2).await;
        let client = Client::connect(
            &addr.to_string(),
            ClientConfig {
                name: "ferris".into(),
                ..ClientConfig::default()
            },
        )
        .await
        .unwrap();
        let state = client.state();
        let (sink, intents) = DirectionSink::channel();
        let task = tokio::spawn(client.run(intents));

        let mut first_tick = None;
        let mut last_tick = None;
        for i in 0..40 {
            sleep(Duration::from_millis(20)).await;
            if i == 5 {
                sink.steer(Direction::Up);
            }
            let state = state.read().await;
            if state.phase() != ClientPhase::Playing {
                continue;
            }
            assert!(state.is_synced(), "client lost sync at tick {:?}", state.tick());
            first_tick = first_tick.or(state.tick());
            last_tick = state.tick();
        }

        let (first, last) = (first_tick.unwrap(), last_tick.unwrap());
        assert!(last > first, "no ticks applied");

        sink.send(client::input::Intent::Quit);
        timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
