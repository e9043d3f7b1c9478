//! Binary packet catalogue and stream framing.
//!
//! Every packet on the wire is one type-id byte followed by a bincode payload
//! (fixed-width big-endian integers, `u64` length prefixes on strings, vectors
//! and maps). Decoding goes through a [`PacketRegistry`] that maps type ids to
//! decoder functions, and [`FrameReader`] only consumes bytes once a whole
//! packet has arrived.

use crate::cell::{Direction, PlayerId};
use crate::window::{RleError, Run};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io;
use thiserror::Error;

/// Largest packet (and largest amount of unread bytes) a peer may send us.
pub const MAX_PACKET_BYTES: usize = 64 * 1024;
/// Number of entries in a leaderboard update.
pub const LEADERBOARD_SIZE: usize = 5;

pub const KEEP_ALIVE: u8 = 0;
pub const REQUEST_JOIN: u8 = 1;
pub const QUEUED: u8 = 2;
pub const PLAYERS_UPDATE: u8 = 3;
pub const LEADERBOARD_UPDATE: u8 = 4;
pub const RESEND_BOARD: u8 = 5;
pub const GAME_JOIN: u8 = 6;
pub const GAME_TICK: u8 = 7;
pub const UPDATE_DIR: u8 = 8;
pub const REQUEST_RESEND: u8 = 9;
pub const GAME_END: u8 = 10;
pub const CHECKSUM_REPORT: u8 = 11;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown packet id {id}")]
    UnknownPacket { id: u8 },
    #[error("malformed payload for packet {id}: {source}")]
    Malformed { id: u8, source: bincode::Error },
    #[error("failed to encode packet {id}: {source}")]
    Encode { id: u8, source: bincode::Error },
    #[error("{buffered} unread bytes exceed the {limit} byte limit")]
    FrameTooLarge { buffered: usize, limit: usize },
    #[error("bad window payload: {0}")]
    Rle(#[from] RleError),
}

fn wire() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
        .with_limit(MAX_PACKET_BYTES as u64)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RequestJoin {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayersUpdate {
    pub tick: u32,
    pub names: BTreeMap<PlayerId, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct LeaderboardUpdate {
    pub tick: u32,
    /// `(player id, score)`, best first, padded with `(0, 0)`.
    pub entries: [(PlayerId, u32); LEADERBOARD_SIZE],
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResendBoard {
    pub tick: u32,
    pub cells: Vec<u32>,
    pub checksum: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GameJoin {
    pub player_id: PlayerId,
    pub score: u32,
    pub total_cells: u32,
    /// Milliseconds between ticks.
    pub tick_rate: u16,
    pub players: PlayersUpdate,
    pub leaderboard: LeaderboardUpdate,
    pub board: ResendBoard,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GameTick {
    pub tick: u32,
    pub direction: Direction,
    pub score: u32,
    pub edge: Vec<u32>,
    pub diff: Vec<Run>,
    pub checksum: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateDir {
    pub direction: Direction,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameEnd {
    pub score: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumReport {
    pub tick: u32,
    pub checksum: u64,
}

/// Every packet either side can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    KeepAlive,
    RequestJoin(RequestJoin),
    Queued,
    PlayersUpdate(PlayersUpdate),
    LeaderboardUpdate(LeaderboardUpdate),
    ResendBoard(ResendBoard),
    GameJoin(GameJoin),
    GameTick(GameTick),
    UpdateDir(UpdateDir),
    RequestResend,
    GameEnd(GameEnd),
    ChecksumReport(ChecksumReport),
}

impl Packet {
    pub fn id(&self) -> u8 {
        match self {
            Packet::KeepAlive => KEEP_ALIVE,
            Packet::RequestJoin(_) => REQUEST_JOIN,
            Packet::Queued => QUEUED,
            Packet::PlayersUpdate(_) => PLAYERS_UPDATE,
            Packet::LeaderboardUpdate(_) => LEADERBOARD_UPDATE,
            Packet::ResendBoard(_) => RESEND_BOARD,
            Packet::GameJoin(_) => GAME_JOIN,
            Packet::GameTick(_) => GAME_TICK,
            Packet::UpdateDir(_) => UPDATE_DIR,
            Packet::RequestResend => REQUEST_RESEND,
            Packet::GameEnd(_) => GAME_END,
            Packet::ChecksumReport(_) => CHECKSUM_REPORT,
        }
    }

    /// Serializes the packet as its id byte followed by its payload.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let id = self.id();
        let mut out = vec![id];
        let result = match self {
            Packet::KeepAlive | Packet::Queued | Packet::RequestResend => Ok(()),
            Packet::RequestJoin(p) => wire().serialize_into(&mut out, p),
            Packet::PlayersUpdate(p) => wire().serialize_into(&mut out, p),
            Packet::LeaderboardUpdate(p) => wire().serialize_into(&mut out, p),
            Packet::ResendBoard(p) => wire().serialize_into(&mut out, p),
            Packet::GameJoin(p) => wire().serialize_into(&mut out, p),
            Packet::GameTick(p) => wire().serialize_into(&mut out, p),
            Packet::UpdateDir(p) => wire().serialize_into(&mut out, p),
            Packet::GameEnd(p) => wire().serialize_into(&mut out, p),
            Packet::ChecksumReport(p) => wire().serialize_into(&mut out, p),
        };
        result.map_err(|source| ProtocolError::Encode { id, source })?;
        Ok(out)
    }
}

/// Reads one payload from the front of the slice, advancing it past the bytes used.
pub type Decoder = fn(&mut &[u8]) -> bincode::Result<Packet>;

fn payload<T: serde::de::DeserializeOwned>(input: &mut &[u8]) -> bincode::Result<T> {
    wire().deserialize_from(input)
}

/// Maps packet ids to decoders.
#[derive(Clone)]
pub struct PacketRegistry {
    decoders: HashMap<u8, Decoder>,
}

impl PacketRegistry {
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registry with every packet in the catalogue.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(KEEP_ALIVE, |_| Ok(Packet::KeepAlive));
        registry.register(REQUEST_JOIN, |i| payload(i).map(Packet::RequestJoin));
        registry.register(QUEUED, |_| Ok(Packet::Queued));
        registry.register(PLAYERS_UPDATE, |i| payload(i).map(Packet::PlayersUpdate));
        registry.register(LEADERBOARD_UPDATE, |i| {
            payload(i).map(Packet::LeaderboardUpdate)
        });
        registry.register(RESEND_BOARD, |i| payload(i).map(Packet::ResendBoard));
        registry.register(GAME_JOIN, |i| payload(i).map(Packet::GameJoin));
        registry.register(GAME_TICK, |i| payload(i).map(Packet::GameTick));
        registry.register(UPDATE_DIR, |i| payload(i).map(Packet::UpdateDir));
        registry.register(REQUEST_RESEND, |_| Ok(Packet::RequestResend));
        registry.register(GAME_END, |i| payload(i).map(Packet::GameEnd));
        registry.register(CHECKSUM_REPORT, |i| payload(i).map(Packet::ChecksumReport));
        registry
    }

    pub fn register(&mut self, id: u8, decoder: Decoder) {
        self.decoders.insert(id, decoder);
    }

    pub fn decoder(&self, id: u8) -> Option<Decoder> {
        self.decoders.get(&id).copied()
    }
}

impl Default for PacketRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn is_incomplete(err: &bincode::Error) -> bool {
    matches!(&**err, bincode::ErrorKind::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
}

/// Accumulates stream bytes and yields whole packets.
///
/// A packet whose payload has not fully arrived is left in the buffer untouched.
/// An unknown id drops that single byte; a malformed payload drops the bytes the
/// decoder consumed. Both are reported as errors so the caller can log them.
pub struct FrameReader {
    buffer: Vec<u8>,
    registry: PacketRegistry,
    limit: usize,
}

impl FrameReader {
    pub fn new(registry: PacketRegistry) -> Self {
        Self::with_limit(registry, MAX_PACKET_BYTES)
    }

    pub fn with_limit(registry: PacketRegistry, limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            registry,
            limit,
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Appends received bytes. Fails once more than `limit` bytes sit unread.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > self.limit {
            return Err(ProtocolError::FrameTooLarge {
                buffered: self.buffer.len(),
                limit: self.limit,
            });
        }
        Ok(())
    }

    /// Next complete packet, `Ok(None)` if more bytes are needed.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, ProtocolError> {
        let Some(&id) = self.buffer.first() else {
            return Ok(None);
        };
        let Some(decoder) = self.registry.decoder(id) else {
            self.buffer.drain(..1);
            return Err(ProtocolError::UnknownPacket { id });
        };

        let mut rest = &self.buffer[1..];
        let result = decoder(&mut rest);
        let consumed = self.buffer.len() - rest.len();
        match result {
            Ok(packet) => {
                self.buffer.drain(..consumed);
                Ok(Some(packet))
            }
            Err(err) if is_incomplete(&err) => Ok(None),
            Err(source) => {
                self.buffer.drain(..consumed);
                Err(ProtocolError::Malformed { id, source })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tick() -> Packet {
        Packet::GameTick(GameTick {
            tick: 9,
            direction: Direction::Left,
            score: 12,
            edge: vec![1, 2, 3],
            diff: vec![(2, 0), (1, 7)],
            checksum: 0xDEAD_BEEF,
        })
    }

    #[test]
    fn test_unit_packets_are_one_byte() {
        assert_eq!(Packet::KeepAlive.encode().unwrap(), vec![KEEP_ALIVE]);
        assert_eq!(Packet::Queued.encode().unwrap(), vec![QUEUED]);
        assert_eq!(Packet::RequestResend.encode().unwrap(), vec![REQUEST_RESEND]);
    }

    #[test]
    fn test_payload_layout_is_big_endian_fixint() {
        let bytes = Packet::GameEnd(GameEnd { score: 258 }).encode().unwrap();
        assert_eq!(bytes, vec![GAME_END, 0, 0, 1, 2]);

        let bytes = Packet::UpdateDir(UpdateDir {
            direction: Direction::Down,
        })
        .encode()
        .unwrap();
        assert_eq!(bytes, vec![UPDATE_DIR, 3]);

        let bytes = Packet::RequestJoin(RequestJoin {
            name: "ab".to_string(),
        })
        .encode()
        .unwrap();
        assert_eq!(bytes, vec![REQUEST_JOIN, 0, 0, 0, 0, 0, 0, 0, 2, b'a', b'b']);
    }

    #[test]
    fn test_reader_waits_for_partial_packet() {
        let bytes = sample_tick().encode().unwrap();
        let mut reader = FrameReader::new(PacketRegistry::standard());

        reader.extend(&bytes[..bytes.len() - 3]).unwrap();
        assert!(reader.next_packet().unwrap().is_none());
        assert_eq!(reader.buffered(), bytes.len() - 3);

        reader.extend(&bytes[bytes.len() - 3..]).unwrap();
        assert_eq!(reader.next_packet().unwrap(), Some(sample_tick()));
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn test_reader_splits_back_to_back_packets() {
        let mut bytes = Packet::KeepAlive.encode().unwrap();
        bytes.extend(sample_tick().encode().unwrap());
        bytes.extend(Packet::Queued.encode().unwrap());

        let mut reader = FrameReader::new(PacketRegistry::standard());
        reader.extend(&bytes).unwrap();
        assert_eq!(reader.next_packet().unwrap(), Some(Packet::KeepAlive));
        assert_eq!(reader.next_packet().unwrap(), Some(sample_tick()));
        assert_eq!(reader.next_packet().unwrap(), Some(Packet::Queued));
        assert_eq!(reader.next_packet().unwrap(), None);
    }

    #[test]
    fn test_unknown_id_drops_one_byte_and_continues() {
        let mut reader = FrameReader::new(PacketRegistry::standard());
        reader.extend(&[200, KEEP_ALIVE]).unwrap();

        match reader.next_packet() {
            Err(ProtocolError::UnknownPacket { id }) => assert_eq!(id, 200),
            other => panic!("expected unknown packet, got {:?}", other),
        }
        assert_eq!(reader.next_packet().unwrap(), Some(Packet::KeepAlive));
    }

    #[test]
    fn test_bad_direction_is_malformed() {
        let mut reader = FrameReader::new(PacketRegistry::standard());
        reader.extend(&[UPDATE_DIR, 9, KEEP_ALIVE]).unwrap();

        assert!(matches!(
            reader.next_packet(),
            Err(ProtocolError::Malformed { id: UPDATE_DIR, .. })
        ));
        assert_eq!(reader.next_packet().unwrap(), Some(Packet::KeepAlive));
    }

    #[test]
    fn test_reader_enforces_limit() {
        let mut reader = FrameReader::with_limit(PacketRegistry::standard(), 4);
        assert!(reader.extend(&[1, 2, 3]).is_ok());
        assert!(matches!(
            reader.extend(&[4, 5]),
            Err(ProtocolError::FrameTooLarge {
                buffered: 5,
                limit: 4
            })
        ));
    }

    #[test]
    fn test_game_join_nests_bodies() {
        let mut names = BTreeMap::new();
        names.insert(3, "ada".to_string());
        let join = Packet::GameJoin(GameJoin {
            player_id: 3,
            score: 9,
            total_cells: 6400,
            tick_rate: 250,
            players: PlayersUpdate { tick: 1, names },
            leaderboard: LeaderboardUpdate {
                tick: 1,
                entries: [(3, 9), (0, 0), (0, 0), (0, 0), (0, 0)],
            },
            board: ResendBoard {
                tick: 1,
                cells: vec![0; 4],
                checksum: 5,
            },
        });

        let mut reader = FrameReader::new(PacketRegistry::standard());
        reader.extend(&join.encode().unwrap()).unwrap();
        assert_eq!(reader.next_packet().unwrap(), Some(join));
    }
}
