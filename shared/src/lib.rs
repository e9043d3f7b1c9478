//! # Shared Board Primitives
//!
//! Types used by both ends of the wire. The server builds its board out of
//! [`Cell`] words and encodes viewport updates with the [`window`] helpers; the
//! client decodes the same packets and replays them onto its own [`Window`].
//!
//! ## Modules
//!
//! - [`cell`]: the packed 32-bit cell word, [`Direction`] and [`TrailType`]
//! - [`window`]: viewport size, RLE codec, checksum, window scrolling
//! - [`protocol`]: packet catalogue, decoder registry, transactional framing
//!
//! Keeping this crate free of any runtime dependency means the encode and
//! decode paths can be unit tested without sockets.

pub mod cell;
pub mod protocol;
pub mod window;

pub use cell::{
    is_player, Cell, Direction, InvalidDirection, PlayerId, TrailType, MAX_PLAYER_ID,
    MIN_PLAYER_ID, OUT_OF_BOUNDS, OUT_OF_BOUNDS_STATE, UNOCCUPIED,
};
pub use protocol::{
    ChecksumReport, FrameReader, GameEnd, GameJoin, GameTick, LeaderboardUpdate, Packet,
    PacketRegistry, PlayersUpdate, ProtocolError, RequestJoin, ResendBoard, UpdateDir,
    LEADERBOARD_SIZE, MAX_PACKET_BYTES,
};
pub use window::{
    checksum, edge_positions, rle_decode, rle_encode, RleError, Run, Window, VIEW_RADIUS,
    VIEW_SIZE, WINDOW_CELLS,
};
