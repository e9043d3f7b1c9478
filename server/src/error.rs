use shared::ProtocolError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failures that end the acceptor or a single connection. None of them stop a game session.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },
    #[error("connection i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("no keep-alive received for {0:?}")]
    KeepAliveTimeout(Duration),
}
