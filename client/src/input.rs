//! Player intents and the text front end that produces them.
//!
//! A presentation layer pushes [`Intent`]s into a [`DirectionSink`]; the
//! network loop drains the other end. The headless binary feeds it from stdin,
//! one command per line.

use log::{debug, warn};
use shared::Direction;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Steer(Direction),
    /// Ask for a (new) game. An empty name keeps the previous one.
    Join(String),
    Quit,
}

/// Sending half of the intent channel.
#[derive(Debug, Clone)]
pub struct DirectionSink {
    tx: mpsc::UnboundedSender<Intent>,
}

impl DirectionSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Intent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns `false` once the network loop is gone.
    pub fn send(&self, intent: Intent) -> bool {
        self.tx.send(intent).is_ok()
    }

    pub fn steer(&self, direction: Direction) -> bool {
        self.send(Intent::Steer(direction))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Parses one line of text input. WASD, vi keys and arrow names all steer.
pub fn parse_intent(line: &str) -> Option<Intent> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let intent = match word.to_ascii_lowercase().as_str() {
        "w" | "k" | "up" => Intent::Steer(Direction::Up),
        "a" | "h" | "left" => Intent::Steer(Direction::Left),
        "s" | "j" | "down" => Intent::Steer(Direction::Down),
        "d" | "l" | "right" => Intent::Steer(Direction::Right),
        "join" | "play" => Intent::Join(rest.to_string()),
        "q" | "quit" | "exit" => Intent::Quit,
        _ => return None,
    };
    Some(intent)
}

/// Reads commands until EOF or `quit`, forwarding them to `sink`.
pub async fn read_commands<R: AsyncBufRead + Unpin>(input: R, sink: DirectionSink) {
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read input: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let Some(intent) = parse_intent(&line) else {
            debug!("Ignoring input {:?}", line);
            continue;
        };
        let quit = intent == Intent::Quit;
        if !sink.send(intent) || quit {
            return;
        }
    }
    sink.send(Intent::Quit);
}
