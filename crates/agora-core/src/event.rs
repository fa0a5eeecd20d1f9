//! Stream protocol events.
//!
//! Each event serializes to one JSON object with a `type` tag; the wire
//! form is newline-delimited JSON (`application/x-ndjson`).

use serde::{Deserialize, Serialize};

use crate::transcript::Turn;

/// MIME type of the serialized event stream.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// One event in a debate stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DebateEvent {
    /// Progress or status message.
    Info { message: String },
    /// A single point by one speaker.
    Turn {
        speaker: String,
        content: String,
        round: u32,
    },
    /// The final, fence-stripped judge payload. Always the last event.
    Verdict { content: String },
}

impl DebateEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self::Info {
            message: message.into(),
        }
    }

    pub fn verdict(content: impl Into<String>) -> Self {
        Self::Verdict {
            content: content.into(),
        }
    }

    pub fn is_verdict(&self) -> bool {
        matches!(self, Self::Verdict { .. })
    }

    /// Serialize as one NDJSON line, including the trailing newline.
    pub fn to_ndjson(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

impl From<Turn> for DebateEvent {
    fn from(turn: Turn) -> Self {
        Self::Turn {
            speaker: turn.speaker,
            content: turn.content,
            round: turn.round,
        }
    }
}

impl From<&Turn> for DebateEvent {
    fn from(turn: &Turn) -> Self {
        turn.clone().into()
    }
}
