//! Wire protocol for the turn exchange
//!
//! Line-based UTF-8 over a persistent TCP connection, one request and
//! one response per turn:
//!
//! ```text
//! client -> server   TURN <utterance-audio-path>
//! server -> client   OK <response-audio-path>
//! server -> client   ERR <reason>
//! ```
//!
//! The client may retrieve the response audio at the returned path once
//! `OK` arrives. Anything that does not parse as a request is a protocol
//! error and closes the session.

use crate::{ParleyError, Result};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Request one turn over the referenced utterance
    TurnRequest { audio_ref: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Turn completed; the response audio is retrievable at `audio_ref`
    TurnOk { audio_ref: PathBuf },
    /// Turn failed or the request was malformed
    TurnFailed { reason: String },
}

/// Parse one request line from the client
pub fn parse_client_line(line: &str) -> Result<ClientMessage> {
    let line = line.trim();
    match line.split_once(' ') {
        Some(("TURN", rest)) if !rest.trim().is_empty() => Ok(ClientMessage::TurnRequest {
            audio_ref: PathBuf::from(rest.trim()),
        }),
        _ => Err(ParleyError::ProtocolError(format!(
            "unrecognized request: '{}'",
            line
        ))),
    }
}

impl ServerMessage {
    /// Encode as one response line, newline included
    pub fn encode(&self) -> String {
        match self {
            ServerMessage::TurnOk { audio_ref } => {
                format!("OK {}\n", audio_ref.display())
            }
            ServerMessage::TurnFailed { reason } => {
                // The reason must stay on one line
                format!("ERR {}\n", reason.replace(['\r', '\n'], " "))
            }
        }
    }
}
