//! Per-session state machine
//!
//! Enforces the strict request/response alternation of the protocol:
//! at most one turn is in flight at any instant, guaranteed by the
//! transitions themselves rather than by transport serialization, so
//! the invariant is testable on its own.

use crate::{ParleyError, Result};
use std::net::SocketAddr;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, waiting for the next turn request
    #[default]
    AwaitingTurn,
    /// The workflow is running; no new request may begin
    Processing,
    /// The response has been sent; about to await the next turn
    TurnComplete,
    /// Disconnected; terminal
    Closed,
}

impl SessionState {
    pub fn is_processing(&self) -> bool {
        matches!(self, SessionState::Processing)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::AwaitingTurn => write!(f, "AwaitingTurn"),
            SessionState::Processing => write!(f, "Processing"),
            SessionState::TurnComplete => write!(f, "TurnComplete"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}

pub struct Session {
    peer: SocketAddr,
    state: SessionState,
    turns_completed: u64,
}

impl Session {
    pub fn new(peer: SocketAddr) -> Self {
        info!("Session with {} established", peer);
        Self {
            peer,
            state: SessionState::AwaitingTurn,
            turns_completed: 0,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn turns_completed(&self) -> u64 {
        self.turns_completed
    }

    /// Accept a turn request: `AwaitingTurn -> Processing`
    ///
    /// Refused in every other state; in particular a request arriving
    /// while a turn is already in flight is a protocol violation.
    pub fn begin_turn(&mut self) -> Result<()> {
        match self.state {
            SessionState::AwaitingTurn => {
                self.state = SessionState::Processing;
                debug!("Session {}: turn started", self.peer);
                Ok(())
            }
            SessionState::Processing => Err(ParleyError::ProtocolError(
                "turn request received while a turn is in flight".to_string(),
            )),
            other => Err(ParleyError::ProtocolError(format!(
                "turn request received in state {}",
                other
            ))),
        }
    }

    /// Record that the response was sent: `Processing -> TurnComplete`
    pub fn finish_turn(&mut self) -> Result<()> {
        match self.state {
            SessionState::Processing => {
                self.state = SessionState::TurnComplete;
                self.turns_completed += 1;
                debug!("Session {}: turn {} complete", self.peer, self.turns_completed);
                Ok(())
            }
            other => Err(ParleyError::ProtocolError(format!(
                "finish_turn in state {}",
                other
            ))),
        }
    }

    /// Return to awaiting input: `TurnComplete -> AwaitingTurn`
    pub fn next_turn(&mut self) -> Result<()> {
        match self.state {
            SessionState::TurnComplete => {
                self.state = SessionState::AwaitingTurn;
                Ok(())
            }
            other => Err(ParleyError::ProtocolError(format!(
                "next_turn in state {}",
                other
            ))),
        }
    }

    /// Terminal transition, valid from any state
    ///
    /// A turn that was in flight is abandoned; the client re-initiates
    /// after reconnecting, it is never resumed automatically.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            info!(
                "Session with {} closed after {} turns",
                self.peer, self.turns_completed
            );
            self.state = SessionState::Closed;
        }
    }
}
