//! TCP front end for the turn protocol
//!
//! One client session at a time: the accept loop serves a connection to
//! completion before accepting the next. Within a session, requests are
//! read, processed and answered strictly one at a time; a request sent
//! while a turn is in flight waits in the socket buffer until the
//! handler is back in `AwaitingTurn` (queued, never concurrent).

use super::handler::Session;
use super::protocol::{parse_client_line, ClientMessage, ServerMessage};
use super::worker::{TurnEvent, TurnWorkerHandle};
use crate::{ParleyError, Result};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};
use uuid::Uuid;

pub struct TurnServer {
    listener: TcpListener,
    worker: TurnWorkerHandle,
}

impl TurnServer {
    /// Bind the listen socket
    pub async fn bind(addr: &str, worker: TurnWorkerHandle) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ParleyError::IOError(format!("bind {}: {}", addr, e)))?;
        info!("Listening on {}", addr);
        Ok(Self { listener, worker })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| ParleyError::IOError(e.to_string()))
    }

    /// Accept and serve sessions forever
    pub async fn run(self) -> Result<()> {
        loop {
            info!("Awaiting connection");
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| ParleyError::IOError(format!("accept: {}", e)))?;

            // Session-level errors end the session, never the server
            if let Err(e) = handle_session(stream, peer, &self.worker).await {
                warn!("Session with {} ended with error: {}", peer, e);
            }
        }
    }
}

async fn handle_session(
    stream: TcpStream,
    peer: SocketAddr,
    worker: &TurnWorkerHandle,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut session = Session::new(peer);

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            // Clean disconnect; an in-flight turn is never auto-resumed
            Ok(None) => break,
            Err(e) => {
                session.close();
                return Err(ParleyError::IOError(format!("read from {}: {}", peer, e)));
            }
        };

        let ClientMessage::TurnRequest { audio_ref } = match parse_client_line(&line) {
            Ok(message) => message,
            Err(e) => {
                let reply = ServerMessage::TurnFailed {
                    reason: e.client_message(),
                };
                let _ = send(&mut write_half, &reply).await;
                session.close();
                return Err(e);
            }
        };

        if let Err(e) = session.begin_turn() {
            let reply = ServerMessage::TurnFailed {
                reason: e.client_message(),
            };
            let _ = send(&mut write_half, &reply).await;
            session.close();
            return Err(e);
        }
        let turn_id = worker.submit(audio_ref)?;
        let reply = match await_turn(worker, turn_id).await? {
            TurnEvent::Completed {
                output_audio_ref, ..
            } => ServerMessage::TurnOk {
                audio_ref: output_audio_ref,
            },
            TurnEvent::Failed { reason, .. } => ServerMessage::TurnFailed { reason },
            TurnEvent::Shutdown => {
                session.close();
                return Err(ParleyError::ChannelError("worker shut down mid-turn".to_string()));
            }
        };

        send(&mut write_half, &reply).await?;
        session.finish_turn()?;
        session.next_turn()?;
    }

    session.close();
    Ok(())
}

/// Wait for this turn's outcome
///
/// Events for a turn whose session already disconnected may still be in
/// the channel; they are discarded, not delivered to the wrong session.
async fn await_turn(worker: &TurnWorkerHandle, turn_id: Uuid) -> Result<TurnEvent> {
    loop {
        let handle = worker.clone();
        let event = tokio::task::spawn_blocking(move || handle.recv_event())
            .await
            .map_err(|e| ParleyError::ChannelError(format!("await turn: {}", e)))??;

        match &event {
            TurnEvent::Completed { turn_id: id, .. } | TurnEvent::Failed { turn_id: id, .. }
                if *id != turn_id =>
            {
                warn!("Discarding stale event for abandoned turn {}", id);
            }
            _ => return Ok(event),
        }
    }
}

async fn send(write_half: &mut OwnedWriteHalf, message: &ServerMessage) -> Result<()> {
    write_half
        .write_all(message.encode().as_bytes())
        .await
        .map_err(|e| ParleyError::IOError(format!("write response: {}", e)))
}
