//! Dedicated turn-processing worker
//!
//! One thread owns the workflow engine and the context store and
//! processes commands strictly in arrival order, so the context save
//! for turn N always happens before turn N+1 loads. The bounded
//! channels double as backpressure: the expensive model resources are
//! never invoked concurrently.

use crate::context::ContextStore;
use crate::workflow::WorkflowEngine;
use crate::{ParleyError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::PathBuf;
use std::thread::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Commands accepted by the turn worker
#[derive(Debug, Clone)]
pub enum TurnCommand {
    /// Run one full turn over the referenced utterance
    Process { turn_id: Uuid, audio_ref: PathBuf },

    /// Stop the worker after the current command
    Shutdown,
}

/// Events emitted by the turn worker
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// The turn completed; response audio is at `output_audio_ref`
    Completed {
        turn_id: Uuid,
        output_audio_ref: PathBuf,
    },

    /// The turn failed; partial progress was persisted
    Failed { turn_id: Uuid, reason: String },

    /// The worker has shut down
    Shutdown,
}

/// Cloneable handle for submitting turns and receiving their outcomes
#[derive(Clone)]
pub struct TurnWorkerHandle {
    command_tx: Sender<TurnCommand>,
    event_rx: Receiver<TurnEvent>,
}

impl TurnWorkerHandle {
    /// Submit a turn, returning its id
    pub fn submit(&self, audio_ref: PathBuf) -> Result<Uuid> {
        let turn_id = Uuid::new_v4();
        self.command_tx
            .send(TurnCommand::Process { turn_id, audio_ref })
            .map_err(|e| ParleyError::ChannelError(format!("submit turn: {}", e)))?;
        Ok(turn_id)
    }

    /// Block until the next worker event
    pub fn recv_event(&self) -> Result<TurnEvent> {
        self.event_rx
            .recv()
            .map_err(|e| ParleyError::ChannelError(format!("receive event: {}", e)))
    }

    /// Ask the worker to stop
    pub fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(TurnCommand::Shutdown)
            .map_err(|e| ParleyError::ChannelError(format!("shutdown: {}", e)))
    }
}

pub struct TurnWorker {
    engine: WorkflowEngine,
    store: ContextStore,
    command_rx: Receiver<TurnCommand>,
    event_tx: Sender<TurnEvent>,
    handle: TurnWorkerHandle,
}

impl TurnWorker {
    pub fn new(engine: WorkflowEngine, store: ContextStore) -> Self {
        let (command_tx, command_rx) = bounded(1);
        let (event_tx, event_rx) = bounded(1);

        Self {
            engine,
            store,
            command_rx,
            event_tx,
            handle: TurnWorkerHandle {
                command_tx,
                event_rx,
            },
        }
    }

    pub fn handle(&self) -> TurnWorkerHandle {
        self.handle.clone()
    }

    /// Spawn the worker thread, consuming the worker
    pub fn start_worker(self) -> JoinHandle<()> {
        let TurnWorker {
            engine,
            store,
            command_rx,
            event_tx,
            handle: _,
        } = self;

        std::thread::spawn(move || {
            info!("Turn worker started");

            for command in command_rx.iter() {
                match command {
                    TurnCommand::Process { turn_id, audio_ref } => {
                        let event = process_turn(&engine, &store, turn_id, audio_ref);
                        if event_tx.send(event).is_err() {
                            warn!("Event channel disconnected");
                            break;
                        }
                    }
                    TurnCommand::Shutdown => {
                        info!("Turn worker shutting down");
                        let _ = event_tx.send(TurnEvent::Shutdown);
                        break;
                    }
                }
            }

            info!("Turn worker stopped");
        })
    }
}

fn process_turn(
    engine: &WorkflowEngine,
    store: &ContextStore,
    turn_id: Uuid,
    audio_ref: PathBuf,
) -> TurnEvent {
    info!("Processing turn {} for {:?}", turn_id, audio_ref);

    let mut context = store.load();
    context.begin_turn(audio_ref);

    let outcome = engine.run(&mut context);

    // Persist success and handled failure alike: partial progress from
    // completed stages is never discarded.
    if let Err(e) = store.save(&context) {
        // The in-memory result still goes back to the client
        error!("Turn {}: context save failed: {}", turn_id, e);
    }

    match outcome {
        Ok(()) => match context.output_audio_ref {
            Some(output_audio_ref) => TurnEvent::Completed {
                turn_id,
                output_audio_ref,
            },
            None => TurnEvent::Failed {
                turn_id,
                reason: "workflow produced no output audio".to_string(),
            },
        },
        Err(e) => {
            error!("Turn {} failed: {}", turn_id, e);
            TurnEvent::Failed {
                turn_id,
                reason: e.client_message(),
            }
        }
    }
}
