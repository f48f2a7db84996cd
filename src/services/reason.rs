//! Reasoning service boundary
//!
//! Deliberately minimal: the current backend echoes the transcript back
//! as the response. The adapter contract hands the backend the full turn
//! context so a real reasoning engine (tool use, multi-turn planning)
//! can replace `EchoReasoner` without touching the workflow engine.

use super::adapter::{AdapterStatus, LazyService};
use crate::context::TurnContext;
use crate::Result;
use tracing::debug;

pub trait ReasonBackend: Send {
    /// Produce a response for the transcript given the accumulated context
    fn respond(&mut self, transcript: &str, context: &TurnContext) -> Result<String>;
}

/// Pass-through reasoner: the response is the transcript
pub struct EchoReasoner;

impl ReasonBackend for EchoReasoner {
    fn respond(&mut self, transcript: &str, context: &TurnContext) -> Result<String> {
        debug!(
            "Echo reasoner responding with {} history records in scope",
            context.history_len()
        );
        Ok(transcript.to_string())
    }
}

/// Uniform wrapper around the reasoning service
pub struct ReasoningAdapter {
    service: LazyService<Box<dyn ReasonBackend>>,
}

impl ReasoningAdapter {
    pub fn new(
        init: impl Fn() -> Result<Box<dyn ReasonBackend>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            service: LazyService::new("reasoning", init),
        }
    }

    /// Pass-through constructor for the current echo backend
    pub fn echo() -> Self {
        Self::new(|| Ok(Box::new(EchoReasoner) as Box<dyn ReasonBackend>))
    }

    pub fn invoke(&self, transcript: &str, context: &TurnContext) -> Result<String> {
        self.service
            .with(|backend| backend.respond(transcript, context))
    }

    pub fn status(&self) -> AdapterStatus {
        self.service.status()
    }
}
