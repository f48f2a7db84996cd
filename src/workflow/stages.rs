//! The canonical turn graph: transcribe → reason → synthesize → END
//!
//! The transcribe stage records the utterance as a user history entry;
//! the reason and synthesize stages only overwrite their turn-scoped
//! fields. An empty transcript is a valid result of the transcribe stage
//! (silence, non-speech audio) and flows through the remaining stages
//! unchanged.

use super::graph::{Edge, StageGraph, StageUpdate};
use crate::context::{Role, TurnContext, TurnRecord};
use crate::services::ServiceRegistry;
use crate::{ParleyError, Result};
use tracing::info;

pub const STAGE_TRANSCRIBE: &str = "transcribe";
pub const STAGE_REASON: &str = "reason";
pub const STAGE_SYNTHESIZE: &str = "synthesize";

/// Build the canonical linear graph
pub fn canonical_graph() -> Result<StageGraph> {
    StageGraph::builder()
        .entry(STAGE_TRANSCRIBE)
        .stage(STAGE_TRANSCRIBE, transcribe_stage, Edge::always(STAGE_REASON))
        .stage(STAGE_REASON, reason_stage, Edge::always(STAGE_SYNTHESIZE))
        .stage(STAGE_SYNTHESIZE, synthesize_stage, Edge::End)
        .build()
}

fn transcribe_stage(context: &TurnContext, services: &ServiceRegistry) -> Result<StageUpdate> {
    let audio_ref = context.input_audio_ref.as_deref().ok_or_else(|| {
        ParleyError::WorkflowError("no input audio reference for this turn".to_string())
    })?;

    let transcript = services.transcription.invoke(audio_ref)?;
    info!("Transcribed utterance: '{}'", transcript);

    Ok(StageUpdate {
        history: vec![TurnRecord::new(Role::User, transcript.clone())],
        transcript: Some(transcript),
        ..StageUpdate::default()
    })
}

fn reason_stage(context: &TurnContext, services: &ServiceRegistry) -> Result<StageUpdate> {
    let response_text = services.reasoning.invoke(&context.transcript, context)?;

    Ok(StageUpdate {
        response_text: Some(response_text),
        ..StageUpdate::default()
    })
}

fn synthesize_stage(context: &TurnContext, services: &ServiceRegistry) -> Result<StageUpdate> {
    let audio_ref = services.synthesis.invoke(&context.response_text)?;
    info!("Synthesized response to {:?}", audio_ref);

    Ok(StageUpdate {
        output_audio_ref: Some(audio_ref),
        ..StageUpdate::default()
    })
}
