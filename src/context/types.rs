use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl TurnRecord {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The work target the assistant is currently operating on
///
/// Carried across turns until a stage explicitly changes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Focus {
    pub project: Option<String>,
    pub directory: Option<String>,
    pub file: Option<String>,
}

impl Focus {
    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.directory.is_none() && self.file.is_none()
    }
}

/// The persisted conversational state carried across turns
///
/// Exactly one context is current per session. It is loaded at the start
/// of a turn, mutated by the workflow stages, and replaced in durable
/// storage at the end of the turn.
///
/// `conversation_history` is the only field with cross-turn append
/// semantics; every other field is a turn-scoped overwrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnContext {
    /// Chronological conversation history, append-only within a session
    pub conversation_history: Vec<TurnRecord>,

    /// Active work target, carried until explicitly changed
    pub current_focus: Option<Focus>,

    /// Most recently received utterance audio; valid only within its turn
    pub input_audio_ref: Option<PathBuf>,

    /// Most recently synthesized response audio; valid until the next
    /// turn overwrites it
    pub output_audio_ref: Option<PathBuf>,

    /// Transcription result for the current turn
    pub transcript: String,

    /// Reasoning result for the current turn; input to synthesis
    pub response_text: String,
}

impl TurnContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset turn-scoped fields for a new turn and record the input audio
    ///
    /// A failed previous turn must never leak stale transcript or
    /// response text into this one.
    pub fn begin_turn(&mut self, audio_ref: impl Into<PathBuf>) {
        self.input_audio_ref = Some(audio_ref.into());
        self.output_audio_ref = None;
        self.transcript.clear();
        self.response_text.clear();
    }

    /// Append a user record to the conversation history
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.conversation_history.push(TurnRecord::new(Role::User, text));
    }

    /// Append an assistant record to the conversation history
    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.conversation_history
            .push(TurnRecord::new(Role::Assistant, text));
    }

    /// Number of history records
    pub fn history_len(&self) -> usize {
        self.conversation_history.len()
    }
}
