//! Adapters for the external speech and reasoning services
//!
//! Each adapter owns one lazily initialized, process-wide resource and
//! exposes a uniform `invoke` call. The registry groups the three and is
//! passed by reference into the workflow engine; nothing here is reached
//! through ambient globals.

pub mod adapter;
pub mod reason;
pub mod synthesize;
pub mod transcribe;

pub use adapter::{AdapterStatus, LazyService};
pub use reason::{EchoReasoner, ReasonBackend, ReasoningAdapter};
pub use synthesize::{CommandSynthesizer, SynthesisAdapter, SynthesizeBackend};
pub use transcribe::{CommandTranscriber, TranscribeBackend, TranscriptionAdapter};

use crate::config::ServerConfig;
use std::path::{Path, PathBuf};

/// Name of the response audio file, overwritten every turn
pub const RESPONSE_AUDIO_FILENAME: &str = "response.wav";

/// Resolve a program name against PATH, or verify an explicit path
pub(crate) fn resolve_program(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// The process-wide set of service adapters
pub struct ServiceRegistry {
    pub transcription: TranscriptionAdapter,
    pub reasoning: ReasoningAdapter,
    pub synthesis: SynthesisAdapter,
}

impl ServiceRegistry {
    pub fn new(
        transcription: TranscriptionAdapter,
        reasoning: ReasoningAdapter,
        synthesis: SynthesisAdapter,
    ) -> Self {
        Self {
            transcription,
            reasoning,
            synthesis,
        }
    }

    /// Build the registry with the configured command backends
    ///
    /// Construction is cheap: each heavy resource is acquired on its
    /// first invocation, not here.
    pub fn from_config(config: &ServerConfig) -> Self {
        let transcriber = config.transcriber.clone();
        let threshold = config.silence_threshold;
        let transcription = TranscriptionAdapter::new(move || {
            Ok(Box::new(CommandTranscriber::new(transcriber.clone(), threshold)?)
                as Box<dyn TranscribeBackend>)
        });

        let synthesizer = config.synthesizer.clone();
        let synthesis = SynthesisAdapter::new(
            config.output_dir.join(RESPONSE_AUDIO_FILENAME),
            move || {
                Ok(Box::new(CommandSynthesizer::new(synthesizer.clone())?)
                    as Box<dyn SynthesizeBackend>)
            },
        );

        Self::new(transcription, ReasoningAdapter::echo(), synthesis)
    }
}
