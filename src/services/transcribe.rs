//! Speech-to-text service boundary
//!
//! The model runs out of process: the backend hands the utterance WAV to
//! a configured ASR command and reads the transcript from its stdout.
//! Silence and non-speech audio transcribe to empty text, which is a
//! normal result for a turn, not a fault.

use super::adapter::{AdapterStatus, LazyService};
use super::resolve_program;
use crate::config::BackendCommand;
use crate::{ParleyError, Result};
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

pub trait TranscribeBackend: Send {
    /// Transcribe the referenced utterance to plain text
    ///
    /// Returns empty text for silence or non-speech audio.
    fn transcribe(&mut self, audio_ref: &Path) -> Result<String>;
}

/// Peak absolute amplitude of a WAV file, normalized to [0, 1]
///
/// `None` when the file is not a readable WAV.
pub fn wav_peak_amplitude(path: &Path) -> Option<f32> {
    let mut reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();

    let peak = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .filter_map(|s| s.ok())
            .fold(0.0f32, |peak, s| peak.max(s.abs())),
        hound::SampleFormat::Int => {
            let full_scale = ((1u32 << (spec.bits_per_sample - 1)) as f32).max(1.0);
            reader
                .samples::<i32>()
                .filter_map(|s| s.ok())
                .fold(0.0f32, |peak, s| peak.max((s as f32 / full_scale).abs()))
        }
    };
    Some(peak)
}

/// ASR via an external command: `<program> <args..> <audio-path>`
#[derive(Debug)]
pub struct CommandTranscriber {
    command: BackendCommand,
    silence_threshold: f32,
}

impl CommandTranscriber {
    /// Create the backend, probing that the program resolves
    ///
    /// A program that cannot be found is an initialization failure, not
    /// a per-call one: there is no point re-probing it every turn.
    pub fn new(command: BackendCommand, silence_threshold: f32) -> Result<Self> {
        if resolve_program(&command.program).is_none() {
            return Err(ParleyError::AdapterInitError(format!(
                "transcriber program '{}' not found",
                command.program
            )));
        }
        Ok(Self {
            command,
            silence_threshold,
        })
    }
}

impl TranscribeBackend for CommandTranscriber {
    fn transcribe(&mut self, audio_ref: &Path) -> Result<String> {
        if !audio_ref.exists() {
            return Err(ParleyError::AdapterCallError(format!(
                "utterance file {:?} not found",
                audio_ref
            )));
        }

        // Gate silence and unreadable audio before paying for the model
        match wav_peak_amplitude(audio_ref) {
            Some(peak) if peak < self.silence_threshold => {
                debug!("Utterance {:?} below silence threshold (peak {:.4})", audio_ref, peak);
                return Ok(String::new());
            }
            Some(_) => {}
            None => {
                warn!("Utterance {:?} is not readable audio, treating as non-speech", audio_ref);
                return Ok(String::new());
            }
        }

        let output = Command::new(&self.command.program)
            .args(&self.command.args)
            .arg(audio_ref)
            .output()
            .map_err(|e| {
                ParleyError::AdapterCallError(format!(
                    "transcriber '{}' failed to run: {}",
                    self.command.program, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ParleyError::AdapterCallError(format!(
                "transcriber exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Uniform wrapper around the speech-to-text service
pub struct TranscriptionAdapter {
    service: LazyService<Box<dyn TranscribeBackend>>,
}

impl TranscriptionAdapter {
    pub fn new(
        init: impl Fn() -> Result<Box<dyn TranscribeBackend>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            service: LazyService::new("transcription", init),
        }
    }

    pub fn invoke(&self, audio_ref: &Path) -> Result<String> {
        self.service.with(|backend| backend.transcribe(audio_ref))
    }

    pub fn status(&self) -> AdapterStatus {
        self.service.status()
    }
}
