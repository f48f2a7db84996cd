//! Server configuration
//!
//! Defaults mirror the deployment layout of the original assistant:
//! received utterances and synthesized responses live under a shared
//! audio directory next to the durable context record.

use crate::{ParleyError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// An external model process invoked per call
///
/// The referenced program receives its configured arguments followed by
/// the call-specific ones (audio path for transcription, text and output
/// path for synthesis).
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct BackendCommand {
    /// Program name or path
    pub program: String,

    /// Leading arguments passed before the per-call arguments
    #[serde(default)]
    pub args: Vec<String>,
}

impl BackendCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }
}

/// Configuration for the turn server
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub host: String,

    /// Listen port
    pub port: u16,

    /// Durable turn-context record path
    pub state_path: PathBuf,

    /// Directory for synthesized response audio
    pub output_dir: PathBuf,

    /// Peak-amplitude floor below which input audio is treated as
    /// silence and transcribed as empty text
    pub silence_threshold: f32,

    /// External speech-to-text command
    pub transcriber: BackendCommand,

    /// External text-to-speech command
    pub synthesizer: BackendCommand,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5050,
            state_path: PathBuf::from("state/context.json"),
            output_dir: PathBuf::from("temp_audio/pronounced"),
            silence_threshold: 0.01,
            transcriber: BackendCommand::new("whisper-cli"),
            synthesizer: BackendCommand::new("piper-cli"),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file
    ///
    /// A missing file yields the defaults; a file that exists but does
    /// not parse is a configuration error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config file at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ParleyError::ConfigError(format!("read {:?}: {}", path, e)));
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| ParleyError::ConfigError(format!("parse {:?}: {}", path, e)))
    }

    /// Set the listen address
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the listen port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the durable context record path
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    /// Set the response audio directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the transcriber command
    pub fn with_transcriber(mut self, command: BackendCommand) -> Self {
        self.transcriber = command;
        self
    }

    /// Set the synthesizer command
    pub fn with_synthesizer(mut self, command: BackendCommand) -> Self {
        self.synthesizer = command;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(ParleyError::ConfigError("host is required".to_string()));
        }
        if self.transcriber.program.is_empty() {
            return Err(ParleyError::ConfigError(
                "transcriber program is required".to_string(),
            ));
        }
        if self.synthesizer.program.is_empty() {
            return Err(ParleyError::ConfigError(
                "synthesizer program is required".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.silence_threshold) {
            return Err(ParleyError::ConfigError(format!(
                "silence_threshold must be within [0, 1], got {}",
                self.silence_threshold
            )));
        }
        Ok(())
    }

    /// Listen address in `host:port` form
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
