//! Text-to-speech service boundary
//!
//! The backend hands the response text to a configured TTS command that
//! writes a WAV to the requested path. The output file name is fixed:
//! each turn overwrites the previous response, which stays valid until
//! then.

use super::adapter::{AdapterStatus, LazyService};
use super::resolve_program;
use crate::config::BackendCommand;
use crate::{ParleyError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

pub trait SynthesizeBackend: Send {
    /// Synthesize `text` into a WAV at `out_path`
    fn synthesize(&mut self, text: &str, out_path: &Path) -> Result<()>;
}

/// TTS via an external command: `<program> <args..> <text> <out-path>`
#[derive(Debug)]
pub struct CommandSynthesizer {
    command: BackendCommand,
}

impl CommandSynthesizer {
    /// Create the backend, probing that the program resolves
    pub fn new(command: BackendCommand) -> Result<Self> {
        if resolve_program(&command.program).is_none() {
            return Err(ParleyError::AdapterInitError(format!(
                "synthesizer program '{}' not found",
                command.program
            )));
        }
        Ok(Self { command })
    }
}

impl SynthesizeBackend for CommandSynthesizer {
    fn synthesize(&mut self, text: &str, out_path: &Path) -> Result<()> {
        let output = Command::new(&self.command.program)
            .args(&self.command.args)
            .arg(text)
            .arg(out_path)
            .output()
            .map_err(|e| {
                ParleyError::AdapterCallError(format!(
                    "synthesizer '{}' failed to run: {}",
                    self.command.program, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ParleyError::AdapterCallError(format!(
                "synthesizer exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        if !out_path.exists() {
            return Err(ParleyError::AdapterCallError(format!(
                "synthesizer produced no output at {:?}",
                out_path
            )));
        }

        debug!("Synthesized {} chars to {:?}", text.len(), out_path);
        Ok(())
    }
}

/// Uniform wrapper around the text-to-speech service
pub struct SynthesisAdapter {
    service: LazyService<Box<dyn SynthesizeBackend>>,
    out_path: PathBuf,
}

impl SynthesisAdapter {
    pub fn new(
        out_path: impl Into<PathBuf>,
        init: impl Fn() -> Result<Box<dyn SynthesizeBackend>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            service: LazyService::new("synthesis", init),
            out_path: out_path.into(),
        }
    }

    /// Synthesize the text and return the output audio reference
    pub fn invoke(&self, text: &str) -> Result<PathBuf> {
        if let Some(parent) = self.out_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ParleyError::AdapterCallError(format!("create {:?}: {}", parent, e))
                })?;
            }
        }
        self.service
            .with(|backend| backend.synthesize(text, &self.out_path))?;
        Ok(self.out_path.clone())
    }

    pub fn status(&self) -> AdapterStatus {
        self.service.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_text_command() -> BackendCommand {
        // Stands in for a TTS engine: writes the text into the out file
        BackendCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), r#"printf '%s' "$0" > "$1""#.to_string()],
        }
    }

    #[test]
    fn test_synthesis_writes_the_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("response.wav");
        let adapter = SynthesisAdapter::new(out.clone(), || {
            Ok(Box::new(CommandSynthesizer::new(write_text_command())?)
                as Box<dyn SynthesizeBackend>)
        });

        let audio_ref = adapter.invoke("hello there").unwrap();
        assert_eq!(audio_ref, out);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello there");
    }

    #[test]
    fn test_next_turn_overwrites_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("response.wav");
        let adapter = SynthesisAdapter::new(out.clone(), || {
            Ok(Box::new(CommandSynthesizer::new(write_text_command())?)
                as Box<dyn SynthesizeBackend>)
        });

        adapter.invoke("first").unwrap();
        adapter.invoke("second").unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "second");
    }

    #[test]
    fn test_output_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("pronounced").join("response.wav");
        let adapter = SynthesisAdapter::new(out.clone(), || {
            Ok(Box::new(CommandSynthesizer::new(write_text_command())?)
                as Box<dyn SynthesizeBackend>)
        });

        adapter.invoke("made the directory").unwrap();
        assert!(out.exists());
    }

    #[test]
    fn test_failing_command_is_a_call_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("response.wav");
        let command = BackendCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 3".to_string()],
        };
        let adapter = SynthesisAdapter::new(out.clone(), move || {
            Ok(Box::new(CommandSynthesizer::new(command.clone())?)
                as Box<dyn SynthesizeBackend>)
        });

        let err = adapter.invoke("doomed").unwrap_err();
        assert!(matches!(err, ParleyError::AdapterCallError(_)));

        // The adapter stays available for the next call
        assert_eq!(adapter.status(), AdapterStatus::Ready);
    }

    #[test]
    fn test_command_that_writes_nothing_is_a_call_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("response.wav");
        let command = BackendCommand {
            program: "true".to_string(),
            args: vec![],
        };
        let adapter = SynthesisAdapter::new(out.clone(), move || {
            Ok(Box::new(CommandSynthesizer::new(command.clone())?)
                as Box<dyn SynthesizeBackend>)
        });

        let err = adapter.invoke("silent failure").unwrap_err();
        assert!(matches!(err, ParleyError::AdapterCallError(_)));
    }

    #[test]
    fn test_unknown_program_is_an_init_error() {
        let err = CommandSynthesizer::new(BackendCommand::new("definitely-not-a-real-tts"))
            .unwrap_err();
        assert!(matches!(err, ParleyError::AdapterInitError(_)));
    }
}
