pub mod config;
pub mod context;
pub mod services;
pub mod session;
pub mod workflow;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ParleyError {
    #[error("Adapter initialization error: {0}")]
    AdapterInitError(String),

    #[error("Adapter call error: {0}")]
    AdapterCallError(String),

    #[error("Workflow error: {0}")]
    WorkflowError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl From<std::io::Error> for ParleyError {
    fn from(e: std::io::Error) -> Self {
        ParleyError::IOError(e.to_string())
    }
}

impl ParleyError {
    /// Check if this error is recoverable
    ///
    /// Recoverable errors fail the current turn but leave the session
    /// (and the process) able to serve the next one.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // A service that failed to initialize stays broken for the
            // process lifetime, but the session itself keeps running
            ParleyError::AdapterInitError(_) => false,
            // Single invocation failures are transient
            ParleyError::AdapterCallError(_) => true,
            // A failed stage aborts one turn only
            ParleyError::WorkflowError(_) => true,
            // Unreadable records are recovered as a fresh context
            ParleyError::PersistenceError(_) => true,
            // Malformed client traffic closes the session
            ParleyError::ProtocolError(_) => false,
            ParleyError::IOError(_) => false,
            ParleyError::ConfigError(_) => false,
            ParleyError::ChannelError(_) => false,
        }
    }

    /// Get a description safe to send back over the wire
    ///
    /// Never leaks file paths or internal detail to the client.
    pub fn client_message(&self) -> String {
        match self {
            ParleyError::AdapterInitError(_) => {
                "A speech service is unavailable.".to_string()
            }
            ParleyError::AdapterCallError(_) => {
                "Speech processing failed. Please try again.".to_string()
            }
            ParleyError::WorkflowError(_) => {
                "The turn could not be completed. Please try again.".to_string()
            }
            ParleyError::PersistenceError(_) => {
                "The turn completed but could not be saved.".to_string()
            }
            ParleyError::ProtocolError(_) => {
                "Malformed request.".to_string()
            }
            ParleyError::IOError(_) => {
                "File system error occurred.".to_string()
            }
            ParleyError::ConfigError(_) => {
                "Server configuration error.".to_string()
            }
            ParleyError::ChannelError(_) => {
                "Internal communication error.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;
