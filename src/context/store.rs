//! Durable storage for the turn context
//!
//! The on-disk record is a human-inspectable JSON mapping of the
//! `TurnContext` fields, written atomically after every turn. A missing
//! or unreadable record is never fatal: the session simply starts from a
//! fresh context and prior history is rebuilt from that point on.

use super::types::TurnContext;
use crate::{ParleyError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct ContextStore {
    path: PathBuf,
}

impl ContextStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted context, or a default one
    ///
    /// Missing file and corrupt record are both recoverable conditions:
    /// corruption is logged and treated as "start fresh".
    pub fn load(&self) -> TurnContext {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No context record at {:?}, starting fresh", self.path);
                return TurnContext::new();
            }
            Err(e) => {
                warn!("Context record at {:?} unreadable ({}), starting fresh", self.path, e);
                return TurnContext::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(context) => {
                info!("Loaded context from {:?}", self.path);
                context
            }
            Err(e) => {
                warn!("Context record at {:?} is corrupt ({}), starting fresh", self.path, e);
                TurnContext::new()
            }
        }
    }

    /// Persist the context atomically
    ///
    /// Writes to a sibling temp file and renames it into place so a
    /// crash mid-save never leaves a half-written record.
    pub fn save(&self, context: &TurnContext) -> Result<()> {
        let json = serde_json::to_string_pretty(context)
            .map_err(|e| ParleyError::PersistenceError(format!("serialize: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    ParleyError::PersistenceError(format!("create {:?}: {}", parent, e))
                })?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| ParleyError::PersistenceError(format!("write {:?}: {}", tmp, e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| ParleyError::PersistenceError(format!("rename {:?}: {}", tmp, e)))?;

        info!("Saved context to {:?}", self.path);
        Ok(())
    }
}
