//! Error types for the backup engine.
//!
//! `EngineError` represents run-level errors that prevent a backup from
//! starting or continuing. Per-file problems are never `EngineError`s: the
//! host reports them as `HostError`, and the run records them on the action
//! as an `ActionError` before moving on to the next file.

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a backup run as a whole.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The project tree could not be enumerated
    #[error("Failed to enumerate project folder: {}", .path.display())]
    EnumerationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The project root is missing or is not a folder
    #[error("Project folder not found: {}", .path.display())]
    ProjectNotFound { path: PathBuf },

    /// The destination root cannot be used
    #[error("Destination unavailable: {} ({reason})", .path.display())]
    DestinationUnavailable { path: PathBuf, reason: String },

    /// A plan operation was called in the wrong state
    #[error("Invalid plan state: {0}")]
    InvalidState(String),
}

/// A failure reported by the host while handling one document.
///
/// `name` is a short error class (e.g. `NotFound`, `ExportRejected`) and
/// `message` the human-readable text shown to the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{name}: {message}")]
pub struct HostError {
    pub name: String,
    pub message: String,
}

impl HostError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        HostError {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<io::Error> for HostError {
    fn from(err: io::Error) -> Self {
        HostError::new(format!("{:?}", err.kind()), err.to_string())
    }
}

/// The step of the per-file export sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionStep {
    Open,
    Activate,
    RemoveLinks,
    CreateDirectory,
    Export,
    Close,
    /// Rejected by the collision policy before reaching the host
    Collision,
}

impl fmt::Display for ActionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionStep::Open => "open",
            ActionStep::Activate => "activate",
            ActionStep::RemoveLinks => "remove links",
            ActionStep::CreateDirectory => "create directory",
            ActionStep::Export => "export",
            ActionStep::Close => "close",
            ActionStep::Collision => "collision check",
        };
        f.write_str(s)
    }
}

/// Error recorded on a failed action.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{step} failed ({name}): {message}")]
pub struct ActionError {
    pub step: ActionStep,
    pub name: String,
    pub message: String,
}

impl ActionError {
    pub fn from_host(step: ActionStep, err: HostError) -> Self {
        ActionError {
            step,
            name: err.name,
            message: err.message,
        }
    }
}
