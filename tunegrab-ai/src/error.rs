//! Error types for tunegrab-ai
//!
//! Four failure families drive pipeline routing:
//! - `MalformedInput`: upstream data violates its contract (normalizer only)
//! - `NoMatch`: nothing viable was found; a normal negative outcome
//! - `Collaborator`: an external capability failed
//! - `IntegrityMismatch`: a verified transfer could not prove its copy

use std::path::PathBuf;
use thiserror::Error;

/// Acquisition error type
#[derive(Debug, Error)]
pub enum AcquireError {
    /// Unparseable upstream data (duration text, identifiers)
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Selector found no candidate above the viability threshold
    #[error("No match for query '{query}'")]
    NoMatch { query: String },

    /// External collaborator call failed
    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },

    /// Transfer verification failed; both files were left in place
    #[error("Integrity mismatch moving {src} to {dst}: {detail}")]
    IntegrityMismatch {
        src: PathBuf,
        dst: PathBuf,
        detail: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// tunegrab-common error
    #[error("Common error: {0}")]
    Common(#[from] tunegrab_common::Error),
}

impl AcquireError {
    /// Build a collaborator failure from any displayable error
    pub fn collaborator(collaborator: &'static str, err: impl std::fmt::Display) -> Self {
        AcquireError::Collaborator {
            collaborator,
            message: err.to_string(),
        }
    }
}

/// Result type for acquisition operations
pub type AcquireResult<T> = Result<T, AcquireError>;
