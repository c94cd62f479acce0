//! Error types for the invitation pipeline.
//!
//! Every failure the pipeline can produce maps to one variant here so that
//! callers (UI boundary, CLI) can translate it into a short user-facing
//! message without string matching.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown template id. Fatal to the generation request, never retried.
    #[error("template not found: {id}")]
    TemplateNotFound { id: String },

    /// A required font family failed to become available. Whether this aborts
    /// the render or falls back to heuristic metrics is decided by the
    /// pipeline's [`FontPolicy`](crate::pipeline::FontPolicy).
    #[error("font load failed for '{family}': {reason}")]
    FontLoad { family: String, reason: String },

    /// Off-screen layout or pixel capture failed. Fatal, not retried.
    #[error("render failed: {reason}")]
    Render { reason: String },

    /// The deployment endpoint rejected or timed out on a publish. Safe to
    /// retry: nothing is persisted on failure.
    #[error("deploy failed: {reason}")]
    Deploy { reason: String },

    /// The key-value backend failed a get/set/remove.
    #[error("storage error: {reason}")]
    Storage { reason: String },
}

impl Error {
    pub(crate) fn render(reason: impl Into<String>) -> Self {
        Error::Render {
            reason: reason.into(),
        }
    }

    pub(crate) fn storage(reason: impl Into<String>) -> Self {
        Error::Storage {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::storage(e.to_string())
    }
}

/// Shorthand result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
