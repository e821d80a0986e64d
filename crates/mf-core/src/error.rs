//! Unified error type for the mediaforge crates.
//!
//! Failures fall into two groups. Submission rejections
//! ([`Error::is_submission_rejection`]) are raised synchronously before any
//! work reaches the execution layer. Everything else is either reported
//! asynchronously through a task's terminal status or comes from plumbing
//! (I/O, tools, configuration).

use std::fmt;

use crate::ids::TaskId;
use crate::media::MediaKind;

/// Unified error type covering all failure modes in mediaforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A mandatory argument was missing or malformed.
    #[error("Illegal input: {0}")]
    IllegalInput(String),

    /// No profile with this identifier was loaded.
    #[error("Encoding profile not found: {id}")]
    ProfileNotFound {
        /// The identifier that was looked up.
        id: String,
    },

    /// The profile exists but does not accept this kind of media.
    #[error("Encoding profile {id} is not applicable to {kind} input")]
    ProfileNotApplicable {
        /// The profile identifier.
        id: String,
        /// The media kind the caller supplied.
        kind: MediaKind,
    },

    /// A layout precondition was violated.
    #[error("Invalid layout spec: {0}")]
    InvalidLayoutSpec(String),

    /// Media inspection could not read the produced or supplied asset.
    #[error("Inspection failed: {0}")]
    InspectionFailed(String),

    /// A task reached the FAILED state on the execution layer.
    #[error("Task {task} failed: {message}")]
    ExecutionFailed {
        /// The failed task.
        task: TaskId,
        /// Failure description reported by the execution layer.
        message: String,
    },

    /// A barrier wait ran out of time. Outstanding tasks remain valid.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A barrier wait was interrupted by its caller. Outstanding tasks remain valid.
    #[error("Wait canceled: {0}")]
    Canceled(String),

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "task", "asset").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Configuration or profile descriptor could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {source}")]
    Json {
        /// The underlying serde_json error.
        #[from]
        source: serde_json::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is raised at submission time, before anything is
    /// enqueued on the execution layer.
    pub fn is_submission_rejection(&self) -> bool {
        matches!(
            self,
            Error::IllegalInput(_)
                | Error::ProfileNotFound { .. }
                | Error::ProfileNotApplicable { .. }
                | Error::InvalidLayoutSpec(_)
        )
    }

    /// Convenience constructor for [`Error::IllegalInput`].
    pub fn illegal_input(message: impl Into<String>) -> Self {
        Error::IllegalInput(message.into())
    }

    /// Convenience constructor for [`Error::ProfileNotFound`].
    pub fn profile_not_found(id: impl Into<String>) -> Self {
        Error::ProfileNotFound { id: id.into() }
    }

    /// Convenience constructor for [`Error::ProfileNotApplicable`].
    pub fn profile_not_applicable(id: impl Into<String>, kind: MediaKind) -> Self {
        Error::ProfileNotApplicable { id: id.into(), kind }
    }

    /// Convenience constructor for [`Error::InvalidLayoutSpec`].
    pub fn invalid_layout(message: impl Into<String>) -> Self {
        Error::InvalidLayoutSpec(message.into())
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::ExecutionFailed`].
    pub fn execution_failed(task: TaskId, message: impl Into<String>) -> Self {
        Error::ExecutionFailed {
            task,
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
