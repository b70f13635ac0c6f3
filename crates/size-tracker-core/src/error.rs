//! Error taxonomy for size tracking.
//!
//! Errors are split by layer: [`RecordError`] for the record codec and
//! builder, [`GitError`] for version-control process calls, [`StoreError`]
//! for the record store, [`RenderError`] for chart output, and
//! [`TrackerError`] which aggregates them for the orchestrator.

/// Errors produced while building, encoding or decoding a size record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("invalid commit timestamp {raw:?}: {reason}")]
    InvalidTimestamp { raw: String, reason: String },

    #[error("artifact size {size} bytes exceeds the maximum record size of {max} bytes")]
    SizeOverflow { size: u64, max: u64 },

    #[error("corrupt size record: {0}")]
    CorruptEntry(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A failed git invocation.
#[derive(Debug, thiserror::Error)]
#[error("git {command} failed: {message}")]
pub struct GitError {
    pub command: String,
    pub message: String,
}

impl GitError {
    pub fn new(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            message: message.into(),
        }
    }
}

/// Errors from a [`crate::store::RecordStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The remote has no notes namespace yet. Expected on the first run.
    #[error("remote has no size records yet")]
    NoRemoteHistory,

    #[error("publishing size records was rejected after {attempts} attempts")]
    PushRejected { attempts: u32 },

    #[error("corrupt entry for commit {commit}: {source}")]
    CorruptEntry {
        commit: String,
        #[source]
        source: RecordError,
    },

    #[error("no entry for commit {0}")]
    NotFound(String),

    #[error(transparent)]
    Git(#[from] GitError),
}

/// Errors produced while rendering the trend chart.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no data points to render")]
    EmptySeries,

    #[error("rendering chart to {path}: {message}")]
    Draw { path: String, message: String },
}

/// Top-level error for a tracking run.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("required input '{0}' is unset")]
    MissingInput(String),

    #[error("parsing build command {0:?} failed")]
    InvalidBuildCommand(String),

    #[error("parsed build command is empty")]
    EmptyBuildCommand,

    #[error("expected output file '{0}' does not exist")]
    MissingArtifact(String),

    #[error("output file '{path}' is a {kind}, not a regular file")]
    ArtifactNotRegular { path: String, kind: String },

    #[error("command `{command}` exited with status {status}:\n{output}")]
    CommandFailed {
        command: String,
        status: i32,
        output: String,
    },

    #[error("run cancelled")]
    Cancelled,

    #[error("size record error: {0}")]
    Record(#[from] RecordError),

    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
