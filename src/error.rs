//! Application-wide error types.
//!
//! Library modules use specific error variants via `thiserror`, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level application error enum
//! - Errors are recovered at the bundle boundary: the first error observed
//!   while processing a bundle aborts the run, there is no per-file retry
//! - All errors implement `std::error::Error` for compatibility

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
///
/// Aggregates errors from all subsystems for unified handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry path missing or not a directory
    #[error("Invalid directory: {0}")]
    InvalidDirectory(PathBuf),

    /// Prober failed to read embedded tags
    #[error("Probe error for {path}: {message}")]
    Probe { path: PathBuf, message: String },

    /// Transcoder invocation failed
    #[error("Transcode error for {path}: {message}")]
    Transcode { path: PathBuf, message: String },

    /// Transcoder produced an empty output file
    #[error("Transcoded file has no size: {0}")]
    EmptyOutput(PathBuf),

    /// Directory merge/rename failure
    #[error("Merge error: {0}")]
    Merge(String),

    /// A worker thread panicked instead of reporting a result
    #[error("Worker failure: {0}")]
    Worker(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a probe error.
    pub fn probe(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a transcode error.
    pub fn transcode(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Transcode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a merge error.
    pub fn merge(message: impl Into<String>) -> Self {
        Self::Merge(message.into())
    }

    /// Create a worker error.
    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}
