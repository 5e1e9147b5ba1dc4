//! CLI error type.

use chainstream_core::ChainError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// A pipeline failed.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// A file could not be opened or created.
    #[error("{}: {source}", path.display())]
    File {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// Output could not be serialized.
    #[error("failed to format output: {0}")]
    Json(#[from] serde_json::Error),

    /// The output format is not supported.
    #[error("unknown output format '{0}' (expected text or json)")]
    UnknownFormat(String),
}

impl CliError {
    /// Wraps an I/O error with the path it concerns.
    pub fn file(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::File { path, source }
    }
}
