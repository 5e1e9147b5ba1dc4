//! Error types for chain operations.

use std::io;
use thiserror::Error;

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Recoverable errors raised while configuring or running a chain.
///
/// Misuse of a stream (reading past exhaustion, advancing an inactive
/// stream) is a programming error and panics instead.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The chain configuration is unusable.
    #[error("invalid chain configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// An I/O error occurred in a worker.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Input ended in the middle of an entry.
    #[error("input ended with {got} bytes, not a multiple of the entry size {entry_size}")]
    PartialEntry {
        /// Bytes read into the final block.
        got: usize,
        /// Configured entry size.
        entry_size: usize,
    },

    /// A typed view does not match the chain's entry layout.
    #[error(
        "record type {type_name} ({size} bytes, align {align}) does not fit entries of {entry_size} bytes"
    )]
    RecordLayout {
        /// Name of the record type.
        type_name: &'static str,
        /// Size of the record type.
        size: usize,
        /// Alignment of the record type.
        align: usize,
        /// Configured entry size.
        entry_size: usize,
    },

    /// A position was requested after the recycling loop was closed.
    #[error("chain loop already closed; no more positions can be added")]
    LoopClosed,

    /// A worker thread panicked.
    #[error("worker {name} panicked")]
    WorkerPanicked {
        /// Thread name of the worker.
        name: String,
    },

    /// The chain finished without a poison marker reaching the first queue.
    #[error("chain ended without poison after {blocks} blocks")]
    MissingPoison {
        /// Blocks drained before giving up.
        blocks: usize,
    },
}

impl ChainError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a record layout error for `T`.
    pub fn record_layout<T>(entry_size: usize) -> Self {
        Self::RecordLayout {
            type_name: std::any::type_name::<T>(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            entry_size,
        }
    }

    /// Creates a worker panicked error.
    pub fn worker_panicked(name: impl Into<String>) -> Self {
        Self::WorkerPanicked { name: name.into() }
    }
}
