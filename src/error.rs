//! Error types for building and reading the on-disk tree.

use std::io;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while saving or traversing a tree.
#[derive(Debug, Error)]
pub enum Error {
    /// Failure reported by the backing store or output sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The bytes at `fp` do not describe a valid node.
    #[error("corrupt node at fp {fp}: {reason}")]
    Corrupt { fp: u64, reason: String },

    #[error("cannot save an empty tree")]
    EmptyTree,

    #[error("output target offset {0} does not fit in 62 bits")]
    OutputTooLarge(u64),

    #[error("prefix of {0} bytes is too long to encode")]
    PrefixTooLong(usize),
}

impl Error {
    pub(crate) fn corrupt(fp: u64, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::warn!(fp, %reason, "corrupt node");
        Error::Corrupt { fp, reason }
    }

    /// Returns true if this error signals a structurally invalid tree.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::Corrupt { .. })
    }
}
