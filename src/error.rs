//! Error types for the differencing engine.
//!
//! Mirrors the error taxonomy of the on-disk formats this crate reads and
//! writes: a patch stream can be rejected for structural reasons (corrupt
//! header, bad control record, truncated sub-stream) independently of plain
//! I/O failure, and callers generally want to tell those apart.

use std::io;

use thiserror::Error;

/// Errors produced by diffing, patching, indexing, and format detection.
#[derive(Error, Debug)]
pub enum BsdiffError {
    /// No registered format's magic matched the start of the patch stream.
    #[error("unrecognised patch format (no magic matched)")]
    UnknownFormat,

    /// Caller requested a specific format but the patch stream is another.
    #[error("format mismatch: requested {requested}, patch is {actual}")]
    FormatMismatch {
        /// Format name the caller asked for.
        requested: &'static str,
        /// Format name actually detected.
        actual: &'static str,
    },

    /// Patch magic was recognised but the structure is otherwise invalid.
    #[error("corrupt patch: {0}")]
    CorruptPatch(String),

    /// Suffix-array index file failed header or structural validation.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// Underlying stream I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// `BSDIFF_LOWMEM` (or an explicit config value) could not be parsed.
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, BsdiffError>;

impl BsdiffError {
    pub(crate) fn corrupt_patch<S: Into<String>>(reason: S) -> Self {
        Self::CorruptPatch(reason.into())
    }

    pub(crate) fn corrupt_index<S: Into<String>>(reason: S) -> Self {
        Self::CorruptIndex(reason.into())
    }
}
