//! Error type shared by every container parser.
//!
//! Each variant is terminal for a single parse attempt. Trying a different
//! parser is left to the caller.

use std::io;

use super::chunk::FourCc;

/// Errors produced while validating or walking a container
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RiffError {
    /// The source is shorter than the container (or a field) claims
    #[error("Truncated: needs {expected} bytes, source has {actual}")]
    Truncated { expected: u64, actual: u64 },

    /// Wrong magic, wrong form, unknown extension or ceded to another parser
    #[error("Unrecognized container: {0}")]
    UnrecognizedContainer(String),

    /// A chunk record does not fit inside the container
    #[error("Corrupt chunk '{tag}' at 0x{offset:x}")]
    CorruptChunk { tag: FourCc, offset: u64 },

    /// A chunk that may appear only once appeared twice
    #[error("Duplicate '{0}' chunk")]
    DuplicateChunk(FourCc),

    /// Codec id / bit depth combination outside the classification table
    #[error("Unsupported codec 0x{codec:04x} ({bits} bits per sample)")]
    UnsupportedCodec { codec: u16, bits: u16 },

    /// The codec needs an auxiliary sample count and none was found
    #[error("Missing sample count for fixed-block codec")]
    MissingSampleCount,

    /// Predictor filter record absent or malformed
    #[error("Invalid filter data: {0}")]
    InvalidFilterData(String),

    /// Loop record present but unusable
    #[error("Invalid loop data: {0}")]
    InvalidLoopData(String),

    /// The byte source itself failed
    #[error("I/O error: {0}")]
    Io(String),

    /// The external decoder could not be opened
    #[error("External decoder error: {0}")]
    External(String),
}

impl From<io::Error> for RiffError {
    fn from(err: io::Error) -> Self {
        RiffError::Io(err.to_string())
    }
}

/// Result type for parser operations
pub type ParseResult<T> = Result<T, RiffError>;
