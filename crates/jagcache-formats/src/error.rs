//! Error types for byte-level cache format parsing

use thiserror::Error;

/// Result type for format operations
pub type Result<T> = std::result::Result<T, FormatError>;

/// Coarse classification shared by every error in the read path.
///
/// Callers decide retry or abort policy from the kind alone; the concrete
/// variant carries the diagnostic detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A category, group or sub-file does not exist
    NotFound,
    /// Fewer bytes are available than a length field promises
    Truncated,
    /// Structural fields disagree with each other or with expectations
    Malformed,
    /// A tag or protocol value outside the known range
    Unsupported,
    /// Underlying file system failure
    Io,
}

/// Errors produced while decoding cache structures from byte slices
#[derive(Debug, Error)]
pub enum FormatError {
    /// A fixed-width read ran past the end of the buffer
    #[error("unexpected end of data: needed {needed} bytes at offset {offset}, {remaining} remaining")]
    UnexpectedEof {
        /// Cursor position when the read was attempted
        offset: usize,
        /// Width of the attempted read
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// A seek targeted a position outside the buffer
    #[error("invalid seek to {position} in buffer of {len} bytes")]
    InvalidSeek {
        /// Requested absolute position
        position: usize,
        /// Buffer length
        len: usize,
    },

    /// Compressed payload shorter than the container header claims
    #[error("container truncated: header promises {expected} bytes, {available} available")]
    Truncated {
        /// Bytes promised by the length field
        expected: usize,
        /// Bytes actually present
        available: usize,
    },

    /// Unknown compression type byte
    #[error("unsupported compression type: {0}")]
    UnsupportedCompression(u8),

    /// Unknown reference table protocol
    #[error("unsupported reference table protocol: {0}")]
    UnsupportedProtocol(u8),

    /// Decompressed stream ended before the declared length
    #[error("decompressed length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Declared uncompressed length
        expected: usize,
        /// Bytes the decoder produced
        actual: usize,
    },

    /// Declared uncompressed length exceeds the configured ceiling
    #[error("uncompressed length {size} exceeds limit of {limit} bytes")]
    TooLarge {
        /// Declared uncompressed length
        size: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// The gzip or bzip2 decoder rejected the stream
    #[error("{codec} decompression failed: {source}")]
    Decompression {
        /// Codec name
        codec: &'static str,
        /// Decoder error
        #[source]
        source: std::io::Error,
    },

    /// Archive group trailer arithmetic does not add up
    #[error("invalid group trailer: {0}")]
    InvalidTrailer(String),

    /// Reference table content violates its invariants
    #[error("invalid reference table: {0}")]
    InvalidReferenceTable(String),
}

impl FormatError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnexpectedEof { .. } | Self::Truncated { .. } | Self::LengthMismatch { .. } => {
                ErrorKind::Truncated
            }
            Self::UnsupportedCompression(_) | Self::UnsupportedProtocol(_) => {
                ErrorKind::Unsupported
            }
            Self::InvalidSeek { .. }
            | Self::TooLarge { .. }
            | Self::Decompression { .. }
            | Self::InvalidTrailer(_)
            | Self::InvalidReferenceTable(_) => ErrorKind::Malformed,
        }
    }

    /// Check if this error means the input ended early
    pub fn is_truncation(&self) -> bool {
        self.kind() == ErrorKind::Truncated
    }
}
