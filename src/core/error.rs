// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for lazybag.
//!
//! One variant per failure class:
//! - File framing (magic, record and field decoding)
//! - Chunk decompression
//! - Message definition parsing and type resolution
//! - Value access on decoded messages

use std::fmt;

/// Errors that can occur while opening or reading a bag.
#[derive(Debug, Clone)]
pub enum BagError {
    /// The file does not begin with the `#ROSBAG V2.0\n` magic line
    BadMagic {
        /// What the first bytes actually were
        found: String,
    },

    /// A read range extends past the end of the byte source
    ReadPastEnd {
        /// Requested start offset
        offset: u64,
        /// Requested length
        requested: usize,
        /// Total source size
        size: u64,
    },

    /// A buffer held fewer bytes than a decode step required
    ShortRead {
        /// What was being decoded
        context: &'static str,
        /// Bytes needed
        requested: usize,
        /// Bytes available
        available: usize,
    },

    /// Record opcode unknown in a context where it must be understood
    UnknownOp {
        /// The offending opcode
        op: u8,
    },

    /// A required record header field is missing or malformed
    CorruptField {
        /// Field name
        field: String,
        /// What was wrong with it
        reason: String,
    },

    /// Chunk compression identifier outside `{none, bz2, lz4}`
    UnknownCompression {
        /// The identifier found in the chunk header
        compression: String,
    },

    /// Chunk decompression failed
    Decompress {
        /// Codec that failed ("bz2" or "lz4")
        codec: &'static str,
        /// Underlying error message
        message: String,
    },

    /// Decompressed chunk length differs from the declared size
    SizeMismatch {
        /// Size declared in the chunk header
        declared: usize,
        /// Size actually produced
        actual: usize,
    },

    /// Message definition text is syntactically invalid
    Parse {
        /// Type whose definition was being parsed
        context: String,
        /// Error message
        message: String,
    },

    /// A field references a message type that cannot be resolved
    UnknownType {
        /// The unresolved type name
        type_name: String,
    },

    /// A typed accessor was called on a value of a different kind
    TypeMismatch {
        /// Type the caller asked for
        requested: &'static str,
        /// Type the value actually has
        actual: String,
    },

    /// Access to a field or array element that does not exist
    OutOfRange {
        /// Field name or element index
        accessed: String,
        /// Number of children the value has
        len: usize,
    },

    /// Underlying I/O failure
    Io {
        /// Error message
        message: String,
    },
}

impl BagError {
    /// Create a bad magic error.
    pub fn bad_magic(found: impl Into<String>) -> Self {
        BagError::BadMagic {
            found: found.into(),
        }
    }

    /// Create a read past end error.
    pub fn read_past_end(offset: u64, requested: usize, size: u64) -> Self {
        BagError::ReadPastEnd {
            offset,
            requested,
            size,
        }
    }

    /// Create a short read error.
    pub fn short_read(context: &'static str, requested: usize, available: usize) -> Self {
        BagError::ShortRead {
            context,
            requested,
            available,
        }
    }

    /// Create an unknown opcode error.
    pub fn unknown_op(op: u8) -> Self {
        BagError::UnknownOp { op }
    }

    /// Create a corrupt field error.
    pub fn corrupt_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BagError::CorruptField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a corrupt field error for a field that is absent.
    pub fn missing_field(field: impl Into<String>) -> Self {
        BagError::CorruptField {
            field: field.into(),
            reason: "missing".to_string(),
        }
    }

    /// Create an unknown compression error.
    pub fn unknown_compression(compression: impl Into<String>) -> Self {
        BagError::UnknownCompression {
            compression: compression.into(),
        }
    }

    /// Create a decompression error.
    pub fn decompress(codec: &'static str, message: impl Into<String>) -> Self {
        BagError::Decompress {
            codec,
            message: message.into(),
        }
    }

    /// Create a size mismatch error.
    pub fn size_mismatch(declared: usize, actual: usize) -> Self {
        BagError::SizeMismatch { declared, actual }
    }

    /// Create a definition parse error.
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        BagError::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create an unknown type error.
    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        BagError::UnknownType {
            type_name: type_name.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(requested: &'static str, actual: impl Into<String>) -> Self {
        BagError::TypeMismatch {
            requested,
            actual: actual.into(),
        }
    }

    /// Create an out of range error.
    pub fn out_of_range(accessed: impl Into<String>, len: usize) -> Self {
        BagError::OutOfRange {
            accessed: accessed.into(),
            len,
        }
    }
}

impl fmt::Display for BagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BagError::BadMagic { found } => {
                write!(f, "Bad magic: expected \"#ROSBAG V2.0\\n\", found {found:?}")
            }
            BagError::ReadPastEnd {
                offset,
                requested,
                size,
            } => write!(
                f,
                "Read past end: {requested} bytes at offset {offset}, but source is {size} bytes"
            ),
            BagError::ShortRead {
                context,
                requested,
                available,
            } => write!(
                f,
                "Short read while decoding {context}: needed {requested} bytes, had {available}"
            ),
            BagError::UnknownOp { op } => write!(f, "Unknown record opcode {op:#04x}"),
            BagError::CorruptField { field, reason } => {
                write!(f, "Corrupt header field '{field}': {reason}")
            }
            BagError::UnknownCompression { compression } => {
                write!(f, "Unknown chunk compression '{compression}'")
            }
            BagError::Decompress { codec, message } => {
                write!(f, "{codec} decompression failed: {message}")
            }
            BagError::SizeMismatch { declared, actual } => write!(
                f,
                "Chunk size mismatch: declared {declared} bytes, decoded {actual}"
            ),
            BagError::Parse { context, message } => {
                write!(f, "Parse error in definition of '{context}': {message}")
            }
            BagError::UnknownType { type_name } => {
                write!(f, "Unknown message type '{type_name}'")
            }
            BagError::TypeMismatch { requested, actual } => {
                write!(f, "Type mismatch: requested {requested}, value is {actual}")
            }
            BagError::OutOfRange { accessed, len } => {
                write!(f, "Out of range: '{accessed}' (value has {len} children)")
            }
            BagError::Io { message } => write!(f, "I/O error: {message}"),
        }
    }
}

impl std::error::Error for BagError {}

impl From<std::io::Error> for BagError {
    fn from(err: std::io::Error) -> Self {
        BagError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for lazybag operations.
pub type Result<T> = std::result::Result<T, BagError>;
