// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for mxfcodec.
//!
//! Provides error types for MXF container I/O operations:
//! - KLV framing (keys, BER lengths)
//! - Partition pack reading, writing and the update pass
//! - Index table segment encode/decode
//! - Essence element streaming and random-access lookups
//! - Read/write interleaving

use std::fmt;

use crate::core::types::Key;

/// Errors that can occur during MXF container I/O operations.
#[derive(Debug, Clone)]
pub enum MxfError {
    /// BER length field does not conform to the supported encoding
    MalformedLength {
        /// Error message
        message: String,
    },

    /// Partition pack value is shorter than its fixed fields
    TruncatedPartition {
        /// Declared KLV length
        declared: u64,
        /// Minimum length required for the fixed fields
        required: u64,
    },

    /// Index table segment bytes do not match the declared layout
    CorruptIndexSegment {
        /// What was being decoded
        context: String,
        /// Error message
        message: String,
    },

    /// Index table and essence chunk map are inconsistent for a lookup
    EditUnitNotIndexed {
        /// Requested offset within the logical essence stream
        essence_offset: u64,
        /// Requested size in bytes
        size: u64,
    },

    /// Operation requires a seekable stream but the target cannot seek
    NonSeekableTarget {
        /// Operation that was attempted
        operation: String,
    },

    /// Mandatory block flush failed during interleaved reading
    InterleaveFlushFailed,

    /// Rewriting a partition pack would change its byte size
    PartitionUpdateConflict {
        /// Pack length recorded when the partition was first written
        written_len: u64,
        /// Pack length computed for the rewrite
        computed_len: u64,
    },

    /// A KLV key other than the expected one was encountered
    UnexpectedKey {
        /// What was expected at this position
        expected: String,
        /// Key that was read
        key: Key,
    },

    /// Stream ended before the requested bytes were read or written
    ShortRead {
        /// Requested bytes
        requested: u64,
        /// Bytes actually transferred
        actual: u64,
    },

    /// Underlying I/O failure
    Io {
        /// Operation context
        context: String,
        /// Error message from the I/O layer
        message: String,
    },
}

impl MxfError {
    /// Create a malformed length error.
    pub fn malformed_length(message: impl Into<String>) -> Self {
        MxfError::MalformedLength {
            message: message.into(),
        }
    }

    /// Create a truncated partition error.
    pub fn truncated_partition(declared: u64, required: u64) -> Self {
        MxfError::TruncatedPartition { declared, required }
    }

    /// Create a corrupt index segment error.
    pub fn corrupt_index(context: impl Into<String>, message: impl Into<String>) -> Self {
        MxfError::CorruptIndexSegment {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create an edit unit not indexed error.
    pub fn edit_unit_not_indexed(essence_offset: u64, size: u64) -> Self {
        MxfError::EditUnitNotIndexed {
            essence_offset,
            size,
        }
    }

    /// Create a non-seekable target error.
    pub fn non_seekable(operation: impl Into<String>) -> Self {
        MxfError::NonSeekableTarget {
            operation: operation.into(),
        }
    }

    /// Create a partition update conflict error.
    pub fn update_conflict(written_len: u64, computed_len: u64) -> Self {
        MxfError::PartitionUpdateConflict {
            written_len,
            computed_len,
        }
    }

    /// Create an unexpected key error.
    pub fn unexpected_key(expected: impl Into<String>, key: Key) -> Self {
        MxfError::UnexpectedKey {
            expected: expected.into(),
            key,
        }
    }

    /// Create a short read error.
    pub fn short_read(requested: u64, actual: u64) -> Self {
        MxfError::ShortRead { requested, actual }
    }

    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, message: impl Into<String>) -> Self {
        MxfError::Io {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            MxfError::MalformedLength { message } => vec![("message", message.clone())],
            MxfError::TruncatedPartition { declared, required } => vec![
                ("declared", declared.to_string()),
                ("required", required.to_string()),
            ],
            MxfError::CorruptIndexSegment { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            MxfError::EditUnitNotIndexed {
                essence_offset,
                size,
            } => vec![
                ("essence_offset", essence_offset.to_string()),
                ("size", size.to_string()),
            ],
            MxfError::NonSeekableTarget { operation } => {
                vec![("operation", operation.clone())]
            }
            MxfError::InterleaveFlushFailed => vec![],
            MxfError::PartitionUpdateConflict {
                written_len,
                computed_len,
            } => vec![
                ("written_len", written_len.to_string()),
                ("computed_len", computed_len.to_string()),
            ],
            MxfError::UnexpectedKey { expected, key } => {
                vec![("expected", expected.clone()), ("key", key.to_string())]
            }
            MxfError::ShortRead { requested, actual } => vec![
                ("requested", requested.to_string()),
                ("actual", actual.to_string()),
            ],
            MxfError::Io { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
        }
    }
}

impl fmt::Display for MxfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MxfError::MalformedLength { message } => {
                write!(f, "Malformed BER length: {message}")
            }
            MxfError::TruncatedPartition { declared, required } => write!(
                f,
                "Truncated partition pack: declared length {declared} is less than the {required} bytes of fixed fields"
            ),
            MxfError::CorruptIndexSegment { context, message } => {
                write!(f, "Corrupt index table segment in {context}: {message}")
            }
            MxfError::EditUnitNotIndexed {
                essence_offset,
                size,
            } => write!(
                f,
                "Failed to find edit unit (off=0x{essence_offset:x},size=0x{size:x}) in essence container"
            ),
            MxfError::NonSeekableTarget { operation } => {
                write!(f, "{operation} requires a seekable target stream")
            }
            MxfError::InterleaveFlushFailed => {
                write!(
                    f,
                    "Interleaved read failed because writer cache data flush failed"
                )
            }
            MxfError::PartitionUpdateConflict {
                written_len,
                computed_len,
            } => write!(
                f,
                "Partition pack rewrite length {computed_len} conflicts with originally written length {written_len}"
            ),
            MxfError::UnexpectedKey { expected, key } => {
                write!(f, "Expected {expected} but read key {key}")
            }
            MxfError::ShortRead { requested, actual } => write!(
                f,
                "Short transfer: requested {requested} bytes, transferred {actual}"
            ),
            MxfError::Io { context, message } => {
                write!(f, "I/O error in {context}: {message}")
            }
        }
    }
}

impl std::error::Error for MxfError {}

impl From<std::io::Error> for MxfError {
    fn from(err: std::io::Error) -> Self {
        // A stream layer (e.g. the interleaver) may carry an MxfError across
        // the io::Error boundary; unwrap it instead of re-wrapping.
        match err.downcast::<MxfError>() {
            Ok(inner) => inner,
            Err(err) => MxfError::Io {
                context: "stream".to_string(),
                message: err.to_string(),
            },
        }
    }
}

/// Result type for mxfcodec operations.
pub type Result<T> = std::result::Result<T, MxfError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::labels::KLV_FILL_KEY;

    #[test]
    fn test_malformed_length_error() {
        let err = MxfError::malformed_length("9 length bytes");
        assert!(matches!(err, MxfError::MalformedLength { .. }));
        assert_eq!(err.to_string(), "Malformed BER length: 9 length bytes");
    }

    #[test]
    fn test_truncated_partition_error() {
        let err = MxfError::truncated_partition(60, 88);
        assert!(matches!(err, MxfError::TruncatedPartition { .. }));
        assert_eq!(
            err.to_string(),
            "Truncated partition pack: declared length 60 is less than the 88 bytes of fixed fields"
        );
    }

    #[test]
    fn test_edit_unit_not_indexed_error() {
        let err = MxfError::edit_unit_not_indexed(0x1000, 0x200);
        assert_eq!(
            err.to_string(),
            "Failed to find edit unit (off=0x1000,size=0x200) in essence container"
        );
    }

    #[test]
    fn test_unexpected_key_display_contains_hex() {
        let err = MxfError::unexpected_key("partition pack", KLV_FILL_KEY);
        let text = err.to_string();
        assert!(text.contains("partition pack"));
        assert!(text.contains("060e2b34"));
    }

    #[test]
    fn test_log_fields_short_read() {
        let err = MxfError::short_read(16, 3);
        let fields = err.log_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0], ("requested", "16".to_string()));
        assert_eq!(fields[1], ("actual", "3".to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MxfError = io_err.into();
        assert!(matches!(err, MxfError::Io { .. }));
        assert_eq!(err.to_string(), "I/O error in stream: file not found");
    }

    #[test]
    fn test_error_clone() {
        let err1 = MxfError::corrupt_index("entry array", "count mismatch");
        let err2 = err1.clone();
        assert_eq!(err1.to_string(), err2.to_string());
    }
}
