//! # Error Types
//!
//! Errors raised by the codec and the storage port.

use thiserror::Error;

/// Errors raised while decoding a field-numbered schema.
///
/// Every variant carries the schema identifier and, where one exists, the
/// name of the offending field so callers can report a precise path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A required field was absent.
    #[error("{schema}: missing field '{field}'")]
    MissingField { schema: &'static str, field: &'static str },

    /// A field appeared out of order or with an unknown number.
    #[error("{schema}: expected field '{field}' (#{expected}), found #{found}")]
    UnexpectedField {
        schema: &'static str,
        field: &'static str,
        expected: u32,
        found: u32,
    },

    /// A field was encoded with the wrong wire type.
    #[error("{schema}: field '{field}' has wrong wire type")]
    WrongWireType { schema: &'static str, field: &'static str },

    /// A numeric value does not fit its declared width.
    #[error("{schema}: field '{field}' overflows its data type")]
    Overflow { schema: &'static str, field: &'static str },

    /// A boolean field held a value other than 0 or 1.
    #[error("{schema}: field '{field}' is not a boolean")]
    InvalidBoolean { schema: &'static str, field: &'static str },

    /// A string field was not valid UTF-8.
    #[error("{schema}: field '{field}' is not valid utf-8")]
    InvalidUtf8 { schema: &'static str, field: &'static str },

    /// A fixed-width byte field had the wrong length.
    #[error("{schema}: field '{field}' must be {expected} bytes, got {actual}")]
    InvalidLength {
        schema: &'static str,
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Bytes remained after the last field of the schema.
    #[error("{schema}: trailing bytes after last field")]
    TrailingBytes { schema: &'static str },

    /// The block header version has no registered asset schema.
    #[error("no asset schema registered for block version {0}")]
    UnknownAssetVersion(u32),

    /// Low-level varint or length framing error.
    #[error("{schema}: malformed input: {message}")]
    Malformed { schema: &'static str, message: String },
}

/// Errors from key-value store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },
}
