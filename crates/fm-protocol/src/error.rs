//! Error types for fm-protocol.

use thiserror::Error;

/// Framing and layout errors.
///
/// None of these are fatal to a connection; the server answers them with
/// `INVALID_REQUEST` and keeps reading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes than a header
    #[error("truncated header: {len} bytes")]
    TruncatedHeader { len: usize },

    /// Header `msg_size` disagrees with the bytes that follow
    #[error("payload length mismatch: header declares {declared}, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Payload is not a whole number of records
    #[error("payload of {len} bytes is not a multiple of {record} byte records")]
    SizeMismatch { len: usize, record: usize },

    /// Payload exceeds the accepted frame size
    #[error("frame too large: {size} bytes, max {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Action code not understood by this side
    #[error("unknown action code {0}")]
    UnknownAction(u32),

    /// Enum field with a value outside its range
    #[error("invalid {field} value {value}")]
    InvalidEnum { field: &'static str, value: u32 },

    /// Text longer than its fixed-width field
    #[error("{field} is {len} bytes, max {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// Text field is not valid UTF-8
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
