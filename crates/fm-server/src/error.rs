//! Server error types.

use fm_database::DatabaseError;
use fm_protocol::{ProtocolError, ResultCode};
use thiserror::Error;

/// Server error type.
#[derive(Error, Debug)]
pub enum FmError {
    /// Malformed or wrongly sized frame
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A mandatory request field is missing
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Query or statement failure
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    /// Nothing matched. Expected, not an error condition worth logging.
    #[error("Entity not found")]
    NotFound,

    /// Response buffer could not be allocated
    #[error("Could not allocate a response for {0} alarms")]
    ResourceExhausted(usize),

    /// The manager could not be reached
    #[error("No connection to fault manager at {addr}: {source}")]
    NoConnection {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bind retries exhausted
    #[error("Failed to bind {host}:{port} after {attempts} attempts")]
    Bootstrap {
        host: String,
        port: u16,
        attempts: u32,
    },

    /// A worker dropped its end of a reply channel
    #[error("{0} worker is not running")]
    WorkerGone(&'static str),

    /// Non-OK result code returned by the manager
    #[error("Fault manager returned {0}")]
    Remote(ResultCode),
}

impl FmError {
    /// Result code reported to the client for this error.
    pub fn result_code(&self) -> ResultCode {
        match self {
            FmError::Protocol(_) | FmError::Validation(_) => ResultCode::InvalidRequest,
            FmError::Storage(_) => ResultCode::DbOperationFailure,
            FmError::NotFound => ResultCode::EntityNotFound,
            FmError::ResourceExhausted(_) => ResultCode::ServerNoMemory,
            FmError::NoConnection { .. } => ResultCode::NoConnection,
            FmError::Io(_) => ResultCode::Communications,
            FmError::Bootstrap { .. } | FmError::WorkerGone(_) => ResultCode::ResourceUnavailable,
            FmError::Remote(rc) => *rc,
        }
    }

    /// Error for a non-OK result code received from the manager.
    pub fn from_result_code(rc: ResultCode) -> Self {
        match rc {
            ResultCode::EntityNotFound => FmError::NotFound,
            other => FmError::Remote(other),
        }
    }
}

/// Result type for server operations.
pub type FmResult<T> = Result<T, FmError>;
