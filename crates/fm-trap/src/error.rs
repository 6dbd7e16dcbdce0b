//! Error types for fm-trap.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrapError {
    /// Could not reach the trap relay
    #[error("connect to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Connecting took longer than allowed
    #[error("connect to {0} timed out")]
    ConnectTimeout(String),

    /// Write to the relay failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TrapResult<T> = Result<T, TrapError>;
