//! Result codes carried in `msg_rc`.

use serde::{Deserialize, Serialize};

/// Status of a request, as returned to clients.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    Ok = 0,
    AlarmExists = 1,
    InvalidAttribute = 2,
    EntityNotFound = 3,
    DbOperationFailure = 4,
    ScriptFailure = 5,
    NoConnection = 6,
    NoMemory = 7,
    Communications = 8,
    NotEnoughSpace = 9,
    InvalidRequest = 10,
    ServerNoMemory = 11,
    ScriptSyntaxError = 12,
    ResourceUnavailable = 13,
}

impl ResultCode {
    /// Unknown values collapse to `InvalidRequest`.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::Ok,
            1 => Self::AlarmExists,
            2 => Self::InvalidAttribute,
            3 => Self::EntityNotFound,
            4 => Self::DbOperationFailure,
            5 => Self::ScriptFailure,
            6 => Self::NoConnection,
            7 => Self::NoMemory,
            8 => Self::Communications,
            9 => Self::NotEnoughSpace,
            11 => Self::ServerNoMemory,
            12 => Self::ScriptSyntaxError,
            13 => Self::ResourceUnavailable,
            _ => Self::InvalidRequest,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::AlarmExists => "ALARM_EXISTS",
            Self::InvalidAttribute => "INVALID_ATTRIBUTE",
            Self::EntityNotFound => "ENTITY_NOT_FOUND",
            Self::DbOperationFailure => "DB_OPERATION_FAILURE",
            Self::ScriptFailure => "SCRIPT_FAILURE",
            Self::NoConnection => "NO_CONNECTION",
            Self::NoMemory => "NO_MEMORY",
            Self::Communications => "COMMUNICATIONS",
            Self::NotEnoughSpace => "NOT_ENOUGH_SPACE",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::ServerNoMemory => "SERVER_NO_MEMORY",
            Self::ScriptSyntaxError => "SCRIPT_SYNTAX_ERROR",
            Self::ResourceUnavailable => "RESOURCE_UNAVAILABLE",
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip() {
        for code in 0..=13 {
            assert_eq!(ResultCode::from_i32(code).as_i32(), code);
        }
    }

    #[test]
    fn test_unknown_code_is_invalid_request() {
        assert_eq!(ResultCode::from_i32(-1), ResultCode::InvalidRequest);
        assert_eq!(ResultCode::from_i32(99), ResultCode::InvalidRequest);
    }
}
