//! Message header and action codes.
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬──────────────┐
//! │ action: u32  │ version: u32 │ msg_size: u32│ msg_rc: i32  │
//! └──────────────┴──────────────┴──────────────┴──────────────┘
//!  16 bytes, big-endian, followed by msg_size payload bytes
//! ```

use crate::alarm::{ALARM_RECORD_SIZE, FILTER_SIZE};
use crate::wire::{WireReader, WireWriter, TEXT_FIELD_LEN};
use crate::{ProtocolError, ProtocolResult, ResultCode};

/// Current protocol version.
pub const VERSION: u32 = 1;

/// Size of the encoded header.
pub const HEADER_SIZE: usize = 16;

/// Largest payload the server will buffer for one frame (1 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Request actions.
///
/// Gaps in the numbering are codes retired from the protocol.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Raise or update one alarm, or write one customer log.
    CreateFault = 0,
    /// Clear alarms matching one filter.
    DeleteFault = 2,
    /// Hierarchical clear of every alarm under an entity.
    DeleteFaults = 3,
    /// Exact lookup by (alarm_id, entity_instance_id).
    GetFault = 4,
    /// Unsuppressed alarms under an entity prefix.
    GetFaults = 5,
    /// All alarms with an alarm id.
    GetFaultsById = 7,
    /// Alarms with an alarm id under an entity prefix.
    GetFaultsByIdAndEntity = 8,
    /// Batch of create requests.
    CreateFaultList = 9,
    /// Batch of delete filters.
    DeleteFaultList = 10,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::CreateFault,
        Action::DeleteFault,
        Action::DeleteFaults,
        Action::GetFault,
        Action::GetFaults,
        Action::GetFaultsById,
        Action::GetFaultsByIdAndEntity,
        Action::CreateFaultList,
        Action::DeleteFaultList,
    ];

    /// Convert from the raw wire value
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::CreateFault),
            2 => Some(Self::DeleteFault),
            3 => Some(Self::DeleteFaults),
            4 => Some(Self::GetFault),
            5 => Some(Self::GetFaults),
            7 => Some(Self::GetFaultsById),
            8 => Some(Self::GetFaultsByIdAndEntity),
            9 => Some(Self::CreateFaultList),
            10 => Some(Self::DeleteFaultList),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Read actions are answered by the read worker, not the connection task.
    pub fn is_read(self) -> bool {
        matches!(
            self,
            Self::GetFault | Self::GetFaults | Self::GetFaultsById | Self::GetFaultsByIdAndEntity
        )
    }

    /// List actions carry any number of consecutive elements.
    pub fn is_list(self) -> bool {
        matches!(self, Self::CreateFaultList | Self::DeleteFaultList)
    }

    /// Size of one request element for this action.
    pub fn element_size(self) -> usize {
        match self {
            Self::CreateFault | Self::CreateFaultList => ALARM_RECORD_SIZE,
            Self::DeleteFault
            | Self::DeleteFaultList
            | Self::GetFault
            | Self::GetFaultsByIdAndEntity => FILTER_SIZE,
            Self::DeleteFaults | Self::GetFaults | Self::GetFaultsById => TEXT_FIELD_LEN,
        }
    }
}

/// Decoded message header.
///
/// `action` stays raw so any frame can be re-encoded byte for byte; use
/// [`MsgHeader::action`] to interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    pub action: u32,
    pub version: u32,
    pub msg_size: u32,
    pub msg_rc: i32,
}

impl MsgHeader {
    pub fn new(action: Action, msg_size: usize, rc: ResultCode) -> Self {
        Self {
            action: action.as_u32(),
            version: VERSION,
            // Callers bound payloads by MAX_PAYLOAD_SIZE before framing.
            msg_size: msg_size as u32,
            msg_rc: rc.as_i32(),
        }
    }

    /// Header for the answer to this request: same action and version.
    pub fn reply(&self, rc: ResultCode, msg_size: usize) -> Self {
        Self {
            action: self.action,
            version: self.version,
            msg_size: msg_size as u32,
            msg_rc: rc.as_i32(),
        }
    }

    pub fn action(&self) -> ProtocolResult<Action> {
        Action::from_u32(self.action).ok_or(ProtocolError::UnknownAction(self.action))
    }

    pub fn result_code(&self) -> ResultCode {
        ResultCode::from_i32(self.msg_rc)
    }

    pub fn payload_len(&self) -> usize {
        self.msg_size as usize
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut w = WireWriter::with_capacity(HEADER_SIZE);
        w.put_u32(self.action);
        w.put_u32(self.version);
        w.put_u32(self.msg_size);
        w.put_i32(self.msg_rc);
        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(&w.into_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProtocolError::TruncatedHeader { len: bytes.len() });
        }
        let mut r = WireReader::new(&bytes[..HEADER_SIZE]);
        Ok(Self {
            action: r.u32()?,
            version: r.u32()?,
            msg_size: r.u32()?,
            msg_rc: r.i32()?,
        })
    }
}
