//! Alarm records and filters, with their fixed wire layouts.
//!
//! ```text
//! AlarmRecord (1570 bytes)
//!   uuid[255] alarm_id[255] alarm_state:u32 entity_type_id[255]
//!   entity_instance_id[255] timestamp:i64 severity:u32 reason_text[255]
//!   alarm_type:u32 probable_cause:u32 proposed_repair_action[255]
//!   service_affecting:u32 suppression:u32 inhibit_alarms:u32
//!   keep_existing_alarm:u32
//!
//! AlarmFilter (510 bytes)
//!   alarm_id[255] entity_instance_id[255]
//! ```

use crate::wire::{WireReader, WireWriter, TEXT_FIELD_LEN};
use crate::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};

/// Encoded size of an [`AlarmRecord`].
pub const ALARM_RECORD_SIZE: usize = 6 * TEXT_FIELD_LEN + 8 * 4 + 8;

/// Encoded size of an [`AlarmFilter`].
pub const FILTER_SIZE: usize = 2 * TEXT_FIELD_LEN;

/// Lifecycle state carried by a request or a stored alarm.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmState {
    Clear = 0,
    #[default]
    Set = 1,
    /// Customer log; never stored in the alarm table.
    Message = 2,
    Log = 3,
}

impl AlarmState {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Clear),
            1 => Some(Self::Set),
            2 => Some(Self::Message),
            3 => Some(Self::Log),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Set => "set",
            Self::Message => "message",
            Self::Log => "log",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "clear" => Some(Self::Clear),
            "set" => Some(Self::Set),
            "message" | "msg" => Some(Self::Message),
            "log" => Some(Self::Log),
            _ => None,
        }
    }
}

#[repr(u32)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Clear = 0,
    Warning = 1,
    Minor = 2,
    Major = 3,
    Critical = 4,
}

impl Severity {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Clear),
            1 => Some(Self::Warning),
            2 => Some(Self::Minor),
            3 => Some(Self::Major),
            4 => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Warning => "warning",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "clear" => Some(Self::Clear),
            "warning" => Some(Self::Warning),
            "minor" => Some(Self::Minor),
            "major" => Some(Self::Major),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// One alarm (or customer log) as exchanged with clients.
///
/// `masked` is managed by the server and is not part of the wire layout.
/// `keep_existing_alarm` travels on the wire but is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub uuid: String,
    pub alarm_id: String,
    pub alarm_state: AlarmState,
    pub entity_type_id: String,
    pub entity_instance_id: String,
    /// Microseconds since the Unix epoch.
    pub timestamp: i64,
    pub severity: Severity,
    pub reason_text: String,
    pub alarm_type: u32,
    pub probable_cause: u32,
    pub proposed_repair_action: String,
    pub service_affecting: bool,
    /// Whether this alarm may be masked by an inhibiting parent.
    pub suppression: bool,
    pub inhibit_alarms: bool,
    #[serde(default)]
    pub masked: bool,
    #[serde(skip)]
    pub keep_existing_alarm: bool,
}

impl AlarmRecord {
    /// A set-state record with the given identity and severity.
    pub fn new(
        alarm_id: impl Into<String>,
        entity_instance_id: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            alarm_id: alarm_id.into(),
            entity_instance_id: entity_instance_id.into(),
            alarm_state: AlarmState::Set,
            severity,
            ..Default::default()
        }
    }

    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let mut w = WireWriter::with_capacity(ALARM_RECORD_SIZE);
        self.write_to(&mut w)?;
        Ok(w.into_bytes())
    }

    pub(crate) fn write_to(&self, w: &mut WireWriter) -> ProtocolResult<()> {
        w.put_text("uuid", &self.uuid)?;
        w.put_text("alarm_id", &self.alarm_id)?;
        w.put_u32(self.alarm_state as u32);
        w.put_text("entity_type_id", &self.entity_type_id)?;
        w.put_text("entity_instance_id", &self.entity_instance_id)?;
        w.put_i64(self.timestamp);
        w.put_u32(self.severity as u32);
        w.put_text("reason_text", &self.reason_text)?;
        w.put_u32(self.alarm_type);
        w.put_u32(self.probable_cause);
        w.put_text("proposed_repair_action", &self.proposed_repair_action)?;
        w.put_bool(self.service_affecting);
        w.put_bool(self.suppression);
        w.put_bool(self.inhibit_alarms);
        w.put_bool(self.keep_existing_alarm);
        Ok(())
    }

    /// Decode exactly one record.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        if bytes.len() != ALARM_RECORD_SIZE {
            return Err(ProtocolError::SizeMismatch {
                len: bytes.len(),
                record: ALARM_RECORD_SIZE,
            });
        }
        let mut r = WireReader::new(bytes);
        let uuid = r.text("uuid")?;
        let alarm_id = r.text("alarm_id")?;
        let raw_state = r.u32()?;
        let alarm_state = AlarmState::from_u32(raw_state).ok_or(ProtocolError::InvalidEnum {
            field: "alarm_state",
            value: raw_state,
        })?;
        let entity_type_id = r.text("entity_type_id")?;
        let entity_instance_id = r.text("entity_instance_id")?;
        let timestamp = r.i64()?;
        let raw_severity = r.u32()?;
        let severity = Severity::from_u32(raw_severity).ok_or(ProtocolError::InvalidEnum {
            field: "severity",
            value: raw_severity,
        })?;

        Ok(Self {
            uuid,
            alarm_id,
            alarm_state,
            entity_type_id,
            entity_instance_id,
            timestamp,
            severity,
            reason_text: r.text("reason_text")?,
            alarm_type: r.u32()?,
            probable_cause: r.u32()?,
            proposed_repair_action: r.text("proposed_repair_action")?,
            service_affecting: r.bool()?,
            suppression: r.bool()?,
            inhibit_alarms: r.bool()?,
            masked: false,
            keep_existing_alarm: r.bool()?,
        })
    }
}

/// Selection by alarm id and entity instance id.
///
/// How `entity_instance_id` matches (exact, prefix, or the empty marker)
/// depends on the operation using the filter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlarmFilter {
    pub alarm_id: String,
    pub entity_instance_id: String,
}

impl AlarmFilter {
    pub fn new(alarm_id: impl Into<String>, entity_instance_id: impl Into<String>) -> Self {
        Self {
            alarm_id: alarm_id.into(),
            entity_instance_id: entity_instance_id.into(),
        }
    }

    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let mut w = WireWriter::with_capacity(FILTER_SIZE);
        w.put_text("alarm_id", &self.alarm_id)?;
        w.put_text("entity_instance_id", &self.entity_instance_id)?;
        Ok(w.into_bytes())
    }

    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        if bytes.len() != FILTER_SIZE {
            return Err(ProtocolError::SizeMismatch {
                len: bytes.len(),
                record: FILTER_SIZE,
            });
        }
        let mut r = WireReader::new(bytes);
        Ok(Self {
            alarm_id: r.text("alarm_id")?,
            entity_instance_id: r.text("entity_instance_id")?,
        })
    }
}
