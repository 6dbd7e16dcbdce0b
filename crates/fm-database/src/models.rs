//! Database model types.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use fm_protocol::{AlarmRecord, AlarmState, Severity};
use serde::{Deserialize, Serialize};

/// Stored in place of an empty entity instance id.
///
/// An empty filter entity selects rows carrying this marker and nothing
/// else.
pub const EMPTY_ENTITY_MARKER: &str = " ";

/// Normalize an entity instance id for storage or exact matching.
pub fn stored_entity_id(entity_instance_id: &str) -> &str {
    if entity_instance_id.is_empty() {
        EMPTY_ENTITY_MARKER
    } else {
        entity_instance_id
    }
}

/// How an entity instance id selects rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityMatch {
    /// Equal to the value (the empty string matches the empty marker).
    Exact(String),
    /// Equal to the prefix, or below it in the dotted hierarchy.
    /// `host-1` selects `host-1` and `host-1.disk0`, not `host-10.disk0`.
    Subtree(String),
    /// Plain string prefix, as used by entity lookups.
    Prefix(String),
}

/// Suppression policy for one alarm id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuppressionStatus {
    Suppressed,
    Unsuppressed,
}

impl SuppressionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressionStatus::Suppressed => "suppressed",
            SuppressionStatus::Unsuppressed => "unsuppressed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "suppressed" => Some(SuppressionStatus::Suppressed),
            "unsuppressed" => Some(SuppressionStatus::Unsuppressed),
            _ => None,
        }
    }
}

/// One row of `event_suppression`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSuppression {
    pub uuid: String,
    pub alarm_id: String,
    pub description: Option<String>,
    pub status: SuppressionStatus,
    pub set_for_deletion: bool,
    pub mgmt_affecting: Option<String>,
    pub degrade_affecting: Option<String>,
}

/// One row of the append-only event history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Taken from the log id sequence immediately before insertion.
    pub id: i64,
    pub uuid: String,
    pub event_log_id: String,
    pub state: AlarmState,
    pub entity_type_id: String,
    pub entity_instance_id: String,
    /// Microseconds since the Unix epoch.
    pub timestamp: i64,
    pub severity: Severity,
    pub reason_text: String,
    pub event_log_type: u32,
    pub probable_cause: u32,
    pub proposed_repair_action: String,
    pub service_affecting: bool,
    pub suppression: bool,
    /// Set for alarm transitions, empty for customer logs.
    pub alarm_id: Option<String>,
}

impl EventLogEntry {
    /// History row for an alarm transition or customer log.
    ///
    /// Request-scoped and server-managed fields of the record
    /// (`keep_existing_alarm`, `masked`, `inhibit_alarms`) are not carried.
    pub fn from_record(id: i64, record: &AlarmRecord, state: AlarmState) -> Self {
        let alarm_id = match state {
            AlarmState::Message | AlarmState::Log => None,
            AlarmState::Set | AlarmState::Clear => Some(record.alarm_id.clone()),
        };
        Self {
            id,
            uuid: uuid::Uuid::new_v4().to_string(),
            event_log_id: record.alarm_id.clone(),
            state,
            entity_type_id: record.entity_type_id.clone(),
            entity_instance_id: stored_entity_id(&record.entity_instance_id).to_string(),
            timestamp: record.timestamp,
            severity: record.severity,
            reason_text: record.reason_text.clone(),
            event_log_type: record.alarm_type,
            probable_cause: record.probable_cause,
            proposed_repair_action: record.proposed_repair_action.clone(),
            service_affecting: record.service_affecting,
            suppression: record.suppression,
            alarm_id,
        }
    }
}

/// Current time in microseconds since the Unix epoch.
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

/// Format a microsecond timestamp the way it is stored.
pub fn micros_to_rfc3339(micros: i64) -> String {
    Utc.timestamp_micros(micros)
        .single()
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp back to microseconds.
pub fn rfc3339_to_micros(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp_micros())
}
