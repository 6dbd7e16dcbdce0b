//! Trap payload formatting.
//!
//! A trap is one JSON object:
//!
//! ```text
//! {"operation_type": "wrsAlarmMajor",
//!  "destinations": [{"ip": "...", "community": "..."}],
//!  "alarm": {"wrsAlarmActiveAlarmId": "100.001", ...}}
//! ```

use crate::{TrapDestination, TrapResult};
use chrono::{SecondsFormat, TimeZone, Utc};
use fm_protocol::{AlarmRecord, Severity};
use serde_json::{json, Map, Value};

/// Reason text carried by hierarchical clear traps.
pub const HIERARCHICAL_CLEAR_REASON: &str = "System initiated hierarchical alarm clear";

/// Notification category, named as the trap relay expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapCategory {
    Critical,
    Major,
    Minor,
    Warning,
    Message,
    Clear,
    HierarchicalClear,
    WarmStart,
}

impl TrapCategory {
    /// Category for a raise at this severity. A raise at severity clear is
    /// reported as a message.
    pub fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Self::Critical,
            Severity::Major => Self::Major,
            Severity::Minor => Self::Minor,
            Severity::Warning => Self::Warning,
            Severity::Clear => Self::Message,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "wrsAlarmCritical",
            Self::Major => "wrsAlarmMajor",
            Self::Minor => "wrsAlarmMinor",
            Self::Warning => "wrsAlarmWarning",
            Self::Message => "wrsAlarmMessage",
            Self::Clear => "wrsAlarmClear",
            Self::HierarchicalClear => "wrsAlarmHierarchicalClear",
            Self::WarmStart => "warmStart",
        }
    }
}

fn date_and_time(micros: i64) -> String {
    Utc.timestamp_micros(micros)
        .single()
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn alarm_fields(record: &AlarmRecord) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("wrsAlarmActiveAlarmId".into(), json!(record.alarm_id));
    fields.insert(
        "wrsAlarmActiveEntityInstanceId".into(),
        json!(record.entity_instance_id),
    );
    fields.insert(
        "wrsAlarmActiveDateAndTime".into(),
        json!(date_and_time(record.timestamp)),
    );
    fields.insert(
        "wrsAlarmActiveAlarmSeverity".into(),
        json!(record.severity.as_str()),
    );
    fields.insert("wrsAlarmActiveReasonText".into(), json!(record.reason_text));
    fields.insert("wrsAlarmActiveEventType".into(), json!(record.alarm_type));
    fields.insert(
        "wrsAlarmActiveProbableCause".into(),
        json!(record.probable_cause),
    );
    fields.insert(
        "wrsAlarmActiveProposedRepairAction".into(),
        json!(record.proposed_repair_action),
    );
    fields.insert(
        "wrsAlarmActiveServiceAffecting".into(),
        json!(record.service_affecting),
    );
    fields.insert(
        "wrsAlarmActiveSuppressionAllowed".into(),
        json!(record.suppression),
    );
    fields
}

fn event_fields(record: &AlarmRecord) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("wrsEventEventId".into(), json!(record.alarm_id));
    fields.insert(
        "wrsEventEntityInstanceId".into(),
        json!(record.entity_instance_id),
    );
    fields.insert(
        "wrsEventDateAndTime".into(),
        json!(date_and_time(record.timestamp)),
    );
    fields.insert("wrsEventSeverity".into(), json!(record.severity.as_str()));
    fields.insert("wrsEventReasonText".into(), json!(record.reason_text));
    fields.insert("wrsEventEventType".into(), json!(record.alarm_type));
    fields.insert("wrsEventProbableCause".into(), json!(record.probable_cause));
    fields.insert(
        "wrsEventServiceAffecting".into(),
        json!(record.service_affecting),
    );
    fields
}

fn hierarchical_clear_fields(record: &AlarmRecord) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        "wrsAlarmActiveEntityInstanceId".into(),
        json!(record.entity_instance_id),
    );
    fields.insert(
        "wrsAlarmActiveDateAndTime".into(),
        json!(date_and_time(record.timestamp)),
    );
    fields.insert(
        "wrsAlarmActiveReasonText".into(),
        json!(HIERARCHICAL_CLEAR_REASON),
    );
    fields
}

/// Serialize a trap. `record` is ignored for warm start.
pub fn format_trap(
    category: TrapCategory,
    record: &AlarmRecord,
    destinations: &[TrapDestination],
) -> TrapResult<Vec<u8>> {
    let alarm = match category {
        TrapCategory::WarmStart => Map::new(),
        TrapCategory::Message => event_fields(record),
        TrapCategory::HierarchicalClear => hierarchical_clear_fields(record),
        TrapCategory::Critical
        | TrapCategory::Major
        | TrapCategory::Minor
        | TrapCategory::Warning
        | TrapCategory::Clear => alarm_fields(record),
    };

    let payload = json!({
        "operation_type": category.as_str(),
        "destinations": destinations,
        "alarm": alarm,
    });
    Ok(serde_json::to_vec(&payload)?)
}
