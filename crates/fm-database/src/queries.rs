//! Query helpers for the alarm, event log and suppression tables.
//!
//! All SQL issued by the fault manager lives here. Functions take a plain
//! `&Connection` so they run unchanged inside `FmSession::call` or on a
//! synchronous `Database`.

use crate::{
    micros_to_rfc3339, now_micros, rfc3339_to_micros, stored_entity_id, DatabaseResult,
    EntityMatch, EventLogEntry, EventSuppression, SuppressionStatus,
};
use fm_protocol::{AlarmRecord, AlarmState, Severity};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Row};

const ALARM_COLUMNS: &str = "uuid, alarm_id, alarm_state, entity_type_id, entity_instance_id, \
     timestamp, severity, reason_text, alarm_type, probable_cause, proposed_repair_action, \
     service_affecting, suppression, inhibit_alarms, masked";

const JOINED_ALARM_COLUMNS: &str = "a.uuid, a.alarm_id, a.alarm_state, a.entity_type_id, \
     a.entity_instance_id, a.timestamp, a.severity, a.reason_text, a.alarm_type, \
     a.probable_cause, a.proposed_repair_action, a.service_affecting, a.suppression, \
     a.inhibit_alarms, a.masked";

const UNSUPPRESSED_JOIN: &str = "FROM alarm a \
     LEFT JOIN event_suppression s ON s.alarm_id = a.alarm_id \
     WHERE COALESCE(s.suppression_status, 'unsuppressed') = 'unsuppressed'";

fn parse_column<T>(row: &Row<'_>, idx: usize, parse: impl Fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unrecognized value {raw:?}").into(),
        )
    })
}

fn row_to_alarm(row: &Row<'_>) -> rusqlite::Result<AlarmRecord> {
    Ok(AlarmRecord {
        uuid: row.get(0)?,
        alarm_id: row.get(1)?,
        alarm_state: parse_column(row, 2, AlarmState::parse)?,
        entity_type_id: row.get(3)?,
        entity_instance_id: row.get(4)?,
        timestamp: parse_column(row, 5, rfc3339_to_micros)?,
        severity: parse_column(row, 6, Severity::parse)?,
        reason_text: row.get(7)?,
        alarm_type: row.get(8)?,
        probable_cause: row.get(9)?,
        proposed_repair_action: row.get(10)?,
        service_affecting: row.get(11)?,
        suppression: row.get(12)?,
        inhibit_alarms: row.get(13)?,
        masked: row.get(14)?,
        keep_existing_alarm: false,
    })
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// SQL condition on `column` for an entity match, numbering parameters
/// from `first_param`.
fn entity_clause(column: &str, entity: &EntityMatch, first_param: usize) -> (String, Vec<String>) {
    match entity {
        EntityMatch::Exact(value) => (
            format!("{column} = ?{first_param}"),
            vec![stored_entity_id(value).to_string()],
        ),
        EntityMatch::Subtree(prefix) => (
            format!(
                "({column} = ?{first_param} OR {column} LIKE ?{} ESCAPE '\\')",
                first_param + 1
            ),
            vec![prefix.clone(), format!("{}.%", escape_like(prefix))],
        ),
        EntityMatch::Prefix(prefix) => (
            format!("{column} LIKE ?{first_param} ESCAPE '\\'"),
            vec![format!("{}%", escape_like(prefix))],
        ),
    }
}

fn query_alarms(conn: &Connection, sql: &str, params: Vec<String>) -> DatabaseResult<Vec<AlarmRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(params), row_to_alarm)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// ==========================================
// Alarms
// ==========================================

/// Get the alarm with this exact identity.
pub fn get_alarm(
    conn: &Connection,
    alarm_id: &str,
    entity_instance_id: &str,
) -> DatabaseResult<Option<AlarmRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {ALARM_COLUMNS} FROM alarm WHERE alarm_id = ?1 AND entity_instance_id = ?2"
    ))?;

    let result = stmt.query_row(
        params![alarm_id, stored_entity_id(entity_instance_id)],
        row_to_alarm,
    );

    match result {
        Ok(alarm) => Ok(Some(alarm)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Insert a new alarm. The row starts unmasked.
pub fn insert_alarm(conn: &Connection, alarm: &AlarmRecord) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO alarm (uuid, alarm_id, alarm_state, entity_type_id, entity_instance_id,
             timestamp, severity, reason_text, alarm_type, probable_cause, proposed_repair_action,
             service_affecting, suppression, inhibit_alarms, masked, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 0, ?15)",
        params![
            alarm.uuid,
            alarm.alarm_id,
            alarm.alarm_state.as_str(),
            alarm.entity_type_id,
            stored_entity_id(&alarm.entity_instance_id),
            micros_to_rfc3339(alarm.timestamp),
            alarm.severity.as_str(),
            alarm.reason_text,
            alarm.alarm_type,
            alarm.probable_cause,
            alarm.proposed_repair_action,
            alarm.service_affecting,
            alarm.suppression,
            alarm.inhibit_alarms,
            micros_to_rfc3339(now_micros()),
        ],
    )?;
    Ok(())
}

/// Update the mutable fields of an existing alarm.
///
/// Identity, uuid, creation time and the masked flag are left alone.
pub fn update_alarm(conn: &Connection, alarm: &AlarmRecord) -> DatabaseResult<usize> {
    let updated = conn.execute(
        "UPDATE alarm SET alarm_state = ?3, entity_type_id = ?4, timestamp = ?5, severity = ?6,
             reason_text = ?7, alarm_type = ?8, probable_cause = ?9, proposed_repair_action = ?10,
             service_affecting = ?11, suppression = ?12, inhibit_alarms = ?13, updated_at = ?14
         WHERE alarm_id = ?1 AND entity_instance_id = ?2",
        params![
            alarm.alarm_id,
            stored_entity_id(&alarm.entity_instance_id),
            alarm.alarm_state.as_str(),
            alarm.entity_type_id,
            micros_to_rfc3339(alarm.timestamp),
            alarm.severity.as_str(),
            alarm.reason_text,
            alarm.alarm_type,
            alarm.probable_cause,
            alarm.proposed_repair_action,
            alarm.service_affecting,
            alarm.suppression,
            alarm.inhibit_alarms,
            micros_to_rfc3339(now_micros()),
        ],
    )?;
    Ok(updated)
}

fn delete_returning(conn: &Connection, condition: &str, params: Vec<String>) -> DatabaseResult<Vec<AlarmRecord>> {
    let mut stmt = conn.prepare(&format!(
        "DELETE FROM alarm WHERE {condition} RETURNING {ALARM_COLUMNS}, id"
    ))?;
    let mut rows = stmt
        .query_map(params_from_iter(params), |row| {
            Ok((row.get::<_, i64>(15)?, row_to_alarm(row)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.sort_by_key(|(id, _)| *id);
    Ok(rows.into_iter().map(|(_, alarm)| alarm).collect())
}

/// Delete alarms with this alarm id, returning them in insertion order.
pub fn delete_alarms(
    conn: &Connection,
    alarm_id: &str,
    entity: &EntityMatch,
) -> DatabaseResult<Vec<AlarmRecord>> {
    let (clause, mut params) = entity_clause("entity_instance_id", entity, 2);
    params.insert(0, alarm_id.to_string());
    delete_returning(conn, &format!("alarm_id = ?1 AND {clause}"), params)
}

/// Delete every alarm at or below an entity, returning them in insertion order.
pub fn delete_alarms_under_entity(
    conn: &Connection,
    entity_prefix: &str,
) -> DatabaseResult<Vec<AlarmRecord>> {
    let (clause, params) =
        entity_clause("entity_instance_id", &EntityMatch::Subtree(entity_prefix.to_string()), 1);
    delete_returning(conn, &clause, params)
}

/// Set `masked` on maskable alarms at or below an entity, except the
/// inhibiting alarm itself.
pub fn set_masked_under_entity(
    conn: &Connection,
    entity_prefix: &str,
    masked: bool,
    inhibitor: (&str, &str),
) -> DatabaseResult<usize> {
    let (clause, mut params) =
        entity_clause("entity_instance_id", &EntityMatch::Subtree(entity_prefix.to_string()), 4);
    let (alarm_id, entity_instance_id) = inhibitor;
    let mut all = vec![
        if masked { "1" } else { "0" }.to_string(),
        alarm_id.to_string(),
        stored_entity_id(entity_instance_id).to_string(),
    ];
    all.append(&mut params);

    let updated = conn.execute(
        &format!(
            "UPDATE alarm SET masked = ?1
             WHERE suppression = 1
               AND NOT (alarm_id = ?2 AND entity_instance_id = ?3)
               AND {clause}"
        ),
        params_from_iter(all),
    )?;
    Ok(updated)
}

/// All alarms with this alarm id.
pub fn get_alarms_by_id(conn: &Connection, alarm_id: &str) -> DatabaseResult<Vec<AlarmRecord>> {
    query_alarms(
        conn,
        &format!("SELECT {ALARM_COLUMNS} FROM alarm WHERE alarm_id = ?1 ORDER BY id"),
        vec![alarm_id.to_string()],
    )
}

/// Unsuppressed alarms with this alarm id whose entity matches.
pub fn get_alarms_by_id_and_entity(
    conn: &Connection,
    alarm_id: &str,
    entity: &EntityMatch,
) -> DatabaseResult<Vec<AlarmRecord>> {
    let (clause, mut params) = entity_clause("a.entity_instance_id", entity, 2);
    params.insert(0, alarm_id.to_string());
    query_alarms(
        conn,
        &format!(
            "SELECT {JOINED_ALARM_COLUMNS} {UNSUPPRESSED_JOIN} AND a.alarm_id = ?1 AND {clause} ORDER BY a.id"
        ),
        params,
    )
}

/// Unsuppressed alarms whose entity matches.
pub fn get_unsuppressed_alarms(
    conn: &Connection,
    entity: &EntityMatch,
) -> DatabaseResult<Vec<AlarmRecord>> {
    let (clause, params) = entity_clause("a.entity_instance_id", entity, 1);
    query_alarms(
        conn,
        &format!("SELECT {JOINED_ALARM_COLUMNS} {UNSUPPRESSED_JOIN} AND {clause} ORDER BY a.id"),
        params,
    )
}

/// Every active alarm, oldest first.
pub fn list_alarms(conn: &Connection) -> DatabaseResult<Vec<AlarmRecord>> {
    query_alarms(
        conn,
        &format!("SELECT {ALARM_COLUMNS} FROM alarm ORDER BY id"),
        Vec::new(),
    )
}

// ==========================================
// Event log
// ==========================================

/// Reserve the next history log id.
pub fn next_log_id(conn: &Connection) -> DatabaseResult<i64> {
    let id = conn.query_row(
        "UPDATE log_id_sequence SET value = value + 1 WHERE name = 'event_log' RETURNING value",
        [],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Append a history row.
pub fn insert_event_log(conn: &Connection, entry: &EventLogEntry) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO event_log (id, uuid, event_log_id, state, entity_type_id, entity_instance_id,
             timestamp, severity, reason_text, event_log_type, probable_cause,
             proposed_repair_action, service_affecting, suppression, alarm_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            entry.id,
            entry.uuid,
            entry.event_log_id,
            entry.state.as_str(),
            entry.entity_type_id,
            entry.entity_instance_id,
            micros_to_rfc3339(entry.timestamp),
            entry.severity.as_str(),
            entry.reason_text,
            entry.event_log_type,
            entry.probable_cause,
            entry.proposed_repair_action,
            entry.service_affecting,
            entry.suppression,
            entry.alarm_id,
        ],
    )?;
    Ok(())
}

/// Most recent history rows, oldest first.
pub fn list_event_log(conn: &Connection, limit: usize) -> DatabaseResult<Vec<EventLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, uuid, event_log_id, state, entity_type_id, entity_instance_id, timestamp,
                severity, reason_text, event_log_type, probable_cause, proposed_repair_action,
                service_affecting, suppression, alarm_id
         FROM (SELECT * FROM event_log ORDER BY id DESC LIMIT ?1)
         ORDER BY id",
    )?;

    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(EventLogEntry {
            id: row.get(0)?,
            uuid: row.get(1)?,
            event_log_id: row.get(2)?,
            state: parse_column(row, 3, AlarmState::parse)?,
            entity_type_id: row.get(4)?,
            entity_instance_id: row.get(5)?,
            timestamp: parse_column(row, 6, rfc3339_to_micros)?,
            severity: parse_column(row, 7, Severity::parse)?,
            reason_text: row.get(8)?,
            event_log_type: row.get(9)?,
            probable_cause: row.get(10)?,
            proposed_repair_action: row.get(11)?,
            service_affecting: row.get(12)?,
            suppression: row.get(13)?,
            alarm_id: row.get(14)?,
        })
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// ==========================================
// Event suppression
// ==========================================

/// Whether traps for this alarm id are suppressed. Unknown ids are not.
pub fn get_event_suppressed(conn: &Connection, alarm_id: &str) -> DatabaseResult<bool> {
    let result = conn.query_row(
        "SELECT suppression_status FROM event_suppression WHERE alarm_id = ?1",
        params![alarm_id],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(status) => Ok(status == SuppressionStatus::Suppressed.as_str()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Create or update the suppression policy for an alarm id.
pub fn set_event_suppression(
    conn: &Connection,
    alarm_id: &str,
    status: SuppressionStatus,
) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO event_suppression (uuid, alarm_id, suppression_status)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(alarm_id) DO UPDATE SET
             suppression_status = excluded.suppression_status,
             updated_at = datetime('now')",
        params![uuid::Uuid::new_v4().to_string(), alarm_id, status.as_str()],
    )?;
    Ok(())
}

/// Every suppression policy, ordered by alarm id.
pub fn list_event_suppression(conn: &Connection) -> DatabaseResult<Vec<EventSuppression>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, alarm_id, description, suppression_status, set_for_deletion,
                mgmt_affecting, degrade_affecting
         FROM event_suppression
         ORDER BY alarm_id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(EventSuppression {
            uuid: row.get(0)?,
            alarm_id: row.get(1)?,
            description: row.get(2)?,
            status: parse_column(row, 3, SuppressionStatus::parse)?,
            set_for_deletion: row.get(4)?,
            mgmt_affecting: row.get(5)?,
            degrade_affecting: row.get(6)?,
        })
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Remove all pending suppression change notifications, returning how many
/// there were.
pub fn drain_suppression_changes(conn: &Connection) -> DatabaseResult<usize> {
    Ok(conn.execute("DELETE FROM event_suppression_notify", [])?)
}
