//! Database migrations.
//!
//! Migrations are run in order and tracked in the `migrations` table.

use crate::{DatabaseError, DatabaseResult};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> DatabaseResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    debug!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version > CURRENT_VERSION {
        return Err(DatabaseError::Migration(format!(
            "database schema v{current_version} is newer than supported v{CURRENT_VERSION}"
        )));
    }

    if current_version < 1 {
        migrate_v1_alarm_schema(conn)?;
    }
    if current_version < 2 {
        migrate_v2_log_id_sequence(conn)?;
    }
    if current_version < 3 {
        migrate_v3_suppression_notify(conn)?;
    }

    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: suppression policy, active alarms, event history.
fn migrate_v1_alarm_schema(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v1: alarm schema");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS event_suppression (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            alarm_id TEXT NOT NULL UNIQUE,
            description TEXT,
            suppression_status TEXT NOT NULL DEFAULT 'unsuppressed',
            set_for_deletion INTEGER NOT NULL DEFAULT 0,
            mgmt_affecting TEXT,
            degrade_affecting TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT
        );

        CREATE TABLE IF NOT EXISTS alarm (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            alarm_id TEXT NOT NULL,
            alarm_state TEXT NOT NULL,
            entity_type_id TEXT NOT NULL DEFAULT '',
            entity_instance_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            severity TEXT NOT NULL,
            reason_text TEXT NOT NULL DEFAULT '',
            alarm_type INTEGER NOT NULL DEFAULT 0,
            probable_cause INTEGER NOT NULL DEFAULT 0,
            proposed_repair_action TEXT NOT NULL DEFAULT '',
            service_affecting INTEGER NOT NULL DEFAULT 0,
            suppression INTEGER NOT NULL DEFAULT 0,
            inhibit_alarms INTEGER NOT NULL DEFAULT 0,
            masked INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            deleted_at TEXT,
            UNIQUE (alarm_id, entity_instance_id)
        );

        CREATE INDEX IF NOT EXISTS idx_alarm_entity_instance_id
            ON alarm(entity_instance_id);

        CREATE TABLE IF NOT EXISTS event_log (
            id INTEGER PRIMARY KEY,
            uuid TEXT NOT NULL UNIQUE,
            event_log_id TEXT NOT NULL,
            state TEXT NOT NULL,
            entity_type_id TEXT NOT NULL DEFAULT '',
            entity_instance_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            severity TEXT NOT NULL,
            reason_text TEXT NOT NULL DEFAULT '',
            event_log_type INTEGER NOT NULL DEFAULT 0,
            probable_cause INTEGER NOT NULL DEFAULT 0,
            proposed_repair_action TEXT NOT NULL DEFAULT '',
            service_affecting INTEGER NOT NULL DEFAULT 0,
            suppression INTEGER NOT NULL DEFAULT 0,
            alarm_id TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_event_log_timestamp
            ON event_log(timestamp);
        ",
    )?;

    record_migration(conn, 1, "alarm_schema")?;
    Ok(())
}

/// V2: sequence backing `next_log_id`.
fn migrate_v2_log_id_sequence(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v2: log id sequence");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS log_id_sequence (
            name TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );

        INSERT OR IGNORE INTO log_id_sequence (name, value)
            SELECT 'event_log', COALESCE(MAX(id), 0) FROM event_log;
        ",
    )?;

    record_migration(conn, 2, "log_id_sequence")?;
    Ok(())
}

/// V3: change notifications for `event_suppression`.
///
/// Triggers append one row per change; listeners drain the table.
fn migrate_v3_suppression_notify(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v3: suppression change notifications");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS event_suppression_notify (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            alarm_id TEXT NOT NULL,
            op TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    create_suppression_triggers(conn)?;

    record_migration(conn, 3, "suppression_notify")?;
    Ok(())
}

/// Install the `event_suppression` change triggers if missing.
pub(crate) fn create_suppression_triggers(conn: &Connection) -> DatabaseResult<()> {
    conn.execute_batch(
        "
        CREATE TRIGGER IF NOT EXISTS event_suppression_notify_insert
        AFTER INSERT ON event_suppression
        BEGIN
            INSERT INTO event_suppression_notify (alarm_id, op) VALUES (NEW.alarm_id, 'insert');
        END;

        CREATE TRIGGER IF NOT EXISTS event_suppression_notify_update
        AFTER UPDATE ON event_suppression
        BEGIN
            INSERT INTO event_suppression_notify (alarm_id, op) VALUES (NEW.alarm_id, 'update');
        END;

        CREATE TRIGGER IF NOT EXISTS event_suppression_notify_delete
        AFTER DELETE ON event_suppression
        BEGIN
            INSERT INTO event_suppression_notify (alarm_id, op) VALUES (OLD.alarm_id, 'delete');
        END;
        ",
    )?;
    Ok(())
}
