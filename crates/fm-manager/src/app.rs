//! Command implementations.

use anyhow::Context;
use fm_config_and_utils::{init_logging, Config, Paths};
use fm_database::{
    micros_to_rfc3339, queries, Database, EventLogEntry, EventSuppression, SuppressionStatus,
};
use fm_server::{FmClient, FmServer, ServerSettings};
use fm_trap::TcpTrapTransport;
use std::sync::Arc;
use tracing::info;

fn client_for(config: &Config) -> FmClient {
    FmClient::new(format!("{}:{}", config.controller_host, config.listen_port))
}

fn open_database(config: &Config, paths: &Paths) -> anyhow::Result<Database> {
    let path = config.database_path(paths);
    Database::open(&path).with_context(|| format!("failed to open {}", path.display()))
}

/// Run the server until ctrl-c.
pub async fn run_server(config: Config, paths: Paths) -> anyhow::Result<()> {
    paths.ensure_dirs()?;
    init_logging(&config.log_level, Some(&paths.log_file()))?;

    let settings = ServerSettings::from_config(&config, &paths);
    let server = FmServer::start(settings, Arc::new(TcpTrapTransport::default()))
        .await
        .context("fault manager failed to start")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutdown requested");
    server.shutdown().await;
    Ok(())
}

pub async fn check_status(config: &Config) -> anyhow::Result<()> {
    let client = client_for(config);
    if client.is_reachable().await {
        println!("Fault manager is running");
        println!("  Address: {}", client.addr());
    } else {
        println!("Fault manager is not running at {}", client.addr());
    }
    Ok(())
}

/// Edit the suppression table directly. A running server notices the
/// change through its suppression monitor.
pub fn set_suppression(
    config: &Config,
    paths: &Paths,
    alarm_id: &str,
    suppressed: bool,
) -> anyhow::Result<()> {
    let status = if suppressed {
        SuppressionStatus::Suppressed
    } else {
        SuppressionStatus::Unsuppressed
    };

    let db = open_database(config, paths)?;
    db.set_event_suppression(alarm_id, status)?;
    println!("{alarm_id}: {}", status.as_str());
    Ok(())
}

pub async fn list_alarms(config: &Config, entity: &str) -> anyhow::Result<()> {
    let alarms = client_for(config).get_faults(entity).await?;
    if alarms.is_empty() {
        println!("No active alarms");
        return Ok(());
    }

    for alarm in alarms {
        println!(
            "{:<10} {:<9} {:<40} {}",
            alarm.alarm_id,
            alarm.severity.as_str(),
            alarm.entity_instance_id,
            alarm.reason_text
        );
    }
    Ok(())
}

/// Print the last `limit` history rows, oldest first.
pub fn list_events(config: &Config, paths: &Paths, limit: usize) -> anyhow::Result<()> {
    let db = open_database(config, paths)?;
    let entries = queries::list_event_log(db.connection(), limit)?;
    if entries.is_empty() {
        println!("No events");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_event(entry));
    }
    Ok(())
}

fn format_event(entry: &EventLogEntry) -> String {
    format!(
        "{:<6} {:<32} {:<10} {:<7} {:<9} {:<40} {}",
        entry.id,
        micros_to_rfc3339(entry.timestamp),
        entry.alarm_id.as_deref().unwrap_or("-"),
        entry.state.as_str(),
        entry.severity.as_str(),
        entry.entity_instance_id,
        entry.reason_text
    )
}

pub fn list_suppressions(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let db = open_database(config, paths)?;
    let policies = queries::list_event_suppression(db.connection())?;
    if policies.is_empty() {
        println!("No suppression policies");
        return Ok(());
    }
    for policy in &policies {
        println!("{}", format_suppression(policy));
    }
    Ok(())
}

fn format_suppression(policy: &EventSuppression) -> String {
    format!(
        "{:<10} {:<12} {}",
        policy.alarm_id,
        policy.status.as_str(),
        policy.description.as_deref().unwrap_or("")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fm_server::{AlarmRecord, AlarmState, Severity};
    use tempfile::tempdir;

    #[test]
    fn test_set_suppression_writes_table() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let config = Config::default();

        set_suppression(&config, &paths, "100.001", true).unwrap();

        let db = Database::open(&paths.database_file()).unwrap();
        assert!(queries::get_event_suppressed(db.connection(), "100.001").unwrap());
    }

    #[test]
    fn test_history_and_policies_are_listed() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let config = Config::default();

        set_suppression(&config, &paths, "200.001", false).unwrap();
        set_suppression(&config, &paths, "100.001", true).unwrap();
        {
            let db = Database::open(&paths.database_file()).unwrap();
            let conn = db.connection();
            let mut record = AlarmRecord::new("100.001", "host-1.disk0", Severity::Major);
            record.uuid = "6f1c2a8e-3b4d-4e5f-9a0b-1c2d3e4f5a6b".to_string();
            record.timestamp = 1_700_000_000_000_000;
            record.reason_text = "disk failing".to_string();
            let id = queries::next_log_id(conn).unwrap();
            queries::insert_event_log(conn, &EventLogEntry::from_record(id, &record, AlarmState::Set))
                .unwrap();
        }

        list_events(&config, &paths, 10).unwrap();
        list_suppressions(&config, &paths).unwrap();

        let db = Database::open(&paths.database_file()).unwrap();
        let events = queries::list_event_log(db.connection(), 10).unwrap();
        assert_eq!(events.len(), 1);
        let line = format_event(&events[0]);
        assert!(line.contains("100.001"));
        assert!(line.contains("host-1.disk0"));
        assert!(line.ends_with("disk failing"));

        let lines: Vec<_> = queries::list_event_suppression(db.connection())
            .unwrap()
            .iter()
            .map(|p| format_suppression(p).trim_end().to_string())
            .collect();
        assert_eq!(
            lines,
            vec!["100.001    suppressed", "200.001    unsuppressed"]
        );
    }
}
