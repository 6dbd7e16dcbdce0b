//! Notification dispatch: history rows, masking, suppression and traps.
//!
//! Storage work ([`record_notification`]) runs on the worker's session
//! thread and always finishes before the trap for the same job is handed
//! to the transport ([`NotificationDispatcher::send`]).

use crate::job::{Apply, JobKind, JobRequest};
use crate::FmResult;
use fm_database::{now_micros, queries, EventLogEntry};
use fm_protocol::{AlarmRecord, AlarmState};
use fm_trap::{format_trap, TrapCategory, TrapDestinations, TrapTarget, TrapTransport};
use rusqlite::Connection;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Trap settings taken from configuration.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub snmp_enabled: bool,
    pub trap_target: TrapTarget,
    pub system_name: String,
    pub region_name: String,
}

/// Trap category for a job.
pub fn category_for(job: &JobRequest) -> TrapCategory {
    match job.kind {
        JobKind::CustomerLog => TrapCategory::Message,
        JobKind::Raise(severity) => TrapCategory::for_severity(severity),
        JobKind::Clear => TrapCategory::Clear,
        JobKind::HierarchicalClear => TrapCategory::HierarchicalClear,
    }
}

/// Record one notification in storage and decide whether it gets a trap.
///
/// Masks or unmasks the entity branch for inhibiting alarms, appends the
/// history row and consults suppression. Clear jobs get the clear time
/// written back into the payload. Returns `None` when suppressed.
pub fn record_notification(
    conn: &Connection,
    job: &mut JobRequest,
) -> FmResult<Option<TrapCategory>> {
    if job.kind == JobKind::CustomerLog {
        let id = queries::next_log_id(conn)?;
        queries::insert_event_log(
            conn,
            &EventLogEntry::from_record(id, &job.payload, AlarmState::Message),
        )?;
        return Ok(Some(TrapCategory::Message));
    }

    let hierarchical = job.kind == JobKind::HierarchicalClear;
    let record = &mut job.payload;

    if record.inhibit_alarms && !hierarchical {
        let masked = queries::set_masked_under_entity(
            conn,
            &record.entity_instance_id,
            job.apply == Apply::Set,
            (&record.alarm_id, &record.entity_instance_id),
        )?;
        debug!(
            alarm_id = %record.alarm_id,
            entity = %record.entity_instance_id,
            masked,
            set = job.apply == Apply::Set,
            "Inhibit applied"
        );
    }

    let state = match job.apply {
        Apply::Set if record.alarm_state == AlarmState::Clear => AlarmState::Set,
        Apply::Set => record.alarm_state,
        Apply::Clear => {
            record.timestamp = now_micros();
            record.alarm_state = AlarmState::Clear;
            AlarmState::Clear
        }
    };

    let id = queries::next_log_id(conn)?;
    queries::insert_event_log(conn, &EventLogEntry::from_record(id, record, state))?;

    if !hierarchical && queries::get_event_suppressed(conn, &record.alarm_id)? {
        debug!(alarm_id = %record.alarm_id, "Trap suppressed");
        return Ok(None);
    }
    Ok(Some(category_for(job)))
}

/// Formats and delivers traps.
pub struct NotificationDispatcher {
    settings: DispatcherSettings,
    destinations: Arc<TrapDestinations>,
    transport: Arc<dyn TrapTransport>,
}

impl NotificationDispatcher {
    pub fn new(
        settings: DispatcherSettings,
        destinations: Arc<TrapDestinations>,
        transport: Arc<dyn TrapTransport>,
    ) -> Self {
        Self {
            settings,
            destinations,
            transport,
        }
    }

    /// `region.system.entity`, skipping empty names.
    pub fn qualify_entity(&self, entity_instance_id: &str) -> String {
        let mut qualified = entity_instance_id.to_string();
        for prefix in [&self.settings.system_name, &self.settings.region_name] {
            if !prefix.is_empty() {
                qualified = format!("{prefix}.{qualified}");
            }
        }
        qualified
    }

    /// Send a trap for a recorded notification.
    ///
    /// Delivery failures are logged and dropped.
    pub async fn send(&self, category: TrapCategory, record: &AlarmRecord) {
        let mut record = record.clone();
        if category != TrapCategory::WarmStart {
            record.entity_instance_id = self.qualify_entity(&record.entity_instance_id);
        }

        if !self.settings.snmp_enabled {
            debug!(category = category.as_str(), alarm_id = %record.alarm_id, "SNMP disabled, trap not sent");
            return;
        }

        let destinations = self.destinations.snapshot();
        let payload = match format_trap(category, &record, &destinations) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(category = category.as_str(), error = %e, "Failed to format trap");
                return;
            }
        };

        match self
            .transport
            .deliver(&self.settings.trap_target, &payload)
            .await
        {
            Ok(()) => debug!(
                category = category.as_str(),
                alarm_id = %record.alarm_id,
                target = %self.settings.trap_target,
                "Trap sent"
            ),
            Err(e) => warn!(
                category = category.as_str(),
                target = %self.settings.trap_target,
                error = %e,
                "Trap delivery failed"
            ),
        }
    }

    /// Send the fixed system event announcing a suppression change.
    pub async fn send_warm_start(&self) {
        info!("Suppression settings changed, sending warm start");
        self.send(TrapCategory::WarmStart, &AlarmRecord::default())
            .await;
    }
}
