//! Alarm lifecycle rules.
//!
//! Runs on the write worker's storage thread, one job at a time:
//!
//! | current row | job                       | effect                         |
//! |-------------|---------------------------|--------------------------------|
//! | absent      | raise                     | insert, unmasked               |
//! | present     | raise, keep existing      | nothing; existing uuid returned |
//! | present     | raise                     | update mutable fields          |
//! | present     | clear / hierarchical clear| delete, one notification per row |
//! | any         | customer log              | alarm table untouched          |

use crate::job::{JobKind, JobOutcome, JobRequest};
use crate::{FmError, FmResult};
use fm_database::{now_micros, queries, EntityMatch};
use fm_protocol::AlarmRecord;
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

/// Result of one job, with the notifications it produces in order.
#[derive(Debug)]
pub struct Applied {
    pub outcome: JobOutcome,
    pub notifications: Vec<JobRequest>,
}

/// Apply a job to the alarm table.
pub fn apply(conn: &Connection, mut job: JobRequest) -> FmResult<Applied> {
    match job.kind {
        JobKind::CustomerLog => {
            prepare_payload(&mut job);
            Ok(Applied {
                outcome: JobOutcome::Logged {
                    uuid: job.payload.uuid.clone(),
                },
                notifications: vec![job],
            })
        }
        JobKind::Raise(_) => raise(conn, job),
        JobKind::Clear => clear(conn, job),
        JobKind::HierarchicalClear => hierarchical_clear(conn, job),
    }
}

/// Assign a uuid when the client sent none or a malformed one, and a
/// timestamp when it sent none.
fn prepare_payload(job: &mut JobRequest) {
    if Uuid::parse_str(&job.payload.uuid).is_err() {
        job.payload.uuid = Uuid::new_v4().to_string();
    }
    if job.payload.timestamp == 0 {
        job.payload.timestamp = now_micros();
    }
}

fn raise(conn: &Connection, mut job: JobRequest) -> FmResult<Applied> {
    prepare_payload(&mut job);
    let keep_existing = job.payload.keep_existing_alarm;
    job.payload.keep_existing_alarm = false;
    job.payload.masked = false;

    let existing = queries::get_alarm(conn, &job.payload.alarm_id, &job.payload.entity_instance_id)?;

    let outcome = match existing {
        None => {
            queries::insert_alarm(conn, &job.payload)?;
            debug!(alarm_id = %job.payload.alarm_id, entity = %job.payload.entity_instance_id, "Alarm raised");
            JobOutcome::Created {
                uuid: job.payload.uuid.clone(),
            }
        }
        Some(current) if keep_existing => {
            debug!(alarm_id = %current.alarm_id, entity = %current.entity_instance_id, "Keeping existing alarm");
            job.payload.uuid = current.uuid.clone();
            JobOutcome::Kept { uuid: current.uuid }
        }
        Some(current) => {
            job.payload.uuid = current.uuid.clone();
            queries::update_alarm(conn, &job.payload)?;
            debug!(alarm_id = %current.alarm_id, entity = %current.entity_instance_id, "Alarm updated");
            JobOutcome::Updated { uuid: current.uuid }
        }
    };

    Ok(Applied {
        outcome,
        notifications: vec![job],
    })
}

fn clear(conn: &Connection, job: JobRequest) -> FmResult<Applied> {
    let filter = &job.payload;
    if filter.alarm_id.is_empty() {
        return Err(FmError::Validation("delete requires an alarm_id".to_string()));
    }

    // An empty entity selects the empty-entity marker only.
    let entity = if filter.entity_instance_id.is_empty() {
        EntityMatch::Exact(String::new())
    } else {
        EntityMatch::Subtree(filter.entity_instance_id.clone())
    };

    let rows = queries::delete_alarms(conn, &filter.alarm_id, &entity)?;
    if rows.is_empty() {
        return Err(FmError::NotFound);
    }
    Ok(cleared(&job, rows))
}

fn hierarchical_clear(conn: &Connection, job: JobRequest) -> FmResult<Applied> {
    let entity = &job.payload.entity_instance_id;
    if entity.is_empty() {
        return Err(FmError::Validation(
            "hierarchical clear requires an entity_instance_id".to_string(),
        ));
    }

    let rows = queries::delete_alarms_under_entity(conn, entity)?;
    debug!(entity = %entity, cleared = rows.len(), "Hierarchical clear");
    Ok(cleared(&job, rows))
}

fn cleared(job: &JobRequest, rows: Vec<AlarmRecord>) -> Applied {
    let notifications: Vec<_> = rows.into_iter().map(|row| job.cleared_row(row)).collect();
    Applied {
        outcome: JobOutcome::Cleared {
            count: notifications.len(),
        },
        notifications,
    }
}
