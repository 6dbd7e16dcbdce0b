//! Queue entries.

use crate::connection::ClientConnection;
use crate::FmResult;
use fm_protocol::{AlarmFilter, AlarmRecord, AlarmState, Severity};
use std::sync::Arc;
use tokio::sync::oneshot;

/// What a write job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// History row and trap only; the alarm table is never touched.
    CustomerLog,
    /// Raise or update an alarm at this severity.
    Raise(Severity),
    /// Clear alarms matching one filter.
    Clear,
    /// Clear every alarm at or below an entity.
    HierarchicalClear,
}

/// Direction of the transition recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Apply {
    Set,
    Clear,
}

/// One unit of work for the write worker.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub kind: JobKind,
    pub apply: Apply,
    pub payload: AlarmRecord,
}

impl JobRequest {
    /// Job for a create request. Message-state records are customer logs.
    pub fn from_create(record: AlarmRecord) -> Self {
        let kind = match record.alarm_state {
            AlarmState::Message => JobKind::CustomerLog,
            _ => JobKind::Raise(record.severity),
        };
        Self {
            kind,
            apply: Apply::Set,
            payload: record,
        }
    }

    /// Job for a delete request. The payload carries only the filter fields.
    pub fn clear(filter: AlarmFilter) -> Self {
        let mut payload = AlarmRecord::new(filter.alarm_id, filter.entity_instance_id, Severity::Clear);
        payload.alarm_state = AlarmState::Clear;
        Self {
            kind: JobKind::Clear,
            apply: Apply::Clear,
            payload,
        }
    }

    /// Job for a delete-faults request on an entity prefix.
    pub fn hierarchical_clear(entity_instance_id: impl Into<String>) -> Self {
        let mut payload = AlarmRecord::new("", entity_instance_id, Severity::Clear);
        payload.alarm_state = AlarmState::Clear;
        Self {
            kind: JobKind::HierarchicalClear,
            apply: Apply::Clear,
            payload,
        }
    }

    /// Notification for a row removed by this job.
    pub(crate) fn cleared_row(&self, row: AlarmRecord) -> Self {
        Self {
            kind: self.kind,
            apply: Apply::Clear,
            payload: row,
        }
    }
}

/// Result of applying a write job, as reported back to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Created { uuid: String },
    Updated { uuid: String },
    /// `keep_existing_alarm` matched a row; nothing changed.
    Kept { uuid: String },
    Logged { uuid: String },
    Cleared { count: usize },
}

impl JobOutcome {
    pub fn uuid(&self) -> Option<&str> {
        match self {
            JobOutcome::Created { uuid }
            | JobOutcome::Updated { uuid }
            | JobOutcome::Kept { uuid }
            | JobOutcome::Logged { uuid } => Some(uuid),
            JobOutcome::Cleared { .. } => None,
        }
    }
}

/// Write queue entry.
pub struct WriteJob {
    pub job: JobRequest,
    pub reply: Option<oneshot::Sender<FmResult<JobOutcome>>>,
}

impl WriteJob {
    /// Entry whose outcome is awaited through the returned receiver.
    pub fn with_reply(job: JobRequest) -> (Self, oneshot::Receiver<FmResult<JobOutcome>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                job,
                reply: Some(tx),
            },
            rx,
        )
    }
}

/// Read queue entry: the request frame exactly as received.
pub struct GetRequest {
    pub connection: Arc<ClientConnection>,
    pub frame: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_state_is_customer_log() {
        let mut record = AlarmRecord::new("100.200", "host-1", Severity::Major);
        record.alarm_state = AlarmState::Message;
        assert_eq!(JobRequest::from_create(record).kind, JobKind::CustomerLog);

        let record = AlarmRecord::new("100.001", "host-1", Severity::Minor);
        let job = JobRequest::from_create(record);
        assert_eq!(job.kind, JobKind::Raise(Severity::Minor));
        assert_eq!(job.apply, Apply::Set);
    }

    #[test]
    fn test_clear_jobs_carry_filter() {
        let job = JobRequest::clear(AlarmFilter::new("100.001", "host-1.disk0"));
        assert_eq!(job.kind, JobKind::Clear);
        assert_eq!(job.apply, Apply::Clear);
        assert_eq!(job.payload.alarm_id, "100.001");
        assert_eq!(job.payload.entity_instance_id, "host-1.disk0");

        let job = JobRequest::hierarchical_clear("host-1");
        assert_eq!(job.kind, JobKind::HierarchicalClear);
        assert_eq!(job.payload.entity_instance_id, "host-1");
    }

    #[test]
    fn test_outcome_uuid() {
        let outcome = JobOutcome::Kept {
            uuid: "abc".to_string(),
        };
        assert_eq!(outcome.uuid(), Some("abc"));
        assert_eq!(JobOutcome::Cleared { count: 2 }.uuid(), None);
    }
}
