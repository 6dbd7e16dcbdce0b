//! Read worker: answers lookups on its own storage session.

use crate::job::GetRequest;
use crate::queue::WorkQueue;
use crate::{FmError, FmResult};
use fm_database::{queries, EntityMatch, FmSession};
use fm_protocol::{
    decode, decode_text_payload, encode_frame, encode_record_list_into, record_list_len, Action,
    AlarmFilter, AlarmRecord, ResultCode, MAX_TEXT_LEN,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A parsed lookup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Zero or one alarm with this identity.
    Exact(AlarmFilter),
    /// Unsuppressed alarms whose entity starts with the prefix.
    Entity(String),
    AlarmId(String),
    /// Unsuppressed alarms with the alarm id under an entity prefix.
    AlarmIdAndEntity(AlarmFilter),
}

impl Lookup {
    pub fn parse(action: Action, payload: &[u8]) -> FmResult<Self> {
        match action {
            Action::GetFault => Ok(Lookup::Exact(AlarmFilter::decode(payload)?)),
            Action::GetFaults => Ok(Lookup::Entity(decode_text_payload(
                "entity_instance_id",
                payload,
            )?)),
            Action::GetFaultsById => Ok(Lookup::AlarmId(decode_text_payload("alarm_id", payload)?)),
            Action::GetFaultsByIdAndEntity => {
                let filter = AlarmFilter::decode(payload)?;
                if filter.alarm_id.is_empty() {
                    return Err(FmError::Validation(
                        "lookup by entity requires an alarm_id".to_string(),
                    ));
                }
                Ok(Lookup::AlarmIdAndEntity(filter))
            }
            other => Err(FmError::Validation(format!("{other:?} is not a lookup"))),
        }
    }

    fn run(&self, conn: &rusqlite::Connection) -> FmResult<Vec<AlarmRecord>> {
        let rows = match self {
            Lookup::Exact(filter) => {
                queries::get_alarm(conn, &filter.alarm_id, &filter.entity_instance_id)?
                    .into_iter()
                    .collect()
            }
            Lookup::Entity(prefix) => {
                queries::get_unsuppressed_alarms(conn, &EntityMatch::Prefix(prefix.clone()))?
            }
            Lookup::AlarmId(alarm_id) => queries::get_alarms_by_id(conn, alarm_id)?,
            Lookup::AlarmIdAndEntity(filter) => queries::get_alarms_by_id_and_entity(
                conn,
                &filter.alarm_id,
                &EntityMatch::Prefix(filter.entity_instance_id.clone()),
            )?,
        };
        Ok(rows)
    }
}

pub struct ReadWorker {
    session: FmSession,
    queue: Arc<WorkQueue<GetRequest>>,
    system_name: String,
    poll_interval: Duration,
}

impl ReadWorker {
    pub fn new(
        session: FmSession,
        queue: Arc<WorkQueue<GetRequest>>,
        system_name: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            session,
            queue,
            system_name,
            poll_interval,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(poll_ms = self.poll_interval.as_millis() as u64, "Read worker started");
            loop {
                while let Some(request) = self.queue.pop() {
                    self.process(request).await;
                }
                self.queue.wait(self.poll_interval).await;
            }
        })
    }

    /// Answer one request on the connection it came from.
    pub async fn process(&self, request: GetRequest) {
        let (header, result) = match decode(&request.frame) {
            Ok((header, payload)) => (header, self.answer(header.action(), payload).await),
            Err(e) => {
                warn!(connection = request.connection.id(), error = %e, "Malformed read request");
                return;
            }
        };

        let (rc, payload) = match result {
            Ok(payload) => (ResultCode::Ok, payload),
            Err(FmError::NotFound) => {
                debug!(action = header.action, "Lookup matched nothing");
                (ResultCode::EntityNotFound, Vec::new())
            }
            Err(e) => {
                warn!(action = header.action, error = %e, "Lookup failed");
                (e.result_code(), Vec::new())
            }
        };

        let frame = encode_frame(&header.reply(rc, payload.len()), &payload);
        request.connection.send(&frame).await;
    }

    async fn answer(
        &self,
        action: fm_protocol::ProtocolResult<Action>,
        payload: &[u8],
    ) -> FmResult<Vec<u8>> {
        let action = action?;
        let lookup = Lookup::parse(action, payload)?;
        let exact = matches!(lookup, Lookup::Exact(_));
        let qualify = matches!(lookup, Lookup::Entity(_));

        let mut rows = self
            .session
            .call(move |conn| Ok(lookup.run(conn)))
            .await??;

        if rows.is_empty() {
            return Err(FmError::NotFound);
        }
        if exact {
            return Ok(rows[0].encode()?);
        }
        if qualify && !self.system_name.is_empty() {
            for row in &mut rows {
                row.entity_instance_id = self::qualify(&self.system_name, &row.entity_instance_id);
            }
        }
        encode_rows(&rows)
    }
}

/// Prefix the system name, cut to what a wire text field can hold.
fn qualify(system_name: &str, entity_instance_id: &str) -> String {
    let mut qualified = format!("{system_name}.{entity_instance_id}");
    if qualified.len() > MAX_TEXT_LEN {
        let mut end = MAX_TEXT_LEN;
        while !qualified.is_char_boundary(end) {
            end -= 1;
        }
        qualified.truncate(end);
    }
    qualified
}

/// Count-prefixed response body, failing cleanly if the buffer cannot be
/// allocated.
fn encode_rows(rows: &[AlarmRecord]) -> FmResult<Vec<u8>> {
    let mut body = Vec::new();
    body.try_reserve_exact(record_list_len(rows.len()))
        .map_err(|_| FmError::ResourceExhausted(rows.len()))?;
    encode_record_list_into(&mut body, rows)?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ClientConnection, ConnectionRegistry};
    use fm_database::{Database, SuppressionStatus};
    use fm_protocol::{
        decode_record_list, encode, encode_text_payload, MsgHeader, Severity, HEADER_SIZE,
    };
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};

    struct Fixture {
        _dir: tempfile::TempDir,
        worker: ReadWorker,
        connection: Arc<ClientConnection>,
        client: TcpStream,
    }

    async fn fixture(system_name: &str) -> Fixture {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fm.db");
        {
            let db = Database::open(&path).unwrap();
            let conn = db.connection();
            for (alarm_id, eid) in [
                ("100.001", "host-1.disk0"),
                ("100.001", "host-10.disk0"),
                ("200.001", "host-1.fan2"),
            ] {
                let mut alarm = AlarmRecord::new(alarm_id, eid, Severity::Major);
                alarm.uuid = uuid::Uuid::new_v4().to_string();
                alarm.timestamp = 1_700_000_000_000_000;
                queries::insert_alarm(conn, &alarm).unwrap();
            }
            db.set_event_suppression("200.001", SuppressionStatus::Suppressed)
                .unwrap();
        }

        let session = FmSession::open(&path).await.unwrap();
        let worker = ReadWorker::new(
            session,
            Arc::new(WorkQueue::new("read")),
            system_name.to_string(),
            Duration::from_millis(10),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let (server, peer) = listener.accept().await.unwrap();
        let (_reader, writer) = server.into_split();
        let connection =
            ClientConnection::register(writer, peer, Arc::new(ConnectionRegistry::new()));

        Fixture {
            _dir: dir,
            worker,
            connection,
            client,
        }
    }

    async fn ask(fx: &mut Fixture, action: Action, payload: Vec<u8>) -> (MsgHeader, Vec<u8>) {
        fx.worker
            .process(GetRequest {
                connection: Arc::clone(&fx.connection),
                frame: encode(action, &payload),
            })
            .await;

        let mut head = [0u8; HEADER_SIZE];
        fx.client.read_exact(&mut head).await.unwrap();
        let header = MsgHeader::decode(&head).unwrap();
        let mut body = vec![0u8; header.payload_len()];
        fx.client.read_exact(&mut body).await.unwrap();
        (header, body)
    }

    #[tokio::test]
    async fn test_exact_lookup() {
        let mut fx = fixture("").await;
        let filter = AlarmFilter::new("100.001", "host-1.disk0").encode().unwrap();
        let (header, body) = ask(&mut fx, Action::GetFault, filter).await;
        assert_eq!(header.result_code(), ResultCode::Ok);
        assert_eq!(header.action, Action::GetFault.as_u32());
        let record = AlarmRecord::decode(&body).unwrap();
        assert_eq!(record.entity_instance_id, "host-1.disk0");

        let filter = AlarmFilter::new("100.001", "host-1").encode().unwrap();
        let (header, body) = ask(&mut fx, Action::GetFault, filter).await;
        assert_eq!(header.result_code(), ResultCode::EntityNotFound);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_entity_lookup_is_raw_prefix_and_qualified() {
        let mut fx = fixture("lab").await;
        let payload = encode_text_payload("entity_instance_id", "host-1").unwrap();
        let (header, body) = ask(&mut fx, Action::GetFaults, payload).await;
        assert_eq!(header.result_code(), ResultCode::Ok);

        // 200.001 is suppressed; host-10 matches the raw prefix.
        let entities: Vec<_> = decode_record_list(&body)
            .unwrap()
            .into_iter()
            .map(|r| r.entity_instance_id)
            .collect();
        assert_eq!(entities, vec!["lab.host-1.disk0", "lab.host-10.disk0"]);
    }

    #[tokio::test]
    async fn test_entity_lookup_cuts_long_qualified_ids() {
        let mut fx = fixture("lab").await;
        let long_eid = format!("host-1.{}", "d".repeat(247));
        assert_eq!(long_eid.len(), MAX_TEXT_LEN);
        let mut alarm = AlarmRecord::new("300.001", &long_eid, Severity::Minor);
        alarm.uuid = uuid::Uuid::new_v4().to_string();
        alarm.timestamp = 1_700_000_000_000_000;
        fx.worker
            .session
            .call(move |conn| queries::insert_alarm(conn, &alarm))
            .await
            .unwrap();

        let payload = encode_text_payload("entity_instance_id", "host-1").unwrap();
        let (header, body) = ask(&mut fx, Action::GetFaults, payload).await;
        assert_eq!(header.result_code(), ResultCode::Ok);

        let rows = decode_record_list(&body).unwrap();
        assert_eq!(rows.len(), 3);
        let long = rows.iter().find(|r| r.alarm_id == "300.001").unwrap();
        assert_eq!(long.entity_instance_id.len(), MAX_TEXT_LEN);
        assert!(long.entity_instance_id.starts_with("lab.host-1.ddd"));
    }

    #[test]
    fn test_qualify_respects_char_boundaries() {
        assert_eq!(qualify("lab", "host-1"), "lab.host-1");

        // "la." plus two-byte chars: byte 254 falls inside a char.
        let eid = "é".repeat(126);
        let qualified = qualify("la", &eid);
        assert_eq!(qualified.len(), MAX_TEXT_LEN - 1);
        assert!(qualified.starts_with("la.é"));
        assert!(qualified.ends_with('é'));
    }

    #[tokio::test]
    async fn test_alarm_id_lookup_includes_suppressed() {
        let mut fx = fixture("lab").await;
        let payload = encode_text_payload("alarm_id", "200.001").unwrap();
        let (header, body) = ask(&mut fx, Action::GetFaultsById, payload).await;
        assert_eq!(header.result_code(), ResultCode::Ok);
        let rows = decode_record_list(&body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity_instance_id, "host-1.fan2");
    }

    #[tokio::test]
    async fn test_id_and_entity_requires_alarm_id() {
        let mut fx = fixture("").await;
        let filter = AlarmFilter::new("", "host-1").encode().unwrap();
        let (header, _) = ask(&mut fx, Action::GetFaultsByIdAndEntity, filter).await;
        assert_eq!(header.result_code(), ResultCode::InvalidRequest);

        let filter = AlarmFilter::new("100.001", "host-1.").encode().unwrap();
        let (header, body) = ask(&mut fx, Action::GetFaultsByIdAndEntity, filter).await;
        assert_eq!(header.result_code(), ResultCode::Ok);
        assert_eq!(decode_record_list(&body).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_size_is_invalid_request() {
        let mut fx = fixture("").await;
        let (header, _) = ask(&mut fx, Action::GetFault, vec![0u8; 12]).await;
        assert_eq!(header.result_code(), ResultCode::InvalidRequest);
    }

    #[test]
    fn test_encode_rows_layout() {
        let rows = vec![AlarmRecord::new("100.001", "host-1", Severity::Minor)];
        let body = encode_rows(&rows).unwrap();
        assert_eq!(body.len(), record_list_len(1));
        assert_eq!(decode_record_list(&body).unwrap(), rows);
    }
}
