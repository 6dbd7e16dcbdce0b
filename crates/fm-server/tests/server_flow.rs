//! End-to-end flows against a server on an ephemeral port.

use async_trait::async_trait;
use fm_database::{queries, Database, SuppressionStatus};
use fm_protocol::{
    decode_text_payload, encode, encode_frame, encode_text_payload, Action, MsgHeader,
    HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
use fm_server::{
    AlarmFilter, AlarmRecord, AlarmState, BindSettings, DispatcherSettings, FmClient, FmError,
    FmServer, ResultCode, ServerSettings, Severity,
};
use fm_trap::{TrapResult, TrapTarget, TrapTransport};
use parking_lot::Mutex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A delivered trap and the history row count seen at delivery time.
#[derive(Debug, Clone)]
struct Delivered {
    trap: Value,
    history_rows: usize,
}

struct RecordingTransport {
    database: PathBuf,
    delivered: Mutex<Vec<Delivered>>,
}

impl RecordingTransport {
    fn new(database: &Path) -> Self {
        Self {
            database: database.to_path_buf(),
            delivered: Mutex::new(Vec::new()),
        }
    }

    fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().clone()
    }

    fn operations(&self) -> Vec<String> {
        self.delivered()
            .iter()
            .map(|d| d.trap["operation_type"].as_str().unwrap().to_string())
            .collect()
    }

    async fn wait_for(&self, count: usize) -> Vec<Delivered> {
        for _ in 0..300 {
            if self.delivered.lock().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.delivered()
    }
}

#[async_trait]
impl TrapTransport for RecordingTransport {
    async fn deliver(&self, _target: &TrapTarget, payload: &[u8]) -> TrapResult<()> {
        let history_rows = Database::open(&self.database)
            .and_then(|db| queries::list_event_log(db.connection(), 10_000))
            .map(|rows| rows.len())
            .unwrap_or(0);
        self.delivered.lock().push(Delivered {
            trap: serde_json::from_slice(payload)?,
            history_rows,
        });
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    database: PathBuf,
    server: FmServer,
    client: FmClient,
    transport: Arc<RecordingTransport>,
}

impl Harness {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("fm.db");
        let transport = Arc::new(RecordingTransport::new(&database));

        let settings = ServerSettings {
            bind: BindSettings {
                host: "127.0.0.1".to_string(),
                port: 0,
                retries: 1,
                backoff: Duration::from_millis(10),
            },
            database_path: database.clone(),
            dispatcher: DispatcherSettings {
                snmp_enabled: true,
                trap_target: TrapTarget {
                    host: "127.0.0.1".to_string(),
                    port: 162,
                },
                system_name: "lab".to_string(),
                region_name: "region-one".to_string(),
            },
            trap_destinations: "10.0.0.1 public".to_string(),
            write_poll_interval: Duration::from_millis(20),
            read_poll_interval: Duration::from_millis(10),
            suppression_cooldown: Duration::from_millis(50),
            suppression_poll_interval: Duration::from_millis(20),
        };

        let server = FmServer::start(settings, transport.clone()).await.unwrap();
        let client = FmClient::new(server.local_addr().to_string());
        Self {
            _dir: dir,
            database,
            server,
            client,
            transport,
        }
    }

    fn db(&self) -> Database {
        Database::open(&self.database).unwrap()
    }

    async fn raise(&self, alarm_id: &str, eid: &str, severity: Severity) -> String {
        self.client
            .create_fault(&AlarmRecord::new(alarm_id, eid, severity))
            .await
            .unwrap()
    }

    async fn stop(self) {
        self.server.shutdown().await;
    }
}

async fn exchange(stream: &mut TcpStream, frame: &[u8]) -> (MsgHeader, Vec<u8>) {
    stream.write_all(frame).await.unwrap();
    let mut head = [0u8; HEADER_SIZE];
    stream.read_exact(&mut head).await.unwrap();
    let header = MsgHeader::decode(&head).unwrap();
    let mut body = vec![0u8; header.payload_len()];
    stream.read_exact(&mut body).await.unwrap();
    (header, body)
}

#[tokio::test]
async fn test_update_keeps_uuid_and_empty_entity_delete_is_not_found() {
    let h = Harness::start().await;

    let first = h.raise("100.001", "host-1.disk0", Severity::Major).await;
    let second = h.raise("100.001", "host-1.disk0", Severity::Critical).await;
    assert_eq!(first, second);

    let rows = queries::list_alarms(h.db().connection()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].severity, Severity::Critical);
    assert_eq!(rows[0].uuid, first);

    // An empty entity filter selects only alarms stored with no entity.
    let err = h
        .client
        .delete_fault(&AlarmFilter::new("100.001", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, FmError::NotFound));
    assert_eq!(err.result_code(), ResultCode::EntityNotFound);

    h.client
        .delete_fault(&AlarmFilter::new("100.001", "host-1.disk0"))
        .await
        .unwrap();
    assert!(queries::list_alarms(h.db().connection()).unwrap().is_empty());

    let operations = {
        h.transport.wait_for(3).await;
        h.transport.operations()
    };
    assert_eq!(operations, vec!["wrsAlarmMajor", "wrsAlarmCritical", "wrsAlarmClear"]);
    h.stop().await;
}

#[tokio::test]
async fn test_keep_existing_leaves_row_untouched() {
    let h = Harness::start().await;
    let uuid = h.raise("100.001", "host-1", Severity::Major).await;
    let before = queries::get_alarm(h.db().connection(), "100.001", "host-1")
        .unwrap()
        .unwrap();

    let mut again = AlarmRecord::new("100.001", "host-1", Severity::Critical);
    again.reason_text = "changed".to_string();
    again.keep_existing_alarm = true;
    let returned = h.client.create_fault(&again).await.unwrap();

    assert_eq!(returned, uuid);
    let after = queries::get_alarm(h.db().connection(), "100.001", "host-1")
        .unwrap()
        .unwrap();
    assert_eq!(before, after);
    h.stop().await;
}

#[tokio::test]
async fn test_hierarchical_clear_stops_at_segment_boundary() {
    let h = Harness::start().await;
    for eid in ["host-1.disk0", "host-1.fan2", "host-10.disk0"] {
        h.raise("200.001", eid, Severity::Minor).await;
    }

    h.client.delete_faults("host-1").await.unwrap();

    let remaining: Vec<_> = queries::list_alarms(h.db().connection())
        .unwrap()
        .into_iter()
        .map(|a| a.entity_instance_id)
        .collect();
    assert_eq!(remaining, vec!["host-10.disk0"]);

    let delivered = h.transport.wait_for(5).await;
    let clears: Vec<_> = delivered
        .iter()
        .filter(|d| d.trap["operation_type"] == "wrsAlarmHierarchicalClear")
        .map(|d| d.trap["alarm"]["wrsAlarmActiveEntityInstanceId"].clone())
        .collect();
    assert_eq!(
        clears,
        vec!["region-one.lab.host-1.disk0", "region-one.lab.host-1.fan2"]
    );

    // Clearing an empty subtree is not an error.
    h.client.delete_faults("host-7").await.unwrap();
    h.stop().await;
}

#[tokio::test]
async fn test_batch_delete_stops_at_malformed_filter() {
    let h = Harness::start().await;
    for eid in ["host-0", "host-1", "host-3"] {
        h.raise("100.001", eid, Severity::Major).await;
    }

    let filters = vec![
        AlarmFilter::new("100.001", "host-0"),
        AlarmFilter::new("100.001", "host-1"),
        AlarmFilter::new("", "host-2"),
        AlarmFilter::new("100.001", "host-3"),
    ];
    let err = h.client.delete_fault_list(&filters).await.unwrap_err();
    assert_eq!(err.result_code(), ResultCode::InvalidRequest);

    let remaining: Vec<_> = queries::list_alarms(h.db().connection())
        .unwrap()
        .into_iter()
        .map(|a| a.entity_instance_id)
        .collect();
    assert_eq!(remaining, vec!["host-3"]);
    h.stop().await;
}

#[tokio::test]
async fn test_batch_delete_tolerates_not_found() {
    let h = Harness::start().await;
    h.raise("100.001", "host-0", Severity::Major).await;
    h.raise("100.001", "host-2", Severity::Major).await;

    let filters = vec![
        AlarmFilter::new("100.001", "host-0"),
        AlarmFilter::new("100.001", "host-1"),
        AlarmFilter::new("100.001", "host-2"),
    ];
    h.client.delete_fault_list(&filters).await.unwrap();
    assert!(queries::list_alarms(h.db().connection()).unwrap().is_empty());
    h.stop().await;
}

#[tokio::test]
async fn test_batch_create() {
    let h = Harness::start().await;
    let records: Vec<_> = (0..3)
        .map(|i| AlarmRecord::new("300.001", format!("host-{i}"), Severity::Warning))
        .collect();
    h.client.create_faults(&records).await.unwrap();
    assert_eq!(h.client.get_faults_by_id("300.001").await.unwrap().len(), 3);
    h.stop().await;
}

#[tokio::test]
async fn test_suppressed_alarm_gets_history_without_trap() {
    let h = Harness::start().await;
    h.db()
        .set_event_suppression("100.001", SuppressionStatus::Suppressed)
        .unwrap();

    h.raise("100.001", "host-1", Severity::Critical).await;
    h.raise("100.002", "host-1", Severity::Major).await;

    let delivered = h.transport.wait_for(2).await;
    let alarm_traps: Vec<_> = delivered
        .iter()
        .filter(|d| d.trap["operation_type"] != "warmStart")
        .collect();
    assert_eq!(alarm_traps.len(), 1);
    assert_eq!(alarm_traps[0].trap["alarm"]["wrsAlarmActiveAlarmId"], "100.002");
    // Both history rows were committed before the trap went out.
    assert_eq!(alarm_traps[0].history_rows, 2);

    let history = queries::list_event_log(h.db().connection(), 10).unwrap();
    assert_eq!(history.len(), 2);
    h.stop().await;
}

#[tokio::test]
async fn test_history_precedes_every_trap() {
    let h = Harness::start().await;
    for (index, severity) in [Severity::Warning, Severity::Minor, Severity::Major]
        .into_iter()
        .enumerate()
    {
        h.raise("100.001", &format!("host-{index}"), severity).await;
    }

    let delivered = h.transport.wait_for(3).await;
    for (index, d) in delivered.iter().enumerate() {
        assert!(d.history_rows > index, "trap {index} sent before its history row");
    }
    h.stop().await;
}

#[tokio::test]
async fn test_customer_log_is_history_only() {
    let h = Harness::start().await;
    let mut log = AlarmRecord::new("100.200", "host-1", Severity::Minor);
    log.alarm_state = AlarmState::Message;
    log.reason_text = "user logged in".to_string();

    let uuid = h.client.create_fault(&log).await.unwrap();
    assert!(!uuid.is_empty());
    assert!(queries::list_alarms(h.db().connection()).unwrap().is_empty());

    let history = queries::list_event_log(h.db().connection(), 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].state, AlarmState::Message);
    assert_eq!(history[0].alarm_id, None);

    let delivered = h.transport.wait_for(1).await;
    assert_eq!(delivered[0].trap["operation_type"], "wrsAlarmMessage");
    h.stop().await;
}

#[tokio::test]
async fn test_lookups() {
    let h = Harness::start().await;
    h.raise("100.001", "host-1.disk0", Severity::Major).await;
    h.raise("100.001", "host-10.disk0", Severity::Major).await;
    h.raise("200.001", "host-1.fan2", Severity::Minor).await;

    let one = h
        .client
        .get_fault(&AlarmFilter::new("200.001", "host-1.fan2"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one.severity, Severity::Minor);
    assert!(h
        .client
        .get_fault(&AlarmFilter::new("200.001", "host-1"))
        .await
        .unwrap()
        .is_none());

    let by_entity: Vec<_> = h
        .client
        .get_faults("host-1")
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.entity_instance_id)
        .collect();
    assert_eq!(
        by_entity,
        vec!["lab.host-1.disk0", "lab.host-10.disk0", "lab.host-1.fan2"]
    );

    assert_eq!(h.client.get_faults_by_id("100.001").await.unwrap().len(), 2);
    assert!(h.client.get_faults_by_id("999.999").await.unwrap().is_empty());

    let scoped = h
        .client
        .get_faults_by_id_and_entity(&AlarmFilter::new("100.001", "host-10"))
        .await
        .unwrap();
    assert_eq!(scoped.len(), 1);

    let err = h
        .client
        .get_faults_by_id_and_entity(&AlarmFilter::new("", "host-1"))
        .await
        .unwrap_err();
    assert_eq!(err.result_code(), ResultCode::InvalidRequest);
    h.stop().await;
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() {
    let h = Harness::start().await;
    let mut stream = TcpStream::connect(h.server.local_addr()).await.unwrap();

    // One record plus a stray byte.
    let mut payload = AlarmRecord::new("100.001", "host-1", Severity::Major)
        .encode()
        .unwrap();
    payload.push(0);
    let (header, body) = exchange(&mut stream, &encode(Action::CreateFaultList, &payload)).await;
    assert_eq!(header.result_code(), ResultCode::InvalidRequest);
    assert!(body.is_empty());

    // Oversized payload is drained, then rejected.
    let oversized = MsgHeader::new(Action::CreateFaultList, MAX_PAYLOAD_SIZE + 1, ResultCode::Ok);
    let frame = encode_frame(&oversized, &vec![0u8; MAX_PAYLOAD_SIZE + 1]);
    let (header, _) = exchange(&mut stream, &frame).await;
    assert_eq!(header.result_code(), ResultCode::InvalidRequest);

    // The same connection still serves requests.
    let record = AlarmRecord::new("100.001", "host-1", Severity::Major);
    let (header, body) =
        exchange(&mut stream, &encode(Action::CreateFault, &record.encode().unwrap())).await;
    assert_eq!(header.result_code(), ResultCode::Ok);
    assert!(!decode_text_payload("uuid", &body).unwrap().is_empty());

    let lookup = encode_text_payload("alarm_id", "100.001").unwrap();
    let (header, _) = exchange(&mut stream, &encode(Action::GetFaultsById, &lookup)).await;
    assert_eq!(header.result_code(), ResultCode::Ok);
    assert_eq!(header.action, Action::GetFaultsById.as_u32());
    h.stop().await;
}

#[tokio::test]
async fn test_suppression_edit_sends_one_warm_start() {
    let h = Harness::start().await;
    let db = h.db();
    db.set_event_suppression("100.001", SuppressionStatus::Suppressed)
        .unwrap();
    db.set_event_suppression("100.002", SuppressionStatus::Suppressed)
        .unwrap();

    let delivered = h.transport.wait_for(1).await;
    assert_eq!(delivered[0].trap["operation_type"], "warmStart");
    assert_eq!(delivered[0].trap["destinations"][0]["ip"], "10.0.0.1");
    h.stop().await;
}

#[tokio::test]
async fn test_stopped_server_is_no_connection() {
    let h = Harness::start().await;
    let client = h.client.clone();
    h.stop().await;

    // Give the listener socket time to close.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let err = client.get_faults_by_id("100.001").await.unwrap_err();
    assert_eq!(err.result_code(), ResultCode::NoConnection);
}
