//! Client for the fault manager wire protocol.

use crate::{FmError, FmResult};
use fm_protocol::{
    decode_record_list, decode_text_payload, encode, encode_text_payload, Action, AlarmFilter,
    AlarmRecord, MsgHeader, ProtocolError, ResultCode, HEADER_SIZE,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Largest response body the client will read.
pub const MAX_RESPONSE_SIZE: usize = 64 * 1024 * 1024;

/// Client for a fault manager.
///
/// Each call opens its own connection.
#[derive(Debug, Clone)]
pub struct FmClient {
    addr: String,
}

impl FmClient {
    /// Create a client for `host:port`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn connect(&self) -> FmResult<TcpStream> {
        TcpStream::connect(&self.addr)
            .await
            .map_err(|source| FmError::NoConnection {
                addr: self.addr.clone(),
                source,
            })
    }

    /// Send one request and return the raw response.
    pub async fn call(&self, action: Action, payload: &[u8]) -> FmResult<(MsgHeader, Vec<u8>)> {
        let mut stream = self.connect().await?;
        stream.write_all(&encode(action, payload)).await?;

        let mut head = [0u8; HEADER_SIZE];
        stream.read_exact(&mut head).await?;
        let header = MsgHeader::decode(&head)?;
        if header.payload_len() > MAX_RESPONSE_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: header.payload_len(),
                max: MAX_RESPONSE_SIZE,
            }
            .into());
        }
        let mut body = vec![0u8; header.payload_len()];
        stream.read_exact(&mut body).await?;

        debug!(action = ?action, rc = %header.result_code(), bytes = body.len(), "Fault manager replied");
        Ok((header, body))
    }

    async fn request(&self, action: Action, payload: &[u8]) -> FmResult<Vec<u8>> {
        let (header, body) = self.call(action, payload).await?;
        match header.result_code() {
            ResultCode::Ok => Ok(body),
            rc => Err(FmError::from_result_code(rc)),
        }
    }

    /// Check whether the manager accepts connections.
    pub async fn is_reachable(&self) -> bool {
        self.connect().await.is_ok()
    }

    /// Raise or update an alarm, or write a customer log. Returns the uuid.
    pub async fn create_fault(&self, record: &AlarmRecord) -> FmResult<String> {
        let body = self.request(Action::CreateFault, &record.encode()?).await?;
        Ok(decode_text_payload("uuid", &body)?)
    }

    /// Create a batch. Stops at the first failing record.
    pub async fn create_faults(&self, records: &[AlarmRecord]) -> FmResult<()> {
        let mut payload = Vec::new();
        for record in records {
            payload.extend_from_slice(&record.encode()?);
        }
        self.request(Action::CreateFaultList, &payload).await?;
        Ok(())
    }

    pub async fn delete_fault(&self, filter: &AlarmFilter) -> FmResult<()> {
        self.request(Action::DeleteFault, &filter.encode()?).await?;
        Ok(())
    }

    /// Clear every alarm at or below an entity.
    pub async fn delete_faults(&self, entity_instance_id: &str) -> FmResult<()> {
        let payload = encode_text_payload("entity_instance_id", entity_instance_id)?;
        self.request(Action::DeleteFaults, &payload).await?;
        Ok(())
    }

    /// Delete a batch. Filters that match nothing are skipped.
    pub async fn delete_fault_list(&self, filters: &[AlarmFilter]) -> FmResult<()> {
        let mut payload = Vec::new();
        for filter in filters {
            payload.extend_from_slice(&filter.encode()?);
        }
        self.request(Action::DeleteFaultList, &payload).await?;
        Ok(())
    }

    pub async fn get_fault(&self, filter: &AlarmFilter) -> FmResult<Option<AlarmRecord>> {
        match self.request(Action::GetFault, &filter.encode()?).await {
            Ok(body) => Ok(Some(AlarmRecord::decode(&body)?)),
            Err(FmError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Unsuppressed alarms whose entity starts with `entity_instance_id`.
    pub async fn get_faults(&self, entity_instance_id: &str) -> FmResult<Vec<AlarmRecord>> {
        let payload = encode_text_payload("entity_instance_id", entity_instance_id)?;
        self.list(Action::GetFaults, &payload).await
    }

    pub async fn get_faults_by_id(&self, alarm_id: &str) -> FmResult<Vec<AlarmRecord>> {
        let payload = encode_text_payload("alarm_id", alarm_id)?;
        self.list(Action::GetFaultsById, &payload).await
    }

    pub async fn get_faults_by_id_and_entity(
        &self,
        filter: &AlarmFilter,
    ) -> FmResult<Vec<AlarmRecord>> {
        self.list(Action::GetFaultsByIdAndEntity, &filter.encode()?)
            .await
    }

    async fn list(&self, action: Action, payload: &[u8]) -> FmResult<Vec<AlarmRecord>> {
        match self.request(action, payload).await {
            Ok(body) => Ok(decode_record_list(&body)?),
            Err(FmError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
