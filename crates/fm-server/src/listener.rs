//! Connection listener.
//!
//! One task per client reads frames in order. Write actions are queued
//! for the write worker and answered here once the worker replies; read
//! actions are queued verbatim and answered by the read worker.

use crate::connection::{ClientConnection, ConnectionRegistry};
use crate::job::{GetRequest, JobOutcome, JobRequest, WriteJob};
use crate::queue::WorkQueue;
use crate::{FmError, FmResult};
use fm_protocol::{
    decode_text_payload, encode_frame, encode_text_payload, split_records, Action, AlarmFilter,
    AlarmRecord, MsgHeader, ResultCode, ALARM_RECORD_SIZE, FILTER_SIZE, HEADER_SIZE,
    MAX_PAYLOAD_SIZE,
};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Hands requests to the queues.
#[derive(Clone)]
pub struct Router {
    write_queue: Arc<WorkQueue<WriteJob>>,
    read_queue: Arc<WorkQueue<GetRequest>>,
}

impl Router {
    pub fn new(
        write_queue: Arc<WorkQueue<WriteJob>>,
        read_queue: Arc<WorkQueue<GetRequest>>,
    ) -> Self {
        Self {
            write_queue,
            read_queue,
        }
    }

    async fn submit(&self, job: JobRequest) -> FmResult<JobOutcome> {
        let (item, rx) = WriteJob::with_reply(job);
        self.write_queue.push(item);
        rx.await.map_err(|_| FmError::WorkerGone("write"))?
    }

    /// Run a write action and build the response code and body.
    pub async fn handle_write(&self, action: Action, payload: &[u8]) -> (ResultCode, Vec<u8>) {
        match self.write(action, payload).await {
            Ok(body) => (ResultCode::Ok, body),
            Err(FmError::NotFound) => {
                debug!(action = ?action, "Nothing matched");
                (ResultCode::EntityNotFound, Vec::new())
            }
            Err(e) => {
                warn!(action = ?action, error = %e, "Write request failed");
                (e.result_code(), Vec::new())
            }
        }
    }

    async fn write(&self, action: Action, payload: &[u8]) -> FmResult<Vec<u8>> {
        match action {
            Action::CreateFault => {
                let record = AlarmRecord::decode(payload)?;
                let outcome = self.submit(JobRequest::from_create(record)).await?;
                Ok(encode_text_payload("uuid", outcome.uuid().unwrap_or_default())?)
            }
            Action::DeleteFault => {
                let filter = AlarmFilter::decode(payload)?;
                self.submit(JobRequest::clear(filter)).await?;
                Ok(Vec::new())
            }
            Action::DeleteFaults => {
                let entity = decode_text_payload("entity_instance_id", payload)?;
                self.submit(JobRequest::hierarchical_clear(entity)).await?;
                Ok(Vec::new())
            }
            // Batches stop at the first failure; earlier elements stay applied.
            Action::CreateFaultList => {
                for element in split_records(payload, ALARM_RECORD_SIZE)? {
                    let record = AlarmRecord::decode(element)?;
                    self.submit(JobRequest::from_create(record)).await?;
                }
                Ok(Vec::new())
            }
            Action::DeleteFaultList => {
                for element in split_records(payload, FILTER_SIZE)? {
                    let filter = AlarmFilter::decode(element)?;
                    match self.submit(JobRequest::clear(filter)).await {
                        Ok(_) | Err(FmError::NotFound) => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(Vec::new())
            }
            other => Err(FmError::Validation(format!("{other:?} is not a write action"))),
        }
    }

    fn enqueue_read(&self, connection: Arc<ClientConnection>, frame: Vec<u8>) {
        self.read_queue.push(GetRequest { connection, frame });
    }
}

/// Accept loop for the bound socket.
pub struct Listener {
    listener: TcpListener,
    router: Router,
    registry: Arc<ConnectionRegistry>,
}

impl Listener {
    pub fn new(listener: TcpListener, router: Router, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            listener,
            router,
            registry,
        }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            let router = self.router.clone();
                            let registry = Arc::clone(&self.registry);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer, router, registry).await {
                                    error!(peer = %peer, error = %e, "Connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Accept error");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Listener shutting down");
                    break;
                }
            }
        }
    }
}

enum Frame {
    Request(MsgHeader, Vec<u8>),
    /// Declared payload over the limit; already discarded.
    Oversized(MsgHeader),
    Closed,
}

async fn read_frame(reader: &mut OwnedReadHalf) -> FmResult<Frame> {
    let mut head = [0u8; HEADER_SIZE];
    match reader.read_exact(&mut head).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(Frame::Closed),
        Err(e) => return Err(e.into()),
    }
    let header = MsgHeader::decode(&head)?;
    let len = header.payload_len();

    if len > MAX_PAYLOAD_SIZE {
        let drained = tokio::io::copy(&mut (&mut *reader).take(len as u64), &mut tokio::io::sink()).await?;
        if drained < len as u64 {
            return Ok(Frame::Closed);
        }
        return Ok(Frame::Oversized(header));
    }

    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload).await {
        Ok(_) => Ok(Frame::Request(header, payload)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(Frame::Closed),
        Err(e) => Err(e.into()),
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    registry: Arc<ConnectionRegistry>,
) -> FmResult<()> {
    let (mut reader, writer) = stream.into_split();
    let connection = ClientConnection::register(writer, peer, registry);

    let result = serve(&mut reader, &connection, &router).await;
    connection.close().await;
    result
}

async fn serve(
    reader: &mut OwnedReadHalf,
    connection: &Arc<ClientConnection>,
    router: &Router,
) -> FmResult<()> {
    while connection.is_open() {
        let (header, payload) = match read_frame(reader).await? {
            Frame::Request(header, payload) => (header, payload),
            Frame::Oversized(header) => {
                warn!(connection = connection.id(), size = header.payload_len(), "Frame too large");
                reply(connection, &header, ResultCode::InvalidRequest, &[]).await;
                continue;
            }
            Frame::Closed => break,
        };

        let action = match header.action() {
            Ok(action) => action,
            Err(e) => {
                warn!(connection = connection.id(), error = %e, "Rejecting request");
                reply(connection, &header, ResultCode::InvalidRequest, &[]).await;
                continue;
            }
        };

        if action.is_read() {
            let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
            frame.extend_from_slice(&header.encode());
            frame.extend_from_slice(&payload);
            router.enqueue_read(Arc::clone(connection), frame);
            continue;
        }

        let (rc, body) = router.handle_write(action, &payload).await;
        reply(connection, &header, rc, &body).await;
    }
    Ok(())
}

async fn reply(connection: &ClientConnection, request: &MsgHeader, rc: ResultCode, body: &[u8]) {
    let frame = encode_frame(&request.reply(rc, body.len()), body);
    connection.send(&frame).await;
}
