//! Live client connections.
//!
//! Responses can come from the connection task (writes) or the read
//! worker (lookups), so the write half sits behind an async mutex. The
//! first failed write closes the connection and drops it from the
//! registry.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tracing::{debug, warn};

/// Connections currently able to receive responses.
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, SocketAddr>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, peer: SocketAddr) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.live.lock().insert(id, peer);
        id
    }

    /// Forget a connection. Returns false if it was already gone.
    pub fn remove(&self, id: u64) -> bool {
        self.live.lock().remove(&id).is_some()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.live.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }
}

/// Response side of one client connection.
pub struct ClientConnection {
    id: u64,
    peer: SocketAddr,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    registry: Arc<ConnectionRegistry>,
}

impl ClientConnection {
    pub fn register(
        writer: OwnedWriteHalf,
        peer: SocketAddr,
        registry: Arc<ConnectionRegistry>,
    ) -> Arc<Self> {
        let id = registry.register(peer);
        debug!(connection = id, peer = %peer, "Client connected");
        Arc::new(Self {
            id,
            peer,
            writer: tokio::sync::Mutex::new(Some(writer)),
            registry,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        self.registry.contains(self.id)
    }

    /// Write one complete response frame.
    ///
    /// Returns false if the connection is closed, including when this
    /// write is what closed it.
    pub async fn send(&self, frame: &[u8]) -> bool {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return false;
        };

        let written = match writer.write_all(frame).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => true,
            Err(e) => {
                warn!(connection = self.id, peer = %self.peer, error = %e, "Response write failed, closing connection");
                guard.take();
                self.registry.remove(self.id);
                false
            }
        }
    }

    /// Close the write half and drop the connection from the registry.
    pub async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        if self.registry.remove(self.id) {
            debug!(connection = self.id, peer = %self.peer, "Client disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};

    async fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn test_send_and_close() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (server, mut client) = pair().await;
        let peer = server.peer_addr().unwrap();
        let (_reader, writer) = server.into_split();

        let conn = ClientConnection::register(writer, peer, Arc::clone(&registry));
        assert!(conn.is_open());
        assert_eq!(registry.len(), 1);

        assert!(conn.send(b"frame").await);
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"frame");

        conn.close().await;
        assert!(!conn.is_open());
        assert!(registry.is_empty());
        assert!(!conn.send(b"late").await);
    }

    #[tokio::test]
    async fn test_ids_are_distinct() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (a, _ca) = pair().await;
        let (b, _cb) = pair().await;
        let peer_a = a.peer_addr().unwrap();
        let peer_b = b.peer_addr().unwrap();

        let first = ClientConnection::register(a.into_split().1, peer_a, Arc::clone(&registry));
        let second = ClientConnection::register(b.into_split().1, peer_b, Arc::clone(&registry));
        assert_ne!(first.id(), second.id());
        assert_eq!(registry.len(), 2);
        assert!(registry.remove(first.id()));
        assert!(!registry.remove(first.id()));
    }
}
