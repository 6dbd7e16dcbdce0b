//! Trap delivery.

use crate::{TrapError, TrapResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

/// Where traps are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapTarget {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for TrapTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Delivers one serialized trap. Callers log failures and move on.
#[async_trait]
pub trait TrapTransport: Send + Sync {
    async fn deliver(&self, target: &TrapTarget, payload: &[u8]) -> TrapResult<()>;
}

/// Writes each trap as one newline-terminated line on a fresh TCP
/// connection to the relay.
#[derive(Debug, Clone)]
pub struct TcpTrapTransport {
    connect_timeout: Duration,
}

impl TcpTrapTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpTrapTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl TrapTransport for TcpTrapTransport {
    async fn deliver(&self, target: &TrapTarget, payload: &[u8]) -> TrapResult<()> {
        let connect = TcpStream::connect((target.host.as_str(), target.port));
        let mut stream = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| TrapError::ConnectTimeout(target.to_string()))?
            .map_err(|source| TrapError::Connect {
                target: target.to_string(),
                source,
            })?;

        stream.write_all(payload).await?;
        stream.write_all(b"\n").await?;
        stream.shutdown().await?;
        debug!(target = %target, bytes = payload.len(), "Trap delivered");
        Ok(())
    }
}
