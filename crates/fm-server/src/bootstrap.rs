//! Startup bind loop.

use crate::{FmError, FmResult};
use std::time::Duration;
use tokio::net::{lookup_host, TcpListener};
use tracing::{info, warn};

/// Where and how persistently to bind.
#[derive(Debug, Clone)]
pub struct BindSettings {
    pub host: String,
    pub port: u16,
    pub retries: u32,
    pub backoff: Duration,
}

/// Resolve the host and bind the first address that accepts, retrying the
/// whole cycle with a fixed backoff.
pub async fn bind_listener(settings: &BindSettings) -> FmResult<TcpListener> {
    let attempts = settings.retries.max(1);

    for attempt in 1..=attempts {
        match lookup_host((settings.host.as_str(), settings.port)).await {
            Ok(addrs) => {
                for addr in addrs {
                    match TcpListener::bind(addr).await {
                        Ok(listener) => {
                            info!(addr = %addr, attempt, "Listening for fault manager clients");
                            return Ok(listener);
                        }
                        Err(e) => warn!(addr = %addr, attempt, error = %e, "Bind failed"),
                    }
                }
            }
            Err(e) => warn!(host = %settings.host, attempt, error = %e, "Could not resolve host"),
        }

        if attempt < attempts {
            tokio::time::sleep(settings.backoff).await;
        }
    }

    Err(FmError::Bootstrap {
        host: settings.host.clone(),
        port: settings.port,
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(port: u16) -> BindSettings {
        BindSettings {
            host: "127.0.0.1".to_string(),
            port,
            retries: 3,
            backoff: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_binds_resolved_address() {
        let listener = bind_listener(&settings(0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = bind_listener(&settings(port)).await.unwrap_err();
        match err {
            FmError::Bootstrap { port: p, attempts, .. } => {
                assert_eq!(p, port);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
