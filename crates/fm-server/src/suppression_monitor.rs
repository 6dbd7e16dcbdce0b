//! Reacts to out-of-band edits of the suppression table.

use crate::dispatcher::NotificationDispatcher;
use crate::FmResult;
use async_trait::async_trait;
use fm_database::SuppressionChangeFeed;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Source of suppression change notifications.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Register interest in changes.
    async fn listen(&self) -> FmResult<()>;

    /// Wait for changes, then consume all that are pending. Returns how
    /// many were consumed.
    async fn wait_for_changes(&self) -> FmResult<usize>;
}

#[async_trait]
impl ChangeFeed for SuppressionChangeFeed {
    async fn listen(&self) -> FmResult<()> {
        Ok(SuppressionChangeFeed::listen(self).await?)
    }

    async fn wait_for_changes(&self) -> FmResult<usize> {
        Ok(SuppressionChangeFeed::wait_for_changes(self).await?)
    }
}

pub struct SuppressionMonitor<F> {
    feed: F,
    dispatcher: Arc<NotificationDispatcher>,
    cooldown: Duration,
}

impl<F: ChangeFeed + 'static> SuppressionMonitor<F> {
    pub fn new(feed: F, dispatcher: Arc<NotificationDispatcher>, cooldown: Duration) -> Self {
        Self {
            feed,
            dispatcher,
            cooldown,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(cooldown_secs = self.cooldown.as_secs(), "Suppression monitor started");
            loop {
                self.cycle().await;
            }
        })
    }

    /// One wake: wait, send a single warm start, cool down.
    async fn cycle(&self) {
        match self.feed.wait_for_changes().await {
            Ok(changes) => {
                debug!(changes, "Suppression changes drained");
                self.dispatcher.send_warm_start().await;
            }
            Err(e) => error!(error = %e, "Suppression change feed failed"),
        }
        tokio::time::sleep(self.cooldown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dispatcher_settings, RecordingTransport};
    use fm_database::{Database, SuppressionStatus};
    use fm_trap::TrapDestinations;
    use tempfile::tempdir;
    use tokio::sync::{mpsc, Mutex};

    /// Feed driven by a channel; one wake consumes everything queued.
    struct ChannelFeed {
        rx: Mutex<mpsc::UnboundedReceiver<()>>,
    }

    #[async_trait]
    impl ChangeFeed for ChannelFeed {
        async fn listen(&self) -> FmResult<()> {
            Ok(())
        }

        async fn wait_for_changes(&self) -> FmResult<usize> {
            let mut rx = self.rx.lock().await;
            let mut changes = usize::from(rx.recv().await.is_some());
            while rx.try_recv().is_ok() {
                changes += 1;
            }
            Ok(changes)
        }
    }

    fn dispatcher(transport: Arc<RecordingTransport>) -> Arc<NotificationDispatcher> {
        Arc::new(NotificationDispatcher::new(
            dispatcher_settings(true),
            Arc::new(TrapDestinations::default()),
            transport,
        ))
    }

    #[tokio::test]
    async fn test_burst_produces_one_warm_start() {
        let (tx, rx) = mpsc::unbounded_channel();
        for _ in 0..5 {
            tx.send(()).unwrap();
        }

        let transport = Arc::new(RecordingTransport::default());
        let monitor = SuppressionMonitor::new(
            ChannelFeed { rx: Mutex::new(rx) },
            dispatcher(transport.clone()),
            Duration::from_millis(10),
        );
        monitor.cycle().await;

        let traps = transport.traps();
        assert_eq!(traps.len(), 1);
        assert_eq!(traps[0]["operation_type"], "warmStart");
    }

    #[tokio::test]
    async fn test_table_edit_wakes_monitor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fm.db");
        let feed = SuppressionChangeFeed::open(&path, Duration::from_millis(10))
            .await
            .unwrap();
        ChangeFeed::listen(&feed).await.unwrap();

        let transport = Arc::new(RecordingTransport::default());
        let handle =
            SuppressionMonitor::new(feed, dispatcher(transport.clone()), Duration::from_millis(10))
                .spawn();

        let db = Database::open(&path).unwrap();
        db.set_event_suppression("100.001", SuppressionStatus::Suppressed)
            .unwrap();

        let traps = transport.wait_for(1).await;
        assert_eq!(traps.len(), 1);
        assert_eq!(traps[0]["operation_type"], "warmStart");
        handle.abort();
    }
}
