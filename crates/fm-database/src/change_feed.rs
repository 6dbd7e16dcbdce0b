//! Change notifications for the `event_suppression` table.
//!
//! Triggers append a row to `event_suppression_notify` for every insert,
//! update or delete, whichever process made the edit. The feed waits until
//! rows are pending, then removes all of them in one statement, so a burst
//! of edits is observed as a single wake.

use crate::{migrations, queries, DatabaseResult, FmSession};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Listener on its own storage session.
pub struct SuppressionChangeFeed {
    session: FmSession,
    poll_interval: Duration,
}

impl SuppressionChangeFeed {
    pub async fn open(path: &Path, poll_interval: Duration) -> DatabaseResult<Self> {
        Ok(Self {
            session: FmSession::open(path).await?,
            poll_interval,
        })
    }

    /// Register for notifications by making sure the triggers exist.
    pub async fn listen(&self) -> DatabaseResult<()> {
        self.session
            .call(migrations::create_suppression_triggers)
            .await?;
        debug!(path = %self.session.path(), "Listening for event_suppression changes");
        Ok(())
    }

    /// Block until at least one change is pending, drain every pending
    /// change and return how many were coalesced.
    pub async fn wait_for_changes(&self) -> DatabaseResult<usize> {
        loop {
            let drained = self
                .session
                .call(queries::drain_suppression_changes)
                .await?;
            if drained > 0 {
                return Ok(drained);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
