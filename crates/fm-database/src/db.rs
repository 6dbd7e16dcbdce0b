//! Synchronous database handle.

use crate::{migrations, queries, DatabaseResult, SuppressionStatus};
use rusqlite::Connection;
use std::path::Path;
use tracing::info;

pub(crate) const SESSION_PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA foreign_keys = ON;
    PRAGMA temp_store = MEMORY;
    PRAGMA busy_timeout = 5000;
";

/// Blocking database handle for command-line tools and tests.
///
/// The server itself uses [`crate::FmSession`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path, running migrations if needed.
    pub fn open(path: &Path) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SESSION_PRAGMAS)?;
        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Change the suppression policy of an alarm id.
    ///
    /// This is the out-of-band edit a running server's suppression
    /// monitor reacts to.
    pub fn set_event_suppression(
        &self,
        alarm_id: &str,
        status: SuppressionStatus,
    ) -> DatabaseResult<()> {
        queries::set_event_suppression(&self.conn, alarm_id, status)?;
        info!(alarm_id, status = status.as_str(), "Event suppression updated");
        Ok(())
    }
}
