//! Async SQLite session on a dedicated background thread.
//!
//! One `FmSession` is one storage session. Each worker opens its own and
//! keeps it for its lifetime, so transactions from different workers never
//! interleave on a connection.
//!
//! Only SQL runs inside `call()`. Trap delivery, socket writes and
//! anything else that can block belong outside it.

use crate::db::SESSION_PRAGMAS;
use crate::{migrations, DatabaseError, DatabaseResult};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::info;

fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> DatabaseError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => DatabaseError::Sqlite(e),
        tokio_rusqlite::Error::Close(_) => DatabaseError::Connection("Connection closed".to_string()),
        other => DatabaseError::Connection(other.to_string()),
    }
}

fn prepare(conn: &rusqlite::Connection) -> DatabaseResult<()> {
    conn.execute_batch(SESSION_PRAGMAS)?;
    migrations::run_migrations(conn)
}

/// Async storage session with its own executor thread.
pub struct FmSession {
    conn: Connection,
    path: String,
}

impl FmSession {
    /// Open a session, applying pragmas and pending migrations.
    ///
    /// Sessions against the same file should be opened one after another
    /// so only the first one applies migrations.
    pub async fn open(path: &Path) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();
        let conn = Connection::open(path_str.clone())
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        conn.call(|conn| Ok(prepare(conn)))
            .await
            .map_err(from_tokio_rusqlite)??;

        info!(path = %path_str, "Storage session opened");

        Ok(Self {
            conn,
            path: path_str,
        })
    }

    /// Run a closure on the session's thread and await its result.
    pub async fn call<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> DatabaseResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let outer_result = self.conn.call(move |conn| Ok(f(conn))).await;

        match outer_result {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    /// Get the database file path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Close the session, waiting for queued calls to finish.
    pub async fn close(self) -> DatabaseResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to close session: {:?}", e)))?;
        info!(path = %self.path, "Storage session closed");
        Ok(())
    }
}
