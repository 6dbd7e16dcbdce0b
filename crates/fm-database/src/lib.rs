//! SQLite storage for the fault manager.
//!
//! This crate provides:
//! - `FmSession`, an async session with its own dedicated SQLite thread
//! - `Database`, a synchronous handle for tools and tests
//! - Versioned migrations for the alarm, event log and suppression tables
//! - Query helpers in [`queries`]; no other crate builds SQL
//! - `SuppressionChangeFeed`, the table-change listener for `event_suppression`
//!
//! Every worker opens its own `FmSession`. Sessions are never shared.
//!
//! ```ignore
//! let session = FmSession::open(path).await?;
//! let alarms = session.call(|conn| queries::get_alarms_by_id(conn, "100.001")).await?;
//! ```

mod change_feed;
mod db;
mod error;
mod executor;
mod migrations;
mod models;
pub mod queries;

pub use change_feed::SuppressionChangeFeed;
pub use db::Database;
pub use error::{DatabaseError, DatabaseResult};
pub use executor::FmSession;
pub use migrations::{run_migrations, CURRENT_VERSION};
pub use models::*;
