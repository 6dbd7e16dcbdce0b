//! Alarm broker core.
//!
//! This crate provides:
//! - A TCP listener speaking the fixed-header fault protocol
//! - A write queue drained by one worker that applies the alarm lifecycle
//!   and records history before any trap is sent
//! - A read queue drained by one worker that answers lookups
//! - A suppression monitor that announces suppression table edits
//! - `FmClient`, a client for the same protocol
//!
//! Each worker owns its own storage session. Requests on the write queue
//! are processed strictly in order; reads and writes are not ordered with
//! respect to each other, so a lookup sent alongside a change may see
//! either state.

mod bootstrap;
mod client;
mod connection;
mod dispatcher;
mod error;
mod job;
mod lifecycle;
mod listener;
mod queue;
mod read_worker;
mod server;
mod suppression_monitor;
mod write_worker;

#[cfg(test)]
mod test_support;

pub use bootstrap::{bind_listener, BindSettings};
pub use client::{FmClient, MAX_RESPONSE_SIZE};
pub use connection::{ClientConnection, ConnectionRegistry};
pub use dispatcher::{category_for, record_notification, DispatcherSettings, NotificationDispatcher};
pub use error::{FmError, FmResult};
pub use job::{Apply, GetRequest, JobKind, JobOutcome, JobRequest, WriteJob};
pub use lifecycle::{apply as apply_lifecycle, Applied};
pub use listener::{Listener, Router};
pub use queue::WorkQueue;
pub use read_worker::{Lookup, ReadWorker};
pub use server::{FmServer, ServerSettings};
pub use suppression_monitor::{ChangeFeed, SuppressionMonitor};
pub use write_worker::WriteWorker;

pub use fm_protocol::{AlarmFilter, AlarmRecord, AlarmState, ResultCode, Severity};
