//! Trap side of the fault manager.
//!
//! - [`TrapDestinations`]: the configured destination list, swapped wholesale
//! - [`format_trap`]: JSON payload for one notification
//! - [`TrapTransport`]: delivery seam, with [`TcpTrapTransport`] for the relay

mod destination;
mod error;
mod payload;
mod transport;

pub use destination::{parse_destinations, TrapDestination, TrapDestinations};
pub use error::{TrapError, TrapResult};
pub use payload::{format_trap, TrapCategory, HIERARCHICAL_CLEAR_REASON};
pub use transport::{TcpTrapTransport, TrapTarget, TrapTransport};
