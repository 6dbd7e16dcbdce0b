//! Configuration, filesystem layout, and logging for the fault manager.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_CONTROLLER_HOST, DEFAULT_LISTEN_PORT, DEFAULT_LOG_LEVEL};
pub use error::{ConfigError, ConfigResult};
pub use logging::{init_logging, parse_level, LogFileWriter};
pub use paths::Paths;
