//! Configuration management for the fault manager.

use crate::{ConfigError, ConfigResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Logical host name the listener resolves at startup.
pub const DEFAULT_CONTROLLER_HOST: &str = "controller";

/// Port the manager listens on.
pub const DEFAULT_LISTEN_PORT: u16 = 8001;

/// Fault manager configuration.
///
/// Values come from `<base>/fm.json`, then `FM_*` environment variables.
/// Missing keys in the file fall back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Host name resolved by the bind loop.
    pub controller_host: String,
    /// Listening port.
    pub listen_port: u16,
    /// Resolve+bind attempts before startup fails.
    pub bind_retries: u32,
    /// Fixed delay between bind attempts, in milliseconds.
    pub bind_backoff_ms: u64,
    /// SQLite database path. `None` uses the path under the base directory.
    pub database_path: Option<PathBuf>,
    /// Traps are only delivered when enabled.
    pub snmp_enabled: bool,
    /// Trap relay address.
    pub trap_server_ip: String,
    /// Trap relay port.
    pub trap_server_port: u16,
    /// Comma separated `"ip community"` entries.
    pub trap_destinations: String,
    /// Prefix applied to entity instance ids in traps and entity reads.
    pub system_name: String,
    /// Outer prefix applied to entity instance ids in traps.
    pub region_name: String,
    /// Upper bound of an idle write worker wait, in milliseconds.
    pub write_poll_ms: u64,
    /// Upper bound of an idle read worker wait, in milliseconds.
    pub read_poll_ms: u64,
    /// Sleep after each suppression change reaction, in seconds.
    pub suppression_cooldown_secs: u64,
    /// How often the suppression change feed checks for pending rows.
    pub suppression_poll_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            controller_host: DEFAULT_CONTROLLER_HOST.to_string(),
            listen_port: DEFAULT_LISTEN_PORT,
            bind_retries: 5,
            bind_backoff_ms: 2_000,
            database_path: None,
            snmp_enabled: false,
            trap_server_ip: "127.0.0.1".to_string(),
            trap_server_port: 162,
            trap_destinations: String::new(),
            system_name: String::new(),
            region_name: String::new(),
            write_poll_ms: 200,
            read_poll_ms: 100,
            suppression_cooldown_secs: 30,
            suppression_poll_ms: 1_000,
        }
    }
}

impl Config {
    /// Load configuration from the base directory, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> ConfigResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the base directory.
    pub fn save(&self, paths: &Paths) -> ConfigResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Apply `FM_*` overrides using the given lookup.
    ///
    /// Unparseable numeric values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FM_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = lookup("FM_CONTROLLER_HOST") {
            self.controller_host = v;
        }
        if let Some(port) = lookup("FM_LISTEN_PORT").and_then(|v| v.parse().ok()) {
            self.listen_port = port;
        }
        if let Some(v) = lookup("FM_DATABASE") {
            self.database_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("FM_SNMP_ENABLED") {
            self.snmp_enabled = matches!(v.trim(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup("FM_TRAP_SERVER_IP") {
            self.trap_server_ip = v;
        }
        if let Some(port) = lookup("FM_TRAP_SERVER_PORT").and_then(|v| v.parse().ok()) {
            self.trap_server_port = port;
        }
        if let Some(v) = lookup("FM_TRAP_DESTINATIONS") {
            self.trap_destinations = v;
        }
        if let Some(v) = lookup("FM_SYSTEM_NAME") {
            self.system_name = v;
        }
        if let Some(v) = lookup("FM_REGION_NAME") {
            self.region_name = v;
        }
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.controller_host.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "controller_host must not be empty".to_string(),
            ));
        }
        if self.bind_retries == 0 {
            return Err(ConfigError::Invalid(
                "bind_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Database path, resolved against the base directory when unset.
    pub fn database_path(&self, paths: &Paths) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| paths.database_file())
    }

    pub fn bind_backoff(&self) -> Duration {
        Duration::from_millis(self.bind_backoff_ms)
    }

    pub fn write_poll_interval(&self) -> Duration {
        Duration::from_millis(self.write_poll_ms)
    }

    pub fn read_poll_interval(&self) -> Duration {
        Duration::from_millis(self.read_poll_ms)
    }

    pub fn suppression_cooldown(&self) -> Duration {
        Duration::from_secs(self.suppression_cooldown_secs)
    }

    pub fn suppression_poll_interval(&self) -> Duration {
        Duration::from_millis(self.suppression_poll_ms)
    }
}
