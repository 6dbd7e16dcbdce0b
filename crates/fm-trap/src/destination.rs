//! Trap destination list.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// One subscriber: an address and its community string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrapDestination {
    pub ip: String,
    pub community: String,
}

/// Parse `"ip community,ip community"`.
///
/// Each entry is split on its first space; blank entries are skipped and an
/// entry without a space gets an empty community.
pub fn parse_destinations(config: &str) -> Vec<TrapDestination> {
    config
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(' ') {
            Some((ip, community)) => TrapDestination {
                ip: ip.to_string(),
                community: community.trim().to_string(),
            },
            None => TrapDestination {
                ip: entry.to_string(),
                community: String::new(),
            },
        })
        .collect()
}

/// Current destination list, replaced as a whole on reconfiguration.
///
/// Readers get an `Arc` snapshot and never observe a half-built list.
#[derive(Debug, Default)]
pub struct TrapDestinations {
    current: RwLock<Arc<Vec<TrapDestination>>>,
}

impl TrapDestinations {
    pub fn from_config(config: &str) -> Self {
        Self {
            current: RwLock::new(Arc::new(parse_destinations(config))),
        }
    }

    /// Replace the list from a configuration string.
    pub fn reconfigure(&self, config: &str) {
        let parsed = Arc::new(parse_destinations(config));
        *self.current.write() = parsed;
    }

    pub fn snapshot(&self) -> Arc<Vec<TrapDestination>> {
        Arc::clone(&self.current.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_destinations() {
        let parsed = parse_destinations("10.0.0.1 public, 10.0.0.2 private community,,10.0.0.3");
        assert_eq!(
            parsed,
            vec![
                TrapDestination {
                    ip: "10.0.0.1".to_string(),
                    community: "public".to_string(),
                },
                TrapDestination {
                    ip: "10.0.0.2".to_string(),
                    community: "private community".to_string(),
                },
                TrapDestination {
                    ip: "10.0.0.3".to_string(),
                    community: String::new(),
                },
            ]
        );
        assert!(parse_destinations("  ").is_empty());
    }

    #[test]
    fn test_reconfigure_replaces_wholesale() {
        let destinations = TrapDestinations::from_config("10.0.0.1 public,10.0.0.2 public");
        let before = destinations.snapshot();

        destinations.reconfigure("192.168.1.9 ops");
        let after = destinations.snapshot();

        assert_eq!(before.len(), 2);
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].ip, "192.168.1.9");
    }
}
