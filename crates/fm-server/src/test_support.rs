//! Shared fixtures for unit tests.

use crate::dispatcher::DispatcherSettings;
use async_trait::async_trait;
use fm_trap::{TrapResult, TrapTarget, TrapTransport};
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;

/// Transport that keeps every trap it is given.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    delivered: Mutex<Vec<Value>>,
}

impl RecordingTransport {
    pub(crate) fn traps(&self) -> Vec<Value> {
        self.delivered.lock().clone()
    }

    pub(crate) async fn wait_for(&self, count: usize) -> Vec<Value> {
        for _ in 0..200 {
            if self.delivered.lock().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.traps()
    }
}

#[async_trait]
impl TrapTransport for RecordingTransport {
    async fn deliver(&self, _target: &TrapTarget, payload: &[u8]) -> TrapResult<()> {
        self.delivered.lock().push(serde_json::from_slice(payload)?);
        Ok(())
    }
}

pub(crate) fn dispatcher_settings(snmp_enabled: bool) -> DispatcherSettings {
    DispatcherSettings {
        snmp_enabled,
        trap_target: TrapTarget {
            host: "127.0.0.1".to_string(),
            port: 162,
        },
        system_name: "lab".to_string(),
        region_name: "region-one".to_string(),
    }
}
