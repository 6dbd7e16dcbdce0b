//! Server assembly.

use crate::bootstrap::{self, BindSettings};
use crate::connection::ConnectionRegistry;
use crate::dispatcher::{DispatcherSettings, NotificationDispatcher};
use crate::listener::{Listener, Router};
use crate::queue::WorkQueue;
use crate::read_worker::ReadWorker;
use crate::suppression_monitor::{ChangeFeed, SuppressionMonitor};
use crate::write_worker::WriteWorker;
use crate::FmResult;
use fm_config_and_utils::{Config, Paths};
use fm_database::{FmSession, SuppressionChangeFeed};
use fm_trap::{TrapDestinations, TrapTarget, TrapTransport};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind: BindSettings,
    pub database_path: PathBuf,
    pub dispatcher: DispatcherSettings,
    pub trap_destinations: String,
    pub write_poll_interval: Duration,
    pub read_poll_interval: Duration,
    pub suppression_cooldown: Duration,
    pub suppression_poll_interval: Duration,
}

impl ServerSettings {
    pub fn from_config(config: &Config, paths: &Paths) -> Self {
        Self {
            bind: BindSettings {
                host: config.controller_host.clone(),
                port: config.listen_port,
                retries: config.bind_retries,
                backoff: config.bind_backoff(),
            },
            database_path: config.database_path(paths),
            dispatcher: DispatcherSettings {
                snmp_enabled: config.snmp_enabled,
                trap_target: TrapTarget {
                    host: config.trap_server_ip.clone(),
                    port: config.trap_server_port,
                },
                system_name: config.system_name.clone(),
                region_name: config.region_name.clone(),
            },
            trap_destinations: config.trap_destinations.clone(),
            write_poll_interval: config.write_poll_interval(),
            read_poll_interval: config.read_poll_interval(),
            suppression_cooldown: config.suppression_cooldown(),
            suppression_poll_interval: config.suppression_poll_interval(),
        }
    }
}

/// A running fault manager.
///
/// Owns its queues and workers, so several can run in one process.
pub struct FmServer {
    local_addr: SocketAddr,
    destinations: Arc<TrapDestinations>,
    registry: Arc<ConnectionRegistry>,
    shutdown_tx: broadcast::Sender<()>,
    listener_task: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl FmServer {
    /// Open storage, bind, and start the workers and the listener.
    ///
    /// Fails without starting anything if a session cannot be opened or
    /// the bind retries run out.
    pub async fn start(
        settings: ServerSettings,
        transport: Arc<dyn TrapTransport>,
    ) -> FmResult<Self> {
        let path = settings.database_path.as_path();

        // The first session applies migrations.
        let write_session = FmSession::open(path).await?;
        let read_session = FmSession::open(path).await?;
        let feed = SuppressionChangeFeed::open(path, settings.suppression_poll_interval).await?;
        ChangeFeed::listen(&feed).await?;

        let listener = bootstrap::bind_listener(&settings.bind).await?;
        let local_addr = listener.local_addr()?;

        let destinations = Arc::new(TrapDestinations::from_config(&settings.trap_destinations));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            settings.dispatcher.clone(),
            Arc::clone(&destinations),
            transport,
        ));
        let write_queue = Arc::new(WorkQueue::new("write"));
        let read_queue = Arc::new(WorkQueue::new("read"));
        let registry = Arc::new(ConnectionRegistry::new());

        let workers = vec![
            WriteWorker::new(
                write_session,
                Arc::clone(&write_queue),
                Arc::clone(&dispatcher),
                settings.write_poll_interval,
            )
            .spawn(),
            ReadWorker::new(
                read_session,
                Arc::clone(&read_queue),
                settings.dispatcher.system_name.clone(),
                settings.read_poll_interval,
            )
            .spawn(),
            SuppressionMonitor::new(feed, dispatcher, settings.suppression_cooldown).spawn(),
        ];

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let listener = Listener::new(
            listener,
            Router::new(write_queue, read_queue),
            Arc::clone(&registry),
        );
        let listener_task = tokio::spawn(listener.run(shutdown_rx));

        info!(
            addr = %local_addr,
            database = %settings.database_path.display(),
            snmp_enabled = settings.dispatcher.snmp_enabled,
            "Fault manager started"
        );

        Ok(Self {
            local_addr,
            destinations,
            registry,
            shutdown_tx,
            listener_task,
            workers,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Replace the trap destination list.
    pub fn reconfigure_trap_destinations(&self, config: &str) {
        self.destinations.reconfigure(config);
        info!(destinations = self.destinations.snapshot().len(), "Trap destinations updated");
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Stop accepting connections and stop the workers.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.listener_task.await;
        for worker in self.workers {
            worker.abort();
        }
        info!(addr = %self.local_addr, "Fault manager stopped");
    }
}
