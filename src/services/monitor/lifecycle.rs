//! Start/stop control for the ingestion task
//!
//! The loop owns the Monitor while idle and lends it to a spawned task while
//! running. Stopping signals the task, waits for the fix in progress to
//! finish, and takes the Monitor back.

use super::Monitor;
use crate::io::location_source::LocationSource;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<Monitor>,
}

pub struct IngestionLoop {
    monitor: Option<Monitor>,
    running: Option<Running>,
}

impl IngestionLoop {
    pub fn new(monitor: Monitor) -> Self {
        Self { monitor: Some(monitor), running: None }
    }

    /// Spawn the ingestion task on the current runtime
    ///
    /// Returns false if already running, or if the Monitor was lost to a
    /// failed task.
    pub fn start<S>(&mut self, mut source: S) -> bool
    where
        S: LocationSource + 'static,
    {
        if self.running.is_some() {
            warn!("ingestion_already_running");
            return false;
        }
        let Some(mut monitor) = self.monitor.take() else {
            error!("ingestion_monitor_unavailable");
            return false;
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            monitor.run(&mut source, shutdown_rx).await;
            monitor
        });
        self.running = Some(Running { shutdown, handle });
        true
    }

    /// Signal the task to stop and reclaim the Monitor
    ///
    /// Returns false if the loop was not running.
    pub async fn stop(&mut self) -> bool {
        let Some(running) = self.running.as_ref() else {
            return false;
        };
        let _ = running.shutdown.send(true);
        self.join().await;
        true
    }

    /// Wait for the task to finish on its own (source exhausted)
    ///
    /// Cancel-safe: dropping the future leaves the task running.
    pub async fn join(&mut self) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        let result = (&mut running.handle).await;
        self.running = None;
        match result {
            Ok(monitor) => {
                info!(history_len = %monitor.history().len(), "ingestion_stopped");
                self.monitor = Some(monitor);
            }
            Err(e) => error!(error = %e, "ingestion_task_failed"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// The Monitor, available only while stopped
    pub fn monitor(&self) -> Option<&Monitor> {
        self.monitor.as_ref()
    }

    pub fn monitor_mut(&mut self) -> Option<&mut Monitor> {
        self.monitor.as_mut()
    }

    pub fn into_monitor(self) -> Option<Monitor> {
        self.monitor
    }
}
