//! Alert log - appends every alert to a JSONL file
//!
//! Runs as a worker behind an `AlertSender`, so file I/O never happens on
//! the ingestion path.

use crate::io::alert_channel::AlertMessage;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

pub struct AlertLogWriter {
    file_path: String,
    rx: mpsc::Receiver<AlertMessage>,
}

impl AlertLogWriter {
    pub fn new(file_path: &str, rx: mpsc::Receiver<AlertMessage>) -> Self {
        info!(file_path = %file_path, "alert_log_initialized");
        Self { file_path: file_path.to_string(), rx }
    }

    /// Write alerts until shutdown or until every sender is gone
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        while let Ok(msg) = self.rx.try_recv() {
                            self.write_alert(&msg);
                        }
                        info!("alert_log_shutdown");
                        return;
                    }
                }
                msg = self.rx.recv() => {
                    match msg {
                        Some(msg) => { self.write_alert(&msg); }
                        None => {
                            info!("alert_log_channel_closed");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Returns true if the alert was written
    pub fn write_alert(&self, msg: &AlertMessage) -> bool {
        let json = match msg.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(alert = %msg.as_str(), error = %e, "alert_log_serialize_failed");
                return false;
            }
        };

        match self.append_line(&json) {
            Ok(()) => true,
            Err(e) => {
                error!(alert = %msg.as_str(), file = %self.file_path, error = %e, "alert_log_write_failed");
                false
            }
        }
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path, bytes = %line.len(), "alert_log_written");

        Ok(())
    }
}
