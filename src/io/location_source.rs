//! Location provider boundary
//!
//! A `LocationSource` yields fixes one at a time to the single ingestion
//! consumer. Providers running on several threads share a `FixSender`; the
//! channel serializes them in arrival order.

use crate::domain::types::Fix;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendError, TrySendError};
use tracing::{debug, info, warn};

/// Sequential producer of position fixes
#[async_trait]
pub trait LocationSource: Send {
    /// Next fix, or `None` once the source is exhausted
    async fn next_fix(&mut self) -> Option<Fix>;
}

/// Cloneable handle for pushing fixes into a `ChannelSource`
#[derive(Clone)]
pub struct FixSender {
    tx: mpsc::Sender<Fix>,
}

impl FixSender {
    /// Wait for queue space and enqueue
    pub async fn send(&self, fix: Fix) -> Result<(), SendError<Fix>> {
        self.tx.send(fix).await
    }

    /// Enqueue without waiting; fails if the queue is full or closed
    pub fn try_send(&self, fix: Fix) -> Result<(), TrySendError<Fix>> {
        self.tx.try_send(fix)
    }

    /// For provider callbacks running on plain threads
    ///
    /// Panics if called from within an async context.
    pub fn blocking_send(&self, fix: Fix) -> Result<(), SendError<Fix>> {
        self.tx.blocking_send(fix)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving end of a fix channel
///
/// Exhausted once every `FixSender` has been dropped and the queue drained.
pub struct ChannelSource {
    rx: mpsc::Receiver<Fix>,
}

#[async_trait]
impl LocationSource for ChannelSource {
    async fn next_fix(&mut self) -> Option<Fix> {
        self.rx.recv().await
    }
}

/// Create a bounded fix channel
pub fn create_fix_channel(buffer_size: usize) -> (FixSender, ChannelSource) {
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    (FixSender { tx }, ChannelSource { rx })
}

/// Replays fixes from JSON lines: `{"lat":..,"lon":..,"ts":"RFC3339","accuracy":..}`
///
/// Blank and malformed lines are skipped. A read error ends the source.
pub struct JsonlFixSource<R> {
    lines: Lines<R>,
    line_no: u64,
    skipped: u64,
}

impl JsonlFixSource<BufReader<File>> {
    pub async fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(path.as_ref()).await?;
        info!(path = %path.as_ref().display(), "fix_replay_opened");
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin + Send> JsonlFixSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self { lines: reader.lines(), line_no: 0, skipped: 0 }
    }

    /// Malformed lines skipped so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> LocationSource for JsonlFixSource<R> {
    async fn next_fix(&mut self) -> Option<Fix> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!(lines = %self.line_no, skipped = %self.skipped, "fix_replay_finished");
                    return None;
                }
                Err(e) => {
                    warn!(line = %self.line_no, error = %e, "fix_replay_read_failed");
                    return None;
                }
            };
            self.line_no += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Fix>(line) {
                Ok(fix) => return Some(fix),
                Err(e) => {
                    self.skipped += 1;
                    warn!(line = %self.line_no, error = %e, "fix_replay_malformed_line");
                }
            }
        }
    }
}
