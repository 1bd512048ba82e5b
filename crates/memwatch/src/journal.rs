//! Durable append-only logs and artifact files
//!
//! Producers never wait on disk I/O: entries are queued on a bounded channel
//! and a [`JournalWorker`] task writes them. A full queue or a stopped writer
//! surfaces as [`EngineError::Persistence`] to the producer, which logs it
//! and carries on.

use crate::error::{EngineError, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Directory under the storage root holding the line logs
const LOG_DIR: &str = "logs";

/// The four durable logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Alerts,
    Notifications,
    Implementations,
    LeakDetection,
}

impl LogKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            LogKind::Alerts => "alerts.log",
            LogKind::Notifications => "notifications.log",
            LogKind::Implementations => "implementations.log",
            LogKind::LeakDetection => "leak-detection.log",
        }
    }
}

/// One line of a durable log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecord {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub data: serde_json::Value,
}

#[derive(Debug)]
enum JournalEntry {
    Line { kind: LogKind, line: String },
    Artifact { path: PathBuf, contents: Vec<u8> },
    Flush(oneshot::Sender<()>),
}

/// Producer handle; cheap to clone
#[derive(Debug, Clone)]
pub struct Journal {
    root: PathBuf,
    tx: Option<mpsc::Sender<JournalEntry>>,
}

impl Journal {
    /// Create a journal rooted at `root` and the worker that drains it
    pub fn new(root: impl Into<PathBuf>, capacity: usize) -> (Self, JournalWorker) {
        let root = root.into();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                root: root.clone(),
                tx: Some(tx),
            },
            JournalWorker { root, rx },
        )
    }

    /// A journal that accepts and discards everything
    pub fn disabled() -> Self {
        Self {
            root: PathBuf::from("."),
            tx: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue a self-describing line for one of the logs
    pub fn append<T: Serialize>(
        &self,
        kind: LogKind,
        event: &str,
        timestamp: DateTime<Utc>,
        data: &T,
    ) -> Result<()> {
        let record = JournalRecord {
            timestamp,
            event: event.to_string(),
            data: serde_json::to_value(data)?,
        };
        let line = serde_json::to_string(&record)?;
        self.enqueue(JournalEntry::Line { kind, line })
    }

    /// Queue a file write under the storage root; returns the target path
    pub fn write_artifact(&self, relative: impl AsRef<Path>, contents: Vec<u8>) -> Result<PathBuf> {
        let path = self.root.join(relative.as_ref());
        self.enqueue(JournalEntry::Artifact {
            path: path.clone(),
            contents,
        })?;
        Ok(path)
    }

    /// Wait until every entry queued before this call is on disk
    pub async fn flush(&self) -> Result<()> {
        let Some(ref tx) = self.tx else {
            return Ok(());
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(JournalEntry::Flush(ack_tx))
            .await
            .map_err(|_| EngineError::Persistence("journal writer stopped".to_string()))?;
        ack_rx
            .await
            .map_err(|_| EngineError::Persistence("journal writer stopped".to_string()))
    }

    fn enqueue(&self, entry: JournalEntry) -> Result<()> {
        let Some(ref tx) = self.tx else {
            return Ok(());
        };

        tx.try_send(entry).map_err(|e| match e {
            TrySendError::Full(_) => EngineError::Persistence("journal queue full".to_string()),
            TrySendError::Closed(_) => {
                EngineError::Persistence("journal writer stopped".to_string())
            }
        })
    }
}

/// Background writer for a [`Journal`]
pub struct JournalWorker {
    root: PathBuf,
    rx: mpsc::Receiver<JournalEntry>,
}

impl JournalWorker {
    /// Write entries until every producer handle is dropped
    pub async fn run(mut self) {
        while let Some(entry) = self.rx.recv().await {
            self.process(entry).await;
        }
        debug!("Journal writer stopped");
    }

    /// Write whatever is queued right now and return the count processed
    pub async fn flush_pending(&mut self) -> usize {
        let mut written = 0;
        while let Ok(entry) = self.rx.try_recv() {
            if self.process(entry).await {
                written += 1;
            }
        }
        written
    }

    /// Returns whether the entry was a write
    async fn process(&self, entry: JournalEntry) -> bool {
        if let JournalEntry::Flush(ack) = entry {
            let _ = ack.send(());
            return false;
        }
        if let Err(e) = self.write(entry).await {
            warn!(error = %e, root = %self.root.display(), "Journal write failed");
        }
        true
    }

    async fn write(&self, entry: JournalEntry) -> anyhow::Result<()> {
        match entry {
            JournalEntry::Line { kind, line } => {
                let dir = self.root.join(LOG_DIR);
                tokio::fs::create_dir_all(&dir)
                    .await
                    .with_context(|| format!("Failed to create directory {:?}", dir))?;

                let path = dir.join(kind.file_name());
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await
                    .with_context(|| format!("Failed to open {:?}", path))?;
                file.write_all(line.as_bytes()).await?;
                file.write_all(b"\n").await?;
                file.flush().await?;
            }
            JournalEntry::Artifact { path, contents } => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("Failed to create directory {:?}", parent))?;
                }

                let temp_path = path.with_extension("tmp");
                tokio::fs::write(&temp_path, &contents)
                    .await
                    .with_context(|| format!("Failed to write {:?}", temp_path))?;
                tokio::fs::rename(&temp_path, &path)
                    .await
                    .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;
            }
            JournalEntry::Flush(ack) => {
                let _ = ack.send(());
            }
        }
        Ok(())
    }
}
