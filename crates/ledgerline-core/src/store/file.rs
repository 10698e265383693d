//! File-based log store implementation (JSON Lines).

use super::{LogStore, StoreResult};
use crate::entry::AuditRecord;
use crate::error::StoreError;
use crate::event::EventLogRecord;
use crate::query::{AuditTrailFilter, EventLogFilter};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Configuration for the file-based log store.
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Path of the audit log file.
    pub audit_path: PathBuf,
    /// Path of the event log file.
    pub event_path: PathBuf,
    /// Create files and parent directories when missing.
    pub create_if_missing: bool,
}

impl FileStoreConfig {
    /// Configure both log files inside the given directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            audit_path: dir.join("audit_records.jsonl"),
            event_path: dir.join("event_log_records.jsonl"),
            create_if_missing: true,
        }
    }
}

struct Writers {
    audit: File,
    event: File,
}

/// Append-only file store keeping each log in its own JSON Lines file.
///
/// Both writers sit behind one mutex so a unit of work appends without
/// interleaving with concurrent units. Lines are serialized before
/// anything is written, so an encoding failure leaves both files intact.
pub struct FileLogStore {
    config: FileStoreConfig,
    writers: Mutex<Writers>,
}

impl FileLogStore {
    /// Open (or create) the store described by the configuration.
    pub fn new(config: FileStoreConfig) -> StoreResult<Self> {
        let audit = open_log(&config.audit_path, config.create_if_missing)?;
        let event = open_log(&config.event_path, config.create_if_missing)?;
        Ok(Self {
            config,
            writers: Mutex::new(Writers { audit, event }),
        })
    }

    /// Open a store with both logs inside the given directory.
    pub fn open_dir(dir: impl AsRef<Path>) -> StoreResult<Self> {
        Self::new(FileStoreConfig::in_dir(dir))
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Writers>> {
        self.writers
            .lock()
            .map_err(|e| StoreError::Write(format!("lock poisoned: {e}")))
    }

    fn read_audits(&self) -> StoreResult<Vec<AuditRecord>> {
        read_log(&self.config.audit_path)
    }

    fn read_events(&self) -> StoreResult<Vec<EventLogRecord>> {
        read_log(&self.config.event_path)
    }

    /// Flush both log files to disk.
    pub fn flush(&self) -> StoreResult<()> {
        let mut writers = self.lock()?;
        writers.audit.flush()?;
        writers.event.flush()?;
        Ok(())
    }
}

fn open_log(path: &Path, create_if_missing: bool) -> StoreResult<File> {
    if create_if_missing {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    let file = OpenOptions::new()
        .create(create_if_missing)
        .append(true)
        .open(path)?;
    Ok(file)
}

/// Read every record in a JSON Lines file, skipping corrupted lines.
fn read_log<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping corrupted log line");
            }
        }
    }
    Ok(records)
}

fn encode_lines<T: Serialize>(records: &[T]) -> StoreResult<Vec<String>> {
    records
        .iter()
        .map(|r| serde_json::to_string(r).map_err(StoreError::from))
        .collect()
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn append_unit(
        &self,
        audits: &[AuditRecord],
        events: &[EventLogRecord],
    ) -> StoreResult<()> {
        // Encode everything up front; only then touch the files.
        let audit_lines = encode_lines(audits)?;
        let event_lines = encode_lines(events)?;

        let mut writers = self.lock()?;
        for line in &audit_lines {
            writeln!(writers.audit, "{line}")?;
        }
        for line in &event_lines {
            writeln!(writers.event, "{line}")?;
        }
        writers.audit.flush()?;
        writers.event.flush()?;
        Ok(())
    }

    async fn audit_by_id(&self, id: &str) -> StoreResult<Option<AuditRecord>> {
        Ok(self.read_audits()?.into_iter().find(|r| r.id == id))
    }

    async fn event_by_id(&self, id: &str) -> StoreResult<Option<EventLogRecord>> {
        Ok(self.read_events()?.into_iter().find(|r| r.id == id))
    }

    async fn query_audits(&self, filter: &AuditTrailFilter) -> StoreResult<Vec<AuditRecord>> {
        Ok(self
            .read_audits()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    async fn query_events(&self, filter: &EventLogFilter) -> StoreResult<Vec<EventLogRecord>> {
        Ok(self
            .read_events()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    async fn audit_count(&self) -> StoreResult<usize> {
        Ok(self.read_audits()?.len())
    }

    async fn event_count(&self) -> StoreResult<usize> {
        Ok(self.read_events()?.len())
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut writers = self.lock()?;
        writers.audit = File::create(&self.config.audit_path)?;
        writers.event = File::create(&self.config.event_path)?;
        Ok(())
    }
}
