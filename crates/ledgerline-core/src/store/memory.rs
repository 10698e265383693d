//! In-memory log store implementation.

use super::{LogStore, StoreResult};
use crate::entry::AuditRecord;
use crate::error::StoreError;
use crate::event::EventLogRecord;
use crate::query::{AuditTrailFilter, EventLogFilter};
use async_trait::async_trait;
use std::sync::Mutex;

/// Configuration for the in-memory log store.
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Maximum number of records kept per log.
    pub max_records: usize,
    /// Evict the oldest records when full instead of failing the append.
    pub evict_oldest: bool,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_records: 10_000,
            evict_oldest: true,
        }
    }
}

#[derive(Debug, Default)]
struct Logs {
    audits: Vec<AuditRecord>,
    events: Vec<EventLogRecord>,
}

/// In-memory log store (development/testing).
///
/// Both logs live behind one mutex, so `append_unit` is atomic: either
/// everything from the unit of work is visible or nothing is.
pub struct MemoryLogStore {
    logs: Mutex<Logs>,
    config: MemoryStoreConfig,
}

impl MemoryLogStore {
    /// Create a store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    /// Create a store with a custom configuration.
    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            logs: Mutex::new(Logs::default()),
            config,
        }
    }

    /// Create a bounded store that evicts its oldest records when full.
    pub fn bounded(max_records: usize) -> Self {
        Self::with_config(MemoryStoreConfig {
            max_records,
            evict_oldest: true,
        })
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Logs>> {
        self.logs
            .lock()
            .map_err(|e| StoreError::Write(format!("lock poisoned: {e}")))
    }
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

fn make_room<T>(log: &mut Vec<T>, incoming: usize, config: &MemoryStoreConfig) -> StoreResult<()> {
    // A unit that alone exceeds the bound can never fit, eviction or not.
    if incoming > config.max_records {
        return Err(StoreError::StorageFull);
    }
    let projected = log.len() + incoming;
    if projected <= config.max_records {
        return Ok(());
    }
    if !config.evict_oldest {
        return Err(StoreError::StorageFull);
    }
    log.drain(..projected - config.max_records);
    Ok(())
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append_unit(
        &self,
        audits: &[AuditRecord],
        events: &[EventLogRecord],
    ) -> StoreResult<()> {
        let mut logs = self.lock()?;
        // Reject before touching either log so a full store stays consistent.
        make_room(&mut logs.audits, audits.len(), &self.config)?;
        make_room(&mut logs.events, events.len(), &self.config)?;
        logs.audits.extend_from_slice(audits);
        logs.events.extend_from_slice(events);
        Ok(())
    }

    async fn audit_by_id(&self, id: &str) -> StoreResult<Option<AuditRecord>> {
        let logs = self.lock()?;
        Ok(logs.audits.iter().find(|r| r.id == id).cloned())
    }

    async fn event_by_id(&self, id: &str) -> StoreResult<Option<EventLogRecord>> {
        let logs = self.lock()?;
        Ok(logs.events.iter().find(|r| r.id == id).cloned())
    }

    async fn query_audits(&self, filter: &AuditTrailFilter) -> StoreResult<Vec<AuditRecord>> {
        let logs = self.lock()?;
        Ok(logs
            .audits
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn query_events(&self, filter: &EventLogFilter) -> StoreResult<Vec<EventLogRecord>> {
        let logs = self.lock()?;
        Ok(logs
            .events
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn audit_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.audits.len())
    }

    async fn event_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.events.len())
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut logs = self.lock()?;
        logs.audits.clear();
        logs.events.clear();
        Ok(())
    }
}
