//! Durable log store backends.

use crate::entry::AuditRecord;
use crate::error::StoreError;
use crate::event::EventLogRecord;
use crate::query::{AuditTrailFilter, EventLogFilter};
use async_trait::async_trait;

mod file;
mod memory;

pub use file::{FileLogStore, FileStoreConfig};
pub use memory::{MemoryLogStore, MemoryStoreConfig};

/// Logical entity name of the audit log itself; excluded from tracking.
pub const AUDIT_LOG_ENTITY: &str = "AuditRecord";

/// Logical entity name of the event log itself; excluded from tracking.
pub const EVENT_LOG_ENTITY: &str = "EventLogRecord";

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only storage for audit and event log records.
///
/// `append_unit` is the single write entry point: both record kinds for
/// one unit of work land through one call so a backend can make the
/// append atomic. Records are never updated or deleted individually;
/// `clear` exists for tests.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Atomically append all records produced by one unit of work.
    async fn append_unit(
        &self,
        audits: &[AuditRecord],
        events: &[EventLogRecord],
    ) -> StoreResult<()>;

    /// Fetch an audit record by id.
    async fn audit_by_id(&self, id: &str) -> StoreResult<Option<AuditRecord>>;

    /// Fetch an event log record by id.
    async fn event_by_id(&self, id: &str) -> StoreResult<Option<EventLogRecord>>;

    /// All audit records matching the filter, in append order.
    async fn query_audits(&self, filter: &AuditTrailFilter) -> StoreResult<Vec<AuditRecord>>;

    /// All event log records matching the filter, in append order.
    async fn query_events(&self, filter: &EventLogFilter) -> StoreResult<Vec<EventLogRecord>>;

    /// Total number of stored audit records.
    async fn audit_count(&self) -> StoreResult<usize>;

    /// Total number of stored event log records.
    async fn event_count(&self) -> StoreResult<usize>;

    /// Remove every record. Test hook; production logs are append-only.
    async fn clear(&self) -> StoreResult<()>;
}
