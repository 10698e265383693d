//! Audit trail and domain event logging for write-heavy services.
//!
//! Ledgerline captures what changed, who changed it, and what it meant:
//! every unit of work yields immutable [`AuditRecord`]s describing entity
//! changes and [`EventLogRecord`]s describing the domain and application
//! events raised along the way.
//!
//! # Capture and persistence
//!
//! A [`ChangeTracker`] turns a [`PendingChanges`] view into drafted
//! [`AuditEntry`]s; an [`EventCollector`] gathers raised events. The
//! [`AuditPipeline`] stages both before the business write, lets the
//! caller patch store-generated keys onto the staged unit afterwards,
//! and commits everything through a [`LogStore`] in one unit of work.
//!
//! ```no_run
//! use ledgerline_core::{
//!     AuditPipeline, EventCollector, MemoryLogStore, PendingChanges, RaisedEvent,
//!     TrackedEntity,
//! };
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), ledgerline_core::AuditError> {
//! let pipeline = AuditPipeline::new(Arc::new(MemoryLogStore::new()));
//!
//! let changes = PendingChanges::new().track(
//!     TrackedEntity::modified("User")
//!         .key("Id", 42)
//!         .original("Name", "Ada")
//!         .current("Name", "Ada L."),
//! );
//! let mut events = EventCollector::new();
//! events.raise(RaisedEvent::domain("UserRenamed", "42", 7));
//!
//! let unit = pipeline.stage(&changes, events);
//! let receipt = pipeline.commit(unit).await?;
//! assert_eq!(receipt.audit_ids.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Reading it back
//!
//! [`LogQueryService`] layers validated filtering, allow-listed sorting,
//! pagination, and CSV export over any [`LogStore`]. Post-commit
//! notification goes through an [`EventDispatcher`] whose handlers are
//! registered per message type.

pub mod dispatch;
pub mod entity;
pub mod entry;
pub mod error;
pub mod event;
pub mod export;
pub mod identity;
pub mod pipeline;
pub mod query;
pub mod store;
pub mod tracker;

pub use dispatch::{
    DispatcherConfig, EventDispatcher, EventDispatcherBuilder, EventHandler, HandlerError,
};
pub use entity::{ColumnValues, EntityState, PendingChanges, TrackedEntity};
pub use entry::{AuditAction, AuditEntry, AuditRecord};
pub use error::{AuditError, Result, StoreError};
pub use event::{CollectedEvent, EventCollector, EventLogRecord, RaisedEvent};
pub use export::{audit_fields, event_fields, ExportArtifact, FieldDescriptor, SheetLayout};
pub use identity::{AnonymousIdentity, Identity, IdentityProvider, StaticIdentity, ANONYMOUS};
pub use pipeline::{AuditPipeline, AuditPipelineBuilder, CommitReceipt, StagedUnit};
pub use query::{
    AuditSortField, AuditTrailFilter, EventLogFilter, EventSortField, LogQueryService, Page,
    PageRequest, QueryConfig, Sort, SortDirection, SortField,
};
pub use store::{
    FileLogStore, FileStoreConfig, LogStore, MemoryLogStore, MemoryStoreConfig, StoreResult,
    AUDIT_LOG_ENTITY, EVENT_LOG_ENTITY,
};
pub use tracker::ChangeTracker;
