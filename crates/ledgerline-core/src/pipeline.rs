//! The audit pipeline: stage before commit, persist and notify after.

use crate::dispatch::EventDispatcher;
use crate::entity::PendingChanges;
use crate::entry::{AuditEntry, AuditRecord};
use crate::error::Result;
use crate::event::{CollectedEvent, EventCollector, EventLogRecord};
use crate::identity::{AnonymousIdentity, IdentityProvider};
use crate::store::LogStore;
use crate::tracker::ChangeTracker;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// Everything captured for one unit of work before its business write.
///
/// Holds the drafted audit entries and the collected events. After the
/// business write completes, store-generated values are patched in via
/// [`StagedUnit::resolve_key`]; the unit then goes to
/// [`AuditPipeline::commit`].
#[derive(Debug)]
pub struct StagedUnit {
    entries: Vec<AuditEntry>,
    events: Vec<CollectedEvent>,
}

impl StagedUnit {
    /// The drafted audit entries, in tracker order.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Whether any entry still awaits a store-generated value.
    pub fn has_unresolved(&self) -> bool {
        self.entries.iter().any(AuditEntry::has_unresolved)
    }

    /// Patch a store-generated column on every entry of the given entity
    /// type that still awaits it.
    pub fn resolve_key(&mut self, entity_name: &str, column: &str, value: impl Into<Value>) {
        let value = value.into();
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.entity_name == entity_name)
        {
            entry.resolve_temporary(column, value.clone());
        }
    }

    /// Patch a store-generated column on one entry by index.
    pub fn resolve_key_at(&mut self, index: usize, column: &str, value: impl Into<Value>) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.resolve_temporary(column, value.into());
        }
    }
}

/// Ids of the records durably written for one unit of work.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    /// Ids of the appended audit records.
    pub audit_ids: Vec<String>,
    /// Ids of the appended event log records.
    pub event_ids: Vec<String>,
}

/// Builder for [`AuditPipeline`].
pub struct AuditPipelineBuilder {
    store: Arc<dyn LogStore>,
    tracker: ChangeTracker,
    identity: Arc<dyn IdentityProvider>,
    dispatcher: Arc<EventDispatcher>,
}

impl AuditPipelineBuilder {
    /// Swap in a customized change tracker.
    pub fn tracker(mut self, tracker: ChangeTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Attach the identity provider used for attribution at commit time.
    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    /// Attach the post-commit notification dispatcher.
    pub fn dispatcher(mut self, dispatcher: Arc<EventDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Finish building the pipeline.
    pub fn build(self) -> AuditPipeline {
        AuditPipeline {
            store: self.store,
            tracker: self.tracker,
            identity: self.identity,
            dispatcher: self.dispatcher,
        }
    }
}

/// Orchestrates one unit of work's audit capture, persistence, and
/// post-commit notification.
///
/// The intended call sequence per unit of work:
///
/// 1. [`AuditPipeline::stage`] with the pending changes and the events
///    collected so far, before the business write.
/// 2. The caller performs the business write, then patches any
///    store-generated keys onto the staged unit.
/// 3. [`AuditPipeline::commit`] finalizes, appends both record kinds
///    through the store in one unit, and hands the written events to the
///    dispatcher. A store failure propagates to the caller so the
///    surrounding transaction fails with it.
pub struct AuditPipeline {
    store: Arc<dyn LogStore>,
    tracker: ChangeTracker,
    identity: Arc<dyn IdentityProvider>,
    dispatcher: Arc<EventDispatcher>,
}

impl AuditPipeline {
    /// Start building a pipeline over the given store.
    pub fn builder(store: Arc<dyn LogStore>) -> AuditPipelineBuilder {
        AuditPipelineBuilder {
            store,
            tracker: ChangeTracker::new(),
            identity: Arc::new(AnonymousIdentity),
            dispatcher: Arc::new(EventDispatcher::default()),
        }
    }

    /// Create a pipeline with default tracker, anonymous identity, and an
    /// empty dispatcher.
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self::builder(store).build()
    }

    /// Capture the unit of work: draft audit entries and take the events.
    ///
    /// Read-only with respect to the pending view; safe to call before
    /// the business write commits.
    pub fn stage(&self, changes: &PendingChanges, collector: EventCollector) -> StagedUnit {
        StagedUnit {
            entries: self.tracker.collect(changes),
            events: collector.into_events(),
        }
    }

    /// Finalize and durably append the staged unit, then notify handlers.
    ///
    /// Fails if any entry still has unresolved store-generated columns,
    /// if a value cannot be serialized, or if the store append fails; in
    /// every failure case nothing is dispatched.
    pub async fn commit(&self, unit: StagedUnit) -> Result<CommitReceipt> {
        let identity = self.identity.current_identity();
        let timestamp = Utc::now();

        let audits: Vec<AuditRecord> = unit
            .entries
            .iter()
            .map(|entry| entry.finalize(&identity, timestamp))
            .collect::<Result<_>>()?;

        let events: Vec<EventLogRecord> = unit
            .events
            .into_iter()
            .map(|event| match event {
                CollectedEvent::PassThrough(record) => Ok(record),
                CollectedEvent::Raised(raised) => raised.into_record(&identity, timestamp),
            })
            .collect::<Result<_>>()?;

        self.store.append_unit(&audits, &events).await?;
        tracing::debug!(
            user_id = %identity.user_id,
            audits = audits.len(),
            events = events.len(),
            "unit of work appended to log store"
        );

        let receipt = CommitReceipt {
            audit_ids: audits.iter().map(|r| r.id.clone()).collect(),
            event_ids: events.iter().map(|r| r.id.clone()).collect(),
        };
        self.dispatcher.dispatch(events);
        Ok(receipt)
    }
}
