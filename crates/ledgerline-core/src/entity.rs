//! Pending unit-of-work view consumed by the change tracker.
//!
//! A [`PendingChanges`] value is an explicit snapshot of everything the
//! business transaction is about to write: one [`TrackedEntity`] per
//! attached entity, with its state, key values and before/after column
//! snapshots. The tracker only ever reads this view.

use serde_json::Value;
use std::collections::BTreeMap;

/// Column name → value mapping. Ordered so serialized output is stable.
pub type ColumnValues = BTreeMap<String, Value>;

/// Persistence state of an entity inside the pending unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// New entity, inserted by this unit of work.
    Added,
    /// Existing entity with at least one pending column write.
    Modified,
    /// Entity removed by this unit of work.
    Deleted,
    /// Attached but untouched; never audited.
    Unchanged,
}

/// One entity attached to the pending unit of work.
#[derive(Debug, Clone)]
pub struct TrackedEntity {
    /// Logical entity type name (e.g. `"User"`).
    pub entity_name: String,
    /// Persistence state within this unit of work.
    pub state: EntityState,
    /// Primary-key column values. Composite keys carry one entry per column.
    pub key_values: ColumnValues,
    /// Column values as originally loaded from the store.
    pub original: ColumnValues,
    /// Column values as they will be written.
    pub current: ColumnValues,
    /// Columns whose final value the store assigns after the write
    /// (auto-generated identifiers and the like).
    pub temporary_columns: Vec<String>,
    /// Whether this entity participates in auditing.
    pub audit_enabled: bool,
}

impl TrackedEntity {
    fn with_state(entity_name: impl Into<String>, state: EntityState) -> Self {
        Self {
            entity_name: entity_name.into(),
            state,
            key_values: ColumnValues::new(),
            original: ColumnValues::new(),
            current: ColumnValues::new(),
            temporary_columns: Vec::new(),
            audit_enabled: true,
        }
    }

    /// Start describing a newly inserted entity.
    pub fn added(entity_name: impl Into<String>) -> Self {
        Self::with_state(entity_name, EntityState::Added)
    }

    /// Start describing a modified entity.
    pub fn modified(entity_name: impl Into<String>) -> Self {
        Self::with_state(entity_name, EntityState::Modified)
    }

    /// Start describing a deleted entity.
    pub fn deleted(entity_name: impl Into<String>) -> Self {
        Self::with_state(entity_name, EntityState::Deleted)
    }

    /// Start describing an attached but untouched entity.
    pub fn unchanged(entity_name: impl Into<String>) -> Self {
        Self::with_state(entity_name, EntityState::Unchanged)
    }

    /// Record a primary-key column value.
    pub fn key(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.key_values.insert(column.into(), value.into());
        self
    }

    /// Record a column value as originally loaded.
    pub fn original(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.original.insert(column.into(), value.into());
        self
    }

    /// Record a column value as it will be written.
    pub fn current(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.current.insert(column.into(), value.into());
        self
    }

    /// Record a column whose value the store assigns after the write.
    pub fn temporary(mut self, column: impl Into<String>) -> Self {
        self.temporary_columns.push(column.into());
        self
    }

    /// Opt this entity out of auditing.
    pub fn skip_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }
}

/// All entities attached to one pending unit of work.
#[derive(Debug, Clone, Default)]
pub struct PendingChanges {
    entities: Vec<TrackedEntity>,
}

impl PendingChanges {
    /// Create an empty unit-of-work view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an entity to the view.
    pub fn track(mut self, entity: TrackedEntity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Attach an entity to the view in place.
    pub fn push(&mut self, entity: TrackedEntity) {
        self.entities.push(entity);
    }

    /// The attached entities, in attach order.
    pub fn entities(&self) -> &[TrackedEntity] {
        &self.entities
    }

    /// Number of attached entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entities are attached.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
