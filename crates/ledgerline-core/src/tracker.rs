//! Entity change tracker: pending unit of work → audit entry drafts.

use crate::entity::{ColumnValues, EntityState, PendingChanges, TrackedEntity};
use crate::entry::{AuditAction, AuditEntry};
use crate::store::{AUDIT_LOG_ENTITY, EVENT_LOG_ENTITY};

/// Inspects a pending unit of work and drafts one [`AuditEntry`] per
/// changed, audit-eligible entity.
///
/// Read-only: never mutates the pending view and performs no I/O. The log
/// entities themselves are excluded by default so auditing the audit
/// tables cannot recurse.
#[derive(Debug, Clone)]
pub struct ChangeTracker {
    excluded_entities: Vec<String>,
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self {
            excluded_entities: vec![
                AUDIT_LOG_ENTITY.to_string(),
                EVENT_LOG_ENTITY.to_string(),
            ],
        }
    }
}

impl ChangeTracker {
    /// Create a tracker with the default exclusion list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude an additional entity type from auditing.
    pub fn exclude(mut self, entity_name: impl Into<String>) -> Self {
        self.excluded_entities.push(entity_name.into());
        self
    }

    fn is_excluded(&self, entity_name: &str) -> bool {
        self.excluded_entities.iter().any(|e| e == entity_name)
    }

    /// Draft audit entries for every changed entity in the unit of work.
    ///
    /// Unchanged entities, opted-out entities, excluded entity types, and
    /// Modified entities with no actually-differing column produce nothing.
    pub fn collect(&self, changes: &PendingChanges) -> Vec<AuditEntry> {
        changes
            .entities()
            .iter()
            .filter(|entity| entity.audit_enabled && !self.is_excluded(&entity.entity_name))
            .filter_map(|entity| self.draft_entry(entity))
            .collect()
    }

    fn draft_entry(&self, entity: &TrackedEntity) -> Option<AuditEntry> {
        match entity.state {
            EntityState::Unchanged => None,
            EntityState::Added => Some(self.draft_added(entity)),
            EntityState::Deleted => Some(self.draft_deleted(entity)),
            EntityState::Modified => self.draft_modified(entity),
        }
    }

    fn draft_added(&self, entity: &TrackedEntity) -> AuditEntry {
        let new_values = entity.current.clone();
        let changed_columns: Vec<String> = new_values.keys().cloned().collect();
        AuditEntry {
            entity_name: entity.entity_name.clone(),
            action: AuditAction::Create,
            key_values: entity.key_values.clone(),
            old_values: ColumnValues::new(),
            new_values,
            changed_columns,
            temporary_columns: entity.temporary_columns.clone(),
        }
    }

    fn draft_deleted(&self, entity: &TrackedEntity) -> AuditEntry {
        let old_values = if entity.original.is_empty() {
            entity.current.clone()
        } else {
            entity.original.clone()
        };
        let changed_columns: Vec<String> = old_values.keys().cloned().collect();
        AuditEntry {
            entity_name: entity.entity_name.clone(),
            action: AuditAction::Delete,
            key_values: entity.key_values.clone(),
            old_values,
            new_values: ColumnValues::new(),
            changed_columns,
            // Deletes never wait on store-generated values.
            temporary_columns: Vec::new(),
        }
    }

    /// Diff original against current; only differing columns survive.
    fn draft_modified(&self, entity: &TrackedEntity) -> Option<AuditEntry> {
        let mut old_values = ColumnValues::new();
        let mut new_values = ColumnValues::new();
        let mut changed_columns = Vec::new();

        for (column, current) in &entity.current {
            match entity.original.get(column) {
                Some(original) if original == current => {}
                Some(original) => {
                    old_values.insert(column.clone(), original.clone());
                    new_values.insert(column.clone(), current.clone());
                    changed_columns.push(column.clone());
                }
                // Column newly set on an existing entity.
                None => {
                    new_values.insert(column.clone(), current.clone());
                    changed_columns.push(column.clone());
                }
            }
        }

        // Columns dropped from the entity count as changed to null.
        for (column, original) in &entity.original {
            if !entity.current.contains_key(column) {
                old_values.insert(column.clone(), original.clone());
                new_values.insert(column.clone(), serde_json::Value::Null);
                changed_columns.push(column.clone());
            }
        }

        if changed_columns.is_empty() {
            return None;
        }

        let temporary_columns = entity
            .temporary_columns
            .iter()
            .filter(|c| changed_columns.contains(c))
            .cloned()
            .collect();

        Some(AuditEntry {
            entity_name: entity.entity_name.clone(),
            action: AuditAction::Update,
            key_values: entity.key_values.clone(),
            old_values,
            new_values,
            changed_columns,
            temporary_columns,
        })
    }
}
