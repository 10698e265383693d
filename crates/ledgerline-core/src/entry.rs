//! Audit entry drafts and durable audit records.

use crate::entity::ColumnValues;
use crate::error::{AuditError, Result};
use crate::identity::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of persistence change captured by an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Entity inserted.
    Create,
    /// Entity columns changed.
    Update,
    /// Entity removed.
    Delete,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::Create => write!(f, "create"),
            AuditAction::Update => write!(f, "update"),
            AuditAction::Delete => write!(f, "delete"),
        }
    }
}

/// Transient per-entity diff, built by the tracker before commit.
///
/// Lives through two phases: drafted while the unit of work is still
/// pending, then patched via [`AuditEntry::resolve_temporary`] once the
/// store has assigned generated values. [`AuditEntry::finalize`] converts
/// it into an immutable [`AuditRecord`]; the entry is never mutated after
/// that.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Logical entity type name.
    pub entity_name: String,
    /// Create, Update or Delete.
    pub action: AuditAction,
    /// Primary-key column values.
    pub key_values: ColumnValues,
    /// Changed columns with their pre-write values. Empty for Create.
    pub old_values: ColumnValues,
    /// Changed columns with their post-write values. Empty for Delete.
    pub new_values: ColumnValues,
    /// Names of the columns with a detected difference.
    pub changed_columns: Vec<String>,
    /// Columns still awaiting a store-generated value.
    pub temporary_columns: Vec<String>,
}

impl AuditEntry {
    /// Whether any store-generated column is still unresolved.
    pub fn has_unresolved(&self) -> bool {
        !self.temporary_columns.is_empty()
    }

    /// Patch a store-generated column with its post-commit value.
    ///
    /// Updates the new-value snapshot and, when the column is part of the
    /// primary key, the key snapshot as well. Unknown columns are ignored.
    pub fn resolve_temporary(&mut self, column: &str, value: impl Into<Value>) {
        let Some(pos) = self.temporary_columns.iter().position(|c| c == column) else {
            return;
        };
        self.temporary_columns.remove(pos);

        let value = value.into();
        if self.key_values.contains_key(column) {
            self.key_values.insert(column.to_string(), value.clone());
        }
        self.new_values.insert(column.to_string(), value);
        if !self.changed_columns.iter().any(|c| c == column) {
            self.changed_columns.push(column.to_string());
        }
    }

    /// Convert the entry into an immutable [`AuditRecord`].
    ///
    /// Fails if store-generated columns are still pending or if a column
    /// value cannot be serialized; either condition aborts the audit write
    /// rather than persist a placeholder or a partial diff.
    pub fn finalize(&self, identity: &Identity, timestamp: DateTime<Utc>) -> Result<AuditRecord> {
        if self.has_unresolved() {
            return Err(AuditError::Unresolved {
                entity: self.entity_name.clone(),
                columns: self.temporary_columns.clone(),
            });
        }

        let primary_key = encode_columns(&self.key_values)?.unwrap_or_else(|| "{}".to_string());

        Ok(AuditRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: identity.user_id.clone(),
            action: self.action,
            entity_name: self.entity_name.clone(),
            timestamp,
            old_values: encode_columns(&self.old_values)?,
            new_values: encode_columns(&self.new_values)?,
            affected_columns: self.changed_columns.clone(),
            primary_key,
        })
    }
}

/// Encode a column map to its durable JSON representation.
///
/// Empty maps encode to `None` so Create records carry no old side and
/// Delete records no new side. A failing column is reported by name.
fn encode_columns(values: &ColumnValues) -> Result<Option<String>> {
    if values.is_empty() {
        return Ok(None);
    }
    for (column, value) in values {
        if let Err(source) = serde_json::to_string(value) {
            return Err(AuditError::Serialization {
                column: column.clone(),
                source,
            });
        }
    }
    let encoded = serde_json::to_string(values).map_err(|source| AuditError::Serialization {
        column: "<record>".to_string(),
        source,
    })?;
    Ok(Some(encoded))
}

/// Durable, append-only audit record. Never mutated after being written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record identifier (UUIDv4).
    pub id: String,
    /// Attributed user id, or `"Anonymous"`.
    pub user_id: String,
    /// Create, Update or Delete.
    pub action: AuditAction,
    /// Logical entity type name.
    pub entity_name: String,
    /// Commit time of the owning unit of work.
    pub timestamp: DateTime<Utc>,
    /// JSON-encoded changed columns with pre-write values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_values: Option<String>,
    /// JSON-encoded changed columns with post-write values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_values: Option<String>,
    /// Columns with a detected difference.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_columns: Vec<String>,
    /// JSON-encoded primary-key map (handles composite keys).
    pub primary_key: String,
}

impl AuditRecord {
    /// Decode the old-value side back into a column map.
    pub fn old_value_map(&self) -> Result<ColumnValues> {
        decode_columns(self.old_values.as_deref())
    }

    /// Decode the new-value side back into a column map.
    pub fn new_value_map(&self) -> Result<ColumnValues> {
        decode_columns(self.new_values.as_deref())
    }

    /// Decode the primary-key map.
    pub fn key_map(&self) -> Result<ColumnValues> {
        decode_columns(Some(&self.primary_key))
    }
}

fn decode_columns(encoded: Option<&str>) -> Result<ColumnValues> {
    match encoded {
        None => Ok(ColumnValues::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|source| AuditError::Serialization {
            column: "<record>".to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update_entry() -> AuditEntry {
        AuditEntry {
            entity_name: "User".to_string(),
            action: AuditAction::Update,
            key_values: [("Id".to_string(), json!(42))].into(),
            old_values: [("Name".to_string(), json!("A"))].into(),
            new_values: [("Name".to_string(), json!("B"))].into(),
            changed_columns: vec!["Name".to_string()],
            temporary_columns: Vec::new(),
        }
    }

    #[test]
    fn finalize_encodes_only_changed_columns() {
        let record = update_entry()
            .finalize(&Identity::new("u-1", "u@example.com"), Utc::now())
            .unwrap();

        assert_eq!(record.user_id, "u-1");
        assert_eq!(record.affected_columns, vec!["Name"]);
        assert_eq!(record.old_value_map().unwrap().get("Name"), Some(&json!("A")));
        assert_eq!(record.new_value_map().unwrap().get("Name"), Some(&json!("B")));
        assert_eq!(record.key_map().unwrap().get("Id"), Some(&json!(42)));
    }

    #[test]
    fn finalize_rejects_unresolved_columns() {
        let mut entry = update_entry();
        entry.temporary_columns.push("Id".to_string());

        let err = entry
            .finalize(&Identity::anonymous(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, AuditError::Unresolved { .. }));
    }

    #[test]
    fn resolve_temporary_patches_key_and_new_values() {
        let mut entry = AuditEntry {
            entity_name: "User".to_string(),
            action: AuditAction::Create,
            key_values: [("Id".to_string(), Value::Null)].into(),
            old_values: ColumnValues::new(),
            new_values: [("Name".to_string(), json!("alice"))].into(),
            changed_columns: vec!["Name".to_string()],
            temporary_columns: vec!["Id".to_string()],
        };

        entry.resolve_temporary("Id", 101);

        assert!(!entry.has_unresolved());
        assert_eq!(entry.key_values.get("Id"), Some(&json!(101)));
        assert_eq!(entry.new_values.get("Id"), Some(&json!(101)));
        assert!(entry.changed_columns.contains(&"Id".to_string()));
    }

    #[test]
    fn delete_record_has_no_new_side() {
        let entry = AuditEntry {
            entity_name: "Role".to_string(),
            action: AuditAction::Delete,
            key_values: [("Id".to_string(), json!(3))].into(),
            old_values: [("Name".to_string(), json!("admin"))].into(),
            new_values: ColumnValues::new(),
            changed_columns: vec!["Name".to_string()],
            temporary_columns: Vec::new(),
        };

        let record = entry
            .finalize(&Identity::anonymous(), Utc::now())
            .unwrap();
        assert!(record.new_values.is_none());
        assert!(record.old_values.is_some());
    }

    #[test]
    fn record_serde_round_trip() {
        let record = update_entry()
            .finalize(&Identity::anonymous(), Utc::now())
            .unwrap();

        let json = serde_json::to_string(&record).unwrap();
        let back: AuditRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, record.id);
        assert_eq!(back.action, record.action);
        assert_eq!(back.old_values, record.old_values);
        assert_eq!(back.primary_key, record.primary_key);
    }
}
