//! Tabular export of audit and event logs.
//!
//! Columns are declared in static descriptor tables rather than discovered
//! by reflection: each field carries its display label, whether it may be
//! exported, whether free-text search covers it, and an explicit column
//! order. The tables are the single source of truth for both export and
//! the query keyword allow-list.

use crate::entry::AuditRecord;
use crate::error::{AuditError, Result};
use crate::event::EventLogRecord;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Declares one exportable/searchable field of a log record type.
pub struct FieldDescriptor<R> {
    /// Property name callers use to request the column.
    pub name: &'static str,
    /// Column header written into the artifact.
    pub label: &'static str,
    /// Whether the field may appear in an export.
    pub exportable: bool,
    /// Whether free-text keyword search covers the field.
    pub searchable: bool,
    /// Position of the column in the default export set.
    pub order: u32,
    /// Extracts the field's display value from a record.
    pub extract: fn(&R) -> String,
}

fn audit_id(r: &AuditRecord) -> String {
    r.id.clone()
}
fn audit_user_id(r: &AuditRecord) -> String {
    r.user_id.clone()
}
fn audit_action(r: &AuditRecord) -> String {
    r.action.to_string()
}
fn audit_entity_name(r: &AuditRecord) -> String {
    r.entity_name.clone()
}
fn audit_timestamp(r: &AuditRecord) -> String {
    r.timestamp.to_rfc3339()
}
fn audit_old_values(r: &AuditRecord) -> String {
    r.old_values.clone().unwrap_or_default()
}
fn audit_new_values(r: &AuditRecord) -> String {
    r.new_values.clone().unwrap_or_default()
}
fn audit_affected_columns(r: &AuditRecord) -> String {
    r.affected_columns.join(", ")
}
fn audit_primary_key(r: &AuditRecord) -> String {
    r.primary_key.clone()
}

static AUDIT_FIELDS: [FieldDescriptor<AuditRecord>; 9] = [
    FieldDescriptor { name: "id", label: "Id", exportable: true, searchable: false, order: 0, extract: audit_id },
    FieldDescriptor { name: "user_id", label: "User Id", exportable: true, searchable: true, order: 1, extract: audit_user_id },
    FieldDescriptor { name: "action", label: "Action", exportable: true, searchable: false, order: 2, extract: audit_action },
    FieldDescriptor { name: "entity_name", label: "Entity", exportable: true, searchable: true, order: 3, extract: audit_entity_name },
    FieldDescriptor { name: "timestamp", label: "Timestamp", exportable: true, searchable: false, order: 4, extract: audit_timestamp },
    FieldDescriptor { name: "old_values", label: "Old Values", exportable: true, searchable: true, order: 5, extract: audit_old_values },
    FieldDescriptor { name: "new_values", label: "New Values", exportable: true, searchable: true, order: 6, extract: audit_new_values },
    FieldDescriptor { name: "affected_columns", label: "Affected Columns", exportable: true, searchable: true, order: 7, extract: audit_affected_columns },
    FieldDescriptor { name: "primary_key", label: "Primary Key", exportable: true, searchable: true, order: 8, extract: audit_primary_key },
];

fn event_id(r: &EventLogRecord) -> String {
    r.id.clone()
}
fn event_aggregate_id(r: &EventLogRecord) -> String {
    r.aggregate_id.clone()
}
fn event_aggregate_version(r: &EventLogRecord) -> String {
    r.aggregate_version.map(|v| v.to_string()).unwrap_or_default()
}
fn event_message_type(r: &EventLogRecord) -> String {
    r.message_type.clone()
}
fn event_description(r: &EventLogRecord) -> String {
    r.description.clone()
}
fn event_timestamp(r: &EventLogRecord) -> String {
    r.timestamp.to_rfc3339()
}
fn event_user_id(r: &EventLogRecord) -> String {
    r.user_id.clone()
}
fn event_user_email(r: &EventLogRecord) -> String {
    r.user_email.clone()
}
fn event_data(r: &EventLogRecord) -> String {
    r.data.clone()
}

static EVENT_FIELDS: [FieldDescriptor<EventLogRecord>; 9] = [
    FieldDescriptor { name: "id", label: "Id", exportable: true, searchable: false, order: 0, extract: event_id },
    FieldDescriptor { name: "aggregate_id", label: "Aggregate Id", exportable: true, searchable: true, order: 1, extract: event_aggregate_id },
    FieldDescriptor { name: "aggregate_version", label: "Version", exportable: true, searchable: false, order: 2, extract: event_aggregate_version },
    FieldDescriptor { name: "message_type", label: "Message Type", exportable: true, searchable: true, order: 3, extract: event_message_type },
    FieldDescriptor { name: "description", label: "Description", exportable: true, searchable: true, order: 4, extract: event_description },
    FieldDescriptor { name: "timestamp", label: "Timestamp", exportable: true, searchable: false, order: 5, extract: event_timestamp },
    FieldDescriptor { name: "user_id", label: "User Id", exportable: true, searchable: true, order: 6, extract: event_user_id },
    FieldDescriptor { name: "user_email", label: "User Email", exportable: true, searchable: true, order: 7, extract: event_user_email },
    FieldDescriptor { name: "data", label: "Data", exportable: true, searchable: true, order: 8, extract: event_data },
];

/// Field descriptors for audit records.
pub fn audit_fields() -> &'static [FieldDescriptor<AuditRecord>] {
    &AUDIT_FIELDS
}

/// Field descriptors for event log records.
pub fn event_fields() -> &'static [FieldDescriptor<EventLogRecord>] {
    &EVENT_FIELDS
}

/// Case-insensitive keyword match over a record's searchable fields.
pub(crate) fn matches_keyword<R>(fields: &[FieldDescriptor<R>], record: &R, keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    fields
        .iter()
        .filter(|f| f.searchable)
        .any(|f| (f.extract)(record).to_lowercase().contains(&keyword))
}

/// Placement of the exported table inside the artifact.
///
/// Row/column indices are 1-based, mirroring spreadsheet conventions.
#[derive(Debug, Clone)]
pub struct SheetLayout {
    /// Row holding the column headers.
    pub titles_row: u32,
    /// First row holding data.
    pub first_data_row: u32,
    /// First column of the table.
    pub first_column: u32,
    /// Sheet name recorded on the artifact.
    pub sheet_name: String,
    /// Requested property names; empty means the default exportable set.
    pub columns: Vec<String>,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            titles_row: 1,
            first_data_row: 2,
            first_column: 1,
            sheet_name: "Sheet1".to_string(),
            columns: Vec::new(),
        }
    }
}

impl SheetLayout {
    /// Create a layout with the default placement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sheet name.
    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }

    /// Request an explicit column, in request order.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(name.into());
        self
    }

    /// Request an explicit set of columns.
    pub fn columns(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns.extend(names.into_iter().map(Into::into));
        self
    }
}

/// A finished export: CSV bytes, base64-encoded for the wire.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    /// Suggested download file name.
    pub file_name: String,
    /// Sheet name from the layout.
    pub sheet_name: String,
    /// Base64-encoded artifact content.
    pub content_base64: String,
}

impl ExportArtifact {
    /// Decode the artifact back into raw bytes.
    pub fn content_bytes(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(&self.content_base64)
            .map_err(|e| AuditError::Export(e.to_string()))
    }
}

/// Resolve the requested columns against the descriptor table.
///
/// An empty request yields every exportable field in descriptor order.
/// Unknown or non-exportable properties fail the whole export, all named
/// at once; nothing is produced on failure.
fn resolve_columns<'a, R>(
    fields: &'a [FieldDescriptor<R>],
    requested: &[String],
) -> Result<Vec<&'a FieldDescriptor<R>>> {
    if requested.is_empty() {
        let mut selected: Vec<&FieldDescriptor<R>> =
            fields.iter().filter(|f| f.exportable).collect();
        selected.sort_by_key(|f| f.order);
        return Ok(selected);
    }

    let mut selected = Vec::with_capacity(requested.len());
    let mut problems = Vec::new();
    for name in requested {
        match fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
        {
            Some(field) if field.exportable => selected.push(field),
            Some(field) => problems.push(format!("property '{}' is not exportable", field.name)),
            None => problems.push(format!("unknown export property '{name}'")),
        }
    }
    if !problems.is_empty() {
        return Err(AuditError::validation_all(problems));
    }
    Ok(selected)
}

/// Render records into a base64-encoded tabular artifact.
pub fn export_records<R>(
    records: &[R],
    fields: &[FieldDescriptor<R>],
    layout: &SheetLayout,
    file_name: impl Into<String>,
) -> Result<ExportArtifact> {
    let selected = resolve_columns(fields, &layout.columns)?;

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    let pad = layout.first_column.saturating_sub(1) as usize;

    for _ in 1..layout.titles_row {
        write_row(&mut writer, Vec::new())?;
    }

    let mut header: Vec<String> = vec![String::new(); pad];
    header.extend(selected.iter().map(|f| f.label.to_string()));
    write_row(&mut writer, header)?;

    for _ in layout.titles_row + 1..layout.first_data_row {
        write_row(&mut writer, Vec::new())?;
    }

    for record in records {
        let mut row: Vec<String> = vec![String::new(); pad];
        row.extend(selected.iter().map(|f| (f.extract)(record)));
        write_row(&mut writer, row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AuditError::Export(e.to_string()))?;

    Ok(ExportArtifact {
        file_name: file_name.into(),
        sheet_name: layout.sheet_name.clone(),
        content_base64: BASE64.encode(bytes),
    })
}

fn write_row(writer: &mut csv::Writer<Vec<u8>>, row: Vec<String>) -> Result<()> {
    // A record needs at least one field to render as a line.
    let row = if row.is_empty() {
        vec![String::new()]
    } else {
        row
    };
    writer
        .write_record(&row)
        .map_err(|e| AuditError::Export(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RaisedEvent;
    use crate::identity::Identity;
    use chrono::Utc;
    use serde_json::json;

    fn sample_event(message_type: &str) -> EventLogRecord {
        RaisedEvent::domain(message_type, "agg-1", 1)
            .description("something happened")
            .payload(json!({"k": "v"}))
            .into_record(&Identity::new("u-1", "u@example.com"), Utc::now())
            .unwrap()
    }

    #[test]
    fn default_export_uses_descriptor_order() {
        let records = vec![sample_event("UserRegistered")];
        let artifact =
            export_records(&records, event_fields(), &SheetLayout::new(), "events.csv").unwrap();

        let bytes = artifact.content_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("Id,Aggregate Id,Version,Message Type"));
        assert!(text.contains("UserRegistered"));
    }

    #[test]
    fn explicit_columns_follow_request_order() {
        let records = vec![sample_event("UserRegistered")];
        let layout = SheetLayout::new().columns(["message_type", "user_email"]);
        let artifact = export_records(&records, event_fields(), &layout, "events.csv").unwrap();

        let text = String::from_utf8(artifact.content_bytes().unwrap()).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, "Message Type,User Email");
        assert!(text.contains("u@example.com"));
    }

    #[test]
    fn unknown_property_fails_export_naming_it() {
        let records = vec![sample_event("UserRegistered")];
        let layout = SheetLayout::new().column("NotARealColumn");
        let err = export_records(&records, event_fields(), &layout, "events.csv").unwrap_err();

        let text = err.to_string();
        assert!(matches!(err, AuditError::Validation { .. }));
        assert!(text.contains("NotARealColumn"));
    }

    #[test]
    fn layout_offsets_shift_the_table() {
        let records = vec![sample_event("UserRegistered")];
        let mut layout = SheetLayout::new().columns(["message_type"]);
        layout.titles_row = 2;
        layout.first_data_row = 4;
        layout.first_column = 2;

        let artifact = export_records(&records, event_fields(), &layout, "events.csv").unwrap();
        let text = String::from_utf8(artifact.content_bytes().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        // Blank row, padded header, blank row, padded data.
        assert_eq!(lines[0], "\"\"");
        assert_eq!(lines[1], ",Message Type");
        assert_eq!(lines[3], ",UserRegistered");
    }

    #[test]
    fn keyword_match_covers_searchable_fields_only() {
        let record = sample_event("RoleAdded");
        assert!(matches_keyword(event_fields(), &record, "roleadded"));
        assert!(matches_keyword(event_fields(), &record, "u@example.com"));
        // Timestamp is not searchable.
        let year = record.timestamp.to_rfc3339()[..4].to_string();
        assert!(!matches_keyword(event_fields(), &record, &year));
    }
}
