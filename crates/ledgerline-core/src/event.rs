//! Domain/application events and their durable log form.

use crate::error::{AuditError, Result};
use crate::identity::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A business-meaningful occurrence raised during the current unit of work.
///
/// Domain events originate from a versioned aggregate and carry its
/// version; application events originate from application-level flows and
/// carry none. Both forms are otherwise identical on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaisedEvent {
    /// Logical event type name (e.g. `"UserRegistered"`).
    pub message_type: String,
    /// Human-readable summary for log listings.
    pub description: String,
    /// Identifier of the aggregate or flow that raised the event.
    pub aggregate_id: String,
    /// Aggregate version at raise time; `None` for application events.
    pub aggregate_version: Option<u64>,
    /// Structured event payload.
    pub payload: Value,
    /// When the event represents a value transition, the pre-value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_values: Option<Value>,
    /// When the event represents a value transition, the post-value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_values: Option<Value>,
}

impl RaisedEvent {
    /// Create a domain event raised by a versioned aggregate.
    pub fn domain(
        message_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        aggregate_version: u64,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            description: String::new(),
            aggregate_id: aggregate_id.into(),
            aggregate_version: Some(aggregate_version),
            payload: Value::Null,
            old_values: None,
            new_values: None,
        }
    }

    /// Create an application event with no aggregate version.
    pub fn application(
        message_type: impl Into<String>,
        aggregate_id: impl Into<String>,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            description: String::new(),
            aggregate_id: aggregate_id.into(),
            aggregate_version: None,
            payload: Value::Null,
            old_values: None,
            new_values: None,
        }
    }

    /// Set the human-readable description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach the structured payload.
    pub fn payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Attach an old/new value transition.
    pub fn transition(mut self, old: impl Into<Value>, new: impl Into<Value>) -> Self {
        self.old_values = Some(old.into());
        self.new_values = Some(new.into());
        self
    }

    /// Whether this event came from a versioned aggregate.
    pub fn is_domain_event(&self) -> bool {
        self.aggregate_version.is_some()
    }

    /// Wrap into the durable log form with attribution and timestamp.
    pub(crate) fn into_record(
        self,
        identity: &Identity,
        timestamp: DateTime<Utc>,
    ) -> Result<EventLogRecord> {
        let data = serde_json::to_string(&self.payload).map_err(|source| {
            AuditError::Serialization {
                column: format!("{}.payload", self.message_type),
                source,
            }
        })?;
        let old_values = encode_side(&self.message_type, self.old_values.as_ref())?;
        let new_values = encode_side(&self.message_type, self.new_values.as_ref())?;

        Ok(EventLogRecord {
            id: uuid::Uuid::new_v4().to_string(),
            aggregate_id: self.aggregate_id,
            aggregate_version: self.aggregate_version,
            message_type: self.message_type,
            description: self.description,
            timestamp,
            user_id: identity.user_id.clone(),
            user_email: identity.user_email.clone(),
            data,
            old_values,
            new_values,
        })
    }
}

fn encode_side(message_type: &str, side: Option<&Value>) -> Result<Option<String>> {
    side.map(|value| {
        serde_json::to_string(value).map_err(|source| AuditError::Serialization {
            column: format!("{message_type}.values"),
            source,
        })
    })
    .transpose()
}

/// Durable, append-only event log record. Never mutated after being written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogRecord {
    /// Unique record identifier (UUIDv4).
    pub id: String,
    /// Identifier of the aggregate or flow that raised the event.
    pub aggregate_id: String,
    /// Aggregate version, when raised by a versioned aggregate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_version: Option<u64>,
    /// Logical event type name.
    pub message_type: String,
    /// Human-readable summary.
    pub description: String,
    /// Commit time of the owning unit of work.
    pub timestamp: DateTime<Utc>,
    /// Attributed user id, or `"Anonymous"`.
    pub user_id: String,
    /// Attributed user email, or `"Anonymous"`.
    pub user_email: String,
    /// JSON-encoded event payload.
    pub data: String,
    /// JSON-encoded pre-value when the event is a transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_values: Option<String>,
    /// JSON-encoded post-value when the event is a transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_values: Option<String>,
}

impl EventLogRecord {
    /// Decode the payload back into a structured value.
    pub fn payload(&self) -> Result<Value> {
        serde_json::from_str(&self.data).map_err(|source| AuditError::Serialization {
            column: format!("{}.payload", self.message_type),
            source,
        })
    }
}

/// An event captured by the collector, in raise order.
#[derive(Debug, Clone)]
pub enum CollectedEvent {
    /// A raised event awaiting wrapping into its durable form.
    Raised(RaisedEvent),
    /// An event whose runtime value already is the durable record; written
    /// as-is without re-wrapping.
    PassThrough(EventLogRecord),
}

/// Request-scoped FIFO accumulator for events raised during one unit of work.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<CollectedEvent>,
}

impl EventCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture a raised event.
    pub fn raise(&mut self, event: RaisedEvent) {
        self.events.push(CollectedEvent::Raised(event));
    }

    /// Capture an already-durable record (pass-through case).
    pub fn raise_record(&mut self, record: EventLogRecord) {
        self.events.push(CollectedEvent::PassThrough(record));
    }

    /// Number of captured events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing has been raised.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Take the captured events, in the order they were raised.
    pub fn into_events(self) -> Vec<CollectedEvent> {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collector_preserves_raise_order() {
        let mut collector = EventCollector::new();
        collector.raise(RaisedEvent::application("UserRegistered", "u-1"));
        collector.raise(RaisedEvent::domain("RoleAdded", "u-1", 2));
        collector.raise(RaisedEvent::application("MailQueued", "u-1"));

        let names: Vec<String> = collector
            .into_events()
            .into_iter()
            .map(|e| match e {
                CollectedEvent::Raised(ev) => ev.message_type,
                CollectedEvent::PassThrough(r) => r.message_type,
            })
            .collect();
        assert_eq!(names, vec!["UserRegistered", "RoleAdded", "MailQueued"]);
    }

    #[test]
    fn domain_event_carries_version_application_does_not() {
        assert_eq!(
            RaisedEvent::domain("RoleAdded", "u-1", 4).aggregate_version,
            Some(4)
        );
        assert_eq!(
            RaisedEvent::application("UserRegistered", "u-1").aggregate_version,
            None
        );
    }

    #[test]
    fn into_record_wraps_payload_and_identity() {
        let event = RaisedEvent::domain("RoleAdded", "agg-9", 3)
            .description("role granted")
            .payload(json!({"role": "admin"}))
            .transition(json!([]), json!(["admin"]));

        let record = event
            .into_record(&Identity::new("u-1", "u@example.com"), Utc::now())
            .unwrap();

        assert_eq!(record.aggregate_id, "agg-9");
        assert_eq!(record.aggregate_version, Some(3));
        assert_eq!(record.user_email, "u@example.com");
        assert_eq!(record.payload().unwrap(), json!({"role": "admin"}));
        assert!(record.old_values.is_some());
        assert!(record.new_values.is_some());
    }

    #[test]
    fn record_serde_round_trip() {
        let record = RaisedEvent::application("MailQueued", "flow-1")
            .payload(json!({"to": "x@example.com"}))
            .into_record(&Identity::anonymous(), Utc::now())
            .unwrap();

        let json = serde_json::to_string(&record).unwrap();
        let back: EventLogRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.aggregate_version, None);
        assert_eq!(back.data, record.data);
    }
}
