//! End-to-end coverage of the capture, persist, query, and notify flow.

use async_trait::async_trait;
use ledgerline_core::{
    AuditAction, AuditPipeline, AuditSortField, AuditTrailFilter, EventCollector, EventDispatcher,
    EventHandler, EventLogFilter, EventLogRecord, HandlerError, LogQueryService, MemoryLogStore,
    PageRequest, PendingChanges, RaisedEvent, SheetLayout, Sort, StaticIdentity, TrackedEntity,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

struct Recording {
    message_type: String,
    seen: Arc<Mutex<Vec<EventLogRecord>>>,
}

#[async_trait]
impl EventHandler for Recording {
    fn message_type(&self) -> &str {
        &self.message_type
    }

    async fn handle(&self, record: EventLogRecord) -> Result<(), HandlerError> {
        self.seen.lock().unwrap().push(record);
        Ok(())
    }
}

#[tokio::test]
async fn update_flows_from_capture_to_query() {
    let store = Arc::new(MemoryLogStore::new());
    let pipeline = AuditPipeline::builder(store.clone())
        .identity(Arc::new(StaticIdentity::new("admin", "admin@example.com")))
        .build();

    let changes = PendingChanges::new().track(
        TrackedEntity::modified("Customer")
            .key("Id", 7)
            .original("Name", "Acme")
            .original("Tier", "basic")
            .current("Name", "Acme Corp")
            .current("Tier", "basic"),
    );
    let mut events = EventCollector::new();
    events.raise(
        RaisedEvent::domain("CustomerRenamed", "7", 3)
            .description("Customer renamed during onboarding review")
            .payload(json!({"from": "Acme", "to": "Acme Corp"})),
    );

    let unit = pipeline.stage(&changes, events);
    let receipt = pipeline.commit(unit).await.unwrap();
    assert_eq!(receipt.audit_ids.len(), 1);
    assert_eq!(receipt.event_ids.len(), 1);

    let service = LogQueryService::new(store);

    let page = service
        .audit_trails(
            &AuditTrailFilter::new().user("admin"),
            Sort::<AuditSortField>::newest_first(),
            PageRequest::first(25),
        )
        .await
        .unwrap();
    assert_eq!(page.total_count, 1);
    let audit = &page.items[0];
    assert_eq!(audit.action, AuditAction::Update);
    assert_eq!(audit.entity_name, "Customer");
    // Only the changed column lands in the diff.
    assert_eq!(audit.affected_columns, vec!["Name".to_string()]);
    let old = audit.old_value_map().unwrap();
    let new = audit.new_value_map().unwrap();
    assert_eq!(old.get("Name"), Some(&json!("Acme")));
    assert_eq!(new.get("Name"), Some(&json!("Acme Corp")));
    assert!(old.get("Tier").is_none());
    assert_eq!(audit.key_map().unwrap().get("Id"), Some(&json!(7)));

    let event = service
        .event_by_log_id(&receipt.event_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.message_type, "CustomerRenamed");
    assert_eq!(event.aggregate_id, "7");
    assert_eq!(event.aggregate_version, Some(3));
    assert_eq!(event.user_id, "admin");
    assert_eq!(
        event.payload().unwrap(),
        json!({"from": "Acme", "to": "Acme Corp"})
    );
}

#[tokio::test]
async fn committed_events_reach_registered_handlers() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = EventDispatcher::builder()
        .register(Recording {
            message_type: "OrderShipped".to_string(),
            seen: seen.clone(),
        })
        .build();

    let store = Arc::new(MemoryLogStore::new());
    let pipeline = AuditPipeline::builder(store)
        .dispatcher(Arc::new(dispatcher))
        .build();

    let mut events = EventCollector::new();
    events.raise(RaisedEvent::domain("OrderShipped", "order-12", 5));
    events.raise(RaisedEvent::application("CacheInvalidated", "order-12"));

    let unit = pipeline.stage(&PendingChanges::new(), events);
    pipeline.commit(unit).await.unwrap();

    // Handlers run on spawned tasks after commit returns.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].message_type, "OrderShipped");
    assert_eq!(seen[0].aggregate_id, "order-12");
}

#[tokio::test]
async fn deferred_key_round_trips_through_the_store() {
    let store = Arc::new(MemoryLogStore::new());
    let pipeline = AuditPipeline::new(store.clone());

    let changes = PendingChanges::new().track(
        TrackedEntity::added("Invoice")
            .current("Total", 120)
            .temporary("Id"),
    );
    let mut unit = pipeline.stage(&changes, EventCollector::new());
    assert!(unit.has_unresolved());

    unit.resolve_key("Invoice", "Id", 5001);
    let receipt = pipeline.commit(unit).await.unwrap();

    let service = LogQueryService::new(store);
    let audit = service
        .audit_by_id(&receipt.audit_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(audit.action, AuditAction::Create);
    assert_eq!(audit.new_value_map().unwrap().get("Id"), Some(&json!(5001)));
    assert!(audit.old_values.is_none());
}

#[tokio::test]
async fn export_covers_the_filtered_window() {
    let store = Arc::new(MemoryLogStore::new());
    let pipeline = AuditPipeline::new(store.clone());

    for version in 0..3u64 {
        let mut events = EventCollector::new();
        events.raise(RaisedEvent::domain("StockAdjusted", "sku-9", version));
        let unit = pipeline.stage(&PendingChanges::new(), events);
        pipeline.commit(unit).await.unwrap();
    }

    let service = LogQueryService::new(store);
    let artifact = service
        .export_event_logs(
            &EventLogFilter::new().versions(1, 2),
            &SheetLayout::new().columns(["message_type", "aggregate_version"]),
        )
        .await
        .unwrap();

    assert_eq!(artifact.file_name, "event_logs.csv");
    let text = String::from_utf8(artifact.content_bytes().unwrap()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Message Type,Version");
    // Header plus the two versions inside the window.
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("StockAdjusted,"));
    assert!(!text.contains(",0"));
}
