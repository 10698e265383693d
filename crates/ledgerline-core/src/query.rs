//! Filtered, paginated, ordered read access over the logs.

use crate::entry::AuditRecord;
use crate::error::{AuditError, Result};
use crate::event::EventLogRecord;
use crate::export::{self, ExportArtifact, SheetLayout};
use crate::store::LogStore;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::Arc;

/// Filter over the audit log.
#[derive(Debug, Clone, Default)]
pub struct AuditTrailFilter {
    /// Exact user id match.
    pub user_id: Option<String>,
    /// Free-text keyword over the searchable field allow-list.
    pub keyword: Option<String>,
    /// Inclusive lower bound on the record timestamp.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the record timestamp.
    pub end: Option<DateTime<Utc>>,
}

impl AuditTrailFilter {
    /// Create an empty (match-everything) filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by exact user id.
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Filter by free-text keyword.
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Filter records at or after the given time.
    pub fn from(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Filter records at or before the given time.
    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Enforce range coherence. A reversed range is an error, not a clamp.
    pub fn validate(&self) -> Result<()> {
        let mut messages = Vec::new();
        check_date_range(&self.start, &self.end, &mut messages);
        if messages.is_empty() {
            Ok(())
        } else {
            Err(AuditError::validation_all(messages))
        }
    }

    /// Whether a record passes every supplied criterion.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(ref user_id) = self.user_id {
            if &record.user_id != user_id {
                return false;
            }
        }
        if let Some(start) = self.start {
            if record.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if record.timestamp > end {
                return false;
            }
        }
        if let Some(ref keyword) = self.keyword {
            if !export::matches_keyword(export::audit_fields(), record, keyword) {
                return false;
            }
        }
        true
    }
}

/// Filter over the event log.
#[derive(Debug, Clone, Default)]
pub struct EventLogFilter {
    /// Exact user id match.
    pub user_id: Option<String>,
    /// Free-text keyword over the searchable field allow-list.
    pub keyword: Option<String>,
    /// Inclusive lower bound on the record timestamp.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the record timestamp.
    pub end: Option<DateTime<Utc>>,
    /// Inclusive lower bound on the aggregate version.
    pub version_start: Option<u64>,
    /// Inclusive upper bound on the aggregate version.
    pub version_end: Option<u64>,
}

impl EventLogFilter {
    /// Create an empty (match-everything) filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by exact user id.
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Filter by free-text keyword.
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Filter records at or after the given time.
    pub fn from(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Filter records at or before the given time.
    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Filter by inclusive aggregate-version range.
    pub fn versions(mut self, start: u64, end: u64) -> Self {
        self.version_start = Some(start);
        self.version_end = Some(end);
        self
    }

    /// Enforce range coherence for both the date and version ranges.
    pub fn validate(&self) -> Result<()> {
        let mut messages = Vec::new();
        check_date_range(&self.start, &self.end, &mut messages);
        if let (Some(vs), Some(ve)) = (self.version_start, self.version_end) {
            if ve < vs {
                messages.push(format!(
                    "aggregate version range end ({ve}) must not precede start ({vs})"
                ));
            }
        }
        if messages.is_empty() {
            Ok(())
        } else {
            Err(AuditError::validation_all(messages))
        }
    }

    /// Whether a record passes every supplied criterion.
    pub fn matches(&self, record: &EventLogRecord) -> bool {
        if let Some(ref user_id) = self.user_id {
            if &record.user_id != user_id {
                return false;
            }
        }
        if let Some(start) = self.start {
            if record.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if record.timestamp > end {
                return false;
            }
        }
        // A version bound excludes unversioned (application) events.
        if let Some(vs) = self.version_start {
            match record.aggregate_version {
                Some(v) if v >= vs => {}
                _ => return false,
            }
        }
        if let Some(ve) = self.version_end {
            match record.aggregate_version {
                Some(v) if v <= ve => {}
                _ => return false,
            }
        }
        if let Some(ref keyword) = self.keyword {
            if !export::matches_keyword(export::event_fields(), record, keyword) {
                return false;
            }
        }
        true
    }
}

fn check_date_range(
    start: &Option<DateTime<Utc>>,
    end: &Option<DateTime<Utc>>,
    messages: &mut Vec<String>,
) {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            messages.push(format!(
                "date range end ({end}) must not precede start ({start})"
            ));
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// A sortable field allow-list for one record type.
pub trait SortField: Copy {
    /// Record type the field belongs to.
    type Record;

    /// Resolve a field name; `None` for anything outside the allow-list.
    fn from_name(name: &str) -> Option<Self>;

    /// Field used when no explicit order is requested.
    fn default_field() -> Self;

    /// Compare two records on this field.
    fn compare(self, a: &Self::Record, b: &Self::Record) -> Ordering;

    /// Stable tie-breaker.
    fn record_id(record: &Self::Record) -> &str;
}

/// A parsed, allow-listed ordering expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<F> {
    /// Field to order by.
    pub field: F,
    /// Direction to order in.
    pub direction: SortDirection,
}

impl<F: SortField> Sort<F> {
    /// The default ordering: newest first.
    pub fn newest_first() -> Self {
        Self {
            field: F::default_field(),
            direction: SortDirection::Descending,
        }
    }

    /// Parse an ordering expression like `"timestamp"` or `"user_id desc"`.
    ///
    /// Only allow-listed field names are accepted; anything else is a
    /// validation error rather than a dynamically evaluated expression.
    pub fn parse(input: &str) -> Result<Self> {
        let mut parts = input.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| AuditError::validation("empty ordering expression"))?;
        let field = F::from_name(name)
            .ok_or_else(|| AuditError::validation(format!("unknown sort field '{name}'")))?;
        let direction = match parts.next() {
            None => SortDirection::Ascending,
            Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Ascending,
            Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Descending,
            Some(d) => {
                return Err(AuditError::validation(format!(
                    "unknown sort direction '{d}'"
                )))
            }
        };
        if parts.next().is_some() {
            return Err(AuditError::validation(format!(
                "malformed ordering expression '{input}'"
            )));
        }
        Ok(Self { field, direction })
    }

    fn apply(self, items: &mut [F::Record]) {
        items.sort_by(|a, b| {
            let ordering = self
                .field
                .compare(a, b)
                .then_with(|| F::record_id(a).cmp(F::record_id(b)));
            match self.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }
}

impl<F: SortField> Default for Sort<F> {
    fn default() -> Self {
        Self::newest_first()
    }
}

/// Sortable fields of the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditSortField {
    /// Record timestamp.
    Timestamp,
    /// Entity type name.
    EntityName,
    /// Attributed user id.
    UserId,
    /// Create/Update/Delete.
    Action,
}

impl SortField for AuditSortField {
    type Record = AuditRecord;

    fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("timestamp") {
            Some(Self::Timestamp)
        } else if name.eq_ignore_ascii_case("entity_name") {
            Some(Self::EntityName)
        } else if name.eq_ignore_ascii_case("user_id") {
            Some(Self::UserId)
        } else if name.eq_ignore_ascii_case("action") {
            Some(Self::Action)
        } else {
            None
        }
    }

    fn default_field() -> Self {
        Self::Timestamp
    }

    fn compare(self, a: &AuditRecord, b: &AuditRecord) -> Ordering {
        match self {
            Self::Timestamp => a.timestamp.cmp(&b.timestamp),
            Self::EntityName => a.entity_name.cmp(&b.entity_name),
            Self::UserId => a.user_id.cmp(&b.user_id),
            Self::Action => a.action.cmp(&b.action),
        }
    }

    fn record_id(record: &AuditRecord) -> &str {
        &record.id
    }
}

/// Sortable fields of the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSortField {
    /// Record timestamp.
    Timestamp,
    /// Logical event type name.
    MessageType,
    /// Attributed user id.
    UserId,
    /// Aggregate version (unversioned events sort first).
    AggregateVersion,
}

impl SortField for EventSortField {
    type Record = EventLogRecord;

    fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("timestamp") {
            Some(Self::Timestamp)
        } else if name.eq_ignore_ascii_case("message_type") {
            Some(Self::MessageType)
        } else if name.eq_ignore_ascii_case("user_id") {
            Some(Self::UserId)
        } else if name.eq_ignore_ascii_case("aggregate_version") {
            Some(Self::AggregateVersion)
        } else {
            None
        }
    }

    fn default_field() -> Self {
        Self::Timestamp
    }

    fn compare(self, a: &EventLogRecord, b: &EventLogRecord) -> Ordering {
        match self {
            Self::Timestamp => a.timestamp.cmp(&b.timestamp),
            Self::MessageType => a.message_type.cmp(&b.message_type),
            Self::UserId => a.user_id.cmp(&b.user_id),
            Self::AggregateVersion => a.aggregate_version.cmp(&b.aggregate_version),
        }
    }

    fn record_id(record: &EventLogRecord) -> &str {
        &record.id
    }
}

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number, starting at 1.
    pub page: u32,
    /// Requested page size; clamped to the service's configured bounds.
    pub page_size: u32,
}

impl PageRequest {
    /// Request a specific page.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Request the first page.
    pub fn first(page_size: u32) -> Self {
        Self::new(1, page_size)
    }
}

/// One page of results with the total match count.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Records on this page, in requested order.
    pub items: Vec<T>,
    /// Total number of matching records across all pages.
    pub total_count: usize,
    /// 1-based page number served.
    pub page_number: u32,
    /// Effective page size after clamping.
    pub page_size: u32,
}

impl<T> Page<T> {
    /// Project the page's items into another type, keeping the paging info.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page_number: self.page_number,
            page_size: self.page_size,
        }
    }
}

/// Bounds applied to every page request.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Page size used when the caller requests zero.
    pub default_page_size: u32,
    /// Hard upper bound on the page size.
    pub max_page_size: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 200,
        }
    }
}

fn paginate<T>(mut items: Vec<T>, request: PageRequest, config: &QueryConfig) -> Page<T> {
    let page_size = if request.page_size == 0 {
        config.default_page_size
    } else {
        request.page_size.min(config.max_page_size)
    };
    let page_number = request.page.max(1);
    let total_count = items.len();

    let offset = (page_number as usize - 1) * page_size as usize;
    let items = if offset >= items.len() {
        Vec::new()
    } else {
        items.drain(..).skip(offset).take(page_size as usize).collect()
    };

    Page {
        items,
        total_count,
        page_number,
        page_size,
    }
}

/// Read-side service over a log store: listings, lookups, and exports.
pub struct LogQueryService {
    store: Arc<dyn LogStore>,
    config: QueryConfig,
}

impl LogQueryService {
    /// Create a service with default paging bounds.
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self::with_config(store, QueryConfig::default())
    }

    /// Create a service with explicit paging bounds.
    pub fn with_config(store: Arc<dyn LogStore>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    /// List audit records: filtered, ordered, paginated.
    pub async fn audit_trails(
        &self,
        filter: &AuditTrailFilter,
        sort: Sort<AuditSortField>,
        page: PageRequest,
    ) -> Result<Page<AuditRecord>> {
        filter.validate()?;
        let mut matches = self.store.query_audits(filter).await?;
        sort.apply(&mut matches);
        Ok(paginate(matches, page, &self.config))
    }

    /// List event log records: filtered, ordered, paginated.
    pub async fn event_logs(
        &self,
        filter: &EventLogFilter,
        sort: Sort<EventSortField>,
        page: PageRequest,
    ) -> Result<Page<EventLogRecord>> {
        filter.validate()?;
        let mut matches = self.store.query_events(filter).await?;
        sort.apply(&mut matches);
        Ok(paginate(matches, page, &self.config))
    }

    /// Fetch a single audit record by id.
    pub async fn audit_by_id(&self, id: &str) -> Result<Option<AuditRecord>> {
        Ok(self.store.audit_by_id(id).await?)
    }

    /// Fetch a single event log record by id.
    pub async fn event_by_log_id(&self, id: &str) -> Result<Option<EventLogRecord>> {
        Ok(self.store.event_by_id(id).await?)
    }

    /// Export matching audit records as a base64-encoded tabular artifact.
    pub async fn export_audit_trails(
        &self,
        filter: &AuditTrailFilter,
        layout: &SheetLayout,
    ) -> Result<ExportArtifact> {
        filter.validate()?;
        let mut matches = self.store.query_audits(filter).await?;
        Sort::<AuditSortField>::newest_first().apply(&mut matches);
        export::export_records(&matches, export::audit_fields(), layout, "audit_trails.csv")
    }

    /// Export matching event records as a base64-encoded tabular artifact.
    pub async fn export_event_logs(
        &self,
        filter: &EventLogFilter,
        layout: &SheetLayout,
    ) -> Result<ExportArtifact> {
        filter.validate()?;
        let mut matches = self.store.query_events(filter).await?;
        Sort::<EventSortField>::newest_first().apply(&mut matches);
        export::export_records(&matches, export::event_fields(), layout, "event_logs.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RaisedEvent;
    use crate::identity::Identity;
    use crate::store::MemoryLogStore;
    use chrono::Duration;

    fn record_at(message_type: &str, version: u64, offset_secs: i64) -> EventLogRecord {
        let mut record = RaisedEvent::domain(message_type, "agg-1", version)
            .into_record(&Identity::new("u-1", "u@example.com"), Utc::now())
            .unwrap();
        record.timestamp += Duration::seconds(offset_secs);
        record
    }

    async fn seeded_service() -> LogQueryService {
        let store = Arc::new(MemoryLogStore::new());
        let events = vec![
            record_at("First", 1, 0),
            record_at("Second", 2, 10),
            record_at("Third", 3, 20),
        ];
        store.append_unit(&[], &events).await.unwrap();
        LogQueryService::new(store)
    }

    #[tokio::test]
    async fn reversed_date_range_is_a_validation_error() {
        let service = seeded_service().await;
        let now = Utc::now();
        let filter = EventLogFilter::new()
            .from(now)
            .until(now - Duration::hours(1));

        let err = service
            .event_logs(&filter, Sort::newest_first(), PageRequest::first(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Validation { .. }));
        assert!(err.to_string().contains("must not precede"));
    }

    #[tokio::test]
    async fn reversed_audit_date_range_is_a_validation_error() {
        let service = seeded_service().await;
        let now = Utc::now();
        let filter = AuditTrailFilter::new()
            .user("u-1")
            .from(now)
            .until(now - Duration::hours(1));

        let err = service
            .audit_trails(&filter, Sort::newest_first(), PageRequest::first(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Validation { .. }));
        assert!(err.to_string().contains("must not precede"));
    }

    #[tokio::test]
    async fn reversed_version_range_is_a_validation_error() {
        let service = seeded_service().await;
        let filter = EventLogFilter::new().versions(5, 2);

        let err = service
            .event_logs(&filter, Sort::newest_first(), PageRequest::first(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Validation { .. }));
    }

    #[tokio::test]
    async fn default_order_is_newest_first() {
        let service = seeded_service().await;
        let page = service
            .event_logs(
                &EventLogFilter::new(),
                Sort::newest_first(),
                PageRequest::first(10),
            )
            .await
            .unwrap();

        let names: Vec<&str> = page.items.iter().map(|r| r.message_type.as_str()).collect();
        assert_eq!(names, vec!["Third", "Second", "First"]);
        assert_eq!(page.total_count, 3);
    }

    #[tokio::test]
    async fn same_page_twice_returns_identical_results() {
        let service = seeded_service().await;
        let request = PageRequest::new(1, 2);

        let a = service
            .event_logs(&EventLogFilter::new(), Sort::newest_first(), request)
            .await
            .unwrap();
        let b = service
            .event_logs(&EventLogFilter::new(), Sort::newest_first(), request)
            .await
            .unwrap();

        let ids_a: Vec<&str> = a.items.iter().map(|r| r.id.as_str()).collect();
        let ids_b: Vec<&str> = b.items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(a.total_count, b.total_count);
    }

    #[tokio::test]
    async fn pagination_reports_total_and_bounds_size() {
        let service = seeded_service().await;
        let page = service
            .event_logs(
                &EventLogFilter::new(),
                Sort::newest_first(),
                PageRequest::new(2, 2),
            )
            .await
            .unwrap();

        assert_eq!(page.total_count, 3);
        assert_eq!(page.page_number, 2);
        assert_eq!(page.items.len(), 1);

        // Zero page size falls back to the configured default.
        let page = service
            .event_logs(
                &EventLogFilter::new(),
                Sort::newest_first(),
                PageRequest::new(1, 0),
            )
            .await
            .unwrap();
        assert_eq!(page.page_size, QueryConfig::default().default_page_size);
    }

    #[tokio::test]
    async fn version_range_is_inclusive() {
        let service = seeded_service().await;
        let page = service
            .event_logs(
                &EventLogFilter::new().versions(1, 2),
                Sort::newest_first(),
                PageRequest::first(10),
            )
            .await
            .unwrap();

        assert_eq!(page.total_count, 2);
        assert!(page
            .items
            .iter()
            .all(|r| matches!(r.aggregate_version, Some(1) | Some(2))));
    }

    #[tokio::test]
    async fn keyword_filters_on_searchable_fields() {
        let service = seeded_service().await;
        let page = service
            .event_logs(
                &EventLogFilter::new().keyword("second"),
                Sort::newest_first(),
                PageRequest::first(10),
            )
            .await
            .unwrap();

        assert_eq!(page.total_count, 1);
        assert_eq!(page.items[0].message_type, "Second");
    }

    #[test]
    fn sort_parsing_rejects_unknown_fields() {
        assert!(Sort::<EventSortField>::parse("timestamp desc").is_ok());
        assert!(Sort::<EventSortField>::parse("message_type").is_ok());

        let err = Sort::<EventSortField>::parse("data; drop table").unwrap_err();
        assert!(matches!(err, AuditError::Validation { .. }));

        let err = Sort::<AuditSortField>::parse("timestamp sideways").unwrap_err();
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn page_map_keeps_paging_info() {
        let page = Page {
            items: vec![1, 2, 3],
            total_count: 7,
            page_number: 2,
            page_size: 3,
        };
        let mapped = page.map(|n| n.to_string());
        assert_eq!(mapped.items, vec!["1", "2", "3"]);
        assert_eq!(mapped.total_count, 7);
        assert_eq!(mapped.page_number, 2);
    }
}
