//! Post-commit, in-process event notification.

use crate::event::EventLogRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Error type handlers report back to the dispatcher.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// An in-process subscriber for one concrete event type.
///
/// Handlers run only after the owning unit of work has committed; they
/// log or update read models but can no longer influence the request.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// The event type this handler subscribes to.
    fn message_type(&self) -> &str;

    /// React to one event. Errors are logged by the dispatcher, never
    /// propagated.
    async fn handle(&self, record: EventLogRecord) -> Result<(), HandlerError>;
}

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Upper bound on a single handler invocation.
    pub handler_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(5),
        }
    }
}

/// Builder assembling the handler registry at startup.
#[derive(Default)]
pub struct EventDispatcherBuilder {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
    config: DispatcherConfig,
}

impl EventDispatcherBuilder {
    /// Register a handler under its declared message type.
    pub fn register<H: EventHandler>(self, handler: H) -> Self {
        self.register_arc(Arc::new(handler))
    }

    /// Register an already-shared handler.
    pub fn register_arc(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers
            .entry(handler.message_type().to_string())
            .or_default()
            .push(handler);
        self
    }

    /// Override the dispatcher configuration.
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Finish building; the registry is immutable afterwards.
    pub fn build(self) -> EventDispatcher {
        EventDispatcher {
            handlers: self.handlers,
            config: self.config,
        }
    }
}

/// Delivers committed events to registered in-process handlers.
///
/// The registry is built once at startup and never mutated at request
/// time. Events are submitted in the order they were collected; each
/// handler invocation runs in its own task under a bounded timeout, so a
/// slow or failing handler cannot stall its siblings or the caller.
pub struct EventDispatcher {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
    config: DispatcherConfig,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        EventDispatcherBuilder::default().build()
    }
}

impl EventDispatcher {
    /// Start building a dispatcher.
    pub fn builder() -> EventDispatcherBuilder {
        EventDispatcherBuilder::default()
    }

    /// Number of handlers registered for a message type.
    pub fn handler_count(&self, message_type: &str) -> usize {
        self.handlers.get(message_type).map_or(0, Vec::len)
    }

    fn spawn_all(&self, records: Vec<EventLogRecord>) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        for record in records {
            let Some(handlers) = self.handlers.get(&record.message_type) else {
                continue;
            };
            for handler in handlers {
                let handler = Arc::clone(handler);
                let record = record.clone();
                let timeout = self.config.handler_timeout;
                tasks.push(tokio::spawn(async move {
                    run_handler(handler, record, timeout).await;
                }));
            }
        }
        tasks
    }

    /// Deliver events to their handlers, fire-and-forget.
    ///
    /// Returns as soon as every invocation has been spawned; handler
    /// failures are logged and never reach the caller.
    pub fn dispatch(&self, records: Vec<EventLogRecord>) {
        let tasks = self.spawn_all(records);
        tracing::debug!(tasks = tasks.len(), "dispatched committed events");
    }

    /// Deliver events and wait for every handler to finish. Test variant;
    /// failure semantics are identical to [`EventDispatcher::dispatch`].
    pub async fn dispatch_and_wait(&self, records: Vec<EventLogRecord>) {
        for task in self.spawn_all(records) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "event handler task aborted");
            }
        }
    }
}

async fn run_handler(handler: Arc<dyn EventHandler>, record: EventLogRecord, timeout: Duration) {
    let message_type = record.message_type.clone();
    let event_id = record.id.clone();
    match tokio::time::timeout(timeout, handler.handle(record)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(
                message_type = %message_type,
                event_id = %event_id,
                error = %e,
                "event handler failed"
            );
        }
        Err(_) => {
            tracing::warn!(
                message_type = %message_type,
                event_id = %event_id,
                timeout_ms = timeout.as_millis() as u64,
                "event handler timed out"
            );
        }
    }
}
