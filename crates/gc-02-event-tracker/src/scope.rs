//! # Event Scope

use std::sync::Arc;

use serde_json::json;
use shared_bus::{EventPublisher, PublishReport};
use shared_types::{
    detail_keys, CoreError, CoreResult, DomainEvent, EventDetails, EventStatus, EventType,
    FailureObserver, FieldMap, NoopObserver, UnitOfWork,
};
use tracing::{debug, error, info_span, warn};
use uuid::Uuid;

/// Everything a finished scope produced.
#[derive(Debug)]
pub struct TrackedOutcome<T> {
    /// The operation's own result.
    pub result: CoreResult<T>,
    pub event: DomainEvent,
    /// Whether the event row was written.
    pub persisted: bool,
    pub report: PublishReport,
}

/// Wraps one logical operation so it emits exactly one domain event.
pub struct EventScope<'a> {
    publisher: &'a dyn EventPublisher,
    event_type: EventType,
    request: Option<serde_json::Value>,
    observer: Arc<dyn FailureObserver>,
}

impl<'a> EventScope<'a> {
    pub fn new(publisher: &'a dyn EventPublisher, event_type: EventType) -> Self {
        Self {
            publisher,
            event_type,
            request: None,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Snapshot of the inbound request, recorded under `request`.
    #[must_use]
    pub fn with_request(mut self, request: serde_json::Value) -> Self {
        self.request = Some(request);
        self
    }

    #[must_use]
    pub fn with_request_fields(self, fields: &FieldMap) -> Self {
        let request: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        self.with_request(serde_json::Value::Object(request))
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn FailureObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run `operation` and return its result unchanged.
    pub fn run<T, F>(self, uow: &mut dyn UnitOfWork, operation: F) -> CoreResult<T>
    where
        F: FnOnce(&mut dyn UnitOfWork, &mut EventDetails) -> CoreResult<T>,
    {
        self.run_tracked(uow, operation).result
    }

    pub fn run_tracked<T, F>(self, uow: &mut dyn UnitOfWork, operation: F) -> TrackedOutcome<T>
    where
        F: FnOnce(&mut dyn UnitOfWork, &mut EventDetails) -> CoreResult<T>,
    {
        let event_id = Uuid::new_v4();
        let span = info_span!("event_scope", event_id = %event_id, event_type = %self.event_type);
        let _guard = span.enter();

        let previous = uow.set_event_context(Some(event_id));
        let mut details = self.initial_details(uow);
        let savepoint = uow.savepoint();

        let mut result = operation(&mut *uow, &mut details);
        if result.is_ok() {
            if let Err(e) = uow.flush() {
                result = Err(e);
            }
        }

        let event_status = match &result {
            Ok(_) => {
                uow.release(savepoint);
                EventStatus::Success
            }
            Err(e) => {
                // Only this operation's work; earlier scopes in the session stand.
                uow.rollback_to(savepoint);
                details.insert_value(detail_keys::ERROR_TYPE, json!(e.kind()));
                details.insert_value(detail_keys::ERROR_MESSAGE, json!(e.to_string()));
                warn!(error_type = e.kind(), error = %e, "Operation failed");
                EventStatus::Failed
            }
        };

        let event = DomainEvent {
            id: event_id,
            event_type: self.event_type,
            event_status,
            created_by: uow.current_actor_id(),
            created_on: uow.now(),
            details,
        };

        let persisted = match uow.insert_event(event.clone()) {
            Ok(()) => true,
            Err(e) => {
                self.report_persist_failure(&event, &e);
                false
            }
        };

        let report = self.publisher.publish(&event, &mut *uow);
        if let Err(e) = uow.flush() {
            error!(error = %e, "Flush after publish failed");
        }

        uow.set_event_context(previous);
        debug!(status = ?event_status, persisted, "Event scope closed");

        TrackedOutcome {
            result,
            event,
            persisted,
            report,
        }
    }

    fn initial_details(&self, uow: &dyn UnitOfWork) -> EventDetails {
        let mut details = EventDetails::new();
        let user = match uow.current_actor() {
            Some(actor) => json!({ "id": actor.id.0, "full_name": actor.display_name() }),
            None => json!({ "id": uow.current_actor_id().0, "full_name": null }),
        };
        details.insert_value(detail_keys::USER, user);
        if let Some(request) = &self.request {
            details.insert_value(detail_keys::REQUEST, request.clone());
        }
        details
    }

    fn report_persist_failure(&self, event: &DomainEvent, error: &CoreError) {
        error!(
            event_id = %event.id,
            event_type = %event.event_type,
            status = ?event.event_status,
            error = %error,
            "Failed to persist domain event"
        );
        self.observer.event_persist_failed(event.event_type);
    }
}
