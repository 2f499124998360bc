//! # Event Publisher
//!
//! Defines the publishing side of the event bus and the frozen registry.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use shared_types::{
    DomainEvent, EventType, FailureObserver, NoopObserver, SubscriberError, UnitOfWork,
};
use tracing::{debug, error, warn};

use crate::events::EventFilter;
use crate::subscriber::{EventSubscriber, FnSubscriber};

/// Trait for publishing domain events.
pub trait EventPublisher: Send + Sync {
    /// Dispatch `event` to every matching subscriber inside `uow`.
    ///
    /// Never fails; subscriber failures are reported in the returned
    /// [`PublishReport`] and in the logs.
    fn publish(&self, event: &DomainEvent, uow: &mut dyn UnitOfWork) -> PublishReport;

    /// Total events published.
    fn events_published(&self) -> u64;
}

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that handled the event, in dispatch order.
    pub delivered: Vec<String>,
    /// Subscribers that failed or panicked, in dispatch order.
    pub failures: Vec<SubscriberError>,
}

impl PublishReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failures.len()
    }
}

struct Registration {
    filter: EventFilter,
    subscriber: Arc<dyn EventSubscriber>,
}

/// Registers subscribers during process wiring.
pub struct BusBuilder {
    registrations: Vec<Registration>,
    observer: Arc<dyn FailureObserver>,
}

impl BusBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Report subscriber failures and publications to `observer`.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn FailureObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn subscribe(mut self, filter: EventFilter, subscriber: Arc<dyn EventSubscriber>) -> Self {
        debug!(
            subscriber = subscriber.name(),
            event_types = ?filter.event_types,
            "Subscriber registered"
        );
        self.registrations.push(Registration { filter, subscriber });
        self
    }

    #[must_use]
    pub fn subscribe_fn<F>(self, filter: EventFilter, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&DomainEvent, &mut dyn UnitOfWork) -> Result<(), SubscriberError>
            + Send
            + Sync
            + 'static,
    {
        self.subscribe(filter, Arc::new(FnSubscriber::new(name, handler)))
    }

    /// Freeze the registry.
    #[must_use]
    pub fn build(self) -> DomainEventBus {
        DomainEventBus {
            registrations: self.registrations,
            observer: self.observer,
            events_published: AtomicU64::new(0),
        }
    }
}

impl Default for BusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Synchronous in-process bus with a read-only registry.
pub struct DomainEventBus {
    registrations: Vec<Registration>,
    observer: Arc<dyn FailureObserver>,
    events_published: AtomicU64,
}

impl DomainEventBus {
    #[must_use]
    pub fn builder() -> BusBuilder {
        BusBuilder::new()
    }

    /// A bus with no subscribers.
    #[must_use]
    pub fn empty() -> Self {
        BusBuilder::new().build()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registrations.len()
    }

    /// Names of the subscribers that could receive `event_type`, in dispatch
    /// order.
    #[must_use]
    pub fn subscribers_for(&self, event_type: EventType) -> Vec<&str> {
        self.registrations
            .iter()
            .filter(|r| r.filter.covers(event_type))
            .map(|r| r.subscriber.name())
            .collect()
    }

    /// Event types no subscriber is registered for.
    #[must_use]
    pub fn unhandled_event_types(&self) -> Vec<EventType> {
        EventType::ALL
            .iter()
            .copied()
            .filter(|t| !self.registrations.iter().any(|r| r.filter.covers(*t)))
            .collect()
    }
}

impl EventPublisher for DomainEventBus {
    fn publish(&self, event: &DomainEvent, uow: &mut dyn UnitOfWork) -> PublishReport {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.observer
            .event_published(event.event_type, event.event_status);

        let mut report = PublishReport::default();
        for registration in &self.registrations {
            if !registration.filter.matches(event) {
                continue;
            }
            let subscriber = registration.subscriber.as_ref();
            let name = subscriber.name().to_string();

            let outcome = catch_unwind(AssertUnwindSafe(|| subscriber.handle(event, &mut *uow)));
            let failure = match outcome {
                Ok(Ok(())) => {
                    report.delivered.push(name);
                    continue;
                }
                Ok(Err(e)) => e,
                Err(payload) => SubscriberError::Panicked {
                    subscriber: name.clone(),
                    message: panic_message(payload.as_ref()),
                },
            };

            error!(
                event_id = %event.id,
                event_type = %event.event_type,
                subscriber = %name,
                error = %failure,
                "Subscriber failed; continuing with remaining subscribers"
            );
            self.observer.subscriber_failed(&name, event.event_type);
            report.failures.push(failure);
        }

        if report.attempted() == 0 {
            warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                "Event published with no matching subscribers"
            );
        } else {
            debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                delivered = report.delivered.len(),
                failed = report.failures.len(),
                "Event published"
            );
        }
        report
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
