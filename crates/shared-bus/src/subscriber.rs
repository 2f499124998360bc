//! # Event Subscriber
//!
//! The receiving side of the bus.

use shared_types::{DomainEvent, SubscriberError, UnitOfWork};

/// A party reacting to published domain events.
///
/// Handlers run inside the publisher's unit of work and may write to it; they
/// must not commit.
pub trait EventSubscriber: Send + Sync {
    /// Name used in logs and failure metrics.
    fn name(&self) -> &str;

    fn handle(&self, event: &DomainEvent, uow: &mut dyn UnitOfWork)
        -> Result<(), SubscriberError>;
}

type Handler = dyn Fn(&DomainEvent, &mut dyn UnitOfWork) -> Result<(), SubscriberError>
    + Send
    + Sync;

/// Subscriber backed by a closure.
pub struct FnSubscriber {
    name: String,
    handler: Box<Handler>,
}

impl FnSubscriber {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&DomainEvent, &mut dyn UnitOfWork) -> Result<(), SubscriberError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            handler: Box::new(handler),
        }
    }
}

impl std::fmt::Debug for FnSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSubscriber")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl EventSubscriber for FnSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(
        &self,
        event: &DomainEvent,
        uow: &mut dyn UnitOfWork,
    ) -> Result<(), SubscriberError> {
        (self.handler)(event, uow)
    }
}
