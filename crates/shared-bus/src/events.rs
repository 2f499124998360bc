//! # Event Filters
//!
//! Which domain events a subscription receives.

use serde::{Deserialize, Serialize};
use shared_types::{DomainEvent, EventStatus, EventType};

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Event types to include. Empty means all types.
    pub event_types: Vec<EventType>,
    /// Outcomes to include. Empty means every status.
    pub statuses: Vec<EventStatus>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn event_type(event_type: EventType) -> Self {
        Self::types(vec![event_type])
    }

    #[must_use]
    pub fn types(event_types: Vec<EventType>) -> Self {
        Self {
            event_types,
            statuses: Vec::new(),
        }
    }

    /// Restrict to events that finished with `status`.
    #[must_use]
    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.statuses.push(status);
        self
    }

    #[must_use]
    pub fn matches(&self, event: &DomainEvent) -> bool {
        let type_match =
            self.event_types.is_empty() || self.event_types.contains(&event.event_type);
        let status_match = self.statuses.is_empty() || self.statuses.contains(&event.event_status);
        type_match && status_match
    }

    /// Whether some event of `event_type` can match.
    #[must_use]
    pub fn covers(&self, event_type: EventType) -> bool {
        self.event_types.is_empty() || self.event_types.contains(&event_type)
    }
}
