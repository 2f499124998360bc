//! Hooks for failures the core isolates instead of propagating.
//!
//! Implemented by the telemetry crate; every method defaults to a no-op.

use crate::records::{ChangeRequestStatus, EventStatus, EventType};

pub trait FailureObserver: Send + Sync {
    fn event_published(&self, _event_type: EventType, _status: EventStatus) {}

    fn subscriber_failed(&self, _subscriber: &str, _event_type: EventType) {}

    fn audit_write_failed(&self, _class_name: &str) {}

    fn event_persist_failed(&self, _event_type: EventType) {}

    fn change_request_recorded(&self, _status: ChangeRequestStatus) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl FailureObserver for NoopObserver {}
