//! Prometheus metrics for the grants core.
//!
//! All metrics follow the naming convention: `gc_<component>_<metric>_total`

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, Opts, Registry, TextEncoder};
use shared_types::{ChangeRequestStatus, EventStatus, EventType, FailureObserver};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Domain events published, by type and outcome
    pub static ref EVENTS_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("gc_bus_events_published_total", "Domain events published"),
        &["event_type", "status"]
    ).expect("metric creation failed");

    /// Bus subscribers that failed or panicked
    pub static ref SUBSCRIBER_FAILURES: CounterVec = CounterVec::new(
        Opts::new("gc_bus_subscriber_failures_total", "Subscriber failures isolated by the bus"),
        &["subscriber", "event_type"]
    ).expect("metric creation failed");

    /// Audit records that could not be written
    pub static ref AUDIT_WRITE_FAILURES: CounterVec = CounterVec::new(
        Opts::new("gc_audit_write_failures_total", "Audit record writes that failed"),
        &["class_name"]
    ).expect("metric creation failed");

    /// Domain events that could not be persisted
    pub static ref EVENT_PERSIST_FAILURES: CounterVec = CounterVec::new(
        Opts::new("gc_events_persist_failures_total", "Domain event rows that failed to persist"),
        &["event_type"]
    ).expect("metric creation failed");

    /// Change requests created (IN_REVIEW) and resolved (APPROVED/REJECTED)
    pub static ref CHANGE_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("gc_change_requests_total", "Change requests by resulting status"),
        &["status"]
    ).expect("metric creation failed");
}

/// Register every metric with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(SUBSCRIBER_FAILURES.clone()),
        Box::new(AUDIT_WRITE_FAILURES.clone()),
        Box::new(EVENT_PERSIST_FAILURES.clone()),
        Box::new(CHANGE_REQUESTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn render_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Feeds the counters from core failure hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl FailureObserver for MetricsObserver {
    fn event_published(&self, event_type: EventType, status: EventStatus) {
        EVENTS_PUBLISHED
            .with_label_values(&[event_type.as_str(), status.as_str()])
            .inc();
    }

    fn subscriber_failed(&self, subscriber: &str, event_type: EventType) {
        SUBSCRIBER_FAILURES
            .with_label_values(&[subscriber, event_type.as_str()])
            .inc();
    }

    fn audit_write_failed(&self, class_name: &str) {
        AUDIT_WRITE_FAILURES.with_label_values(&[class_name]).inc();
    }

    fn event_persist_failed(&self, event_type: EventType) {
        EVENT_PERSIST_FAILURES
            .with_label_values(&[event_type.as_str()])
            .inc();
    }

    fn change_request_recorded(&self, status: ChangeRequestStatus) {
        CHANGE_REQUESTS.with_label_values(&[status.as_str()]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_is_idempotent() {
        register_metrics().unwrap();
        register_metrics().unwrap();
    }

    #[test]
    fn test_observer_feeds_counters() {
        let observer = MetricsObserver;
        let before = AUDIT_WRITE_FAILURES.with_label_values(&["CAN"]).get();
        observer.audit_write_failed("CAN");
        assert_eq!(AUDIT_WRITE_FAILURES.with_label_values(&["CAN"]).get(), before + 1.0);

        observer.subscriber_failed("can-history", EventType::DeleteCan);
        assert!(
            SUBSCRIBER_FAILURES
                .with_label_values(&["can-history", "DELETE_CAN"])
                .get()
                >= 1.0
        );
    }

    #[test]
    fn test_render_contains_registered_counters() {
        register_metrics().unwrap();
        MetricsObserver.change_request_recorded(ChangeRequestStatus::InReview);
        let text = render_metrics().unwrap();
        assert!(text.contains("gc_change_requests_total"));
        assert!(text.contains("status=\"IN_REVIEW\""));
    }
}
