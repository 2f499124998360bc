//! # Service Container
//!
//! Wires the core together once at process start-up.
//!
//! ## Initialization Order
//!
//! ```text
//! 1. InMemoryDatabase   + AuditRecorder (session listener)
//! 2. BusBuilder         + history builders, frozen into DomainEventBus
//! 3. ChangeRequestEngine(gating policy, bus, reviewers, notifications)
//! ```
//!
//! The bus is immutable after step 2; sessions begun afterwards see the audit
//! recorder.

use std::sync::Arc;

use gc_01_audit_trail::AuditRecorder;
use gc_05_change_requests::{ChangeRequestEngine, StaticReviewerDirectory};
use grants_telemetry::MetricsObserver;
use shared_bus::{BusBuilder, DomainEventBus};
use shared_store::{InMemoryDatabase, Session};
use shared_types::{Actor, FailureObserver};
use tracing::{info, instrument};

use crate::container::config::{ConfigError, RuntimeConfig};

/// Everything a request handler needs to run core operations.
pub struct CoreContainer {
    config: RuntimeConfig,
    db: InMemoryDatabase,
    bus: Arc<DomainEventBus>,
    reviewers: Arc<StaticReviewerDirectory>,
    engine: ChangeRequestEngine,
}

impl CoreContainer {
    pub fn new(config: RuntimeConfig) -> Result<Self, ConfigError> {
        Self::with_database(config, InMemoryDatabase::new())
    }

    /// Wire the core over an existing store, e.g. one with a manual clock.
    #[instrument(skip_all, fields(service = %config.telemetry.service_name))]
    pub fn with_database(config: RuntimeConfig, db: InMemoryDatabase) -> Result<Self, ConfigError> {
        config.validate()?;
        let observer: Arc<dyn FailureObserver> = Arc::new(MetricsObserver);

        db.register_listener(Arc::new(
            AuditRecorder::new(config.audit.clone()).with_observer(Arc::clone(&observer)),
        ));

        let builder = BusBuilder::new().observer(Arc::clone(&observer));
        let bus = Arc::new(gc_03_derived_history::register(builder, config.history).build());
        info!(
            subscribers = bus.subscriber_count(),
            unhandled = bus.unhandled_event_types().len(),
            "Domain event bus frozen"
        );

        let reviewers = Arc::new(StaticReviewerDirectory::new());
        let engine = ChangeRequestEngine::new(config.gating.clone(), bus.clone())
            .with_reviewers(reviewers.clone())
            .with_observer(observer);
        info!(gate_rules = config.gating.rules().len(), "Change-request engine ready");

        Ok(Self {
            config,
            db,
            bus,
            reviewers,
            engine,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn db(&self) -> &InMemoryDatabase {
        &self.db
    }

    pub fn bus(&self) -> &DomainEventBus {
        &self.bus
    }

    pub fn engine(&self) -> &ChangeRequestEngine {
        &self.engine
    }

    /// Reviewer assignments consulted when a change request is created.
    pub fn reviewers(&self) -> &StaticReviewerDirectory {
        &self.reviewers
    }

    /// Open a transaction for one inbound operation.
    pub fn session(&self, actor: Option<Actor>) -> Session {
        self.db.begin(actor)
    }
}

impl std::fmt::Debug for CoreContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreContainer")
            .field("service", &self.config.telemetry.service_name)
            .field("subscribers", &self.bus.subscriber_count())
            .field("gate_rules", &self.config.gating.rules().len())
            .finish()
    }
}
