//! # History Builders
//!
//! Bus subscribers writing [`DerivedHistoryEntry`] rows.

use std::sync::Arc;

use shared_bus::{BusBuilder, EventFilter, EventSubscriber};
use shared_types::{
    CoreResult, DerivedHistoryEntry, DomainEvent, EventStatus, EventType, HistoryQuery,
    SortOrder, SubjectRef, SubscriberError, UnitOfWork,
};
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::HistoryConfig;
use crate::domain::{agreement, can, HistoryDraft};
use crate::facts::EventFacts;

type DraftFn = fn(EventType, &EventFacts) -> CoreResult<Vec<HistoryDraft>>;

/// Gather facts, draft entries and write the ones not already present.
///
/// The drafts of one event land together or not at all.
fn build(
    name: &str,
    config: &HistoryConfig,
    draft: DraftFn,
    event: &DomainEvent,
    uow: &mut dyn UnitOfWork,
) -> Result<(), SubscriberError> {
    let facts =
        EventFacts::gather(event, &*uow).map_err(|e| SubscriberError::failed(name, e))?;
    let drafts = draft(event.event_type, &facts).map_err(|e| SubscriberError::failed(name, e))?;

    let savepoint = uow.savepoint();
    for draft in drafts {
        if let Err(e) = write(config, event, draft, uow) {
            uow.rollback_to(savepoint);
            error!(
                subscriber = name,
                event_id = %event.id,
                error = %e,
                "History entry write failed; event timeline discarded"
            );
            return Err(SubscriberError::failed(name, e));
        }
    }
    uow.release(savepoint);
    Ok(())
}

fn write(
    config: &HistoryConfig,
    event: &DomainEvent,
    draft: HistoryDraft,
    uow: &mut dyn UnitOfWork,
) -> CoreResult<()> {
    if config.deduplicate && uow.history_exists(event.id, draft.subject, draft.history_type)? {
        debug!(
            event_id = %event.id,
            subject = %draft.subject,
            history_type = ?draft.history_type,
            "History entry already written"
        );
        return Ok(());
    }
    uow.insert_history(DerivedHistoryEntry {
        id: Uuid::new_v4(),
        subject: draft.subject,
        event_id: event.id,
        history_type: draft.history_type,
        title: draft.title,
        message: draft.message,
        timestamp: event.created_on,
    })
}

/// Timeline of a CAN: the fund, its budgets and funding received.
#[derive(Debug, Clone, Default)]
pub struct CanHistoryBuilder {
    config: HistoryConfig,
}

impl CanHistoryBuilder {
    pub fn new(config: HistoryConfig) -> Self {
        Self { config }
    }

    pub fn filter() -> EventFilter {
        EventFilter::types(can::EVENT_TYPES.to_vec()).with_status(EventStatus::Success)
    }
}

impl EventSubscriber for CanHistoryBuilder {
    fn name(&self) -> &str {
        "can-history"
    }

    fn handle(
        &self,
        event: &DomainEvent,
        uow: &mut dyn UnitOfWork,
    ) -> Result<(), SubscriberError> {
        build(self.name(), &self.config, can::drafts, event, uow)
    }
}

/// Timeline of an agreement: the agreement, its budget lines and change
/// requests.
#[derive(Debug, Clone, Default)]
pub struct AgreementHistoryBuilder {
    config: HistoryConfig,
}

impl AgreementHistoryBuilder {
    pub fn new(config: HistoryConfig) -> Self {
        Self { config }
    }

    pub fn filter() -> EventFilter {
        EventFilter::types(agreement::EVENT_TYPES.to_vec()).with_status(EventStatus::Success)
    }
}

impl EventSubscriber for AgreementHistoryBuilder {
    fn name(&self) -> &str {
        "agreement-history"
    }

    fn handle(
        &self,
        event: &DomainEvent,
        uow: &mut dyn UnitOfWork,
    ) -> Result<(), SubscriberError> {
        build(self.name(), &self.config, agreement::drafts, event, uow)
    }
}

/// Register both history builders.
pub fn register(builder: BusBuilder, config: HistoryConfig) -> BusBuilder {
    builder
        .subscribe(
            CanHistoryBuilder::filter(),
            Arc::new(CanHistoryBuilder::new(config)),
        )
        .subscribe(
            AgreementHistoryBuilder::filter(),
            Arc::new(AgreementHistoryBuilder::new(config)),
        )
}

/// History of `subject`, paginated and ordered by timestamp.
pub fn history_for(
    uow: &dyn UnitOfWork,
    subject: SubjectRef,
    offset: usize,
    limit: usize,
    order: SortOrder,
) -> CoreResult<Vec<DerivedHistoryEntry>> {
    uow.history(&HistoryQuery::for_subject(subject).page(offset, limit).order(order))
}
