//! # Bus Isolation
//!
//! Failing or panicking subscribers never fail the publishing operation and
//! never stop the other subscribers.

use gc_02_event_tracker::{delete_entity, EventScope};
use gc_03_derived_history::HistoryConfig;
use shared_bus::{BusBuilder, DomainEventBus, EventFilter};
use shared_types::{
    AuditQuery, BudgetLineItemStatus, EventStatus, EventType, HistoryQuery, HistoryType,
    SubjectRef, SubscriberError, UnitOfWork,
};

use super::fixtures::{budget_admin, World, CAN_ID};

fn bus_with_broken_subscribers() -> DomainEventBus {
    let builder = BusBuilder::new()
        .subscribe_fn(EventFilter::all(), "broken", |_, _| {
            Err(SubscriberError::failed("broken", "downstream unavailable"))
        })
        .subscribe_fn(
            EventFilter::event_type(EventType::DeleteCanFundingReceived),
            "panicky",
            |_, _| panic!("subscriber bug"),
        );
    gc_03_derived_history::register(builder, HistoryConfig::default()).build()
}

#[test]
fn test_two_failing_subscribers_do_not_block_the_third() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let bus = bus_with_broken_subscribers();
    let mut session = world.session(&budget_admin());

    let outcome = EventScope::new(&bus, EventType::DeleteCanFundingReceived).run_tracked(
        &mut session,
        |uow, details| delete_entity(uow, details, &world.funding),
    );
    assert!(outcome.result.is_ok());
    assert!(outcome.persisted);
    assert_eq!(outcome.report.failures.len(), 2);
    assert!(matches!(
        outcome.report.failures[1],
        SubscriberError::Panicked { .. }
    ));
    assert_eq!(outcome.report.delivered, vec!["can-history".to_string()]);
    session.commit().unwrap();

    assert!(world.db().entity(&world.funding).is_none());
    assert_eq!(
        world
            .db()
            .audit_records(&AuditQuery::for_entity(world.funding.clone()))
            .len(),
        1
    );
    let history = world.db().history(&HistoryQuery::for_subject(SubjectRef::can(CAN_ID)));
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].history_type, HistoryType::CanReceivedDeleted);
    assert_eq!(world.db().events()[0].event_status, EventStatus::Success);
}

#[test]
fn test_event_is_published_when_its_row_cannot_be_written() {
    let world = World::new(BudgetLineItemStatus::Planned);
    world.db().faults().fail_event_writes();
    let mut session = world.session(&budget_admin());

    let outcome = EventScope::new(world.container.bus(), EventType::DeleteCanFundingReceived)
        .run_tracked(&mut session, |uow, details| {
            delete_entity(uow, details, &world.funding)
        });
    assert!(outcome.result.is_ok());
    assert!(!outcome.persisted);
    assert!(outcome.report.is_clean());
    session.commit().unwrap();

    assert!(world.db().events().is_empty());
    let history = world.db().history(&HistoryQuery::for_subject(SubjectRef::can(CAN_ID)));
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].event_id, outcome.event.id);
}

#[test]
fn test_failed_operation_still_reaches_subscribers() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let bus = bus_with_broken_subscribers();
    let mut session = world.session(&budget_admin());

    let missing = shared_types::EntityKey::new("CANFundingReceived", 404);
    let outcome = EventScope::new(&bus, EventType::DeleteCanFundingReceived)
        .run_tracked(&mut session, |uow, details| delete_entity(uow, details, &missing));
    assert!(outcome.result.is_err());
    assert_eq!(outcome.event.event_status, EventStatus::Failed);
    // history builders only take successful events
    assert_eq!(outcome.report.failures.len(), 2);
    assert!(outcome.report.delivered.is_empty());
    session.commit().unwrap();

    assert_eq!(world.db().events().len(), 1);
    assert!(world
        .db()
        .history(&HistoryQuery::for_subject(SubjectRef::can(CAN_ID)))
        .is_empty());
}
