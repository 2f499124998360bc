//! # History Flows
//!
//! Timelines derived from committed events, read back through the paginated
//! query.

use gc_03_derived_history::history_for;
use shared_bus::EventPublisher;
use shared_types::{
    field_map, AuditOperation, AuditQuery, BudgetLineItemStatus, EntityKey, EventStatus,
    EventType, HistoryQuery, HistoryType, SortOrder, SubjectRef, UnitOfWork,
};

use super::fixtures::{budget_admin, World, CAN_ID};

#[test]
fn test_deleting_funding_received_writes_audit_event_and_history() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let admin = budget_admin();
    let mut session = world.session(&admin);
    world
        .container
        .engine()
        .delete(&mut session, &world.funding, &admin)
        .unwrap();
    session.commit().unwrap();

    let audit = world
        .db()
        .audit_records(&AuditQuery::for_entity(world.funding.clone()));
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].operation, AuditOperation::Deleted);

    let events = world.db().events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::DeleteCanFundingReceived);
    assert_eq!(events[0].event_status, EventStatus::Success);
    assert_eq!(audit[0].linked_event_id, Some(events[0].id));

    let history = world.db().history(&HistoryQuery::for_subject(SubjectRef::can(CAN_ID)));
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].history_type, HistoryType::CanReceivedDeleted);
    assert_eq!(history[0].title, "Funding Received Deleted");
    assert_eq!(
        history[0].message,
        "Jane Doe deleted funding received for funding ID 5 in the amount of $500,000.00"
    );
    assert_eq!(history[0].event_id, events[0].id);
    assert_eq!(history[0].timestamp, events[0].created_on);
}

#[test]
fn test_redelivered_event_is_not_duplicated() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let admin = budget_admin();
    let mut session = world.session(&admin);
    world
        .container
        .engine()
        .delete(&mut session, &world.funding, &admin)
        .unwrap();
    session.commit().unwrap();

    let event = world.db().events().remove(0);
    let mut session = world.session(&admin);
    let report = world.container.bus().publish(&event, &mut session);
    assert!(report.is_clean());
    session.commit().unwrap();

    assert_eq!(
        world
            .db()
            .history(&HistoryQuery::for_subject(SubjectRef::can(CAN_ID)))
            .len(),
        1
    );
}

#[test]
fn test_can_timeline_pages_newest_first() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let admin = budget_admin();
    let can = EntityKey::new("CAN", CAN_ID);
    for requested in [
        field_map! { "nickname" => "Eval" },
        field_map! { "nickname" => "Evaluation" },
        field_map! { "description" => "Evaluation funds" },
    ] {
        let mut session = world.session(&admin);
        world
            .container
            .engine()
            .propose(&mut session, &can, requested, &admin, None)
            .unwrap();
        session.commit().unwrap();
    }

    let session = world.container.session(None);
    let first_page = history_for(&session, SubjectRef::can(CAN_ID), 0, 2, SortOrder::Descending)
        .unwrap();
    let types: Vec<_> = first_page.iter().map(|entry| entry.history_type).collect();
    assert_eq!(
        types,
        vec![HistoryType::CanDescriptionEdited, HistoryType::CanNicknameEdited]
    );
    assert!(first_page[0].timestamp > first_page[1].timestamp);

    let second_page = history_for(&session, SubjectRef::can(CAN_ID), 2, 2, SortOrder::Descending)
        .unwrap();
    assert_eq!(second_page.len(), 1);

    let oldest = history_for(&session, SubjectRef::can(CAN_ID), 0, 1, SortOrder::Ascending)
        .unwrap();
    assert!(oldest[0].message.contains("Eval"));
}
