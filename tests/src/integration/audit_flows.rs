//! # Audit Flows
//!
//! One audit record per flushed mutation, linked to the event of the
//! operation that caused it; nothing survives a rolled-back operation.

use gc_01_audit_trail::diff_partial;
use gc_02_event_tracker::{update_entity, EventScope};
use proptest::prelude::*;
use shared_types::{
    detail_keys, field_map, AuditOperation, AuditQuery, BudgetLineItemStatus, CoreError,
    EntityKey, EventStatus, EventType, FieldChange, FieldMap, FieldValue, HistoryType,
    UnitOfWork,
};

use super::fixtures::{budget_admin, World, CAN_ID};

fn can_key() -> EntityKey {
    EntityKey::new("CAN", CAN_ID)
}

#[test]
fn test_edit_writes_one_audit_record_linked_to_its_event() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let admin = budget_admin();
    let mut session = world.session(&admin);

    world
        .container
        .engine()
        .propose(
            &mut session,
            &can_key(),
            field_map! { "nickname" => "Evaluation" },
            &admin,
            None,
        )
        .unwrap();
    session.commit().unwrap();

    let records = world.db().audit_records(&AuditQuery::for_entity(can_key()));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation, AuditOperation::Updated);
    assert_eq!(records[0].created_by, admin.id);
    assert_eq!(
        records[0].changes.get("nickname"),
        Some(&FieldChange::new(
            Some(FieldValue::Null),
            Some(FieldValue::from("Evaluation"))
        ))
    );

    let event = world.db().event(records[0].linked_event_id.unwrap()).unwrap();
    assert_eq!(event.event_type, EventType::UpdateCan);
    assert_eq!(event.event_status, EventStatus::Success);
    assert_eq!(
        world.db().audit_records(&AuditQuery::for_event(event.id)).len(),
        1
    );
}

#[test]
fn test_failed_operation_leaves_no_audit_record() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let mut session = world.session(&budget_admin());

    let result: Result<(), CoreError> = EventScope::new(world.container.bus(), EventType::UpdateCan)
        .run(&mut session, |uow, details| {
            update_entity(uow, details, &can_key(), &field_map! { "nickname" => "Temp" })?;
            Err(CoreError::invalid("nickname", "rejected downstream"))
        });
    assert!(matches!(result, Err(CoreError::ValidationFailed(_))));
    session.commit().unwrap();

    assert!(world
        .db()
        .audit_records(&AuditQuery::for_entity(can_key()))
        .is_empty());
    assert_eq!(
        world.db().entity(&can_key()).unwrap().get("nickname"),
        Some(&FieldValue::Null)
    );

    let events = world.db().events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_status, EventStatus::Failed);
    assert_eq!(
        events[0].details.get(detail_keys::ERROR_TYPE),
        Some(&serde_json::json!("ValidationFailed"))
    );
    assert!(world
        .db()
        .history(&shared_types::HistoryQuery::for_subject(
            shared_types::SubjectRef::can(CAN_ID)
        ))
        .is_empty());
}

#[test]
fn test_audit_write_failure_does_not_fail_the_operation() {
    let world = World::new(BudgetLineItemStatus::Planned);
    world.db().faults().fail_audit_writes_for("CAN");
    let admin = budget_admin();
    let mut session = world.session(&admin);

    world
        .container
        .engine()
        .propose(
            &mut session,
            &can_key(),
            field_map! { "description" => "Evaluation funds" },
            &admin,
            None,
        )
        .unwrap();
    session.commit().unwrap();

    assert!(world
        .db()
        .audit_records(&AuditQuery::for_entity(can_key()))
        .is_empty());
    assert_eq!(
        world.db().entity(&can_key()).unwrap().get("description"),
        Some(&FieldValue::from("Evaluation funds"))
    );
    let history = world
        .db()
        .history(&shared_types::HistoryQuery::for_subject(
            shared_types::SubjectRef::can(CAN_ID),
        ));
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].history_type, HistoryType::CanDescriptionEdited);
}

fn optional_text() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), "[a-z]{1,8}".prop_map(Some)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_audited_changes_match_the_partial_diff(
        nickname in optional_text(),
        description in optional_text(),
    ) {
        let world = World::new(BudgetLineItemStatus::Planned);
        let admin = budget_admin();
        let before = world.db().entity(&can_key()).unwrap().fields;
        let requested: FieldMap = field_map! {
            "nickname" => nickname,
            "description" => description,
        };
        let expected = diff_partial(&before, &requested);

        let mut session = world.session(&admin);
        world
            .container
            .engine()
            .propose(&mut session, &can_key(), requested.clone(), &admin, None)
            .unwrap();
        session.commit().unwrap();

        let records = world.db().audit_records(&AuditQuery::for_entity(can_key()));
        if expected.is_empty() {
            prop_assert!(records.is_empty());
        } else {
            prop_assert_eq!(records.len(), 1);
            prop_assert_eq!(&records[0].changes, &expected);
        }
        let after = world.db().entity(&can_key()).unwrap();
        for (field, value) in &requested {
            prop_assert_eq!(after.get(field), Some(value));
        }
    }
}
