//! # Change-Request Flows
//!
//! Gated edits are held for review; resolving a request applies or discards
//! the held diff exactly once and tells the requestor.

use gc_02_event_tracker::EventScope;
use gc_05_change_requests::ProposalOutcome;
use serde_json::json;
use shared_types::{
    field_map, AuditQuery, BudgetLineItemStatus, ChangeRequest, ChangeRequestStatus, CoreError,
    DomainEvent, EventStatus, EventType, FieldChange, FieldValue, HistoryQuery, HistoryType,
    ReviewDecision, SubjectRef, UnitOfWork,
};
use uuid::Uuid;

use super::fixtures::{requestor, reviewer, World, AGREEMENT_ID, REQUESTOR, REVIEWER};

fn propose(world: &World, requested: shared_types::FieldMap) -> ChangeRequest {
    let actor = requestor();
    let mut session = world.session(&actor);
    let outcome = world
        .container
        .engine()
        .propose(&mut session, &world.line_item, requested, &actor, None)
        .unwrap();
    session.commit().unwrap();
    assert!(outcome.is_pending());
    outcome.change_requests()[0].clone()
}

fn event_trail(events: &[DomainEvent]) -> Vec<(EventType, EventStatus)> {
    events
        .iter()
        .map(|event| (event.event_type, event.event_status))
        .collect()
}

fn resolve(
    world: &World,
    request: &ChangeRequest,
    decision: ReviewDecision,
    notes: Option<&str>,
) -> Result<ChangeRequest, CoreError> {
    let reviewer = reviewer();
    let mut session = world.session(&reviewer);
    let resolved = world.container.engine().resolve(
        &mut session,
        request.id,
        decision,
        &reviewer,
        notes.map(str::to_string),
    );
    session.commit()?;
    resolved
}

#[test]
fn test_amount_change_is_held_then_applied_on_approval() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let request = propose(&world, field_map! { "amount" => 500 });

    assert_eq!(request.status, ChangeRequestStatus::InReview);
    assert_eq!(request.created_by, REQUESTOR);
    let session = world.container.session(None);
    let open = world
        .container
        .engine()
        .in_review_for(&session, &world.line_item)
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, request.id);
    assert_eq!(world.line_item_field("amount"), Some(FieldValue::Int(100)));
    let to_reviewer = world.db().notifications_for(REVIEWER);
    assert_eq!(to_reviewer.len(), 1);
    assert_eq!(to_reviewer[0].title, "Change Request Awaiting Review");

    let resolved = resolve(&world, &request, ReviewDecision::Approved, None).unwrap();
    assert_eq!(resolved.status, ChangeRequestStatus::Approved);
    assert_eq!(resolved.reviewed_by, Some(REVIEWER));
    assert_eq!(world.line_item_field("amount"), Some(FieldValue::Int(500)));
    assert!(world
        .container
        .engine()
        .in_review_for(&world.container.session(None), &world.line_item)
        .unwrap()
        .is_empty());

    let to_requestor = world.db().notifications_for(REQUESTOR);
    assert_eq!(to_requestor.len(), 1);
    assert_eq!(to_requestor[0].title, "Change Request Approved");
    assert_eq!(
        to_requestor[0].message,
        "Your change request for budget line 15 was approved: Amount from $100.00 to $500.00."
    );

    let timeline: Vec<HistoryType> = world
        .db()
        .history(&HistoryQuery::for_subject(SubjectRef::agreement(AGREEMENT_ID)))
        .into_iter()
        .map(|entry| entry.history_type)
        .collect();
    assert!(timeline.contains(&HistoryType::ChangeRequestCreated));
    assert!(timeline.contains(&HistoryType::ChangeRequestApproved));
}

#[test]
fn test_rejection_keeps_the_value_and_notifies_the_requestor() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let request = propose(&world, field_map! { "amount" => 500 });

    let resolved = resolve(
        &world,
        &request,
        ReviewDecision::Rejected,
        Some("Over the FY25 ceiling"),
    )
    .unwrap();
    assert_eq!(resolved.status, ChangeRequestStatus::Rejected);
    assert_eq!(world.line_item_field("amount"), Some(FieldValue::Int(100)));
    assert!(world
        .db()
        .audit_records(&AuditQuery::for_entity(world.line_item.clone()))
        .is_empty());

    let to_requestor = world.db().notifications_for(REQUESTOR);
    assert_eq!(to_requestor.len(), 1);
    assert_eq!(to_requestor[0].title, "Change Request Declined");
    assert_eq!(
        to_requestor[0].message,
        "Your change request for budget line 15 was declined: Amount from $100.00 to $500.00. \
         Notes: Over the FY25 ceiling"
    );
    assert_eq!(to_requestor[0].change_request_id, Some(request.id));
}

#[test]
fn test_draft_to_planned_is_applied_with_one_audit_record() {
    let world = World::new(BudgetLineItemStatus::Draft);
    let request = propose(&world, field_map! { "status" => BudgetLineItemStatus::Planned });
    assert_eq!(request.gate, "line-item-status");
    assert_eq!(world.line_item_field("status"), Some(FieldValue::from("DRAFT")));

    resolve(&world, &request, ReviewDecision::Approved, None).unwrap();

    assert_eq!(world.line_item_field("status"), Some(FieldValue::from("PLANNED")));
    let audit = world
        .db()
        .audit_records(&AuditQuery::for_entity(world.line_item.clone()));
    assert_eq!(audit.len(), 1);
    assert_eq!(
        audit[0].changes.get("status"),
        Some(&FieldChange::new(
            Some(FieldValue::from("DRAFT")),
            Some(FieldValue::from("PLANNED"))
        ))
    );
    let event = world.db().event(audit[0].linked_event_id.unwrap()).unwrap();
    assert_eq!(event.event_type, EventType::UpdateBli);
}

#[test]
fn test_resolved_request_cannot_be_resolved_again() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let request = propose(&world, field_map! { "amount" => 500 });
    resolve(&world, &request, ReviewDecision::Approved, None).unwrap();

    let err = resolve(&world, &request, ReviewDecision::Rejected, None).unwrap_err();
    assert!(matches!(err, CoreError::IllegalStateTransition { .. }));
    assert_eq!(err.http_status(), 409);

    let stored = world.db().change_request(request.id).unwrap();
    assert_eq!(stored.status, ChangeRequestStatus::Approved);
    assert_eq!(world.line_item_field("amount"), Some(FieldValue::Int(500)));

    let statuses: Vec<EventStatus> = world
        .db()
        .events()
        .into_iter()
        .filter(|event| event.event_type == EventType::UpdateChangeRequest)
        .map(|event| event.event_status)
        .collect();
    assert_eq!(statuses.len(), 2);
    assert!(statuses.contains(&EventStatus::Success));
    assert!(statuses.contains(&EventStatus::Failed));
}

#[test]
fn test_concurrent_resolutions_let_only_one_commit() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let request = propose(&world, field_map! { "amount" => 500 });
    let reviewer = reviewer();
    let engine = world.container.engine();

    let mut first = world.session(&reviewer);
    let mut second = world.session(&reviewer);
    engine
        .resolve(&mut first, request.id, ReviewDecision::Approved, &reviewer, None)
        .unwrap();
    engine
        .resolve(&mut second, request.id, ReviewDecision::Rejected, &reviewer, None)
        .unwrap();

    first.commit().unwrap();
    let err = second.commit().unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    assert_eq!(
        world.db().change_request(request.id).unwrap().status,
        ChangeRequestStatus::Approved
    );
    assert_eq!(world.db().notifications_for(REQUESTOR).len(), 1);
}

#[test]
fn test_ungated_field_applies_without_review() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let actor = requestor();
    let mut session = world.session(&actor);

    let outcome = world
        .container
        .engine()
        .propose(
            &mut session,
            &world.line_item,
            field_map! { "line_description" => "Year 1 evaluation" },
            &actor,
            None,
        )
        .unwrap();
    session.commit().unwrap();

    assert!(matches!(outcome, ProposalOutcome::Applied { .. }));
    assert!(world.db().notifications_for(REVIEWER).is_empty());
    assert_eq!(
        world.line_item_field("line_description"),
        Some(FieldValue::from("Year 1 evaluation"))
    );
}

#[test]
fn test_second_resolution_in_same_session_keeps_the_first() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let request = propose(&world, field_map! { "amount" => 500 });
    let reviewer = reviewer();
    let engine = world.container.engine();
    let mut session = world.session(&reviewer);

    let approved = engine
        .resolve(&mut session, request.id, ReviewDecision::Approved, &reviewer, None)
        .unwrap();
    assert_eq!(approved.status, ChangeRequestStatus::Approved);
    let err = engine
        .resolve(&mut session, request.id, ReviewDecision::Rejected, &reviewer, None)
        .unwrap_err();
    assert!(matches!(err, CoreError::IllegalStateTransition { .. }));
    session.commit().unwrap();

    assert_eq!(
        world.db().change_request(request.id).unwrap().status,
        ChangeRequestStatus::Approved
    );
    assert_eq!(world.line_item_field("amount"), Some(FieldValue::Int(500)));
    assert_eq!(
        world
            .db()
            .audit_records(&AuditQuery::for_entity(world.line_item.clone()))
            .len(),
        1
    );
    assert_eq!(world.db().notifications_for(REQUESTOR).len(), 1);

    let resolutions: Vec<_> = event_trail(&world.db().events())
        .into_iter()
        .filter(|(event_type, _)| *event_type != EventType::CreateChangeRequest)
        .collect();
    assert_eq!(
        resolutions,
        vec![
            (EventType::UpdateBli, EventStatus::Success),
            (EventType::UpdateChangeRequest, EventStatus::Success),
            (EventType::UpdateChangeRequest, EventStatus::Failed),
        ]
    );
    let timeline: Vec<HistoryType> = world
        .db()
        .history(&HistoryQuery::for_subject(SubjectRef::agreement(AGREEMENT_ID)))
        .into_iter()
        .map(|entry| entry.history_type)
        .collect();
    assert!(timeline.contains(&HistoryType::ChangeRequestApproved));
}

#[test]
fn test_failed_lookup_keeps_earlier_edit_in_same_session() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let actor = requestor();
    let engine = world.container.engine();
    let mut session = world.session(&actor);

    engine
        .propose(
            &mut session,
            &world.line_item,
            field_map! { "line_description" => "edited" },
            &actor,
            None,
        )
        .unwrap();
    let err = engine
        .resolve(&mut session, Uuid::nil(), ReviewDecision::Approved, &actor, None)
        .unwrap_err();
    assert_eq!(err.kind(), "ResourceNotFound");
    session.commit().unwrap();

    assert_eq!(
        world.line_item_field("line_description"),
        Some(FieldValue::from("edited"))
    );
    let audit = world
        .db()
        .audit_records(&AuditQuery::for_entity(world.line_item.clone()));
    assert_eq!(audit.len(), 1);
    let events = world.db().events();
    assert_eq!(
        event_trail(&events),
        vec![
            (EventType::UpdateBli, EventStatus::Success),
            (EventType::UpdateChangeRequest, EventStatus::Failed),
        ]
    );
    assert_eq!(audit[0].linked_event_id, Some(events[0].id));
}

#[test]
fn test_nested_failure_is_undone_alone_when_outer_recovers() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let actor = requestor();
    let engine = world.container.engine();
    let mut session = world.session(&actor);

    let outcome = EventScope::new(world.container.bus(), EventType::UpdateAgreement)
        .run_tracked(&mut session, |uow, details| {
            engine.propose(
                uow,
                &world.line_item,
                field_map! { "line_description" => "Year 1 evaluation" },
                &actor,
                None,
            )?;
            if let Err(e) = engine.resolve(uow, Uuid::nil(), ReviewDecision::Approved, &actor, None) {
                details.insert_value("skipped", json!(e.kind()));
            }
            Ok(())
        });
    assert!(outcome.result.is_ok());
    session.commit().unwrap();

    assert_eq!(
        world.line_item_field("line_description"),
        Some(FieldValue::from("Year 1 evaluation"))
    );
    assert_eq!(
        event_trail(&world.db().events()),
        vec![
            (EventType::UpdateBli, EventStatus::Success),
            (EventType::UpdateChangeRequest, EventStatus::Failed),
            (EventType::UpdateAgreement, EventStatus::Success),
        ]
    );
    let outer = world.db().event(outcome.event.id).unwrap();
    assert_eq!(outer.details.get("skipped"), Some(&json!("ResourceNotFound")));
}

#[test]
fn test_nested_failure_propagated_by_outer_leaves_only_failed_events() {
    let world = World::new(BudgetLineItemStatus::Planned);
    let actor = requestor();
    let engine = world.container.engine();
    let mut session = world.session(&actor);

    engine
        .propose(
            &mut session,
            &world.line_item,
            field_map! { "line_description" => "before the batch" },
            &actor,
            None,
        )
        .unwrap();
    let result = EventScope::new(world.container.bus(), EventType::UpdateAgreement).run(
        &mut session,
        |uow, _| {
            engine.propose(
                uow,
                &world.line_item,
                field_map! { "line_description" => "inside the batch" },
                &actor,
                None,
            )?;
            engine.resolve(uow, Uuid::nil(), ReviewDecision::Approved, &actor, None)
        },
    );
    assert!(result.is_err());
    session.commit().unwrap();

    assert_eq!(
        world.line_item_field("line_description"),
        Some(FieldValue::from("before the batch"))
    );
    assert_eq!(
        world
            .db()
            .audit_records(&AuditQuery::for_entity(world.line_item.clone()))
            .len(),
        1
    );
    assert_eq!(
        event_trail(&world.db().events()),
        vec![
            (EventType::UpdateBli, EventStatus::Success),
            (EventType::UpdateChangeRequest, EventStatus::Failed),
            (EventType::UpdateAgreement, EventStatus::Failed),
        ]
    );
}
