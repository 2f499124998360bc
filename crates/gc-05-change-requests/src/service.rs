//! # Change-Request Engine
//!
//! ```text
//! propose ──validate──diff──┬── empty ─────────────────────→ NoChange
//!                           └── plan ──┬── direct part ──→ UPDATE_<class> event
//!                                      └── held parts ───→ CREATE_CHANGE_REQUEST event
//!                                                          (one request per gate rule)
//!
//! resolve ──IN_REVIEW?──authority?──┬── APPROVED ─→ apply data (UPDATE_<class> event)
//!                                   └── REJECTED ─→ target untouched
//!                                   └──→ transition, notify requestor, UPDATE_CHANGE_REQUEST event
//! ```

use std::sync::Arc;

use gc_01_audit_trail::diff_partial;
use gc_02_event_tracker::{create_entity, delete_entity, update_entity, EventScope};
use gc_04_validation::{ValidationContext, ValidationPipeline};
use serde_json::json;
use shared_bus::EventPublisher;
use shared_types::display::{describe_changes, describe_target};
use shared_types::{
    detail_keys, Actor, Agreement, AuditOperation, AuditedEntity, BudgetLineItem, ChangeRequest,
    ChangeRequestQuery, ChangeRequestStatus, ChangeRequestTarget, ChangeSet, CoreError,
    CoreResult, EntityKey, EntityRecord, EventType, FailureObserver, FieldMap, FieldValue,
    NoopObserver, Operation, Resource, ReviewDecision, UnitOfWork, UnitOfWorkExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::{StaticReviewerDirectory, StoreNotificationSink};
use crate::domain::GatingPolicy;
use crate::ports::{NotificationSink, ReviewerDirectory};

/// Result of [`ChangeRequestEngine::propose`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProposalOutcome {
    /// Nothing differed from the stored entity.
    NoChange,
    /// Every change was applied directly.
    Applied {
        record: EntityRecord,
        changes: ChangeSet,
    },
    /// At least one change awaits review. `applied` holds the ungated part
    /// that went through.
    PendingApproval {
        change_requests: Vec<ChangeRequest>,
        applied: ChangeSet,
    },
}

impl ProposalOutcome {
    pub fn change_requests(&self) -> &[ChangeRequest] {
        match self {
            Self::PendingApproval {
                change_requests, ..
            } => change_requests,
            _ => &[],
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingApproval { .. })
    }
}

pub struct ChangeRequestEngine {
    policy: GatingPolicy,
    publisher: Arc<dyn EventPublisher>,
    reviewers: Arc<dyn ReviewerDirectory>,
    notifications: Arc<dyn NotificationSink>,
    observer: Arc<dyn FailureObserver>,
}

impl ChangeRequestEngine {
    pub fn new(policy: GatingPolicy, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            policy,
            publisher,
            reviewers: Arc::new(StaticReviewerDirectory::new()),
            notifications: Arc::new(StoreNotificationSink),
            observer: Arc::new(NoopObserver),
        }
    }

    #[must_use]
    pub fn with_reviewers(mut self, reviewers: Arc<dyn ReviewerDirectory>) -> Self {
        self.reviewers = reviewers;
        self
    }

    #[must_use]
    pub fn with_notifications(mut self, notifications: Arc<dyn NotificationSink>) -> Self {
        self.notifications = notifications;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn FailureObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn policy(&self) -> &GatingPolicy {
        &self.policy
    }

    fn scope(&self, event_type: EventType) -> EventScope<'_> {
        EventScope::new(&*self.publisher, event_type).with_observer(Arc::clone(&self.observer))
    }

    // =========================================================================
    // PROPOSE
    // =========================================================================

    /// Validate `requested` against `target` and apply or hold the changes.
    ///
    /// Validation errors propagate unchanged. Nothing is committed; the
    /// caller owns the transaction.
    pub fn propose(
        &self,
        uow: &mut dyn UnitOfWork,
        target: &EntityKey,
        requested: FieldMap,
        actor: &Actor,
        notes: Option<String>,
    ) -> CoreResult<ProposalOutcome> {
        {
            let mut ctx =
                ValidationContext::update(&*uow, target.clone(), requested.clone()).with_actor(actor);
            ValidationPipeline::finalized_for(&target.class_name).validate(&mut ctx)?;
        }

        let current = uow.require(target)?;
        let changes = diff_partial(&current.fields, &requested);
        if changes.is_empty() {
            debug!(target = %target, "Proposal changes nothing");
            return Ok(ProposalOutcome::NoChange);
        }

        let plan = self.policy.plan(&current, &changes, actor, &*uow)?;
        let applied = if plan.direct.is_empty() {
            None
        } else {
            Some(self.apply_update(uow, target, plan.direct.new_values())?)
        };

        if !plan.needs_review() {
            return Ok(match applied {
                Some((record, changes)) => ProposalOutcome::Applied { record, changes },
                None => ProposalOutcome::NoChange,
            });
        }

        let change_requests = self.hold(uow, &current, plan.held, actor, notes)?;
        Ok(ProposalOutcome::PendingApproval {
            change_requests,
            applied: applied.map(|(_, changes)| changes).unwrap_or_default(),
        })
    }

    fn hold(
        &self,
        uow: &mut dyn UnitOfWork,
        current: &EntityRecord,
        held: Vec<(String, ChangeSet)>,
        actor: &Actor,
        notes: Option<String>,
    ) -> CoreResult<Vec<ChangeRequest>> {
        let target = target_ref(current)?;
        let request = json!({
            "target": current.key.to_string(),
            "gates": held.iter().map(|(gate, _)| gate.as_str()).collect::<Vec<_>>(),
        });

        let created = self
            .scope(EventType::CreateChangeRequest)
            .with_request(request)
            .run(uow, |uow, details| {
                let mut created = Vec::with_capacity(held.len());
                for (gate, diff) in held {
                    let request = ChangeRequest::in_review(
                        target.clone(),
                        gate,
                        diff,
                        notes.clone(),
                        actor.id,
                        uow.now(),
                    )?;
                    uow.insert_change_request(request.clone())?;
                    self.notify_reviewers(uow, &request, actor)?;
                    created.push(request);
                }
                details.insert(detail_keys::CHANGE_REQUESTS, &created)?;
                Ok(created)
            })?;

        for request in &created {
            info!(
                change_request_id = %request.id,
                gate = %request.gate,
                target = %current.key,
                "Change request submitted"
            );
            self.observer
                .change_request_recorded(ChangeRequestStatus::InReview);
        }
        Ok(created)
    }

    fn notify_reviewers(
        &self,
        uow: &mut dyn UnitOfWork,
        request: &ChangeRequest,
        requestor: &Actor,
    ) -> CoreResult<()> {
        let message = format!(
            "{} requested a change for approval on {}: {}",
            requestor.display_name(),
            describe_target(&request.target),
            describe_changes(&request.requested_change_diff)
        );
        for reviewer in self.reviewers.reviewers_for(&request.target, &*uow)? {
            if reviewer == requestor.id {
                continue;
            }
            self.notifications.notify(
                uow,
                reviewer,
                "Change Request Awaiting Review",
                &message,
                Some(request.id),
            )?;
        }
        Ok(())
    }

    // =========================================================================
    // RESOLVE
    // =========================================================================

    /// Approve or reject an IN_REVIEW change request.
    ///
    /// Fails with `IllegalStateTransition` once the request left review, and
    /// with `Conflict` at commit when a concurrent resolution won.
    pub fn resolve(
        &self,
        uow: &mut dyn UnitOfWork,
        change_request_id: Uuid,
        decision: ReviewDecision,
        reviewer: &Actor,
        notes: Option<String>,
    ) -> CoreResult<ChangeRequest> {
        let request = json!({
            "change_request_id": change_request_id,
            "decision": decision,
            "reviewer_notes": notes,
        });

        let resolved = self
            .scope(EventType::UpdateChangeRequest)
            .with_request(request)
            .run(uow, |uow, details| {
                let request = uow
                    .change_request(change_request_id)?
                    .ok_or_else(|| CoreError::not_found("ChangeRequest", change_request_id))?;
                let status = request.status.apply(decision)?;
                authorize_review(&request, reviewer)?;

                if decision == ReviewDecision::Approved {
                    self.apply_approved(uow, &request)?;
                }

                let resolved = ChangeRequest {
                    status,
                    reviewed_by: Some(reviewer.id),
                    reviewed_on: Some(uow.now()),
                    reviewer_notes: notes,
                    ..request
                };
                uow.transition_change_request(resolved.clone(), ChangeRequestStatus::InReview)?;
                self.notify_requestor(uow, &resolved)?;
                details.insert(detail_keys::CHANGE_REQUESTS, &[resolved.clone()])?;
                Ok(resolved)
            })?;

        info!(
            change_request_id = %resolved.id,
            status = %resolved.status,
            reviewer = %reviewer.id,
            "Change request resolved"
        );
        self.observer.change_request_recorded(resolved.status);
        Ok(resolved)
    }

    fn apply_approved(&self, uow: &mut dyn UnitOfWork, request: &ChangeRequest) -> CoreResult<()> {
        let key = request.target.entity_key();
        let current = uow.require(&key)?;
        for (field, change) in request.requested_change_diff.iter() {
            if !matches_recorded(current.get(field), change.old.as_ref()) {
                warn!(
                    change_request_id = %request.id,
                    field,
                    "Approved change is stale, applying the requested value"
                );
            }
        }

        {
            let mut ctx =
                ValidationContext::update(&*uow, key.clone(), request.requested_change_data.clone());
            ValidationPipeline::integrity_for(&key.class_name).validate(&mut ctx)?;
        }
        self.apply_update(uow, &key, request.requested_change_data.clone())?;
        Ok(())
    }

    fn notify_requestor(&self, uow: &mut dyn UnitOfWork, resolved: &ChangeRequest) -> CoreResult<()> {
        let (title, verb) = match resolved.status {
            ChangeRequestStatus::Approved => ("Change Request Approved", "approved"),
            ChangeRequestStatus::Rejected => ("Change Request Declined", "declined"),
            ChangeRequestStatus::InReview => return Ok(()),
        };
        let mut message = format!(
            "Your change request for {} was {verb}: {}.",
            describe_target(&resolved.target),
            describe_changes(&resolved.requested_change_diff)
        );
        if let Some(notes) = resolved.reviewer_notes.as_deref().filter(|n| !n.is_empty()) {
            message.push_str(&format!(" Notes: {notes}"));
        }
        self.notifications
            .notify(uow, resolved.created_by, title, &message, Some(resolved.id))
    }

    // =========================================================================
    // DIRECT MUTATIONS
    // =========================================================================

    fn apply_update(
        &self,
        uow: &mut dyn UnitOfWork,
        key: &EntityKey,
        fields: FieldMap,
    ) -> CoreResult<(EntityRecord, ChangeSet)> {
        let event_type = mutation_event(&key.class_name, AuditOperation::Updated)?;
        self.scope(event_type)
            .with_request_fields(&fields)
            .run(uow, |uow, details| update_entity(uow, details, key, &fields))
    }

    /// Validate and create an entity inside its CREATE event.
    pub fn create(
        &self,
        uow: &mut dyn UnitOfWork,
        class_name: &str,
        fields: FieldMap,
        actor: &Actor,
    ) -> CoreResult<EntityRecord> {
        {
            let mut ctx =
                ValidationContext::create(&*uow, class_name, fields.clone()).with_actor(actor);
            ValidationPipeline::default_for(class_name).validate(&mut ctx)?;
        }
        let event_type = mutation_event(class_name, AuditOperation::New)?;
        self.scope(event_type)
            .with_request_fields(&fields)
            .run(uow, |uow, details| create_entity(uow, details, class_name, fields))
    }

    /// Validate and delete an entity inside its DELETE event.
    pub fn delete(
        &self,
        uow: &mut dyn UnitOfWork,
        key: &EntityKey,
        actor: &Actor,
    ) -> CoreResult<EntityRecord> {
        {
            let mut ctx = ValidationContext::delete(&*uow, key.clone()).with_actor(actor);
            ValidationPipeline::finalized_for(&key.class_name).validate(&mut ctx)?;
        }
        let event_type = mutation_event(&key.class_name, AuditOperation::Deleted)?;
        self.scope(event_type)
            .with_request(json!({ "id": key.row_key }))
            .run(uow, |uow, details| delete_entity(uow, details, key))
    }

    pub fn in_review_for(
        &self,
        uow: &dyn UnitOfWork,
        key: &EntityKey,
    ) -> CoreResult<Vec<ChangeRequest>> {
        uow.change_requests(&ChangeRequestQuery::in_review_for(key.clone()))
    }
}

impl std::fmt::Debug for ChangeRequestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeRequestEngine")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn mutation_event(class_name: &str, operation: AuditOperation) -> CoreResult<EventType> {
    EventType::for_mutation(class_name, operation).ok_or_else(|| {
        CoreError::invalid(
            "class_name",
            format!("{class_name} has no {operation:?} event"),
        )
    })
}

fn target_ref(record: &EntityRecord) -> CoreResult<ChangeRequestTarget> {
    let key = &record.key;
    if key.class_name == BudgetLineItem::CLASS_NAME {
        let agreement_id = record
            .get("agreement_id")
            .and_then(FieldValue::as_u64)
            .ok_or_else(|| CoreError::invalid("agreement_id", "is required"))?;
        Ok(ChangeRequestTarget::BudgetLineItem {
            budget_line_item_id: key.row_key,
            agreement_id,
        })
    } else if key.class_name == Agreement::CLASS_NAME {
        Ok(ChangeRequestTarget::Agreement {
            agreement_id: key.row_key,
        })
    } else {
        Ok(ChangeRequestTarget::Generic { key: key.clone() })
    }
}

/// Reviewers need REVIEW on the target's resource (or on change requests
/// generally), and SELF_REVIEW to resolve their own requests.
fn authorize_review(request: &ChangeRequest, reviewer: &Actor) -> CoreResult<()> {
    let resource = Resource::for_class(&request.target.entity_key().class_name)
        .unwrap_or(Resource::ChangeRequest);
    let may_review = reviewer.can(Operation::Review, resource)
        || reviewer.can(Operation::Review, Resource::ChangeRequest);
    if !may_review {
        return Err(CoreError::denied(
            reviewer.id,
            format!("may not review {resource:?} change requests"),
        ));
    }
    if reviewer.id == request.created_by && !reviewer.can(Operation::SelfReview, resource) {
        return Err(CoreError::denied(
            reviewer.id,
            "may not review their own change request",
        ));
    }
    Ok(())
}

fn matches_recorded(current: Option<&FieldValue>, recorded: Option<&FieldValue>) -> bool {
    match (current, recorded) {
        (Some(current), Some(recorded)) => current.same_value(recorded),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use gc_01_audit_trail::AuditRecorder;
    use gc_03_derived_history::HistoryConfig;
    use rust_decimal::Decimal;
    use shared_bus::BusBuilder;
    use shared_store::{InMemoryDatabase, ManualClock};
    use shared_types::{
        field_map, ActorId, AgreementType, AuditQuery, BudgetLineItemStatus, ChangeRequestKind,
        EventStatus, FieldChange, HistoryQuery, HistoryType, SubjectRef,
    };

    struct Fixture {
        db: InMemoryDatabase,
        engine: ChangeRequestEngine,
        item: EntityKey,
    }

    fn fixture(status: BudgetLineItemStatus) -> Fixture {
        let db = InMemoryDatabase::with_clock(Arc::new(ManualClock::fixture()));
        db.register_listener(Arc::new(AuditRecorder::default()));
        let bus = Arc::new(
            gc_03_derived_history::register(BusBuilder::new(), HistoryConfig::default()).build(),
        );
        let reviewers = Arc::new(StaticReviewerDirectory::new());
        reviewers.assign(ChangeRequestKind::BudgetLineItem, ActorId(20));
        let engine =
            ChangeRequestEngine::new(GatingPolicy::default_policy(), bus).with_reviewers(reviewers);

        db.seed_entity(&Agreement {
            id: 1,
            name: "Support Contract".into(),
            agreement_type: AgreementType::Contract,
            awarding_entity_id: Some(2),
            contract_number: None,
            description: None,
        });
        let item = db.seed_entity(&BudgetLineItem {
            id: 15,
            agreement_id: 1,
            can_id: Some(3),
            amount: Some(Decimal::from(100)),
            status,
            date_needed: NaiveDate::from_ymd_opt(2025, 10, 1),
            line_description: None,
        });
        Fixture { db, engine, item }
    }

    fn requestor() -> Actor {
        Actor::new(7, "Requestor").with_crud(Resource::BudgetLineItem)
    }

    fn reviewer() -> Actor {
        Actor::new(20, "Reviewer")
            .with_crud(Resource::BudgetLineItem)
            .with_permission(Operation::Review, Resource::BudgetLineItem)
    }

    fn amount_of(db: &InMemoryDatabase, key: &EntityKey) -> FieldValue {
        db.entity(key).unwrap().get("amount").cloned().unwrap()
    }

    fn submit(fx: &Fixture, requested: FieldMap) -> ChangeRequest {
        let actor = requestor();
        let mut session = fx.db.begin(Some(actor.clone()));
        let outcome = fx
            .engine
            .propose(&mut session, &fx.item, requested, &actor, None)
            .unwrap();
        session.commit().unwrap();
        outcome.change_requests()[0].clone()
    }

    #[test]
    fn test_gated_amount_is_held_for_review() {
        let fx = fixture(BudgetLineItemStatus::Planned);
        let actor = requestor();
        let mut session = fx.db.begin(Some(actor.clone()));

        let outcome = fx
            .engine
            .propose(&mut session, &fx.item, field_map! { "amount" => 500 }, &actor, None)
            .unwrap();
        session.commit().unwrap();

        let requests = outcome.change_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].status, ChangeRequestStatus::InReview);
        assert_eq!(requests[0].gate, "line-item-amounts");
        assert_eq!(
            requests[0].requested_change_diff.get("amount"),
            Some(&FieldChange::new(Some(FieldValue::Int(100)), Some(FieldValue::Int(500))))
        );
        assert_eq!(amount_of(&fx.db, &fx.item), FieldValue::Int(100));

        let notified = fx.db.notifications_for(ActorId(20));
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].change_request_id, Some(requests[0].id));

        let history = fx
            .db
            .history(&HistoryQuery::for_subject(SubjectRef::agreement(1)));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].history_type, HistoryType::ChangeRequestCreated);
    }

    #[test]
    fn test_no_delta_creates_nothing() {
        let fx = fixture(BudgetLineItemStatus::Planned);
        let actor = requestor();
        let mut session = fx.db.begin(Some(actor.clone()));

        let outcome = fx
            .engine
            .propose(&mut session, &fx.item, field_map! { "amount" => 100 }, &actor, None)
            .unwrap();
        session.commit().unwrap();

        assert_eq!(outcome, ProposalOutcome::NoChange);
        assert!(fx.db.change_requests(&ChangeRequestQuery::default()).is_empty());
        assert!(fx.db.events().is_empty());
    }

    #[test]
    fn test_split_proposal_applies_ungated_part() {
        let fx = fixture(BudgetLineItemStatus::Planned);
        let actor = requestor();
        let mut session = fx.db.begin(Some(actor.clone()));

        let outcome = fx
            .engine
            .propose(
                &mut session,
                &fx.item,
                field_map! { "amount" => 500, "line_description" => "rebaselined" },
                &actor,
                Some("new quote".into()),
            )
            .unwrap();
        session.commit().unwrap();

        let ProposalOutcome::PendingApproval {
            change_requests,
            applied,
        } = outcome
        else {
            panic!("expected a pending proposal");
        };
        assert_eq!(change_requests.len(), 1);
        assert_eq!(change_requests[0].requestor_notes.as_deref(), Some("new quote"));
        assert!(applied.contains("line_description"));

        let stored = fx.db.entity(&fx.item).unwrap();
        assert_eq!(stored.get("line_description"), Some(&FieldValue::from("rebaselined")));
        assert_eq!(stored.get("amount"), Some(&FieldValue::Int(100)));

        let types: Vec<EventType> = fx.db.events().iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::UpdateBli, EventType::CreateChangeRequest]);
    }

    #[test]
    fn test_bypass_permission_applies_immediately() {
        let fx = fixture(BudgetLineItemStatus::Planned);
        let lead = requestor().with_permission(Operation::BypassReview, Resource::BudgetLineItem);
        let mut session = fx.db.begin(Some(lead.clone()));

        let outcome = fx
            .engine
            .propose(&mut session, &fx.item, field_map! { "amount" => 500 }, &lead, None)
            .unwrap();
        session.commit().unwrap();

        assert!(matches!(outcome, ProposalOutcome::Applied { .. }));
        assert_eq!(amount_of(&fx.db, &fx.item), FieldValue::Int(500));
        let audit = fx.db.audit_records(&AuditQuery::for_entity(fx.item.clone()));
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].operation, AuditOperation::Updated);
        assert_eq!(audit[0].created_by, ActorId(7));
    }

    #[test]
    fn test_approval_applies_requested_change() {
        let fx = fixture(BudgetLineItemStatus::Planned);
        let request = submit(&fx, field_map! { "amount" => 500 });

        let reviewer = reviewer();
        let mut session = fx.db.begin(Some(reviewer.clone()));
        let resolved = fx
            .engine
            .resolve(&mut session, request.id, ReviewDecision::Approved, &reviewer, None)
            .unwrap();
        session.commit().unwrap();

        assert_eq!(resolved.status, ChangeRequestStatus::Approved);
        assert_eq!(resolved.reviewed_by, Some(ActorId(20)));
        assert!(resolved.reviewed_on.is_some());
        assert_eq!(amount_of(&fx.db, &fx.item), FieldValue::Int(500));
        assert_eq!(
            fx.db.change_request(request.id).unwrap().status,
            ChangeRequestStatus::Approved
        );

        let notes = fx.db.notifications_for(ActorId(7));
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Change Request Approved");
        assert_eq!(
            notes[0].message,
            "Your change request for budget line 15 was approved: Amount from $100.00 to $500.00."
        );
    }

    #[test]
    fn test_rejection_leaves_target_untouched() {
        let fx = fixture(BudgetLineItemStatus::Planned);
        let request = submit(&fx, field_map! { "amount" => 500 });

        let reviewer = reviewer();
        let mut session = fx.db.begin(Some(reviewer.clone()));
        let resolved = fx
            .engine
            .resolve(
                &mut session,
                request.id,
                ReviewDecision::Rejected,
                &reviewer,
                Some("insufficient funds".into()),
            )
            .unwrap();
        session.commit().unwrap();

        assert_eq!(resolved.status, ChangeRequestStatus::Rejected);
        assert_eq!(amount_of(&fx.db, &fx.item), FieldValue::Int(100));
        let notes = fx.db.notifications_for(ActorId(7));
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.ends_with("Notes: insufficient funds"));
        assert!(fx
            .db
            .audit_records(&AuditQuery::for_entity(fx.item.clone()))
            .is_empty());
    }

    #[test]
    fn test_second_resolution_fails() {
        let fx = fixture(BudgetLineItemStatus::Planned);
        let request = submit(&fx, field_map! { "amount" => 500 });
        let reviewer = reviewer();

        let mut session = fx.db.begin(Some(reviewer.clone()));
        fx.engine
            .resolve(&mut session, request.id, ReviewDecision::Rejected, &reviewer, None)
            .unwrap();
        session.commit().unwrap();

        for decision in [ReviewDecision::Approved, ReviewDecision::Rejected] {
            let mut session = fx.db.begin(Some(reviewer.clone()));
            let err = fx
                .engine
                .resolve(&mut session, request.id, decision, &reviewer, None)
                .unwrap_err();
            assert!(matches!(err, CoreError::IllegalStateTransition { .. }));
            assert_eq!(err.http_status(), 409);
            session.commit().unwrap();
        }

        let failed: Vec<_> = fx
            .db
            .events()
            .into_iter()
            .filter(|e| e.event_status == EventStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 2);
    }

    #[test]
    fn test_concurrent_resolution_loses_at_commit() {
        let fx = fixture(BudgetLineItemStatus::Planned);
        let request = submit(&fx, field_map! { "amount" => 500 });
        let reviewer = reviewer();

        let mut first = fx.db.begin(Some(reviewer.clone()));
        let mut second = fx.db.begin(Some(reviewer.clone()));
        fx.engine
            .resolve(&mut first, request.id, ReviewDecision::Approved, &reviewer, None)
            .unwrap();
        fx.engine
            .resolve(&mut second, request.id, ReviewDecision::Rejected, &reviewer, None)
            .unwrap();

        first.commit().unwrap();
        assert!(matches!(second.commit(), Err(CoreError::Conflict(_))));
        assert_eq!(
            fx.db.change_request(request.id).unwrap().status,
            ChangeRequestStatus::Approved
        );
    }

    #[test]
    fn test_review_requires_authority() {
        let fx = fixture(BudgetLineItemStatus::Planned);
        let request = submit(&fx, field_map! { "amount" => 500 });

        let outsider = Actor::new(30, "Outsider").with_crud(Resource::BudgetLineItem);
        let mut session = fx.db.begin(Some(outsider.clone()));
        let err = fx
            .engine
            .resolve(&mut session, request.id, ReviewDecision::Approved, &outsider, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::AuthorizationDenied { .. }));

        let own = requestor().with_permission(Operation::Review, Resource::BudgetLineItem);
        let err = fx
            .engine
            .resolve(&mut session, request.id, ReviewDecision::Approved, &own, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::AuthorizationDenied { .. }));

        let trusted = own.with_permission(Operation::SelfReview, Resource::BudgetLineItem);
        fx.engine
            .resolve(&mut session, request.id, ReviewDecision::Approved, &trusted, None)
            .unwrap();
    }

    #[test]
    fn test_pending_field_blocks_new_proposal() {
        let fx = fixture(BudgetLineItemStatus::Planned);
        submit(&fx, field_map! { "amount" => 500 });

        let actor = requestor();
        let mut session = fx.db.begin(Some(actor.clone()));
        let err = fx
            .engine
            .propose(&mut session, &fx.item, field_map! { "amount" => 700 }, &actor, None)
            .unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("amount"));
    }

    #[test]
    fn test_stale_approval_still_applies() {
        let fx = fixture(BudgetLineItemStatus::Planned);
        let request = submit(&fx, field_map! { "amount" => 500 });

        let mut session = fx.db.begin(None);
        session.update(&fx.item, field_map! { "amount" => 300 }).unwrap();
        session.commit().unwrap();

        let reviewer = reviewer();
        let mut session = fx.db.begin(Some(reviewer.clone()));
        fx.engine
            .resolve(&mut session, request.id, ReviewDecision::Approved, &reviewer, None)
            .unwrap();
        session.commit().unwrap();
        assert_eq!(amount_of(&fx.db, &fx.item), FieldValue::Int(500));
    }

    #[test]
    fn test_draft_status_change_is_gated() {
        let fx = fixture(BudgetLineItemStatus::Draft);
        let request = submit(&fx, field_map! { "status" => BudgetLineItemStatus::Planned });
        assert_eq!(request.gate, "line-item-status");

        let reviewer = reviewer();
        let mut session = fx.db.begin(Some(reviewer.clone()));
        fx.engine
            .resolve(&mut session, request.id, ReviewDecision::Approved, &reviewer, None)
            .unwrap();
        session.commit().unwrap();

        let stored = fx.db.entity(&fx.item).unwrap();
        assert_eq!(stored.get("status"), Some(&FieldValue::from("PLANNED")));
        let audit = fx.db.audit_records(&AuditQuery::for_entity(fx.item.clone()));
        assert_eq!(audit.len(), 1);
        assert_eq!(
            audit[0].changes.get("status"),
            Some(&FieldChange::new(
                Some(FieldValue::from("DRAFT")),
                Some(FieldValue::from("PLANNED"))
            ))
        );
    }

    #[test]
    fn test_create_and_delete_are_validated() {
        let fx = fixture(BudgetLineItemStatus::Obligated);
        let actor = requestor();
        let mut session = fx.db.begin(Some(actor.clone()));

        let err = fx
            .engine
            .create(
                &mut session,
                "BudgetLineItem",
                field_map! { "agreement_id" => 1u64, "amount" => -1, "status" => BudgetLineItemStatus::Draft },
                &actor,
            )
            .unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("amount"));

        let created = fx
            .engine
            .create(
                &mut session,
                "BudgetLineItem",
                field_map! { "agreement_id" => 1u64, "amount" => 20, "status" => BudgetLineItemStatus::Draft },
                &actor,
            )
            .unwrap();
        assert!(fx.engine.delete(&mut session, &fx.item, &actor).is_err());
        fx.engine.delete(&mut session, &created.key, &actor).unwrap();
        session.commit().unwrap();

        let types: Vec<EventType> = fx.db.events().iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::CreateBli, EventType::DeleteBli]);
        assert!(fx.db.entity(&created.key).is_none());
    }
}
