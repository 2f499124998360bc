//! # Demonstration Scenario
//!
//! Seeds one agreement with a planned budget line and a funded CAN, then runs
//! the three flows every deployment exercises:
//!
//! ```text
//! propose amount 100 -> 500   (held: CREATE_CHANGE_REQUEST)
//! approve the change request  (UPDATE_CHANGE_REQUEST, amount applied)
//! delete funding received     (DELETE_CAN_FUNDING_RECEIVED)
//! ```
//!
//! Each flow is one transaction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared_types::{
    field_map, Actor, ActorId, Agreement, AgreementType, BudgetLineItem, BudgetLineItemStatus,
    Can, CanFundingReceived, ChangeRequest, ChangeRequestKind, CoreError, CoreResult,
    DerivedHistoryEntry, EntityKey, Operation, ReviewDecision, Resource, SortOrder, SubjectRef,
    UnitOfWork,
};
use tracing::info;

use crate::container::CoreContainer;

pub const AGREEMENT_ID: u64 = 1;
pub const LINE_ITEM_ID: u64 = 15;
pub const CAN_ID: u64 = 3;
pub const FUNDING_RECEIVED_ID: u64 = 5;

/// What the scenario left behind.
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub change_request: ChangeRequest,
    pub can_history: Vec<DerivedHistoryEntry>,
    pub agreement_history: Vec<DerivedHistoryEntry>,
}

pub fn requestor() -> Actor {
    Actor::new(7, "Alex Planner").with_crud(Resource::BudgetLineItem)
}

pub fn reviewer() -> Actor {
    Actor::new(20, "Riley Reviewer")
        .with_crud(Resource::BudgetLineItem)
        .with_permission(Operation::Review, Resource::BudgetLineItem)
}

pub fn budget_admin() -> Actor {
    Actor::new(30, "Jane Doe")
        .with_crud(Resource::Can)
        .with_crud(Resource::CanFunding)
}

/// Write the fixture entities straight into committed state.
pub fn seed(container: &CoreContainer) -> EntityKey {
    let db = container.db();
    db.seed_entity(&Agreement {
        id: AGREEMENT_ID,
        name: "Evaluation Support".into(),
        agreement_type: AgreementType::Contract,
        awarding_entity_id: Some(2),
        contract_number: Some("HHS-2025-0042".into()),
        description: None,
    });
    db.seed_entity(&Can {
        id: CAN_ID,
        number: "G99XXX1".into(),
        nickname: Some("Evaluation".into()),
        description: None,
    });
    db.seed_entity(&CanFundingReceived {
        id: FUNDING_RECEIVED_ID,
        can_id: CAN_ID,
        fiscal_year: 2025,
        funding: Decimal::from(500_000),
        notes: None,
    });
    container
        .reviewers()
        .assign(ChangeRequestKind::BudgetLineItem, reviewer().id);
    db.seed_entity(&BudgetLineItem {
        id: LINE_ITEM_ID,
        agreement_id: AGREEMENT_ID,
        can_id: Some(CAN_ID),
        amount: Some(Decimal::from(100)),
        status: BudgetLineItemStatus::Planned,
        date_needed: NaiveDate::from_ymd_opt(2025, 10, 1),
        line_description: Some("Year 1 evaluation".into()),
    })
}

pub fn run(container: &CoreContainer) -> CoreResult<DemoReport> {
    let line_item = seed(container);
    let engine = container.engine();

    let requestor = requestor();
    let mut session = container.session(Some(requestor.clone()));
    let outcome = engine.propose(
        &mut session,
        &line_item,
        field_map! { "amount" => 500 },
        &requestor,
        Some("Scope increase for year 1".into()),
    )?;
    session.commit()?;
    let pending = outcome
        .change_requests()
        .first()
        .cloned()
        .ok_or_else(|| CoreError::Conflict("amount change was not held for review".into()))?;
    info!(change_request_id = %pending.id, gate = %pending.gate, "Demo: change held for review");

    let reviewer = reviewer();
    let mut session = container.session(Some(reviewer.clone()));
    let change_request = engine.resolve(
        &mut session,
        pending.id,
        ReviewDecision::Approved,
        &reviewer,
        Some("Approved for FY25".into()),
    )?;
    session.commit()?;

    let admin = budget_admin();
    let mut session = container.session(Some(admin.clone()));
    engine.delete(
        &mut session,
        &EntityKey::new("CANFundingReceived", FUNDING_RECEIVED_ID),
        &admin,
    )?;
    session.commit()?;

    let session = container.session(None);
    let can_history = gc_03_derived_history::history_for(
        &session,
        SubjectRef::can(CAN_ID),
        0,
        50,
        SortOrder::Ascending,
    )?;
    let agreement_history = gc_03_derived_history::history_for(
        &session,
        SubjectRef::agreement(AGREEMENT_ID),
        0,
        50,
        SortOrder::Ascending,
    )?;

    Ok(DemoReport {
        change_request,
        can_history,
        agreement_history,
    })
}

/// Actor ids that received a notification during the scenario.
pub fn notified(container: &CoreContainer) -> Vec<(ActorId, usize)> {
    [requestor().id, reviewer().id]
        .into_iter()
        .map(|id| (id, container.db().notifications_for(id).len()))
        .collect()
}
