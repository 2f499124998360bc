//! Shared fixtures: a wired container over a manual clock with one agreement,
//! one budget line, one CAN and one funding-received row.

use std::sync::Arc;

use chrono::NaiveDate;
use core_runtime::{CoreContainer, RuntimeConfig};
use rust_decimal::Decimal;
use shared_store::{InMemoryDatabase, ManualClock, Session};
use shared_types::{
    Actor, ActorId, Agreement, AgreementType, BudgetLineItem, BudgetLineItemStatus, Can,
    CanFundingReceived, ChangeRequestKind, EntityKey, FieldValue, Operation, Resource,
};

pub const AGREEMENT_ID: u64 = 1;
pub const LINE_ITEM_ID: u64 = 15;
pub const CAN_ID: u64 = 3;
pub const FUNDING_ID: u64 = 5;

pub const REQUESTOR: ActorId = ActorId(7);
pub const REVIEWER: ActorId = ActorId(20);

pub struct World {
    pub container: CoreContainer,
    pub line_item: EntityKey,
    pub funding: EntityKey,
}

impl World {
    pub fn new(status: BudgetLineItemStatus) -> Self {
        let db = InMemoryDatabase::with_clock(Arc::new(ManualClock::fixture()));
        let container = CoreContainer::with_database(RuntimeConfig::standard(), db)
            .expect("standard config is valid");
        container
            .reviewers()
            .assign(ChangeRequestKind::BudgetLineItem, REVIEWER);

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
            nickname: None,
            description: None,
        });
        let funding = db.seed_entity(&CanFundingReceived {
            id: FUNDING_ID,
            can_id: CAN_ID,
            fiscal_year: 2025,
            funding: Decimal::from(500_000),
            notes: None,
        });
        let line_item = db.seed_entity(&BudgetLineItem {
            id: LINE_ITEM_ID,
            agreement_id: AGREEMENT_ID,
            can_id: Some(CAN_ID),
            amount: Some(Decimal::from(100)),
            status,
            date_needed: NaiveDate::from_ymd_opt(2025, 10, 1),
            line_description: None,
        });

        Self {
            container,
            line_item,
            funding,
        }
    }

    pub fn db(&self) -> &InMemoryDatabase {
        self.container.db()
    }

    pub fn session(&self, actor: &Actor) -> Session {
        self.container.session(Some(actor.clone()))
    }

    pub fn line_item_field(&self, field: &str) -> Option<FieldValue> {
        self.db()
            .entity(&self.line_item)
            .and_then(|record| record.get(field).cloned())
    }
}

pub fn requestor() -> Actor {
    Actor::new(REQUESTOR.0, "Alex Planner").with_crud(Resource::BudgetLineItem)
}

pub fn reviewer() -> Actor {
    Actor::new(REVIEWER.0, "Riley Reviewer")
        .with_crud(Resource::BudgetLineItem)
        .with_permission(Operation::Review, Resource::BudgetLineItem)
}

pub fn budget_admin() -> Actor {
    Actor::new(30, "Jane Doe")
        .with_crud(Resource::Can)
        .with_crud(Resource::CanFunding)
}
