//! # Gating Table
//!
//! Which field changes need review, under which conditions, and the
//! permission that skips review. Rules are evaluated in table order and a
//! field is held by the first rule that gates it.

use serde::{Deserialize, Serialize};
use shared_types::{
    Actor, AuditedEntity, BudgetLineItem, BudgetLineItemStatus, ChangeSet, CoreError, CoreResult,
    EntityRecord, FieldValue, Operation, Permission, Resource, UnitOfWork,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCondition {
    Always,
    /// The target line item is in one of these statuses.
    TargetStatusIn(Vec<BudgetLineItemStatus>),
    /// The target agreement has a line item outside these statuses.
    LineItemsBeyond(Vec<BudgetLineItemStatus>),
}

impl GateCondition {
    pub fn holds(&self, target: &EntityRecord, uow: &dyn UnitOfWork) -> CoreResult<bool> {
        match self {
            Self::Always => Ok(true),
            Self::TargetStatusIn(statuses) => Ok(status_of(target)
                .is_some_and(|status| statuses.contains(&status))),
            Self::LineItemsBeyond(editable) => {
                let agreement_id = FieldValue::from(target.key.row_key);
                let items = uow.find(BudgetLineItem::CLASS_NAME, &|item| {
                    item.get("agreement_id")
                        .is_some_and(|id| id.same_value(&agreement_id))
                })?;
                Ok(items.iter().any(|item| {
                    status_of(item).is_some_and(|status| !editable.contains(&status))
                }))
            }
        }
    }
}

fn status_of(record: &EntityRecord) -> Option<BudgetLineItemStatus> {
    record
        .get("status")
        .and_then(FieldValue::as_text)
        .and_then(|s| s.parse().ok())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRule {
    pub name: String,
    pub target_class: String,
    pub fields: Vec<String>,
    pub condition: GateCondition,
    /// Permission that applies the change directly. `None` means review is
    /// always required.
    pub bypass: Option<Permission>,
}

impl GateRule {
    pub fn new(
        name: impl Into<String>,
        target_class: impl Into<String>,
        fields: &[&str],
        condition: GateCondition,
    ) -> Self {
        Self {
            name: name.into(),
            target_class: target_class.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            condition,
            bypass: None,
        }
    }

    #[must_use]
    pub fn bypassed_by(mut self, permission: Permission) -> Self {
        self.bypass = Some(permission);
        self
    }

    pub fn is_bypassed_by(&self, actor: &Actor) -> bool {
        self.bypass
            .is_some_and(|p| actor.can(p.operation, p.resource))
    }
}

/// How a proposal splits between direct application and review.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProposalPlan {
    pub direct: ChangeSet,
    /// `(gate rule name, held changes)` in table order.
    pub held: Vec<(String, ChangeSet)>,
}

impl ProposalPlan {
    pub fn needs_review(&self) -> bool {
        !self.held.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatingPolicy {
    rules: Vec<GateRule>,
}

impl GatingPolicy {
    pub fn new(rules: Vec<GateRule>) -> Self {
        Self { rules }
    }

    pub fn default_policy() -> Self {
        let bypass = Permission::new(Operation::BypassReview, Resource::BudgetLineItem);
        Self::new(vec![
            GateRule::new(
                "line-item-status",
                BudgetLineItem::CLASS_NAME,
                &["status"],
                GateCondition::TargetStatusIn(vec![BudgetLineItemStatus::Draft]),
            )
            .bypassed_by(bypass),
            GateRule::new(
                "line-item-amounts",
                BudgetLineItem::CLASS_NAME,
                &["amount", "can_id", "date_needed"],
                GateCondition::TargetStatusIn(vec![
                    BudgetLineItemStatus::Planned,
                    BudgetLineItemStatus::InExecution,
                ]),
            )
            .bypassed_by(bypass),
            GateRule::new(
                "agreement-awarding-entity",
                "Agreement",
                &["awarding_entity_id"],
                GateCondition::LineItemsBeyond(vec![BudgetLineItemStatus::Draft]),
            ),
        ])
    }

    #[must_use]
    pub fn with_rule(mut self, rule: GateRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[GateRule] {
        &self.rules
    }

    pub fn rules_for<'a>(&'a self, class_name: &'a str) -> impl Iterator<Item = &'a GateRule> {
        self.rules.iter().filter(move |r| r.target_class == class_name)
    }

    /// Every rule must name a class and at least one field.
    pub fn validate(&self) -> CoreResult<()> {
        for rule in &self.rules {
            if rule.fields.is_empty() {
                return Err(CoreError::invalid(
                    format!("gating.{}", rule.name),
                    "a gate rule must name at least one field",
                ));
            }
            if rule.target_class.is_empty() {
                return Err(CoreError::invalid(
                    format!("gating.{}", rule.name),
                    "a gate rule must name a target class",
                ));
            }
        }
        Ok(())
    }

    /// Split `changes` into the part `actor` may apply now and the parts
    /// held for review.
    pub fn plan(
        &self,
        target: &EntityRecord,
        changes: &ChangeSet,
        actor: &Actor,
        uow: &dyn UnitOfWork,
    ) -> CoreResult<ProposalPlan> {
        let mut remaining = changes.clone();
        let mut held = Vec::new();

        for rule in self.rules_for(&target.key.class_name) {
            let gated = remaining.restricted_to(rule.fields.iter().map(String::as_str));
            if gated.is_empty() || rule.is_bypassed_by(actor) {
                continue;
            }
            if !rule.condition.holds(target, uow)? {
                continue;
            }
            remaining = remaining
                .iter()
                .filter(|(field, _)| !gated.contains(field))
                .map(|(field, change)| (field.to_string(), change.clone()))
                .collect();
            held.push((rule.name.clone(), gated));
        }

        Ok(ProposalPlan {
            direct: remaining,
            held,
        })
    }
}
